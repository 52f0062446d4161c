//! Primary-domain extraction used to keep a crawl on its seed's site.
//!
//! The primary domain of a host is its registrable domain: the public suffix plus one
//! more label (`news.example.co.uk` -> `example.co.uk`). How suffixes are recognized
//! is a [`DomainPolicy`]; [`SuffixPolicy`] is a small built-in rule set.

use std::collections::HashSet;
use std::net::IpAddr;

use crate::error::{EngineError, Result};

/// Maps a host to the domain a crawl session is confined to.
pub trait DomainPolicy: Send + Sync {
    fn primary_domain(&self, host: &str) -> Result<String>;
}

const SECOND_LEVEL_LABELS: &[&str] = &["ac", "co", "com", "edu", "gov", "net", "org"];

/// Suffix rules without an external list.
///
/// A two-letter country code preceded by one of the generic second-level labels
/// (`com.cn`, `co.uk`, `ac.jp`, ...) counts as a two-label suffix; any other final
/// label is a one-label suffix. Extra multi-label suffixes can be registered with
/// [`with_suffix`](SuffixPolicy::with_suffix). IP literals and single-label hosts
/// such as `localhost` are their own primary domain.
#[derive(Debug, Clone, Default)]
pub struct SuffixPolicy {
    extra: HashSet<String>,
}

impl SuffixPolicy {
    /// A policy that only knows the built-in country-code suffixes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an additional public suffix, e.g. `github.io`.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.extra
            .insert(suffix.into().trim_matches('.').to_ascii_lowercase());
        self
    }

    fn suffix_labels(&self, labels: &[&str]) -> usize {
        let longest_extra = (2..=labels.len())
            .rev()
            .find(|&n| self.extra.contains(&labels[labels.len() - n..].join(".")));
        if let Some(n) = longest_extra {
            return n;
        }
        match labels {
            [.., second, last]
                if last.len() == 2 && SECOND_LEVEL_LABELS.contains(second) =>
            {
                2
            }
            _ => 1,
        }
    }
}

impl DomainPolicy for SuffixPolicy {
    fn primary_domain(&self, host: &str) -> Result<String> {
        let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
        if host.is_empty() {
            return Err(EngineError::UnrecognizedHost(host));
        }
        if host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .is_ok()
        {
            return Ok(host);
        }
        let labels: Vec<&str> = host.split('.').collect();
        if labels.iter().any(|label| label.is_empty()) {
            return Err(EngineError::UnrecognizedHost(host));
        }
        if labels.len() == 1 {
            return Ok(host);
        }
        let suffix = self.suffix_labels(&labels);
        if labels.len() <= suffix {
            return Err(EngineError::UnrecognizedHost(host));
        }
        Ok(labels[labels.len() - suffix - 1..].join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primary(host: &str) -> Result<String> {
        SuffixPolicy::new().primary_domain(host)
    }

    #[test]
    fn generic_and_country_suffixes() {
        assert_eq!(primary("www.example.com").unwrap(), "example.com");
        assert_eq!(primary("example.com").unwrap(), "example.com");
        assert_eq!(primary("a.b.example.org").unwrap(), "example.org");
        assert_eq!(primary("news.example.co.uk").unwrap(), "example.co.uk");
        assert_eq!(primary("m.example.com.cn").unwrap(), "example.com.cn");
        assert_eq!(primary("blog.example.io").unwrap(), "example.io");
    }

    #[test]
    fn ip_literals_and_single_labels_are_verbatim() {
        assert_eq!(primary("127.0.0.1").unwrap(), "127.0.0.1");
        assert_eq!(primary("[::1]").unwrap(), "[::1]");
        assert_eq!(primary("localhost").unwrap(), "localhost");
    }

    #[test]
    fn bare_suffixes_are_unrecognized() {
        assert!(matches!(primary("co.uk"), Err(EngineError::UnrecognizedHost(_))));
        assert!(primary("").is_err());
        assert!(primary("a..com").is_err());
    }

    #[test]
    fn extra_suffixes_take_precedence() {
        let policy = SuffixPolicy::new().with_suffix("github.io");
        assert_eq!(
            policy.primary_domain("me.github.io").unwrap(),
            "me.github.io"
        );
        assert!(policy.primary_domain("github.io").is_err());
    }
}
