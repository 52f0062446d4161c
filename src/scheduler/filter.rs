//! Admission of discovered requests into the request cache.
//!
//! Every request an analyzer discovers passes through [`save_request`]. The checks
//! run in a fixed order:
//!
//! 1. the locator names a host
//! 2. the scheme is `http` or `https`
//! 3. the locator was not admitted before in this session
//! 4. the host shares the seed's primary domain
//! 5. the depth does not exceed the crawl depth
//! 6. the stop sign is down
//!
//! The session's URL set is the final gate. When two analyzers race on one locator,
//! the first insert wins and the other sees a repeat. Rejections are logged and
//! dropped; a request arriving after the stop sign went up is acknowledged on the
//! sign instead.

use std::fmt;

use tracing::{trace, warn};

use super::session::Session;
use crate::request::Request;

const FETCH_SCHEMES: &[&str] = &["http", "https"];

/// Why a discovered request was not cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Rejection {
    Invalid,
    Scheme(String),
    Repeated,
    ForeignDomain(String),
    TooDeep(u32),
    Stopped,
    CacheClosed,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Invalid => write!(f, "invalid request"),
            Rejection::Scheme(scheme) => write!(f, "unsupported scheme '{}'", scheme),
            Rejection::Repeated => write!(f, "already requested"),
            Rejection::ForeignDomain(domain) => write!(f, "foreign primary domain '{}'", domain),
            Rejection::TooDeep(depth) => write!(f, "depth {} exceeds the crawl depth", depth),
            Rejection::Stopped => write!(f, "scheduler is stopping"),
            Rejection::CacheClosed => write!(f, "request cache is closed"),
        }
    }
}

/// Checks `request` against the session's policy and caches it if admitted.
///
/// `code` identifies the analyzer that discovered the request; it acknowledges the
/// stop sign when the request arrives during shutdown.
pub(crate) fn save_request(session: &Session, request: Request, code: &str) -> Result<(), Rejection> {
    match admit(session, &request, code) {
        Ok(()) => {
            trace!("Caching request {} (depth {})", request.url, request.depth());
            if session.cache.put(request) {
                Ok(())
            } else {
                Err(Rejection::CacheClosed)
            }
        }
        Err(Rejection::Stopped) => {
            trace!("Dropped request {} during shutdown", request.url);
            Err(Rejection::Stopped)
        }
        Err(rejection) => {
            warn!("Ignored the request {}: {}", request.url, rejection);
            Err(rejection)
        }
    }
}

fn admit(session: &Session, request: &Request, code: &str) -> Result<(), Rejection> {
    if !request.is_valid() {
        return Err(Rejection::Invalid);
    }
    let scheme = request.url.scheme();
    if !FETCH_SCHEMES.contains(&scheme) {
        return Err(Rejection::Scheme(scheme.to_string()));
    }
    let key = request.url.as_str();
    if session.url_map.contains(key) {
        return Err(Rejection::Repeated);
    }
    let primary_domain = request
        .host()
        .and_then(|host| session.domain_policy.primary_domain(host).ok())
        .unwrap_or_default();
    if primary_domain != session.primary_domain {
        return Err(Rejection::ForeignDomain(primary_domain));
    }
    if request.depth() > session.max_depth {
        return Err(Rejection::TooDeep(request.depth()));
    }
    if session.stopping(code) {
        return Err(Rejection::Stopped);
    }
    // First writer wins when analyzers race on the same locator.
    if !session.url_map.insert(key.to_string()) {
        return Err(Rejection::Repeated);
    }
    Ok(())
}
