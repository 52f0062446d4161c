//! Fetch requests flowing from the request cache to the downloaders.
//!
//! A [`Request`] carries its locator and its depth, the number of hops from the
//! seed. Analysis re-stamps every discovered request one level deeper than the
//! response it came from, so parsers need not track depth themselves.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Result;

/// A single fetch unit plus its hop count from the seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub url: Url,
    pub method: String,
    pub headers: Vec<(String, String)>,
    depth: u32,
}

impl Request {
    /// Creates a `GET` request at the given depth. The fragment is dropped since it
    /// never reaches the server.
    pub fn new(mut url: Url, depth: u32) -> Self {
        url.set_fragment(None);
        Self {
            url,
            method: "GET".to_string(),
            headers: Vec::new(),
            depth,
        }
    }

    /// Parses `url` and creates a `GET` request from it.
    pub fn parse(url: &str, depth: u32) -> Result<Self> {
        Ok(Self::new(Url::parse(url)?, depth))
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Hops from the seed. The seed is depth 0.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Returns the same request re-stamped with another depth.
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// A request is fetchable only if its locator names a host.
    pub fn is_valid(&self) -> bool {
        self.url.host_str().is_some_and(|host| !host.is_empty())
    }

    /// Host of the locator, if it has one.
    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }
}
