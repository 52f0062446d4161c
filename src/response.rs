//! Fetch results handed from the downloaders to the analyzers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

/// The result of fetching a [`Request`](crate::Request), carrying the request's depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub url: Url,
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
    depth: u32,
}

impl Response {
    /// A response to a request made at `depth`. A `None` body marks it invalid.
    pub fn new(url: Url, status: u16, body: Option<Vec<u8>>, depth: u32) -> Self {
        Self {
            url,
            status,
            headers: HashMap::new(),
            body,
            depth,
        }
    }

    /// Depth of the request this response answers.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// A response can be analyzed only if it carries a body.
    pub fn is_valid(&self) -> bool {
        self.body.is_some()
    }

    /// The body decoded as UTF-8, lossily.
    pub fn text(&self) -> Option<String> {
        self.body
            .as_deref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}
