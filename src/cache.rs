//! Unbounded FIFO buffer between analysis and the bounded request queue.
//!
//! Analysis can discover many requests at once; they always land here first so the
//! analyze loop never waits on the request queue. The scheduling loop meters them out.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::queue::SegQueue;
use log::debug;

use crate::request::Request;

/// Thread-safe request buffer with a one-way close.
#[derive(Debug, Default)]
pub struct RequestCache {
    queue: SegQueue<Request>,
    closed: AtomicBool,
}

impl RequestCache {
    /// An empty, open cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `request`. Returns `false` once the cache is closed.
    pub fn put(&self, request: Request) -> bool {
        if self.is_closed() {
            return false;
        }
        self.queue.push(request);
        true
    }

    /// Pops the oldest request. Always `None` once closed.
    pub fn get(&self) -> Option<Request> {
        if self.is_closed() {
            return None;
        }
        self.queue.pop()
    }

    /// Closes the cache. Remaining entries are abandoned, not drained.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Request cache closed with {} entries left", self.queue.len());
        }
    }

    /// Whether the cache was closed. A closed cache rejects every `put`.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// One-line state report, e.g. `status: running, length: 3`.
    pub fn summary(&self) -> String {
        let status = if self.is_closed() { "closed" } else { "running" };
        format!("status: {}, length: {}", status, self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(path: &str) -> Request {
        Request::parse(&format!("http://example.com/{}", path), 0).unwrap()
    }

    #[test]
    fn preserves_fifo_order() {
        let cache = RequestCache::new();
        for i in 0..5 {
            assert!(cache.put(req(&i.to_string())));
        }
        let paths: Vec<String> = std::iter::from_fn(|| cache.get())
            .map(|r| r.url.path().to_string())
            .collect();
        assert_eq!(paths, ["/0", "/1", "/2", "/3", "/4"]);
    }

    #[test]
    fn closed_cache_refuses_everything() {
        let cache = RequestCache::new();
        cache.put(req("a"));
        cache.close();
        cache.close();
        assert!(!cache.put(req("b")));
        assert!(cache.get().is_none());
        assert_eq!(cache.summary(), "status: closed, length: 1");
    }

    #[test]
    fn summary_while_running() {
        let cache = RequestCache::new();
        cache.put(req("a"));
        cache.put(req("b"));
        assert_eq!(cache.summary(), "status: running, length: 2");
    }
}
