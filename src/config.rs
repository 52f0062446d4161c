//! Argument containers validated before a crawl starts.
//!
//! Every container implements [`Args`]: `check()` enumerates the configurations the
//! engine refuses to run with, and `Display` renders the container for summaries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Common contract of argument containers.
pub trait Args: fmt::Display {
    /// Returns an error describing the first invalid setting, if any.
    fn check(&self) -> Result<()>;
}

/// Capacities of the four bounded queues owned by the channel manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelArgs {
    pub request_queue_len: usize,
    pub response_queue_len: usize,
    pub item_queue_len: usize,
    pub error_queue_len: usize,
}

impl ChannelArgs {
    pub fn new(
        request_queue_len: usize,
        response_queue_len: usize,
        item_queue_len: usize,
        error_queue_len: usize,
    ) -> Self {
        Self {
            request_queue_len,
            response_queue_len,
            item_queue_len,
            error_queue_len,
        }
    }
}

impl Default for ChannelArgs {
    fn default() -> Self {
        let workers = num_cpus::get().max(4);
        ChannelArgs {
            request_queue_len: workers * 3,
            response_queue_len: workers * 3,
            item_queue_len: workers * 8,
            error_queue_len: workers * 2,
        }
    }
}

impl Args for ChannelArgs {
    fn check(&self) -> Result<()> {
        let checks = [
            (self.request_queue_len, "request"),
            (self.response_queue_len, "response"),
            (self.item_queue_len, "item"),
            (self.error_queue_len, "error"),
        ];
        for (len, name) in checks {
            if len == 0 {
                return Err(EngineError::Configuration(format!(
                    "The {} queue capacity can not be 0",
                    name
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for ChannelArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ requestQueueLen: {}, responseQueueLen: {}, itemQueueLen: {}, errorQueueLen: {} }}",
            self.request_queue_len, self.response_queue_len, self.item_queue_len, self.error_queue_len
        )
    }
}

/// Sizes of the downloader and analyzer pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolArgs {
    pub downloader_pool_size: u32,
    pub analyzer_pool_size: u32,
}

impl PoolArgs {
    /// Pool sizes for one crawl.
    pub fn new(downloader_pool_size: u32, analyzer_pool_size: u32) -> Self {
        Self {
            downloader_pool_size,
            analyzer_pool_size,
        }
    }
}

impl Default for PoolArgs {
    fn default() -> Self {
        let cpus = num_cpus::get() as u32;
        PoolArgs {
            downloader_pool_size: cpus.max(16),
            analyzer_pool_size: cpus.clamp(4, 16),
        }
    }
}

impl Args for PoolArgs {
    fn check(&self) -> Result<()> {
        if self.downloader_pool_size == 0 {
            return Err(EngineError::Configuration(
                "The downloader pool size can not be 0".to_string(),
            ));
        }
        if self.analyzer_pool_size == 0 {
            return Err(EngineError::Configuration(
                "The analyzer pool size can not be 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for PoolArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ downloaderPoolSize: {}, analyzerPoolSize: {} }}",
            self.downloader_pool_size, self.analyzer_pool_size
        )
    }
}
