//! Page downloaders and the pool that lends them out.
//!
//! The engine never fetches anything itself: the host supplies a [`DownloaderFactory`]
//! and the pool stamps every produced downloader with an id of its own.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{BoxError, PoolError};
use crate::id::IdGenerator;
use crate::pool::{Entity, EntityPool};
use crate::request::Request;
use crate::response::Response;

/// Fetches a request. Network timeouts are the implementor's concern.
#[async_trait]
pub trait Downloader: Entity {
    async fn download(&self, request: Request) -> Result<Response, BoxError>;
}

/// Builds a downloader carrying the given id.
pub type DownloaderFactory = Arc<dyn Fn(u32) -> Arc<dyn Downloader> + Send + Sync>;

/// Bounded pool of downloaders.
pub struct DownloaderPool {
    pool: EntityPool<dyn Downloader>,
}

impl DownloaderPool {
    /// Calls `factory` exactly `total` times, with ids drawn from a fresh [`IdGenerator`].
    pub fn new(total: u32, factory: &DownloaderFactory) -> Result<Self, PoolError> {
        let ids = IdGenerator::new();
        let pool = EntityPool::with_factory(total, || factory(ids.next()))?;
        Ok(Self { pool })
    }

    /// Borrows a downloader, waiting while all of them are out.
    pub async fn take(&self) -> Result<Arc<dyn Downloader>, PoolError> {
        self.pool.take().await
    }

    /// Returns a downloader borrowed from this pool.
    pub fn release(&self, downloader: Arc<dyn Downloader>) -> Result<(), PoolError> {
        self.pool.release(downloader)
    }

    /// Pool size.
    pub fn total(&self) -> u32 {
        self.pool.total()
    }

    /// Downloaders currently borrowed.
    pub fn used(&self) -> u32 {
        self.pool.used()
    }

    /// Closes the pool. Pending and later `take` calls fail with [`PoolError::Closed`].
    pub fn close(&self) {
        self.pool.close()
    }
}
