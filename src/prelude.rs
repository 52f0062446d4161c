//! A "prelude" for users of the `crawl-engine` crate.
//!
//! Re-exports the types needed to plug collaborators into a [`Scheduler`] and run it.
//!
//! # Example
//!
//! ```
//! use crawl_engine::prelude::*;
//! ```

pub use std::sync::Arc;

pub use crate::{
    // Orchestration
    Monitor,
    MonitorConfig,
    Scheduler,
    // Configuration
    ChannelArgs,
    PoolArgs,
    // Collaborator traits
    Downloader,
    DownloaderFactory,
    Entity,
    ItemProcessor,
    ParseResponse,
    // Data
    Data,
    Item,
    Request,
    Response,
    // Errors
    BoxError,
    CrawlerError,
    EngineError,
    // Essential re-exports for trait implementation
    async_trait,
};
