//! # crawl-engine
//!
//! A crawl-orchestration engine: a [`Scheduler`] that drives bounded pools of
//! downloaders and analyzers, an ordered item pipeline, and a deduplicating,
//! domain- and depth-filtered request cache, with cooperative shutdown.
//!
//! The engine does no networking or parsing of its own. The host provides:
//!
//! - a [`DownloaderFactory`] producing [`Downloader`]s that turn a [`Request`] into a [`Response`]
//! - [`ParseResponse`] functions that extract follow-up requests and [`Item`]s from a response
//! - [`ItemProcessor`]s that consume the extracted items
//!
//! ## Example
//!
//! ```rust,ignore
//! use crawl_engine::prelude::*;
//!
//! let scheduler = Arc::new(Scheduler::new());
//! scheduler.start(
//!     ChannelArgs::default(),
//!     PoolArgs::default(),
//!     3,
//!     Arc::new(|id| Arc::new(HttpDownloader::new(id)) as Arc<dyn Downloader>),
//!     vec![Arc::new(parse_links)],
//!     vec![Arc::new(print_item)],
//!     Request::parse("https://example.com/", 0)?,
//! )?;
//! let checks = Monitor::spawn(Arc::clone(&scheduler), MonitorConfig::default()).await?;
//! ```

pub mod analyzer;
pub mod cache;
pub mod channels;
pub mod config;
pub mod domain;
pub mod downloader;
pub mod error;
pub mod id;
pub mod item;
pub mod monitor;
pub mod pipeline;
pub mod pool;
pub mod prelude;
pub mod request;
pub mod response;
pub mod scheduler;
pub mod state;
pub mod stop_sign;

pub use analyzer::{Analyzer, AnalyzerPool, ParseResponse, ResponseAnalyzer};
pub use cache::RequestCache;
pub use channels::{ChannelManager, ChannelManagerStatus, Queue};
pub use config::{Args, ChannelArgs, PoolArgs};
pub use domain::{DomainPolicy, SuffixPolicy};
pub use downloader::{Downloader, DownloaderFactory, DownloaderPool};
pub use error::{BoxError, CrawlerError, EngineError, ErrorKind, PoolError};
pub use id::IdGenerator;
pub use item::{Data, Item};
pub use monitor::{Monitor, MonitorConfig};
pub use pipeline::{ItemPipeline, ItemProcessor};
pub use pool::{Entity, EntityPool, EntityType};
pub use request::Request;
pub use response::Response;
pub use scheduler::{Scheduler, SchedulerSummary};
pub use state::RunStatus;
pub use stop_sign::StopSign;

pub use async_trait::async_trait;
pub use tokio;
