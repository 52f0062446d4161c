//! Error types for the crawl engine.
//!
//! Two families live here:
//!
//! - [`EngineError`] and [`PoolError`] are returned synchronously to the caller of a
//!   library operation (a bad configuration, a pool protocol violation, an accessor
//!   called in the wrong channel-manager state).
//! - [`CrawlerError`] is the error routed through the scheduler's error queue. It is
//!   tagged with the [`ErrorKind`] of the component that produced it.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Error type returned by collaborators (downloaders, parsers, item processors).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for library operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Failures of the engine's own operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An argument container or start parameter is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An entity pool rejected an operation.
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    /// A channel accessor was called while the manager was not initialized.
    #[error("The undesirable status of channel manager: {0}")]
    ChannelStatus(String),

    /// `start` was called on a scheduler that is already running.
    #[error("The scheduler has been started")]
    AlreadyStarted,

    /// The host of a locator could not be reduced to a primary domain.
    #[error("Unrecognized host: '{0}'")]
    UnrecognizedHost(String),

    /// A locator could not be parsed.
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// A panic was recovered while building the crawl session.
    #[error("Fatal scheduler error: {0}")]
    Panicked(String),

    /// Summary serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Protocol violations reported by [`EntityPool`](crate::pool::EntityPool).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("The pool can not be initialized (total={0})")]
    ZeroCapacity(u32),

    #[error("The type of the generated entity is not {expected}")]
    FactoryType { expected: &'static str },

    #[error("The type of the returning entity is not {expected}")]
    ForeignType { expected: &'static str },

    #[error("The generated entity id {0} is not unique")]
    DuplicateId(u32),

    #[error("The entity (id={0}) is already in the pool")]
    AlreadyReturned(u32),

    #[error("The entity (id={0}) is illegal")]
    UnknownEntity(u32),

    #[error("The entity pool is closed")]
    Closed,
}

/// The component family an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    Downloader,
    Analyzer,
    ItemProcessor,
    Scheduler,
}

impl ErrorKind {
    /// Human-readable name, e.g. `Downloader Error`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Downloader => "Downloader Error",
            ErrorKind::Analyzer => "Analyzer Error",
            ErrorKind::ItemProcessor => "Item Processor Error",
            ErrorKind::Scheduler => "Scheduler Error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error raised while crawling and delivered through the error queue.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("Crawler Error: {kind}: {message}")]
pub struct CrawlerError {
    kind: ErrorKind,
    message: String,
}

impl CrawlerError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The component family that raised the error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
