//! The four bounded queues connecting the crawl stages.
//!
//! A [`ChannelManager`] owns the request, response, item and error queues and a
//! one-way lifecycle: uninitialized, initialized, closed. Queue handles can only be
//! obtained while initialized, and closing wakes every task blocked on any queue.

use std::fmt;

use kanal::{AsyncReceiver, AsyncSender, bounded_async};
use log::debug;
use parking_lot::RwLock;

use crate::config::{Args, ChannelArgs};
use crate::error::{CrawlerError, EngineError, Result};
use crate::item::Item;
use crate::request::Request;
use crate::response::Response;

/// Lifecycle of a [`ChannelManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelManagerStatus {
    Uninitialized,
    Initialized,
    Closed,
}

impl ChannelManagerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelManagerStatus::Uninitialized => "uninitialized",
            ChannelManagerStatus::Initialized => "initialized",
            ChannelManagerStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for ChannelManagerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bounded FIFO queue handle. Clones share the same queue.
pub struct Queue<T> {
    tx: AsyncSender<T>,
    rx: AsyncReceiver<T>,
    capacity: usize,
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            capacity: self.capacity,
        }
    }
}

impl<T> Queue<T> {
    /// A new queue holding at most `capacity` values.
    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = bounded_async(capacity);
        Self { tx, rx, capacity }
    }

    /// Waits for room and enqueues `value`. Returns `false` if the queue is closed.
    pub async fn send(&self, value: T) -> bool {
        self.tx.send(value).await.is_ok()
    }

    /// Waits for the next value. Returns `None` once the queue is closed.
    pub async fn recv(&self) -> Option<T> {
        self.rx.recv().await.ok()
    }

    /// Takes a value if one is ready. Returns `None` when empty or closed.
    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_recv().ok().flatten()
    }

    /// A receive-only handle on this queue.
    pub fn receiver(&self) -> AsyncReceiver<T> {
        self.rx.clone()
    }

    /// Number of queued values, 0 once closed.
    pub fn len(&self) -> usize {
        if self.tx.is_closed() { 0 } else { self.tx.len() }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The capacity the queue was created with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots left before a send would wait.
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.len())
    }

    /// Whether the owning manager closed the queue.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn close(&self) {
        let _ = self.tx.close();
    }
}

struct Channels {
    requests: Queue<Request>,
    responses: Queue<Response>,
    items: Queue<Item>,
    errors: Queue<CrawlerError>,
}

impl Channels {
    fn allocate(args: &ChannelArgs) -> Self {
        Self {
            requests: Queue::bounded(args.request_queue_len),
            responses: Queue::bounded(args.response_queue_len),
            items: Queue::bounded(args.item_queue_len),
            errors: Queue::bounded(args.error_queue_len),
        }
    }

    fn close(&self) {
        self.requests.close();
        self.responses.close();
        self.items.close();
        self.errors.close();
    }
}

struct Inner {
    args: Option<ChannelArgs>,
    status: ChannelManagerStatus,
    channels: Option<Channels>,
}

/// Owner of the crawl's bounded queues.
pub struct ChannelManager {
    inner: RwLock<Inner>,
}

impl ChannelManager {
    /// Creates an initialized manager with queues sized per `args`.
    pub fn new(args: ChannelArgs) -> Result<Self> {
        let manager = Self::uninitialized();
        manager.init(args, true)?;
        Ok(manager)
    }

    /// A manager without queues. Call [`init`](Self::init) before use.
    pub fn uninitialized() -> Self {
        Self {
            inner: RwLock::new(Inner {
                args: None,
                status: ChannelManagerStatus::Uninitialized,
                channels: None,
            }),
        }
    }

    /// (Re)allocates the four queues.
    ///
    /// Returns `Ok(false)` without effect if already initialized and `reset` is false.
    pub fn init(&self, args: ChannelArgs, reset: bool) -> Result<bool> {
        args.check()?;
        let mut inner = self.inner.write();
        if inner.status == ChannelManagerStatus::Initialized && !reset {
            return Ok(false);
        }
        if let Some(old) = inner.channels.take() {
            old.close();
        }
        inner.channels = Some(Channels::allocate(&args));
        inner.args = Some(args);
        inner.status = ChannelManagerStatus::Initialized;
        debug!("Channel manager initialized with {}", args);
        Ok(true)
    }

    /// Closes all four queues. Effective only from the initialized state.
    pub fn close(&self) -> bool {
        let mut inner = self.inner.write();
        if inner.status != ChannelManagerStatus::Initialized {
            return false;
        }
        if let Some(channels) = inner.channels.take() {
            channels.close();
        }
        inner.status = ChannelManagerStatus::Closed;
        debug!("Channel manager closed");
        true
    }

    /// Current status.
    pub fn status(&self) -> ChannelManagerStatus {
        self.inner.read().status
    }

    /// The request queue. Fails with [`EngineError::ChannelStatus`] unless initialized.
    pub fn request_queue(&self) -> Result<Queue<Request>> {
        self.with_channels(|c| c.requests.clone())
    }

    pub fn response_queue(&self) -> Result<Queue<Response>> {
        self.with_channels(|c| c.responses.clone())
    }

    pub fn item_queue(&self) -> Result<Queue<Item>> {
        self.with_channels(|c| c.items.clone())
    }

    pub fn error_queue(&self) -> Result<Queue<CrawlerError>> {
        self.with_channels(|c| c.errors.clone())
    }

    fn with_channels<T>(&self, f: impl FnOnce(&Channels) -> T) -> Result<T> {
        let inner = self.inner.read();
        match (&inner.status, &inner.channels) {
            (ChannelManagerStatus::Initialized, Some(channels)) => Ok(f(channels)),
            (status, _) => Err(EngineError::ChannelStatus(status.to_string())),
        }
    }

    /// One-line fill report of every queue.
    pub fn summary(&self) -> String {
        let inner = self.inner.read();
        let args = inner.args.unwrap_or(ChannelArgs::new(0, 0, 0, 0));
        let (requests, responses, items, errors) = match &inner.channels {
            Some(c) => (
                c.requests.len(),
                c.responses.len(),
                c.items.len(),
                c.errors.len(),
            ),
            None => (0, 0, 0, 0),
        };
        format!(
            "status: {}, requestChannel: {}/{}, responseChannel: {}/{}, itemChannel: {}/{}, errorChannel: {}/{}",
            inner.status,
            requests,
            args.request_queue_len,
            responses,
            args.response_queue_len,
            items,
            args.item_queue_len,
            errors,
            args.error_queue_len
        )
    }
}
