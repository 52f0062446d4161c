//! The ordered chain of item processors.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use log::{debug, trace};

use crate::error::{BoxError, EngineError, Result};
use crate::item::Item;

/// One step of the item pipeline.
///
/// Implemented for every `Fn(Item) -> Result<Item, BoxError>`, so plain closures can
/// be registered directly.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn process_item(&self, item: Item) -> std::result::Result<Item, BoxError>;
}

#[async_trait]
impl<F> ItemProcessor for F
where
    F: Fn(Item) -> std::result::Result<Item, BoxError> + Send + Sync,
{
    fn name(&self) -> &str {
        "fn"
    }

    async fn process_item(&self, item: Item) -> std::result::Result<Item, BoxError> {
        self(item)
    }
}

/// Decrements the in-flight counter however `send` exits.
struct InFlight<'a>(&'a AtomicU64);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicU64) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runs items through its processors in registration order.
pub struct ItemPipeline {
    processors: Vec<Arc<dyn ItemProcessor>>,
    fail_fast: AtomicBool,
    sent: AtomicU64,
    accepted: AtomicU64,
    processed: AtomicU64,
    processing: AtomicU64,
}

impl ItemPipeline {
    /// Builds a pipeline running `processors` in order.
    ///
    /// Fails with [`EngineError::Configuration`] when the list is empty.
    pub fn new(processors: Vec<Arc<dyn ItemProcessor>>) -> Result<Self> {
        if processors.is_empty() {
            return Err(EngineError::Configuration(
                "The item processor list is empty".to_string(),
            ));
        }
        Ok(Self {
            processors,
            fail_fast: AtomicBool::new(false),
            sent: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            processing: AtomicU64::new(0),
        })
    }

    /// Threads `item` through every processor and returns the errors they raised.
    ///
    /// With fail-fast on, the chain stops at the first error; the item still counts
    /// as processed. An empty item is rejected before any processor runs.
    pub async fn send(&self, item: Item) -> Vec<BoxError> {
        let _in_flight = InFlight::enter(&self.processing);
        self.sent.fetch_add(1, Ordering::SeqCst);
        let mut errors = Vec::new();
        if !item.is_valid() {
            errors.push("The item is invalid".into());
            return errors;
        }
        self.accepted.fetch_add(1, Ordering::SeqCst);

        let fail_fast = self.fail_fast();
        let last = self.processors.len() - 1;
        let mut current = item;
        for (idx, processor) in self.processors.iter().enumerate() {
            trace!("Processing item through '{}'", processor.name());
            // Keep a copy to continue with when a processor fails mid-chain.
            let fallback = (idx < last && !fail_fast).then(|| current.clone());
            match processor.process_item(current).await {
                Ok(next) => current = next,
                Err(e) => {
                    debug!("Item processor '{}' failed: {}", processor.name(), e);
                    errors.push(e);
                    match fallback {
                        Some(item) => current = item,
                        None => break,
                    }
                }
            }
        }
        self.processed.fetch_add(1, Ordering::SeqCst);
        errors
    }

    /// Whether an item stops at its first failing processor.
    pub fn fail_fast(&self) -> bool {
        self.fail_fast.load(Ordering::SeqCst)
    }

    /// Switches fail-fast mode. Items already in flight keep the mode they started with.
    pub fn set_fail_fast(&self, fail_fast: bool) {
        self.fail_fast.store(fail_fast, Ordering::SeqCst);
    }

    /// `[sent, accepted, processed]`.
    pub fn count(&self) -> [u64; 3] {
        [
            self.sent.load(Ordering::SeqCst),
            self.accepted.load(Ordering::SeqCst),
            self.processed.load(Ordering::SeqCst),
        ]
    }

    /// Items currently inside [`send`](Self::send).
    pub fn processing_number(&self) -> u64 {
        self.processing.load(Ordering::SeqCst)
    }

    /// One-line counter report used in scheduler summaries.
    pub fn summary(&self) -> String {
        let [sent, accepted, processed] = self.count();
        format!(
            "failFast: {}, processorNumber: {}, sent: {}, accepted: {}, processed: {}, processingNumber: {}",
            self.fail_fast(),
            self.processors.len(),
            sent,
            accepted,
            processed,
            self.processing_number()
        )
    }
}
