//! Cooperative cancellation shared by every crawl loop.
//!
//! Once signed, a loop that observes the sign records an acknowledgement under its
//! component code (see [`StopSign::deal`]) and stops instead of doing more work.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use parking_lot::Mutex;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct SignState {
    signed: bool,
    deals: HashMap<String, u32>,
}

/// A resettable stop flag with per-component acknowledgement counters.
#[derive(Debug, Default)]
pub struct StopSign {
    state: Mutex<SignState>,
    // Lock-free mirror of `state.signed` for hot-path checks.
    signed: AtomicBool,
    notify: Notify,
}

impl StopSign {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the sign. Returns `false` if it was already raised.
    pub fn sign(&self) -> bool {
        let mut state = self.state.lock();
        if state.signed {
            return false;
        }
        state.signed = true;
        self.signed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
        debug!("Stop sign raised");
        true
    }

    #[inline]
    pub fn signed(&self) -> bool {
        self.signed.load(Ordering::SeqCst)
    }

    /// Lowers the sign and forgets every acknowledgement.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.signed = false;
        state.deals.clear();
        self.signed.store(false, Ordering::SeqCst);
    }

    /// Records that `code` noticed the sign. No effect unless signed.
    pub fn deal(&self, code: &str) {
        let mut state = self.state.lock();
        if !state.signed {
            return;
        }
        *state.deals.entry(code.to_string()).or_insert(0) += 1;
    }

    /// Acknowledgements recorded for `code` since the last sign.
    pub fn deal_count(&self, code: &str) -> u32 {
        self.state.lock().deals.get(code).copied().unwrap_or(0)
    }

    /// Acknowledgements recorded across all codes.
    pub fn deal_total(&self) -> u32 {
        self.state.lock().deals.values().sum()
    }

    /// Resolves once the sign is raised; immediately if it already is.
    pub async fn signaled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.signed() {
                return;
            }
            notified.await;
        }
    }

    /// Renders `signed: false` or the signed state with per-code counts, sorted by code.
    pub fn summary(&self) -> String {
        let state = self.state.lock();
        if !state.signed {
            return "signed: false".to_string();
        }
        let mut deals: Vec<_> = state.deals.iter().collect();
        deals.sort();
        let deals = deals
            .into_iter()
            .map(|(code, count)| format!("{}: {}", code, count))
            .collect::<Vec<_>>()
            .join(", ");
        format!("signed: true, dealCount: {{{}}}", deals)
    }
}
