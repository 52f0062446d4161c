//! The scheduling loop: meters cached requests into the bounded request queue.
//!
//! Every [`SCHEDULE_INTERVAL`] the loop moves as many requests from the request
//! cache as the request queue has room for. The cache absorbs bursts from analysis;
//! the bounded queue keeps the download loop's working set small.
//!
//! The loop ends when the stop sign goes up, acknowledging it under the
//! `scheduler` code, or when the cache or the request queue is closed.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use super::session::{SCHEDULER_CODE, Session};

/// Pause between two scheduling passes.
pub const SCHEDULE_INTERVAL: Duration = Duration::from_millis(10);

pub(super) fn spawn(session: Arc<Session>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SCHEDULE_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!("Scheduling loop started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = session.stop_sign.signaled() => {}
            }
            if session.stopping(SCHEDULER_CODE) {
                break;
            }
            if session.cache.is_closed() || session.requests.is_closed() {
                break;
            }
            if !release_burst(&session).await {
                break;
            }
        }
        debug!("Scheduling loop finished");
    })
}

/// Moves cached requests into the request queue while it has room.
/// Returns `false` when the loop must end.
async fn release_burst(session: &Session) -> bool {
    let mut remaining = session.requests.remaining();
    while remaining > 0 {
        if session.stopping(SCHEDULER_CODE) {
            return false;
        }
        let Some(request) = session.cache.get() else {
            break;
        };
        trace!("Scheduling request {}", request.url);
        if !session.requests.send(request).await {
            return false;
        }
        remaining -= 1;
    }
    true
}
