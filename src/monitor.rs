//! Liveness monitoring for a running [`Scheduler`].
//!
//! A monitor runs three tasks next to the scheduler:
//!
//! - the idle checker counts consecutive idle observations and, once `max_idle_count`
//!   is reached and the scheduler is still idle, optionally stops it and ends the monitor
//! - the summary recorder logs the scheduler summary whenever it changed
//! - the error reporter logs every error arriving on the scheduler's error queue
//!
//! All three wait for the scheduler to start. The checker tells the other two to finish.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info};

use crate::scheduler::{Scheduler, SchedulerSummary};

const MIN_INTERVAL: Duration = Duration::from_millis(1);
const MIN_IDLE_COUNT: u32 = 1000;
const START_POLL: Duration = Duration::from_millis(1);

/// Monitor settings. Values below the floors (1 ms, 1000 checks) are raised to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Pause between two idle checks.
    pub interval: Duration,
    /// Consecutive idle checks before the crawl counts as finished.
    pub max_idle_count: u32,
    /// Whether to stop the scheduler once the crawl counts as finished.
    pub auto_stop: bool,
    /// Log summaries with every discovered URL.
    pub detail_summary: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(10),
            max_idle_count: MIN_IDLE_COUNT,
            auto_stop: true,
            detail_summary: false,
        }
    }
}

impl MonitorConfig {
    /// Raises the interval and idle count to their floors.
    pub fn normalized(self) -> Self {
        Self {
            interval: self.interval.max(MIN_INTERVAL),
            max_idle_count: self.max_idle_count.max(MIN_IDLE_COUNT),
            ..self
        }
    }
}

/// Handle shared by the three monitoring tasks.
pub struct Monitor {
    scheduler: Arc<Scheduler>,
    config: MonitorConfig,
    stop_tx: watch::Sender<bool>,
}

impl Monitor {
    /// Starts monitoring `scheduler`.
    ///
    /// The handle resolves to the number of idle checks performed once the checker ends.
    pub fn spawn(scheduler: Arc<Scheduler>, config: MonitorConfig) -> JoinHandle<u64> {
        let (stop_tx, _) = watch::channel(false);
        let monitor = Arc::new(Monitor {
            scheduler,
            config: config.normalized(),
            stop_tx,
        });
        tokio::spawn(Arc::clone(&monitor).report_errors());
        tokio::spawn(Arc::clone(&monitor).record_summary());
        tokio::spawn(monitor.check_status())
    }

    async fn wait_for_start(&self) {
        while !self.scheduler.running() {
            tokio::time::sleep(START_POLL).await;
        }
    }

    async fn check_status(self: Arc<Self>) -> u64 {
        let mut check_count = 0u64;
        self.wait_for_start().await;
        let mut idle_count = 0u32;
        let mut first_idle = Instant::now();
        loop {
            check_count += 1;
            if self.scheduler.idle() {
                idle_count += 1;
                if idle_count == 1 {
                    first_idle = Instant::now();
                }
                if idle_count >= self.config.max_idle_count {
                    info!(
                        "The scheduler has been idle for a period of time (about {:?}). Now consider what stop it.",
                        first_idle.elapsed()
                    );
                    if self.scheduler.idle() {
                        if self.config.auto_stop {
                            let result = if self.scheduler.stop() { "success" } else { "failing" };
                            info!("Stop scheduler...{}.", result);
                        }
                        break;
                    }
                    idle_count = 0;
                }
            } else {
                idle_count = 0;
            }
            tokio::time::sleep(self.config.interval).await;
        }
        let _ = self.stop_tx.send(true);
        check_count
    }

    async fn record_summary(self: Arc<Self>) {
        let mut stop_rx = self.stop_tx.subscribe();
        self.wait_for_start().await;
        let started = Instant::now();
        let mut previous: Option<SchedulerSummary> = None;
        let mut record_count = 1u64;
        while !*stop_rx.borrow() {
            let current = self.scheduler.summary("    ");
            if previous.as_ref().is_none_or(|prev| !current.same(prev)) {
                let rendered = if self.config.detail_summary {
                    current.detail()
                } else {
                    current.to_string()
                };
                info!(
                    "Monitor - Collected information[{}]:\n  Task number: {}\n  Scheduler:\n{}  Escaped time: {:?}\n",
                    record_count,
                    tokio::runtime::Handle::current().metrics().num_alive_tasks(),
                    rendered,
                    started.elapsed()
                );
                previous = Some(current);
                record_count += 1;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                _ = stop_rx.changed() => {}
            }
        }
    }

    async fn report_errors(self: Arc<Self>) {
        let mut stop_rx = self.stop_tx.subscribe();
        self.wait_for_start().await;
        let Some(errors) = self.scheduler.error_receiver() else {
            return;
        };
        while !*stop_rx.borrow() {
            tokio::select! {
                received = errors.recv() => match received {
                    Ok(err) => error!("Error (received from error channel): {}", err),
                    Err(_) => return,
                },
                _ = stop_rx.changed() => return,
            }
        }
    }
}
