//! # Scheduler Module
//!
//! The crawl orchestrator.
//!
//! ## Overview
//!
//! [`Scheduler::start`] builds a fresh crawl session (channel manager, downloader and
//! analyzer pools, item pipeline, request cache and URL set) and spawns four loops:
//!
//! - **schedule**: meters requests from the unbounded cache into the bounded request queue
//! - **download**: request queue -> downloader pool -> response queue
//! - **analyze**: response queue -> analyzer pool -> request cache (after filtering) or item queue
//! - **item**: item queue -> item pipeline
//!
//! Errors raised by any collaborator are tagged with the component that raised them and
//! routed to the error queue, see [`Scheduler::error_receiver`].
//!
//! ## Shutdown
//!
//! [`Scheduler::stop`] raises the stop sign and closes the queues and the cache. Loops
//! blocked on a queue wake up at once; every loop or task that notices the sign records
//! an acknowledgement under its component code and drops its unit of work.
//!
//! ## Example
//!
//! ```rust,ignore
//! let scheduler = Scheduler::new();
//! scheduler.start(
//!     ChannelArgs::default(),
//!     PoolArgs::default(),
//!     2,
//!     downloader_factory,
//!     vec![parse_links],
//!     vec![store_item],
//!     Request::parse("https://example.com/", 0)?,
//! )?;
//! // ...
//! scheduler.shutdown().await;
//! ```

mod analyze;
mod download;
mod filter;
mod item;
mod schedule;
mod session;
mod summary;

pub use schedule::SCHEDULE_INTERVAL;
pub use summary::SchedulerSummary;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use kanal::AsyncReceiver;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::analyzer::ParseResponse;
use crate::config::{Args, ChannelArgs, PoolArgs};
use crate::domain::{DomainPolicy, SuffixPolicy};
use crate::downloader::DownloaderFactory;
use crate::error::{CrawlerError, EngineError, Result};
use crate::pipeline::ItemProcessor;
use crate::request::Request;
use crate::state::{RunState, RunStatus};
use crate::stop_sign::StopSign;

use session::{Session, SessionPlan, panic_message};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Scheduler {
    state: RunState,
    stop_sign: Arc<StopSign>,
    domain_policy: Arc<dyn DomainPolicy>,
    session: RwLock<Option<Arc<Session>>>,
    loops: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// A scheduler using [`SuffixPolicy`] for primary domains.
    pub fn new() -> Self {
        Self::with_domain_policy(Arc::new(SuffixPolicy::new()))
    }

    /// A scheduler confining crawls with a custom primary-domain policy.
    pub fn with_domain_policy(domain_policy: Arc<dyn DomainPolicy>) -> Self {
        Self {
            state: RunState::new(),
            stop_sign: Arc::new(StopSign::new()),
            domain_policy,
            session: RwLock::new(None),
            loops: Mutex::new(Vec::new()),
        }
    }

    /// Starts crawling from `seed`.
    ///
    /// Every argument is validated before anything is spawned; an error from this
    /// call means no background work was started. Must be called within a Tokio
    /// runtime. A stopped scheduler may be started again; a running one may not.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        &self,
        channel_args: ChannelArgs,
        pool_args: PoolArgs,
        max_depth: u32,
        downloader_factory: DownloaderFactory,
        parsers: Vec<ParseResponse>,
        processors: Vec<Arc<dyn ItemProcessor>>,
        seed: Request,
    ) -> Result<()> {
        Handle::try_current()
            .map_err(|e| EngineError::Configuration(format!("No Tokio runtime: {}", e)))?;
        info!("Starting scheduler...");
        channel_args.check()?;
        pool_args.check()?;
        if parsers.is_empty() {
            return Err(EngineError::Configuration(
                "The response parser list is empty".to_string(),
            ));
        }
        if processors.is_empty() {
            return Err(EngineError::Configuration(
                "The item processor list is empty".to_string(),
            ));
        }
        if !seed.is_valid() {
            return Err(EngineError::Configuration(format!(
                "The seed request {} has no host",
                seed.url
            )));
        }
        if !matches!(seed.url.scheme(), "http" | "https") {
            return Err(EngineError::Configuration(format!(
                "The seed request {} is not an http(s) request",
                seed.url
            )));
        }
        let primary_domain = self
            .domain_policy
            .primary_domain(seed.host().unwrap_or_default())?;

        if !self.state.begin() {
            return Err(EngineError::AlreadyStarted);
        }
        for handle in self.loops.lock().drain(..) {
            handle.abort();
        }
        *self.session.write() = None;
        self.stop_sign.reset();

        let plan = SessionPlan {
            channel_args,
            pool_args,
            max_depth,
            primary_domain,
            downloader_factory,
            parsers,
            processors,
            domain_policy: Arc::clone(&self.domain_policy),
            stop_sign: Arc::clone(&self.stop_sign),
        };
        let session = match catch_unwind(AssertUnwindSafe(|| Session::open(plan))) {
            Ok(Ok(session)) => Arc::new(session),
            Ok(Err(e)) => {
                self.state.finish();
                return Err(e);
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Fatal Scheduler Error: {}", message);
                return Err(EngineError::Panicked(message));
            }
        };

        let seed_url = seed.url.to_string();
        session.url_map.insert(seed_url.clone());
        session.cache.put(seed.with_depth(0));
        *self.session.write() = Some(Arc::clone(&session));
        if !self.state.is_running() {
            // Stopped while the session was being built.
            session.close();
        }

        info!(
            "Crawling {} within '{}' up to depth {}",
            seed_url, session.primary_domain, max_depth
        );
        *self.loops.lock() = vec![
            download::spawn(Arc::clone(&session)),
            analyze::spawn(Arc::clone(&session)),
            item::spawn(Arc::clone(&session)),
            schedule::spawn(session),
        ];
        Ok(())
    }

    /// Signals every loop to wind down. Returns `false` unless running.
    ///
    /// In-flight downloads and analyses are not interrupted; their results are
    /// dropped and acknowledged on the stop sign.
    pub fn stop(&self) -> bool {
        if !self.state.finish() {
            return false;
        }
        match self.session.read().as_ref() {
            Some(session) => session.close(),
            None => {
                self.stop_sign.sign();
            }
        }
        info!("Scheduler stopped");
        true
    }

    /// Stops the scheduler and waits for its loops to drain.
    pub async fn shutdown(&self) {
        self.stop();
        let loops: Vec<_> = self.loops.lock().drain(..).collect();
        if loops.is_empty() {
            return;
        }
        trace!("Waiting for {} loops to finish", loops.len());
        let aborts: Vec<_> = loops.iter().map(JoinHandle::abort_handle).collect();
        let joined =
            tokio::time::timeout(SHUTDOWN_TIMEOUT, futures_util::future::join_all(loops)).await;
        match joined {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        error!("A scheduler loop failed during shutdown: {}", e);
                    }
                }
                debug!("All scheduler loops finished");
            }
            Err(_) => {
                warn!(
                    "Scheduler loops did not finish within {}s, aborting them",
                    SHUTDOWN_TIMEOUT.as_secs()
                );
                for abort in aborts {
                    abort.abort();
                }
            }
        }
    }

    /// Whether a crawl is in progress.
    pub fn running(&self) -> bool {
        self.state.is_running()
    }

    /// Lifecycle status: not started, running or stopped.
    pub fn status(&self) -> RunStatus {
        self.state.get()
    }

    /// True when no downloader or analyzer is borrowed and no item is mid-pipeline.
    pub fn idle(&self) -> bool {
        self.session.read().as_ref().is_none_or(|session| session.idle())
    }

    /// A receiving handle on the error queue, or `None` unless the queues are open.
    pub fn error_receiver(&self) -> Option<AsyncReceiver<CrawlerError>> {
        let session = self.session.read();
        let session = session.as_ref()?;
        session.channels.error_queue().ok().map(|queue| queue.receiver())
    }

    /// The stop sign shared with every loop. Useful for inspecting acknowledgements after a stop.
    pub fn stop_sign(&self) -> &StopSign {
        &self.stop_sign
    }

    /// Number of distinct URLs admitted this session, the seed included.
    pub fn url_count(&self) -> usize {
        self.session
            .read()
            .as_ref()
            .map_or(0, |session| session.url_map.len())
    }

    /// Snapshot of the scheduler and its current session.
    ///
    /// `prefix` is prepended to every line of the rendered summary.
    pub fn summary(&self, prefix: &str) -> SchedulerSummary {
        let session = self.session.read();
        SchedulerSummary::capture(
            prefix,
            self.running(),
            session.as_deref(),
            self.stop_sign.summary(),
        )
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::Downloader;
    use crate::error::BoxError;
    use crate::item::{Data, Item};
    use crate::pool::Entity;
    use crate::response::Response;
    use async_trait::async_trait;

    struct Echo(u32);

    impl Entity for Echo {
        fn id(&self) -> u32 {
            self.0
        }
    }

    #[async_trait]
    impl Downloader for Echo {
        async fn download(&self, request: Request) -> std::result::Result<Response, BoxError> {
            let depth = request.depth();
            Ok(Response::new(request.url, 200, Some(b"ok".to_vec()), depth))
        }
    }

    fn factory() -> DownloaderFactory {
        Arc::new(|id| Arc::new(Echo(id)) as Arc<dyn Downloader>)
    }

    fn silent_parser() -> ParseResponse {
        Arc::new(|_: &Response, _: u32| (Vec::<Data>::new(), Vec::<BoxError>::new()))
    }

    fn passthrough() -> Arc<dyn ItemProcessor> {
        Arc::new(|item: Item| -> std::result::Result<Item, BoxError> { Ok(item) })
    }

    fn start(scheduler: &Scheduler, seed: &str) -> Result<()> {
        scheduler.start(
            ChannelArgs::new(4, 4, 4, 4),
            PoolArgs::new(2, 2),
            1,
            factory(),
            vec![silent_parser()],
            vec![passthrough()],
            Request::parse(seed, 0)?,
        )
    }

    #[tokio::test]
    async fn lifecycle_transitions() {
        let scheduler = Scheduler::new();
        assert_eq!(scheduler.status(), RunStatus::NotStarted);
        assert!(!scheduler.stop());
        assert!(scheduler.error_receiver().is_none());

        start(&scheduler, "http://example.com/").unwrap();
        assert!(scheduler.running());
        assert!(scheduler.error_receiver().is_some());
        assert!(matches!(
            start(&scheduler, "http://example.com/"),
            Err(EngineError::AlreadyStarted)
        ));

        assert!(scheduler.stop());
        assert!(!scheduler.stop());
        assert!(!scheduler.running());
        assert!(scheduler.error_receiver().is_none());
        scheduler.shutdown().await;

        // A stopped scheduler can be started again with a clean stop sign.
        start(&scheduler, "http://example.com/").unwrap();
        assert!(!scheduler.stop_sign().signed());
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn invalid_arguments_leave_scheduler_untouched() {
        let scheduler = Scheduler::new();
        let bad_queue = scheduler.start(
            ChannelArgs::new(0, 4, 4, 4),
            PoolArgs::new(2, 2),
            1,
            factory(),
            vec![silent_parser()],
            vec![passthrough()],
            Request::parse("http://example.com/", 0).unwrap(),
        );
        assert!(matches!(bad_queue, Err(EngineError::Configuration(_))));

        let no_processors = scheduler.start(
            ChannelArgs::new(4, 4, 4, 4),
            PoolArgs::new(2, 2),
            1,
            factory(),
            vec![silent_parser()],
            Vec::new(),
            Request::parse("http://example.com/", 0).unwrap(),
        );
        assert!(no_processors.is_err());

        assert!(start(&scheduler, "ftp://example.com/").is_err());
        assert!(matches!(
            start(&scheduler, "http://co.uk/"),
            Err(EngineError::UnrecognizedHost(_))
        ));
        assert_eq!(scheduler.status(), RunStatus::NotStarted);
    }

    #[tokio::test]
    async fn factory_panic_is_reported_and_leaves_scheduler_running() {
        let scheduler = Scheduler::new();
        let result = scheduler.start(
            ChannelArgs::new(4, 4, 4, 4),
            PoolArgs::new(2, 2),
            1,
            Arc::new(|_: u32| -> Arc<dyn Downloader> { panic!("no downloader today") }),
            vec![silent_parser()],
            vec![passthrough()],
            Request::parse("http://example.com/", 0).unwrap(),
        );
        match result {
            Err(EngineError::Panicked(message)) => assert!(message.contains("no downloader today")),
            other => panic!("expected a recovered panic, got {:?}", other),
        }
        assert!(scheduler.running());
        assert!(scheduler.stop());
    }

    #[tokio::test]
    async fn summary_reflects_the_session() {
        let scheduler = Scheduler::new();
        start(&scheduler, "http://example.com/").unwrap();
        let summary = scheduler.summary("  ");
        assert!(summary.running);
        assert_eq!(summary.crawl_depth, 1);
        assert_eq!(summary.pool_args, Some(PoolArgs::new(2, 2)));
        assert_eq!(summary.url_count, 1);
        assert!(summary.detail().contains("http://example.com/"));
        scheduler.shutdown().await;
        assert!(scheduler.summary("").stop_sign.starts_with("signed: true"));
    }
}
