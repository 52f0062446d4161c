//! Everything one crawl session owns, built fresh by every `start`.

use std::any::Any;
use std::sync::Arc;

use dashmap::DashSet;
use tracing::{debug, trace};

use crate::analyzer::{AnalyzerPool, ParseResponse};
use crate::cache::RequestCache;
use crate::channels::{ChannelManager, Queue};
use crate::config::{ChannelArgs, PoolArgs};
use crate::domain::DomainPolicy;
use crate::downloader::{DownloaderFactory, DownloaderPool};
use crate::error::{BoxError, CrawlerError, ErrorKind, Result};
use crate::item::Item;
use crate::pipeline::{ItemPipeline, ItemProcessor};
use crate::request::Request;
use crate::response::Response;
use crate::stop_sign::StopSign;

pub(crate) const DOWNLOADER_CODE: &str = "downloader";
pub(crate) const ANALYZER_CODE: &str = "analyzer";
pub(crate) const ITEM_PIPELINE_CODE: &str = "item_pipeline";
pub(crate) const SCHEDULER_CODE: &str = "scheduler";

/// `"<prefix>-<id>"`, the code a pooled component acknowledges and reports under.
pub(crate) fn generate_code(prefix: &str, id: u32) -> String {
    format!("{}-{}", prefix, id)
}

/// Splits a component code at its first `-` into prefix and id.
pub(crate) fn parse_code(code: &str) -> (&str, Option<&str>) {
    match code.find('-') {
        Some(index) if index > 0 => (&code[..index], Some(&code[index + 1..])),
        _ => (code, None),
    }
}

fn error_kind(code: &str) -> ErrorKind {
    match parse_code(code).0 {
        DOWNLOADER_CODE => ErrorKind::Downloader,
        ANALYZER_CODE => ErrorKind::Analyzer,
        ITEM_PIPELINE_CODE => ErrorKind::ItemProcessor,
        _ => ErrorKind::Scheduler,
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Arguments of a crawl session, as given to `Scheduler::start`.
pub(crate) struct SessionPlan {
    pub channel_args: ChannelArgs,
    pub pool_args: PoolArgs,
    pub max_depth: u32,
    pub primary_domain: String,
    pub downloader_factory: DownloaderFactory,
    pub parsers: Vec<ParseResponse>,
    pub processors: Vec<Arc<dyn ItemProcessor>>,
    pub domain_policy: Arc<dyn DomainPolicy>,
    pub stop_sign: Arc<StopSign>,
}

pub(crate) struct Session {
    pub channel_args: ChannelArgs,
    pub pool_args: PoolArgs,
    pub max_depth: u32,
    pub primary_domain: String,
    pub channels: ChannelManager,
    pub requests: Queue<Request>,
    pub responses: Queue<Response>,
    pub items: Queue<Item>,
    pub errors: Queue<CrawlerError>,
    pub downloaders: DownloaderPool,
    pub analyzers: AnalyzerPool,
    pub parsers: Vec<ParseResponse>,
    pub pipeline: ItemPipeline,
    pub cache: RequestCache,
    pub url_map: DashSet<String>,
    pub domain_policy: Arc<dyn DomainPolicy>,
    pub stop_sign: Arc<StopSign>,
}

impl Session {
    /// Builds the queues, pools and pipeline described by `plan`.
    pub fn open(plan: SessionPlan) -> Result<Self> {
        let channels = ChannelManager::new(plan.channel_args)?;
        let downloaders =
            DownloaderPool::new(plan.pool_args.downloader_pool_size, &plan.downloader_factory)?;
        let analyzers = AnalyzerPool::new(plan.pool_args.analyzer_pool_size)?;
        let pipeline = ItemPipeline::new(plan.processors)?;
        pipeline.set_fail_fast(true);
        debug!(
            "Crawl session opened for '{}' (max depth {})",
            plan.primary_domain, plan.max_depth
        );
        Ok(Self {
            channel_args: plan.channel_args,
            pool_args: plan.pool_args,
            max_depth: plan.max_depth,
            primary_domain: plan.primary_domain,
            requests: channels.request_queue()?,
            responses: channels.response_queue()?,
            items: channels.item_queue()?,
            errors: channels.error_queue()?,
            channels,
            downloaders,
            analyzers,
            parsers: plan.parsers,
            pipeline,
            cache: RequestCache::new(),
            url_map: DashSet::new(),
            domain_policy: plan.domain_policy,
            stop_sign: plan.stop_sign,
        })
    }

    /// Acknowledges the stop sign under `code` if it is raised.
    pub fn stopping(&self, code: &str) -> bool {
        if self.stop_sign.signed() {
            self.stop_sign.deal(code);
            true
        } else {
            false
        }
    }

    /// Queues a response unless the session is stopping. Returns whether it was queued.
    pub async fn send_response(&self, response: Response, code: &str) -> bool {
        if self.stopping(code) {
            return false;
        }
        self.responses.send(response).await
    }

    /// Queues an item unless the session is stopping. Returns whether it was queued.
    pub async fn send_item(&self, item: Item, code: &str) -> bool {
        if self.stopping(code) {
            return false;
        }
        self.items.send(item).await
    }

    /// Routes `err` to the error queue, attributed to the component behind `code`.
    ///
    /// The push happens on its own task so a full error queue never stalls a worker.
    pub fn send_error(&self, err: BoxError, code: &str) {
        if self.stopping(code) {
            return;
        }
        let error = CrawlerError::new(error_kind(code), err.to_string());
        trace!("Reporting {} from {}", error, code);
        let errors = self.errors.clone();
        let stop_sign = Arc::clone(&self.stop_sign);
        let code = code.to_string();
        tokio::spawn(async move {
            if stop_sign.signed() {
                stop_sign.deal(&code);
                return;
            }
            errors.send(error).await;
        });
    }

    /// No borrowed downloader or analyzer and no item inside the pipeline.
    pub fn idle(&self) -> bool {
        self.downloaders.used() == 0
            && self.analyzers.used() == 0
            && self.pipeline.processing_number() == 0
    }

    /// Raises the stop sign and closes the queues and the cache.
    pub fn close(&self) {
        self.stop_sign.sign();
        self.channels.close();
        self.cache.close();
    }
}
