//! Point-in-time snapshots of a scheduler.

use std::fmt;

use serde::Serialize;

use super::session::Session;
use crate::config::{ChannelArgs, PoolArgs};
use crate::error::Result;

/// What a scheduler looked like at one moment.
///
/// `Display` hides the discovered URLs; [`detail`](Self::detail) lists them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerSummary {
    #[serde(skip)]
    pub prefix: String,
    pub running: bool,
    pub channel_args: Option<ChannelArgs>,
    pub pool_args: Option<PoolArgs>,
    pub crawl_depth: u32,
    pub channels: String,
    pub request_cache: String,
    pub downloader_pool: (u32, u32),
    pub analyzer_pool: (u32, u32),
    pub item_pipeline: String,
    pub url_count: usize,
    pub urls: Vec<String>,
    pub stop_sign: String,
}

impl SchedulerSummary {
    pub(crate) fn capture(
        prefix: &str,
        running: bool,
        session: Option<&Session>,
        stop_sign: String,
    ) -> Self {
        let Some(session) = session else {
            return Self {
                prefix: prefix.to_string(),
                running,
                channel_args: None,
                pool_args: None,
                crawl_depth: 0,
                channels: "status: uninitialized".to_string(),
                request_cache: "status: closed, length: 0".to_string(),
                downloader_pool: (0, 0),
                analyzer_pool: (0, 0),
                item_pipeline: String::new(),
                url_count: 0,
                urls: Vec::new(),
                stop_sign,
            };
        };
        let mut urls: Vec<String> = session.url_map.iter().map(|url| url.key().clone()).collect();
        urls.sort();
        Self {
            prefix: prefix.to_string(),
            running,
            channel_args: Some(session.channel_args),
            pool_args: Some(session.pool_args),
            crawl_depth: session.max_depth,
            channels: session.channels.summary(),
            request_cache: session.cache.summary(),
            downloader_pool: (session.downloaders.used(), session.downloaders.total()),
            analyzer_pool: (session.analyzers.used(), session.analyzers.total()),
            item_pipeline: session.pipeline.summary(),
            url_count: urls.len(),
            urls,
            stop_sign,
        }
    }

    /// The summary including every discovered URL.
    pub fn detail(&self) -> String {
        self.render(true)
    }

    /// Field-wise equality, ignoring the prefix.
    pub fn same(&self, other: &SchedulerSummary) -> bool {
        self.running == other.running
            && self.channel_args == other.channel_args
            && self.pool_args == other.pool_args
            && self.crawl_depth == other.crawl_depth
            && self.channels == other.channels
            && self.request_cache == other.request_cache
            && self.downloader_pool == other.downloader_pool
            && self.analyzer_pool == other.analyzer_pool
            && self.item_pipeline == other.item_pipeline
            && self.url_count == other.url_count
            && self.stop_sign == other.stop_sign
    }

    /// Compact JSON rendering, the URL list included.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Indented JSON rendering, the URL list included.
    pub fn to_json_string_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn render(&self, detail: bool) -> String {
        let p = &self.prefix;
        let args = |args: Option<String>| args.unwrap_or_else(|| "{}".to_string());
        let urls = if !detail {
            "<concealed>\n".to_string()
        } else if self.urls.is_empty() {
            "\n".to_string()
        } else {
            let mut listing = String::from("\n");
            for url in &self.urls {
                listing.push_str(&format!("{p}{p}{url}\n"));
            }
            listing
        };
        format!(
            "{p}Running: {} \n\
             {p}Channel args: {} \n\
             {p}Pool args: {} \n\
             {p}Crawl depth: {} \n\
             {p}Channels manager: {} \n\
             {p}Request cache: {}\n\
             {p}Downloader pool: {}/{}\n\
             {p}Analyzer pool: {}/{}\n\
             {p}Item pipeline: {}\n\
             {p}Urls({}): {}\
             {p}Stop sign: {}\n",
            self.running,
            args(self.channel_args.map(|a| a.to_string())),
            args(self.pool_args.map(|a| a.to_string())),
            self.crawl_depth,
            self.channels,
            self.request_cache,
            self.downloader_pool.0,
            self.downloader_pool.1,
            self.analyzer_pool.0,
            self.analyzer_pool.1,
            self.item_pipeline,
            self.url_count,
            urls,
            self.stop_sign,
        )
    }
}

impl fmt::Display for SchedulerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}
