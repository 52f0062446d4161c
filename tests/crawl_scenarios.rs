//! End-to-end crawls against stub collaborators.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crawl_engine::prelude::*;
use crawl_engine::{ErrorKind, MonitorConfig, SchedulerSummary};

struct Echo {
    id: u32,
    fetched: Arc<AtomicUsize>,
    delay: Duration,
}

impl Entity for Echo {
    fn id(&self) -> u32 {
        self.id
    }
}

#[async_trait]
impl Downloader for Echo {
    async fn download(&self, request: Request) -> Result<Response, BoxError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.fetched.fetch_add(1, Ordering::SeqCst);
        let depth = request.depth();
        Ok(Response::new(request.url, 200, Some(b"<html></html>".to_vec()), depth))
    }
}

fn echo_factory(fetched: Arc<AtomicUsize>, delay: Duration) -> DownloaderFactory {
    Arc::new(move |id| {
        Arc::new(Echo {
            id,
            fetched: Arc::clone(&fetched),
            delay,
        }) as Arc<dyn Downloader>
    })
}

/// A parser emitting `links` (relative to the page) and one item per page, at depth 0 only.
fn seed_page_parser(links: &'static [&'static str]) -> ParseResponse {
    Arc::new(move |response: &Response, depth: u32| {
        let mut data: Vec<Data> = Vec::new();
        if depth == 0 {
            for link in links {
                let url = response.url.join(link).expect("link should resolve");
                data.push(Request::new(url, depth).into());
            }
            data.push(Item::new().with("url", response.url.as_str()).into());
        }
        (data, Vec::<BoxError>::new())
    })
}

fn counting_processor(items: Arc<AtomicUsize>) -> Arc<dyn ItemProcessor> {
    Arc::new(move |item: Item| -> Result<Item, BoxError> {
        items.fetch_add(1, Ordering::SeqCst);
        Ok(item)
    })
}

async fn eventually(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    tokio::time::timeout(limit, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}

struct Crawl {
    scheduler: Arc<Scheduler>,
    fetched: Arc<AtomicUsize>,
    items: Arc<AtomicUsize>,
}

fn start_crawl(parser: ParseResponse, max_depth: u32, delay: Duration) -> anyhow::Result<Crawl> {
    start_sized_crawl(
        ChannelArgs::new(10, 10, 10, 10),
        PoolArgs::new(2, 2),
        parser,
        max_depth,
        delay,
    )
}

fn start_sized_crawl(
    channel_args: ChannelArgs,
    pool_args: PoolArgs,
    parser: ParseResponse,
    max_depth: u32,
    delay: Duration,
) -> anyhow::Result<Crawl> {
    let scheduler = Arc::new(Scheduler::new());
    let fetched = Arc::new(AtomicUsize::new(0));
    let items = Arc::new(AtomicUsize::new(0));
    scheduler.start(
        channel_args,
        pool_args,
        max_depth,
        echo_factory(Arc::clone(&fetched), delay),
        vec![parser],
        vec![counting_processor(Arc::clone(&items))],
        Request::parse("http://www.example.com/", 0)?,
    )?;
    Ok(Crawl {
        scheduler,
        fetched,
        items,
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn follows_one_link_and_collects_one_item() -> anyhow::Result<()> {
    let crawl = start_crawl(seed_page_parser(&["/next"]), 1, Duration::ZERO)?;

    assert!(
        eventually(Duration::from_secs(5), || {
            crawl.fetched.load(Ordering::SeqCst) == 2
                && crawl.items.load(Ordering::SeqCst) == 1
                && crawl.scheduler.idle()
        })
        .await
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(crawl.items.load(Ordering::SeqCst), 1);
    assert_eq!(crawl.scheduler.url_count(), 2);
    let summary = crawl.scheduler.summary("");
    assert_eq!(
        summary.urls,
        ["http://www.example.com/", "http://www.example.com/next"]
    );

    crawl.scheduler.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn repeated_locator_is_admitted_once() -> anyhow::Result<()> {
    let crawl = start_crawl(seed_page_parser(&["/same", "/same"]), 1, Duration::ZERO)?;

    assert!(
        eventually(Duration::from_secs(5), || {
            crawl.fetched.load(Ordering::SeqCst) >= 2 && crawl.scheduler.idle()
        })
        .await
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(crawl.scheduler.url_count(), 2);
    assert_eq!(crawl.fetched.load(Ordering::SeqCst), 2);

    crawl.scheduler.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cross_domain_link_is_rejected() -> anyhow::Result<()> {
    let crawl = start_crawl(
        seed_page_parser(&["http://www.other.org/page", "http://blog.example.com/post"]),
        1,
        Duration::ZERO,
    )?;

    assert!(
        eventually(Duration::from_secs(5), || {
            crawl.fetched.load(Ordering::SeqCst) >= 2 && crawl.scheduler.idle()
        })
        .await
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    let summary = crawl.scheduler.summary("");
    assert_eq!(summary.url_count, 2);
    assert!(summary.urls.iter().all(|url| !url.contains("other.org")));
    assert!(summary.urls.contains(&"http://blog.example.com/post".to_string()));

    crawl.scheduler.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stop_mid_flight_quiesces_every_queue() -> anyhow::Result<()> {
    let next = Arc::new(AtomicUsize::new(0));
    let parser: ParseResponse = {
        let next = Arc::clone(&next);
        Arc::new(move |response: &Response, depth: u32| {
            let data: Vec<Data> = (0..5)
                .map(|_| {
                    let n = next.fetch_add(1, Ordering::SeqCst);
                    let url = response.url.join(&format!("/page/{}", n)).expect("valid link");
                    Data::from(Request::new(url, depth))
                })
                .chain(std::iter::once(Data::from(Item::new().with("depth", depth))))
                .collect();
            (data, Vec::<BoxError>::new())
        })
    };
    let crawl = start_crawl(parser, 100, Duration::from_millis(20))?;

    assert!(
        eventually(Duration::from_secs(5), || crawl.fetched.load(Ordering::SeqCst) >= 4).await
    );
    assert!(crawl.scheduler.stop());

    assert!(!crawl.scheduler.running());
    assert!(crawl.scheduler.error_receiver().is_none());
    assert!(!crawl.scheduler.stop());

    tokio::time::sleep(Duration::from_millis(200)).await;
    let urls = crawl.scheduler.url_count();
    let fetched = crawl.fetched.load(Ordering::SeqCst);
    let items = crawl.items.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(crawl.scheduler.url_count(), urls);
    assert_eq!(crawl.fetched.load(Ordering::SeqCst), fetched);
    assert_eq!(crawl.items.load(Ordering::SeqCst), items);

    let summary = crawl.scheduler.summary("");
    assert!(summary.channels.starts_with("status: closed"));
    assert!(summary.request_cache.starts_with("status: closed"));
    assert!(crawl.scheduler.stop_sign().signed());
    assert!(crawl.scheduler.stop_sign().deal_total() >= 1);

    tokio::time::timeout(Duration::from_secs(5), crawl.scheduler.shutdown()).await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn download_errors_reach_the_error_queue() -> anyhow::Result<()> {
    struct Broken(u32);

    impl Entity for Broken {
        fn id(&self) -> u32 {
            self.0
        }
    }

    #[async_trait]
    impl Downloader for Broken {
        async fn download(&self, request: Request) -> Result<Response, BoxError> {
            Err(format!("connection refused: {}", request.url).into())
        }
    }

    let scheduler = Scheduler::new();
    scheduler.start(
        ChannelArgs::new(4, 4, 4, 4),
        PoolArgs::new(1, 1),
        1,
        Arc::new(|id| Arc::new(Broken(id)) as Arc<dyn Downloader>),
        vec![seed_page_parser(&[])],
        vec![counting_processor(Arc::new(AtomicUsize::new(0)))],
        Request::parse("http://example.com/", 0)?,
    )?;

    let errors = scheduler
        .error_receiver()
        .ok_or_else(|| anyhow::anyhow!("error queue should be open"))?;
    let err = tokio::time::timeout(Duration::from_secs(5), errors.recv()).await??;
    assert_eq!(err.kind(), ErrorKind::Downloader);
    assert!(err.message().contains("connection refused"));
    assert!(err.to_string().starts_with("Crawler Error: Downloader Error: "));

    scheduler.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn monitor_stops_an_exhausted_crawl() -> anyhow::Result<()> {
    let crawl = start_crawl(seed_page_parser(&["/next"]), 1, Duration::ZERO)?;
    let monitor = Monitor::spawn(
        Arc::clone(&crawl.scheduler),
        MonitorConfig {
            interval: Duration::from_millis(1),
            max_idle_count: 1,
            auto_stop: true,
            detail_summary: true,
        },
    );

    let checks = tokio::time::timeout(Duration::from_secs(30), monitor).await??;
    assert!(checks >= 1000);
    assert!(!crawl.scheduler.running());
    assert_eq!(crawl.items.load(Ordering::SeqCst), 1);

    crawl.scheduler.shutdown().await;
    Ok(())
}

fn cache_length(summary: &SchedulerSummary) -> usize {
    summary
        .request_cache
        .rsplit("length: ")
        .next()
        .and_then(|n| n.trim().parse().ok())
        .unwrap_or(0)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_downloads_leave_the_backlog_in_the_cache() -> anyhow::Result<()> {
    let parser: ParseResponse = Arc::new(|response: &Response, depth: u32| {
        let mut data: Vec<Data> = Vec::new();
        if depth == 0 {
            for n in 0..30 {
                let url = response.url.join(&format!("/page/{}", n)).expect("valid link");
                data.push(Request::new(url, depth).into());
            }
        }
        (data, Vec::<BoxError>::new())
    });
    let crawl = start_sized_crawl(
        ChannelArgs::new(2, 2, 2, 2),
        PoolArgs::new(1, 1),
        parser,
        1,
        Duration::from_millis(50),
    )?;

    assert!(
        eventually(Duration::from_secs(5), || crawl.fetched.load(Ordering::SeqCst) >= 3).await
    );
    let summary = crawl.scheduler.summary("");
    assert_eq!(summary.url_count, 31);
    assert_eq!(summary.downloader_pool.1, 1);
    // Only a handful of requests may sit between the cache and the one downloader.
    assert!(
        cache_length(&summary) >= 20,
        "cache drained early: {}",
        summary.request_cache
    );

    crawl.scheduler.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn panicking_downloader_returns_its_slot() -> anyhow::Result<()> {
    struct Exploding {
        id: u32,
        attempts: Arc<AtomicUsize>,
    }

    impl Entity for Exploding {
        fn id(&self) -> u32 {
            self.id
        }
    }

    #[async_trait]
    impl Downloader for Exploding {
        async fn download(&self, request: Request) -> Result<Response, BoxError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            panic!("downloader exploded on {}", request.url);
        }
    }

    let attempts = Arc::new(AtomicUsize::new(0));
    let factory: DownloaderFactory = {
        let attempts = Arc::clone(&attempts);
        Arc::new(move |id| {
            Arc::new(Exploding {
                id,
                attempts: Arc::clone(&attempts),
            }) as Arc<dyn Downloader>
        })
    };
    let scheduler = Scheduler::new();
    scheduler.start(
        ChannelArgs::new(4, 4, 4, 4),
        PoolArgs::new(1, 1),
        1,
        factory,
        vec![seed_page_parser(&[])],
        vec![counting_processor(Arc::new(AtomicUsize::new(0)))],
        Request::parse("http://example.com/", 0)?,
    )?;

    assert!(
        eventually(Duration::from_secs(5), || {
            attempts.load(Ordering::SeqCst) == 1
                && scheduler.summary("").downloader_pool.0 == 0
                && scheduler.idle()
        })
        .await
    );
    assert!(scheduler.running());
    assert_eq!(scheduler.summary("").downloader_pool, (0, 1));

    scheduler.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parser_errors_reach_the_error_queue() -> anyhow::Result<()> {
    let parser: ParseResponse = Arc::new(|_: &Response, _: u32| {
        let errors: Vec<BoxError> = vec!["broken markup".into()];
        (Vec::<Data>::new(), errors)
    });
    let crawl = start_crawl(parser, 1, Duration::ZERO)?;

    let errors = crawl
        .scheduler
        .error_receiver()
        .ok_or_else(|| anyhow::anyhow!("error queue should be open"))?;
    let err = tokio::time::timeout(Duration::from_secs(5), errors.recv()).await??;
    assert_eq!(err.kind(), ErrorKind::Analyzer);
    assert!(err.message().contains("broken markup"));

    crawl.scheduler.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn item_stops_at_the_first_failing_processor() -> anyhow::Result<()> {
    let second_calls = Arc::new(AtomicUsize::new(0));
    let first: Arc<dyn ItemProcessor> =
        Arc::new(|_: Item| -> Result<Item, BoxError> { Err("first processor failed".into()) });
    let second: Arc<dyn ItemProcessor> = {
        let second_calls = Arc::clone(&second_calls);
        Arc::new(move |_: Item| -> Result<Item, BoxError> {
            second_calls.fetch_add(1, Ordering::SeqCst);
            Err("second processor failed".into())
        })
    };

    let scheduler = Scheduler::new();
    scheduler.start(
        ChannelArgs::new(4, 4, 4, 4),
        PoolArgs::new(1, 1),
        1,
        echo_factory(Arc::new(AtomicUsize::new(0)), Duration::ZERO),
        vec![seed_page_parser(&[])],
        vec![first, second],
        Request::parse("http://example.com/", 0)?,
    )?;

    let errors = scheduler
        .error_receiver()
        .ok_or_else(|| anyhow::anyhow!("error queue should be open"))?;
    let err = tokio::time::timeout(Duration::from_secs(5), errors.recv()).await??;
    assert_eq!(err.kind(), ErrorKind::ItemProcessor);
    assert!(err.message().contains("first processor failed"));

    assert!(eventually(Duration::from_secs(5), || scheduler.idle()).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(errors.try_recv()?.is_none());
    assert_eq!(second_calls.load(Ordering::SeqCst), 0);

    scheduler.shutdown().await;
    Ok(())
}
