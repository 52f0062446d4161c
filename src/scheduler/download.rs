//! The download loop: request queue -> downloader pool -> response queue.
//!
//! The loop receives one request, then borrows a downloader before spawning the
//! task that fetches it. While every downloader is out the loop stops receiving,
//! so the request queue fills up and the backlog stays in the request cache.
//! Borrowing races the stop sign; a loop woken by the sign acknowledges it and
//! winds down.
//!
//! A fetch task hands its response to the response queue, or its error to the
//! error queue, and always returns the downloader. A panicking downloader loses
//! only the request it was fetching.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, trace};

use super::session::{DOWNLOADER_CODE, SCHEDULER_CODE, Session, generate_code, panic_message};
use crate::downloader::Downloader;
use crate::pool::Entity;
use crate::request::Request;

pub(super) fn spawn(session: Arc<Session>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tasks = JoinSet::new();
        debug!("Download loop started");
        while let Some(request) = session.requests.recv().await {
            trace!("Received request for {}", request.url);
            let taken = tokio::select! {
                taken = session.downloaders.take() => Some(taken),
                _ = session.stop_sign.signaled() => None,
            };
            let downloader = match taken {
                Some(Ok(downloader)) => downloader,
                Some(Err(e)) => {
                    session.send_error(Box::new(e), SCHEDULER_CODE);
                    continue;
                }
                None => {
                    session.stop_sign.deal(DOWNLOADER_CODE);
                    break;
                }
            };
            let session = Arc::clone(&session);
            tasks.spawn(async move { download(&session, downloader, request).await });
            while let Some(result) = tasks.try_join_next() {
                if let Err(e) = result {
                    error!("A download task failed: {}", e);
                }
            }
        }
        trace!("Download loop winding down, waiting for {} download tasks", tasks.len());
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("A download task failed: {}", e);
            }
        }
        debug!("Download loop finished");
    })
}

async fn download(session: &Session, downloader: Arc<dyn Downloader>, request: Request) {
    let code = generate_code(DOWNLOADER_CODE, downloader.id());

    if !session.stopping(&code) {
        trace!("Downloader {} fetching {}", code, request.url);
        match AssertUnwindSafe(downloader.download(request))
            .catch_unwind()
            .await
        {
            Ok(Ok(response)) => {
                if !session.send_response(response, &code).await {
                    trace!("Response dropped by {}", code);
                }
            }
            Ok(Err(e)) => session.send_error(e, &code),
            Err(panic) => error!("Fatal Downloader Error: {}", panic_message(panic.as_ref())),
        }
    }

    if let Err(e) = session.downloaders.release(downloader) {
        session.send_error(Box::new(e), SCHEDULER_CODE);
    }
}
