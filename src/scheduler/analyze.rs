//! The analyze loop: response queue -> analyzer pool -> request cache / item queue.
//!
//! Like the download loop, this loop borrows an analyzer before it spawns the task
//! for a response, so the response queue is only drained as fast as analyzers free
//! up. The analyzer stays borrowed until every request and item it produced has
//! been routed, which keeps [`Scheduler::idle`](super::Scheduler::idle) false while
//! output is still in transit.
//!
//! Discovered requests go through the admission filter into the request cache.
//! Items go to the item queue. Parser errors are reported as analyzer errors.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, trace};

use super::filter::save_request;
use super::session::{ANALYZER_CODE, SCHEDULER_CODE, Session, generate_code, panic_message};
use crate::analyzer::Analyzer;
use crate::item::Data;
use crate::pool::Entity;
use crate::response::Response;

pub(super) fn spawn(session: Arc<Session>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tasks = JoinSet::new();
        debug!("Analyze loop started");
        while let Some(response) = session.responses.recv().await {
            trace!("Received response from {}", response.url);
            let taken = tokio::select! {
                taken = session.analyzers.take() => Some(taken),
                _ = session.stop_sign.signaled() => None,
            };
            let analyzer = match taken {
                Some(Ok(analyzer)) => analyzer,
                Some(Err(e)) => {
                    session.send_error(Box::new(e), SCHEDULER_CODE);
                    continue;
                }
                None => {
                    session.stop_sign.deal(ANALYZER_CODE);
                    break;
                }
            };
            let session = Arc::clone(&session);
            tasks.spawn(async move { analyze(&session, analyzer, response).await });
            while let Some(result) = tasks.try_join_next() {
                if let Err(e) = result {
                    error!("An analyze task failed: {}", e);
                }
            }
        }
        trace!("Analyze loop winding down, waiting for {} analyze tasks", tasks.len());
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("An analyze task failed: {}", e);
            }
        }
        debug!("Analyze loop finished");
    })
}

async fn analyze(session: &Session, analyzer: Arc<dyn Analyzer>, response: Response) {
    let code = generate_code(ANALYZER_CODE, analyzer.id());

    if !session.stopping(&code) {
        let analyzed = catch_unwind(AssertUnwindSafe(|| {
            analyzer.analyze(&session.parsers, response)
        }));
        match analyzed {
            Ok((data, errors)) => {
                for datum in data {
                    match datum {
                        Data::Request(request) => {
                            let _ = save_request(session, request, &code);
                        }
                        Data::Item(item) => {
                            if !session.send_item(item, &code).await {
                                trace!("Item dropped by {}", code);
                            }
                        }
                    }
                }
                for err in errors {
                    session.send_error(err, &code);
                }
            }
            Err(panic) => error!("Fatal Analysis Error: {}", panic_message(panic.as_ref())),
        }
    }

    if let Err(e) = session.analyzers.release(analyzer) {
        session.send_error(Box::new(e), SCHEDULER_CODE);
    }
}
