//! The item loop: drains the item queue through the item pipeline.
//!
//! Each item runs on its own task. A semaphore sized to the item queue capacity
//! bounds how many items are inside the pipeline at once. Every processor error is
//! reported under the `item_pipeline` code; a panicking processor loses the item.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, trace, warn};

use super::session::{ITEM_PIPELINE_CODE, Session, panic_message};

pub(super) fn spawn(session: Arc<Session>) -> JoinHandle<()> {
    // At most one in-flight item per item queue slot.
    let semaphore = Arc::new(Semaphore::new(session.channel_args.item_queue_len));
    tokio::spawn(async move {
        let mut tasks = JoinSet::new();
        debug!("Item loop started");
        while let Some(item) = session.items.recv().await {
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!("Item semaphore closed, item loop exiting");
                    break;
                }
            };
            let session = Arc::clone(&session);
            tasks.spawn(async move {
                if session.stopping(ITEM_PIPELINE_CODE) {
                    return;
                }
                match AssertUnwindSafe(session.pipeline.send(item))
                    .catch_unwind()
                    .await
                {
                    Ok(errors) => {
                        for err in errors {
                            session.send_error(err, ITEM_PIPELINE_CODE);
                        }
                    }
                    Err(panic) => {
                        error!("Fatal Item Processing Error: {}", panic_message(panic.as_ref()))
                    }
                }
                trace!("Item processed");
                drop(permit);
            });
            while let Some(result) = tasks.try_join_next() {
                if let Err(e) = result {
                    error!("An item task failed: {}", e);
                }
            }
        }
        trace!("Item queue closed, waiting for {} item tasks", tasks.len());
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("An item task failed: {}", e);
            }
        }
        debug!("Item loop finished");
    })
}
