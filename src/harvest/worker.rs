//! Harvest worker: one session, one loop, drain the queue.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use super::{HarvestEvent, WorkQueue};
use crate::error::ExtractError;
use crate::extract::RecordExtractor;
use crate::models::Record;
use crate::session::PageSession;

/// Drain the queue through one exclusively-owned session.
///
/// The session lock is taken once and held for the worker's whole
/// lifetime; the coordinator reacquires it only after the worker has
/// exited, to close the session. Per-item failures are logged and the
/// reference is dropped; the worker moves on to the next one.
///
/// Returns the number of records this worker produced.
pub async fn run_worker(
    id: usize,
    session: Arc<Mutex<Box<dyn PageSession>>>,
    queue: Arc<WorkQueue>,
    extractor: Arc<dyn RecordExtractor>,
    sink: Arc<Mutex<Vec<Record>>>,
    events: mpsc::Sender<HarvestEvent>,
) -> usize {
    let mut session = session.lock().await;
    let mut produced = 0usize;

    while let Some(item) = queue.try_dequeue() {
        let _ = events
            .send(HarvestEvent::ItemStarted {
                worker: id,
                url: item.url().to_string(),
            })
            .await;

        match extractor.extract(session.as_mut(), &item).await {
            Ok(record) => {
                debug!(worker = id, title = %record.title, "item harvested");
                let _ = events
                    .send(HarvestEvent::ItemCompleted {
                        worker: id,
                        title: record.title.clone(),
                    })
                    .await;
                sink.lock().await.push(record);
                produced += 1;
            }
            Err(err) => {
                warn!(worker = id, url = %item, "extraction failed: {}", err);
                let _ = events
                    .send(HarvestEvent::ItemFailed {
                        worker: id,
                        url: item.url().to_string(),
                        reason: err.to_string(),
                    })
                    .await;
                // An item failure drops one reference. A dead session
                // ends this worker; the rest of the pool keeps draining.
                if matches!(err, ExtractError::Session(_)) {
                    warn!(worker = id, "session failed; worker exiting");
                    break;
                }
            }
        }
    }

    produced
}
