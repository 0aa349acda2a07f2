//! The concurrent harvesting engine.
//!
//! A page's item references go into a shared [`WorkQueue`]; a bounded
//! pool of workers, each owning one page session, drains the queue and
//! merges its records into the page batch.

mod pool;
mod queue;
mod worker;

pub use pool::run_batch;
pub use queue::WorkQueue;

/// Progress events emitted by the engine and rendered by the CLI.
#[derive(Debug, Clone)]
pub enum HarvestEvent {
    PageStarted {
        page: u32,
        items: usize,
    },
    ItemStarted {
        worker: usize,
        url: String,
    },
    ItemCompleted {
        worker: usize,
        title: String,
    },
    ItemFailed {
        worker: usize,
        url: String,
        reason: String,
    },
    PageCompleted {
        page: u32,
        harvested: usize,
        failed: usize,
    },
}
