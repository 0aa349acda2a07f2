//! Batch and aggregate containers for harvested records.

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};

use super::Record;

/// All records harvested from one listing page, in the order workers
/// completed them. Immutable once checkpointed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub page_number: u32,
    pub records: Vec<Record>,
}

impl Batch {
    pub fn new(page_number: u32) -> Self {
        Self {
            page_number,
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Cumulative records across the whole run.
///
/// Append-only within a run; batches land in ascending page order. All
/// access goes through the internal lock, and the checkpoint writer
/// holds that lock for the duration of a write, so a snapshot on disk is
/// never a half-mutated view.
#[derive(Debug, Default)]
pub struct Aggregate {
    records: Mutex<Vec<Record>>,
}

impl Aggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch's records to the aggregate.
    pub async fn append_batch(&self, batch: &Batch) {
        let mut records = self.records.lock().await;
        records.extend(batch.records.iter().cloned());
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Lock the record list. The checkpoint writer serializes the file
    /// while holding this guard.
    pub async fn records(&self) -> MutexGuard<'_, Vec<Record>> {
        self.records.lock().await
    }
}
