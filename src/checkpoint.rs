//! Durable checkpoints for batches and the run aggregate.
//!
//! Three file families share one record serialization: a per-page batch
//! file written once per completed page, a current-progress file
//! overwritten with the full aggregate after every page, and a complete
//! file written once at normal termination. Every write goes through a
//! temp file in the target directory followed by an atomic rename, so a
//! reader only ever sees the previous content or the full new content.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::CheckpointError;
use crate::models::{Aggregate, Batch};

/// Writes checkpoint files under one directory with a shared prefix.
pub struct CheckpointStore {
    dir: PathBuf,
    prefix: String,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn ensure_dir(&self) -> Result<(), CheckpointError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| CheckpointError::Io {
            path: self.dir.clone(),
            source,
        })
    }

    pub fn batch_path(&self, page_number: u32) -> PathBuf {
        self.dir
            .join(format!("{}_page_{}.json", self.prefix, page_number))
    }

    pub fn current_path(&self) -> PathBuf {
        self.dir.join(format!("{}_current.json", self.prefix))
    }

    pub fn complete_path(&self) -> PathBuf {
        self.dir.join(format!("{}_complete.json", self.prefix))
    }

    /// Persist one page's batch under its page number.
    pub fn write_batch(&self, batch: &Batch) -> Result<(), CheckpointError> {
        let path = self.batch_path(batch.page_number);
        self.write_atomic(&path, &batch.records)?;
        debug!(page = batch.page_number, records = batch.len(), path = %path.display(), "batch checkpointed");
        Ok(())
    }

    /// Persist the full aggregate under the current-progress name.
    ///
    /// The aggregate's lock is held for the duration of the write, so
    /// the snapshot is never a half-mutated view.
    pub async fn write_aggregate(&self, aggregate: &Aggregate) -> Result<(), CheckpointError> {
        let records = aggregate.records().await;
        self.write_atomic(&self.current_path(), &*records)
    }

    /// Persist the full aggregate under the complete name. Called once,
    /// at normal termination.
    pub async fn finalize(&self, aggregate: &Aggregate) -> Result<(), CheckpointError> {
        let records = aggregate.records().await;
        self.write_atomic(&self.complete_path(), &*records)
    }

    fn write_atomic<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), CheckpointError> {
        let json = serde_json::to_vec_pretty(value)?;

        let io_err = |source: std::io::Error| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        };

        // Same directory as the target so the rename stays on one
        // filesystem.
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(&json).map_err(io_err)?;
        tmp.flush().map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}
