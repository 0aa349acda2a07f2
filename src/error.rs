//! Error taxonomy for the harvest pipeline.
//!
//! Failures are typed by the scope they are recovered at: field-scoped
//! failures resolve to empty defaults inside the extractor, item-scoped
//! failures drop one reference from a batch, session-scoped failures end
//! one worker, and only discovery or an unhandled page-loop fault ends
//! the run.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure inside a page session or its rendering backend.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to open {url}: {reason}")]
    Open { url: String, reason: String },
    #[error("timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },
    #[error("script evaluation failed: {0}")]
    Script(String),
    #[error("element interaction failed: {0}")]
    Interaction(String),
    #[error("browser backend unavailable: {0}")]
    Backend(String),
    #[error("session is closed")]
    Closed,
}

/// Failure while extracting one item.
///
/// Anything below item scope is not an error: the extractor resolves
/// missing fields and sections to their empty defaults and still
/// produces a record.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The whole item is unusable (page never loaded, title absent).
    #[error("item unavailable: {0}")]
    ItemUnavailable(String),
    /// The session died underneath the extractor.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// The listing view could not be sized. Fatal: without a page count the
/// run cannot make meaningful progress.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("total record count unreadable: {0}")]
    TotalRecords(String),
    #[error("page size unreadable: {0}")]
    PageSize(String),
}

/// Configuration rejected before the run starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("worker count must be at least 1")]
    ZeroWorkers,
    #[error("invalid listing url {url}: {reason}")]
    BaseUrl { url: String, reason: String },
    #[error("failed to read settings file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Checkpoint persistence failure.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("failed to serialize checkpoint: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write checkpoint {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level failure of a harvest run.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}
