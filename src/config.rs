//! Runtime settings for the harvester.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::ConfigError;
use crate::pagination::ListingLocators;
use crate::session::WaitPolicy;

/// Listing the original harvester targeted: the national portal's
/// online-service catalog, filtered to one provincial agency.
pub const DEFAULT_BASE_URL: &str =
    "https://dichvucong.gov.vn/p/home/dvc-dich-vu-cong-truc-tuyen-ds.html?pCoQuanId=387628";

/// Settings file looked for in the working directory when no path is
/// given.
pub const DEFAULT_SETTINGS_FILE: &str = "dvc-harvest.toml";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_workers() -> usize {
    4
}

fn default_page_size() -> u32 {
    50
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_checkpoint_prefix() -> String {
    "services".to_string()
}

fn default_element_timeout_secs() -> u64 {
    10
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_page_settle_ms() -> u64 {
    5_000
}

fn default_headless() -> bool {
    true
}

/// Harvest run configuration, loadable from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Listing URL the run starts from.
    pub base_url: String,
    /// Harvest workers (and therefore page sessions) per batch.
    pub workers: usize,
    /// Listing page size to select before discovery.
    pub page_size: u32,
    /// Directory checkpoint files are written to.
    pub output_dir: PathBuf,
    /// Filename prefix shared by all checkpoint files.
    pub checkpoint_prefix: String,
    /// Per-element wait timeout.
    pub element_timeout_secs: u64,
    /// Poll interval inside element waits.
    pub poll_interval_ms: u64,
    /// Grace period after a page-change action.
    pub page_settle_ms: u64,
    /// Stop after this many listing pages (unset: all pages).
    pub max_pages: Option<u32>,
    /// Run the browser headless.
    pub headless: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            workers: default_workers(),
            page_size: default_page_size(),
            output_dir: default_output_dir(),
            checkpoint_prefix: default_checkpoint_prefix(),
            element_timeout_secs: default_element_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            page_settle_ms: default_page_settle_ms(),
            max_pages: None,
            headless: default_headless(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from `dvc-harvest.toml` in the
    /// working directory if it exists, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_SETTINGS_FILE);
                if !default.exists() {
                    debug!("no settings file; using defaults");
                    return Ok(Self::default());
                }
                default
            }
        };

        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Reject configurations the run cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        Url::parse(&self.base_url).map_err(|e| ConfigError::BaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            timeout: Duration::from_secs(self.element_timeout_secs),
            poll: Duration::from_millis(self.poll_interval_ms),
        }
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.page_settle_ms)
    }

    /// Listing locators with the configured page size applied.
    pub fn listing_locators(&self) -> ListingLocators {
        ListingLocators {
            page_size_option: Some(self.page_size.to_string()),
            ..Default::default()
        }
    }
}
