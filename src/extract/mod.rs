//! Record extraction contract.
//!
//! The engine is site-agnostic: it hands a positioned session to a
//! `RecordExtractor` and collects whatever record comes back. The
//! extractor for the public-service portal lives in [`dvc`].

pub mod dvc;

use async_trait::async_trait;

pub use dvc::DvcExtractor;

use crate::error::ExtractError;
use crate::models::{ItemReference, Record};
use crate::session::PageSession;

/// Result of resolving one field from the page.
///
/// Fields are tagged, not thrown: an absent field merges into the record
/// as its empty default and extraction of the item continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    Present(String),
    Default,
}

impl FieldOutcome {
    /// The field text, or the empty default.
    pub fn into_text(self) -> String {
        match self {
            Self::Present(text) => text,
            Self::Default => String::new(),
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

impl From<Option<String>> for FieldOutcome {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(text) if !text.is_empty() => Self::Present(text),
            _ => Self::Default,
        }
    }
}

/// Produces a record from a session positioned on an item's detail view.
#[async_trait]
pub trait RecordExtractor: Send + Sync {
    async fn extract(
        &self,
        session: &mut dyn PageSession,
        item: &ItemReference,
    ) -> Result<Record, ExtractError>;
}
