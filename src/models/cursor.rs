//! Position within the paginated listing.

use serde::{Deserialize, Serialize};

/// Derived once from the listing view at the start of a run.
/// `page_number` advances as navigation is verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    pub page_number: u32,
    pub page_size: u32,
    pub total_records: u32,
    pub total_pages: u32,
}

impl PageCursor {
    /// Build a cursor positioned on page 1.
    ///
    /// Callers guarantee `page_size > 0` (discovery rejects a zero page
    /// size before constructing a cursor).
    pub fn new(total_records: u32, page_size: u32) -> Self {
        Self {
            page_number: 1,
            page_size,
            total_records,
            total_pages: total_records.div_ceil(page_size),
        }
    }
}
