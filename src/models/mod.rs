//! Data models for harvested procedure records.

mod batch;
mod cursor;
mod record;

pub use batch::{Aggregate, Batch};
pub use cursor::PageCursor;
pub use record::{Citation, ItemReference, ProcedureMeta, ProcedureSections, Record};
