//! In-memory summary store.
//!
//! - [`TimeIndex`]: step index → calendar time and report step
//! - [`ValueStore`]: step × slot value table
//! - [`SummarySet`]: catalog, index and table grown together
//! - [`SharedSummary`]: reader-writer wrapper for concurrent access

pub mod set;
pub mod shared;
pub mod time_index;
pub mod values;

pub use set::{BatchRow, DataBatch, FormatMode, HeaderMetadata, SummaryHeader, SummarySet};
pub use shared::SharedSummary;
pub use time_index::{to_datetime, StepStamp, TimeIndex, TimeStep, SECONDS_PER_DAY};
pub use values::{is_absent, ValueStore, ABSENT};

/// Calendar time in seconds since the Unix epoch.
pub type Timestamp = i64;
