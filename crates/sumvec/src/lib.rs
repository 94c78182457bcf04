//! Sumvec - Summary Vector Store
//!
//! This crate stores the summary vectors a reservoir simulator writes per
//! time step (rates, cumulatives, pressures for wells, groups, regions,
//! completions and the field) and answers queries and analyses over them.
//!
//! # Components
//!
//! - [`KeyCatalog`]: variable keys to dense value-store slots
//! - [`TimeIndex`] / [`ValueStore`]: steps and their values, grown together
//!   by [`SummarySet::extend`]
//! - [`codec`]: binary and formatted case files
//! - [`analytics`]: extremes and misfit against observations
//! - [`report`]: column-aligned text dumps
//!
//! # Example
//!
//! ```rust,ignore
//! use sumvec::{codec, LoadOptions, MaxMinOptions, VarKey};
//!
//! let set = codec::load("runs/NORNE".as_ref(), &LoadOptions::new().with_recursive(true))?;
//!
//! // Typed getters resolve the key first, then check the step.
//! let rate = set.well_var(10, "OP_1", "WOPR")?;
//!
//! let extremes = sumvec::analytics::max_min(
//!     &set,
//!     &[VarKey::well("WOPR", "OP_1")],
//!     0..=set.step_count() - 1,
//!     &MaxMinOptions::default(),
//! )?;
//! ```

#![deny(missing_docs)]

pub mod analytics;
pub mod codec;
pub mod error;
pub mod key;
pub mod query;
pub mod report;
pub mod store;

pub use analytics::{
    eval_aggregate_misfit, eval_misfit, max_min, well_max_min, MaxMin, MaxMinOptions,
    MisfitConfig, MisfitResult, Observation, ObservationVector,
};
pub use codec::{load, load_files, save, CaseFiles, ColumnEncoding, LoadOptions, SaveOptions};
pub use error::{ErrorKind, Result, SummaryError};
pub use key::{KeyCatalog, VarCategory, VarKey, Variable};
pub use report::{well_report_keys, write_report};
pub use store::{
    DataBatch, FormatMode, HeaderMetadata, SharedSummary, StepStamp, SummarySet, TimeIndex,
    TimeStep, Timestamp, ValueStore,
};
