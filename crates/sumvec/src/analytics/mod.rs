//! Read-only analyses over a loaded set.
//!
//! - [`max_min`]: extremes of variables over a step range
//! - [`eval_misfit`] / [`eval_aggregate_misfit`]: deviation from observations

pub mod max_min;
pub mod misfit;

pub use max_min::{max_min, well_max_min, MaxMin, MaxMinOptions};
pub use misfit::{
    eval_aggregate_misfit, eval_misfit, AggregateMisfit, Deviation, MisfitConfig, MisfitResult,
    MissingData, Observation, ObservationTime, ObservationVector, TimeMatch, VariableMisfit,
    WellMisfit, WellObservations,
};
