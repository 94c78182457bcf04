//! Extremes of variables over a step range.

use crate::error::{Result, SummaryError};
use crate::key::VarKey;
use crate::store::SummarySet;
use rayon::prelude::*;
use std::ops::{Range, RangeInclusive};

/// Default for [`MaxMinOptions::include_zero`].
pub const DEFAULT_INCLUDE_ZERO: bool = true;

/// Number of scanned cells above which variables are scanned in parallel.
pub const PARALLEL_THRESHOLD: usize = 1 << 16;

/// Options for [`max_min`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaxMinOptions {
    /// Count cells that are exactly zero.
    ///
    /// Default: true. Disable to ignore shut-in periods.
    pub include_zero: bool,
}

impl Default for MaxMinOptions {
    fn default() -> Self {
        Self {
            include_zero: DEFAULT_INCLUDE_ZERO,
        }
    }
}

impl MaxMinOptions {
    /// Creates options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether zero cells count.
    pub fn with_include_zero(mut self, include_zero: bool) -> Self {
        self.include_zero = include_zero;
        self
    }
}

/// Extremes of one variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaxMin {
    /// No valid cell in the range.
    NoData,
    /// Largest and smallest valid cell.
    Values {
        /// Maximum.
        max: f64,
        /// Minimum.
        min: f64,
    },
}

impl MaxMin {
    fn accept(self, value: f64) -> Self {
        match self {
            Self::NoData => Self::Values {
                max: value,
                min: value,
            },
            Self::Values { max, min } => Self::Values {
                max: max.max(value),
                min: min.min(value),
            },
        }
    }

    /// Returns `(max, min)`, or `None` if there was no data.
    pub fn values(&self) -> Option<(f64, f64)> {
        match *self {
            Self::NoData => None,
            Self::Values { max, min } => Some((max, min)),
        }
    }

    /// Returns true if there was no valid cell.
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData)
    }
}

/// Converts an inclusive step range into a half-open one within the set.
pub(crate) fn validate_range(set: &SummarySet, steps: &RangeInclusive<usize>) -> Result<Range<usize>> {
    let (start, end) = (*steps.start(), *steps.end());
    let len = set.step_count();
    if end >= len {
        return Err(SummaryError::out_of_range("step", end, len));
    }
    if start > end {
        return Err(SummaryError::out_of_range("step", start, end + 1));
    }
    Ok(start..end + 1)
}

fn scan(set: &SummarySet, slot: usize, steps: Range<usize>, options: &MaxMinOptions) -> Result<MaxMin> {
    Ok(set
        .values()
        .column(slot, steps)?
        .flatten()
        .filter(|&value| options.include_zero || value != 0.0)
        .fold(MaxMin::NoData, MaxMin::accept))
}

/// Computes the extremes of each variable over an inclusive step range.
///
/// Absent cells are ignored; a variable without valid cells yields
/// [`MaxMin::NoData`]. Results are in the order of `keys`.
///
/// # Errors
///
/// Returns `SummaryError::KeyNotFound` for an unknown key and
/// `SummaryError::OutOfRange` if the range is empty or past the last step.
pub fn max_min(
    set: &SummarySet,
    keys: &[VarKey],
    steps: RangeInclusive<usize>,
    options: &MaxMinOptions,
) -> Result<Vec<MaxMin>> {
    let slots = keys
        .iter()
        .map(|key| set.catalog().resolve(key))
        .collect::<Result<Vec<_>>>()?;
    let steps = validate_range(set, &steps)?;

    if slots.len() * steps.len() > PARALLEL_THRESHOLD {
        slots
            .par_iter()
            .map(|&slot| scan(set, slot, steps.clone(), options))
            .collect()
    } else {
        slots
            .iter()
            .map(|&slot| scan(set, slot, steps.clone(), options))
            .collect()
    }
}

/// [`max_min`] over variables of one well.
pub fn well_max_min(
    set: &SummarySet,
    well: &str,
    keywords: &[&str],
    steps: RangeInclusive<usize>,
    options: &MaxMinOptions,
) -> Result<Vec<MaxMin>> {
    let keys: Vec<VarKey> = keywords.iter().map(|kw| VarKey::well(*kw, well)).collect();
    max_min(set, &keys, steps, options)
}
