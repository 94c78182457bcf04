//! Misfit between simulated vectors and observations.
//!
//! Each observation is matched to a simulated cell of the same well
//! variable, by step or by calendar time, and contributes
//! `weight · deviation` where the deviation is squared or absolute.
//! Per-variable and per-well breakdowns are returned with the totals.

use crate::error::{Result, SummaryError};
use crate::key::VarKey;
use crate::store::SummarySet;
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::warn;

/// Suffix of history vectors written next to simulated ones (`WOPR` / `WOPRH`).
pub const HISTORY_SUFFIX: &str = "H";

/// Where an observation applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationTime {
    /// A step index of the set.
    Step(usize),
    /// A calendar time, matched per [`TimeMatch`].
    Time(DateTime<Utc>),
}

impl fmt::Display for ObservationTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Step(step) => write!(f, "step {step}"),
            Self::Time(time) => write!(f, "{}", time.to_rfc3339()),
        }
    }
}

/// One observed value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Where the observation applies.
    pub at: ObservationTime,
    /// Observed value.
    pub value: f64,
    /// Scale applied to the deviation.
    pub weight: f64,
}

impl Observation {
    /// Observation at a step.
    pub fn at_step(step: usize, value: f64, weight: f64) -> Self {
        Self {
            at: ObservationTime::Step(step),
            value,
            weight,
        }
    }

    /// Observation at a calendar time.
    pub fn at_time(time: DateTime<Utc>, value: f64, weight: f64) -> Self {
        Self {
            at: ObservationTime::Time(time),
            value,
            weight,
        }
    }
}

/// Observations of one well variable.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationVector {
    /// Variable keyword, e.g. `WOPR`.
    pub keyword: String,
    /// Observations in any order.
    pub observations: Vec<Observation>,
}

impl ObservationVector {
    /// Creates an empty vector.
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            observations: Vec::new(),
        }
    }

    /// Adds an observation.
    pub fn push(&mut self, observation: Observation) {
        self.observations.push(observation);
    }

    /// Builds observations from the history vector `<keyword>H` of a well,
    /// one per step where the history value is present.
    ///
    /// # Errors
    ///
    /// Returns `SummaryError::KeyNotFound` if the well has no history vector.
    pub fn from_history(set: &SummarySet, well: &str, keyword: &str, weight: f64) -> Result<Self> {
        let history = VarKey::well(format!("{keyword}{HISTORY_SUFFIX}"), well);
        let observations = set
            .vector(&history)?
            .into_iter()
            .enumerate()
            .filter_map(|(step, value)| value.map(|v| Observation::at_step(step, v, weight)))
            .collect();
        Ok(Self {
            keyword: keyword.to_string(),
            observations,
        })
    }
}

/// Deviation measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Deviation {
    /// `(simulated - observed)²`
    #[default]
    Squared,
    /// `|simulated - observed|`
    Absolute,
}

/// Handling of observations without a simulated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingData {
    /// Fail the evaluation.
    #[default]
    Abort,
    /// Skip the observation and flag the result as partial.
    Skip,
}

/// Matching of time-stamped observations to steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeMatch {
    /// Only a step at exactly that time.
    Exact,
    /// The closest step; the earlier one on ties.
    #[default]
    Nearest,
}

/// Configuration of a misfit evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MisfitConfig {
    /// Deviation measure.
    ///
    /// Default: [`Deviation::Squared`]
    pub deviation: Deviation,
    /// Missing simulated data policy.
    ///
    /// Default: [`MissingData::Abort`]
    pub missing: MissingData,
    /// Time matching of time-stamped observations.
    ///
    /// Default: [`TimeMatch::Nearest`]
    pub time_match: TimeMatch,
}

impl MisfitConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the deviation measure.
    pub fn with_deviation(mut self, deviation: Deviation) -> Self {
        self.deviation = deviation;
        self
    }

    /// Sets the missing data policy.
    pub fn with_missing(mut self, missing: MissingData) -> Self {
        self.missing = missing;
        self
    }

    /// Sets the time matching.
    pub fn with_time_match(mut self, time_match: TimeMatch) -> Self {
        self.time_match = time_match;
        self
    }
}

/// Misfit contribution of one variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableMisfit {
    /// Variable keyword.
    pub keyword: String,
    /// Sum of weighted deviations.
    pub misfit: f64,
    /// Observations that were matched.
    pub evaluated: usize,
    /// Observations skipped for missing data.
    pub skipped: usize,
}

/// Misfit of one well.
#[derive(Debug, Clone, PartialEq)]
pub struct MisfitResult {
    /// Sum over all variables.
    pub misfit: f64,
    /// Observations that were matched.
    pub evaluated: usize,
    /// Observations skipped for missing data.
    pub skipped: usize,
    /// True if any observation was skipped.
    pub partial: bool,
    /// Breakdown in the order of the observation vectors.
    pub per_variable: Vec<VariableMisfit>,
}

/// Observations of one well for an aggregate evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct WellObservations {
    /// Well name.
    pub well: String,
    /// Weight of this well in the total.
    pub weight: f64,
    /// Observation vectors.
    pub vectors: Vec<ObservationVector>,
}

impl WellObservations {
    /// Creates observations with weight 1.
    pub fn new(well: impl Into<String>, vectors: Vec<ObservationVector>) -> Self {
        Self {
            well: well.into(),
            weight: 1.0,
            vectors,
        }
    }

    /// Sets the weight of this well.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

/// Misfit of one well inside an aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct WellMisfit {
    /// Well name.
    pub well: String,
    /// Weight applied to `result.misfit` in the total.
    pub weight: f64,
    /// Evaluation of the well.
    pub result: MisfitResult,
}

/// Misfit over several wells.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateMisfit {
    /// `Σ weight · misfit` over wells.
    pub total: f64,
    /// Per-well breakdown, in input order.
    pub per_well: Vec<WellMisfit>,
    /// True if any well result is partial.
    pub partial: bool,
}

fn match_step(set: &SummarySet, at: ObservationTime, time_match: TimeMatch) -> Option<usize> {
    match at {
        ObservationTime::Step(step) => (step < set.step_count()).then_some(step),
        ObservationTime::Time(time) => {
            let index = set.time_index();
            match time_match {
                TimeMatch::Exact => index.step_at_time(time.timestamp()),
                TimeMatch::Nearest => index.nearest_step(time.timestamp()),
            }
        }
    }
}

fn eval_vector(
    set: &SummarySet,
    key: &VarKey,
    vector: &ObservationVector,
    config: &MisfitConfig,
) -> Result<VariableMisfit> {
    let slot = set.catalog().resolve(key)?;
    let mut result = VariableMisfit {
        keyword: vector.keyword.clone(),
        misfit: 0.0,
        evaluated: 0,
        skipped: 0,
    };

    for observation in &vector.observations {
        let simulated = match match_step(set, observation.at, config.time_match) {
            Some(step) => set.values().get(step, slot)?,
            None => None,
        };
        let Some(simulated) = simulated else {
            match config.missing {
                MissingData::Abort => {
                    return Err(SummaryError::MissingSimulatedData {
                        key: key.to_string(),
                        at: observation.at.to_string(),
                    })
                }
                MissingData::Skip => {
                    result.skipped += 1;
                    continue;
                }
            }
        };

        let diff = simulated - observation.value;
        let deviation = match config.deviation {
            Deviation::Squared => diff * diff,
            Deviation::Absolute => diff.abs(),
        };
        result.misfit += observation.weight * deviation;
        result.evaluated += 1;
    }
    Ok(result)
}

/// Evaluates the misfit of one well.
///
/// # Errors
///
/// Returns `SummaryError::KeyNotFound` if the well lacks an observed
/// variable and `SummaryError::MissingSimulatedData` for an unmatched
/// observation under [`MissingData::Abort`].
pub fn eval_misfit(
    set: &SummarySet,
    well: &str,
    vectors: &[ObservationVector],
    config: &MisfitConfig,
) -> Result<MisfitResult> {
    let per_variable = vectors
        .iter()
        .map(|vector| eval_vector(set, &VarKey::well(vector.keyword.as_str(), well), vector, config))
        .collect::<Result<Vec<_>>>()?;

    let skipped: usize = per_variable.iter().map(|v| v.skipped).sum();
    let evaluated: usize = per_variable.iter().map(|v| v.evaluated).sum();
    if skipped > 0 {
        warn!(
            "Misfit for {} skipped {} of {} observations without simulated data",
            well,
            skipped,
            skipped + evaluated
        );
    }

    Ok(MisfitResult {
        misfit: per_variable.iter().map(|v| v.misfit).sum(),
        evaluated,
        skipped,
        partial: skipped > 0,
        per_variable,
    })
}

/// Evaluates several wells and sums their weighted misfits.
pub fn eval_aggregate_misfit(
    set: &SummarySet,
    wells: &[WellObservations],
    config: &MisfitConfig,
) -> Result<AggregateMisfit> {
    let per_well = wells
        .iter()
        .map(|obs| {
            Ok(WellMisfit {
                well: obs.well.clone(),
                weight: obs.weight,
                result: eval_misfit(set, &obs.well, &obs.vectors, config)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(AggregateMisfit {
        total: per_well.iter().map(|w| w.weight * w.result.misfit).sum(),
        partial: per_well.iter().any(|w| w.result.partial),
        per_well,
    })
}
