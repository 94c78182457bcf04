//! Two-level time index: continuous steps grouped into report steps.

use crate::error::{Result, SummaryError};
use crate::store::Timestamp;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Seconds per simulated day.
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Position of a step as written by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepStamp {
    /// Global step counter of the simulator.
    pub ministep: u32,
    /// Report step the ministep belongs to.
    pub report_step: u32,
    /// Calendar time in seconds since the Unix epoch.
    pub time: Timestamp,
}

impl StepStamp {
    /// Creates a new stamp.
    pub fn new(ministep: u32, report_step: u32, time: Timestamp) -> Self {
        Self {
            ministep,
            report_step,
            time,
        }
    }
}

/// A row of the value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeStep {
    /// Global step counter of the simulator.
    pub ministep: u32,
    /// Report step.
    pub report_step: u32,
    /// Position within the report step, starting at 0.
    pub sub_step: u32,
    /// Calendar time in seconds since the Unix epoch.
    pub time: Timestamp,
}

impl TimeStep {
    /// Returns the stamp this step was appended from.
    pub fn stamp(&self) -> StepStamp {
        StepStamp::new(self.ministep, self.report_step, self.time)
    }
}

/// Maps step indices to calendar time and report steps.
#[derive(Debug, Clone, Default)]
pub struct TimeIndex {
    steps: Vec<TimeStep>,
    /// Report step -> inclusive (first, last) step index.
    reports: BTreeMap<u32, (usize, usize)>,
}

impl TimeIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of steps.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if no step was appended.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the step at an index.
    ///
    /// # Errors
    ///
    /// Returns `SummaryError::OutOfRange` if `step >= step_count()`.
    pub fn step(&self, step: usize) -> Result<&TimeStep> {
        self.steps
            .get(step)
            .ok_or_else(|| SummaryError::out_of_range("step", step, self.steps.len()))
    }

    /// All steps in order.
    pub fn steps(&self) -> &[TimeStep] {
        &self.steps
    }

    /// Last appended step.
    pub fn last(&self) -> Option<&TimeStep> {
        self.steps.last()
    }

    /// Raw timestamp of a step.
    pub fn timestamp_at(&self, step: usize) -> Result<Timestamp> {
        Ok(self.step(step)?.time)
    }

    /// Calendar time of a step.
    pub fn time_at(&self, step: usize) -> Result<DateTime<Utc>> {
        to_datetime(self.timestamp_at(step)?)
    }

    /// Inclusive range of steps belonging to a report step.
    ///
    /// # Errors
    ///
    /// Returns `SummaryError::ReportStepNotFound` if the report step was
    /// never observed.
    pub fn report_range(&self, report_step: u32) -> Result<(usize, usize)> {
        self.reports
            .get(&report_step)
            .copied()
            .ok_or(SummaryError::ReportStepNotFound(report_step))
    }

    /// Observed report steps in increasing order.
    pub fn report_steps(&self) -> impl Iterator<Item = u32> + '_ {
        self.reports.keys().copied()
    }

    /// First observed report step.
    pub fn first_report(&self) -> Option<u32> {
        self.reports.keys().next().copied()
    }

    /// Last observed report step.
    pub fn last_report(&self) -> Option<u32> {
        self.reports.keys().next_back().copied()
    }

    /// Finds the step index of a ministep.
    pub fn index_of_ministep(&self, ministep: u32) -> Result<usize> {
        self.steps
            .binary_search_by_key(&ministep, |s| s.ministep)
            .map_err(|_| SummaryError::MinistepNotFound(ministep))
    }

    /// Last step whose time equals `time` exactly.
    pub fn step_at_time(&self, time: Timestamp) -> Option<usize> {
        let after = self.steps.partition_point(|s| s.time <= time);
        (after > 0 && self.steps[after - 1].time == time).then(|| after - 1)
    }

    /// Step closest in time to `time`; the earlier step wins ties.
    pub fn nearest_step(&self, time: Timestamp) -> Option<usize> {
        if self.steps.is_empty() {
            return None;
        }
        if let Some(exact) = self.step_at_time(time) {
            return Some(exact);
        }
        let after = self.steps.partition_point(|s| s.time <= time);
        if after == 0 {
            return Some(0);
        }
        if after == self.steps.len() {
            return Some(after - 1);
        }
        let before_gap = time.abs_diff(self.steps[after - 1].time);
        let after_gap = self.steps[after].time.abs_diff(time);
        Some(if before_gap <= after_gap { after - 1 } else { after })
    }

    /// Checks that `stamps` may be appended after the existing steps.
    ///
    /// Ministeps must strictly increase; report steps and times must not
    /// decrease. Every time must be a representable calendar time.
    ///
    /// # Errors
    ///
    /// Returns `SummaryError::OutOfOrderData` naming the first offending stamp,
    /// or `SummaryError::CorruptData` for a time outside the calendar range.
    pub fn check_append(&self, stamps: &[StepStamp]) -> Result<()> {
        let mut prev = self.steps.last().map(TimeStep::stamp);
        for stamp in stamps {
            to_datetime(stamp.time)?;
            if let Some(prev) = prev {
                if stamp.ministep <= prev.ministep {
                    return Err(SummaryError::OutOfOrderData(format!(
                        "ministep {} after ministep {}",
                        stamp.ministep, prev.ministep
                    )));
                }
                if stamp.time < prev.time {
                    return Err(SummaryError::OutOfOrderData(format!(
                        "time {} of ministep {} before time {}",
                        stamp.time, stamp.ministep, prev.time
                    )));
                }
                if stamp.report_step < prev.report_step {
                    return Err(SummaryError::OutOfOrderData(format!(
                        "report step {} of ministep {} after report step {}",
                        stamp.report_step, stamp.ministep, prev.report_step
                    )));
                }
            }
            prev = Some(*stamp);
        }
        Ok(())
    }

    /// Appends stamps already accepted by [`TimeIndex::check_append`].
    pub(crate) fn append(&mut self, stamps: &[StepStamp]) {
        for stamp in stamps {
            let index = self.steps.len();
            let sub_step = match self.steps.last() {
                Some(last) if last.report_step == stamp.report_step => last.sub_step + 1,
                _ => 0,
            };
            self.steps.push(TimeStep {
                ministep: stamp.ministep,
                report_step: stamp.report_step,
                sub_step,
                time: stamp.time,
            });
            self.reports
                .entry(stamp.report_step)
                .and_modify(|range| range.1 = index)
                .or_insert((index, index));
        }
    }

    /// Drops all steps.
    pub(crate) fn clear(&mut self) {
        self.steps.clear();
        self.reports.clear();
    }
}

/// Converts a raw timestamp to calendar time.
///
/// # Errors
///
/// Returns `SummaryError::CorruptData` if the timestamp is outside the
/// representable calendar range.
pub fn to_datetime(time: Timestamp) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(time, 0)
        .ok_or_else(|| SummaryError::corrupt(format!("timestamp {time} out of calendar range")))
}
