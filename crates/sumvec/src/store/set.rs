//! The summary set: key catalog, time index and value store kept in lockstep.

use crate::error::{Result, SummaryError};
use crate::key::{KeyCatalog, VarKey};
use crate::store::time_index::{to_datetime, StepStamp, TimeIndex};
use crate::store::values::ValueStore;
use crate::store::Timestamp;
use chrono::{DateTime, Utc};
use std::ops::Range;
use tracing::{debug, warn};

/// Persisted representation of a summary case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum FormatMode {
    /// Binary files.
    #[default]
    Binary = 0,
    /// Formatted (text) files.
    Formatted = 1,
}

/// Header metadata of a summary case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryHeader {
    /// Case name (file base name).
    pub case_name: String,
    /// Simulation start time.
    pub start_time: Timestamp,
    /// Format the case was loaded from or will be saved in.
    pub format: FormatMode,
    /// Whether data lives in one unified file rather than per-report batches.
    pub unified: bool,
}

/// Header contents for building a set programmatically.
#[derive(Debug, Clone)]
pub struct HeaderMetadata {
    /// Simulation start time.
    pub start_time: DateTime<Utc>,
    /// Wells to declare, in order.
    pub well_names: Vec<String>,
    /// Groups to declare, in order.
    pub group_names: Vec<String>,
    /// Variables and their units, in slot order.
    pub variables: Vec<(VarKey, String)>,
}

/// One row of a data batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRow {
    /// Step position.
    pub stamp: StepStamp,
    /// One value per slot; NaN marks an absent cell.
    pub values: Vec<f64>,
}

/// A batch of steps to append to a [`SummarySet`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataBatch {
    /// Units declared by the batch, one per slot, if the source carries them.
    pub units: Option<Vec<String>>,
    /// Rows in step order.
    pub rows: Vec<BatchRow>,
}

impl DataBatch {
    /// Creates an empty batch without unit declarations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty batch declaring units.
    pub fn with_units(units: Vec<String>) -> Self {
        Self {
            units: Some(units),
            rows: Vec::new(),
        }
    }

    /// Adds a row.
    pub fn push(&mut self, stamp: StepStamp, values: Vec<f64>) {
        self.rows.push(BatchRow { stamp, values });
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the batch has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A store of summary vectors.
///
/// Owns the key catalog, the time index and the value store. The time index
/// and the value store only grow through [`SummarySet::extend`], so both
/// always report the same step count.
#[derive(Debug, Clone)]
pub struct SummarySet {
    header: SummaryHeader,
    catalog: KeyCatalog,
    time: TimeIndex,
    values: ValueStore,
}

impl SummarySet {
    /// Creates an empty set.
    pub fn new(case_name: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self::from_parts(
            SummaryHeader {
                case_name: case_name.into(),
                start_time: start_time.timestamp(),
                format: FormatMode::default(),
                unified: true,
            },
            KeyCatalog::new(),
        )
    }

    /// Creates a set without data from a header and catalog.
    pub fn from_parts(header: SummaryHeader, catalog: KeyCatalog) -> Self {
        let values = ValueStore::new(catalog.len());
        Self {
            header,
            catalog,
            time: TimeIndex::new(),
            values,
        }
    }

    /// Applies header metadata: start time, declared wells and groups, and
    /// variables with their units.
    ///
    /// Existing registrations are kept; new variables get absent cells for
    /// any steps already loaded. The update is all-or-nothing.
    ///
    /// # Errors
    ///
    /// Returns `SummaryError::InvalidKey` or `SummaryError::UnitMismatch`
    /// from registration, and `SummaryError::OutOfOrderData` if the start
    /// time is after the first loaded step.
    pub fn set_header_metadata(&mut self, meta: HeaderMetadata) -> Result<()> {
        let start_time = meta.start_time.timestamp();
        if let Some(first) = self.time.steps().first() {
            if first.time < start_time {
                return Err(SummaryError::OutOfOrderData(format!(
                    "start time {} after first step time {}",
                    start_time, first.time
                )));
            }
        }

        let mut catalog = self.catalog.clone();
        for well in &meta.well_names {
            catalog.register_well(well)?;
        }
        for group in &meta.group_names {
            catalog.register_group(group)?;
        }
        for (key, unit) in meta.variables {
            catalog.register(key, unit)?;
        }

        let added = catalog.len() - self.catalog.len();
        self.catalog = catalog;
        self.values.add_columns(added);
        self.header.start_time = start_time;
        Ok(())
    }

    /// Registers one variable and returns its slot.
    pub fn register(&mut self, key: VarKey, unit: impl Into<String>) -> Result<usize> {
        let before = self.catalog.len();
        let slot = self.catalog.register(key, unit)?;
        self.values.add_columns(self.catalog.len() - before);
        Ok(slot)
    }

    /// Appends a batch of steps.
    ///
    /// The batch is validated completely before anything is changed: on
    /// error the set is left untouched. With `strict_units` a unit
    /// disagreement fails; otherwise it is logged and the header unit wins.
    ///
    /// Returns the range of step indices that were added.
    ///
    /// # Errors
    ///
    /// Returns `SummaryError::CorruptData` if the batch width does not match
    /// the catalog, `SummaryError::UnitMismatch` for conflicting units under
    /// `strict_units`, and `SummaryError::OutOfOrderData` if the steps do not
    /// follow the existing ones or start before the simulation start time.
    pub fn extend(&mut self, batch: DataBatch, strict_units: bool) -> Result<Range<usize>> {
        let columns = self.catalog.len();

        if let Some(units) = &batch.units {
            if units.len() != columns {
                return Err(SummaryError::corrupt(format!(
                    "batch declares {} units for {} variables",
                    units.len(),
                    columns
                )));
            }
            for (variable, unit) in self.catalog.variables().iter().zip(units) {
                if variable.unit.trim() == unit.trim() {
                    continue;
                }
                if strict_units {
                    return Err(SummaryError::UnitMismatch {
                        key: variable.key.to_string(),
                        expected: variable.unit.clone(),
                        found: unit.clone(),
                    });
                }
                warn!(
                    "Unit mismatch for {}: header has {:?}, batch has {:?}",
                    variable.key, variable.unit, unit
                );
            }
        }

        if let Some(row) = batch.rows.iter().find(|row| row.values.len() != columns) {
            return Err(SummaryError::corrupt(format!(
                "ministep {} has {} values for {} variables",
                row.stamp.ministep,
                row.values.len(),
                columns
            )));
        }

        let stamps: Vec<StepStamp> = batch.rows.iter().map(|row| row.stamp).collect();
        self.time.check_append(&stamps)?;
        if let Some(first) = stamps.first().filter(|_| self.time.is_empty()) {
            if first.time < self.header.start_time {
                return Err(SummaryError::OutOfOrderData(format!(
                    "time {} of ministep {} before start time {}",
                    first.time, first.ministep, self.header.start_time
                )));
            }
        }

        let first = self.values.step_count();
        self.time.append(&stamps);
        self.values.append_rows(stamps.len());
        for (offset, row) in batch.rows.into_iter().enumerate() {
            for (slot, value) in row.values.into_iter().enumerate() {
                self.values.set(first + offset, slot, value)?;
            }
        }

        debug_assert_eq!(self.time.step_count(), self.values.step_count());
        debug!(
            "Appended {} steps to {} (total {})",
            stamps.len(),
            self.header.case_name,
            self.values.step_count()
        );
        Ok(first..self.values.step_count())
    }

    /// Releases the data section, keeping header and catalog.
    pub fn clear_data(&mut self) {
        self.time.clear();
        self.values.clear();
    }

    /// Header metadata.
    pub fn header(&self) -> &SummaryHeader {
        &self.header
    }

    /// Key catalog.
    pub fn catalog(&self) -> &KeyCatalog {
        &self.catalog
    }

    /// Time index.
    pub fn time_index(&self) -> &TimeIndex {
        &self.time
    }

    /// Value store.
    pub fn values(&self) -> &ValueStore {
        &self.values
    }

    /// Number of loaded steps.
    pub fn step_count(&self) -> usize {
        self.values.step_count()
    }

    /// Case name.
    pub fn case_name(&self) -> &str {
        &self.header.case_name
    }

    /// Format the set was loaded from or will be saved in.
    pub fn format(&self) -> FormatMode {
        self.header.format
    }

    /// Sets the format of the set.
    ///
    /// Saves made with [`SaveOptions::for_set`](crate::codec::SaveOptions::for_set)
    /// use it.
    pub fn set_format(&mut self, format: FormatMode) {
        self.header.format = format;
    }

    pub(crate) fn set_unified(&mut self, unified: bool) {
        self.header.unified = unified;
    }

    /// Simulation start time.
    pub fn start_time(&self) -> Result<DateTime<Utc>> {
        to_datetime(self.header.start_time)
    }

    /// Well names in first-registration order.
    pub fn well_names(&self) -> &[String] {
        self.catalog.well_names()
    }

    /// Owned copy of the well names.
    pub fn well_names_copy(&self) -> Vec<String> {
        self.catalog.well_names().to_vec()
    }

    /// Group names in first-registration order.
    pub fn group_names(&self) -> &[String] {
        self.catalog.group_names()
    }

    /// Number of distinct wells.
    pub fn num_wells(&self) -> usize {
        self.catalog.num_wells()
    }

    /// Number of distinct groups.
    pub fn num_groups(&self) -> usize {
        self.catalog.num_groups()
    }

    /// Number of distinct regions.
    pub fn num_regions(&self) -> usize {
        self.catalog.num_regions()
    }

    /// Unit of a registered variable.
    pub fn unit(&self, key: &VarKey) -> Result<&str> {
        self.catalog.unit(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::values::ABSENT;

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(946_684_800, 0).unwrap()
    }

    fn two_var_set() -> SummarySet {
        let mut set = SummarySet::new("CASE", start());
        set.set_header_metadata(HeaderMetadata {
            start_time: start(),
            well_names: vec!["W1".to_string()],
            group_names: vec!["G1".to_string()],
            variables: vec![
                (VarKey::well("WOPR", "W1"), "SM3/DAY".to_string()),
                (VarKey::field("FOPT"), "SM3".to_string()),
            ],
        })
        .unwrap();
        set
    }

    fn batch(rows: &[(u32, u32, i64, [f64; 2])]) -> DataBatch {
        let mut batch = DataBatch::new();
        for &(m, r, t, values) in rows {
            batch.push(StepStamp::new(m, r, t), values.to_vec());
        }
        batch
    }

    #[test]
    fn test_extend_grows_in_lockstep() {
        let mut set = two_var_set();
        let t0 = start().timestamp();
        let added = set
            .extend(batch(&[(1, 1, t0, [1.0, 2.0]), (2, 1, t0 + 10, [3.0, ABSENT])]), true)
            .unwrap();
        assert_eq!(added, 0..2);
        assert_eq!(set.step_count(), 2);
        assert_eq!(set.time_index().step_count(), 2);
        assert_eq!(set.values().get(1, 0).unwrap(), Some(3.0));
        assert_eq!(set.values().get(1, 1).unwrap(), None);
    }

    #[test]
    fn test_extend_out_of_order_leaves_set_unmodified() {
        let mut set = two_var_set();
        let t0 = start().timestamp();
        set.extend(batch(&[(1, 1, t0 + 100, [1.0, 2.0])]), true).unwrap();

        let result = set.extend(batch(&[(2, 1, t0 + 50, [5.0, 6.0])]), true);
        assert!(matches!(result, Err(SummaryError::OutOfOrderData(_))));
        assert_eq!(set.step_count(), 1);
        assert_eq!(set.time_index().step_count(), 1);
        assert_eq!(set.values().get(0, 0).unwrap(), Some(1.0));
    }

    #[test]
    fn test_extend_rejects_wrong_width() {
        let mut set = two_var_set();
        let mut bad = DataBatch::new();
        bad.push(StepStamp::new(1, 1, 0), vec![1.0]);
        assert!(matches!(set.extend(bad, true), Err(SummaryError::CorruptData(_))));
        assert_eq!(set.step_count(), 0);
    }

    #[test]
    fn test_extend_unit_mismatch() {
        let mut set = two_var_set();
        let t0 = start().timestamp();
        let make = || {
            let mut b = DataBatch::with_units(vec!["STB/DAY".to_string(), "SM3".to_string()]);
            b.push(StepStamp::new(1, 1, t0), vec![1.0, 2.0]);
            b
        };

        let result = set.extend(make(), true);
        assert!(matches!(result, Err(SummaryError::UnitMismatch { .. })));
        assert_eq!(set.step_count(), 0);

        set.extend(make(), false).unwrap();
        assert_eq!(set.step_count(), 1);
        assert_eq!(set.unit(&VarKey::well("WOPR", "W1")).unwrap(), "SM3/DAY");
    }

    #[test]
    fn test_register_after_data_widens_table() {
        let mut set = two_var_set();
        let t0 = start().timestamp();
        set.extend(batch(&[(1, 1, t0, [1.0, 2.0])]), true).unwrap();

        let slot = set.register(VarKey::group("GOPR", "G1"), "SM3/DAY").unwrap();
        assert_eq!(slot, 2);
        assert_eq!(set.values().get(0, 2).unwrap(), None);
        assert_eq!(set.values().get(0, 1).unwrap(), Some(2.0));
    }

    #[test]
    fn test_clear_data_keeps_header() {
        let mut set = two_var_set();
        let t0 = start().timestamp();
        set.extend(batch(&[(1, 1, t0, [1.0, 2.0])]), true).unwrap();
        set.clear_data();

        assert_eq!(set.step_count(), 0);
        assert_eq!(set.catalog().len(), 2);
        assert_eq!(set.well_names(), ["W1"]);

        set.extend(batch(&[(1, 1, t0, [7.0, 8.0])]), true).unwrap();
        assert_eq!(set.values().get(0, 0).unwrap(), Some(7.0));
    }

    #[test]
    fn test_header_start_after_data_rejected() {
        let mut set = two_var_set();
        let t0 = start().timestamp();
        set.extend(batch(&[(1, 1, t0, [1.0, 2.0])]), true).unwrap();

        let later = DateTime::from_timestamp(t0 + 1, 0).unwrap();
        let result = set.set_header_metadata(HeaderMetadata {
            start_time: later,
            well_names: vec![],
            group_names: vec![],
            variables: vec![],
        });
        assert!(matches!(result, Err(SummaryError::OutOfOrderData(_))));
    }

    #[test]
    fn test_extend_before_start_rejected() {
        let mut set = two_var_set();
        let t0 = start().timestamp();

        let result = set.extend(batch(&[(1, 1, t0 - 1, [1.0, 2.0])]), true);
        assert!(matches!(result, Err(SummaryError::OutOfOrderData(_))));
        assert_eq!(set.step_count(), 0);

        set.extend(batch(&[(1, 1, t0, [1.0, 2.0])]), true).unwrap();
        assert_eq!(set.sim_days(0).unwrap(), 0.0);
    }

    #[test]
    fn test_extend_rejects_uncalendared_time() {
        let mut set = two_var_set();
        let t0 = start().timestamp();
        let result = set.extend(batch(&[(1, 1, t0, [0.0; 2]), (2, 1, i64::MAX, [0.0; 2])]), true);
        assert!(matches!(result, Err(SummaryError::CorruptData(_))));
        assert_eq!(set.step_count(), 0);
    }

    #[test]
    fn test_header_metadata_is_all_or_nothing() {
        let mut set = two_var_set();
        let result = set.set_header_metadata(HeaderMetadata {
            start_time: start(),
            well_names: vec!["W2".to_string()],
            group_names: vec![],
            variables: vec![
                (VarKey::well("WWPR", "W2"), "SM3/DAY".to_string()),
                (VarKey::well("WOPR", "W1"), "STB/DAY".to_string()),
            ],
        });
        assert!(matches!(result, Err(SummaryError::UnitMismatch { .. })));
        assert_eq!(set.catalog().len(), 2);
        assert_eq!(set.num_wells(), 1);
    }

    #[test]
    fn test_name_accessors() {
        let set = two_var_set();
        assert_eq!(set.case_name(), "CASE");
        assert_eq!(set.well_names_copy(), vec!["W1".to_string()]);
        assert_eq!(set.group_names(), ["G1"]);
        assert_eq!(set.num_groups(), 1);
        assert_eq!(set.num_regions(), 0);
        assert_eq!(set.start_time().unwrap(), start());
    }
}
