//! Row-major value table (step × slot).

use crate::error::{Result, SummaryError};
use std::ops::Range;

/// Marker stored in cells that were never set.
///
/// Any NaN cell reads back as absent.
pub const ABSENT: f64 = f64::NAN;

/// Returns true if a raw cell value is the absent marker.
#[inline]
pub fn is_absent(value: f64) -> bool {
    value.is_nan()
}

#[inline]
fn cell(value: f64) -> Option<f64> {
    (!is_absent(value)).then_some(value)
}

/// Two-dimensional numeric table holding measurement values.
#[derive(Debug, Clone, Default)]
pub struct ValueStore {
    columns: usize,
    rows: usize,
    cells: Vec<f64>,
}

impl ValueStore {
    /// Creates an empty table with the given number of columns.
    pub fn new(columns: usize) -> Self {
        Self {
            columns,
            rows: 0,
            cells: Vec::new(),
        }
    }

    /// Number of steps.
    pub fn step_count(&self) -> usize {
        self.rows
    }

    /// Number of slots.
    pub fn columns(&self) -> usize {
        self.columns
    }

    fn offset(&self, step: usize, slot: usize) -> Result<usize> {
        if step >= self.rows {
            return Err(SummaryError::out_of_range("step", step, self.rows));
        }
        if slot >= self.columns {
            return Err(SummaryError::out_of_range("slot", slot, self.columns));
        }
        Ok(step * self.columns + slot)
    }

    /// Returns the value of a cell, `None` if it is absent.
    ///
    /// # Errors
    ///
    /// Returns `SummaryError::OutOfRange` if either index is invalid.
    pub fn get(&self, step: usize, slot: usize) -> Result<Option<f64>> {
        let offset = self.offset(step, slot)?;
        Ok(cell(self.cells[offset]))
    }

    /// Returns the raw cells of one step, absent cells as NaN.
    pub fn row(&self, step: usize) -> Result<&[f64]> {
        if step >= self.rows {
            return Err(SummaryError::out_of_range("step", step, self.rows));
        }
        let start = step * self.columns;
        Ok(&self.cells[start..start + self.columns])
    }

    /// Iterates over one slot across a step range.
    ///
    /// # Errors
    ///
    /// Returns `SummaryError::OutOfRange` if the slot or the range end is
    /// invalid.
    pub fn column(
        &self,
        slot: usize,
        steps: Range<usize>,
    ) -> Result<impl Iterator<Item = Option<f64>> + '_> {
        if slot >= self.columns {
            return Err(SummaryError::out_of_range("slot", slot, self.columns));
        }
        if steps.end > self.rows {
            return Err(SummaryError::out_of_range("step", steps.end, self.rows));
        }
        let columns = self.columns;
        Ok(steps.map(move |step| cell(self.cells[step * columns + slot])))
    }

    /// Sets a cell.
    pub(crate) fn set(&mut self, step: usize, slot: usize, value: f64) -> Result<()> {
        let offset = self.offset(step, slot)?;
        self.cells[offset] = value;
        Ok(())
    }

    /// Grows the table by `count` absent rows.
    ///
    /// Only [`crate::SummarySet::extend`] calls this, together with the time
    /// index.
    pub(crate) fn append_rows(&mut self, count: usize) {
        self.rows += count;
        self.cells.resize(self.rows * self.columns, ABSENT);
    }

    /// Adds `count` absent columns, relaying out existing rows.
    pub(crate) fn add_columns(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        let new_columns = self.columns + count;
        if self.rows > 0 {
            let mut cells = Vec::with_capacity(self.rows * new_columns);
            for step in 0..self.rows {
                let start = step * self.columns;
                cells.extend_from_slice(&self.cells[start..start + self.columns]);
                cells.extend(std::iter::repeat(ABSENT).take(count));
            }
            self.cells = cells;
        }
        self.columns = new_columns;
    }

    /// Drops all rows, keeping the column count.
    pub(crate) fn clear(&mut self) {
        self.rows = 0;
        self.cells.clear();
    }
}
