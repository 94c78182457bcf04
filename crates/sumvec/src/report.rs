//! Column-aligned text dump of selected variables.
//!
//! ```text
//!       DATE          DAYS       WOPR:W1          FOPT
//!                     DAYS       SM3/DAY           SM3
//! 2000-01-02          1.00       10.0000     1000.0000
//! 2000-01-03          2.00             -     1500.0000
//! ```

use crate::analytics::max_min::validate_range;
use crate::error::Result;
use crate::key::VarKey;
use crate::store::SummarySet;
use std::io::Write;
use std::ops::RangeInclusive;

const DATE_WIDTH: usize = 10;
const MIN_WIDTH: usize = 12;
const ABSENT_CELL: &str = "-";

/// Writes a table of `keys` over an inclusive step range: date, elapsed days,
/// then one column per key. Absent cells print as `-`.
///
/// # Errors
///
/// Returns `SummaryError::KeyNotFound` for an unknown key,
/// `SummaryError::OutOfRange` for an invalid range and
/// `SummaryError::IoError` if writing fails.
pub fn write_report<W: Write>(
    set: &SummarySet,
    writer: &mut W,
    keys: &[VarKey],
    steps: RangeInclusive<usize>,
) -> Result<()> {
    let slots = keys
        .iter()
        .map(|key| set.catalog().resolve(key))
        .collect::<Result<Vec<_>>>()?;
    let steps = validate_range(set, &steps)?;

    let labels: Vec<String> = keys.iter().map(VarKey::to_string).collect();
    let units = slots
        .iter()
        .map(|&slot| Ok(set.catalog().variable(slot)?.unit.as_str()))
        .collect::<Result<Vec<_>>>()?;
    let widths: Vec<usize> = labels
        .iter()
        .zip(&units)
        .map(|(label, unit)| label.len().max(unit.len()).max(MIN_WIDTH))
        .collect();

    write!(writer, "{:>DATE_WIDTH$}  {:>MIN_WIDTH$}", "DATE", "DAYS")?;
    for (label, &width) in labels.iter().zip(&widths) {
        write!(writer, "  {label:>width$}")?;
    }
    writeln!(writer)?;

    write!(writer, "{:>DATE_WIDTH$}  {:>MIN_WIDTH$}", "", "DAYS")?;
    for (unit, &width) in units.iter().zip(&widths) {
        write!(writer, "  {unit:>width$}")?;
    }
    writeln!(writer)?;

    for step in steps {
        let date = set.sim_time(step)?.format("%Y-%m-%d");
        write!(writer, "{:>DATE_WIDTH$}  {:>MIN_WIDTH$.2}", date.to_string(), set.sim_days(step)?)?;
        for (&slot, &width) in slots.iter().zip(&widths) {
            match set.values().get(step, slot)? {
                Some(value) => write!(writer, "  {value:>width$.4}")?,
                None => write!(writer, "  {ABSENT_CELL:>width$}")?,
            }
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Expands wells × keywords into well keys, grouped by well.
pub fn well_report_keys<S: AsRef<str>>(wells: &[S], keywords: &[&str]) -> Vec<VarKey> {
    wells
        .iter()
        .flat_map(|well| {
            keywords
                .iter()
                .map(move |keyword| VarKey::well(*keyword, well.as_ref()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SummaryError;
    use crate::store::{DataBatch, StepStamp, ABSENT};
    use chrono::DateTime;

    fn set() -> SummarySet {
        let start = 946_684_800;
        let mut set = SummarySet::new("CASE", DateTime::from_timestamp(start, 0).unwrap());
        set.register(VarKey::well("WOPR", "W1"), "SM3/DAY").unwrap();
        set.register(VarKey::field("FOPT"), "SM3").unwrap();
        let mut batch = DataBatch::new();
        batch.push(StepStamp::new(1, 1, start + 86_400), vec![10.0, 1000.0]);
        batch.push(StepStamp::new(2, 1, start + 2 * 86_400), vec![ABSENT, 1500.0]);
        set.extend(batch, true).unwrap();
        set
    }

    #[test]
    fn test_report_layout() {
        let set = set();
        let keys = [VarKey::well("WOPR", "W1"), VarKey::field("FOPT")];
        let mut out = Vec::new();
        write_report(&set, &mut out, &keys, 0..=1).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].trim_start().starts_with("DATE"));
        assert!(lines[0].ends_with("FOPT"));
        assert!(lines[1].contains("SM3/DAY"));
        assert!(lines[2].starts_with("2000-01-02"));
        assert!(lines[2].contains("10.0000"));
        assert!(lines[3].contains(" -  "));
        assert!(lines[3].ends_with("1500.0000"));
        assert!(lines.iter().all(|line| line.len() == lines[0].len()));
    }

    #[test]
    fn test_report_errors() {
        let set = set();
        let mut out = Vec::new();
        let result = write_report(&set, &mut out, &[VarKey::field("FWPT")], 0..=1);
        assert!(matches!(result, Err(SummaryError::KeyNotFound(_))));
        let result = write_report(&set, &mut out, &[VarKey::field("FOPT")], 0..=2);
        assert!(matches!(result, Err(SummaryError::OutOfRange { .. })));
        assert!(out.is_empty());
    }

    #[test]
    fn test_well_report_keys() {
        let keys = well_report_keys(&["W1", "W2"], &["WOPR", "WWCT"]);
        let text: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(text, ["WOPR:W1", "WWCT:W1", "WOPR:W2", "WWCT:W2"]);
    }
}
