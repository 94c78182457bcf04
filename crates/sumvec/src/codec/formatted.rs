//! Formatted (text) header and data files.
//!
//! Records are tab-separated lines. A header file:
//!
//! ```text
//! FSMSPEC 1
//! CASE    NORNE
//! START   2000-01-01T00:00:00+00:00
//! UNIFIED 1
//! WELLS   2
//! OP_1
//! OP_2
//! GROUPS  0
//! KEYS    1
//! WELL    WOPR    OP_1    0       SM3/DAY
//! END
//! ```
//!
//! A data file lists one step per line: ministep, report step, time in
//! seconds, then one value per slot with `*` for absent cells.

use crate::error::{Result, SummaryError};
use crate::key::{validate_text, KeyCatalog, VarCategory, VarKey};
use crate::store::{
    is_absent, to_datetime, DataBatch, FormatMode, StepStamp, SummaryHeader, SummarySet, TimeStep,
    ABSENT,
};
use chrono::DateTime;
use std::fmt::{self, Write as _};
use std::ops::Range;

/// First line of a formatted header file.
pub const HEADER_TAG: &str = "FSMSPEC 1";

/// First line of a formatted data file.
pub const DATA_TAG: &str = "FSMRY 1";

const ABSENT_TEXT: &str = "*";

/// Line reader that reports the line number of malformed records.
struct Lines<'a> {
    lines: std::str::Lines<'a>,
    number: usize,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines(),
            number: 0,
        }
    }

    fn next_line(&mut self) -> Result<&'a str> {
        self.number += 1;
        self.lines
            .next()
            .map(|line| line.trim_end_matches('\r'))
            .ok_or_else(|| SummaryError::corrupt(format!("unexpected end of file at line {}", self.number)))
    }

    fn error(&self, msg: impl std::fmt::Display) -> SummaryError {
        SummaryError::corrupt(format!("line {}: {}", self.number, msg))
    }

    /// Reads a `TAG<TAB>fields...` record.
    fn record(&mut self, tag: &str) -> Result<Vec<&'a str>> {
        let line = self.next_line()?;
        let mut fields = line.split('\t');
        match fields.next() {
            Some(found) if found == tag => Ok(fields.collect()),
            found => Err(self.error(format!("expected {tag}, found {:?}", found.unwrap_or("")))),
        }
    }

    /// Reads a record with exactly one field.
    fn single(&mut self, tag: &str) -> Result<&'a str> {
        let fields = self.record(tag)?;
        match fields.as_slice() {
            [value] => Ok(value),
            _ => Err(self.error(format!("{tag} takes one field, found {}", fields.len()))),
        }
    }

    fn count(&mut self, tag: &str) -> Result<usize> {
        let value = self.single(tag)?;
        value
            .parse()
            .map_err(|_| self.error(format!("invalid {tag} count {value:?}")))
    }

    fn expect(&mut self, tag: &str) -> Result<()> {
        let line = self.next_line()?;
        if line != tag {
            return Err(self.error(format!("expected {tag:?}, found {line:?}")));
        }
        Ok(())
    }

    fn parse<T: std::str::FromStr>(&self, what: &str, value: &str) -> Result<T> {
        value
            .parse()
            .map_err(|_| self.error(format!("invalid {what} {value:?}")))
    }
}

/// Encodes a header file.
///
/// # Errors
///
/// Returns `SummaryError::InvalidKey` if the case name holds a control
/// character and `SummaryError::CorruptData` for a start time outside the
/// calendar range.
pub fn encode_header(header: &SummaryHeader, catalog: &KeyCatalog) -> Result<String> {
    validate_text("case name", &header.case_name)?;
    let start = to_datetime(header.start_time)?.to_rfc3339();
    let mut out = String::new();
    write_header(&mut out, header, &start, catalog).map_err(format_error)?;
    Ok(out)
}

fn write_header(
    out: &mut String,
    header: &SummaryHeader,
    start: &str,
    catalog: &KeyCatalog,
) -> fmt::Result {
    writeln!(out, "{HEADER_TAG}")?;
    writeln!(out, "CASE\t{}", header.case_name)?;
    writeln!(out, "START\t{start}")?;
    writeln!(out, "UNIFIED\t{}", u8::from(header.unified))?;
    writeln!(out, "WELLS\t{}", catalog.num_wells())?;
    for well in catalog.well_names() {
        writeln!(out, "{well}")?;
    }
    writeln!(out, "GROUPS\t{}", catalog.num_groups())?;
    for group in catalog.group_names() {
        writeln!(out, "{group}")?;
    }
    writeln!(out, "KEYS\t{}", catalog.len())?;
    for variable in catalog.variables() {
        let key = &variable.key;
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}",
            key.category().tag(),
            key.keyword(),
            key.name().unwrap_or(""),
            key.number().unwrap_or(0),
            variable.unit
        )?;
    }
    writeln!(out, "END")
}

fn format_error(_: fmt::Error) -> SummaryError {
    SummaryError::corrupt("formatted record could not be written")
}

/// Decodes a formatted header file into an empty set.
///
/// # Errors
///
/// Returns `SummaryError::CorruptData` naming the offending line.
pub fn decode_header(text: &str) -> Result<SummarySet> {
    let mut lines = Lines::new(text);
    lines.expect(HEADER_TAG)?;

    let case_name = lines.single("CASE")?.to_string();
    let start = lines.single("START")?;
    let start_time = DateTime::parse_from_rfc3339(start)
        .map_err(|_| lines.error(format!("invalid start time {start:?}")))?
        .timestamp();
    let unified = match lines.single("UNIFIED")? {
        "0" => false,
        "1" => true,
        other => return Err(lines.error(format!("invalid UNIFIED flag {other:?}"))),
    };

    let mut catalog = KeyCatalog::new();
    for _ in 0..lines.count("WELLS")? {
        catalog.register_well(lines.next_line()?)?;
    }
    for _ in 0..lines.count("GROUPS")? {
        catalog.register_group(lines.next_line()?)?;
    }
    for _ in 0..lines.count("KEYS")? {
        let line = lines.next_line()?;
        let fields: Vec<&str> = line.split('\t').collect();
        let [tag, keyword, name, number, unit] = fields.as_slice() else {
            return Err(lines.error(format!("key record has {} fields, expected 5", fields.len())));
        };
        let category = VarCategory::from_tag(tag)
            .ok_or_else(|| lines.error(format!("unknown category {tag:?}")))?;
        let number: u32 = lines.parse("number", number)?;
        let key = VarKey::from_parts(category, keyword, name, number)?;
        catalog.register(key, *unit)?;
    }
    lines.expect("END")?;

    let header = SummaryHeader {
        case_name,
        start_time,
        format: FormatMode::Formatted,
        unified,
    };
    Ok(SummarySet::from_parts(header, catalog))
}

fn write_value(out: &mut String, value: f64) -> fmt::Result {
    if is_absent(value) {
        out.write_str(ABSENT_TEXT)
    } else {
        // Debug formatting round-trips f64 exactly.
        write!(out, "{value:?}")
    }
}

/// Encodes a range of steps of a set as a formatted data file.
///
/// # Errors
///
/// Returns `SummaryError::OutOfRange` if `steps` reaches past the last step.
pub fn encode_data(set: &SummarySet, steps: Range<usize>) -> Result<String> {
    let rows = steps
        .map(|step| Ok((set.time_index().step(step)?, set.values().row(step)?)))
        .collect::<Result<Vec<_>>>()?;
    let mut out = String::new();
    write_data(&mut out, set.catalog(), &rows).map_err(format_error)?;
    Ok(out)
}

fn write_data(out: &mut String, catalog: &KeyCatalog, rows: &[(&TimeStep, &[f64])]) -> fmt::Result {
    writeln!(out, "{DATA_TAG}")?;
    writeln!(out, "FINGERPRINT\t{:016x}", catalog.fingerprint())?;
    writeln!(out, "COLUMNS\t{}", catalog.len())?;
    out.write_str("UNITS")?;
    for variable in catalog.variables() {
        write!(out, "\t{}", variable.unit)?;
    }
    writeln!(out)?;
    writeln!(out, "STEPS\t{}", rows.len())?;

    for (stamp, values) in rows {
        write!(out, "{}\t{}\t{}", stamp.ministep, stamp.report_step, stamp.time)?;
        for &value in *values {
            out.write_char('\t')?;
            write_value(out, value)?;
        }
        writeln!(out)?;
    }
    writeln!(out, "END")
}

/// Decodes a formatted data file against the catalog it was written for.
///
/// # Errors
///
/// Returns `SummaryError::CorruptData` for malformed lines or a file that
/// belongs to another catalog.
pub fn decode_data(text: &str, catalog: &KeyCatalog) -> Result<DataBatch> {
    let mut lines = Lines::new(text);
    lines.expect(DATA_TAG)?;

    let fingerprint = lines.single("FINGERPRINT")?;
    let fingerprint = u64::from_str_radix(fingerprint, 16)
        .map_err(|_| lines.error(format!("invalid fingerprint {fingerprint:?}")))?;
    if fingerprint != catalog.fingerprint() {
        return Err(lines.error(format!(
            "data written for catalog {:016x}, header catalog is {:016x}",
            fingerprint,
            catalog.fingerprint()
        )));
    }

    let columns = lines.count("COLUMNS")?;
    if columns != catalog.len() {
        return Err(lines.error(format!(
            "data has {} columns, header declares {}",
            columns,
            catalog.len()
        )));
    }

    let units = lines.record("UNITS")?;
    if units.len() != columns {
        return Err(lines.error(format!("{} units for {} columns", units.len(), columns)));
    }
    let mut batch = DataBatch::with_units(units.into_iter().map(str::to_string).collect());

    for _ in 0..lines.count("STEPS")? {
        let line = lines.next_line()?;
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != columns + 3 {
            return Err(lines.error(format!(
                "step record has {} fields, expected {}",
                fields.len(),
                columns + 3
            )));
        }
        let stamp = StepStamp::new(
            lines.parse("ministep", fields[0])?,
            lines.parse("report step", fields[1])?,
            lines.parse("time", fields[2])?,
        );
        let values = fields[3..]
            .iter()
            .map(|&field| {
                if field == ABSENT_TEXT {
                    Ok(ABSENT)
                } else {
                    lines.parse("value", field)
                }
            })
            .collect::<Result<Vec<f64>>>()?;
        batch.push(stamp, values);
    }
    lines.expect("END")?;
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::HeaderMetadata;

    fn sample_set() -> SummarySet {
        let start = DateTime::from_timestamp(946_684_800, 0).unwrap();
        let mut set = SummarySet::new("NORNE", start);
        set.set_header_metadata(HeaderMetadata {
            start_time: start,
            well_names: vec!["OP_1".to_string(), "OP_2".to_string()],
            group_names: vec!["FIELD".to_string()],
            variables: vec![
                (VarKey::well("WOPR", "OP_1"), "SM3/DAY".to_string()),
                (VarKey::completion("COPR", "OP_2", 5), "SM3/DAY".to_string()),
                (VarKey::misc("TIME"), "DAYS".to_string()),
            ],
        })
        .unwrap();
        let mut batch = DataBatch::new();
        batch.push(StepStamp::new(1, 1, 946_771_200), vec![0.1, ABSENT, 1.0]);
        batch.push(StepStamp::new(2, 2, 946_857_600), vec![1e-12, 3.5, 2.0]);
        set.extend(batch, true).unwrap();
        set
    }

    #[test]
    fn test_header_roundtrip() {
        let set = sample_set();
        let text = encode_header(set.header(), set.catalog()).unwrap();
        assert!(text.starts_with("FSMSPEC 1\nCASE\tNORNE\nSTART\t2000-01-01T00:00:00+00:00\n"));

        let loaded = decode_header(&text).unwrap();
        assert_eq!(loaded.format(), FormatMode::Formatted);
        assert_eq!(loaded.well_names(), ["OP_1", "OP_2"]);
        assert_eq!(loaded.group_names(), ["FIELD"]);
        assert_eq!(loaded.catalog().fingerprint(), set.catalog().fingerprint());
        assert_eq!(loaded.start_time().unwrap(), set.start_time().unwrap());
    }

    #[test]
    fn test_data_roundtrip_keeps_exact_values() {
        let set = sample_set();
        let text = encode_data(&set, 0..2).unwrap();
        assert!(text.contains("\t*\t"));

        let batch = decode_data(&text, set.catalog()).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.rows[0].values[0], 0.1);
        assert!(batch.rows[0].values[1].is_nan());
        assert_eq!(batch.rows[1].values[0], 1e-12);
        assert_eq!(batch.rows[1].stamp, StepStamp::new(2, 2, 946_857_600));
    }

    #[test]
    fn test_case_name_with_control_character_rejected() {
        let set = SummarySet::new("NOR\tNE", DateTime::from_timestamp(0, 0).unwrap());
        let result = encode_header(set.header(), set.catalog());
        assert!(matches!(result, Err(SummaryError::InvalidKey(_))));
    }

    #[test]
    fn test_data_range_past_end() {
        let set = sample_set();
        assert!(matches!(
            encode_data(&set, 1..3),
            Err(SummaryError::OutOfRange { what: "step", index: 2, .. })
        ));
    }

    #[test]
    fn test_crlf_line_endings() {
        let set = sample_set();
        let text = encode_header(set.header(), set.catalog()).unwrap().replace('\n', "\r\n");
        let loaded = decode_header(&text).unwrap();
        assert_eq!(loaded.catalog().len(), 3);
    }

    #[test]
    fn test_bad_value_reports_line() {
        let set = sample_set();
        let text = encode_data(&set, 0..2).unwrap().replace("3.5", "x3.5");
        match decode_data(&text, set.catalog()) {
            Err(SummaryError::CorruptData(msg)) => assert!(msg.starts_with("line 7:"), "{msg}"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_truncated_file() {
        let set = sample_set();
        let text = encode_data(&set, 0..2).unwrap();
        let cut = &text[..text.len() / 2];
        assert!(matches!(
            decode_data(cut, set.catalog()),
            Err(SummaryError::CorruptData(_))
        ));
    }

    #[test]
    fn test_unknown_category() {
        let text = "FSMSPEC 1\nCASE\tC\nSTART\t2000-01-01T00:00:00+00:00\nUNIFIED\t1\n\
                    WELLS\t0\nGROUPS\t0\nKEYS\t1\nBLOCK\tBPR\t\t0\tBARSA\nEND\n";
        assert!(matches!(decode_header(text), Err(SummaryError::CorruptData(_))));
    }
}
