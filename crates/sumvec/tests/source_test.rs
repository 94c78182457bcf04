//! Integration tests for case discovery and interactive selection.

use chrono::DateTime;
use std::io::Cursor;
use std::path::Path;
use sumvec::codec::{find_cases, load_interactive, PromptSelector, SourceCandidate, SourceSelector};
use sumvec::{
    save, DataBatch, ErrorKind, FormatMode, LoadOptions, Result, SaveOptions, StepStamp,
    SummaryError, SummarySet, VarKey,
};
use tempfile::TempDir;

fn write_case(dir: &Path, base: &str, format: FormatMode, fopt: f64) {
    let mut set = SummarySet::new(base, DateTime::from_timestamp(0, 0).unwrap());
    set.register(VarKey::field("FOPT"), "SM3").unwrap();
    let mut batch = DataBatch::new();
    batch.push(StepStamp::new(1, 1, 86_400), vec![fopt]);
    set.extend(batch, true).unwrap();
    save(&set, &dir.join(base), &SaveOptions::new().with_format(format)).unwrap();
}

/// Always picks the same index and records how often it was asked.
struct FixedSelector {
    choice: Option<usize>,
    asked: usize,
}

impl SourceSelector for FixedSelector {
    fn select(&mut self, _dir: &Path, _candidates: &[SourceCandidate]) -> Result<Option<usize>> {
        self.asked += 1;
        Ok(self.choice)
    }
}

#[test]
fn test_empty_directory_has_no_source() {
    let temp_dir = TempDir::new().unwrap();
    let err = load_interactive(temp_dir.path(), None, &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, SummaryError::NoSource(_)));
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn test_single_case_loads_without_asking() {
    let temp_dir = TempDir::new().unwrap();
    write_case(temp_dir.path(), "ONLY", FormatMode::Binary, 7.0);

    let mut selector = FixedSelector {
        choice: None,
        asked: 0,
    };
    let set = load_interactive(temp_dir.path(), Some(&mut selector), &LoadOptions::default())
        .unwrap();
    assert_eq!(selector.asked, 0);
    assert_eq!(set.case_name(), "ONLY");
    assert_eq!(set.field_var(0, "FOPT").unwrap(), Some(7.0));
}

#[test]
fn test_several_cases_are_ambiguous_without_selector() {
    let temp_dir = TempDir::new().unwrap();
    write_case(temp_dir.path(), "A", FormatMode::Binary, 1.0);
    write_case(temp_dir.path(), "B", FormatMode::Binary, 2.0);

    let err = load_interactive(temp_dir.path(), None, &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, SummaryError::AmbiguousSource { candidates: 2, .. }));
    assert_eq!(err.kind(), ErrorKind::AmbiguousSource);

    let mut declining = FixedSelector {
        choice: None,
        asked: 0,
    };
    let err = load_interactive(temp_dir.path(), Some(&mut declining), &LoadOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AmbiguousSource);
    assert_eq!(declining.asked, 1);
}

#[test]
fn test_find_cases_lists_both_formats() {
    let temp_dir = TempDir::new().unwrap();
    write_case(temp_dir.path(), "B", FormatMode::Binary, 2.0);
    write_case(temp_dir.path(), "A", FormatMode::Formatted, 1.0);
    write_case(temp_dir.path(), "A", FormatMode::Binary, 1.5);

    let cases = find_cases(temp_dir.path()).unwrap();
    let names: Vec<String> = cases.iter().map(ToString::to_string).collect();
    assert_eq!(names, ["A (binary)", "A (formatted)", "B (binary)"]);
}

#[test]
fn test_prompt_selection_loads_chosen_case() {
    let temp_dir = TempDir::new().unwrap();
    write_case(temp_dir.path(), "A", FormatMode::Binary, 1.0);
    write_case(temp_dir.path(), "B", FormatMode::Formatted, 2.0);

    let mut selector = PromptSelector::new(Cursor::new("9\n2\n"), Vec::new());
    let set = load_interactive(temp_dir.path(), Some(&mut selector), &LoadOptions::default())
        .unwrap();
    assert_eq!(set.case_name(), "B");
    assert_eq!(set.format(), FormatMode::Formatted);
    assert_eq!(set.field_var(0, "FOPT").unwrap(), Some(2.0));

    let (_, output) = selector.into_inner();
    let output = String::from_utf8(output).unwrap();
    assert!(output.contains("[1] A (binary)"));
    assert!(output.contains("[2] B (formatted)"));
    assert!(output.contains("Invalid selection \"9\""));
    assert_eq!(output.matches("Select case [1-2]: ").count(), 2);
}
