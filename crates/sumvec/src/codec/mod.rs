//! Loading and saving summary cases.
//!
//! A case on disk is a header file plus one or more data files next to it,
//! named after the case base:
//!
//! | File             | Binary         | Formatted       |
//! |------------------|----------------|-----------------|
//! | Header           | `BASE.SMSPEC`  | `BASE.FSMSPEC`  |
//! | Unified data     | `BASE.UNSMRY`  | `BASE.FUNSMRY`  |
//! | Report batch `n` | `BASE.Snnnn`   | `BASE.Annnn`    |
//!
//! Batch files are numbered from 1. Loading prefers a unified data file and
//! otherwise reads the numbered batches in order.

pub mod binary;
pub mod column;
pub mod formatted;
pub mod source;

pub use crate::store::FormatMode;
pub use column::ColumnEncoding;
pub use source::{find_cases, load_interactive, PromptSelector, SourceCandidate, SourceSelector};

use crate::error::{Result, SummaryError};
use crate::key::KeyCatalog;
use crate::store::{DataBatch, SummaryHeader, SummarySet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default for [`LoadOptions::recursive`].
pub const DEFAULT_RECURSIVE: bool = false;

/// Default for [`LoadOptions::strict_units`].
pub const DEFAULT_STRICT_UNITS: bool = true;

/// Options for loading a case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Keep reading numbered batches until the sequence ends.
    ///
    /// Default: false (first batch only)
    pub recursive: bool,
    /// Fail on unit disagreements between header and data.
    ///
    /// Default: true
    pub strict_units: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            recursive: DEFAULT_RECURSIVE,
            strict_units: DEFAULT_STRICT_UNITS,
        }
    }
}

impl LoadOptions {
    /// Creates options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether numbered batches are scanned recursively.
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Sets whether unit disagreements fail the load.
    pub fn with_strict_units(mut self, strict_units: bool) -> Self {
        self.strict_units = strict_units;
        self
    }
}

/// Options for saving a case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOptions {
    /// File format.
    ///
    /// Default: [`FormatMode::Binary`]
    pub format: FormatMode,
    /// Write one unified data file instead of one batch per report step.
    ///
    /// Default: true
    pub unified: bool,
    /// Column encoding of binary data files.
    ///
    /// Default: [`ColumnEncoding::Gorilla`]
    pub encoding: ColumnEncoding,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            format: FormatMode::Binary,
            unified: true,
            encoding: ColumnEncoding::Gorilla,
        }
    }
}

impl SaveOptions {
    /// Creates options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options that save a set the way it was loaded or configured:
    /// its format and its unified or batched layout.
    pub fn for_set(set: &SummarySet) -> Self {
        Self {
            format: set.format(),
            unified: set.header().unified,
            ..Self::default()
        }
    }

    /// Sets the file format.
    pub fn with_format(mut self, format: FormatMode) -> Self {
        self.format = format;
        self
    }

    /// Sets whether data goes to one unified file.
    pub fn with_unified(mut self, unified: bool) -> Self {
        self.unified = unified;
        self
    }

    /// Sets the column encoding of binary data files.
    pub fn with_encoding(mut self, encoding: ColumnEncoding) -> Self {
        self.encoding = encoding;
        self
    }
}

impl FormatMode {
    /// Extension of the header file.
    pub fn header_extension(self) -> &'static str {
        match self {
            Self::Binary => "SMSPEC",
            Self::Formatted => "FSMSPEC",
        }
    }

    /// Extension of the unified data file.
    pub fn unified_extension(self) -> &'static str {
        match self {
            Self::Binary => "UNSMRY",
            Self::Formatted => "FUNSMRY",
        }
    }

    /// First letter of numbered batch extensions.
    pub fn batch_prefix(self) -> char {
        match self {
            Self::Binary => 'S',
            Self::Formatted => 'A',
        }
    }

    /// Format of a header file extension.
    pub fn from_header_extension(ext: &str) -> Option<Self> {
        [Self::Binary, Self::Formatted]
            .into_iter()
            .find(|format| ext.eq_ignore_ascii_case(format.header_extension()))
    }

    /// Format of a data file extension, unified or numbered.
    pub fn from_data_extension(ext: &str) -> Option<Self> {
        [Self::Binary, Self::Formatted].into_iter().find(|&format| {
            ext.eq_ignore_ascii_case(format.unified_extension())
                || batch_number(ext, format).is_some()
        })
    }
}

/// Parses the number of a batch extension such as `S0007`.
fn batch_number(ext: &str, format: FormatMode) -> Option<u32> {
    let mut chars = ext.chars();
    let prefix = chars.next()?;
    if !prefix.eq_ignore_ascii_case(&format.batch_prefix()) {
        return None;
    }
    let digits = chars.as_str();
    if digits.len() < 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn is_summary_extension(ext: &str) -> bool {
    FormatMode::from_header_extension(ext).is_some() || FormatMode::from_data_extension(ext).is_some()
}

/// The files of one case: a directory and a base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseFiles {
    dir: PathBuf,
    base: String,
}

impl CaseFiles {
    /// Creates a case from a directory and base name.
    pub fn new(dir: impl Into<PathBuf>, base: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base: base.into(),
        }
    }

    /// Derives the case from a base path (`out/NORNE`) or from any of its
    /// files (`out/NORNE.SMSPEC`).
    ///
    /// # Errors
    ///
    /// Returns `SummaryError::NoSource` if the path has no usable file name.
    pub fn from_path(path: &Path) -> Result<Self> {
        let no_source = || SummaryError::NoSource(path.to_path_buf());
        let file_name = path.file_name().and_then(|n| n.to_str()).ok_or_else(no_source)?;
        let base = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if is_summary_extension(ext) => {
                path.file_stem().and_then(|s| s.to_str()).ok_or_else(no_source)?
            }
            _ => file_name,
        };
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Ok(Self::new(dir, base))
    }

    /// Directory holding the case files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Case base name.
    pub fn base(&self) -> &str {
        &self.base
    }

    fn file(&self, ext: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", self.base, ext))
    }

    /// Path of the header file.
    pub fn header_path(&self, format: FormatMode) -> PathBuf {
        self.file(format.header_extension())
    }

    /// Path of the unified data file.
    pub fn unified_path(&self, format: FormatMode) -> PathBuf {
        self.file(format.unified_extension())
    }

    /// Path of numbered batch `number`.
    pub fn batch_path(&self, format: FormatMode, number: u32) -> PathBuf {
        self.file(&format!("{}{:04}", format.batch_prefix(), number))
    }

    /// Format of the header present on disk, binary first.
    pub fn detect_format(&self) -> Option<FormatMode> {
        [FormatMode::Binary, FormatMode::Formatted]
            .into_iter()
            .find(|&format| self.header_path(format).is_file())
    }

    /// Numbered batch files on disk, sorted by number.
    pub fn batches(&self, format: FormatMode) -> Result<Vec<(u32, PathBuf)>> {
        let prefix = format!("{}.", self.base);
        let mut batches = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            let number = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix(&prefix))
                .and_then(|ext| batch_number(ext, format));
            if let Some(number) = number {
                if path.is_file() {
                    batches.push((number, path));
                }
            }
        }
        batches.sort();
        Ok(batches)
    }

    /// Data files to load: the unified file if present, otherwise numbered
    /// batches.
    pub fn data_files(&self, format: FormatMode, recursive: bool) -> Result<Vec<PathBuf>> {
        let unified = self.unified_path(format);
        if unified.is_file() {
            return Ok(vec![unified]);
        }
        Ok(contiguous_run(self.batches(format)?, None, recursive))
    }
}

/// Picks batches from a sorted list: the first one after `after`, and with
/// `recursive` every following batch until the numbering has a gap.
fn contiguous_run(
    batches: Vec<(u32, PathBuf)>,
    after: Option<u32>,
    recursive: bool,
) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut expected = after.map(|n| n.saturating_add(1));
    for (number, path) in batches {
        if after.is_some_and(|after| number <= after) {
            continue;
        }
        if let Some(expected) = expected {
            if number != expected {
                warn!(
                    "Batch {} missing, ignoring {} and later batches",
                    expected,
                    path.display()
                );
                break;
            }
        }
        files.push(path);
        if !recursive {
            break;
        }
        expected = Some(number.saturating_add(1));
    }
    files
}

fn read_text(path: &Path) -> Result<String> {
    String::from_utf8(fs::read(path)?)
        .map_err(|_| SummaryError::corrupt(format!("{} is not valid UTF-8", path.display())))
}

fn read_header(path: &Path, format: FormatMode) -> Result<SummarySet> {
    let set = match format {
        FormatMode::Binary => binary::decode_header(&fs::read(path)?)?,
        FormatMode::Formatted => formatted::decode_header(&read_text(path)?)?,
    };
    debug!(
        "Read header {}: {} variables, {} wells",
        path.display(),
        set.catalog().len(),
        set.num_wells()
    );
    Ok(set)
}

fn read_batch(path: &Path, format: FormatMode, catalog: &KeyCatalog) -> Result<DataBatch> {
    match format {
        FormatMode::Binary => binary::decode_data(&fs::read(path)?, catalog),
        FormatMode::Formatted => formatted::decode_data(&read_text(path)?, catalog),
    }
}

fn data_format(path: &Path) -> Option<FormatMode> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(FormatMode::from_data_extension)
}

fn header_format(case: &CaseFiles, path: &Path) -> Result<FormatMode> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(FormatMode::from_header_extension)
        .or_else(|| case.detect_format())
        .ok_or_else(|| SummaryError::NoSource(path.to_path_buf()))
}

/// Loads a case from its base path or header file.
///
/// # Errors
///
/// Returns `SummaryError::NoSource` if no header exists, `SummaryError::IoError`
/// if a file cannot be read, and the decoding errors of the data files. On
/// error no partially loaded set is returned.
pub fn load(path: &Path, options: &LoadOptions) -> Result<SummarySet> {
    let case = CaseFiles::from_path(path)?;
    let format = header_format(&case, path)?;
    load_case(&case, format, options)
}

pub(crate) fn load_case(
    case: &CaseFiles,
    format: FormatMode,
    options: &LoadOptions,
) -> Result<SummarySet> {
    let mut set = read_header(&case.header_path(format), format)?;
    let data = case.data_files(format, options.recursive)?;
    if !data.is_empty() {
        set.set_unified(data[0] == case.unified_path(format));
    }
    debug!("Found {} data files for {}", data.len(), case.base());
    load_data(&mut set, &data, options)?;
    Ok(set)
}

/// Loads a header and explicit data files.
///
/// With `recursive`, numbered batches following the last numbered file in
/// `data` are loaded too; if `data` is empty the case's own data files are
/// discovered as [`load`] does.
pub fn load_files(header: &Path, data: &[PathBuf], options: &LoadOptions) -> Result<SummarySet> {
    let case = CaseFiles::from_path(header)?;
    let format = header_format(&case, header)?;
    let mut set = read_header(header, format)?;

    let mut files = data.to_vec();
    if options.recursive {
        if files.is_empty() {
            files = case.data_files(format, true)?;
        } else {
            let last = files
                .iter()
                .filter_map(|path| path.extension().and_then(|e| e.to_str()))
                .filter_map(|ext| batch_number(ext, format))
                .max();
            if let Some(last) = last {
                files.extend(contiguous_run(case.batches(format)?, Some(last), true));
            }
        }
    }

    load_data(&mut set, &files, options)?;
    Ok(set)
}

/// Appends data files to a set.
///
/// Each file is one batch and is applied all-or-nothing; files already
/// applied stay when a later file fails.
pub fn load_data(set: &mut SummarySet, data: &[PathBuf], options: &LoadOptions) -> Result<()> {
    for path in data {
        let format = data_format(path).unwrap_or(set.format());
        let batch = read_batch(path, format, set.catalog())?;
        let added = set.extend(batch, options.strict_units)?;
        debug!("Loaded {} steps from {}", added.len(), path.display());
    }
    Ok(())
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(contents)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

fn encode_data(
    set: &SummarySet,
    steps: std::ops::Range<usize>,
    options: &SaveOptions,
) -> Result<Vec<u8>> {
    match options.format {
        FormatMode::Binary => binary::encode_data(set, steps, options.encoding),
        FormatMode::Formatted => Ok(formatted::encode_data(set, steps)?.into_bytes()),
    }
}

/// Removes data files of an earlier save that the new layout would not
/// overwrite.
fn remove_stale_data(case: &CaseFiles, format: FormatMode) -> Result<()> {
    let unified = case.unified_path(format);
    if unified.is_file() {
        fs::remove_file(&unified)?;
    }
    if case.dir().is_dir() {
        for (_, path) in case.batches(format)? {
            fs::remove_file(path)?;
        }
    }
    Ok(())
}

/// Saves a set under a base path and returns the written case.
///
/// The header is written first, then the data: one unified file, or one
/// numbered batch per report step numbered from 1. Data files of the same
/// format left by an earlier save are removed.
///
/// # Errors
///
/// Returns `SummaryError::IoError` if a file cannot be written and
/// `SummaryError::InvalidKey` if the case name cannot be stored in a
/// formatted header. Nothing is removed or written when the header cannot
/// be encoded.
pub fn save(set: &SummarySet, base: &Path, options: &SaveOptions) -> Result<CaseFiles> {
    let case = CaseFiles::from_path(base)?;
    let header = SummaryHeader {
        format: options.format,
        unified: options.unified,
        ..set.header().clone()
    };
    let header = match options.format {
        FormatMode::Binary => binary::encode_header(&header, set.catalog())?,
        FormatMode::Formatted => formatted::encode_header(&header, set.catalog())?.into_bytes(),
    };

    fs::create_dir_all(case.dir())?;
    remove_stale_data(&case, options.format)?;
    write_file(&case.header_path(options.format), &header)?;

    let mut written = 1;
    if options.unified {
        write_file(
            &case.unified_path(options.format),
            &encode_data(set, 0..set.step_count(), options)?,
        )?;
        written += 1;
    } else {
        let time = set.time_index();
        for (number, report) in (1u32..).zip(time.report_steps()) {
            let (first, last) = time.report_range(report)?;
            write_file(
                &case.batch_path(options.format, number),
                &encode_data(set, first..last + 1, options)?,
            )?;
            written += 1;
        }
    }

    debug!(
        "Saved {} steps of {} to {} files under {}",
        set.step_count(),
        set.case_name(),
        written,
        case.dir().display()
    );
    Ok(case)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_from_path() {
        let case = CaseFiles::from_path(Path::new("out/NORNE.SMSPEC")).unwrap();
        assert_eq!(case.dir(), Path::new("out"));
        assert_eq!(case.base(), "NORNE");

        let case = CaseFiles::from_path(Path::new("NORNE")).unwrap();
        assert_eq!(case.dir(), Path::new("."));
        assert_eq!(case.header_path(FormatMode::Formatted), Path::new("./NORNE.FSMSPEC"));

        let case = CaseFiles::from_path(Path::new("runs/CASE.V2")).unwrap();
        assert_eq!(case.base(), "CASE.V2");

        let case = CaseFiles::from_path(Path::new("runs/CASE.a0012")).unwrap();
        assert_eq!(case.base(), "CASE");
    }

    #[test]
    fn test_file_names() {
        let case = CaseFiles::new("d", "C");
        assert_eq!(case.unified_path(FormatMode::Binary), Path::new("d/C.UNSMRY"));
        assert_eq!(case.batch_path(FormatMode::Binary, 7), Path::new("d/C.S0007"));
        assert_eq!(case.batch_path(FormatMode::Formatted, 12), Path::new("d/C.A0012"));
    }

    #[test]
    fn test_extension_formats() {
        assert_eq!(FormatMode::from_header_extension("smspec"), Some(FormatMode::Binary));
        assert_eq!(FormatMode::from_header_extension("FSMSPEC"), Some(FormatMode::Formatted));
        assert_eq!(FormatMode::from_data_extension("S0001"), Some(FormatMode::Binary));
        assert_eq!(FormatMode::from_data_extension("FUNSMRY"), Some(FormatMode::Formatted));
        assert_eq!(FormatMode::from_data_extension("S01"), None);
        assert_eq!(FormatMode::from_data_extension("X0001"), None);
        assert_eq!(batch_number("A10000", FormatMode::Formatted), Some(10_000));
    }

    #[test]
    fn test_contiguous_run() {
        let batches: Vec<(u32, PathBuf)> = [1, 2, 3, 5]
            .into_iter()
            .map(|n| (n, PathBuf::from(format!("C.S{n:04}"))))
            .collect();

        assert_eq!(contiguous_run(batches.clone(), None, false).len(), 1);
        assert_eq!(contiguous_run(batches.clone(), None, true).len(), 3);

        let after = contiguous_run(batches.clone(), Some(1), true);
        assert_eq!(after, vec![PathBuf::from("C.S0002"), PathBuf::from("C.S0003")]);

        assert!(contiguous_run(batches, Some(3), true).is_empty());
    }

    #[test]
    fn test_options_builders() {
        let load = LoadOptions::new().with_recursive(true).with_strict_units(false);
        assert!(load.recursive);
        assert!(!load.strict_units);
        assert_eq!(LoadOptions::default(), LoadOptions { recursive: false, strict_units: true });

        let save = SaveOptions::new()
            .with_format(FormatMode::Formatted)
            .with_unified(false)
            .with_encoding(ColumnEncoding::Raw);
        assert_eq!(save.format, FormatMode::Formatted);
        assert!(!save.unified);
        assert_eq!(save.encoding, ColumnEncoding::Raw);
    }
}
