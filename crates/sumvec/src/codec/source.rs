//! Discovery of summary cases in a directory and interactive selection.

use crate::codec::{load_case, CaseFiles, FormatMode, LoadOptions};
use crate::error::{Result, SummaryError};
use crate::store::SummarySet;
use std::fmt;
use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::debug;

/// A case found in a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCandidate {
    /// Case files.
    pub case: CaseFiles,
    /// Format of the header that was found.
    pub format: FormatMode,
}

impl fmt::Display for SourceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let format = match self.format {
            FormatMode::Binary => "binary",
            FormatMode::Formatted => "formatted",
        };
        write!(f, "{} ({})", self.case.base(), format)
    }
}

/// Lists the cases in a directory, one per header file, sorted by base name
/// then format.
///
/// # Errors
///
/// Returns `SummaryError::IoError` if the directory cannot be read.
pub fn find_cases(dir: &Path) -> Result<Vec<SourceCandidate>> {
    let mut candidates = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(FormatMode::from_header_extension);
        let base = path.file_stem().and_then(|s| s.to_str());
        if let (Some(format), Some(base)) = (format, base) {
            candidates.push(SourceCandidate {
                case: CaseFiles::new(dir, base),
                format,
            });
        }
    }
    candidates.sort_by(|a, b| {
        (a.case.base(), a.format as u8).cmp(&(b.case.base(), b.format as u8))
    });
    debug!("Found {} summary cases in {}", candidates.len(), dir.display());
    Ok(candidates)
}

/// Chooses one of several candidate cases.
pub trait SourceSelector {
    /// Returns the index of the chosen candidate, or `None` to decline.
    fn select(&mut self, dir: &Path, candidates: &[SourceCandidate]) -> Result<Option<usize>>;
}

/// Selects a case by prompting on a text stream.
///
/// The prompt is repeated on invalid input; end of input declines.
#[derive(Debug)]
pub struct PromptSelector<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptSelector<R, W> {
    /// Creates a selector reading answers from `input` and writing prompts to
    /// `output`.
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Returns the input and output streams.
    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }
}

impl<R: BufRead, W: Write> SourceSelector for PromptSelector<R, W> {
    fn select(&mut self, dir: &Path, candidates: &[SourceCandidate]) -> Result<Option<usize>> {
        writeln!(self.output, "Summary cases in {}:", dir.display())?;
        for (i, candidate) in candidates.iter().enumerate() {
            writeln!(self.output, "  [{}] {}", i + 1, candidate)?;
        }

        let mut line = String::new();
        loop {
            write!(self.output, "Select case [1-{}]: ", candidates.len())?;
            self.output.flush()?;

            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            match line.trim().parse::<usize>() {
                Ok(n) if (1..=candidates.len()).contains(&n) => return Ok(Some(n - 1)),
                _ => writeln!(self.output, "Invalid selection {:?}", line.trim())?,
            }
        }
    }
}

/// Loads the case in a directory, asking `selector` when there are several.
///
/// A single candidate is loaded without asking. An empty directory is not
/// ambiguous and fails as missing input.
///
/// # Errors
///
/// Returns `SummaryError::NoSource` (kind [`ErrorKind::Io`](crate::error::ErrorKind::Io)) if the
/// directory holds no case and
/// `SummaryError::AmbiguousSource` if there are several and no selector
/// chose one.
pub fn load_interactive(
    dir: &Path,
    selector: Option<&mut dyn SourceSelector>,
    options: &LoadOptions,
) -> Result<SummarySet> {
    let candidates = find_cases(dir)?;
    let ambiguous = || SummaryError::AmbiguousSource {
        dir: dir.to_path_buf(),
        candidates: candidates.len(),
    };

    let chosen = match candidates.len() {
        0 => return Err(SummaryError::NoSource(dir.to_path_buf())),
        1 => 0,
        _ => {
            let selector = selector.ok_or_else(ambiguous)?;
            match selector.select(dir, &candidates)? {
                Some(index) if index < candidates.len() => index,
                _ => return Err(ambiguous()),
            }
        }
    };

    let candidate = &candidates[chosen];
    debug!("Loading {}", candidate);
    load_case(&candidate.case, candidate.format, options)
}
