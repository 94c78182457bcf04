//! Error and Result types for summary-vector operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A convenience `Result` type for summary operations.
pub type Result<T> = std::result::Result<T, SummaryError>;

/// Coarse classification of a [`SummaryError`].
///
/// Callers that only care about the failure category (for example to decide
/// whether a query miss is recoverable) match on this instead of the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Source unreadable or destination unwritable.
    Io,
    /// Structural parse failure in persisted data.
    CorruptData,
    /// A data batch declares units inconsistent with the header.
    UnitMismatch,
    /// An append would violate monotonic step or time ordering.
    OutOfOrderData,
    /// Unresolved variable key, report step or ministep.
    NotFound,
    /// Invalid step or slot index.
    OutOfRange,
    /// More than one candidate source and no selection.
    AmbiguousSource,
    /// Malformed symbolic key or entity name.
    InvalidKey,
}

/// The error type for summary operations.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// No summary case was found where one was expected.
    #[error("No summary case found in {}", .0.display())]
    NoSource(PathBuf),

    /// Invalid magic bytes at the start or end of a file.
    #[error("Invalid magic bytes: expected {expected:?}, got {actual:?}")]
    InvalidMagic {
        /// Magic bytes for this file kind.
        expected: [u8; 4],
        /// Bytes actually found.
        actual: [u8; 4],
    },

    /// Unsupported file format version.
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u16),

    /// File or block checksum does not match.
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Stored CRC32 checksum.
        expected: u32,
        /// Computed CRC32 checksum.
        actual: u32,
    },

    /// Malformed record structure.
    #[error("Corrupt data: {0}")]
    CorruptData(String),

    /// A batch or registration declares a unit different from the header.
    #[error("Unit mismatch for {key}: header has {expected:?}, got {found:?}")]
    UnitMismatch {
        /// General key of the variable.
        key: String,
        /// Unit recorded in the header.
        expected: String,
        /// Unit declared by the batch.
        found: String,
    },

    /// Appended steps go backwards in ministep, report step or time.
    #[error("Out of order data: {0}")]
    OutOfOrderData(String),

    /// No variable is registered under the key.
    #[error("Variable not found: {0}")]
    KeyNotFound(String),

    /// The report step was never observed.
    #[error("Report step not found: {0}")]
    ReportStepNotFound(u32),

    /// The ministep was never observed.
    #[error("Ministep not found: {0}")]
    MinistepNotFound(u32),

    /// No simulated value exists for an observation and the misfit
    /// configuration does not allow skipping it.
    #[error("No simulated value for {key} at {at}")]
    MissingSimulatedData {
        /// General key of the variable.
        key: String,
        /// Human readable observation position.
        at: String,
    },

    /// Step, slot or range index outside the table.
    #[error("{what} index {index} out of range (len {len})")]
    OutOfRange {
        /// Which dimension was indexed.
        what: &'static str,
        /// Requested index.
        index: usize,
        /// Current length of that dimension.
        len: usize,
    },

    /// Several candidate cases and no selection was made.
    #[error("Ambiguous source: {candidates} summary cases in {}", .dir.display())]
    AmbiguousSource {
        /// Directory that was scanned.
        dir: PathBuf,
        /// Number of candidates found.
        candidates: usize,
    },

    /// Malformed key text or entity name.
    #[error("Invalid variable key: {0}")]
    InvalidKey(String),
}

impl SummaryError {
    /// Returns the error category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::IoError(_) | Self::NoSource(_) => ErrorKind::Io,
            Self::InvalidMagic { .. }
            | Self::UnsupportedVersion(_)
            | Self::ChecksumMismatch { .. }
            | Self::CorruptData(_) => ErrorKind::CorruptData,
            Self::UnitMismatch { .. } => ErrorKind::UnitMismatch,
            Self::OutOfOrderData(_) => ErrorKind::OutOfOrderData,
            Self::KeyNotFound(_)
            | Self::ReportStepNotFound(_)
            | Self::MinistepNotFound(_)
            | Self::MissingSimulatedData { .. } => ErrorKind::NotFound,
            Self::OutOfRange { .. } => ErrorKind::OutOfRange,
            Self::AmbiguousSource { .. } => ErrorKind::AmbiguousSource,
            Self::InvalidKey(_) => ErrorKind::InvalidKey,
        }
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptData(msg.into())
    }

    pub(crate) fn out_of_range(what: &'static str, index: usize, len: usize) -> Self {
        Self::OutOfRange { what, index, len }
    }
}
