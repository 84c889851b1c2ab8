//! Fatal errors and recoverable warnings raised while decoding a store.

use ds_types::{DataType, FourCharCode};
use std::fmt;
use thiserror::Error;

use crate::options::DecodeOptions;

#[derive(Error, Debug)]
pub enum Error {
    #[error("truncated input reading {field}: needed {needed} bytes, {available} available")]
    TruncatedInput {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("unsupported {structure} version {found}, expected {expected}")]
    UnsupportedVersion {
        structure: &'static str,
        found: u32,
        expected: u32,
    },

    #[error("wrong magic '{found}', expected '{expected}'")]
    BadMagic {
        found: FourCharCode,
        expected: FourCharCode,
    },

    #[error("allocator offset {offset} does not match check copy {check}")]
    ChecksumMismatch { offset: u32, check: u32 },

    #[error("block number {block} out of range; allocator holds {block_count} blocks")]
    BlockNumberOutOfRange { block: u32, block_count: u32 },

    #[error("could not find the {0} directory entry")]
    DirectoryEntryNotFound(String),

    #[error("unexpected tree node page size {found:#x}; expected {expected:#x}")]
    UnexpectedPageSize { found: u32, expected: u32 },

    #[error("record filename is empty")]
    EmptyFilename,

    #[error("'{0}' record payload is empty")]
    EmptyPayload(DataType),

    #[error("unknown record data type '{0}'")]
    UnknownDataType(FourCharCode),

    #[error("{structure} declares {declared} bytes but {actual} are present")]
    SizeMismatch {
        structure: &'static str,
        declared: usize,
        actual: usize,
    },

    #[error("too many {what}; limit is {limit}")]
    TooManyEntries { what: &'static str, limit: usize },

    #[error("{what} of {length} bytes exceeds the {limit} byte limit")]
    ValueTooLarge {
        what: &'static str,
        length: usize,
        limit: usize,
    },

    #[error("offset {offset} lies outside the {len} byte {structure}")]
    OffsetOutOfRange {
        structure: &'static str,
        offset: u64,
        len: usize,
    },

    #[error("block {0} is reachable more than once from the tree root")]
    BlockCycle(u32),

    #[error("{structure} nesting exceeds {limit} levels")]
    DepthLimitExceeded { structure: &'static str, limit: usize },

    #[error("malformed {structure}: {message}")]
    Malformed {
        structure: &'static str,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Anomalies that do not prevent decoding. The format's own size prefixes
/// are always trusted over these expectations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    NonZeroReservedField {
        field: &'static str,
        value: u64,
    },
    UnknownRecordType(FourCharCode),
    UnexpectedRecordDataType {
        record_type: FourCharCode,
        expected: DataType,
        found: DataType,
    },
    TrailingGarbageBytes {
        structure: &'static str,
        count: usize,
    },
    RecordCountMismatch {
        declared: u32,
        visited: u64,
    },
    TreeDeeperThanDeclared {
        declared_levels: u32,
        depth: usize,
    },
    UnexpectedPageSize {
        found: u32,
        expected: u32,
    },
    UnexpectedBlobSize {
        record_type: FourCharCode,
        expected: usize,
        found: usize,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::NonZeroReservedField { field, value } => {
                write!(f, "expected {field} to be 0, got {value}")
            }
            Warning::UnknownRecordType(record_type) => {
                write!(f, "unknown record type '{record_type}'")
            }
            Warning::UnexpectedRecordDataType {
                record_type,
                expected,
                found,
            } => write!(
                f,
                "unexpected data type '{found}' for record type '{record_type}'; expected '{expected}'"
            ),
            Warning::TrailingGarbageBytes { structure, count } => {
                write!(f, "{count} bytes of garbage data following {structure}")
            }
            Warning::RecordCountMismatch { declared, visited } => write!(
                f,
                "header block declares {declared} records but traversal visited {visited}"
            ),
            Warning::TreeDeeperThanDeclared {
                declared_levels,
                depth,
            } => write!(
                f,
                "tree reaches depth {depth} but header block declares {declared_levels} levels"
            ),
            Warning::UnexpectedPageSize { found, expected } => {
                write!(f, "unexpected node page size {found:#x}; expected {expected:#x}")
            }
            Warning::UnexpectedBlobSize {
                record_type,
                expected,
                found,
            } => write!(
                f,
                "'{record_type}' record is of wrong size {found}; expected {expected}"
            ),
        }
    }
}

/// Limits and collected warnings for a single decode operation.
#[derive(Debug, Clone, Default)]
pub struct DecodeContext {
    pub options: DecodeOptions,
    warnings: Vec<Warning>,
}

impl DecodeContext {
    pub fn new(options: DecodeOptions) -> Self {
        Self {
            options,
            warnings: Vec::new(),
        }
    }

    /// Record a warning and report it through `tracing`.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{warning}");
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}
