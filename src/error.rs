//! The crate-wide error type and result alias.

use std::path::PathBuf;

/// A result of a fallible catalog operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while ingesting, storing, or querying market data.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A raw input file could not be parsed by the configured parser.
    #[error("failed to parse {path}: {reason}")]
    Parse {
        /// The file being parsed when the error occurred.
        path: PathBuf,
        /// A human-readable description of the parse failure.
        reason: String,
    },
    /// A decoded column layout did not match the record schema expected by the caller.
    #[error("schema mismatch for `{record_type}`: {reason}")]
    SchemaMismatch {
        /// The record type whose schema failed to match.
        record_type: String,
        /// A human-readable description of the mismatch.
        reason: String,
    },
    /// A fixed-point value could not be represented at the requested precision.
    #[error("precision overflow: {reason}")]
    PrecisionOverflow {
        /// A human-readable description of the overflow.
        reason: String,
    },
    /// An underlying filesystem operation failed.
    #[error("io error at {path}: {source}")]
    Io {
        /// The path the operation was attempted against.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The requested resource does not exist in the catalog.
    #[error("not found: {0}")]
    NotFound(String),
    /// A partition's on-disk files are internally inconsistent (overlapping ranges,
    /// unreadable metadata, or a corrupt parquet footer).
    #[error("corrupt partition at {path}: {reason}")]
    CorruptPartition {
        /// The partition directory that failed validation.
        path: PathBuf,
        /// A human-readable description of the corruption.
        reason: String,
    },
    /// A long-running operation observed a cancellation request.
    #[error("operation cancelled")]
    Cancelled,
    /// A named capability is not implemented by the active backend.
    #[error("{0} is not supported by this backend")]
    NotSupported(&'static str),
    /// A fixed-point value violated the sign or range constraint of the type
    /// being constructed (e.g. a negative `Quantity`).
    #[error("out of range: {reason}")]
    OutOfRange {
        /// A human-readable description of the violated constraint.
        reason: String,
    },
}

impl Error {
    /// Constructs a [`Error::Parse`] for `path`.
    pub fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Constructs a [`Error::SchemaMismatch`] for `record_type`.
    pub fn schema_mismatch(record_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            record_type: record_type.into(),
            reason: reason.into(),
        }
    }

    /// Constructs a [`Error::PrecisionOverflow`].
    pub fn precision_overflow(reason: impl Into<String>) -> Self {
        Self::PrecisionOverflow {
            reason: reason.into(),
        }
    }

    /// Constructs a [`Error::Io`] wrapping `source` with the path that caused it.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Constructs a [`Error::CorruptPartition`].
    pub fn corrupt_partition(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptPartition {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Constructs a [`Error::OutOfRange`].
    pub fn out_of_range(reason: impl Into<String>) -> Self {
        Self::OutOfRange {
            reason: reason.into(),
        }
    }

    /// Returns `true` if retrying the operation that produced this error might succeed,
    /// e.g. a transient I/O failure.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Io { source, .. }
                if matches!(
                    source.kind(),
                    std::io::ErrorKind::Interrupted | std::io::ErrorKind::WouldBlock
                )
        )
    }
}

impl From<polars::error::PolarsError> for Error {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::SchemaMismatch {
            record_type: "dataframe".to_string(),
            reason: err.to_string(),
        }
    }
}
