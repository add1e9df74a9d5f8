//! Error types for the block-management layer.

use sframe_storage::StorageError;
use thiserror::Error;

/// Result type for block-management operations.
pub type BlockResult<T> = Result<T, BlockError>;

/// Errors that can occur in the block-management layer.
#[derive(Debug, Error)]
pub enum BlockError {
    /// A physical file could not be opened for reading or writing.
    #[error("cannot open {path}: {source}")]
    OpenFailure {
        /// Path of the file that failed to open.
        path: String,
        /// Underlying storage error.
        #[source]
        source: StorageError,
    },

    /// Index file content is neither valid JSON nor valid INI.
    #[error("cannot parse index file {path}: not valid JSON or INI")]
    ParseFailure {
        /// Path of the unparseable index file.
        path: String,
    },

    /// Index file declares a version other than 2.
    #[error("unsupported version {version} in index file {path} (expected 2)")]
    UnsupportedVersion {
        /// Path of the index file.
        path: String,
        /// The version that was found.
        version: u64,
    },

    /// A length or count invariant of the index file was violated.
    #[error("malformed index file: {message}")]
    Malformed {
        /// Description of the violated invariant.
        message: String,
    },

    /// A requested column index exceeds the group's column count.
    #[error("column {column} out of range ({ncolumns} columns)")]
    ColumnOutOfRange {
        /// The requested column index.
        column: usize,
        /// The number of columns actually present.
        ncolumns: usize,
    },

    /// The segment footer cannot be located or deserialized.
    #[error("corrupt segment {path}: {message}")]
    CorruptSegment {
        /// Path of the corrupt segment file.
        path: String,
        /// Description of the corruption.
        message: String,
    },

    /// A write did not complete.
    #[error("write to {path} failed: {message} (disk may be full)")]
    IoFailure {
        /// Path being written.
        path: String,
        /// Description of the failure.
        message: String,
    },

    /// API misuse: an address that was not validly open.
    #[error("invalid handle: {message}")]
    InvalidHandle {
        /// Description of the misuse.
        message: String,
    },

    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl BlockError {
    /// Creates an open-failure error.
    pub fn open_failure(path: impl Into<String>, source: StorageError) -> Self {
        Self::OpenFailure {
            path: path.into(),
            source,
        }
    }

    /// Creates a parse-failure error.
    pub fn parse_failure(path: impl Into<String>) -> Self {
        Self::ParseFailure { path: path.into() }
    }

    /// Creates a malformed-index error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Creates a corrupt-segment error.
    pub fn corrupt_segment(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptSegment {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates an I/O-failure error.
    pub fn io_failure(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IoFailure {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid-handle error.
    pub fn invalid_handle(message: impl Into<String>) -> Self {
        Self::InvalidHandle {
            message: message.into(),
        }
    }
}
