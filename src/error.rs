//! Error types for the sdx engine.

use std::io;
use thiserror::Error as ThisError;

/// The result type used throughout sdx.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for sdx operations.
#[derive(Debug, ThisError)]
pub enum Error {
    /// An I/O error occurred in the underlying storage.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Data corruption was detected (bad marker, size mismatch, bad header).
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// A checksum mismatch was detected.
    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// The expected checksum value.
        expected: u32,
        /// The actual checksum value.
        actual: u32,
    },

    /// The stream ended before the requested number of bytes could be read.
    #[error("Truncated stream: wanted {wanted} bytes, got {got}")]
    TruncatedStream {
        /// Bytes requested.
        wanted: usize,
        /// Bytes available.
        got: usize,
    },

    /// A tuple was rejected by the filter registered for one of its dimensions.
    #[error("Domain violation: dimension {dimension} does not admit index {value}")]
    DomainViolation {
        /// Zero-based dimension that failed.
        dimension: usize,
        /// The offending dense index.
        value: u32,
    },

    /// A record did not sort strictly after its predecessor in strict write mode.
    #[error("Out of order record for symbol {symbol}: {tuple:?} does not follow {previous:?}")]
    OutOfOrder {
        /// Symbol the record was appended to.
        symbol: u32,
        /// The rejected tuple.
        tuple: Vec<u32>,
        /// The last accepted tuple.
        previous: Vec<u32>,
    },

    /// A filter was already registered for this dimension.
    #[error("Duplicate filter for dimension {dimension}")]
    DuplicateFilter {
        /// Zero-based dimension.
        dimension: usize,
    },

    /// An acronym with this code already exists.
    #[error("Duplicate acronym code {code}")]
    DuplicateAcronym {
        /// The acronym code.
        code: i32,
    },

    /// A label, index or symbol lookup missed.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A declaration or record failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An invalid argument was provided.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The session is in the wrong state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A configuration or JSON decoding error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Creates a new corruption error.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Creates a new not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates a new validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Creates a new invalid state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Returns true for errors after which the session must be discarded.
    ///
    /// Storage and integrity failures are fatal; validation failures are
    /// reported per call and leave the session usable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::Corruption(_)
                | Error::ChecksumMismatch { .. }
                | Error::TruncatedStream { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
