//! Error types for the remora-core library.
//!
//! This module provides error handling using the `thiserror` crate, with
//! detailed error variants for different failure modes.
//!
//! Note that most codec read operations intentionally do *not* return these
//! errors: absence of a field is a routine condition for schema-less wire
//! data, so reads yield `Option` and reserve `Error` for structurally
//! invalid input and I/O.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for remora operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all remora operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write output file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        /// Path to the file that failed to write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Invalid protobuf wire format
    #[error("invalid wire format at offset {offset}: {details}")]
    InvalidWireFormat {
        /// Byte offset where the error occurred
        offset: usize,
        /// Detailed description of the issue
        details: String,
    },

    /// Failed to decode varint
    #[error("failed to decode varint at offset {offset}: buffer too small or invalid encoding")]
    VarintDecode {
        /// Byte offset where the error occurred
        offset: usize,
    },

    /// Invalid field number on the wire
    #[error("invalid field number {number}: must be between 1 and {max}")]
    InvalidFieldNumber {
        /// The invalid field number
        number: u32,
        /// Maximum valid field number
        max: u32,
    },

    /// Failed to parse a class index document
    #[error("failed to parse class index: {0}")]
    IndexParse(#[from] serde_json::Error),

    /// Generic internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new file write error
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a new wire format error
    pub fn invalid_wire_format(offset: usize, details: impl Into<String>) -> Self {
        Self::InvalidWireFormat {
            offset,
            details: details.into(),
        }
    }

    /// Creates a new varint decode error
    pub fn varint_decode(offset: usize) -> Self {
        Self::VarintDecode { offset }
    }

    /// Creates a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true if this is a recoverable error that should be skipped
    ///
    /// Wire-level errors are recoverable: the host format is versioned and
    /// unknown, so a partial parse is the normal case rather than a fault.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidWireFormat { .. }
                | Self::VarintDecode { .. }
                | Self::InvalidFieldNumber { .. }
        )
    }
}
