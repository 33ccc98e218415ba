//! Error types for recache
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Expected conditions are not errors here: a missing record surfaces as
//! `None`, malformed persisted data soft-fails to "absent". Errors are for
//! genuine misuse (bad paths, bad configuration) and I/O at the storage
//! boundary.

use std::io;
use thiserror::Error;

/// Result type alias for recache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the record cache
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file operations at the storage boundary)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Child-path error (parse failure or structural mismatch)
    #[error("Path error: {0}")]
    Path(#[from] PathError),

    /// Invalid manager configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Child-path errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    /// Empty path or empty segment
    #[error("empty path segment")]
    Empty,

    /// Leading segment must name a record field, not an index
    #[error("path must start with a field name")]
    LeadingIndex,

    /// Segment looked numeric but did not parse as an index
    #[error("invalid array index: {0}")]
    BadIndex(String),

    /// Descended into a value of the wrong shape
    #[error("path type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Shape the segment requires
        expected: &'static str,
        /// Shape actually stored
        found: &'static str,
    },

    /// Array index past the one-slot append window
    #[error("index {index} out of bounds for array of length {len}")]
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Current array length
        len: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_io() {
        let err = Error::Io(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_error_display_path() {
        let err = Error::Path(PathError::TypeMismatch {
            expected: "array",
            found: "Int",
        });
        let msg = err.to_string();
        assert!(msg.contains("type mismatch"));
        assert!(msg.contains("array"));
        assert!(msg.contains("Int"));
    }

    #[test]
    fn test_error_display_invalid_config() {
        let err = Error::InvalidConfig("persist requires a context".to_string());
        assert!(err.to_string().contains("persist requires a context"));
    }
}
