//! Error types shared across Warband crates.

use thiserror::Error;

/// Top-level error type for Warband operations.
#[derive(Debug, Error)]
pub enum WarbandError {
    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Data was written by an unreadable schema version
    #[error("Schema version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Expected version
        expected: String,
        /// Actual version found
        actual: String,
    },

    /// Data did not start with the expected magic bytes
    #[error("Bad magic bytes: expected {expected:?}, got {actual:?}")]
    BadMagic {
        /// Expected magic
        expected: [u8; 4],
        /// Magic found in the data
        actual: [u8; 4],
    },
}

/// Result type alias for Warband operations.
pub type WarbandResult<T> = Result<T, WarbandError>;
