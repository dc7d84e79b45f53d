//! Record store error types.

use thiserror::Error;

/// Errors raised while reading authoritative records.
#[derive(Debug, Clone, Error)]
pub enum RecordStoreError {
    /// The store could not be reached or read.
    #[error("Read error: {0}")]
    ReadError(String),

    /// A stored record could not be decoded.
    #[error("Decode error at line {line}: {message}")]
    DecodeError { line: usize, message: String },
}

impl RecordStoreError {
    /// Create a read error.
    pub fn read(msg: impl Into<String>) -> Self {
        Self::ReadError(msg.into())
    }

    /// Create a decode error.
    pub fn decode(line: usize, msg: impl Into<String>) -> Self {
        Self::DecodeError {
            line,
            message: msg.into(),
        }
    }
}
