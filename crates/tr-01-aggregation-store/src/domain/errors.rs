//! # Store Errors

use thiserror::Error;

/// Errors raised by a bucket store backend.
///
/// A full bucket is not an error; see [`crate::AppendOutcome::Dropped`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backend failed to read or write.
    #[error("Storage I/O error: {message}")]
    Io { message: String },

    /// A stored bucket could not be encoded or decoded.
    #[error("Bucket serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }
}
