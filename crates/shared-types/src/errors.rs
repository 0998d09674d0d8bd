//! # Error Types
//!
//! Errors for parsing shared wire types.

use thiserror::Error;

/// Handshake carried a role the hub does not know.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown connection role: {0:?}")]
pub struct ParseRoleError(pub String);

/// A wire frame could not be encoded or decoded.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed wire event: {0}")]
    Malformed(#[from] serde_json::Error),
}
