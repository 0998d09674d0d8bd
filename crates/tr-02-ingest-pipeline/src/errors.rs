//! Pipeline error types.

use shared_crypto::{CryptoError, ValidationError};
use thiserror::Error;
use tr_01_aggregation_store::StoreError;

/// Why one envelope was rejected.
///
/// Rejections are counted and logged; none is ever sent back to the producer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("decrypt failed: {0}")]
    Decrypt(#[from] CryptoError),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("store write failed after {attempts} attempt(s): {source}")]
    Store {
        attempts: u32,
        #[source]
        source: StoreError,
    },
}

impl PipelineError {
    /// Metric label for this rejection.
    pub fn reason(&self) -> &'static str {
        match self {
            PipelineError::Decrypt(_) => "decrypt",
            PipelineError::Validation(_) => "validation",
            PipelineError::Store { .. } => "store",
        }
    }
}

/// Errors submitting a batch to the ingest dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("ingest dispatcher is not running")]
    Closed,
}
