//! Crypto error types.

use thiserror::Error;

/// Envelope decoding and decryption errors.
///
/// Every variant means the envelope is dropped; none of them is reported back
/// to the producer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Envelope is not exactly `iv:ciphertext`
    #[error("Malformed envelope: expected 2 parts separated by ':', got {parts}")]
    MalformedEnvelope {
        /// Number of `:`-separated parts found
        parts: usize,
    },

    /// A hex section failed to decode
    #[error("Invalid hex in envelope {section}: {reason}")]
    InvalidHex {
        /// `iv` or `ciphertext`
        section: &'static str,
        /// Decoder message
        reason: String,
    },

    /// Invalid IV length
    #[error("Invalid IV length: expected {expected}, got {actual}")]
    InvalidIvLength {
        /// Expected IV length in bytes
        expected: usize,
        /// Actual IV length in bytes
        actual: usize,
    },

    /// Decrypted bytes are not UTF-8 (usually a wrong key)
    #[error("Decrypted payload is not valid UTF-8")]
    InvalidUtf8,

    /// Decrypted text is not JSON
    #[error("Decrypted payload is not JSON: {0}")]
    InvalidPayload(String),

    /// Plaintext could not be serialized before encryption
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
}

/// Integrity validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or not a non-empty string
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Recomputed tag differs from the embedded one
    #[error("Integrity tag mismatch: expected {expected}, got {actual}")]
    TagMismatch {
        /// Tag recomputed from the record fields
        expected: String,
        /// Tag carried by the record
        actual: String,
    },
}
