//! # Shared Crypto - Envelope Codec and Integrity Tags
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `symmetric` | AES-256-CTR | Per-record envelope encryption |
//! | `hashing` | SHA-256 | Key derivation, integrity tags |
//! | `integrity` | SHA-256 over canonical JSON | Field-level tamper evidence |
//!
//! ## Envelope Format
//!
//! ```text
//! hex(iv) ":" hex(AES-256-CTR(key = SHA-256(secret), iv, JSON(record)))
//! ```
//!
//! The IV is 16 random bytes per envelope and serves as the initial 128-bit
//! big-endian counter block.
//!
//! ## Security Properties
//!
//! - CTR mode provides confidentiality only; it does not authenticate the
//!   ciphertext.
//! - The integrity tag is an unkeyed hash. Anyone able to read or forge a
//!   payload can recompute it, so it detects accidental corruption and naive
//!   field edits, not an adversary. A keyed MAC would close this gap and is
//!   intentionally not substituted here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod hashing;
pub mod integrity;
pub mod symmetric;

// Re-exports
pub use errors::{CryptoError, ValidationError};
pub use hashing::{sha256, sha256_hex};
pub use integrity::{canonicalize, compute_integrity_tag, seal, validate_payload, validate_record};
pub use symmetric::{decrypt_record, encrypt_record, Envelope, Iv, SecretKey, IV_LEN};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
