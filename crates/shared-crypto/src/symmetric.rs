//! # Symmetric Encryption
//!
//! AES-256-CTR envelopes. The key is SHA-256 of the shared secret; each
//! envelope carries its own random 16-byte IV as `hex(iv):hex(ciphertext)`.

use crate::hashing::sha256;
use crate::CryptoError;
use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use shared_types::{Record, RecordPayload};
use std::fmt;
use zeroize::Zeroize;

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// IV length in bytes (one AES block).
pub const IV_LEN: usize = 16;

const ENVELOPE_SEPARATOR: char = ':';

/// Secret key (256-bit).
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretKey([u8; 32]);

impl SecretKey {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the cipher key from a shared secret: `SHA-256(secret)`.
    pub fn derive(shared_secret: &str) -> Self {
        Self(sha256(shared_secret.as_bytes()))
    }

    /// Generate random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// Get inner bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// Initialization vector, used as the initial big-endian counter block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Iv([u8; IV_LEN]);

impl Iv {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; IV_LEN]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh random IV. Never reuse an IV under the same key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; IV_LEN];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// Get inner bytes.
    pub fn as_bytes(&self) -> &[u8; IV_LEN] {
        &self.0
    }
}

/// One encrypted record on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    /// Per-envelope IV
    pub iv: Iv,
    /// AES-256-CTR ciphertext (same length as the plaintext)
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Encrypt `plaintext` under `key` with the given IV.
    pub fn seal_with_iv(key: &SecretKey, iv: Iv, plaintext: &[u8]) -> Self {
        let mut ciphertext = plaintext.to_vec();
        apply_keystream(key, &iv, &mut ciphertext);
        Self { iv, ciphertext }
    }

    /// Encrypt `plaintext` under `key` with a fresh random IV.
    pub fn seal(key: &SecretKey, plaintext: &[u8]) -> Self {
        Self::seal_with_iv(key, Iv::generate(), plaintext)
    }

    /// Decrypt back to plaintext bytes.
    ///
    /// CTR has no authentication, so a wrong key yields garbage rather than
    /// an error here; the caller detects it when decoding the plaintext.
    pub fn open(&self, key: &SecretKey) -> Vec<u8> {
        let mut plaintext = self.ciphertext.clone();
        apply_keystream(key, &self.iv, &mut plaintext);
        plaintext
    }

    /// Parse `hex(iv):hex(ciphertext)`.
    ///
    /// # Errors
    ///
    /// Fails on a wrong part count, invalid hex, or an IV that is not 16 bytes.
    pub fn parse(text: &str) -> Result<Self, CryptoError> {
        let parts: Vec<&str> = text.split(ENVELOPE_SEPARATOR).collect();
        let [iv_hex, ciphertext_hex] = parts[..] else {
            return Err(CryptoError::MalformedEnvelope { parts: parts.len() });
        };

        let iv_bytes = hex::decode(iv_hex).map_err(|e| CryptoError::InvalidHex {
            section: "iv",
            reason: e.to_string(),
        })?;
        let iv: [u8; IV_LEN] =
            iv_bytes
                .as_slice()
                .try_into()
                .map_err(|_| CryptoError::InvalidIvLength {
                    expected: IV_LEN,
                    actual: iv_bytes.len(),
                })?;

        let ciphertext = hex::decode(ciphertext_hex).map_err(|e| CryptoError::InvalidHex {
            section: "ciphertext",
            reason: e.to_string(),
        })?;

        Ok(Self {
            iv: Iv(iv),
            ciphertext,
        })
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            hex::encode(self.iv.as_bytes()),
            ENVELOPE_SEPARATOR,
            hex::encode(&self.ciphertext)
        )
    }
}

fn apply_keystream(key: &SecretKey, iv: &Iv, buf: &mut [u8]) {
    let mut cipher = Aes256Ctr::new(key.as_bytes().into(), iv.as_bytes().into());
    cipher.apply_keystream(buf);
}

/// Serialize a record to JSON and seal it into its wire form.
///
/// # Errors
///
/// Returns `CryptoError::EncryptionFailed` if the record cannot be serialized.
pub fn encrypt_record(key: &SecretKey, record: &Record) -> Result<String, CryptoError> {
    let plaintext =
        serde_json::to_vec(record).map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
    Ok(Envelope::seal(key, &plaintext).to_string())
}

/// Parse, decrypt and decode one envelope into an unvalidated payload.
///
/// # Errors
///
/// Any envelope, UTF-8 or JSON syntax failure. Field types, field presence
/// and the integrity tag are left to validation.
pub fn decrypt_record(key: &SecretKey, envelope: &str) -> Result<RecordPayload, CryptoError> {
    let plaintext = Envelope::parse(envelope)?.open(key);
    let text = std::str::from_utf8(&plaintext).map_err(|_| CryptoError::InvalidUtf8)?;
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| CryptoError::InvalidPayload(e.to_string()))?;
    Ok(RecordPayload::from_value(&value))
}
