//! # Integrity Tags
//!
//! A record's tag is the lowercase hex SHA-256 of the compact JSON object
//! `{"name":..,"origin":..,"destination":..}` with keys in exactly that
//! order. String escaping follows serde_json, which agrees with the
//! ECMAScript `JSON.stringify` output for every Rust `str`.

use crate::errors::ValidationError;
use crate::hashing::sha256_hex;
use shared_types::{Record, RecordPayload};

fn json_string(value: &str) -> String {
    serde_json::Value::String(value.to_owned()).to_string()
}

/// Canonical text that the integrity tag is computed over.
pub fn canonicalize(name: &str, origin: &str, destination: &str) -> String {
    format!(
        "{{\"name\":{},\"origin\":{},\"destination\":{}}}",
        json_string(name),
        json_string(origin),
        json_string(destination)
    )
}

/// Compute the integrity tag for three record fields.
pub fn compute_integrity_tag(name: &str, origin: &str, destination: &str) -> String {
    sha256_hex(canonicalize(name, origin, destination).as_bytes())
}

/// Build a record carrying its own integrity tag.
pub fn seal(name: &str, origin: &str, destination: &str) -> Record {
    Record {
        name: name.to_owned(),
        origin: origin.to_owned(),
        destination: destination.to_owned(),
        integrity_tag: compute_integrity_tag(name, origin, destination),
    }
}

/// Check that the embedded tag matches the recomputed one.
///
/// # Errors
///
/// `TagMismatch` when the tags differ. The comparison is exact, so an
/// uppercase hex tag does not match.
pub fn validate_record(record: &Record) -> Result<(), ValidationError> {
    let expected = compute_integrity_tag(&record.name, &record.origin, &record.destination);
    if expected == record.integrity_tag {
        Ok(())
    } else {
        Err(ValidationError::TagMismatch {
            expected,
            actual: record.integrity_tag.clone(),
        })
    }
}

fn require(field: Option<String>, name: &'static str) -> Result<String, ValidationError> {
    match field {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ValidationError::MissingField(name)),
    }
}

/// Promote a decrypted payload to a validated [`Record`].
///
/// # Errors
///
/// `MissingField` for the first absent, empty or non-string field, then
/// `TagMismatch`.
pub fn validate_payload(payload: RecordPayload) -> Result<Record, ValidationError> {
    let record = Record {
        name: require(payload.name, "name")?,
        origin: require(payload.origin, "origin")?,
        destination: require(payload.destination, "destination")?,
        integrity_tag: require(payload.integrity_tag, "integrityTag")?,
    };
    validate_record(&record)?;
    Ok(record)
}
