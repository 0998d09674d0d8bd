//! # Shared Types Crate
//!
//! Domain entities and wire events shared by every relay component.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: the record, bucket and stats layouts are
//!   defined once here and reused by the producer, the pipeline and the hub.
//! - **Wire Compatibility**: field names serialize in camelCase to match the
//!   JSON layout observers and producers exchange.

pub mod connection;
pub mod entities;
pub mod errors;
pub mod ipc;
pub mod shutdown;

pub use connection::{ConnectionId, ConnectionRole};
pub use entities::*;
pub use errors::*;
pub use ipc::{NewDataPayload, WireEvent};
pub use shutdown::shutdown_requested;

/// Separator between envelopes inside one batch string.
pub const ENVELOPE_DELIMITER: char = '|';

/// Split a batch string into its envelopes.
///
/// An empty batch yields a single empty envelope, mirroring how the wire
/// format counts it as one (malformed) unit.
pub fn split_batch(batch: &str) -> Vec<&str> {
    batch.split(ENVELOPE_DELIMITER).collect()
}

/// Join envelopes into one batch string.
pub fn join_batch<S: AsRef<str>>(envelopes: &[S]) -> String {
    let mut out = String::new();
    for (i, envelope) in envelopes.iter().enumerate() {
        if i > 0 {
            out.push(ENVELOPE_DELIMITER);
        }
        out.push_str(envelope.as_ref());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_batch() {
        assert_eq!(split_batch("a:b|c:d|e:f"), vec!["a:b", "c:d", "e:f"]);
        assert_eq!(split_batch(""), vec![""]);
    }

    #[test]
    fn test_join_batch() {
        assert_eq!(join_batch(&["a:b", "c:d"]), "a:b|c:d");
        assert_eq!(join_batch::<&str>(&[]), "");
    }
}
