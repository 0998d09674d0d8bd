//! Outbound port to the hub's fan-out.

use shared_types::NewDataPayload;

/// Receives every accepted record together with a stats snapshot.
///
/// Implementations decide how often observers actually see a broadcast; the
/// pipeline offers every record and never waits on delivery.
pub trait FanoutPort: Send + Sync {
    fn offer(&self, payload: NewDataPayload);
}

/// Discards everything. Used when no observers are wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFanout;

impl FanoutPort for NoopFanout {
    fn offer(&self, _payload: NewDataPayload) {}
}
