//! # Wire Events
//!
//! Every frame exchanged over a hub connection is one JSON object of the form
//! `{"event": <name>, "data": <payload>}`; control events carry no `data`.
//!
//! | Event | Direction |
//! |-------|-----------|
//! | `dataStream` | Producer → Hub |
//! | `startEmitting` / `stopEmitting` | Observer → Hub → Producer |
//! | `newData` | Hub → Observers |

use crate::entities::{StatsSnapshot, StoredRecord};
use crate::errors::WireError;
use serde::{Deserialize, Serialize};

/// Broadcast sent to observers for the latest accepted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDataPayload {
    #[serde(flatten)]
    pub record: StoredRecord,
    pub stats: StatsSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum WireEvent {
    /// One batch of `|`-joined envelopes.
    DataStream(String),
    StartEmitting,
    StopEmitting,
    NewData(NewDataPayload),
}

impl WireEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WireEvent::DataStream(_) => "dataStream",
            WireEvent::StartEmitting => "startEmitting",
            WireEvent::StopEmitting => "stopEmitting",
            WireEvent::NewData(_) => "newData",
        }
    }

    pub fn to_json(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, WireError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Control events map onto the emitting flag value they request.
    pub fn requested_emitting(&self) -> Option<bool> {
        match self {
            WireEvent::StartEmitting => Some(true),
            WireEvent::StopEmitting => Some(false),
            _ => None,
        }
    }
}
