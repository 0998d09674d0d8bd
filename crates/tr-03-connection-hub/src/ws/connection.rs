//! Per-connection lifecycle.
//!
//! `Connecting → Classified → Active → Disconnected`. A reconnect is a new
//! [`Connection`]; nothing carries over except what the control dispatcher
//! keeps.

use shared_types::{ConnectionId, ConnectionRole};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Classified(ConnectionRole),
    Active(ConnectionRole),
    Disconnected,
}

#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    state: ConnectionState,
}

impl Connection {
    pub fn new() -> Self {
        Self {
            id: ConnectionId::new(),
            state: ConnectionState::Connecting,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Role once classified; `None` while connecting or after disconnect.
    pub fn role(&self) -> Option<ConnectionRole> {
        match self.state {
            ConnectionState::Classified(role) | ConnectionState::Active(role) => Some(role),
            _ => None,
        }
    }

    pub fn classify(&mut self, role: ConnectionRole) -> bool {
        self.transition(
            matches!(self.state, ConnectionState::Connecting),
            ConnectionState::Classified(role),
        )
    }

    pub fn activate(&mut self) -> bool {
        match self.state {
            ConnectionState::Classified(role) => self.transition(true, ConnectionState::Active(role)),
            _ => false,
        }
    }

    /// Valid from any state; a second call is a no-op.
    pub fn disconnect(&mut self) -> bool {
        self.transition(
            !matches!(self.state, ConnectionState::Disconnected),
            ConnectionState::Disconnected,
        )
    }

    fn transition(&mut self, allowed: bool, next: ConnectionState) -> bool {
        if allowed {
            debug!(component = "hub", connection_id = %self.id, from = ?self.state, to = ?next, "Connection state");
            self.state = next;
        }
        allowed
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}
