//! WebSocket surface: role handshake and per-connection loops.

pub mod connection;
pub mod handler;
pub mod handshake;

pub use connection::{Connection, ConnectionState};
pub use handler::ws_handler;
pub use handshake::{resolve_role, HandshakeError, HandshakeQuery, ROLE_HEADER};
