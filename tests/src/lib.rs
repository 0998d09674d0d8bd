//! # Telemetry Relay Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs   # Shared builders: keys, envelopes, recording fan-out
//!     ├── flows.rs      # Pipeline + store + stats, concurrency, retention
//!     ├── fanout.rs     # Pipeline feeding the fan-out throttle
//!     └── hub.rs        # Live hub over WebSocket: roles, control, round trip
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p tr-tests
//! cargo test -p tr-tests integration::hub::
//! cargo bench -p tr-tests
//! ```

#![allow(dead_code)]

pub mod integration;
