//! TR-03 Connection Hub - WebSocket and HTTP surface of the telemetry relay.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                      CONNECTION HUB (tr-03)                        │
//! ├───────────────────────────────────────────────────────────────────┤
//! │   /ws?role=producer        /ws?role=observer       HTTP routes    │
//! │          │                        ▲   │            /health        │
//! │     dataStream               newData  │ start/stop /stats         │
//! │          │                        │   │            /control/*     │
//! │          ▼                        │   ▼            /metrics       │
//! │  ┌───────────────┐   ┌──────────────┐  ┌──────────────────┐       │
//! │  │Ingest dispatch│──▶│Fan-out       │  │Control dispatch  │       │
//! │  │(Pipeline)     │   │throttle      │  │producer + flag   │       │
//! │  └───────┬───────┘   └──────────────┘  └────────┬─────────┘       │
//! │          ▼                                      │ start/stop      │
//! │   Bucket store ◀── retention sweeper            ▼                 │
//! │                                          current producer         │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use tr_03_connection_hub::{HubConfig, HubService};
//!
//! let config = HubConfig::from_env()?;
//! let service = HubService::new(config)?;
//! service.start(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod domain;
pub mod middleware;
pub mod service;
pub mod ws;

pub use domain::config::{
    ConfigError, CorsConfig, CryptoConfig, FanoutConfig, HubConfig, IngestConfig, ServerConfig,
    StoreBackend, StoreConfig,
};
pub use domain::control::{
    spawn_control_dispatcher, CommandSource, ControlHandle, ControlStatus, DEFAULT_CONTROL_QUEUE,
};
pub use domain::error::HubError;
pub use domain::fanout::FanoutThrottle;
pub use service::{HubService, HubState};
pub use ws::{resolve_role, Connection, ConnectionState, HandshakeError, ROLE_HEADER};
