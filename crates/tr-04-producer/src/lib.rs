//! TR-04 Producer - synthetic record source for the telemetry relay.
//!
//! Generates `{name, origin, destination}` records from sample pools, seals
//! each with its integrity tag, encrypts it into an envelope and ships
//! `|`-joined batches to the hub over WebSocket while the hub asks for them.
//!
//! # Usage
//!
//! ```ignore
//! use tr_04_producer::{BatchBuilder, Emitter, ProducerConfig, SampleData};
//!
//! let config = ProducerConfig::from_env()?;
//! let builder = BatchBuilder::new(key, SampleData::default(), 49, 499)?;
//! Emitter::new(config, builder).run(shutdown_rx).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod emitter;
pub mod error;
pub mod generator;

pub use config::{normalize_listener_url, ProducerConfig, DEFAULT_LISTENER_URL};
pub use emitter::{EmissionState, Emitter, Transition};
pub use error::ProducerError;
pub use generator::{Batch, BatchBuilder, SampleData};
