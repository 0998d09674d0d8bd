//! # TR-02: Ingest Pipeline
//!
//! ## Flow
//!
//! ```text
//! dataStream(batch) ──▶ IngestHandle ──mpsc──▶ ingest dispatcher (single task)
//!                                                  │
//!                                                  ▼
//!                                   Pipeline::process_batch
//!         split '|' ─▶ decrypt ─▶ validate ─▶ store.append ─▶ FanoutPort
//!                          └──────────┴───────────┴── reject: count + log
//! ```
//!
//! ## Counting
//!
//! `totalReceived` grows by the envelope count before any envelope is
//! processed. `totalProcessed` and `totalErrors` grow once the whole batch is
//! done, and the success rate is recomputed then. A bad envelope never aborts
//! its siblings.

pub mod dispatcher;
pub mod errors;
pub mod pipeline;
pub mod ports;
pub mod stats;

pub use dispatcher::{spawn_ingest_dispatcher, IngestHandle, DEFAULT_INGEST_QUEUE};
pub use errors::{IngestError, PipelineError};
pub use pipeline::{BatchReport, EnvelopeOutcome, Pipeline, PipelineConfig};
pub use ports::{FanoutPort, NoopFanout};
pub use stats::StatsTracker;
