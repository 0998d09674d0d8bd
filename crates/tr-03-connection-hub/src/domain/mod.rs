//! Hub domain: configuration, control plane and fan-out.

pub mod config;
pub mod control;
pub mod error;
pub mod fanout;
