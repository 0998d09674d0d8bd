//! Ports for the aggregation store.

pub mod outbound;
