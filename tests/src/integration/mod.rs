//! Cross-crate integration flows.

pub mod fixtures;

mod fanout;
mod flows;
mod hub;
