//! Scan Orchestrator — routes scanned-paper envelopes into case actions.

pub mod backend;
pub mod callback;
pub mod config;
pub mod error;
pub mod model;
pub mod payments;
pub mod processing;
pub mod queue;
pub mod server;
pub mod transformation;
