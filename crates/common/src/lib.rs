//! Shared utilities for the threshold signing workspace.

pub mod observability;

pub use observability::{init_tracing, EventType, LogEvent};
