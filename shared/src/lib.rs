//! Shared types and utilities for wpt-etw
//!
//! This crate contains the trace event model delivered by event sources and
//! the output record format forwarded to the collector.

pub mod types;
pub mod utils;

// Re-export commonly used types
pub use types::{events::*, record::*};
