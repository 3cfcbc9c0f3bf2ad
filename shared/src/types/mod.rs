//! Trace event and output record definitions

pub mod events;
pub mod record;
