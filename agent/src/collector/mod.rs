//! Ingestion path
//!
//! Every delivered event goes through `EventCollector::ingest`: classify,
//! then either serialize and append to the shared buffer or append its body
//! chunk to disk. Failures are confined to the event that caused them.

pub mod body;

pub use body::BodyCapture;

use crate::buffer::SharedBuffer;
use crate::filter::{Classification, FilterTable};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use wptetw_shared::types::events::TraceEvent;
use wptetw_shared::types::record::OutputRecord;

/// Counters for the ingestion path
#[derive(Debug, Default)]
struct Counters {
    kept: AtomicU64,
    dropped: AtomicU64,
    bodies: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of ingestion counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorStats {
    pub kept: u64,
    pub dropped: u64,
    pub bodies: u64,
    pub failed: u64,
}

/// Classifies, serializes and buffers delivered events
#[derive(Debug)]
pub struct EventCollector {
    filter: FilterTable,
    buffer: Arc<SharedBuffer>,
    bodies: BodyCapture,
    counters: Counters,
}

impl EventCollector {
    pub fn new(filter: FilterTable, buffer: Arc<SharedBuffer>, bodies: BodyCapture) -> Self {
        Self {
            filter,
            buffer,
            bodies,
            counters: Counters::default(),
        }
    }

    pub fn filter(&self) -> &FilterTable {
        &self.filter
    }

    pub fn buffer(&self) -> &Arc<SharedBuffer> {
        &self.buffer
    }

    /// Handle one delivered event. Never fails.
    pub fn ingest(&self, event: &TraceEvent) {
        match self.filter.classify(event) {
            Classification::Drop => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            }
            Classification::Body { activity, payload } => {
                match self.bodies.append(activity, payload) {
                    Ok(true) => {
                        self.counters.bodies.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(false) => {}
                    Err(e) => {
                        self.counters.failed.fetch_add(1, Ordering::Relaxed);
                        warn!("Skipping body chunk: {:#}", e);
                    }
                }
            }
            Classification::Keep { name } => {
                match OutputRecord::from_event(event, name).to_line() {
                    Ok(line) => {
                        self.buffer.append(&line);
                        self.counters.kept.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        self.counters.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            "Dropping {} event {} ({}): {}",
                            event.provider, event.id, name, e
                        );
                    }
                }
            }
        }
    }

    pub fn stats(&self) -> CollectorStats {
        let stats = CollectorStats {
            kept: self.counters.kept.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            bodies: self.counters.bodies.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        };
        debug!("Collector stats: {:?}", stats);
        stats
    }
}
