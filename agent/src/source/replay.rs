//! Replay of a recorded session
//!
//! Reads newline-delimited JSON `TraceEvent`s from a file or stdin. Lines
//! are read on a dedicated thread so a blocked read never delays shutdown.

use super::channel::POLL_INTERVAL;
use super::{EventSource, ProviderSubscription, SourceError, SubscriptionSet};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wptetw_shared::types::events::TraceEvent;

/// Lines buffered between the reader thread and delivery
const LINE_BACKLOG: usize = 4096;

/// Event source replaying newline-delimited JSON events
pub struct ReplaySource {
    reader: Option<Box<dyn BufRead + Send>>,
    label: String,
    subscriptions: SubscriptionSet,
    hold_open: bool,
}

impl ReplaySource {
    pub fn new(reader: impl BufRead + Send + 'static, label: impl Into<String>) -> Self {
        Self {
            reader: Some(Box::new(reader)),
            label: label.into(),
            subscriptions: SubscriptionSet::new(),
            hold_open: true,
        }
    }

    /// Replay from stdin
    pub fn stdin() -> Self {
        Self::new(BufReader::new(io::stdin()), "stdin")
    }

    /// Replay from `path`; `-` means stdin
    pub fn open(path: &Path) -> io::Result<Self> {
        if path.as_os_str() == "-" {
            return Ok(Self::stdin());
        }
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file), path.display().to_string()))
    }

    /// Keep the session open after the input ends, until cancelled
    /// (default). A drained recording then behaves like a quiet live session.
    pub fn hold_open(mut self, hold: bool) -> Self {
        self.hold_open = hold;
        self
    }

    pub fn subscriptions(&self) -> &SubscriptionSet {
        &self.subscriptions
    }
}

impl EventSource for ReplaySource {
    fn describe(&self) -> String {
        format!("replay of {}", self.label)
    }

    fn enable_provider(&mut self, subscription: &ProviderSubscription) -> Result<(), SourceError> {
        debug!(
            "Enabling {} (level {}, keywords {:#x}, {} ids)",
            subscription.provider,
            subscription.level,
            subscription.keywords,
            subscription.event_ids.len()
        );
        self.subscriptions.enable(subscription);
        Ok(())
    }

    fn process(
        &mut self,
        cancel: &CancellationToken,
        on_event: &mut dyn FnMut(&TraceEvent),
    ) -> Result<(), SourceError> {
        let Some(mut reader) = self.reader.take() else {
            return Ok(());
        };

        let (tx, rx) = mpsc::sync_channel::<io::Result<String>>(LINE_BACKLOG);
        std::thread::Builder::new()
            .name("replay-reader".to_string())
            .spawn(move || loop {
                let mut line = String::new();
                match reader.read_line(&mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        if tx.send(Ok(line)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            })?;

        let mut line_no = 0u64;
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(Ok(line)) => {
                    line_no += 1;
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<TraceEvent>(line) {
                        Ok(event) => {
                            if self.subscriptions.admits(&event) {
                                on_event(&event);
                            }
                        }
                        Err(e) => warn!("Skipping malformed event on line {}: {}", line_no, e),
                    }
                }
                Ok(Err(e)) => return Err(SourceError::Io(e)),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        info!("{} exhausted after {} line(s)", self.describe(), line_no);
        if self.hold_open {
            while !cancel.is_cancelled() {
                std::thread::sleep(POLL_INTERVAL);
            }
        }
        Ok(())
    }
}
