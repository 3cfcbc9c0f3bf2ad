//! In-memory buffer of serialized records awaiting flush

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Initial capacity of the pending batch
const INITIAL_CAPACITY: usize = 2_000_000;

/// Pending record lines, shared by the ingestion path and the flush loop.
///
/// Both sides hold the lock only for an in-memory append or swap. A record
/// is appended whole, so a drain sees all of it or none of it.
#[derive(Debug)]
pub struct SharedBuffer {
    pending: Mutex<String>,
    appended: AtomicU64,
}

impl Default for SharedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending: Mutex::new(String::with_capacity(capacity)),
            appended: AtomicU64::new(0),
        }
    }

    // Poisoning is ignored: every append is a single push_str.
    fn lock(&self) -> MutexGuard<'_, String> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one newline-terminated record line
    pub fn append(&self, line: &str) {
        self.lock().push_str(line);
        self.appended.fetch_add(1, Ordering::Relaxed);
    }

    /// Take everything pending and leave the buffer empty
    pub fn drain(&self) -> String {
        std::mem::take(&mut *self.lock())
    }

    /// Bytes currently pending
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Records appended since creation
    pub fn appended(&self) -> u64 {
        self.appended.load(Ordering::Relaxed)
    }
}
