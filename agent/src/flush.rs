//! Periodic flush of buffered records to the collector
//!
//! The loop wakes every `flush_interval`, swaps the buffer out under its
//! lock and posts the batch after the lock is released, so a slow collector
//! never holds up ingestion. A failed post discards the batch. Every
//! `done_check_every` wakes it also looks for the termination sentinel.

use crate::buffer::SharedBuffer;
use crate::config::Config;
use crate::sink::{Sink, STARTUP_NOTICE};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counters kept by the flush loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub wakes: u64,
    pub batches_sent: u64,
    pub batches_failed: u64,
    pub bytes_sent: u64,
}

/// Background task draining the shared buffer into a sink
pub struct FlushLoop {
    buffer: Arc<SharedBuffer>,
    sink: Arc<dyn Sink>,
    interval: Duration,
    done_check_every: u32,
    done_file: Option<PathBuf>,
    cancel: CancellationToken,
    stats: FlushStats,
}

impl FlushLoop {
    pub fn new(
        config: &Config,
        buffer: Arc<SharedBuffer>,
        sink: Arc<dyn Sink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            buffer,
            sink,
            interval: config.flush_interval,
            done_check_every: config.done_check_every.max(1),
            done_file: config.done_file.clone(),
            cancel,
            stats: FlushStats::default(),
        }
    }

    /// Run until cancelled or until the sentinel is found.
    ///
    /// Records buffered after the last wake are not flushed on exit.
    pub async fn run(mut self) -> FlushStats {
        if let Err(e) = self.sink.post(STARTUP_NOTICE.to_string()).await {
            debug!("Startup notice not delivered: {:#}", e);
        }

        let mut wakes_since_check = 0u32;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }

            self.stats.wakes += 1;
            self.flush_once().await;

            wakes_since_check += 1;
            if wakes_since_check >= self.done_check_every {
                wakes_since_check = 0;
                if self.take_done_signal() {
                    info!("Termination sentinel found; stopping");
                    self.cancel.cancel();
                    break;
                }
            }
        }

        info!(
            "Flush loop exiting: {} batch(es) sent ({} bytes), {} discarded",
            self.stats.batches_sent, self.stats.bytes_sent, self.stats.batches_failed
        );
        self.stats
    }

    /// Drain the buffer and post it. Returns whether anything was posted.
    pub async fn flush_once(&mut self) -> bool {
        let batch = self.buffer.drain();
        if batch.is_empty() {
            return false;
        }

        let len = batch.len() as u64;
        match self.sink.post(batch).await {
            Ok(()) => {
                self.stats.batches_sent += 1;
                self.stats.bytes_sent += len;
                true
            }
            Err(e) => {
                self.stats.batches_failed += 1;
                warn!("Discarding batch of {} bytes: {:#}", len, e);
                false
            }
        }
    }

    /// Consume the sentinel if present
    fn take_done_signal(&self) -> bool {
        let Some(path) = self.done_file.as_ref() else {
            return false;
        };
        if !path.exists() {
            return false;
        }
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
        true
    }

    pub fn stats(&self) -> FlushStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records every post; fails the posts whose index is listed
    #[derive(Default)]
    struct RecordingSink {
        posts: Mutex<Vec<String>>,
        calls: AtomicUsize,
        fail_calls: Vec<usize>,
    }

    impl RecordingSink {
        fn failing_on(calls: &[usize]) -> Self {
            Self {
                fail_calls: calls.to_vec(),
                ..Default::default()
            }
        }

        fn posts(&self) -> Vec<String> {
            self.posts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Sink for RecordingSink {
        async fn post(&self, body: String) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_calls.contains(&call) {
                bail!("collector unavailable");
            }
            self.posts.lock().unwrap().push(body);
            Ok(())
        }
    }

    fn test_config(interval_ms: u64, done_file: Option<PathBuf>) -> Config {
        Config {
            flush_interval: Duration::from_millis(interval_ms),
            done_check_every: 2,
            done_file,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_flush_once_skips_empty_buffer() {
        let sink = Arc::new(RecordingSink::default());
        let buffer = Arc::new(SharedBuffer::with_capacity(0));
        let mut flush = FlushLoop::new(
            &test_config(10, None),
            buffer.clone(),
            sink.clone(),
            CancellationToken::new(),
        );

        assert!(!flush.flush_once().await);
        assert!(sink.posts().is_empty());

        buffer.append("a\n");
        buffer.append("b\n");
        assert!(flush.flush_once().await);
        assert_eq!(sink.posts(), vec!["a\nb\n".to_string()]);
        assert!(buffer.is_empty());
        assert_eq!(flush.stats().bytes_sent, 4);
    }

    #[tokio::test]
    async fn test_failed_batch_discarded_next_flush_succeeds() {
        let sink = Arc::new(RecordingSink::failing_on(&[0]));
        let buffer = Arc::new(SharedBuffer::with_capacity(0));
        let mut flush = FlushLoop::new(
            &test_config(10, None),
            buffer.clone(),
            sink.clone(),
            CancellationToken::new(),
        );

        buffer.append("lost\n");
        assert!(!flush.flush_once().await);
        assert!(buffer.is_empty());

        buffer.append("kept\n");
        assert!(flush.flush_once().await);
        assert_eq!(sink.posts(), vec!["kept\n".to_string()]);
        assert_eq!(flush.stats().batches_failed, 1);
        assert_eq!(flush.stats().batches_sent, 1);
    }

    #[tokio::test]
    async fn test_run_sends_notice_then_batches() {
        let sink = Arc::new(RecordingSink::default());
        let buffer = Arc::new(SharedBuffer::with_capacity(0));
        let cancel = CancellationToken::new();
        buffer.append("{\"n\":1}\n");

        let handle = tokio::spawn(
            FlushLoop::new(&test_config(5, None), buffer.clone(), sink.clone(), cancel.clone())
                .run(),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        let stats = handle.await.unwrap();

        let posts = sink.posts();
        assert_eq!(posts[0], STARTUP_NOTICE);
        assert_eq!(posts[1..], ["{\"n\":1}\n".to_string()]);
        assert_eq!(stats.batches_sent, 1);
        assert!(stats.wakes >= 2);
    }

    #[tokio::test]
    async fn test_startup_notice_failure_ignored() {
        let sink = Arc::new(RecordingSink::failing_on(&[0]));
        let buffer = Arc::new(SharedBuffer::with_capacity(0));
        let cancel = CancellationToken::new();
        buffer.append("x\n");

        let handle = tokio::spawn(
            FlushLoop::new(&test_config(5, None), buffer, sink.clone(), cancel.clone()).run(),
        );
        tokio::time::sleep(Duration::from_millis(60)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(sink.posts(), vec!["x\n".to_string()]);
    }

    #[tokio::test]
    async fn test_sentinel_stops_loop_and_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let done = dir.path().join("wpt-etw.done");
        std::fs::write(&done, b"").unwrap();

        let sink = Arc::new(RecordingSink::default());
        let cancel = CancellationToken::new();
        let flush = FlushLoop::new(
            &test_config(5, Some(done.clone())),
            Arc::new(SharedBuffer::with_capacity(0)),
            sink,
            cancel.clone(),
        );

        let stats = tokio::time::timeout(Duration::from_secs(2), flush.run())
            .await
            .expect("flush loop did not observe the sentinel");

        assert!(cancel.is_cancelled());
        assert!(!done.exists());
        assert_eq!(stats.wakes, 2);
    }

    #[tokio::test]
    async fn test_no_sentinel_keeps_running() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let flush = FlushLoop::new(
            &test_config(5, Some(dir.path().join("absent.done"))),
            Arc::new(SharedBuffer::with_capacity(0)),
            Arc::new(RecordingSink::default()),
            cancel.clone(),
        );

        let result = tokio::time::timeout(Duration::from_millis(80), flush.run()).await;
        assert!(result.is_err());
        assert!(!cancel.is_cancelled());
    }
}
