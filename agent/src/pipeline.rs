//! Agent lifecycle
//!
//! `Pipeline::configure` enables every provider on the source and fails the
//! whole start if any of them is refused. `Pipeline::run` then drives two
//! tasks: event delivery on a blocking thread (the source's `process` call)
//! and the flush loop on the runtime. Either Ctrl-C, the termination
//! sentinel or the end of delivery cancels the shared token, and the run
//! returns once both tasks have finished.

use crate::buffer::SharedBuffer;
use crate::collector::{BodyCapture, EventCollector};
use crate::config::Config;
use crate::filter::{CustomProviders, FilterTable};
use crate::flush::FlushLoop;
use crate::sink::Sink;
use crate::source::EventSource;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wptetw_shared::types::events::TraceEvent;

/// Lifecycle states, in the order they are entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineState {
    Uninitialized = 0,
    Configured = 1,
    Running = 2,
    Stopping = 3,
    Stopped = 4,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Configured,
            2 => Self::Running,
            3 => Self::Stopping,
            4 => Self::Stopped,
            _ => Self::Uninitialized,
        }
    }
}

/// Shared view of the pipeline state, readable while the pipeline runs
#[derive(Debug, Clone, Default)]
pub struct Lifecycle(Arc<AtomicU8>);

impl Lifecycle {
    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: PipelineState) {
        let previous = PipelineState::from_u8(self.0.swap(state as u8, Ordering::AcqRel));
        debug!("Pipeline {:?} -> {:?}", previous, state);
    }
}

/// A configured agent, ready to run
pub struct Pipeline {
    config: Config,
    collector: Arc<EventCollector>,
    source: Box<dyn EventSource>,
    sink: Arc<dyn Sink>,
    cancel: CancellationToken,
    lifecycle: Lifecycle,
}

impl Pipeline {
    /// Build the filter table and enable its providers on `source`
    pub fn configure(
        config: Config,
        custom: CustomProviders,
        mut source: Box<dyn EventSource>,
        sink: Arc<dyn Sink>,
    ) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let bodies = BodyCapture::new(config.body_dir.as_deref());
        let filter = FilterTable::new(custom, bodies.is_enabled());

        for subscription in filter.subscriptions() {
            source.enable_provider(&subscription).with_context(|| {
                format!(
                    "Failed to enable {} on session {}",
                    subscription.provider, config.session_name
                )
            })?;
            debug!(
                "Enabled {} (level {}, keywords {:#x}, {} event id(s))",
                subscription.provider,
                subscription.level,
                subscription.keywords,
                subscription.event_ids.len()
            );
        }

        let collector = Arc::new(EventCollector::new(
            filter,
            Arc::new(SharedBuffer::new()),
            bodies,
        ));

        let lifecycle = Lifecycle::default();
        lifecycle.set(PipelineState::Configured);

        Ok(Self {
            config,
            collector,
            source,
            sink,
            cancel: CancellationToken::new(),
            lifecycle,
        })
    }

    /// Token that stops the pipeline when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.clone()
    }

    pub fn state(&self) -> PipelineState {
        self.lifecycle.state()
    }

    pub fn buffer(&self) -> &Arc<SharedBuffer> {
        self.collector.buffer()
    }

    pub fn filter(&self) -> &FilterTable {
        self.collector.filter()
    }

    /// Run until cancelled, the sentinel appears, or the source ends.
    ///
    /// A source failure after start is logged and treated as a shutdown.
    pub async fn run(self) -> Result<()> {
        let Pipeline {
            config,
            collector,
            mut source,
            sink,
            cancel,
            lifecycle,
        } = self;

        let flush = FlushLoop::new(&config, collector.buffer().clone(), sink, cancel.clone());
        let flush_handle = tokio::spawn(flush.run());

        let delivery = {
            let cancel = cancel.clone();
            let lifecycle = lifecycle.clone();
            let collector = collector.clone();
            tokio::task::spawn_blocking(move || {
                lifecycle.set(PipelineState::Running);
                info!("Processing events from {}", source.describe());
                source.process(&cancel, &mut |event: &TraceEvent| collector.ingest(event))
            })
        };

        let outcome = delivery.await;
        lifecycle.set(PipelineState::Stopping);
        cancel.cancel();

        match outcome {
            Ok(Ok(())) => debug!("Event delivery ended"),
            Ok(Err(e)) => error!("Event source failed: {}", e),
            Err(e) => error!("Event delivery task failed: {}", e),
        }

        match flush_handle.await {
            Ok(stats) => debug!("Flush stats: {:?}", stats),
            Err(e) => warn!("Flush task failed: {}", e),
        }

        let stats = collector.stats();
        info!(
            "Forwarded {} record(s), captured {} body chunk(s), dropped {}, failed {}",
            stats.kept, stats.bodies, stats.dropped, stats.failed
        );
        let unsent = collector.buffer().len();
        if unsent > 0 {
            info!("{} byte(s) buffered after the last flush were not sent", unsent);
        }

        lifecycle.set(PipelineState::Stopped);
        Ok(())
    }
}
