//! Trace Event Forwarding Agent Library
//!
//! This library provides the capture side of the page-load tracer: it
//! subscribes to the browser networking and rendering providers, filters
//! their events, serializes the survivors as JSON lines and streams them to
//! a local HTTP collector. Response bodies, when requested, are written to
//! disk instead.

pub mod buffer;
pub mod collector;
pub mod config;
pub mod filter;
pub mod flush;
pub mod pipeline;
pub mod sink;
pub mod source;

pub use config::Config;
pub use pipeline::{Lifecycle, Pipeline, PipelineState};

use anyhow::{Context, Result};
use sink::HttpSink;
use source::EventSource;
use std::sync::Arc;
use tracing::{info, warn};

/// Run the agent against `source` with the given configuration.
///
/// Returns after Ctrl-C, after the termination sentinel is observed, or
/// once the source stops delivering.
pub async fn run_agent(config: Config, source: Box<dyn EventSource>) -> Result<()> {
    let custom = filter::load_custom_providers(config.providers_path.as_deref());
    let sink = HttpSink::new(&config.sink_url, config.send_timeout)
        .context("Failed to create collector client")?;

    let pipeline = Pipeline::configure(config.clone(), custom, source, Arc::new(sink))
        .context("Failed to start trace session")?;

    info!("Forwarding trace events to {}", config.sink_url);
    match config.done_file.as_ref() {
        Some(done) => info!("To exit, hit ctrl-C or create the file {}", done.display()),
        None => info!("To exit, hit ctrl-C"),
    }

    let cancel = pipeline.cancel_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupted; stopping");
                cancel.cancel();
            }
            Err(e) => warn!("Failed to listen for ctrl-C: {}", e),
        }
    });

    pipeline.run().await
}
