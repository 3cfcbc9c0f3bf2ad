//! Trace Event Forwarding Agent
//!
//! Main entry point: parses flags, builds the configuration and event
//! source, then forwards events until ctrl-C or the termination sentinel.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wptetw_agent::source::{EventSource, ReplaySource};
use wptetw_agent::{run_agent, Config};

#[derive(Parser, Debug)]
#[command(name = "wpt-etw")]
#[command(about = "Forward browser trace events to a local collector", long_about = None)]
#[command(version)]
struct Args {
    /// Directory receiving captured response bodies (one file per request)
    #[arg(long, value_name = "DIR")]
    bodies: Option<PathBuf>,

    /// Custom provider document (default: customProviders.json next to the executable)
    #[arg(long, value_name = "PATH")]
    providers: Option<PathBuf>,

    /// Collector URL
    #[arg(long, env = "WPT_ETW_SINK_URL")]
    sink: Option<String>,

    /// Flush interval (e.g., "100ms", "1s")
    #[arg(long, env = "WPT_ETW_FLUSH_INTERVAL")]
    flush_interval: Option<String>,

    /// Termination sentinel (default: wpt-etw.done next to the executable)
    #[arg(long, value_name = "PATH")]
    done_file: Option<PathBuf>,

    /// Read events as JSON lines from a file ("-" for stdin)
    #[arg(long, value_name = "PATH", default_value = "-")]
    replay: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(args.verbose)?;
    debug!("Arguments: {:?}", args);

    let mut config = Config::default();
    if let Some(sink) = args.sink {
        config.sink_url = sink;
    }
    if let Some(interval) = args.flush_interval.as_deref() {
        config.flush_interval = wptetw_shared::utils::parse_duration(interval)
            .context("Failed to parse flush interval")?;
    }
    if let Some(done) = args.done_file {
        config.done_file = Some(done);
    }
    if let Some(providers) = args.providers {
        config.providers_path = Some(providers);
    }
    config.body_dir = args.bodies;

    let source: Box<dyn EventSource> = Box::new(
        ReplaySource::open(&args.replay)
            .with_context(|| format!("Failed to open {}", args.replay.display()))?,
    );

    info!("Starting {} on session {}", env!("CARGO_PKG_NAME"), config.session_name);
    run_agent(config, source).await
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    Ok(())
}
