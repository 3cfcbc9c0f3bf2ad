//! Configuration types for the capture agent

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Collector endpoint the tool has always posted to
pub const DEFAULT_SINK_URL: &str = "http://127.0.0.1:8888/etw";

/// Name of the termination sentinel created next to the executable
pub const DONE_FILE_NAME: &str = "wpt-etw.done";

/// Name of the custom-provider document looked up next to the executable
pub const PROVIDERS_FILE_NAME: &str = "customProviders.json";

/// Agent configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Name of the trace session
    pub session_name: String,

    /// Collector URL receiving the startup notice and every batch
    pub sink_url: String,

    /// How often the buffer is drained and posted
    pub flush_interval: Duration,

    /// Check the termination sentinel every Nth flush wake
    pub done_check_every: u32,

    /// Termination sentinel; removed when observed
    pub done_file: Option<PathBuf>,

    /// Directory for captured bodies (None disables body capture)
    pub body_dir: Option<PathBuf>,

    /// Custom-provider document
    pub providers_path: Option<PathBuf>,

    /// Upper bound for a single collector request
    pub send_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let base = exe_dir();
        Self {
            session_name: "wpt-etw".to_string(),
            sink_url: std::env::var("WPT_ETW_SINK_URL")
                .unwrap_or_else(|_| DEFAULT_SINK_URL.to_string()),
            flush_interval: std::env::var("WPT_ETW_FLUSH_INTERVAL")
                .ok()
                .and_then(|s| wptetw_shared::utils::parse_duration(&s).ok())
                .unwrap_or(Duration::from_millis(100)),
            done_check_every: 10,
            done_file: base.as_ref().map(|dir| dir.join(DONE_FILE_NAME)),
            body_dir: None,
            providers_path: base.map(|dir| dir.join(PROVIDERS_FILE_NAME)),
            send_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.flush_interval.is_zero() {
            anyhow::bail!("Flush interval must be greater than 0");
        }

        if self.done_check_every == 0 {
            anyhow::bail!("Sentinel check cadence must be at least 1");
        }

        if self.send_timeout.is_zero() {
            anyhow::bail!("Send timeout must be greater than 0");
        }

        let uri: hyper::Uri = self
            .sink_url
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid sink URL {}: {}", self.sink_url, e))?;
        if uri.scheme_str() != Some("http") || uri.host().is_none() {
            anyhow::bail!("Sink URL must be an absolute http:// URL: {}", self.sink_url);
        }

        Ok(())
    }
}

/// Directory containing the running executable
fn exe_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}
