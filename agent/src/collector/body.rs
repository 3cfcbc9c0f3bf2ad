//! Body capture side channel
//!
//! Raw body chunks are appended to one file per correlation id. Each write
//! opens, appends and closes the file, so nothing stays open between chunks.
//! There is no locking here: chunks arrive on the single ingestion path.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use wptetw_shared::types::events::ActivityId;

/// Writer for captured bodies. Inert when no directory is configured.
#[derive(Debug, Clone, Default)]
pub struct BodyCapture {
    dir: Option<PathBuf>,
}

impl BodyCapture {
    /// Enable capture into `dir` if it is an existing directory
    pub fn new(dir: Option<&Path>) -> Self {
        match dir {
            Some(dir) if dir.is_dir() => {
                info!("Capturing bodies to {}", dir.display());
                Self {
                    dir: Some(dir.to_path_buf()),
                }
            }
            Some(dir) => {
                info!("Body directory {} does not exist; body capture disabled", dir.display());
                Self::disabled()
            }
            None => Self::disabled(),
        }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// File collecting the body for `activity`
    pub fn path_for(&self, activity: ActivityId) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(activity.hyphenated().to_string()))
    }

    /// Append `payload` to the file for `activity`.
    ///
    /// Returns `Ok(false)` without touching the filesystem when disabled.
    pub fn append(&self, activity: ActivityId, payload: &[u8]) -> Result<bool> {
        let Some(path) = self.path_for(activity) else {
            return Ok(false);
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open body file {}", path.display()))?;
        file.write_all(payload)
            .with_context(|| format!("Failed to append to body file {}", path.display()))?;

        Ok(true)
    }
}
