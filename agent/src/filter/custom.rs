//! User-supplied provider rules
//!
//! Loaded once at startup from a JSON document keyed by provider name:
//!
//! ```json
//! { "Microsoft-Windows-Foo": { "EventIDs": [1, 2], "EventNames": ["Foo/Start"],
//!                              "Verbosity": 5, "Filter": 18446744073709551615 } }
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};
use wptetw_shared::types::events::EventId;

/// Rule for one custom provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CustomProvider {
    /// Ids enabled on the session. Without any, the provider is never enabled.
    #[serde(rename = "EventIDs", default)]
    pub event_ids: Option<Vec<EventId>>,

    /// Allowlist of event names; empty or absent keeps every event
    #[serde(rename = "EventNames", default)]
    pub event_names: Option<Vec<String>>,

    /// Trace level
    #[serde(rename = "Verbosity", default)]
    pub verbosity: u8,

    /// Match-any keyword mask
    #[serde(rename = "Filter", default)]
    pub filter: u64,
}

impl CustomProvider {
    /// A rule is only subscribed when it names at least one event id
    pub fn is_active(&self) -> bool {
        self.event_ids.as_ref().is_some_and(|ids| !ids.is_empty())
    }

    pub fn event_ids(&self) -> &[EventId] {
        self.event_ids.as_deref().unwrap_or(&[])
    }

    /// Whether an event called `name` passes the allowlist
    pub fn accepts_name(&self, name: &str) -> bool {
        match self.event_names.as_deref() {
            None | Some([]) => true,
            Some(names) => names.iter().any(|n| n == name),
        }
    }
}

/// Custom rules keyed by provider name
pub type CustomProviders = BTreeMap<String, CustomProvider>;

/// Parse a custom-provider document
pub fn parse_custom_providers(json: &str) -> Result<CustomProviders> {
    serde_json::from_str(json).context("Malformed custom provider document")
}

/// Load custom rules from `path`.
///
/// A missing file means no custom providers. An unreadable or malformed one
/// is logged and also yields an empty set; built-in providers are unaffected.
pub fn load_custom_providers(path: Option<&Path>) -> CustomProviders {
    let Some(path) = path else {
        return CustomProviders::new();
    };

    if !path.exists() {
        debug!("No custom provider file at {}", path.display());
        return CustomProviders::new();
    }

    let loaded = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))
        .and_then(|json| parse_custom_providers(&json));

    match loaded {
        Ok(providers) => {
            info!(
                "Loaded {} custom provider(s) from {}",
                providers.len(),
                path.display()
            );
            providers
        }
        Err(e) => {
            warn!("Ignoring custom providers: {:#}", e);
            CustomProviders::new()
        }
    }
}
