//! Event sources
//!
//! An event source owns the trace session: providers are enabled on it once,
//! then `process` pushes every delivered event into a callback until the
//! session is stopped. Delivery is synchronous with the source's own loop,
//! so the callback must stay cheap.

pub mod channel;
pub mod replay;

pub use channel::ChannelSource;
pub use replay::ReplaySource;

use tokio_util::sync::CancellationToken;
use wptetw_shared::types::events::{EventId, TraceEvent};

/// Trace levels as used by the session
pub mod level {
    pub const INFORMATIONAL: u8 = 4;
    pub const VERBOSE: u8 = 5;
}

/// One provider enabled on the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSubscription {
    pub provider: String,
    pub level: u8,
    /// Match-any keyword mask
    pub keywords: u64,
    /// Restrict delivery to these ids (empty = every id)
    pub event_ids: Vec<EventId>,
}

impl ProviderSubscription {
    pub fn new(provider: impl Into<String>, level: u8, keywords: u64) -> Self {
        Self {
            provider: provider.into(),
            level,
            keywords,
            event_ids: Vec::new(),
        }
    }

    pub fn with_event_ids(mut self, event_ids: Vec<EventId>) -> Self {
        self.event_ids = event_ids;
        self
    }

    /// Whether the session would deliver `event` under this subscription
    pub fn admits(&self, event: &TraceEvent) -> bool {
        self.provider.eq_ignore_ascii_case(&event.provider)
            && (self.event_ids.is_empty() || self.event_ids.contains(&event.id))
    }
}

/// Errors raised by an event source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to enable provider {provider}: {reason}")]
    Subscribe { provider: String, reason: String },

    #[error("event source I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A live stream of trace events
pub trait EventSource: Send {
    /// Short description for logs
    fn describe(&self) -> String;

    /// Enable a provider. Must be called before `process`.
    fn enable_provider(&mut self, subscription: &ProviderSubscription) -> Result<(), SourceError>;

    /// Deliver events to `on_event` until `cancel` fires, the input ends,
    /// or the session fails.
    fn process(
        &mut self,
        cancel: &CancellationToken,
        on_event: &mut dyn FnMut(&TraceEvent),
    ) -> Result<(), SourceError>;
}

/// Provider filter applied by software sources, mirroring what the OS
/// session does for enabled providers.
#[derive(Debug, Default, Clone)]
pub struct SubscriptionSet {
    subscriptions: Vec<ProviderSubscription>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscription; re-enabling a provider replaces the earlier one
    pub fn enable(&mut self, subscription: &ProviderSubscription) {
        self.subscriptions
            .retain(|s| !s.provider.eq_ignore_ascii_case(&subscription.provider));
        self.subscriptions.push(subscription.clone());
    }

    pub fn admits(&self, event: &TraceEvent) -> bool {
        self.subscriptions.iter().any(|s| s.admits(event))
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderSubscription> {
        self.subscriptions.iter()
    }
}
