//! In-process event source fed through a channel

use super::{EventSource, ProviderSubscription, SourceError, SubscriptionSet};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wptetw_shared::types::events::TraceEvent;

/// How long a blocked receive waits before re-checking cancellation
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Event source backed by an `mpsc` receiver.
///
/// Delivery ends when every sender is dropped or the token is cancelled.
/// Events from providers that were never enabled are discarded, as a real
/// session would never deliver them.
pub struct ChannelSource {
    rx: Receiver<TraceEvent>,
    subscriptions: SubscriptionSet,
}

impl ChannelSource {
    pub fn new(rx: Receiver<TraceEvent>) -> Self {
        Self {
            rx,
            subscriptions: SubscriptionSet::new(),
        }
    }

    /// Create a source together with the sender feeding it
    pub fn pair() -> (Sender<TraceEvent>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self::new(rx))
    }

    pub fn subscriptions(&self) -> &SubscriptionSet {
        &self.subscriptions
    }
}

impl EventSource for ChannelSource {
    fn describe(&self) -> String {
        "in-process channel".to_string()
    }

    fn enable_provider(&mut self, subscription: &ProviderSubscription) -> Result<(), SourceError> {
        self.subscriptions.enable(subscription);
        Ok(())
    }

    fn process(
        &mut self,
        cancel: &CancellationToken,
        on_event: &mut dyn FnMut(&TraceEvent),
    ) -> Result<(), SourceError> {
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            match self.rx.recv_timeout(POLL_INTERVAL) {
                Ok(event) => {
                    if self.subscriptions.admits(&event) {
                        on_event(&event);
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::level;

    #[test]
    fn test_delivers_only_subscribed_events_in_order() {
        let (tx, mut source) = ChannelSource::pair();
        source
            .enable_provider(
                &ProviderSubscription::new("Microsoft-IE", level::INFORMATIONAL, 0)
                    .with_event_ids(vec![70, 9]),
            )
            .unwrap();

        tx.send(TraceEvent::new("Microsoft-IE", 70, "a")).unwrap();
        tx.send(TraceEvent::new("Microsoft-IE", 71, "b")).unwrap();
        tx.send(TraceEvent::new("Unsubscribed", 70, "c")).unwrap();
        tx.send(TraceEvent::new("Microsoft-IE", 9, "d")).unwrap();
        drop(tx);

        let mut seen = Vec::new();
        source
            .process(&CancellationToken::new(), &mut |event| {
                seen.push(event.name.clone())
            })
            .unwrap();
        assert_eq!(seen, vec!["a", "d"]);
    }

    #[test]
    fn test_cancellation_ends_delivery() {
        let (_tx, mut source) = ChannelSource::pair();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let handle = std::thread::spawn(move || source.process(&cancel, &mut |_| {}));
        std::thread::sleep(Duration::from_millis(20));
        trigger.cancel();

        assert!(handle.join().unwrap().is_ok());
    }
}
