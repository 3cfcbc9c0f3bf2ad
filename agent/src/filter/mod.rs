//! Event filtering
//!
//! Decides, per delivered event, whether it is dropped, forwarded as a
//! record (and under which name), or routed to body capture.
//!
//! Precedence:
//! 1. capture provider: body chunk with a correlation id, otherwise dropped
//! 2. built-in provider with a listed id: kept under the friendly name
//! 3. activated custom provider whose name allowlist passes: kept as is
//! 4. everything else: dropped

pub mod builtin;
pub mod custom;

pub use custom::{load_custom_providers, CustomProvider, CustomProviders};

use crate::source::{level, ProviderSubscription};
use builtin::{BUILTIN_PROVIDERS, CAPTURE_EVENT_NAME, CAPTURE_PAYLOAD_FIELD, CAPTURE_PROVIDER};
use tracing::info;
use wptetw_shared::types::events::{ActivityId, TraceEvent};

/// Outcome of classifying one event
#[derive(Debug, Clone, PartialEq)]
pub enum Classification<'a> {
    Drop,
    /// Forward as a record reported under `name`
    Keep { name: &'a str },
    /// Append `payload` to the body file for `activity`
    Body {
        activity: ActivityId,
        payload: &'a [u8],
    },
}

/// Static and user-supplied filter rules. Read-only once built.
#[derive(Debug, Clone)]
pub struct FilterTable {
    /// Custom rules that are enabled on the session
    custom: CustomProviders,
    /// Custom rules present in configuration but never enabled
    dormant: Vec<String>,
    capture_enabled: bool,
}

impl FilterTable {
    /// Build the table. Custom rules without event ids are kept out of
    /// both subscription and classification.
    pub fn new(custom: CustomProviders, capture_enabled: bool) -> Self {
        let (custom, dormant): (CustomProviders, CustomProviders) =
            custom.into_iter().partition(|(_, rule)| rule.is_active());
        let dormant: Vec<String> = dormant.into_keys().collect();
        for provider in &dormant {
            info!("Custom provider {} lists no EventIDs; not enabled", provider);
        }

        Self {
            custom,
            dormant,
            capture_enabled,
        }
    }

    pub fn classify<'a>(&'a self, event: &'a TraceEvent) -> Classification<'a> {
        if event.provider == CAPTURE_PROVIDER {
            return match event.bytes_field(CAPTURE_PAYLOAD_FIELD) {
                Some(payload)
                    if event.has_activity()
                        && event.name == CAPTURE_EVENT_NAME
                        && !payload.is_empty() =>
                {
                    Classification::Body {
                        activity: event.activity,
                        payload,
                    }
                }
                _ => Classification::Drop,
            };
        }

        if let Some(name) = builtin::builtin(&event.provider).and_then(|p| p.lookup(event.id)) {
            return Classification::Keep { name };
        }

        match self.custom.get(&event.provider) {
            Some(rule) if rule.accepts_name(&event.name) => Classification::Keep { name: &event.name },
            _ => Classification::Drop,
        }
    }

    /// Providers to enable on the session, in enable order
    pub fn subscriptions(&self) -> Vec<ProviderSubscription> {
        let mut subs = Vec::with_capacity(BUILTIN_PROVIDERS.len() + self.custom.len() + 1);

        if self.capture_enabled {
            subs.push(ProviderSubscription::new(
                CAPTURE_PROVIDER,
                level::VERBOSE,
                u64::MAX,
            ));
        }

        for provider in BUILTIN_PROVIDERS {
            subs.push(
                ProviderSubscription::new(provider.name, level::INFORMATIONAL, provider.keywords)
                    .with_event_ids(provider.event_ids()),
            );
        }

        for (name, rule) in &self.custom {
            subs.push(
                ProviderSubscription::new(name.as_str(), rule.verbosity, rule.filter)
                    .with_event_ids(rule.event_ids().to_vec()),
            );
        }

        subs
    }

    /// Names of custom providers that were configured but not enabled
    pub fn dormant_providers(&self) -> &[String] {
        &self.dormant
    }

    pub fn capture_enabled(&self) -> bool {
        self.capture_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use builtin::{IE_KEYWORDS, IE_PROVIDER, WININET_PROVIDER};
    use uuid::Uuid;

    fn rule(ids: &[u16], names: &[&str]) -> CustomProvider {
        CustomProvider {
            event_ids: Some(ids.to_vec()),
            event_names: Some(names.iter().map(|n| n.to_string()).collect()),
            verbosity: 5,
            filter: 0xff,
        }
    }

    fn table_with(provider: &str, custom: CustomProvider) -> FilterTable {
        let mut providers = CustomProviders::new();
        providers.insert(provider.to_string(), custom);
        FilterTable::new(providers, false)
    }

    #[test]
    fn test_every_builtin_id_resolves_to_its_name() {
        let table = FilterTable::new(CustomProviders::new(), false);
        for provider in BUILTIN_PROVIDERS {
            for (id, name) in provider.events {
                let event = TraceEvent::new(provider.name, *id, "RawName");
                assert_eq!(
                    table.classify(&event),
                    Classification::Keep { name: *name },
                    "{} {}",
                    provider.name,
                    id
                );
            }
        }
    }

    #[test]
    fn test_ie_super_navigate() {
        let table = FilterTable::new(CustomProviders::new(), false);
        let event = TraceEvent::new(IE_PROVIDER, 70, "Mshtml/Whatever");
        assert_eq!(
            table.classify(&event),
            Classification::Keep {
                name: "Mshtml_CWindow_SuperNavigate2/Start"
            }
        );
    }

    #[test]
    fn test_unlisted_builtin_id_dropped() {
        let table = FilterTable::new(CustomProviders::new(), false);
        let event = TraceEvent::new(WININET_PROVIDER, 9999, "Wininet_Unknown");
        assert_eq!(table.classify(&event), Classification::Drop);
        let event = TraceEvent::new(IE_PROVIDER, 71, "Mshtml_Unknown");
        assert_eq!(table.classify(&event), Classification::Drop);
    }

    #[test]
    fn test_unknown_provider_dropped() {
        let table = FilterTable::new(CustomProviders::new(), false);
        assert_eq!(
            table.classify(&TraceEvent::new("Nobody", 1, "x")),
            Classification::Drop
        );
    }

    #[test]
    fn test_custom_empty_allowlist_keeps_everything() {
        let table = table_with("Foo", rule(&[1, 2], &[]));
        for (id, name) in [(1, "Foo/Start"), (2, "Foo/Stop"), (3, "Foo/Other")] {
            let event = TraceEvent::new("Foo", id, name);
            assert_eq!(table.classify(&event), Classification::Keep { name });
        }
    }

    #[test]
    fn test_custom_allowlist_filters_by_name() {
        let table = table_with("Foo", rule(&[1], &["Foo/Start"]));
        assert_eq!(
            table.classify(&TraceEvent::new("Foo", 1, "Foo/Start")),
            Classification::Keep { name: "Foo/Start" }
        );
        assert_eq!(
            table.classify(&TraceEvent::new("Foo", 1, "Foo/Stop")),
            Classification::Drop
        );
    }

    #[test]
    fn test_custom_without_ids_is_dormant() {
        let table = table_with("Foo", rule(&[], &["Foo/Start"]));
        assert_eq!(
            table.classify(&TraceEvent::new("Foo", 1, "Foo/Start")),
            Classification::Drop
        );
        assert_eq!(table.dormant_providers(), &["Foo".to_string()]);
        assert!(table.subscriptions().iter().all(|s| s.provider != "Foo"));

        let absent = table_with("Bar", CustomProvider::default());
        assert_eq!(absent.dormant_providers(), &["Bar".to_string()]);
    }

    #[test]
    fn test_builtin_mapping_wins_over_custom_rule() {
        let table = table_with(IE_PROVIDER, rule(&[70, 5000], &[]));
        assert_eq!(
            table.classify(&TraceEvent::new(IE_PROVIDER, 70, "raw")),
            Classification::Keep {
                name: "Mshtml_CWindow_SuperNavigate2/Start"
            }
        );
        assert_eq!(
            table.classify(&TraceEvent::new(IE_PROVIDER, 5000, "raw")),
            Classification::Keep { name: "raw" }
        );
    }

    #[test]
    fn test_capture_event_routed_to_body() {
        let table = FilterTable::new(CustomProviders::new(), true);
        let activity = Uuid::from_u128(42);
        let event = TraceEvent::new(CAPTURE_PROVIDER, 2004, CAPTURE_EVENT_NAME)
            .with_activity(activity)
            .with_field(CAPTURE_PAYLOAD_FIELD, vec![1u8, 2, 3]);

        assert_eq!(
            table.classify(&event),
            Classification::Body {
                activity,
                payload: &[1, 2, 3]
            }
        );
    }

    #[test]
    fn test_capture_events_never_become_records() {
        let table = FilterTable::new(CustomProviders::new(), true);
        let activity = Uuid::from_u128(42);

        let no_activity = TraceEvent::new(CAPTURE_PROVIDER, 2004, CAPTURE_EVENT_NAME)
            .with_field(CAPTURE_PAYLOAD_FIELD, vec![1u8]);
        let empty_payload = TraceEvent::new(CAPTURE_PROVIDER, 2004, CAPTURE_EVENT_NAME)
            .with_activity(activity)
            .with_field(CAPTURE_PAYLOAD_FIELD, Vec::<u8>::new());
        let other_event = TraceEvent::new(CAPTURE_PROVIDER, 2003, "EventID(2003)")
            .with_activity(activity)
            .with_field(CAPTURE_PAYLOAD_FIELD, vec![1u8]);
        let no_payload =
            TraceEvent::new(CAPTURE_PROVIDER, 2004, CAPTURE_EVENT_NAME).with_activity(activity);

        for event in [no_activity, empty_payload, other_event, no_payload] {
            assert_eq!(table.classify(&event), Classification::Drop);
        }
    }

    #[test]
    fn test_subscriptions() {
        let table = FilterTable::new(CustomProviders::new(), false);
        let subs = table.subscriptions();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].provider, WININET_PROVIDER);
        assert_eq!(subs[0].keywords, u64::MAX);
        assert_eq!(subs[0].event_ids.len(), 21);
        assert_eq!(subs[1].provider, IE_PROVIDER);
        assert_eq!(subs[1].keywords, IE_KEYWORDS);
        assert_eq!(subs[1].level, level::INFORMATIONAL);

        let table = table_with("Foo", rule(&[7], &[]));
        let table = FilterTable {
            capture_enabled: true,
            ..table
        };
        let subs = table.subscriptions();
        assert_eq!(subs.len(), 4);
        assert_eq!(subs[0].provider, CAPTURE_PROVIDER);
        assert!(subs[0].event_ids.is_empty());
        let foo = subs.iter().find(|s| s.provider == "Foo").unwrap();
        assert_eq!(foo.event_ids, vec![7]);
        assert_eq!(foo.level, 5);
        assert_eq!(foo.keywords, 0xff);
    }
}
