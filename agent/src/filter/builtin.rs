//! Built-in provider tables
//!
//! The browser and network stack providers are always enabled, restricted to
//! the event ids below. Each id is reported under its friendly name.

use wptetw_shared::types::events::EventId;

pub const IE_PROVIDER: &str = "Microsoft-IE";
pub const WININET_PROVIDER: &str = "Microsoft-Windows-WinINet";

/// Provider carrying raw request/response bodies
pub const CAPTURE_PROVIDER: &str = "Microsoft-Windows-WinINet-Capture";
/// Capture event holding a body chunk
pub const CAPTURE_EVENT_NAME: &str = "EventID(2004)";
/// Payload field holding the body bytes
pub const CAPTURE_PAYLOAD_FIELD: &str = "Payload";

/// Keyword mask enabled on the IE provider
pub const IE_KEYWORDS: u64 = 0x4001302;

static IE_EVENTS: &[(EventId, &str)] = &[
    (70, "Mshtml_CWindow_SuperNavigate2/Start"),
    (574, "Mshtml_BFCache"),
    (730, "Mshtml_WebOCEvents_BeforeNavigate"),
    (609, "Mshtml_CDoc_Navigation"),
    (739, "Mshtml_WebOCEvents_DOMContentLoaded"),
    (735, "Mshtml_WebOCEvents_DocumentComplete"),
    (732, "Mshtml_WebOCEvents_NavigateComplete"),
    (9, "Mshtml_CMarkup_LoadEvent_Start/Start"),
    (10, "Mshtml_CMarkup_LoadEvent_Stop/Stop"),
    (7, "Mshtml_CMarkup_DOMContentLoadedEvent_Start/Start"),
    (8, "Mshtml_CMarkup_DOMContentLoadedEvent_Stop/Stop"),
    (57, "Mshtml_NotifyGoesInteractive/Start"),
];

static WININET_EVENTS: &[(EventId, &str)] = &[
    (304, "WININET_DNS_QUERY/Start"),
    (305, "WININET_DNS_QUERY/Stop"),
    (1051, "Wininet_Getaddrinfo/Start"),
    (1052, "Wininet_Getaddrinfo/Stop"),
    (1059, "Wininet_SocketConnect/Start"),
    (1060, "Wininet_SocketConnect/Stop"),
    (301, "WININET_TCP_CONNECTION/Start"),
    (303, "WININET_TCP_CONNECTION/Stop"),
    (302, "WININET_TCP_CONNECTION/Fail"),
    (1046, "Wininet_Connect/Stop"),
    (701, "WININET_HTTPS_NEGOTIATION/Start"),
    (702, "WININET_HTTPS_NEGOTIATION/Stop"),
    (546, "WININET_REQUEST_HEADER"),
    (211, "WININET_RESPONSE_HEADER"),
    (1007, "Wininet_SendRequest/Start"),
    (1008, "Wininet_SendRequest/Stop"),
    (1031, "Wininet_SendRequest_Main"),
    (1037, "Wininet_ReadData"),
    (1057, "Wininet_UsageLogRequest"),
    (1048, "Wininet_LookupConnection/Stop"),
    (1064, "WININET_STREAM_DATA_INDICATED"),
];

/// A provider with a fixed id -> friendly name table
#[derive(Debug)]
pub struct BuiltinProvider {
    pub name: &'static str,
    pub keywords: u64,
    pub events: &'static [(EventId, &'static str)],
}

impl BuiltinProvider {
    /// Friendly name for `id`, if the table lists it
    pub fn lookup(&self, id: EventId) -> Option<&'static str> {
        self.events
            .iter()
            .find(|(eid, _)| *eid == id)
            .map(|(_, name)| *name)
    }

    pub fn event_ids(&self) -> Vec<EventId> {
        self.events.iter().map(|(eid, _)| *eid).collect()
    }
}

/// Built-in providers in subscription order
pub static BUILTIN_PROVIDERS: &[BuiltinProvider] = &[
    BuiltinProvider {
        name: WININET_PROVIDER,
        keywords: u64::MAX,
        events: WININET_EVENTS,
    },
    BuiltinProvider {
        name: IE_PROVIDER,
        keywords: IE_KEYWORDS,
        events: IE_EVENTS,
    },
];

/// Built-in table for `provider`, if any
pub fn builtin(provider: &str) -> Option<&'static BuiltinProvider> {
    BUILTIN_PROVIDERS.iter().find(|p| p.name == provider)
}
