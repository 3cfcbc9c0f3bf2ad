//! Event type definitions for trace data
//!
//! These types represent the events delivered by a live trace session (or a
//! replay of one) before any filtering happens.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Numeric event id as assigned by the provider manifest
pub type EventId = u16;

/// 128-bit correlation id. The nil value means "absent".
pub type ActivityId = Uuid;

/// Process/thread id reported when the session could not resolve one
pub const UNKNOWN_ID: i32 = -1;

fn unknown_id() -> i32 {
    UNKNOWN_ID
}

/// A single named payload value.
///
/// Providers describe their fields dynamically, so a payload is a closed set
/// of variants rather than a per-event struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadValue {
    String(String),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    Boolean(bool),
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
    Absent,
}

impl PayloadValue {
    /// Borrow the value as raw bytes, if it is a byte sequence
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PayloadValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl From<&str> for PayloadValue {
    fn from(s: &str) -> Self {
        PayloadValue::String(s.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(s: String) -> Self {
        PayloadValue::String(s)
    }
}

impl From<i64> for PayloadValue {
    fn from(v: i64) -> Self {
        PayloadValue::Integer(v)
    }
}

impl From<u64> for PayloadValue {
    fn from(v: u64) -> Self {
        PayloadValue::Unsigned(v)
    }
}

impl From<f64> for PayloadValue {
    fn from(v: f64) -> Self {
        PayloadValue::Float(v)
    }
}

impl From<bool> for PayloadValue {
    fn from(v: bool) -> Self {
        PayloadValue::Boolean(v)
    }
}

impl From<Vec<u8>> for PayloadValue {
    fn from(v: Vec<u8>) -> Self {
        PayloadValue::Bytes(v)
    }
}

/// Trace event as delivered by an event source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Provider name (e.g. "Microsoft-IE")
    pub provider: String,

    /// Numeric event id
    pub id: EventId,

    /// Symbolic event name as decoded by the session
    #[serde(default)]
    pub name: String,

    /// Milliseconds since session start
    #[serde(default)]
    pub ts: f64,

    #[serde(default)]
    pub activity: ActivityId,

    #[serde(default)]
    pub related_activity: ActivityId,

    #[serde(default = "unknown_id")]
    pub pid: i32,

    #[serde(default = "unknown_id")]
    pub tid: i32,

    /// Decoded payload fields in manifest order
    #[serde(default)]
    pub payload: Vec<(String, PayloadValue)>,

    /// Undecoded user data
    #[serde(default, with = "base64_opt", skip_serializing_if = "Option::is_none")]
    pub raw: Option<Vec<u8>>,
}

impl TraceEvent {
    /// Create an event with no correlation, unknown process and empty payload
    pub fn new(provider: impl Into<String>, id: EventId, name: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            id,
            name: name.into(),
            ts: 0.0,
            activity: Uuid::nil(),
            related_activity: Uuid::nil(),
            pid: UNKNOWN_ID,
            tid: UNKNOWN_ID,
            payload: Vec::new(),
            raw: None,
        }
    }

    pub fn with_timestamp(mut self, ts: f64) -> Self {
        self.ts = ts;
        self
    }

    pub fn with_activity(mut self, activity: ActivityId) -> Self {
        self.activity = activity;
        self
    }

    pub fn with_related_activity(mut self, related: ActivityId) -> Self {
        self.related_activity = related;
        self
    }

    pub fn with_process(mut self, pid: i32, tid: i32) -> Self {
        self.pid = pid;
        self.tid = tid;
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<PayloadValue>) -> Self {
        self.payload.push((name.into(), value.into()));
        self
    }

    pub fn with_raw(mut self, raw: Vec<u8>) -> Self {
        self.raw = Some(raw);
        self
    }

    /// Whether the event carries a non-nil correlation id
    pub fn has_activity(&self) -> bool {
        !self.activity.is_nil()
    }

    /// Look up a payload field by name (first match wins)
    pub fn field(&self, name: &str) -> Option<&PayloadValue> {
        self.payload
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Bytes carried by the named payload field, falling back to the raw
    /// user data when the field is missing or not a byte sequence.
    pub fn bytes_field(&self, name: &str) -> Option<&[u8]> {
        self.field(name)
            .and_then(PayloadValue::as_bytes)
            .or(self.raw.as_deref())
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

mod base64_opt {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_some(&STANDARD.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => STANDARD
                .decode(encoded.as_bytes())
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
