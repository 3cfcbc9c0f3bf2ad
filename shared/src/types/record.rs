//! Output record forwarded to the collector
//!
//! A kept event becomes one `OutputRecord`, serialized as a single line of
//! JSON. Optional fields are omitted entirely when the source value is
//! absent, so a consumer can tell "not reported" apart from a zero value.

use crate::types::events::{ActivityId, EventId, PayloadValue, TraceEvent};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::ser::{Error as _, SerializeMap};
use serde::{Serialize, Serializer};

/// Canonical record for one kept event. Borrows everything from the event.
#[derive(Debug, Serialize)]
pub struct OutputRecord<'a> {
    #[serde(rename = "Provider")]
    pub provider: &'a str,

    /// Friendly name from a built-in map, or the event's own name
    #[serde(rename = "Event")]
    pub event: &'a str,

    #[serde(rename = "EID")]
    pub eid: EventId,

    #[serde(serialize_with = "finite_f64")]
    pub ts: f64,

    #[serde(rename = "Activity", skip_serializing_if = "Option::is_none")]
    pub activity: Option<ActivityId>,

    #[serde(rename = "RelatedActivity", skip_serializing_if = "Option::is_none")]
    pub related_activity: Option<ActivityId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tid: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PayloadMap<'a>>,
}

impl<'a> OutputRecord<'a> {
    /// Build the record for `event`, reported under `name`
    pub fn from_event(event: &'a TraceEvent, name: &'a str) -> Self {
        Self {
            provider: &event.provider,
            event: name,
            eid: event.id,
            ts: event.ts,
            activity: Some(event.activity).filter(|id| !id.is_nil()),
            related_activity: Some(event.related_activity).filter(|id| !id.is_nil()),
            pid: Some(event.pid).filter(|pid| *pid >= 0),
            tid: Some(event.tid).filter(|tid| *tid >= 0),
            data: if event.payload.is_empty() {
                None
            } else {
                Some(PayloadMap(&event.payload))
            },
        }
    }

    /// Serialize to a single newline-terminated line.
    ///
    /// Fails as a whole if any field cannot be represented.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Payload fields rendered as a JSON object, preserving manifest order.
/// When a name repeats, the last value wins.
#[derive(Debug)]
pub struct PayloadMap<'a>(&'a [(String, PayloadValue)]);

impl Serialize for PayloadMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = self.0;
        let mut map = serializer.serialize_map(None)?;
        for (i, (name, value)) in fields.iter().enumerate() {
            if fields[i + 1..].iter().any(|(later, _)| later == name) {
                continue;
            }
            map.serialize_entry(name, &Rendered(value))?;
        }
        map.end()
    }
}

struct Rendered<'a>(&'a PayloadValue);

impl Serialize for Rendered<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            PayloadValue::String(s) => serializer.serialize_str(s),
            PayloadValue::Integer(v) => serializer.serialize_i64(*v),
            PayloadValue::Unsigned(v) => serializer.serialize_u64(*v),
            PayloadValue::Float(v) => finite_f64(v, serializer),
            PayloadValue::Boolean(v) => serializer.serialize_bool(*v),
            PayloadValue::Bytes(b) => serializer.serialize_str(&STANDARD.encode(b)),
            PayloadValue::Absent => serializer.serialize_unit(),
        }
    }
}

// JSON has no NaN/Infinity.
fn finite_f64<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        Err(S::Error::custom(format!("non-finite float {}", value)))
    }
}
