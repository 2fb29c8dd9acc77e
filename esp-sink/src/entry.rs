//! Entry model: one reported observation and its payload.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::clock::{epoch_secs, format_display};

/// Device class tag. A deployment serves exactly one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceKind {
    #[serde(rename = "ESPA")]
    Espa,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Espa => "ESPA",
        }
    }
}

/// What a device sent.
///
/// Bodies that parse as JSON are kept verbatim; anything else (plain text,
/// truncated JSON, a bare `null`) is wrapped as `{"raw_body": "<text>"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Structured(serde_json::Value),
    RawFallback { raw_body: String },
}

impl Payload {
    /// Decide the payload shape once, at ingestion. Never fails. Any JSON
    /// value other than `null` (objects, arrays, scalars) is structured.
    pub fn from_body(body: &[u8]) -> Self {
        match serde_json::from_slice::<serde_json::Value>(body) {
            Ok(serde_json::Value::Null) | Err(_) => Payload::RawFallback {
                raw_body: String::from_utf8_lossy(body).into_owned(),
            },
            Ok(value) => Payload::Structured(value),
        }
    }

    pub fn is_raw_fallback(&self) -> bool {
        matches!(self, Payload::RawFallback { .. })
    }
}

/// An immutable ingested observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    #[serde(rename = "esp_type")]
    kind: DeviceKind,
    #[serde(rename = "timestamp", serialize_with = "serialize_epoch_secs")]
    received_at: DateTime<Utc>,
    #[serde(rename = "formatted_timestamp")]
    display_time: String,
    #[serde(rename = "data")]
    payload: Payload,
}

impl Entry {
    pub fn new(kind: DeviceKind, received_at: DateTime<Utc>, payload: Payload) -> Self {
        Self {
            kind,
            received_at,
            display_time: format_display(received_at),
            payload,
        }
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn display_time(&self) -> &str {
        &self.display_time
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

fn serialize_epoch_secs<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(epoch_secs(*ts))
}
