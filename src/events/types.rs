//! Event vocabulary of a job stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::jobs::types::Mode;

/// Presentation hint for a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogStyle {
    #[default]
    Normal,
    Bold,
    Error,
    Success,
    Mute,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    pub job_id: String,
    pub mode: Mode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub line: String,
    /// `HH:MM:SS` in the display zone.
    pub time: String,
    pub style: LogStyle,
}

/// Instance snapshot as shown to the observer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub end_utc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub end_shanghai: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub days_left: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub renew_status: Option<String>,
}

impl StatusReport {
    pub fn not_found() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    pub left: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fatal {
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Done {
    pub ok: bool,
}

/// One event of a job stream.
///
/// On the wire the variant name is the SSE `event:` field and the payload is
/// the JSON `data:` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum RunEvent {
    Hello(Hello),
    Log(LogLine),
    Status(StatusReport),
    Order(Order),
    Tick(Tick),
    Fatal(Fatal),
    Done(Done),
}

impl RunEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RunEvent::Hello(_) => "hello",
            RunEvent::Log(_) => "log",
            RunEvent::Status(_) => "status",
            RunEvent::Order(_) => "order",
            RunEvent::Tick(_) => "tick",
            RunEvent::Fatal(_) => "fatal",
            RunEvent::Done(_) => "done",
        }
    }

    /// `done` and `fatal` end a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunEvent::Done(_) | RunEvent::Fatal(_))
    }

    /// Payload as a JSON value.
    pub fn payload(&self) -> Value {
        let result = match self {
            RunEvent::Hello(p) => serde_json::to_value(p),
            RunEvent::Log(p) => serde_json::to_value(p),
            RunEvent::Status(p) => serde_json::to_value(p),
            RunEvent::Order(p) => serde_json::to_value(p),
            RunEvent::Tick(p) => serde_json::to_value(p),
            RunEvent::Fatal(p) => serde_json::to_value(p),
            RunEvent::Done(p) => serde_json::to_value(p),
        };
        // Payloads are plain structs of strings and numbers.
        result.unwrap_or(Value::Null)
    }

    /// Rebuild an event from its wire name and JSON payload.
    pub fn from_wire(name: &str, data: &str) -> Result<Self, serde_json::Error> {
        let data: Value = serde_json::from_str(data)?;
        serde_json::from_value(serde_json::json!({ "event": name, "data": data }))
    }
}
