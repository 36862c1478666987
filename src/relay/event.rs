//! Relay event envelope.
//!
//! The relay never validates payloads; this type exists for clients and
//! tests to build well-formed frames, and for the forward path to peek at
//! the `event` discriminant when logging. Text that does not parse is
//! still forwarded verbatim and is the receiver's problem to reject.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RelayEvent {
    /// Control signal: begin streaming.
    Start,
    /// Control signal: stop streaming.
    Stop,
    /// Sequenced, timestamped opaque data unit.
    Frame { seq: u64, ts: u64, data: Value },
    /// Arbitrary status payload.
    Status {
        #[serde(default)]
        payload: Value,
    },
}

impl RelayEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Frame { .. } => "frame",
            Self::Status { .. } => "status",
        }
    }

    /// Best-effort peek at the `event` discriminant of a raw text frame.
    pub fn peek_name(raw: &str) -> Option<String> {
        let value: Value = serde_json::from_str(raw).ok()?;
        value
            .get("event")
            .and_then(Value::as_str)
            .map(str::to_owned)
    }
}
