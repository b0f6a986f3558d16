//! Domain-decoded stream events.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::parse::Frame;

/// Kind given to frames that carry neither an `event:` line nor a `type`.
pub const DEFAULT_CHANNEL: &str = "message";

/// Data payload some servers send instead of a `done` event.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Well-known terminal kinds.
pub const DONE: &str = "done";
pub const RUN_COMPLETED: &str = "run_completed";
pub const RUN_FAILED: &str = "run_failed";

const SEQ_FIELDS: [&str; 3] = ["seq", "sequenceNumber", "sequence"];
const TIMESTAMP_FIELDS: [&str; 3] = ["timestamp", "ts", "createdAt"];

/// A decoded event.
///
/// `seq` is assigned by the server and is the only resumption key; events
/// without one (heartbeats, sentinels) are delivered but never move the
/// cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    /// Server-assigned sequence number.
    pub seq: Option<u64>,
    /// Event kind: the `event:` name, else the payload's `type`, else
    /// [`DEFAULT_CHANNEL`].
    pub kind: String,
    /// Decoded JSON payload (`null` when the frame had no data).
    pub payload: Value,
    /// Server timestamp if the payload carried one, else receive time.
    pub timestamp: DateTime<Utc>,
}

fn extract_seq(payload: &Value) -> Option<u64> {
    SEQ_FIELDS.iter().find_map(|field| match payload.get(field)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn extract_timestamp(payload: &Value) -> Option<DateTime<Utc>> {
    TIMESTAMP_FIELDS.iter().find_map(|field| {
        let raw = payload.get(field)?.as_str()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    })
}

impl StreamEvent {
    /// Build an event directly (mostly useful in tests and mock sources).
    pub fn new(seq: Option<u64>, kind: impl Into<String>, payload: Value) -> Self {
        Self {
            seq,
            kind: kind.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Decode a [`Frame`].
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the payload is present but is not JSON
    /// (and is not the `[DONE]` sentinel).
    pub fn decode(frame: Frame) -> Result<Self, serde_json::Error> {
        let Frame {
            event_name,
            payload,
        } = frame;

        let payload = match payload.as_deref().map(str::trim) {
            None | Some("") => Value::Null,
            Some(DONE_SENTINEL) => {
                return Ok(Self::new(
                    None,
                    event_name.unwrap_or_else(|| DONE.to_string()),
                    Value::Null,
                ));
            }
            Some(raw) => serde_json::from_str(raw)?,
        };

        let kind = event_name
            .or_else(|| {
                payload
                    .get("type")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_CHANNEL.to_string());

        Ok(Self {
            seq: extract_seq(&payload),
            timestamp: extract_timestamp(&payload).unwrap_or_else(Utc::now),
            kind,
            payload,
        })
    }
}

/// Set of event kinds that end a subscription normally.
///
/// Defaults to `done`, `run_completed` and `run_failed`. Step-level failures
/// such as `step_failed` are deliberately not terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalKinds(HashSet<String>);

impl Default for TerminalKinds {
    fn default() -> Self {
        Self::from_iter([DONE, RUN_COMPLETED, RUN_FAILED])
    }
}

impl TerminalKinds {
    /// An empty set: only end-of-stream completes a subscription.
    pub fn none() -> Self {
        Self(HashSet::new())
    }

    /// Add a kind.
    pub fn insert(&mut self, kind: impl Into<String>) {
        self.0.insert(kind.into());
    }

    /// Returns true if `kind` is terminal.
    pub fn contains(&self, kind: &str) -> bool {
        self.0.contains(kind)
    }

    /// Returns true if `event` ends the subscription.
    pub fn is_terminal(&self, event: &StreamEvent) -> bool {
        self.contains(&event.kind)
    }
}

impl<S: Into<String>> FromIterator<S> for TerminalKinds {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
