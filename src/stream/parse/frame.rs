//! A single `event:`/`data:` block from the wire.

/// One blank-line-delimited block of an event stream.
///
/// `event_name` is `None` when the block had no `event:` line (the implicit
/// default channel). Multiple `data:` lines are joined with `\n`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// Value of the `event:` line, if any.
    pub event_name: Option<String>,
    /// Joined `data:` lines, if any.
    pub payload: Option<String>,
}

impl Frame {
    /// Create a frame from its parts.
    pub fn new(event_name: Option<&str>, payload: Option<&str>) -> Self {
        Self {
            event_name: event_name.map(str::to_string),
            payload: payload.map(str::to_string),
        }
    }

    /// Returns true if neither field was set.
    pub fn is_empty(&self) -> bool {
        self.event_name.is_none() && self.payload.is_none()
    }
}
