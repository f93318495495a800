//! Inbound chat events and the per-batch alert filter.

use crate::alert::{extract_alert, AlertIdentity};
use serde::Deserialize;

/// Event kind for plain chat messages.
pub const MESSAGE_KIND: &str = "message";

/// One event from the chat transport (Slack message JSON shape).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InboundEvent {
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Present for edits, deletions, joins, bot echoes, etc. Plain messages have none.
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "channel", default)]
    pub channel_id: String,
    /// Slack `ts`; also the thread anchor for replies.
    #[serde(rename = "ts", default)]
    pub timestamp: String,
}

impl InboundEvent {
    /// A plain user message in `channel_id` with the given `ts`.
    pub fn message(
        channel_id: impl Into<String>,
        timestamp: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            kind: MESSAGE_KIND.to_string(),
            subtype: None,
            text: text.into(),
            channel_id: channel_id.into(),
            timestamp: timestamp.into(),
        }
    }

    /// True for `message` events without a subtype.
    pub fn is_plain_message(&self) -> bool {
        self.kind == MESSAGE_KIND
            && self
                .subtype
                .as_deref()
                .map_or(true, |s| s.trim().is_empty())
    }
}

/// The event that carried an alert, and the alert extracted from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMatch<'a> {
    pub event: &'a InboundEvent,
    pub alert: AlertIdentity,
}

/// First plain message in `events` (arrival order) that carries an alert.
///
/// Scanning stops at the first match, so at most one alert is reported per batch;
/// later alerts in the same batch are not seen.
pub fn find_alert(events: &[InboundEvent]) -> Option<AlertMatch<'_>> {
    for event in events {
        if !event.is_plain_message() {
            log::debug!(
                "skipping event kind={} subtype={:?} ts={}",
                event.kind,
                event.subtype,
                event.timestamp
            );
            continue;
        }
        if let Some(alert) = extract_alert(&event.text) {
            return Some(AlertMatch { event, alert });
        }
    }
    None
}
