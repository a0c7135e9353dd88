//! Inbound events and their dedup identity
//!
//! An [`Event`] is the parsed unit of work delivered by the platform webhook.
//! Its [`EventKey`] is the identity used by both the event dedup cache and the
//! task registry, so two deliveries of the same message must always agree on it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of inbound event as classified by the routing layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// The bot was mentioned in a channel.
    AppMention,
    /// A direct message to the bot.
    DirectMessage,
    /// Anything else (edits, joins, bot echoes...).
    Other(String),
}

/// Inbound unit of work, immutable once parsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Platform-assigned id (client message id), if any
    pub event_id: Option<String>,
    /// Platform timestamp, also the fallback identity
    pub timestamp: String,
    /// Channel the event was posted in
    pub channel: String,
    /// Sender identifier
    pub sender: String,
    /// Message text
    pub text: String,
    /// Classification from the routing layer
    pub kind: EventKind,
    /// Set when the message was produced by a bot (including ourselves)
    pub from_bot: bool,
}

impl Event {
    /// Create an app-mention event.
    #[must_use]
    pub fn mention(
        event_id: Option<&str>,
        timestamp: &str,
        channel: &str,
        sender: &str,
        text: &str,
    ) -> Self {
        Self {
            event_id: event_id.map(ToString::to_string),
            timestamp: timestamp.to_string(),
            channel: channel.to_string(),
            sender: sender.to_string(),
            text: text.to_string(),
            kind: EventKind::AppMention,
            from_bot: false,
        }
    }

    /// Whether the core should act on this event at all.
    #[must_use]
    pub fn is_actionable(&self) -> bool {
        matches!(self.kind, EventKind::AppMention | EventKind::DirectMessage)
            && !self.from_bot
            && !self.sender.trim().is_empty()
            && !self.text.trim().is_empty()
    }

    /// Derive the dedup identity of this event.
    #[must_use]
    pub fn key(&self) -> EventKey {
        EventKey::derive(self.event_id.as_deref(), &self.timestamp, &self.channel)
    }
}

/// Deterministic identity of an event: `"{channel}:{event_id|timestamp}"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventKey(String);

impl EventKey {
    /// Build the key from an optional platform id, the event timestamp and the channel.
    ///
    /// A blank `event_id` counts as absent, so a redelivery that drops the id
    /// still lands on the timestamp-derived key.
    #[must_use]
    pub fn derive(event_id: Option<&str>, timestamp: &str, channel: &str) -> Self {
        let id = event_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| timestamp.trim());
        Self(format!("{}:{id}", channel.trim()))
    }

    /// Borrow the raw key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
