//! Slack Events API payloads
//!
//! Parses the outer envelope and maps inner events onto the core [`Event`].
//! Classification happens here; actionability is decided by the core.

use serde::{Deserialize, Deserializer};
use slack_relay_core::event::{Event, EventKind};

/// Outer Events API envelope
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    /// Endpoint ownership check sent when the URL is configured
    UrlVerification {
        /// Value to echo back
        challenge: String,
    },
    /// A subscribed event
    EventCallback {
        /// Envelope id, stable across Slack retries
        #[serde(default)]
        event_id: Option<String>,
        /// The wrapped event
        event: SlackEvent,
    },
    /// Any other envelope type (`app_rate_limited`, ...)
    #[serde(other)]
    Other,
}

/// Inner event of an `event_callback` envelope
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlackEvent {
    /// Event type, e.g. `app_mention` or `message`
    #[serde(rename = "type")]
    pub kind: String,
    /// Sending user id
    #[serde(default, deserialize_with = "lenient_string")]
    pub user: Option<String>,
    /// Message text
    #[serde(default, deserialize_with = "lenient_string")]
    pub text: Option<String>,
    /// Message timestamp
    #[serde(default, deserialize_with = "lenient_string")]
    pub ts: Option<String>,
    /// Channel id
    #[serde(default, deserialize_with = "lenient_string")]
    pub channel: Option<String>,
    /// `im`, `channel`, `group` or `mpim` for message events
    #[serde(default, deserialize_with = "lenient_string")]
    pub channel_type: Option<String>,
    /// Client-generated message id
    #[serde(default, deserialize_with = "lenient_string")]
    pub client_msg_id: Option<String>,
    /// Set on messages posted by bots
    #[serde(default, deserialize_with = "lenient_string")]
    pub bot_id: Option<String>,
    /// Message subtype (`message_changed`, `bot_message`, ...)
    #[serde(default, deserialize_with = "lenient_string")]
    pub subtype: Option<String>,
}

/// Accept a string, and map any other JSON value to `None`.
///
/// Some subscribed events carry objects where messages carry ids
/// (`channel_created`, `team_join`), and they must still parse.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    })
}

impl SlackEvent {
    /// Classify this event for the core.
    #[must_use]
    pub fn classify(&self) -> EventKind {
        if let Some(subtype) = self.subtype.as_deref() {
            return EventKind::Other(subtype.to_string());
        }
        match (self.kind.as_str(), self.channel_type.as_deref()) {
            ("app_mention", _) => EventKind::AppMention,
            ("message", Some("im")) => EventKind::DirectMessage,
            (kind, _) => EventKind::Other(kind.to_string()),
        }
    }

    /// Convert to a core [`Event`].
    ///
    /// Returns `None` when the payload lacks a timestamp or channel, since no
    /// stable identity can be derived.
    #[must_use]
    pub fn to_event(&self) -> Option<Event> {
        let timestamp = self.ts.as_deref().filter(|s| !s.trim().is_empty())?;
        let channel = self.channel.as_deref().filter(|s| !s.trim().is_empty())?;

        Some(Event {
            event_id: self
                .client_msg_id
                .clone()
                .filter(|id| !id.trim().is_empty())
                .or_else(|| Some(timestamp.to_string())),
            timestamp: timestamp.to_string(),
            channel: channel.to_string(),
            sender: self.user.clone().unwrap_or_default(),
            text: self.text.clone().unwrap_or_default(),
            kind: self.classify(),
            from_bot: self.bot_id.is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Envelope {
        serde_json::from_value(value).expect("envelope")
    }

    fn mention_payload() -> serde_json::Value {
        json!({
            "type": "event_callback",
            "event_id": "Ev1",
            "event": {
                "type": "app_mention",
                "user": "U1",
                "text": "<@UBOT> book room A at 3pm",
                "ts": "1700000000.000100",
                "channel": "C1",
                "client_msg_id": "m-1"
            }
        })
    }

    #[test]
    fn test_url_verification() {
        let envelope = parse(json!({"type": "url_verification", "challenge": "abc", "token": "t"}));
        assert!(matches!(envelope, Envelope::UrlVerification { challenge } if challenge == "abc"));
    }

    #[test]
    fn test_unknown_envelope_type() {
        let envelope = parse(json!({"type": "app_rate_limited", "minute_rate_limited": 1}));
        assert!(matches!(envelope, Envelope::Other));
    }

    #[test]
    fn test_app_mention_converts() {
        let Envelope::EventCallback { event, .. } = parse(mention_payload()) else {
            panic!("expected event_callback");
        };
        let converted = event.to_event().expect("event");

        assert_eq!(converted.event_id.as_deref(), Some("m-1"));
        assert_eq!(converted.channel, "C1");
        assert_eq!(converted.sender, "U1");
        assert_eq!(converted.kind, EventKind::AppMention);
        assert!(converted.is_actionable());
        assert_eq!(converted.key().as_str(), "C1:m-1");
    }

    #[test]
    fn test_missing_client_msg_id_falls_back_to_ts() {
        let event = SlackEvent {
            kind: "app_mention".to_string(),
            user: Some("U1".to_string()),
            text: Some("hi".to_string()),
            ts: Some("1.5".to_string()),
            channel: Some("C1".to_string()),
            ..SlackEvent::default()
        };
        let converted = event.to_event().expect("event");
        assert_eq!(converted.event_id.as_deref(), Some("1.5"));
    }

    #[test]
    fn test_direct_message_is_actionable_channel_message_is_not() {
        let dm = SlackEvent {
            kind: "message".to_string(),
            user: Some("U1".to_string()),
            text: Some("hi".to_string()),
            ts: Some("1.5".to_string()),
            channel: Some("D1".to_string()),
            channel_type: Some("im".to_string()),
            ..SlackEvent::default()
        };
        assert_eq!(dm.classify(), EventKind::DirectMessage);

        let channel_msg = SlackEvent {
            channel_type: Some("channel".to_string()),
            ..dm.clone()
        };
        assert!(!channel_msg.to_event().expect("event").is_actionable());
    }

    #[test]
    fn test_bot_and_subtype_messages_are_not_actionable() {
        let base = SlackEvent {
            kind: "message".to_string(),
            user: Some("U1".to_string()),
            text: Some("hi".to_string()),
            ts: Some("1.5".to_string()),
            channel: Some("D1".to_string()),
            channel_type: Some("im".to_string()),
            ..SlackEvent::default()
        };

        let from_bot = SlackEvent {
            bot_id: Some("B1".to_string()),
            ..base.clone()
        };
        assert!(!from_bot.to_event().expect("event").is_actionable());

        let edited = SlackEvent {
            subtype: Some("message_changed".to_string()),
            ..base
        };
        assert_eq!(
            edited.classify(),
            EventKind::Other("message_changed".to_string())
        );
    }

    #[test]
    fn test_object_valued_fields_still_parse() {
        let envelope = parse(json!({
            "type": "event_callback",
            "event": {
                "type": "channel_created",
                "channel": {"id": "C9", "name": "new", "creator": "U1"}
            }
        }));
        let Envelope::EventCallback { event, .. } = envelope else {
            panic!("expected event_callback");
        };
        assert_eq!(event.kind, "channel_created");
        assert!(event.channel.is_none());
        assert!(event.to_event().is_none());

        let joined = parse(json!({
            "type": "event_callback",
            "event": {"type": "team_join", "user": {"id": "U2", "name": "new-hire"}}
        }));
        assert!(matches!(joined, Envelope::EventCallback { event, .. } if event.user.is_none()));
    }

    #[test]
    fn test_missing_channel_yields_none() {
        let event = SlackEvent {
            kind: "app_mention".to_string(),
            ts: Some("1.5".to_string()),
            ..SlackEvent::default()
        };
        assert!(event.to_event().is_none());
    }
}
