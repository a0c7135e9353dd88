use async_trait::async_trait;
use slack_relay_core::error::MessagingError;

/// Identifier of a posted message, enough to edit it later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle {
    /// Channel the message lives in.
    pub channel: String,
    /// Platform message id (Slack `ts`).
    pub id: String,
}

/// Human-readable identity of a sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderProfile {
    /// Account name.
    pub username: String,
    /// Display name, falls back to the account name.
    pub display_name: String,
}

impl SenderProfile {
    /// Profile used when the lookup fails: the raw sender id for both names.
    #[must_use]
    pub fn fallback(sender_id: &str) -> Self {
        Self {
            username: sender_id.to_string(),
            display_name: sender_id.to_string(),
        }
    }
}

/// Outbound messaging API used by the delivery coordinator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagingTransport: Send + Sync + 'static {
    /// Post a new message to `channel`.
    async fn post_message(&self, channel: &str, text: &str)
        -> Result<MessageHandle, MessagingError>;

    /// Replace the text of an existing message.
    async fn update_message(&self, handle: &MessageHandle, text: &str)
        -> Result<(), MessagingError>;

    /// Best-effort sender lookup.
    async fn lookup_sender(&self, sender_id: &str) -> Result<SenderProfile, MessagingError>;
}
