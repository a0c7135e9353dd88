//! Slack transport settings.

use config::ConfigError;
use serde::{Deserialize, Serialize};
use slack_relay_core::config::RelaySettings;
use std::sync::Arc;

/// Default Slack Web API base URL.
pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";
/// Default HTTP listen address for the Events API webhook.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3002";
/// Default path Slack posts events to.
pub const DEFAULT_EVENTS_PATH: &str = "/slack/events";

/// Maximum retry attempts for transient Slack API failures.
pub const SLACK_API_MAX_RETRIES: usize = 3;
/// Initial backoff delay for Slack API retries (milliseconds).
pub const SLACK_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff delay for Slack API retries (milliseconds).
pub const SLACK_API_MAX_BACKOFF_MS: u64 = 4000;
/// Per-request timeout for Slack API calls (seconds).
pub const SLACK_API_TIMEOUT_SECS: u64 = 10;
/// Longest message text sent to Slack, in characters.
pub const SLACK_MAX_MESSAGE_CHARS: usize = 4000;
/// Maximum accepted age of a signed request (seconds).
pub const SIGNATURE_MAX_AGE_SECS: u64 = 300;

/// Slack transport settings loaded from environment variables.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SlackSettings {
    /// Bot token (`xoxb-...`) used for Web API calls.
    pub slack_bot_token: String,
    /// Signing secret; request verification is disabled when unset.
    #[serde(default)]
    pub slack_signing_secret: Option<String>,
    /// Web API base URL.
    #[serde(default = "default_api_base")]
    pub slack_api_base: String,
    /// Address the webhook server binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Route that receives Events API callbacks.
    #[serde(default = "default_events_path")]
    pub events_path: String,
}

fn default_api_base() -> String {
    DEFAULT_SLACK_API_BASE.to_string()
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_events_path() -> String {
    DEFAULT_EVENTS_PATH.to_string()
}

impl SlackSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or the bot token is missing.
    pub fn new() -> Result<Self, ConfigError> {
        let settings: Self = slack_relay_core::config::build_config()?.try_deserialize()?;
        if settings.slack_bot_token.trim().is_empty() {
            return Err(ConfigError::Message(
                "SLACK_BOT_TOKEN must be set".to_string(),
            ));
        }
        Ok(settings)
    }

    /// Signing secret, if configured and non-blank.
    #[must_use]
    pub fn signing_secret(&self) -> Option<&str> {
        self.slack_signing_secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Events path normalised to start with `/`.
    #[must_use]
    pub fn events_route(&self) -> String {
        let path = self.events_path.trim();
        if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        }
    }
}

/// Combined settings used by the Slack transport layer.
#[derive(Clone)]
pub struct BotSettings {
    /// Relay settings shared with the runtime.
    pub relay: Arc<RelaySettings>,
    /// Slack-specific settings.
    pub slack: Arc<SlackSettings>,
}

impl BotSettings {
    /// Create a new combined settings bundle.
    #[must_use]
    pub fn new(relay: RelaySettings, slack: SlackSettings) -> Self {
        Self {
            relay: Arc::new(relay),
            slack: Arc::new(slack),
        }
    }
}
