//! Slack Web API client
//!
//! Implements [`MessagingTransport`] over `chat.postMessage`, `chat.update`
//! and `users.info`. Transient failures are retried with jittered exponential
//! backoff; Slack-level errors (`ok: false`) are returned as-is.

use crate::config::{
    SlackSettings, SLACK_API_INITIAL_BACKOFF_MS, SLACK_API_MAX_BACKOFF_MS, SLACK_API_MAX_RETRIES,
    SLACK_API_TIMEOUT_SECS, SLACK_MAX_MESSAGE_CHARS,
};
use async_trait::async_trait;
use reqwest::{header, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use slack_relay_core::error::MessagingError;
use slack_relay_runtime::{MessageHandle, MessagingTransport, SenderProfile};
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, warn};
use unicode_segmentation::UnicodeSegmentation;

const TRUNCATION_MARKER: &str = "…";

#[derive(Debug, Deserialize)]
struct ApiStatus {
    ok: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    ts: Option<String>,
    channel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsersInfoResponse {
    user: SlackUser,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    name: String,
    #[serde(default)]
    profile: SlackUserProfile,
}

#[derive(Debug, Default, Deserialize)]
struct SlackUserProfile {
    #[serde(default)]
    display_name: String,
}

/// Slack Web API client bound to one bot token.
#[derive(Clone)]
pub struct SlackApiClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    max_retries: usize,
    initial_backoff_ms: u64,
}

impl SlackApiClient {
    /// Create a client from Slack settings.
    ///
    /// # Errors
    ///
    /// Returns `MessagingError::Transport` if the HTTP client cannot be built.
    pub fn new(settings: &SlackSettings) -> Result<Self, MessagingError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(SLACK_API_TIMEOUT_SECS))
            .build()
            .map_err(|e| MessagingError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_base: settings.slack_api_base.trim_end_matches('/').to_string(),
            bot_token: settings.slack_bot_token.trim().to_string(),
            max_retries: SLACK_API_MAX_RETRIES,
            initial_backoff_ms: SLACK_API_INITIAL_BACKOFF_MS,
        })
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retry(mut self, max_retries: usize, initial_backoff_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.initial_backoff_ms = initial_backoff_ms.max(1);
        self
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }

    /// Call `method`, retrying transient failures.
    async fn call<T, F>(&self, method: &str, build: F) -> Result<T, MessagingError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let strategy = ExponentialBackoff::from_millis(self.initial_backoff_ms)
            .max_delay(Duration::from_millis(SLACK_API_MAX_BACKOFF_MS))
            .map(jitter)
            .take(self.max_retries);

        RetryIf::spawn(
            strategy,
            || self.call_once(method, build()),
            |e: &MessagingError| {
                let transient = e.is_transient();
                if transient {
                    debug!(method, error = %e, "Retrying Slack API call");
                }
                transient
            },
        )
        .await
        .map_err(|e| {
            warn!(method, error = %e, "Slack API call failed");
            e
        })
    }

    async fn call_once<T: DeserializeOwned>(
        &self,
        method: &str,
        request: RequestBuilder,
    ) -> Result<T, MessagingError> {
        let response = request
            .bearer_auth(&self.bot_token)
            .send()
            .await
            .map_err(|e| MessagingError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            return Err(MessagingError::RateLimited { retry_after_secs });
        }
        if status.is_server_error() {
            return Err(MessagingError::Transport(format!(
                "{method} returned HTTP {status}"
            )));
        }
        if !status.is_success() {
            return Err(MessagingError::InvalidResponse(format!(
                "{method} returned HTTP {status}"
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| MessagingError::InvalidResponse(e.to_string()))?;

        let api_status: ApiStatus = serde_json::from_value(body.clone())
            .map_err(|e| MessagingError::InvalidResponse(e.to_string()))?;
        if !api_status.ok {
            return Err(MessagingError::Api {
                method: method.to_string(),
                error: api_status
                    .error
                    .unwrap_or_else(|| "unknown_error".to_string()),
            });
        }

        serde_json::from_value(body).map_err(|e| MessagingError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl MessagingTransport for SlackApiClient {
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
    ) -> Result<MessageHandle, MessagingError> {
        let payload = json!({
            "channel": channel,
            "text": truncate_for_slack(text, SLACK_MAX_MESSAGE_CHARS),
        });
        let url = self.url("chat.postMessage");
        let response: ChatMessageResponse = self
            .call("chat.postMessage", || self.http.post(&url).json(&payload))
            .await?;

        let id = response.ts.ok_or_else(|| {
            MessagingError::InvalidResponse("chat.postMessage response missing ts".to_string())
        })?;
        Ok(MessageHandle {
            channel: response.channel.unwrap_or_else(|| channel.to_string()),
            id,
        })
    }

    async fn update_message(&self, handle: &MessageHandle, text: &str) -> Result<(), MessagingError> {
        let payload = json!({
            "channel": handle.channel,
            "ts": handle.id,
            "text": truncate_for_slack(text, SLACK_MAX_MESSAGE_CHARS),
        });
        let url = self.url("chat.update");
        let _: ChatMessageResponse = self
            .call("chat.update", || self.http.post(&url).json(&payload))
            .await?;
        Ok(())
    }

    async fn lookup_sender(&self, sender_id: &str) -> Result<SenderProfile, MessagingError> {
        let url = self.url("users.info");
        let response: UsersInfoResponse = self
            .call("users.info", || {
                self.http.get(&url).query(&[("user", sender_id)])
            })
            .await?;

        let user = response.user;
        let display_name = if user.profile.display_name.trim().is_empty() {
            user.name.clone()
        } else {
            user.profile.display_name
        };
        Ok(SenderProfile {
            username: user.name,
            display_name,
        })
    }
}

/// Truncate `text` to at most `max_chars` grapheme clusters, marking the cut.
#[must_use]
pub fn truncate_for_slack(text: &str, max_chars: usize) -> String {
    if text.graphemes(true).count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(1);
    let mut out: String = text.graphemes(true).take(keep).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}
