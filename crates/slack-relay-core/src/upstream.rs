//! Upstream processing service client
//!
//! One bounded request/response call per event. The call always resolves to
//! exactly one [`UpstreamResult`] and never outlives its timeout. Retries are
//! the caller's business.

use crate::error::UpstreamError;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Reply used when upstream reports success without any text.
pub const DEFAULT_SUCCESS_TEXT: &str = "✅ Request processed successfully";
/// Error detail used when upstream declines without saying why.
pub const UNKNOWN_UPSTREAM_ERROR: &str = "Unknown error occurred";

const MAX_ERROR_BODY_CHARS: usize = 500;

/// Request body sent to the upstream agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpstreamRequest {
    /// Free-form message, already enriched with sender identity
    pub message: String,
}

impl UpstreamRequest {
    /// Embed the sender identity in front of the user text.
    ///
    /// # Examples
    ///
    /// ```
    /// use slack_relay_core::upstream::UpstreamRequest;
    ///
    /// let req = UpstreamRequest::enriched("jdoe", "John", "book room");
    /// assert_eq!(
    ///     req.message,
    ///     "Username is: jdoe, Display name is: John, User message is: book room"
    /// );
    /// ```
    #[must_use]
    pub fn enriched(username: &str, display_name: &str, text: &str) -> Self {
        Self {
            message: format!(
                "Username is: {username}, Display name is: {display_name}, User message is: {text}"
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpstreamResponse {
    #[serde(default)]
    success: bool,
    response: Option<String>,
    error: Option<String>,
}

/// Outcome of one upstream call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamResult {
    /// HTTP 200 with `success: true`
    Success {
        /// Text to show to the user
        response_text: String,
    },
    /// HTTP 200 with `success: false`; upstream declined the request
    BusinessError {
        /// Upstream's reason, for logs only
        message: String,
    },
    /// No answer within the timeout
    Timeout,
    /// Upstream unreachable, non-200, or unreadable body
    TransportError {
        /// Classified cause
        cause: UpstreamError,
    },
}

/// Interface to the upstream processing service
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Send `request` and wait at most `timeout` for the answer.
    async fn invoke(&self, request: &UpstreamRequest, timeout: Duration) -> UpstreamResult;
}

/// `reqwest`-backed upstream client
#[derive(Clone)]
pub struct HttpUpstreamClient {
    http: HttpClient,
    endpoint: String,
}

impl HttpUpstreamClient {
    /// Create a client posting to `endpoint`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(HttpClient::new(), endpoint)
    }

    /// Create a client reusing an existing connection pool.
    #[must_use]
    pub fn with_client(http: HttpClient, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    /// Configured endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, request: &UpstreamRequest) -> Result<UpstreamResult, UpstreamError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        let status = response.status();
        debug!(status = %status, "Upstream responded");
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let body: UpstreamResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::MalformedBody(e.to_string()))?;

        Ok(classify(body))
    }
}

fn classify(body: UpstreamResponse) -> UpstreamResult {
    if body.success {
        UpstreamResult::Success {
            response_text: body
                .response
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SUCCESS_TEXT.to_string()),
        }
    } else {
        UpstreamResult::BusinessError {
            message: body
                .error
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_UPSTREAM_ERROR.to_string()),
        }
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    #[instrument(skip(self, request), fields(endpoint = %self.endpoint))]
    async fn invoke(&self, request: &UpstreamRequest, timeout: Duration) -> UpstreamResult {
        match tokio::time::timeout(timeout, self.send(request)).await {
            Ok(Ok(result)) => result,
            Ok(Err(cause)) => UpstreamResult::TransportError { cause },
            Err(_) => UpstreamResult::Timeout,
        }
    }
}
