//! Failure taxonomy
//!
//! Duplicates are not errors: they are reported as [`SkipReason`]s. Everything
//! that can go wrong while processing an accepted event is classified into an
//! [`OutcomeKind`] so callers and tests can match on the kind instead of on
//! log text.

use serde::Serialize;
use thiserror::Error;

/// Why an inbound event was not processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// Not a mention/message the relay acts on.
    NotActionable,
    /// Already seen in the event dedup cache.
    DuplicateEvent,
    /// Another task already holds the claim for this event key.
    ConcurrentDuplicate,
}

/// Final classification of one event's processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutcomeKind {
    /// Upstream answered successfully.
    Success,
    /// Upstream answered but declined the request.
    UpstreamBusinessError,
    /// Upstream did not answer in time.
    UpstreamTimeout,
    /// Upstream could not be reached or answered garbage.
    UpstreamTransportError,
    /// The final message could not be posted or updated.
    MessagingApiFailure,
    /// Unexpected failure inside the coordinator itself.
    InternalFault,
}

/// Errors talking to the upstream processing service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// Connection refused, DNS failure, reset...
    #[error("Network error: {0}")]
    Network(String),
    /// Upstream answered with a non-200 status
    #[error("Unexpected status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Truncated response body
        body: String,
    },
    /// Response body was not the expected JSON shape
    #[error("Malformed response: {0}")]
    MalformedBody(String),
}

/// Errors from the outbound messaging API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagingError {
    /// Request never got a usable HTTP answer
    #[error("Messaging transport error: {0}")]
    Transport(String),
    /// API answered `ok: false`
    #[error("{method} failed: {error}")]
    Api {
        /// API method name, e.g. `chat.update`
        method: String,
        /// Error code returned by the platform
        error: String,
    },
    /// Rate limited (429), optionally with a wait time
    #[error("Rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited {
        /// Retry-After in seconds, if provided
        retry_after_secs: Option<u64>,
    },
    /// Response could not be decoded
    #[error("Invalid messaging response: {0}")]
    InvalidResponse(String),
}

impl MessagingError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::RateLimited { .. })
    }
}
