//! HTTP surface: Events API webhook plus health and stats endpoints.

use crate::events::Envelope;
use crate::signature::{self, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use slack_relay_runtime::{EventHandler, RelayStats};
use std::sync::Arc;
use tracing::{debug, info, warn};

const RETRY_NUM_HEADER: &str = "X-Slack-Retry-Num";
const RETRY_REASON_HEADER: &str = "X-Slack-Retry-Reason";

const FEATURES: &[&str] = &[
    "App mention and direct message handling",
    "Duplicate event prevention",
    "In-flight claim per event",
    "Response cooldown with manual resend guard",
    "Request ID tracking",
];

/// Shared state for the router.
#[derive(Clone)]
pub struct AppState {
    handler: Arc<EventHandler>,
    signing_secret: Option<Arc<str>>,
}

impl AppState {
    /// Create router state. `signing_secret` of `None` disables verification.
    #[must_use]
    pub fn new(handler: Arc<EventHandler>, signing_secret: Option<&str>) -> Self {
        Self {
            handler,
            signing_secret: signing_secret.map(Arc::from),
        }
    }
}

/// `GET /health` body
#[derive(Debug, Serialize)]
pub struct HealthReport {
    /// Always `healthy` while the process serves requests
    pub status: &'static str,
    /// Whether request signatures are checked
    pub signature_verification: bool,
    /// Upstream endpoint in use
    pub upstream_url: String,
    /// Keys currently held by the event dedup cache
    pub processed_events_count: usize,
}

/// `GET /` body
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    /// Human-readable status line
    pub message: &'static str,
    /// Health endpoint path
    pub health: &'static str,
    /// Stats endpoint path
    pub stats: &'static str,
    /// Enabled features
    pub features: &'static [&'static str],
}

/// Build the router, mounting the webhook at `events_path`.
pub fn router(state: AppState, events_path: &str) -> Router {
    Router::new()
        .route(events_path, post(handle_events))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/", get(banner))
        .with_state(state)
}

async fn handle_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = state.signing_secret.as_deref() {
        let verified = signature::verify(
            secret,
            header_str(&headers, TIMESTAMP_HEADER),
            header_str(&headers, SIGNATURE_HEADER),
            &body,
            chrono::Utc::now().timestamp(),
        );
        if let Err(e) = verified {
            warn!(error = %e, "Rejected webhook request");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    let envelope: Envelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Failed to parse webhook body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match envelope {
        Envelope::UrlVerification { challenge } => {
            info!("Answering URL verification challenge");
            ([(header::CONTENT_TYPE, "text/plain")], challenge).into_response()
        }
        Envelope::EventCallback { event_id, event } => {
            if let Some(retry_num) = header_str(&headers, RETRY_NUM_HEADER) {
                info!(
                    retry_num,
                    retry_reason = header_str(&headers, RETRY_REASON_HEADER).unwrap_or(""),
                    envelope_id = event_id.as_deref().unwrap_or(""),
                    "Slack is redelivering an event"
                );
            }

            match event.to_event() {
                Some(event) => {
                    if let Err(reason) = state.handler.handle(event) {
                        debug!(reason = ?reason, "Event skipped");
                    }
                }
                None => debug!(kind = %event.kind, "Event without channel or ts"),
            }
            StatusCode::OK.into_response()
        }
        Envelope::Other => StatusCode::OK.into_response(),
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let stats = state.handler.stats();
    Json(HealthReport {
        status: "healthy",
        signature_verification: state.signing_secret.is_some(),
        upstream_url: stats.upstream_url,
        processed_events_count: stats.event_cache_size,
    })
}

async fn stats(State(state): State<AppState>) -> Json<RelayStats> {
    Json(state.handler.stats())
}

async fn banner() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "Slack relay is running",
        health: "/health",
        stats: "/stats",
        features: FEATURES,
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
