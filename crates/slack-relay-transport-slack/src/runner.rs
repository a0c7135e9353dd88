use crate::api::SlackApiClient;
use crate::config::BotSettings;
use crate::server::{self, AppState};
use anyhow::Context;
use slack_relay_core::upstream::{HttpUpstreamClient, UpstreamClient};
use slack_relay_runtime::{DeliveryCoordinator, EventHandler, MessagingTransport};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Run the Slack relay until Ctrl-C, then drain in-flight deliveries.
///
/// # Errors
///
/// Returns an error if the Slack client cannot be built, the listen address
/// cannot be bound, or the server fails.
pub async fn run_relay(settings: Arc<BotSettings>) -> anyhow::Result<()> {
    let handler = Arc::new(init_handler(&settings)?);

    let signing_secret = settings.slack.signing_secret();
    if signing_secret.is_none() {
        warn!("SLACK_SIGNING_SECRET is not set, request signatures will not be verified");
    }

    let events_path = settings.slack.events_route();
    let app = server::router(AppState::new(Arc::clone(&handler), signing_secret), &events_path);

    let listener = TcpListener::bind(&settings.slack.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.slack.listen_addr))?;

    info!(
        addr = %settings.slack.listen_addr,
        path = %events_path,
        upstream = %settings.relay.upstream_url,
        "Slack relay is running..."
    );

    let shutdown = init_shutdown_signal();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .context("webhook server failed")?;

    handler.shutdown().await;
    info!("Slack relay stopped.");
    Ok(())
}

fn init_handler(settings: &BotSettings) -> anyhow::Result<EventHandler> {
    let transport: Arc<dyn MessagingTransport> = Arc::new(
        SlackApiClient::new(&settings.slack).context("failed to create Slack API client")?,
    );
    info!("Slack API client initialized.");

    let upstream: Arc<dyn UpstreamClient> =
        Arc::new(HttpUpstreamClient::new(settings.relay.upstream_url.clone()));

    info!(
        event_cache = settings.relay.event_cache_capacity(),
        cooldown_secs = settings.relay.response_cooldown().as_secs(),
        resend_guard_secs = settings.relay.resend_guard().as_secs(),
        timeout_secs = settings.relay.upstream_timeout().as_secs(),
        "Initializing event handler"
    );

    let coordinator = DeliveryCoordinator::new(transport, upstream, &settings.relay);
    Ok(EventHandler::new(coordinator, &settings.relay))
}

fn init_shutdown_signal() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested, no longer accepting events");
                trigger.cancel();
            }
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });
    token
}
