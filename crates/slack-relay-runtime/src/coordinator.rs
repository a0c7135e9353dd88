//! Acknowledge-then-update delivery
//!
//! One run turns one claimed event into exactly one user-visible outcome:
//!
//! 1. post a placeholder and keep its handle (failure is tolerated),
//! 2. call upstream with the enriched request,
//! 3. map the result to final text,
//! 4. edit the placeholder in place, or post a new message if that fails,
//!    unless an identical response went out within the cooldown window.
//!
//! Every stage runs under `catch_unwind`; a panic becomes an
//! [`OutcomeKind::InternalFault`] and the user still gets an apology, through
//! the placeholder when there is one.
//!
//! Known limitation: when the final text is suppressed as a duplicate, the
//! placeholder of that run is left as posted. This happens when two deliveries
//! of one message derive different event keys (one carries `client_msg_id`,
//! the other only `ts`) and so both pass event dedup.

use crate::transport::{MessageHandle, MessagingTransport, SenderProfile};
use futures_util::FutureExt;
use slack_relay_core::cache::{response_key, ResponseDedupCache, SendMode};
use slack_relay_core::config::RelaySettings;
use slack_relay_core::error::OutcomeKind;
use slack_relay_core::event::Event;
use slack_relay_core::upstream::{UpstreamClient, UpstreamRequest, UpstreamResult};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Generic apology, also used when upstream declines the request.
pub const GENERIC_REPLY: &str = "Sorry, I couldn't process the request at the moment.";
/// Apology for upstream timeouts.
pub const TIMEOUT_REPLY: &str =
    "Sorry, that took longer than expected and I had to give up. Please try again in a moment.";
/// Apology for upstream connectivity failures.
pub const CONNECTIVITY_REPLY: &str =
    "Sorry, I can't reach the assistant service right now. Please try again later.";
/// Apology for internal faults.
pub const UNEXPECTED_REPLY: &str = "Sorry, something unexpected went wrong while handling your request.";

/// Extra time granted to the upstream client before the coordinator stops waiting on its own.
const UPSTREAM_BACKSTOP_GRACE: Duration = Duration::from_secs(1);

/// Fixed user-facing texts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTexts {
    /// Placeholder posted before the upstream call.
    pub ack: String,
    /// Upstream declined the request.
    pub generic: String,
    /// Upstream timed out.
    pub timeout: String,
    /// Upstream unreachable.
    pub connectivity: String,
    /// Internal fault.
    pub unexpected: String,
}

impl ReplyTexts {
    /// Default texts with a custom placeholder.
    #[must_use]
    pub fn with_ack(ack: impl Into<String>) -> Self {
        Self {
            ack: ack.into(),
            generic: GENERIC_REPLY.to_string(),
            timeout: TIMEOUT_REPLY.to_string(),
            connectivity: CONNECTIVITY_REPLY.to_string(),
            unexpected: UNEXPECTED_REPLY.to_string(),
        }
    }
}

impl Default for ReplyTexts {
    fn default() -> Self {
        Self::with_ack(slack_relay_core::config::DEFAULT_ACK_TEXT)
    }
}

/// Who a final message goes to and which event it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTarget {
    /// Recipient channel.
    pub channel: String,
    /// Original sender.
    pub sender: String,
    /// Timestamp of the answered event.
    pub event_ts: String,
}

impl From<&Event> for DeliveryTarget {
    fn from(event: &Event) -> Self {
        Self {
            channel: event.channel.clone(),
            sender: event.sender.clone(),
            event_ts: event.timestamp.clone(),
        }
    }
}

/// How the final text reached (or did not reach) the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPath {
    /// The placeholder was edited in place.
    Updated,
    /// A new message was posted.
    Posted,
    /// An identical response was sent recently; nothing was sent.
    Suppressed,
    /// Every messaging call failed.
    Failed,
}

/// Result of one coordinator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// How the event was resolved.
    pub outcome: OutcomeKind,
    /// How the final text was delivered.
    pub path: DeliveryPath,
    /// Final text chosen for the user.
    pub text: String,
}

impl DeliveryReport {
    /// Outcome including delivery failures.
    #[must_use]
    pub fn final_kind(&self) -> OutcomeKind {
        if self.path == DeliveryPath::Failed {
            OutcomeKind::MessagingApiFailure
        } else {
            self.outcome
        }
    }
}

/// Drives one claimed event through acknowledge, upstream call and delivery.
pub struct DeliveryCoordinator {
    transport: Arc<dyn MessagingTransport>,
    upstream: Arc<dyn UpstreamClient>,
    responses: ResponseDedupCache,
    upstream_timeout: Duration,
    texts: ReplyTexts,
}

impl DeliveryCoordinator {
    /// Create a coordinator from relay settings.
    #[must_use]
    pub fn new(
        transport: Arc<dyn MessagingTransport>,
        upstream: Arc<dyn UpstreamClient>,
        settings: &RelaySettings,
    ) -> Self {
        Self {
            transport,
            upstream,
            responses: ResponseDedupCache::new(
                settings.response_cooldown(),
                settings.resend_guard(),
                settings.response_cache_max_size,
            ),
            upstream_timeout: settings.upstream_timeout(),
            texts: ReplyTexts::with_ack(settings.ack_text.clone()),
        }
    }

    /// Override the user-facing texts.
    #[must_use]
    pub fn with_texts(mut self, texts: ReplyTexts) -> Self {
        self.texts = texts;
        self
    }

    /// Texts in use.
    #[must_use]
    pub const fn texts(&self) -> &ReplyTexts {
        &self.texts
    }

    /// Number of sends suppressed by the response cooldown.
    #[must_use]
    pub fn suppressed_count(&self) -> u64 {
        self.responses.suppressed_count()
    }

    /// Process one event end to end. Always returns, in bounded time.
    pub async fn run(&self, event: &Event) -> DeliveryReport {
        let started = Instant::now();
        let target = DeliveryTarget::from(event);

        let ack = guarded("acknowledge", self.acknowledge(&target))
            .await
            .flatten();

        let (mut outcome, mut text) = guarded("resolve", self.resolve(event))
            .await
            .unwrap_or_else(|| (OutcomeKind::InternalFault, self.texts.unexpected.clone()));

        let delivered = guarded(
            "deliver",
            self.deliver(&target, ack.as_ref(), &text, SendMode::Automatic),
        )
        .await;

        let path = match delivered {
            Some(path) => path,
            None => {
                // The interrupted send may or may not have gone out
                let attempted =
                    response_key(&target.channel, &target.sender, &target.event_ts, &text);
                self.responses.release(&attempted).await;

                outcome = OutcomeKind::InternalFault;
                text = self.texts.unexpected.clone();
                self.deliver_fault(&target, ack.as_ref(), &text).await
            }
        };

        info!(
            outcome = ?outcome,
            path = ?path,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Finished processing event"
        );

        DeliveryReport {
            outcome,
            path,
            text,
        }
    }

    /// Operator-triggered re-delivery of `text` as a new message.
    ///
    /// Bypasses the cooldown window but not the short anti-flap guard.
    pub async fn resend(&self, target: &DeliveryTarget, text: &str) -> DeliveryPath {
        guarded("resend", self.deliver(target, None, text, SendMode::ManualRetry))
            .await
            .unwrap_or(DeliveryPath::Failed)
    }

    async fn acknowledge(&self, target: &DeliveryTarget) -> Option<MessageHandle> {
        match self
            .transport
            .post_message(&target.channel, &self.texts.ack)
            .await
        {
            Ok(handle) => {
                debug!(message_id = %handle.id, "Placeholder posted");
                Some(handle)
            }
            Err(e) => {
                warn!(error = %e, "Failed to post placeholder, will send the final message directly");
                None
            }
        }
    }

    async fn resolve(&self, event: &Event) -> (OutcomeKind, String) {
        let profile = match self.transport.lookup_sender(&event.sender).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(sender = %event.sender, error = %e, "Could not get user info");
                SenderProfile::fallback(&event.sender)
            }
        };

        info!(
            username = %profile.username,
            display_name = %profile.display_name,
            "Bot mentioned"
        );
        let request =
            UpstreamRequest::enriched(&profile.username, &profile.display_name, &event.text);

        let result = tokio::time::timeout(
            self.upstream_timeout + UPSTREAM_BACKSTOP_GRACE,
            self.upstream.invoke(&request, self.upstream_timeout),
        )
        .await
        .unwrap_or(UpstreamResult::Timeout);

        match result {
            UpstreamResult::Success { response_text } => {
                (OutcomeKind::Success, response_text.trim().to_string())
            }
            UpstreamResult::BusinessError { message } => {
                warn!(error = %message, "Upstream declined the request");
                (OutcomeKind::UpstreamBusinessError, self.texts.generic.clone())
            }
            UpstreamResult::Timeout => {
                warn!(
                    timeout_secs = self.upstream_timeout.as_secs(),
                    "Upstream request timed out"
                );
                (OutcomeKind::UpstreamTimeout, self.texts.timeout.clone())
            }
            UpstreamResult::TransportError { cause } => {
                error!(error = %cause, "Upstream request failed");
                (OutcomeKind::UpstreamTransportError, self.texts.connectivity.clone())
            }
        }
    }

    async fn deliver(
        &self,
        target: &DeliveryTarget,
        ack: Option<&MessageHandle>,
        text: &str,
        mode: SendMode,
    ) -> DeliveryPath {
        let key = response_key(&target.channel, &target.sender, &target.event_ts, text);
        if !self.responses.try_reserve(&key, mode).await {
            info!(mode = ?mode, "Suppressed duplicate response within cooldown window");
            return DeliveryPath::Suppressed;
        }

        if let Some(handle) = ack {
            match self.transport.update_message(handle, text).await {
                Ok(()) => return DeliveryPath::Updated,
                Err(e) => {
                    warn!(error = %e, "Failed to update placeholder, posting a new message");
                }
            }
        }

        let path = self.post_new(target, text).await;
        if path == DeliveryPath::Failed {
            self.responses.release(&key).await;
        }
        path
    }

    /// Deliver the unexpected-error text, bypassing response dedup.
    async fn deliver_fault(
        &self,
        target: &DeliveryTarget,
        ack: Option<&MessageHandle>,
        text: &str,
    ) -> DeliveryPath {
        if let Some(handle) = ack {
            match guarded("fault update", self.transport.update_message(handle, text)).await {
                Some(Ok(())) => return DeliveryPath::Updated,
                Some(Err(e)) => {
                    warn!(error = %e, "Failed to update placeholder with fault text");
                }
                None => {}
            }
        }
        guarded("fault post", self.post_new(target, text))
            .await
            .unwrap_or(DeliveryPath::Failed)
    }

    async fn post_new(&self, target: &DeliveryTarget, text: &str) -> DeliveryPath {
        match self.transport.post_message(&target.channel, text).await {
            Ok(_) => DeliveryPath::Posted,
            Err(e) => {
                error!(error = %e, "Failed to deliver final message");
                DeliveryPath::Failed
            }
        }
    }
}

/// Run `fut`, turning a panic into `None` after logging it.
async fn guarded<T>(stage: &'static str, fut: impl Future<Output = T>) -> Option<T> {
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(value) => Some(value),
        Err(payload) => {
            error!(stage, panic = %panic_message(payload.as_ref()), "Internal fault");
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        mock_transport_ok, mock_upstream_returning, test_settings, MockUpstream, POSTED_ID,
    };
    use crate::transport::MockMessagingTransport;
    use async_trait::async_trait;
    use slack_relay_core::error::{MessagingError, UpstreamError};

    fn event() -> Event {
        Event::mention(Some("E1"), "1700000000.000100", "C", "U", "book room")
    }

    fn coordinator(
        transport: impl MessagingTransport,
        upstream: impl UpstreamClient + 'static,
    ) -> DeliveryCoordinator {
        DeliveryCoordinator::new(Arc::new(transport), Arc::new(upstream), &test_settings())
    }

    fn api_error(method: &str) -> MessagingError {
        MessagingError::Api {
            method: method.to_string(),
            error: "channel_not_found".to_string(),
        }
    }

    #[tokio::test]
    async fn test_success_updates_placeholder() {
        let mut transport = MockMessagingTransport::new();
        transport
            .expect_post_message()
            .withf(|channel, text| channel == "C" && text == slack_relay_core::config::DEFAULT_ACK_TEXT)
            .times(1)
            .returning(|channel, _| {
                Ok(MessageHandle {
                    channel: channel.to_string(),
                    id: POSTED_ID.to_string(),
                })
            });
        transport
            .expect_update_message()
            .withf(|handle, text| handle.id == POSTED_ID && text == "Booked.")
            .times(1)
            .returning(|_, _| Ok(()));
        transport
            .expect_lookup_sender()
            .returning(|_| Err(MessagingError::Transport("offline".into())));

        let upstream = mock_upstream_returning(UpstreamResult::Success {
            response_text: "  Booked.\n".to_string(),
        });

        let report = coordinator(transport, upstream).run(&event()).await;

        assert_eq!(report.outcome, OutcomeKind::Success);
        assert_eq!(report.path, DeliveryPath::Updated);
        assert_eq!(report.text, "Booked.");
    }

    #[tokio::test]
    async fn test_request_is_enriched_with_sender_profile() {
        let mut upstream = MockUpstream::new();
        upstream
            .expect_invoke()
            .withf(|request, timeout| {
                request.message
                    == "Username is: U-name, Display name is: U-display, User message is: book room"
                    && *timeout == Duration::from_secs(2)
            })
            .times(1)
            .returning(|_, _| UpstreamResult::Success {
                response_text: "ok".to_string(),
            });

        let report = coordinator(mock_transport_ok(), upstream).run(&event()).await;
        assert_eq!(report.outcome, OutcomeKind::Success);
    }

    #[tokio::test]
    async fn test_lookup_failure_falls_back_to_sender_id() {
        let mut transport = MockMessagingTransport::new();
        transport.expect_post_message().returning(|channel, _| {
            Ok(MessageHandle {
                channel: channel.to_string(),
                id: POSTED_ID.to_string(),
            })
        });
        transport.expect_update_message().returning(|_, _| Ok(()));
        transport
            .expect_lookup_sender()
            .returning(|_| Err(api_error("users.info")));

        let mut upstream = MockUpstream::new();
        upstream
            .expect_invoke()
            .withf(|request, _| {
                request.message == "Username is: U, Display name is: U, User message is: book room"
            })
            .times(1)
            .returning(|_, _| UpstreamResult::Success {
                response_text: "ok".to_string(),
            });

        coordinator(transport, upstream).run(&event()).await;
    }

    #[tokio::test]
    async fn test_business_error_shows_generic_apology() {
        let upstream = mock_upstream_returning(UpstreamResult::BusinessError {
            message: "room conflict".to_string(),
        });

        let report = coordinator(mock_transport_ok(), upstream).run(&event()).await;

        assert_eq!(report.outcome, OutcomeKind::UpstreamBusinessError);
        assert_eq!(report.text, GENERIC_REPLY);
        assert!(!report.text.contains("room conflict"));
    }

    #[tokio::test]
    async fn test_timeout_shows_timeout_apology() {
        let upstream = mock_upstream_returning(UpstreamResult::Timeout);

        let report = coordinator(mock_transport_ok(), upstream).run(&event()).await;

        assert_eq!(report.outcome, OutcomeKind::UpstreamTimeout);
        assert_eq!(report.text, TIMEOUT_REPLY);
        assert_ne!(report.text, GENERIC_REPLY);
    }

    struct HangingUpstream;

    #[async_trait]
    impl UpstreamClient for HangingUpstream {
        async fn invoke(&self, _request: &UpstreamRequest, _timeout: Duration) -> UpstreamResult {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_upstream_is_cut_off() {
        let report = coordinator(mock_transport_ok(), HangingUpstream)
            .run(&event())
            .await;

        assert_eq!(report.outcome, OutcomeKind::UpstreamTimeout);
        assert_eq!(report.text, TIMEOUT_REPLY);
        assert_eq!(report.path, DeliveryPath::Updated);
    }

    #[tokio::test]
    async fn test_transport_error_shows_connectivity_apology() {
        let upstream = mock_upstream_returning(UpstreamResult::TransportError {
            cause: UpstreamError::Network("connection refused".to_string()),
        });

        let report = coordinator(mock_transport_ok(), upstream).run(&event()).await;

        assert_eq!(report.outcome, OutcomeKind::UpstreamTransportError);
        assert_eq!(report.text, CONNECTIVITY_REPLY);
    }

    #[tokio::test]
    async fn test_placeholder_failure_posts_final_directly() {
        let mut transport = MockMessagingTransport::new();
        transport
            .expect_post_message()
            .withf(|_, text| text != "Booked.")
            .times(1)
            .returning(|_, _| Err(MessagingError::Transport("reset".into())));
        transport
            .expect_post_message()
            .withf(|_, text| text == "Booked.")
            .times(1)
            .returning(|channel, _| {
                Ok(MessageHandle {
                    channel: channel.to_string(),
                    id: POSTED_ID.to_string(),
                })
            });
        transport.expect_update_message().never();
        transport
            .expect_lookup_sender()
            .returning(|sender| Ok(SenderProfile::fallback(sender)));

        let upstream = mock_upstream_returning(UpstreamResult::Success {
            response_text: "Booked.".to_string(),
        });

        let report = coordinator(transport, upstream).run(&event()).await;
        assert_eq!(report.path, DeliveryPath::Posted);
        assert_eq!(report.outcome, OutcomeKind::Success);
    }

    #[tokio::test]
    async fn test_update_failure_falls_back_to_new_message() {
        let mut transport = MockMessagingTransport::new();
        transport.expect_post_message().times(2).returning(|channel, _| {
            Ok(MessageHandle {
                channel: channel.to_string(),
                id: POSTED_ID.to_string(),
            })
        });
        transport
            .expect_update_message()
            .times(1)
            .returning(|_, _| Err(api_error("chat.update")));
        transport
            .expect_lookup_sender()
            .returning(|sender| Ok(SenderProfile::fallback(sender)));

        let upstream = mock_upstream_returning(UpstreamResult::Success {
            response_text: "Booked.".to_string(),
        });

        let report = coordinator(transport, upstream).run(&event()).await;
        assert_eq!(report.path, DeliveryPath::Posted);
    }

    #[tokio::test]
    async fn test_total_messaging_failure_is_reported_and_not_remembered() {
        let mut transport = MockMessagingTransport::new();
        transport
            .expect_post_message()
            .returning(|_, _| Err(api_error("chat.postMessage")));
        transport
            .expect_lookup_sender()
            .returning(|sender| Ok(SenderProfile::fallback(sender)));

        let upstream = mock_upstream_returning(UpstreamResult::Success {
            response_text: "Booked.".to_string(),
        });
        let coordinator = coordinator(transport, upstream);

        let report = coordinator.run(&event()).await;
        assert_eq!(report.path, DeliveryPath::Failed);
        assert_eq!(report.final_kind(), OutcomeKind::MessagingApiFailure);

        // Failed delivery must not block a later attempt
        let again = coordinator.run(&event()).await;
        assert_eq!(again.path, DeliveryPath::Failed);
        assert_eq!(coordinator.suppressed_count(), 0);
    }

    #[tokio::test]
    async fn test_identical_response_is_suppressed() {
        let upstream = mock_upstream_returning(UpstreamResult::Success {
            response_text: "Booked.".to_string(),
        });
        let coordinator = coordinator(mock_transport_ok(), upstream);

        let first = coordinator.run(&event()).await;
        let second = coordinator.run(&event()).await;

        assert_eq!(first.path, DeliveryPath::Updated);
        assert_eq!(second.path, DeliveryPath::Suppressed);
        assert_eq!(coordinator.suppressed_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resend_respects_guard_only() {
        let upstream = mock_upstream_returning(UpstreamResult::Success {
            response_text: "Booked.".to_string(),
        });
        let coordinator = coordinator(mock_transport_ok(), upstream);
        let target = DeliveryTarget::from(&event());

        coordinator.run(&event()).await;
        assert_eq!(
            coordinator.resend(&target, "Booked.").await,
            DeliveryPath::Suppressed
        );

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(
            coordinator.resend(&target, "Booked.").await,
            DeliveryPath::Posted
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_response_allowed_after_cooldown() {
        let upstream = mock_upstream_returning(UpstreamResult::Success {
            response_text: "Booked.".to_string(),
        });
        let coordinator = coordinator(mock_transport_ok(), upstream);

        assert_eq!(coordinator.run(&event()).await.path, DeliveryPath::Updated);
        assert_eq!(coordinator.run(&event()).await.path, DeliveryPath::Suppressed);

        tokio::time::advance(Duration::from_secs(601)).await;
        assert_eq!(coordinator.run(&event()).await.path, DeliveryPath::Updated);
    }

    /// Transport whose first placeholder edit panics.
    struct FlakyUpdate {
        panicked: std::sync::atomic::AtomicBool,
        updates: std::sync::Mutex<Vec<String>>,
        posts: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MessagingTransport for FlakyUpdate {
        async fn post_message(
            &self,
            channel: &str,
            text: &str,
        ) -> Result<MessageHandle, MessagingError> {
            self.posts.lock().expect("posts lock").push(text.to_string());
            Ok(MessageHandle {
                channel: channel.to_string(),
                id: POSTED_ID.to_string(),
            })
        }

        async fn update_message(
            &self,
            _handle: &MessageHandle,
            text: &str,
        ) -> Result<(), MessagingError> {
            if !self.panicked.swap(true, std::sync::atomic::Ordering::SeqCst) {
                panic!("update exploded");
            }
            self.updates
                .lock()
                .expect("updates lock")
                .push(text.to_string());
            Ok(())
        }

        async fn lookup_sender(&self, sender_id: &str) -> Result<SenderProfile, MessagingError> {
            Ok(SenderProfile::fallback(sender_id))
        }
    }

    #[tokio::test]
    async fn test_delivery_fault_replaces_placeholder_and_frees_key() {
        let transport = Arc::new(FlakyUpdate {
            panicked: std::sync::atomic::AtomicBool::new(false),
            updates: std::sync::Mutex::new(Vec::new()),
            posts: std::sync::Mutex::new(Vec::new()),
        });
        let upstream = mock_upstream_returning(UpstreamResult::Success {
            response_text: "Booked.".to_string(),
        });
        let coordinator =
            DeliveryCoordinator::new(transport.clone(), Arc::new(upstream), &test_settings());

        let report = coordinator.run(&event()).await;

        assert_eq!(report.outcome, OutcomeKind::InternalFault);
        assert_eq!(report.path, DeliveryPath::Updated);
        assert_eq!(
            *transport.updates.lock().expect("updates lock"),
            vec![UNEXPECTED_REPLY.to_string()]
        );
        // Only the placeholder was posted; no second message
        assert_eq!(
            *transport.posts.lock().expect("posts lock"),
            vec![slack_relay_core::config::DEFAULT_ACK_TEXT.to_string()]
        );

        let retry = coordinator.run(&event()).await;
        assert_eq!(retry.outcome, OutcomeKind::Success);
        assert_eq!(retry.path, DeliveryPath::Updated);
    }

    /// Transport whose sender lookup blows up, to simulate an internal bug.
    struct PanickingLookup {
        updates: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MessagingTransport for PanickingLookup {
        async fn post_message(
            &self,
            channel: &str,
            _text: &str,
        ) -> Result<MessageHandle, MessagingError> {
            Ok(MessageHandle {
                channel: channel.to_string(),
                id: POSTED_ID.to_string(),
            })
        }

        async fn update_message(
            &self,
            _handle: &MessageHandle,
            text: &str,
        ) -> Result<(), MessagingError> {
            self.updates
                .lock()
                .expect("updates lock")
                .push(text.to_string());
            Ok(())
        }

        async fn lookup_sender(&self, _sender_id: &str) -> Result<SenderProfile, MessagingError> {
            panic!("lookup exploded");
        }
    }

    #[tokio::test]
    async fn test_internal_fault_still_answers_user() {
        let transport = Arc::new(PanickingLookup {
            updates: std::sync::Mutex::new(Vec::new()),
        });
        let mut upstream = MockUpstream::new();
        upstream.expect_invoke().never();

        let coordinator =
            DeliveryCoordinator::new(transport.clone(), Arc::new(upstream), &test_settings());
        let report = coordinator.run(&event()).await;

        assert_eq!(report.outcome, OutcomeKind::InternalFault);
        assert_eq!(report.path, DeliveryPath::Updated);
        assert_eq!(
            *transport.updates.lock().expect("updates lock"),
            vec![UNEXPECTED_REPLY.to_string()]
        );
    }
}
