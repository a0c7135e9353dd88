//! Per-event entry point
//!
//! Composes the event dedup cache, the task registry and the delivery
//! coordinator. `handle` never waits for processing: it spawns the delivery
//! task and returns, so the webhook can be answered immediately.
//!
//! Known limitation: dedup memory is bounded. A redelivery that arrives after
//! its key was evicted from the event cache is processed again.

use crate::coordinator::{DeliveryCoordinator, DeliveryPath, DeliveryReport, DeliveryTarget};
use crate::stats::{RelayStats, StatsCounters};
use crate::task_registry::{ClaimToken, TaskRegistry};
use chrono::{DateTime, Utc};
use slack_relay_core::cache::BoundedKeyCache;
use slack_relay_core::config::RelaySettings;
use slack_relay_core::error::SkipReason;
use slack_relay_core::event::{Event, EventKey};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, info_span, Instrument};

/// Owns every piece of shared dedup state for the lifetime of the service.
pub struct EventHandler {
    event_cache: BoundedKeyCache<EventKey>,
    registry: Arc<TaskRegistry<EventKey>>,
    coordinator: Arc<DeliveryCoordinator>,
    tracker: TaskTracker,
    counters: Arc<StatsCounters>,
    upstream_url: String,
    started_at: DateTime<Utc>,
}

impl EventHandler {
    /// Create a handler around `coordinator`.
    #[must_use]
    pub fn new(coordinator: DeliveryCoordinator, settings: &RelaySettings) -> Self {
        Self {
            event_cache: BoundedKeyCache::new(settings.event_cache_capacity()),
            registry: Arc::new(TaskRegistry::new()),
            coordinator: Arc::new(coordinator),
            tracker: TaskTracker::new(),
            counters: Arc::new(StatsCounters::default()),
            upstream_url: settings.upstream_url.clone(),
            started_at: Utc::now(),
        }
    }

    /// Accept one inbound event.
    ///
    /// Returns the delivery task when the event was accepted, or why it was
    /// skipped. Skips are not errors. Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a [`SkipReason`] for non-actionable events, events already in
    /// the dedup cache, and events whose key is claimed by a running task.
    pub fn handle(&self, event: Event) -> Result<JoinHandle<DeliveryReport>, SkipReason> {
        StatsCounters::bump(&self.counters.received);

        if !event.is_actionable() {
            StatsCounters::bump(&self.counters.ignored);
            debug!(kind = ?event.kind, "Ignoring non-actionable event");
            return Err(SkipReason::NotActionable);
        }

        let key = event.key();
        if self.event_cache.contains_and_insert(key.clone()) {
            StatsCounters::bump(&self.counters.duplicates);
            info!(event_key = %key, "Skipping duplicate event");
            return Err(SkipReason::DuplicateEvent);
        }

        let token = ClaimToken::new();
        let Some(guard) = self.registry.claim(key.clone(), token) else {
            StatsCounters::bump(&self.counters.concurrent_duplicates);
            info!(event_key = %key, "Event is already being processed");
            return Err(SkipReason::ConcurrentDuplicate);
        };

        StatsCounters::bump(&self.counters.dispatched);
        let span = info_span!("event", request_id = %token, event_key = %key);
        let coordinator = Arc::clone(&self.coordinator);
        let counters = Arc::clone(&self.counters);

        info!(parent: &span, channel = %event.channel, "Processing event");
        Ok(self.tracker.spawn(
            async move {
                // Released on every exit, including panics and aborts
                let _claim = guard;
                let report = coordinator.run(&event).await;
                StatsCounters::bump(&counters.completed);
                report
            }
            .instrument(span),
        ))
    }

    /// Operator-triggered re-delivery of a final text.
    pub async fn resend(&self, target: &DeliveryTarget, text: &str) -> DeliveryPath {
        self.coordinator.resend(target, text).await
    }

    /// Whether `key` is currently claimed by a running task.
    pub fn is_in_flight(&self, key: &EventKey) -> bool {
        self.registry.is_claimed(key)
    }

    /// Number of keys in the event dedup cache.
    pub fn processed_events_count(&self) -> usize {
        self.event_cache.len()
    }

    /// Snapshot of counters and cache sizes.
    pub fn stats(&self) -> RelayStats {
        RelayStats {
            received: StatsCounters::read(&self.counters.received),
            ignored: StatsCounters::read(&self.counters.ignored),
            duplicates: StatsCounters::read(&self.counters.duplicates),
            concurrent_duplicates: StatsCounters::read(&self.counters.concurrent_duplicates),
            dispatched: StatsCounters::read(&self.counters.dispatched),
            completed: StatsCounters::read(&self.counters.completed),
            suppressed_responses: self.coordinator.suppressed_count(),
            event_cache_size: self.event_cache.len(),
            max_cache_size: self.event_cache.capacity(),
            in_flight: self.registry.len(),
            upstream_url: self.upstream_url.clone(),
            started_at: self.started_at,
        }
    }

    /// Stop accepting tracked work and wait for in-flight deliveries.
    pub async fn shutdown(&self) {
        self.tracker.close();
        info!(in_flight = self.tracker.len(), "Waiting for in-flight deliveries");
        self.tracker.wait().await;
    }
}
