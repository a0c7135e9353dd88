use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters updated by the event handler.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub(crate) received: AtomicU64,
    pub(crate) ignored: AtomicU64,
    pub(crate) duplicates: AtomicU64,
    pub(crate) concurrent_duplicates: AtomicU64,
    pub(crate) dispatched: AtomicU64,
    pub(crate) completed: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn read(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Point-in-time snapshot served by the stats endpoint
#[derive(Debug, Clone, Serialize)]
pub struct RelayStats {
    /// Events handed to the handler
    pub received: u64,
    /// Events that were not actionable
    pub ignored: u64,
    /// Events rejected by the dedup cache
    pub duplicates: u64,
    /// Events rejected because another task held the claim
    pub concurrent_duplicates: u64,
    /// Events that started a delivery task
    pub dispatched: u64,
    /// Delivery tasks that ran to completion
    pub completed: u64,
    /// Outbound messages suppressed by the response cooldown
    pub suppressed_responses: u64,
    /// Keys currently held by the event dedup cache
    pub event_cache_size: usize,
    /// Bound of the event dedup cache
    pub max_cache_size: usize,
    /// Claims currently held
    pub in_flight: usize,
    /// Upstream endpoint
    pub upstream_url: String,
    /// Process start time
    pub started_at: DateTime<Utc>,
}
