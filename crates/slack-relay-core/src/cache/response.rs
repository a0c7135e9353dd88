//! Outbound response flood protection
//!
//! Remembers which `(recipient, event, content)` tuples were recently sent so
//! the same answer is not posted twice, e.g. when an evicted event is
//! redelivered and processed again.

use crate::hashing::{fingerprint, fingerprint_fields};
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// How a send was triggered; selects the suppression window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    /// Regular delivery at the end of event processing (full cooldown).
    Automatic,
    /// Operator-triggered retry (short anti-flap guard only).
    ManualRetry,
}

/// Build the response dedup key for one outbound message.
///
/// The key covers recipient channel, sender, the originating event timestamp
/// and a fingerprint of the final text, so distinct content for the same
/// event never collides.
#[must_use]
pub fn response_key(channel: &str, sender: &str, event_ts: &str, text: &str) -> String {
    let content = fingerprint(text.as_bytes()).to_hex();
    fingerprint_fields(&[channel, sender, event_ts, &content]).to_hex()
}

/// Cache of recently sent responses, keyed by [`response_key`]
///
/// Entries store the send time. A send is allowed when no entry exists or the
/// entry is older than the window of its [`SendMode`]. The check and the
/// record happen in a single cache operation.
#[derive(Clone)]
pub struct ResponseDedupCache {
    /// Moka cache storing key -> sent-at with automatic TTL cleanup
    cache: Cache<String, Instant>,
    /// Window for automatic sends
    cooldown: Duration,
    /// Window for manual retries
    resend_guard: Duration,
    /// Counter for suppressed sends (for log throttling and stats)
    suppressed_count: Arc<AtomicU64>,
}

impl ResponseDedupCache {
    /// Creates a new `ResponseDedupCache`
    ///
    /// # Arguments
    ///
    /// * `cooldown` - Window during which an identical automatic send is suppressed
    /// * `resend_guard` - Window applied to manual retries
    /// * `max_capacity` - Maximum number of entries in cache
    ///
    /// # Examples
    ///
    /// ```
    /// use slack_relay_core::cache::ResponseDedupCache;
    /// use std::time::Duration;
    ///
    /// let cache = ResponseDedupCache::new(
    ///     Duration::from_secs(600), // 10 minutes cooldown
    ///     Duration::from_secs(30),  // 30 seconds resend guard
    ///     10_000,                   // max 10k entries
    /// );
    /// ```
    #[must_use]
    pub fn new(cooldown: Duration, resend_guard: Duration, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(cooldown.max(Duration::from_secs(1)))
            .build();

        Self {
            cache,
            cooldown,
            resend_guard: resend_guard.min(cooldown),
            suppressed_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Atomically check the window for `key` and, if a send is allowed,
    /// record it as sent now.
    ///
    /// Returns `true` when the caller should send, `false` when the send is
    /// suppressed. Only every 100th suppression is logged.
    pub async fn try_reserve(&self, key: &str, mode: SendMode) -> bool {
        let window = match mode {
            SendMode::Automatic => self.cooldown,
            SendMode::ManualRetry => self.resend_guard,
        };
        let now = Instant::now();

        let result = self
            .cache
            .entry(key.to_string())
            .and_compute_with(|existing| {
                let op = match existing {
                    Some(entry) if now.saturating_duration_since(*entry.value()) < window => {
                        Op::Nop
                    }
                    _ => Op::Put(now),
                };
                std::future::ready(op)
            })
            .await;

        match result {
            CompResult::Inserted(_) | CompResult::ReplacedWith(_) => true,
            _ => {
                let count = self.suppressed_count.fetch_add(1, Ordering::Relaxed) + 1;
                if count.is_multiple_of(100) {
                    debug!(suppressed = count, "Suppressed duplicate responses");
                }
                false
            }
        }
    }

    /// Forget a reservation whose delivery failed on every path.
    pub async fn release(&self, key: &str) {
        self.cache.invalidate(key).await;
    }

    /// Returns the current number of entries in the cache
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Returns the total number of suppressed sends
    #[must_use]
    pub fn suppressed_count(&self) -> u64 {
        self.suppressed_count.load(Ordering::Relaxed)
    }

    /// Returns the configured cooldown duration
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Returns the configured resend guard
    #[must_use]
    pub const fn resend_guard(&self) -> Duration {
        self.resend_guard
    }
}
