//! In-flight claim registry
//!
//! At most one claim per event key. A claim is normally held through a
//! [`ClaimGuard`], which releases it when dropped: on normal completion, on an
//! early return, and while unwinding from a panic.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};
use uuid::Uuid;

/// Opaque claim handle, doubles as the request id in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClaimToken(Uuid);

impl ClaimToken {
    /// Generate a fresh random token.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First 8 hex characters, used as a short request id.
    #[must_use]
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for ClaimToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClaimToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

/// Registry of event keys currently being processed
///
/// Generic over the key type so it can be exercised with plain strings in
/// tests and with [`slack_relay_core::event::EventKey`] in production.
pub struct TaskRegistry<K: Hash + Eq + Clone + Send + Sync + fmt::Debug + 'static> {
    claims: Mutex<HashMap<K, ClaimToken>>,
}

impl<K: Hash + Eq + Clone + Send + Sync + fmt::Debug + 'static> Default for TaskRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq + Clone + Send + Sync + fmt::Debug + 'static> TaskRegistry<K> {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            claims: Mutex::new(HashMap::new()),
        }
    }

    /// Record a claim for `key` unless one already exists.
    ///
    /// Returns `true` if the claim was recorded, `false` (state untouched)
    /// if `key` is already claimed.
    pub fn try_claim(&self, key: K, token: ClaimToken) -> bool {
        let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
        if claims.contains_key(&key) {
            return false;
        }
        claims.insert(key, token);
        true
    }

    /// Claim `key` and return a guard that releases it on drop.
    pub fn claim(self: &Arc<Self>, key: K, token: ClaimToken) -> Option<ClaimGuard<K>> {
        if !self.try_claim(key.clone(), token) {
            return None;
        }
        Some(ClaimGuard {
            registry: Arc::clone(self),
            key,
            token,
        })
    }

    /// Remove any claim for `key`. Releasing an unclaimed key is a no-op.
    pub fn release(&self, key: &K) {
        let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
        if claims.remove(key).is_none() {
            debug!(key = ?key, "Release of unclaimed key ignored");
        }
    }

    /// Remove the claim for `key` only if it is still held by `token`.
    pub fn release_if_owned(&self, key: &K, token: ClaimToken) -> bool {
        let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
        match claims.get(key) {
            Some(current) if *current == token => {
                claims.remove(key);
                true
            }
            Some(_) => {
                warn!(key = ?key, "Claim is held by another token, not releasing");
                false
            }
            None => false,
        }
    }

    /// Check whether `key` is currently claimed
    pub fn is_claimed(&self, key: &K) -> bool {
        let claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
        claims.contains_key(key)
    }

    /// Get the number of in-flight claims
    pub fn len(&self) -> usize {
        let claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
        claims.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scoped claim on one key; dropping it releases the claim.
pub struct ClaimGuard<K: Hash + Eq + Clone + Send + Sync + fmt::Debug + 'static> {
    registry: Arc<TaskRegistry<K>>,
    key: K,
    token: ClaimToken,
}

impl<K: Hash + Eq + Clone + Send + Sync + fmt::Debug + 'static> ClaimGuard<K> {
    /// Claimed key.
    pub const fn key(&self) -> &K {
        &self.key
    }

    /// Token the claim was recorded with.
    pub const fn token(&self) -> ClaimToken {
        self.token
    }
}

impl<K: Hash + Eq + Clone + Send + Sync + fmt::Debug + 'static> Drop for ClaimGuard<K> {
    fn drop(&mut self) {
        self.registry.release_if_owned(&self.key, self.token);
    }
}
