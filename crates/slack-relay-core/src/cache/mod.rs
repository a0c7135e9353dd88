//! Dedup caches
//!
//! [`BoundedKeyCache`] remembers recently seen keys with coarse batch eviction;
//! [`ResponseDedupCache`] remembers recently sent responses for a cooldown window.

mod bounded;
mod response;

pub use bounded::BoundedKeyCache;
pub use response::{response_key, ResponseDedupCache, SendMode};
