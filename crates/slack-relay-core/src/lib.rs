#![deny(missing_docs)]
//! Slack relay core library.
//!
//! Event identity, bounded dedup caches, content fingerprints and the
//! upstream agent client shared by the runtime and the transports.

/// Dedup caches (event keys and outbound responses).
pub mod cache;
/// Configuration management.
pub mod config;
/// Failure taxonomy shared across the relay.
pub mod error;
/// Inbound events and their dedup identity.
pub mod event;
/// Content fingerprints used to build cache keys.
pub mod hashing;
/// Client for the upstream processing service.
pub mod upstream;
