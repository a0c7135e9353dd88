#![deny(missing_docs)]
//! Slack transport adapter for the relay.

/// Slack Web API client.
pub mod api;
/// Slack transport configuration.
pub mod config;
/// Events API envelope parsing.
pub mod events;
/// Slack runtime entrypoint.
pub mod runner;
/// Webhook and status endpoints.
pub mod server;
/// Request signature verification.
pub mod signature;

pub use runner::run_relay;
