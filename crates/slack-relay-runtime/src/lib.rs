#![deny(missing_docs)]
//! Slack relay runtime.
//!
//! Transport-agnostic orchestration: event dedup, per-event claims and the
//! acknowledge-then-update delivery of upstream answers.

/// Delivery state machine for one claimed event.
pub mod coordinator;
/// Entry point invoked once per inbound event.
pub mod handler;
/// Counters exposed for health and stats endpoints.
pub mod stats;
/// In-flight claim registry.
pub mod task_registry;
/// Outbound messaging interface implemented by transports.
pub mod transport;

#[cfg(test)]
mod testing;

pub use coordinator::{DeliveryCoordinator, DeliveryPath, DeliveryReport, DeliveryTarget, ReplyTexts};
pub use handler::EventHandler;
pub use stats::RelayStats;
pub use task_registry::{ClaimGuard, ClaimToken, TaskRegistry};
pub use transport::{MessageHandle, MessagingTransport, SenderProfile};
