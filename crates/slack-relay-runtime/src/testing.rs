//! Testing helpers and mock utilities.
//!
//! Provides mocked upstream and messaging collaborators for coordinator and
//! handler tests.

use crate::transport::{MessageHandle, MockMessagingTransport, SenderProfile};
use mockall::predicate::*;
use slack_relay_core::config::RelaySettings;
use slack_relay_core::upstream::{UpstreamClient, UpstreamRequest, UpstreamResult};
use std::time::Duration;

mockall::mock! {
    /// Mock of the upstream processing service.
    pub Upstream {}

    #[async_trait::async_trait]
    impl UpstreamClient for Upstream {
        async fn invoke(&self, request: &UpstreamRequest, timeout: Duration) -> UpstreamResult;
    }
}

/// Handle id returned for every posted message.
pub const POSTED_ID: &str = "1700000001.000200";

/// Create a mock upstream that returns `result` for every call.
#[must_use]
pub fn mock_upstream_returning(result: UpstreamResult) -> MockUpstream {
    let mut mock = MockUpstream::new();
    mock.expect_invoke()
        .with(always(), always())
        .returning(move |_, _| result.clone());
    mock
}

/// Create a mock transport where every call succeeds.
///
/// - `post_message` returns a handle with id [`POSTED_ID`]
/// - `update_message` returns `Ok(())`
/// - `lookup_sender` returns a profile named after the sender id
#[must_use]
pub fn mock_transport_ok() -> MockMessagingTransport {
    let mut mock = MockMessagingTransport::new();

    mock.expect_post_message().returning(|channel, _| {
        Ok(MessageHandle {
            channel: channel.to_string(),
            id: POSTED_ID.to_string(),
        })
    });

    mock.expect_update_message().returning(|_, _| Ok(()));

    mock.expect_lookup_sender().returning(|sender| {
        Ok(SenderProfile {
            username: format!("{sender}-name"),
            display_name: format!("{sender}-display"),
        })
    });

    mock
}

/// Relay settings with defaults and a short upstream timeout.
#[must_use]
pub fn test_settings() -> RelaySettings {
    RelaySettings {
        upstream_timeout_secs: 2,
        ..RelaySettings::default()
    }
}
