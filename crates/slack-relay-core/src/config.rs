//! Configuration and settings management
//!
//! Loads relay settings from config files and environment variables and
//! defines the default limits of the dedup and delivery machinery.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default endpoint of the upstream agent service.
pub const DEFAULT_UPSTREAM_URL: &str = "http://localhost:8000/agent";
/// Upstream call timeout in seconds.
pub const UPSTREAM_TIMEOUT_SECS: u64 = 30;
/// Maximum number of event keys remembered for dedup.
pub const EVENT_CACHE_MAX_SIZE: usize = 1000;
/// Window (seconds) during which an identical response is not re-sent.
/// Default: 10 minutes.
pub const RESPONSE_COOLDOWN_SECS: u64 = 600;
/// Anti-flap guard (seconds) applied to manually retried sends.
pub const RESEND_GUARD_SECS: u64 = 30;
/// Maximum number of remembered outbound responses.
pub const RESPONSE_CACHE_MAX_SIZE: u64 = 10_000;
/// Placeholder posted while the upstream call is running.
pub const DEFAULT_ACK_TEXT: &str = "⏳ Processing your request...";

/// Build the layered configuration used by every settings struct.
///
/// Sources, lowest priority first: `config/default`, `config/{RUN_MODE}`,
/// `config/local`, `APP__`-prefixed variables, then bare environment variables.
///
/// # Errors
///
/// Returns a `ConfigError` if a present file cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Environment::default() maps UPPER_SNAKE_CASE to snake_case;
        // empty variables are treated as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

/// Relay settings loaded from environment variables and config files
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RelaySettings {
    /// Endpoint of the upstream agent (`POST`, JSON body `{"message": ...}`)
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,

    /// Upstream call timeout in seconds
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,

    /// Bound `N` of the event dedup cache
    #[serde(default = "default_event_cache_max_size")]
    pub event_cache_max_size: usize,

    /// Cooldown (seconds) before an identical response may be re-sent
    #[serde(default = "default_response_cooldown_secs")]
    pub response_cooldown_secs: u64,

    /// Anti-flap guard (seconds) for manual resends
    #[serde(default = "default_resend_guard_secs")]
    pub resend_guard_secs: u64,

    /// Maximum number of entries in the response dedup cache
    #[serde(default = "default_response_cache_max_size")]
    pub response_cache_max_size: u64,

    /// Placeholder text posted before the upstream call
    #[serde(default = "default_ack_text")]
    pub ack_text: String,
}

fn default_upstream_url() -> String {
    DEFAULT_UPSTREAM_URL.to_string()
}

const fn default_upstream_timeout_secs() -> u64 {
    UPSTREAM_TIMEOUT_SECS
}

const fn default_event_cache_max_size() -> usize {
    EVENT_CACHE_MAX_SIZE
}

const fn default_response_cooldown_secs() -> u64 {
    RESPONSE_COOLDOWN_SECS
}

const fn default_resend_guard_secs() -> u64 {
    RESEND_GUARD_SECS
}

const fn default_response_cache_max_size() -> u64 {
    RESPONSE_CACHE_MAX_SIZE
}

fn default_ack_text() -> String {
    DEFAULT_ACK_TEXT.to_string()
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            upstream_url: default_upstream_url(),
            upstream_timeout_secs: UPSTREAM_TIMEOUT_SECS,
            event_cache_max_size: EVENT_CACHE_MAX_SIZE,
            response_cooldown_secs: RESPONSE_COOLDOWN_SECS,
            resend_guard_secs: RESEND_GUARD_SECS,
            response_cache_max_size: RESPONSE_CACHE_MAX_SIZE,
            ack_text: default_ack_text(),
        }
    }
}

impl RelaySettings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use slack_relay_core::config::RelaySettings;
    ///
    /// let settings = RelaySettings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }

    /// Upstream timeout, never shorter than one second.
    #[must_use]
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs.max(1))
    }

    /// Response cooldown window.
    #[must_use]
    pub fn response_cooldown(&self) -> Duration {
        Duration::from_secs(self.response_cooldown_secs)
    }

    /// Anti-flap guard for manual resends, capped by the cooldown window.
    #[must_use]
    pub fn resend_guard(&self) -> Duration {
        Duration::from_secs(self.resend_guard_secs.min(self.response_cooldown_secs))
    }

    /// Event cache bound; batch eviction needs room for at least two keys.
    #[must_use]
    pub fn event_cache_capacity(&self) -> usize {
        self.event_cache_max_size.max(2)
    }
}
