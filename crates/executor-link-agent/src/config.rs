//! Process configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use executor_link_core::{KeepaliveConfig, RetryConfig};

/// Executor process configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// WebSocket URL of the control plane.
    pub control_plane_url: String,
    /// Stable identifier this executor authenticates as.
    pub executor_id: String,
    /// PKCS#8 PEM private key file; unauthenticated when unset. Re-read on
    /// every connection attempt so rotated keys take effect.
    pub private_key_path: Option<PathBuf>,
    /// Also send the identifier itself as an `executor-id` cookie.
    pub send_executor_id: bool,
    pub keepalive: KeepaliveConfig,
    pub retry: RetryConfig,
}

impl AgentConfig {
    /// Load from `EXECUTOR_LINK_*` environment variables with defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self {
            control_plane_url: get("EXECUTOR_LINK_URL")
                .unwrap_or_else(|| "ws://127.0.0.1:8080/executor".to_string()),
            executor_id: get("EXECUTOR_LINK_ID").unwrap_or_else(|| "executor".to_string()),
            private_key_path: get("EXECUTOR_LINK_KEY_FILE").map(PathBuf::from),
            send_executor_id: get("EXECUTOR_LINK_SEND_ID").is_some_and(|v| v == "1"),
            keepalive: KeepaliveConfig::default(),
            retry: RetryConfig::default(),
        };

        if let Some(secs) = get("EXECUTOR_LINK_PONG_WAIT_SECS").and_then(|v| v.parse().ok()) {
            config.keepalive.pong_wait = Duration::from_secs(secs);
        }
        if let Some(secs) = get("EXECUTOR_LINK_WRITE_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.keepalive.write_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = get("EXECUTOR_LINK_MAX_ATTEMPTS").and_then(|v| v.parse().ok()) {
            config.retry.max_attempts = n;
        }
        if let Some(ms) = get("EXECUTOR_LINK_INITIAL_DELAY_MS").and_then(|v| v.parse().ok()) {
            config.retry.initial_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = get("EXECUTOR_LINK_RESET_PERIOD_SECS").and_then(|v| v.parse().ok()) {
            // 0 disables the reset entirely.
            config.retry.reset_period = if secs == 0 {
                None
            } else {
                Some(Duration::from_secs(secs))
            };
        }
        if get("EXECUTOR_LINK_FIXED_BACKOFF").is_some_and(|v| v == "1") {
            config.retry.use_exponential = false;
        }

        config
    }
}
