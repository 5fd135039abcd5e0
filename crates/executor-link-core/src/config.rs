//! Timing and capacity configuration for the session layer.

use std::time::Duration;

/// Keepalive and framing parameters for one session.
///
/// Production uses the defaults; tests shrink the timers.
#[derive(Debug, Clone)]
pub struct KeepaliveConfig {
    /// How long to wait for a ping acknowledgment before declaring the
    /// transport dead.
    pub pong_wait: Duration,
    /// Deadline applied to each individual transport write.
    pub write_timeout: Duration,
    /// Largest single message accepted in either direction, in bytes.
    pub max_message_size: usize,
    /// Capacity of each per-direction mailbox.
    pub mailbox_capacity: usize,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            pong_wait: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
            max_message_size: 1024 * 1024,
            mailbox_capacity: 100,
        }
    }
}

impl KeepaliveConfig {
    /// Interval between outbound pings: 90% of `pong_wait`, so at least one
    /// ping/ack round trip completes before the peer's own keepalive timeout
    /// would fire.
    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        self.pong_wait.mul_f64(0.9)
    }
}

/// Reconnection pacing for the retry driver.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries allowed after the first invocation. `0` still invokes the
    /// operation exactly once.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// A connection that stays up longer than this resets the attempt
    /// counter. `None` never resets.
    pub reset_period: Option<Duration>,
    /// Double the delay on each consecutive failure instead of keeping it
    /// fixed.
    pub use_exponential: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1),
            reset_period: Some(Duration::from_secs(60)),
            use_exponential: true,
        }
    }
}
