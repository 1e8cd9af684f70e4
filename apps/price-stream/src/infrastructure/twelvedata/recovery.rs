//! Recovery Policy
//!
//! Fixed-interval reconnection. After any transport failure the session
//! waits `self_heal_time` and tries again, with no attempt limit and no
//! growth in the delay.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::infrastructure::config::WebSocketSettings;

/// Default delay between reconnection attempts.
pub const DEFAULT_SELF_HEAL_TIME: Duration = Duration::from_secs(1);

/// Configuration for recovery behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryConfig {
    /// Delay before each reconnection attempt.
    pub self_heal_time: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            self_heal_time: DEFAULT_SELF_HEAL_TIME,
        }
    }
}

impl RecoveryConfig {
    /// Create a new configuration.
    #[must_use]
    pub const fn new(self_heal_time: Duration) -> Self {
        Self { self_heal_time }
    }

    /// Create configuration from `WebSocketSettings`.
    #[must_use]
    pub const fn from_websocket_settings(settings: &WebSocketSettings) -> Self {
        Self {
            self_heal_time: settings.self_heal_time,
        }
    }
}

/// Tracks consecutive failures and produces the next back-off.
///
/// # Example
///
/// ```rust
/// use price_stream::infrastructure::twelvedata::recovery::{RecoveryConfig, RecoveryPolicy};
/// use std::time::Duration;
///
/// let mut policy = RecoveryPolicy::new(RecoveryConfig::new(Duration::from_millis(500)));
///
/// assert_eq!(policy.next_delay(), Duration::from_millis(500));
/// assert_eq!(policy.next_delay(), Duration::from_millis(500));
/// assert_eq!(policy.attempt_count(), 2);
///
/// // Connection came back
/// policy.reset();
/// assert_eq!(policy.attempt_count(), 0);
/// ```
#[derive(Debug)]
pub struct RecoveryPolicy {
    config: RecoveryConfig,
    attempt_count: u32,
}

impl RecoveryPolicy {
    /// Create a new policy.
    #[must_use]
    pub const fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            attempt_count: 0,
        }
    }

    /// Delay before the next attempt.
    #[must_use]
    pub const fn next_delay(&mut self) -> Duration {
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.config.self_heal_time
    }

    /// Reset after a successful connection.
    pub const fn reset(&mut self) {
        self.attempt_count = 0;
    }

    /// Consecutive failures since the last successful connection.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Sleep for the next delay.
    ///
    /// Returns `false` if cancelled before the delay elapsed.
    pub async fn backoff(&mut self, cancel: &CancellationToken) -> bool {
        let delay = self.next_delay();
        tracing::info!(
            attempt = self.attempt_count,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Reconnecting after delay"
        );

        tokio::select! {
            () = cancel.cancelled() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }
}
