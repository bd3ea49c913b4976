use std::time::Duration;

use crate::error::HotspotError;

/// Default number of re-queries after a successful create before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Default first backoff delay; attempt `k` waits `base * 2^k`.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(30);

/// Configuration for a [`HotspotController`](crate::HotspotController).
///
/// All fields have sensible defaults. Use the builder pattern:
///
/// ```rust
/// use std::time::Duration;
/// use hotspot_controller::HotspotConfig;
///
/// let config = HotspotConfig::new()
///     .max_retries(5)
///     .backoff_base(Duration::from_millis(50));
/// ```
#[derive(Debug, Clone)]
pub struct HotspotConfig {
    /// Re-query budget while waiting for the created group to become owner-ready.
    pub(crate) max_retries: u32,
    /// First backoff delay.
    pub(crate) backoff_base: Duration,
    /// Upper bound on the best-effort group removal during teardown.
    pub(crate) teardown_timeout: Duration,
    /// Channel buffer for client commands.
    pub(crate) command_buffer: usize,
    /// Channel buffer for events delivered to the client.
    pub(crate) event_buffer: usize,
}

impl Default for HotspotConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl HotspotConfig {
    /// Create a new config with defaults.
    ///
    /// `HOTSPOT_BACKOFF_BASE_MS` and `HOTSPOT_MAX_RETRIES` override the
    /// retry defaults when set to valid integers. Builder calls override both.
    pub fn new() -> Self {
        let backoff_base = std::env::var("HOTSPOT_BACKOFF_BASE_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_BACKOFF_BASE);
        let max_retries = std::env::var("HOTSPOT_MAX_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_RETRIES);

        Self {
            max_retries,
            backoff_base,
            teardown_timeout: Duration::from_secs(5),
            command_buffer: 32,
            event_buffer: 256,
        }
    }

    /// Set the re-query budget (default: 10).
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the first backoff delay (default: 30 ms).
    pub fn backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Set the teardown removal timeout (default: 5 s).
    pub fn teardown_timeout(mut self, timeout: Duration) -> Self {
        self.teardown_timeout = timeout;
        self
    }

    /// Set the command channel capacity (default: 32).
    pub fn command_buffer(mut self, capacity: usize) -> Self {
        self.command_buffer = capacity;
        self
    }

    /// Set the event channel capacity (default: 256).
    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }

    pub fn retry_limit(&self) -> u32 {
        self.max_retries
    }

    /// Delay before re-query number `tries` (0-indexed).
    ///
    /// Saturates instead of overflowing for very large retry budgets.
    pub fn backoff_delay(&self, tries: u32) -> Duration {
        let factor = 1u32.checked_shl(tries).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor)
    }

    /// Reject configurations the controller cannot run with.
    pub fn validate(&self) -> Result<(), HotspotError> {
        if self.command_buffer == 0 || self.event_buffer == 0 {
            return Err(HotspotError::Config(
                "channel buffers must be non-zero".into(),
            ));
        }
        if self.max_retries >= 32 {
            return Err(HotspotError::Config(format!(
                "max_retries {} exceeds the backoff range (max 31)",
                self.max_retries
            )));
        }
        Ok(())
    }
}
