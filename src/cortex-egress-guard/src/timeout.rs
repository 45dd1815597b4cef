//! Deadline clamping for outbound calls.

use std::time::Duration;

/// Timeout used when the caller supplies none or an unusable value (30 seconds).
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Upper bound for any caller-supplied timeout (2 minutes).
pub const MAX_TIMEOUT_MS: u64 = 120_000;

/// Clamp rule for caller-supplied timeouts.
///
/// Values are milliseconds as `f64` because they usually arrive from untrusted
/// input: non-finite, negative, zero, or missing values fall back to the
/// default, anything above the maximum is capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    default_ms: u64,
    max_ms: u64,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            default_ms: DEFAULT_TIMEOUT_MS,
            max_ms: MAX_TIMEOUT_MS,
        }
    }
}

impl TimeoutPolicy {
    /// Create a policy. Returns `None` unless `0 < default_ms <= max_ms`.
    pub fn new(default_ms: u64, max_ms: u64) -> Option<Self> {
        (default_ms > 0 && default_ms <= max_ms).then_some(Self { default_ms, max_ms })
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_ms)
    }

    pub fn max_timeout(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    /// Effective timeout in whole milliseconds, always in `(0, max]`.
    pub fn effective_millis(&self, requested: Option<f64>) -> u64 {
        match requested {
            Some(ms) if ms.is_finite() && ms > 0.0 => {
                // Sub-millisecond requests round up so the result stays non-zero.
                let ms = ms.ceil();
                if ms >= self.max_ms as f64 {
                    self.max_ms
                } else {
                    ms as u64
                }
            }
            _ => self.default_ms,
        }
    }

    /// Effective timeout as a duration.
    pub fn effective(&self, requested: Option<f64>) -> Duration {
        Duration::from_millis(self.effective_millis(requested))
    }
}
