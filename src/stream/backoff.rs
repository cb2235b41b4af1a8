//! Reconnect delay policy.

use std::time::Duration;

/// Exponential backoff with jitter between connection attempts.
///
/// Attempts are unlimited; the policy only decides how long to wait.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry (milliseconds)
    pub initial_delay_ms: u64,
    /// Maximum delay cap (milliseconds)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff (e.g., 2.0 = doubling)
    pub backoff_multiplier: f64,
    /// Random jitter as fraction of delay (e.g., 0.1 = ±10%)
    pub jitter_fraction: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 250,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter_fraction: 0.1,
        }
    }
}

impl ReconnectPolicy {
    /// Constant delay without jitter.
    pub fn fixed(delay: Duration) -> Self {
        let ms = delay.as_millis().min(u128::from(u64::MAX)) as u64;
        Self {
            initial_delay_ms: ms,
            max_delay_ms: ms,
            backoff_multiplier: 1.0,
            jitter_fraction: 0.0,
        }
    }

    /// Calculate backoff delay with jitter for the given attempt number (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        use rand::Rng;

        // Exponential backoff: initial * multiplier^attempt
        let exponent = attempt.min(64) as i32;
        let base_delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);

        // Cap at max delay
        let capped_delay = base_delay.min(self.max_delay_ms as f64);

        if self.jitter_fraction <= 0.0 || capped_delay <= 0.0 {
            return Duration::from_millis(capped_delay.max(0.0) as u64);
        }

        // Add jitter: ±jitter_fraction
        let jitter_range = capped_delay * self.jitter_fraction;
        let jitter = rand::rng().random_range(-jitter_range..=jitter_range);
        let final_delay = (capped_delay + jitter).max(0.0) as u64;

        Duration::from_millis(final_delay)
    }
}
