//! Reconnect delay schedule.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Consecutive failures tolerated before giving up.
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

/// Exponential backoff: base, 2×base, 4×base, ... capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Delay before the next retry, or `None` once attempts are exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.config.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(self.attempt).unwrap_or(u32::MAX);
        let delay = self
            .config
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.config.max_delay)
            .min(self.config.max_delay);
        self.attempt += 1;
        Some(delay)
    }

    /// Back to the base delay, after a successful open.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Retries scheduled since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_doubles_then_caps() {
        let mut backoff = Backoff::new(BackoffConfig {
            base_delay: secs(1),
            max_delay: secs(10),
            max_attempts: 6,
        });
        let delays: Vec<_> = std::iter::from_fn(|| backoff.next_delay()).collect();
        assert_eq!(delays, vec![secs(1), secs(2), secs(4), secs(8), secs(10), secs(10)]);
    }

    #[test]
    fn test_sequence_is_non_decreasing() {
        let mut backoff = Backoff::new(BackoffConfig {
            base_delay: Duration::from_millis(250),
            max_delay: secs(30),
            max_attempts: 40,
        });
        let delays: Vec<_> = std::iter::from_fn(|| backoff.next_delay()).collect();
        assert_eq!(delays.len(), 40);
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert!(delays.iter().all(|d| *d <= secs(30)));
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let mut backoff = Backoff::new(BackoffConfig::default());
        for _ in 0..5 {
            assert!(backoff.next_delay().is_some());
        }
        assert_eq!(backoff.next_delay(), None);
        assert_eq!(backoff.attempt(), 5);
    }

    #[test]
    fn test_reset_returns_to_base() {
        let mut backoff = Backoff::new(BackoffConfig::default());
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Some(secs(1)));
    }
}
