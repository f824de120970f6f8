//! Retry delays for one content sync attempt.

use crate::config::SyncConfig;
use std::time::Duration;

/// Smallest base delay; a zero base would never exhaust the ceiling.
const MIN_BASE_DELAY: Duration = Duration::from_millis(1);

/// Doubling backoff whose *total* delay never exceeds `ceiling`.
///
/// ```
/// use orrery_core::application::sync::BackoffPolicy;
/// use std::time::Duration;
///
/// let policy = BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(30));
/// let secs: Vec<u64> = policy.delays().iter().map(Duration::as_secs).collect();
/// assert_eq!(secs, vec![1, 2, 4, 8]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub ceiling: Duration,
}

impl BackoffPolicy {
    pub fn new(base_delay: Duration, ceiling: Duration) -> Self {
        Self {
            base_delay: base_delay.max(MIN_BASE_DELAY),
            ceiling,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.base_delay, config.ceiling)
    }

    pub fn with_base_delay(self, base_delay: Duration) -> Self {
        Self::new(base_delay, self.ceiling)
    }

    pub fn with_ceiling(mut self, ceiling: Duration) -> Self {
        self.ceiling = ceiling;
        self
    }

    /// Delay before retry `n` (0-based), if the budget still allows it.
    pub fn delay_for(&self, retry: usize) -> Option<Duration> {
        self.delays().get(retry).copied()
    }

    /// Every retry delay in order: base, 2x base, 4x base, ... stopping
    /// before the running total would pass the ceiling.
    pub fn delays(&self) -> Vec<Duration> {
        let mut delays = Vec::new();
        let mut total = Duration::ZERO;
        let mut next = self.base_delay;
        while total + next <= self.ceiling {
            delays.push(next);
            total += next;
            next = match next.checked_mul(2) {
                Some(doubled) => doubled,
                None => break,
            };
        }
        delays
    }

    pub fn total_delay(&self) -> Duration {
        self.delays().iter().sum()
    }
}
