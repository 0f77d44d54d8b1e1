use rand::Rng;

use ohlcv_core::BackoffConfig;

/// Bounded exponential backoff for transient fetch errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    cfg: BackoffConfig,
}

impl RetryPolicy {
    /// Wrap a backoff configuration.
    #[must_use]
    pub const fn new(cfg: BackoffConfig) -> Self {
        Self { cfg }
    }

    /// Consecutive failures tolerated before giving up; `None` retries forever.
    #[must_use]
    pub const fn max_attempts(&self) -> Option<u32> {
        if self.cfg.max_attempts == 0 {
            None
        } else {
            Some(self.cfg.max_attempts)
        }
    }

    /// Whether `failures` consecutive failures exhaust the budget.
    #[must_use]
    pub fn exhausted(&self, failures: u32) -> bool {
        self.max_attempts().is_some_and(|max| failures >= max)
    }

    /// Delay before retry number `attempt` (1-based), without jitter.
    ///
    /// `min * factor^(attempt - 1)`, capped at the configured maximum.
    #[must_use]
    pub fn base_delay_ms(&self, attempt: u32) -> u64 {
        let exp = attempt.saturating_sub(1);
        let mut delay = self.cfg.min_backoff_ms;
        for _ in 0..exp {
            delay = delay.saturating_mul(u64::from(self.cfg.factor));
            if delay >= self.cfg.max_backoff_ms {
                return self.cfg.max_backoff_ms;
            }
        }
        delay.min(self.cfg.max_backoff_ms)
    }

    /// Jittered delay before retry number `attempt`, never shorter than `floor_ms`.
    #[must_use]
    pub fn delay_ms(&self, attempt: u32, floor_ms: Option<u64>) -> u64 {
        let jittered = self.jittered(self.base_delay_ms(attempt));
        floor_ms.map_or(jittered, |floor| jittered.max(floor))
    }

    /// `base_ms` stretched by a random share of up to `jitter_percent` percent.
    #[must_use]
    pub fn jittered(&self, base_ms: u64) -> u64 {
        let spread = base_ms.saturating_mul(u64::from(self.cfg.jitter_percent)) / 100;
        if spread == 0 {
            return base_ms;
        }
        base_ms.saturating_add(rand::rng().random_range(0..=spread))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}
