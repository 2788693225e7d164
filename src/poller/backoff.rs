//! Capped exponential backoff

use std::time::Duration;

/// Timing of the polling loop
///
/// The first poll waits `initial_delay`. After each "still waiting" answer the
/// next wait is `base_delay * factor^(n-1)` for the first `growth_steps`
/// retries, then `spaced_interval`, until `max_elapsed` since polling began
/// would be exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub base_delay: Duration,
    pub factor: u32,
    pub growth_steps: u32,
    pub spaced_interval: Duration,
    pub max_elapsed: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            base_delay: Duration::from_millis(10),
            factor: 4,
            growth_steps: 4,
            spaced_interval: Duration::from_secs(1),
            max_elapsed: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn factor(mut self, factor: u32) -> Self {
        self.factor = factor;
        self
    }

    pub fn growth_steps(mut self, steps: u32) -> Self {
        self.growth_steps = steps;
        self
    }

    pub fn spaced_interval(mut self, interval: Duration) -> Self {
        self.spaced_interval = interval;
        self
    }

    pub fn max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }

    /// Wait before the `retry`-th re-poll (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return self.initial_delay;
        }
        if retry > self.growth_steps {
            return self.spaced_interval;
        }
        self.factor
            .checked_pow(retry - 1)
            .and_then(|multiplier| self.base_delay.checked_mul(multiplier))
            .unwrap_or(self.max_elapsed)
    }

    /// The endless sequence of retry waits
    pub fn schedule(&self) -> BackoffSchedule {
        BackoffSchedule {
            policy: *self,
            retry: 0,
        }
    }
}

/// Iterator over retry waits of a [`BackoffPolicy`]
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    policy: BackoffPolicy,
    retry: u32,
}

impl Iterator for BackoffSchedule {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        self.retry = self.retry.saturating_add(1);
        Some(self.policy.delay_for(self.retry))
    }
}
