use serde::Deserialize;
use std::time::Duration;

/// Bounded retry with linear backoff.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    #[serde(rename = "step_ms", with = "millis")]
    pub step: Duration,
    #[serde(rename = "max_delay_ms", with = "opt_millis")]
    pub max_delay: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::linear(4, Duration::from_millis(400))
    }
}

impl RetryConfig {
    pub fn linear(max_attempts: u32, step: Duration) -> Self {
        Self {
            max_attempts,
            step,
            max_delay: None,
        }
    }

    pub fn with_max_delay(mut self, cap: Duration) -> Self {
        self.max_delay = Some(cap);
        self
    }

    /// No waiting between attempts. Handy for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::linear(max_attempts, Duration::ZERO)
    }

    /// Delay after the failed attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.step.saturating_mul(attempt.saturating_add(1));
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    /// Whether another attempt follows the failed attempt `attempt` (0-based).
    pub fn has_next(&self, attempt: u32) -> bool {
        attempt.saturating_add(1) < self.max_attempts
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

mod opt_millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d).map(|v| v.map(Duration::from_millis))
    }
}
