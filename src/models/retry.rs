use std::time::Duration;

use serde::Deserialize;

use crate::backoff::{Backoff, ExponentialBackoff, FixedIntervalBackoff};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategy {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub strategy: RetryStrategy,
    pub interval_ms: u64,
    pub jitter: f64,
}

impl RetryConfig {
    /// Fresh policy for one attempt sequence.
    pub fn backoff(&self) -> Box<dyn Backoff> {
        let interval = Duration::from_millis(self.interval_ms);

        match self.strategy {
            RetryStrategy::Fixed => Box::new(FixedIntervalBackoff::new(interval, self.max_retries)),
            RetryStrategy::Exponential => Box::new(
                ExponentialBackoff::new(self.max_retries)
                    .with_base(interval)
                    .with_jitter(self.jitter),
            ),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            strategy: RetryStrategy::Exponential,
            interval_ms: 1000,
            jitter: 0.0,
        }
    }
}
