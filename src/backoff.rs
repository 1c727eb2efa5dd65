//! Wait policies for the retry loop.
//!
//! A policy counts attempts and hands out the delay before the next one.
//! One instance serves one attempt sequence; build a fresh policy (or call
//! [`Backoff::reset`]) for every new operation.

use std::{
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};

pub trait Backoff: Send + Sync {
    /// Registers one more attempt and reports whether it may run.
    fn should_continue(&self) -> bool;

    /// Delay to sleep before the next attempt.
    fn wait(&self) -> Duration;

    fn reset(&self);

    /// Attempts registered so far.
    fn attempts(&self) -> u32;
}

/// Constant delay between at most `max_retries + 1` attempts.
#[derive(Debug)]
pub struct FixedIntervalBackoff {
    interval: Duration,
    max_retries: u32,
    attempt: AtomicU32,
}

impl FixedIntervalBackoff {
    pub fn new(interval: Duration, max_retries: u32) -> Self {
        Self {
            interval,
            max_retries,
            attempt: AtomicU32::new(0),
        }
    }
}

impl Backoff for FixedIntervalBackoff {
    fn should_continue(&self) -> bool {
        self.attempt.fetch_add(1, Ordering::SeqCst) <= self.max_retries
    }

    fn wait(&self) -> Duration {
        self.interval
    }

    fn reset(&self) {
        self.attempt.store(0, Ordering::SeqCst);
    }

    fn attempts(&self) -> u32 {
        self.attempt.load(Ordering::SeqCst).min(self.max_retries + 1)
    }
}

/// Waits `base * 2^attempt` (one second base by default), optionally jittered.
#[derive(Debug)]
pub struct ExponentialBackoff {
    base: Duration,
    max_retries: u32,
    jitter: f64,
    attempt: AtomicU32,
}

impl ExponentialBackoff {
    pub fn new(max_retries: u32) -> Self {
        Self {
            base: Duration::from_secs(1),
            max_retries,
            jitter: 0.0,
            attempt: AtomicU32::new(0),
        }
    }

    pub fn with_base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    /// Fraction in `0.0..=1.0` of the delay added or removed at random.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }
}

impl Backoff for ExponentialBackoff {
    fn should_continue(&self) -> bool {
        self.attempt.fetch_add(1, Ordering::SeqCst) <= self.max_retries
    }

    fn wait(&self) -> Duration {
        let exponent = self.attempt.load(Ordering::SeqCst).min(31);
        let delay = self.base.saturating_mul(2u32.saturating_pow(exponent));

        if self.jitter > 0.0 {
            let factor = 1.0 + rand::random_range(-self.jitter..=self.jitter);
            delay.mul_f64(factor.max(0.0))
        } else {
            delay
        }
    }

    fn reset(&self) {
        self.attempt.store(0, Ordering::SeqCst);
    }

    fn attempts(&self) -> u32 {
        self.attempt.load(Ordering::SeqCst).min(self.max_retries + 1)
    }
}
