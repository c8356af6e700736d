//! # Reconnect Backoff
//!
//! Exponential delay between failed dial attempts. The schedule itself is a
//! pure function of the attempt number so it can be checked without any
//! sleeping; jitter is layered on top with an injectable RNG.

use rand::Rng;
use std::time::Duration;

/// Parameters of the dial retry schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failed attempt.
    pub min: Duration,
    /// Upper bound for any single delay.
    pub max: Duration,
    /// Growth factor per attempt.
    pub factor: f64,
    /// Randomise each delay within `[min, delay)`.
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(100),
            max: Duration::from_secs(2),
            factor: 2.0,
            jitter: true,
        }
    }
}

impl BackoffPolicy {
    /// Un-jittered delay for a zero-based attempt: `min * factor^attempt`, capped at `max`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let min = self.min.as_secs_f64();
        let max = self.max.as_secs_f64();
        let raw = min * self.factor.powi(attempt.min(i32::MAX as u32) as i32);
        if !raw.is_finite() || raw >= max {
            return self.max;
        }
        Duration::from_secs_f64(raw.max(min))
    }

    /// Applies jitter to `delay`, picking uniformly in `[min, delay]`.
    pub fn jittered<R: Rng + ?Sized>(&self, delay: Duration, rng: &mut R) -> Duration {
        if !self.jitter || delay <= self.min {
            return delay;
        }
        let span = (delay - self.min).as_secs_f64();
        self.min + Duration::from_secs_f64(rng.random::<f64>() * span)
    }
}

/// Stateful walker over a [`BackoffPolicy`], one per dial loop.
#[derive(Debug)]
pub struct Backoff {
    policy: BackoffPolicy,
    attempt: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Delay to wait before the next attempt; advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.policy.next_delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        self.policy.jittered(delay, &mut rand::rng())
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}
