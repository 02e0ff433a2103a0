//! Retry configuration and exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Configuration for retry behavior with exponential backoff.
///
/// Immutable for the lifetime of a [`RetryEngine`](super::RetryEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt. The operation runs at most
    /// `max_retries + 1` times.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Growth factor applied per attempt.
    pub backoff_multiplier: f64,
    /// Whether to perturb delays randomly.
    pub jitter_enabled: bool,
    /// Jitter amplitude as a fraction of the base delay (0.0-1.0).
    pub jitter_percent: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 32_000,
            backoff_multiplier: 2.0,
            jitter_enabled: true,
            jitter_percent: 0.2,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay_ms(mut self, initial_delay_ms: u64) -> Self {
        self.initial_delay_ms = initial_delay_ms;
        self
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    pub fn with_backoff_multiplier(mut self, backoff_multiplier: f64) -> Self {
        self.backoff_multiplier = backoff_multiplier;
        self
    }

    pub fn with_jitter(mut self, enabled: bool) -> Self {
        self.jitter_enabled = enabled;
        self
    }

    pub fn with_jitter_percent(mut self, jitter_percent: f64) -> Self {
        self.jitter_percent = jitter_percent;
        self
    }

    /// The un-jittered delay for retry `attempt` (0-based), in milliseconds:
    /// `min(initial_delay_ms * backoff_multiplier^attempt, max_delay_ms)`.
    pub fn base_delay_ms(&self, attempt: u32) -> f64 {
        // Large exponents saturate to infinity, which the cap absorbs.
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let grown = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        grown.min(self.max_delay_ms as f64)
    }

    /// Calculates the delay before retry `attempt` (0-based).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        self.calculate_delay_with(attempt, &mut rand::thread_rng())
    }

    /// Same as [`calculate_delay`](Self::calculate_delay) with a caller-supplied RNG.
    ///
    /// With jitter, `u` is drawn uniformly from `[-1, 1]` and the delay is
    /// `max(0, floor(base + base * jitter_percent * u))`.
    pub fn calculate_delay_with<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = self.base_delay_ms(attempt);
        let millis = if self.jitter_enabled {
            let u: f64 = rng.gen_range(-1.0..=1.0);
            (base + base * self.jitter_percent * u).floor().max(0.0)
        } else {
            base.floor()
        };
        Duration::from_millis(millis as u64)
    }

    /// Jitter-free delays for every retry the budget allows.
    pub fn delay_schedule(&self) -> Vec<Duration> {
        (0..self.max_retries)
            .map(|attempt| Duration::from_millis(self.base_delay_ms(attempt).floor() as u64))
            .collect()
    }
}
