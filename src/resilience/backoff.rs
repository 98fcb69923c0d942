//! Reconnect backoff policies
//!
//! The stream supervisor reconnects forever by default, waiting a constant
//! five seconds between attempts. Exponential and jittered strategies plus an
//! optional attempt cap are available for deployments that want to go easier
//! on the backend.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Default delay before reconnecting
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// How the delay evolves across consecutive failed attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same delay every time
    #[default]
    Constant,
    /// Delay multiplied after each attempt, capped at `max_delay`
    Exponential,
    /// Exponential plus up to 25% random jitter
    ExponentialJitter,
}

/// Reconnect policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay strategy
    pub strategy: BackoffStrategy,
    /// First (or only, for constant) delay
    #[serde(with = "duration_ms", rename = "initial_delay_ms")]
    pub initial_delay: Duration,
    /// Upper bound for exponential strategies
    #[serde(with = "duration_ms", rename = "max_delay_ms")]
    pub max_delay: Duration,
    /// Multiplier for exponential strategies
    pub multiplier: f64,
    /// Stop after this many reconnects without a successful connection.
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::Constant,
            initial_delay: DEFAULT_RECONNECT_DELAY,
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            max_attempts: None,
        }
    }
}

impl BackoffConfig {
    /// Create a new backoff config
    pub fn new() -> Self {
        Self::default()
    }

    /// Constant delay, unlimited attempts
    pub fn constant(delay: Duration) -> Self {
        Self::default().initial_delay(delay)
    }

    /// Exponential backoff from `initial` up to `max`
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self::default()
            .strategy(BackoffStrategy::Exponential)
            .initial_delay(initial)
            .max_delay(max)
    }

    /// Set the strategy
    pub fn strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set initial delay
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set maximum delay
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set backoff multiplier
    pub fn multiplier(mut self, mult: f64) -> Self {
        self.multiplier = mult.max(1.0);
        self
    }

    /// Cap the number of consecutive attempts
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }
}

/// Delay calculator for one supervisor.
///
/// Reset it whenever a connection opens so the next outage starts from the
/// initial delay again.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    config: BackoffConfig,
    attempt: u32,
}

impl ReconnectBackoff {
    /// Create a new backoff
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Get the next delay, or None once `max_attempts` is exhausted
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.has_more() {
            return None;
        }

        let delay = self.calculate_delay();
        self.attempt = self.attempt.saturating_add(1);
        Some(delay)
    }

    /// Calculate delay for current attempt
    fn calculate_delay(&self) -> Duration {
        let base_ms = self.config.initial_delay.as_millis() as f64;
        let max_ms = self.config.max_delay.as_millis() as f64;

        let delay_ms = match self.config.strategy {
            BackoffStrategy::Constant => base_ms,
            BackoffStrategy::Exponential => exponential_ms(base_ms, max_ms, &self.config, self.attempt),
            BackoffStrategy::ExponentialJitter => {
                let capped = exponential_ms(base_ms, max_ms, &self.config, self.attempt);
                capped + capped * 0.25 * rand::thread_rng().gen_range(0.0..=1.0)
            }
        };

        Duration::from_millis(delay_ms as u64)
    }

    /// Reset after a successful connection
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Consecutive failed attempts so far
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Check if more attempts are allowed
    pub fn has_more(&self) -> bool {
        self.config
            .max_attempts
            .map_or(true, |max| self.attempt < max)
    }

    /// The policy in use
    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }
}

fn exponential_ms(base_ms: f64, max_ms: f64, config: &BackoffConfig, attempt: u32) -> f64 {
    let exponent = attempt.min(i32::MAX as u32) as i32;
    (base_ms * config.multiplier.powi(exponent)).min(max_ms)
}

/// Serde helper storing durations as integer milliseconds
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
