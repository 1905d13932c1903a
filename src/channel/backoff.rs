//! Reconnect Backoff
//!
//! Bounded exponential backoff between reconnect attempts:
//!
//! ```text
//! delay(n) = min(initial * factor^n, max) * (1 ± jitter)
//! ```
//!
//! With the defaults (1s, x1.5, 30s cap) the delays run 1s, 1.5s, 2.25s,
//! 3.4s ... and settle at 30s after nine attempts.

use rand::Rng;
use serde::Deserialize;
use std::time::Duration;

/// Backoff policy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BackoffConfig {
    /// Delay before the first reconnect attempt (ms)
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Upper bound for any delay (ms)
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Growth factor applied per consecutive failure
    #[serde(default = "default_factor")]
    pub factor: f64,

    /// Random spread as a fraction of the delay (0.0 disables jitter)
    #[serde(default = "default_jitter")]
    pub jitter: f64,

    /// Give up after this many consecutive failures (None = never)
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_initial_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_factor() -> f64 {
    1.5
}

fn default_jitter() -> f64 {
    0.2
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            factor: default_factor(),
            jitter: default_jitter(),
            max_attempts: None,
        }
    }
}

/// Tracks consecutive failures and yields the next delay
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempts: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// Consecutive failures recorded since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Forget past failures (called once a connection opens)
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Whether the configured attempt limit has been reached
    pub fn exhausted(&self) -> bool {
        self.config
            .max_attempts
            .map(|max| self.attempts >= max)
            .unwrap_or(false)
    }

    /// Record a failure and return the delay before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        let base = self.base_delay(self.attempts);
        self.attempts = self.attempts.saturating_add(1);
        Duration::from_millis(apply_jitter(base, self.config.jitter, self.config.max_delay_ms))
    }

    /// Un-jittered delay for the given attempt number (ms)
    pub fn base_delay(&self, attempt: u32) -> u64 {
        let factor = self.config.factor.max(1.0);
        let exp = factor.powi(attempt.min(64) as i32);
        let delay = self.config.initial_delay_ms as f64 * exp;
        if !delay.is_finite() || delay >= self.config.max_delay_ms as f64 {
            self.config.max_delay_ms
        } else {
            delay as u64
        }
    }
}

fn apply_jitter(base_ms: u64, jitter: f64, max_ms: u64) -> u64 {
    let jitter = jitter.clamp(0.0, 1.0);
    if jitter == 0.0 || base_ms == 0 {
        return base_ms;
    }
    let spread = rand::rng().random_range(-jitter..=jitter);
    let delay = (base_ms as f64 * (1.0 + spread)).round() as u64;
    delay.min(max_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> BackoffConfig {
        BackoffConfig {
            jitter: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = BackoffConfig::default();
        assert_eq!(config.initial_delay_ms, 1000);
        assert_eq!(config.max_delay_ms, 30_000);
        assert_eq!(config.factor, 1.5);
        assert!(config.max_attempts.is_none());
    }

    #[test]
    fn test_exponential_growth() {
        let mut backoff = Backoff::new(no_jitter());
        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1500));
        assert_eq!(backoff.next_delay(), Duration::from_millis(2250));
        assert_eq!(backoff.attempts(), 3);
    }

    #[test]
    fn test_delay_is_capped() {
        let mut backoff = Backoff::new(no_jitter());
        for _ in 0..200 {
            assert!(backoff.next_delay() <= Duration::from_millis(30_000));
        }
        assert_eq!(backoff.next_delay(), Duration::from_millis(30_000));
    }

    #[test]
    fn test_reset() {
        let mut backoff = Backoff::new(no_jitter());
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let mut backoff = Backoff::new(BackoffConfig {
            jitter: 0.5,
            ..Default::default()
        });
        for _ in 0..50 {
            backoff.reset();
            let delay = backoff.next_delay().as_millis();
            assert!((500..=1500).contains(&delay), "delay {} out of range", delay);
        }
    }

    #[test]
    fn test_max_attempts() {
        let mut backoff = Backoff::new(BackoffConfig {
            max_attempts: Some(2),
            ..no_jitter()
        });
        assert!(!backoff.exhausted());
        backoff.next_delay();
        backoff.next_delay();
        assert!(backoff.exhausted());
    }
}
