#![forbid(unsafe_code)]

//! Hook configuration.
//!
//! Defaults can be overridden from the environment with
//! [`HookConfig::from_env`]:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `TETHER_DEBOUNCE_MS` | `debounce_delay` |
//! | `TETHER_INTERVAL_MS` | `interval_delay` |
//! | `TETHER_RETRY_MAX_ATTEMPTS` | `retry.max_attempts` |
//! | `TETHER_RETRY_BASE_MS` | `retry.base_delay` |
//! | `TETHER_CACHE_TTL_MS` | `cache_ttl` |
//!
//! Unset or unparsable variables keep the default.

use std::time::Duration;

use crate::error::FetchError;

/// Exponential backoff with a fixed attempt budget. No jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first (0 is treated as 1).
    pub max_attempts: u32,
    /// Wait before the first retry.
    pub base_delay: Duration,
    /// Multiplier applied per further retry.
    pub factor: u32,
    /// Upper bound on any single wait.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            factor: 2,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Total attempts, first one included.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Wait before the first retry.
    #[must_use]
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Growth per further retry.
    #[must_use]
    pub fn with_factor(mut self, factor: u32) -> Self {
        self.factor = factor;
        self
    }

    /// Cap on any single wait.
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Wait before retry number `retry` (1-based):
    /// `base_delay * factor^(retry - 1)`, capped at `max_delay`.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1);
        let multiplier = self.factor.max(1).saturating_pow(exp);
        self.base_delay
            .saturating_mul(multiplier)
            .min(self.max_delay)
    }

    /// Whether to try again after `attempts` attempts ended in `error`.
    #[must_use]
    pub fn should_retry(&self, attempts: u32, error: &FetchError) -> bool {
        attempts < self.max_attempts.max(1) && error.is_retryable()
    }
}

/// Defaults shared by the hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookConfig {
    pub debounce_delay: Duration,
    pub interval_delay: Duration,
    pub retry: RetryPolicy,
    pub cache_ttl: Duration,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            debounce_delay: Duration::from_millis(300),
            interval_delay: Duration::from_secs(1),
            retry: RetryPolicy::default(),
            cache_ttl: Duration::from_secs(5 * 60),
        }
    }
}

impl HookConfig {
    /// Defaults overlaid with `TETHER_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`.
    #[must_use]
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let num = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        if let Some(ms) = num("TETHER_DEBOUNCE_MS") {
            self.debounce_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = num("TETHER_INTERVAL_MS") {
            self.interval_delay = Duration::from_millis(ms);
        }
        if let Some(n) = num("TETHER_RETRY_MAX_ATTEMPTS").and_then(|n| u32::try_from(n).ok()) {
            self.retry.max_attempts = n;
        }
        if let Some(ms) = num("TETHER_RETRY_BASE_MS") {
            self.retry.base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = num("TETHER_CACHE_TTL_MS") {
            self.cache_ttl = Duration::from_millis(ms);
        }
        self
    }

    /// Quiet window for debounced hooks.
    #[must_use]
    pub fn with_debounce_delay(mut self, delay: Duration) -> Self {
        self.debounce_delay = delay;
        self
    }

    /// Period for interval hooks.
    #[must_use]
    pub fn with_interval_delay(mut self, delay: Duration) -> Self {
        self.interval_delay = delay;
        self
    }

    /// Retry policy for fetches.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Freshness of cached fetch bodies. Zero disables caching.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn backoff_schedule() {
        let policy = RetryPolicy::default()
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(5), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(60), Duration::from_millis(1000));
    }

    #[test]
    fn attempt_budget() {
        let policy = RetryPolicy::default().with_max_attempts(3);
        let net = FetchError::Network("down".into());
        assert!(policy.should_retry(1, &net));
        assert!(policy.should_retry(2, &net));
        assert!(!policy.should_retry(3, &net));
        assert!(!policy.should_retry(1, &FetchError::Status(400)));
        assert!(!RetryPolicy::none().should_retry(1, &net));
        assert!(!RetryPolicy::default().with_max_attempts(0).should_retry(1, &net));
    }

    #[test]
    fn from_env_overlays_process_environment() {
        let expected = HookConfig::default().overlay(|key| std::env::var(key).ok());
        assert_eq!(HookConfig::from_env(), expected);
    }

    #[test]
    fn overlay_reads_known_keys() {
        let env: HashMap<&str, &str> = [
            ("TETHER_DEBOUNCE_MS", "150"),
            ("TETHER_RETRY_MAX_ATTEMPTS", "5"),
            ("TETHER_CACHE_TTL_MS", "not a number"),
        ]
        .into_iter()
        .collect();
        let config = HookConfig::default().overlay(|k| env.get(k).map(|v| (*v).to_owned()));
        assert_eq!(config.debounce_delay, Duration::from_millis(150));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.cache_ttl, HookConfig::default().cache_ttl);
        assert_eq!(config.interval_delay, Duration::from_secs(1));
    }
}
