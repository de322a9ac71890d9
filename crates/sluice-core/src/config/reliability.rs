use crate::error::{Result, SluiceError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff strategy for retry delays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed(Duration),

    /// Exponential: delay * 2^attempt (capped at max)
    Exponential { initial: Duration, max: Duration },

    /// Fibonacci: delay follows fibonacci sequence (capped at max)
    Fibonacci { initial: Duration, max: Duration },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Fixed(Duration::from_secs(1))
    }
}

impl BackoffStrategy {
    /// Delay to wait after the given failed attempt (0-based).
    pub fn calculate(&self, attempt: usize) -> Duration {
        match self {
            BackoffStrategy::Fixed(delay) => *delay,
            BackoffStrategy::Exponential { initial, max } => {
                let multiplier = 2u32.saturating_pow(attempt.min(u32::MAX as usize) as u32);
                initial.saturating_mul(multiplier).min(*max)
            }
            BackoffStrategy::Fibonacci { initial, max } => {
                let fib = Self::fibonacci(attempt);
                initial
                    .saturating_mul(fib.min(u32::MAX as u64) as u32)
                    .min(*max)
            }
        }
    }

    fn fibonacci(n: usize) -> u64 {
        let (mut a, mut b) = (1u64, 1u64);
        for _ in 0..n {
            let next = a.saturating_add(b);
            a = b;
            b = next;
        }
        a
    }
}

/// Which failures a retry policy re-attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RetryOn {
    /// Only transient failures (timeouts, lock contention)
    #[default]
    Transient,
    /// Any failure except configuration errors and cancellation
    Any,
}

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total invocations including the first one (default: 3, minimum: 1)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts
    #[serde(default)]
    pub backoff: BackoffStrategy,

    /// Failure classes that are retried
    #[serde(default)]
    pub retry_on: RetryOn,
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: BackoffStrategy::default(),
            retry_on: RetryOn::default(),
        }
    }
}

impl RetryConfig {
    /// `max_attempts` invocations with a fixed `delay` between them.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::Fixed(delay),
            retry_on: RetryOn::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_retry_on(mut self, retry_on: RetryOn) -> Self {
        self.retry_on = retry_on;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(SluiceError::config("max_attempts must be at least 1"));
        }
        Ok(())
    }
}

/// Result cache configuration
///
/// Without limits the cache keeps every entry for the lifetime of the
/// process or until it is explicitly invalidated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached results; oldest insertion is evicted first
    #[serde(default)]
    pub max_entries: Option<usize>,

    /// Time-to-live for entries in seconds
    ///
    /// Entries older than this are treated as misses on access.
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

impl CacheConfig {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = Some(ttl_secs);
        self
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_entries == Some(0) {
            return Err(SluiceError::config("max_entries must be at least 1"));
        }
        Ok(())
    }
}

/// Concurrent fetch coordinator configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Upper bound on tasks running at the same time (default: unbounded)
    ///
    /// Each running task holds its own connection, so this also bounds the
    /// number of open connections.
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    /// Per-task timeout in milliseconds (default: none)
    ///
    /// A task exceeding it settles with a transient error.
    #[serde(default)]
    pub task_timeout_ms: Option<u64>,
}

impl CoordinatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = Some(max);
        self
    }

    pub fn with_task_timeout(mut self, timeout_ms: u64) -> Self {
        self.task_timeout_ms = Some(timeout_ms);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == Some(0) {
            return Err(SluiceError::config("max_concurrency must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_backoff() {
        let backoff = BackoffStrategy::Fixed(Duration::from_millis(250));
        assert_eq!(backoff.calculate(0), Duration::from_millis(250));
        assert_eq!(backoff.calculate(7), Duration::from_millis(250));
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let backoff = BackoffStrategy::Exponential {
            initial: Duration::from_millis(10),
            max: Duration::from_millis(100),
        };
        assert_eq!(backoff.calculate(0), Duration::from_millis(10));
        assert_eq!(backoff.calculate(1), Duration::from_millis(20));
        assert_eq!(backoff.calculate(3), Duration::from_millis(80));
        assert_eq!(backoff.calculate(4), Duration::from_millis(100));
        assert_eq!(backoff.calculate(60), Duration::from_millis(100));
    }

    #[test]
    fn test_fibonacci_backoff() {
        let backoff = BackoffStrategy::Fibonacci {
            initial: Duration::from_millis(10),
            max: Duration::from_secs(1),
        };
        let delays: Vec<_> = (0..6).map(|n| backoff.calculate(n).as_millis()).collect();
        assert_eq!(delays, vec![10, 10, 20, 30, 50, 80]);
    }

    #[test]
    fn test_retry_config_rejects_zero_attempts() {
        assert!(RetryConfig::new(0, Duration::ZERO).validate().is_err());
        assert!(RetryConfig::new(1, Duration::ZERO).validate().is_ok());
    }

    #[test]
    fn test_cache_config_defaults_unbounded() {
        let cfg = CacheConfig::default();
        assert_eq!(cfg.max_entries, None);
        assert_eq!(cfg.ttl(), None);
        assert!(CacheConfig::unbounded().with_max_entries(0).validate().is_err());
    }
}
