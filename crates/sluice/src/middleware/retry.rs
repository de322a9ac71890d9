//! Retry policy
//!
//! Re-invokes a failed operation from scratch, so when it encloses the
//! connection and transaction scopes every attempt gets a fresh connection
//! and a fresh transaction.

use sluice_core::{
    observe, BackoffStrategy, ErrorKind, Result, RetryConfig, RetryOn, SluiceError,
};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: BackoffStrategy,
    retry_on: RetryOn,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        let config = RetryConfig::default();
        Self {
            max_attempts: config.max_attempts,
            backoff: config.backoff,
            retry_on: config.retry_on,
        }
    }
}

impl RetryPolicy {
    /// At most `max_attempts` invocations with a fixed `delay` between them.
    ///
    /// Fails with a configuration error when `max_attempts` is zero.
    pub fn new(max_attempts: u32, delay: Duration) -> Result<Self> {
        Self::from_config(RetryConfig::new(max_attempts, delay))
    }

    pub fn from_config(config: RetryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            max_attempts: config.max_attempts,
            backoff: config.backoff,
            retry_on: config.retry_on,
        })
    }

    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_retry_on(mut self, retry_on: RetryOn) -> Self {
        self.retry_on = retry_on;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> &BackoffStrategy {
        &self.backoff
    }

    /// Whether `err` is worth another attempt under this policy.
    ///
    /// Configuration errors and cancellation are never retried.
    pub fn should_retry(&self, err: &SluiceError) -> bool {
        match err.kind() {
            ErrorKind::Config | ErrorKind::Cancelled => false,
            ErrorKind::Transient => true,
            _ => self.retry_on == RetryOn::Any,
        }
    }

    /// Decide what to do after `attempt` (1-based) failed with `err`.
    ///
    /// Returns the delay before the next attempt, or `None` to give up.
    fn next_delay(&self, attempt: u32, err: &SluiceError) -> Option<Duration> {
        if !self.should_retry(err) {
            tracing::debug!(attempt, error = %err, "Error is not retriable");
            return None;
        }
        if attempt >= self.max_attempts {
            tracing::warn!(
                attempts = attempt,
                error = %err,
                "Retry attempts exhausted"
            );
            return None;
        }
        let delay = self.backoff.calculate(attempt as usize - 1);
        tracing::warn!(
            attempt,
            max_attempts = self.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Attempt failed, retrying"
        );
        observe::record_retry();
        Some(delay)
    }

    /// Invoke `op` until it succeeds or the policy gives up, blocking the
    /// calling thread between attempts.
    pub fn run<T, F>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op() {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => match self.next_delay(attempt, &e) {
                    Some(delay) => {
                        if !delay.is_zero() {
                            std::thread::sleep(delay);
                        }
                    }
                    None => return Err(e),
                },
            }
        }
    }

    /// Async variant of [`run`](Self::run). The delay yields to the runtime
    /// instead of blocking a worker thread.
    pub async fn run_async<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => match self.next_delay(attempt, &e) {
                    Some(delay) => tokio::time::sleep(delay).await,
                    None => return Err(e),
                },
            }
        }
    }

    /// Wrap `op` so each call runs under this policy.
    pub fn wrap<T, F>(self, mut op: F) -> impl FnMut() -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        move || self.run(&mut op)
    }
}
