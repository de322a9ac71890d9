//! Concurrent fetch coordinator
//!
//! Runs independent blocking data-access operations on tokio's blocking pool
//! and joins them. Results come back in input order regardless of which task
//! finishes first. If any task fails, the whole run fails once every task has
//! settled, reporting the first failure in input order.
//!
//! Each operation is expected to open its own connection (for example through
//! [`ConnectionScope`](crate::middleware::ConnectionScope)); connections are
//! never shared between tasks.
//!
//! Every task runs under its own [`CancelToken`]. A task that exceeds the
//! configured timeout is cancelled, which interrupts the statement on any
//! connection it opened, and the run waits for it to stop before reporting
//! the timeout. Dropping a run before it completes cancels all of its tasks:
//! running ones are interrupted and pending ones never start.
//!
//! # Example
//!
//! ```no_run
//! use sluice::prelude::*;
//!
//! # async fn run() -> Result<()> {
//! let source = SqliteSource::open_path("./users.db");
//! let coordinator = Coordinator::new();
//!
//! let results = coordinator
//!     .fetch_all_concurrently(
//!         source,
//!         vec![
//!             Query::new("SELECT * FROM users"),
//!             Query::new("SELECT * FROM users WHERE age > ?").bind(40),
//!         ],
//!     )
//!     .await?;
//! println!("{} users, {} older than 40", results[0].len(), results[1].len());
//! # Ok(())
//! # }
//! ```

use crate::middleware::fetch_all;
use futures::future::join_all;
use sluice_core::{
    observe, CancelToken, CoordinatorConfig, DataSource, Query, Result, Row, SluiceError,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// A boxed zero-argument data-access operation.
pub type Task<T> = Box<dyn FnOnce() -> Result<T> + Send + 'static>;

/// Box an operation for [`Coordinator::run_concurrently`].
pub fn task<T, F>(op: F) -> Task<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
{
    Box::new(op)
}

/// Cancels every task of a run that is abandoned before its tasks settle.
struct CancelOnDrop {
    tokens: Vec<CancelToken>,
    armed: bool,
}

impl CancelOnDrop {
    fn new(count: usize) -> Self {
        Self {
            tokens: (0..count).map(|_| CancelToken::new()).collect(),
            armed: true,
        }
    }

    fn token(&self, index: usize) -> CancelToken {
        self.tokens.get(index).cloned().unwrap_or_default()
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!(tasks = self.tokens.len(), "Concurrent run abandoned, cancelling tasks");
            for token in &self.tokens {
                token.cancel();
            }
        }
    }
}

/// Launches data-access operations as concurrent tasks and joins them.
#[derive(Debug, Clone, Default)]
pub struct Coordinator {
    config: CoordinatorConfig,
    limiter: Option<Arc<Semaphore>>,
}

impl Coordinator {
    /// Unbounded concurrency, no timeout.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CoordinatorConfig) -> Result<Self> {
        config.validate()?;
        let limiter = config.max_concurrency.map(|n| Arc::new(Semaphore::new(n)));
        Ok(Self { config, limiter })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Run every task concurrently and collect the results in input order.
    ///
    /// An empty input yields an empty result.
    pub async fn run_concurrently<T>(&self, tasks: Vec<Task<T>>) -> Result<Vec<T>>
    where
        T: Send + 'static,
    {
        let started = Instant::now();
        let count = tasks.len();
        let cancel = CancelOnDrop::new(count);
        tracing::debug!(tasks = count, "Starting concurrent run");

        let settled = join_all(
            tasks
                .into_iter()
                .enumerate()
                .map(|(index, op)| self.spawn(index, op, cancel.token(index))),
        )
        .await;
        cancel.disarm();

        let mut results = Vec::with_capacity(count);
        let mut first_error = None;
        for (index, outcome) in settled.into_iter().enumerate() {
            match outcome {
                Ok(value) => results.push(value),
                Err(e) if first_error.is_none() => first_error = Some((index, e)),
                Err(e) => tracing::debug!(task = index, error = %e, "Additional task failure"),
            }
        }

        observe::record_coordinator_run(started.elapsed(), first_error.is_none());
        match first_error {
            Some((index, e)) => {
                tracing::warn!(task = index, tasks = count, error = %e, "Concurrent run failed");
                Err(e)
            }
            None => {
                tracing::debug!(
                    tasks = count,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Concurrent run completed"
                );
                Ok(results)
            }
        }
    }

    /// Run two operations with different result types concurrently.
    ///
    /// If both fail, the error from `a` is reported.
    pub async fn run_pair<A, B, FA, FB>(&self, a: FA, b: FB) -> Result<(A, B)>
    where
        A: Send + 'static,
        B: Send + 'static,
        FA: FnOnce() -> Result<A> + Send + 'static,
        FB: FnOnce() -> Result<B> + Send + 'static,
    {
        let started = Instant::now();
        let cancel = CancelOnDrop::new(2);
        let (ra, rb) = futures::join!(
            self.spawn(0, task(a), cancel.token(0)),
            self.spawn(1, task(b), cancel.token(1))
        );
        cancel.disarm();

        let outcome = match (ra, rb) {
            (Ok(a), Ok(b)) => Ok((a, b)),
            (Err(e), _) | (Ok(_), Err(e)) => Err(e),
        };
        observe::record_coordinator_run(started.elapsed(), outcome.is_ok());
        outcome
    }

    /// Materialize every query concurrently, each on its own scoped
    /// connection.
    pub async fn fetch_all_concurrently<S>(
        &self,
        source: S,
        queries: Vec<Query>,
    ) -> Result<Vec<Vec<Row>>>
    where
        S: DataSource + Clone + 'static,
    {
        let tasks = queries
            .into_iter()
            .map(|query| {
                let source = source.clone();
                task(move || fetch_all(&source, &query))
            })
            .collect();
        self.run_concurrently(tasks).await
    }

    async fn spawn<T>(&self, index: usize, op: Task<T>, token: CancelToken) -> Result<T>
    where
        T: Send + 'static,
    {
        let permit = match &self.limiter {
            Some(limiter) => Some(
                limiter
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|e| SluiceError::Internal(format!("Semaphore closed: {}", e)))?,
            ),
            None => None,
        };

        let task_token = token.clone();
        let mut handle = tokio::task::spawn_blocking(move || {
            // Released when the work returns, not when the caller stops waiting;
            // this also bounds open connections.
            let _permit = permit;
            task_token.check()?;
            task_token.scope(op)
        });

        let joined = match self.config.task_timeout_ms {
            Some(timeout_ms) => {
                match tokio::time::timeout(Duration::from_millis(timeout_ms), &mut handle).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        tracing::warn!(task = index, timeout_ms, "Task timed out, cancelling");
                        token.cancel();
                        if let Err(e) = handle.await {
                            tracing::debug!(task = index, error = %e, "Timed-out task failed");
                        }
                        return Err(SluiceError::transient(format!(
                            "task {} timed out after {}ms",
                            index, timeout_ms
                        )));
                    }
                }
            }
            None => handle.await,
        };

        joined.map_err(|e| SluiceError::TaskFailed(format!("task {}: {}", index, e)))?
    }
}
