//! Middleware composition
//!
//! [`Pipeline`] assembles the wrappers around a connection-taking operation
//! in one fixed order, outermost first:
//!
//! 1. query logging
//! 2. result cache (a hit skips everything below)
//! 3. retry policy (each attempt re-enters everything below)
//! 4. connection scope (a fresh connection per attempt)
//! 5. transaction scope (rolled back before the next attempt)
//!
//! Layers that are not configured are skipped; the order of the builder calls
//! does not change the order of the layers.

use super::cache::QueryCache;
use super::connection::ConnectionScope;
use super::logging::run_logged;
use super::retry::RetryPolicy;
use super::transaction::run_in_transaction;
use sluice_core::{DataSource, Query, Result};

/// Builder for a middleware-wrapped data-access operation.
///
/// # Example
///
/// ```no_run
/// use sluice::prelude::*;
/// use std::time::Duration;
///
/// # fn main() -> Result<()> {
/// let source = SqliteSource::open_path("./users.db");
/// let update = Query::new("UPDATE users SET email = ? WHERE id = ?")
///     .bind("ada@example.com")
///     .bind(1);
///
/// let changed = Pipeline::new(&source)
///     .transactional()
///     .retry(RetryPolicy::new(3, Duration::from_millis(200))?)
///     .logged(update.clone())
///     .run(|conn| conn.execute_update(&update))?;
/// assert!(changed <= 1);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<'a, S, T> {
    scope: ConnectionScope<S>,
    transactional: bool,
    retry: Option<RetryPolicy>,
    cache: Option<(&'a QueryCache<T>, Query)>,
    log: Option<Query>,
}

impl<'a, S, T> Pipeline<'a, S, T>
where
    S: DataSource,
    T: Clone,
{
    /// A pipeline that only scopes a connection around the operation.
    pub fn new(source: S) -> Self {
        Self {
            scope: ConnectionScope::new(source),
            transactional: false,
            retry: None,
            cache: None,
            log: None,
        }
    }

    /// Run the operation inside a transaction.
    pub fn transactional(mut self) -> Self {
        self.transactional = true;
        self
    }

    /// Re-run failed attempts under `policy`.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Serve results for `query` from `cache`.
    pub fn cached(mut self, cache: &'a QueryCache<T>, query: Query) -> Self {
        self.cache = Some((cache, query));
        self
    }

    /// Log each run under a span for `query`.
    pub fn logged(mut self, query: Query) -> Self {
        self.log = Some(query);
        self
    }

    /// Run `op` through every configured layer.
    pub fn run<F>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(&mut S::Connection) -> Result<T>,
    {
        let transactional = self.transactional;

        let mut attempt = || {
            self.scope.run(|conn| {
                if transactional {
                    run_in_transaction(conn, &mut op)
                } else {
                    op(conn)
                }
            })
        };

        let mut retried = || match &self.retry {
            Some(policy) => policy.run(&mut attempt),
            None => attempt(),
        };

        let mut cached = || match &self.cache {
            Some((cache, query)) => cache.get_or_compute(query, &mut retried),
            None => retried(),
        };

        match &self.log {
            Some(query) => run_logged(query, cached),
            None => cached(),
        }
    }

    /// Bind `op` to this pipeline, producing a zero-argument operation.
    pub fn into_operation<F>(self, mut op: F) -> impl FnMut() -> Result<T> + 'a
    where
        S: 'a,
        T: 'a,
        F: FnMut(&mut S::Connection) -> Result<T> + 'a,
    {
        move || self.run(&mut op)
    }
}
