//! Query logging
//!
//! Runs an operation inside a `query` span that carries the statement text,
//! then reports how long it took and whether it succeeded.

use sluice_core::{Query, Result};
use std::time::Instant;

/// Run `op` once under a `query` span for `query`.
pub fn run_logged<T, F>(query: &Query, op: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let span = tracing::debug_span!("query", sql = %query.sql(), params = query.params().len());
    let _entered = span.enter();

    tracing::debug!("Executing query");
    let started = Instant::now();
    let result = op();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match &result {
        Ok(_) => tracing::debug!(elapsed_ms, "Query completed"),
        Err(e) => tracing::warn!(elapsed_ms, error = %e, "Query failed"),
    }
    result
}

/// Wrap `op` so every call is logged against `query`.
pub fn log_queries<T, F>(query: Query, mut op: F) -> impl FnMut() -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    move || run_logged(&query, &mut op)
}
