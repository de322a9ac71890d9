//! Optional metrics instrumentation for sluice.
//!
//! When the `observe` feature is enabled, key operations emit counters,
//! histograms, and gauges via the [`metrics`] crate. A downstream
//! application must install a metrics recorder (e.g. `metrics-exporter-prometheus`)
//! to collect the data.
//!
//! When the feature is **not** enabled every function in this module is a
//! zero-cost no-op.

/// Record a result cache hit or miss.
///
/// - `sluice.cache.lookups_total` – counter with `result` label (`hit` / `miss`)
#[inline]
pub fn record_cache_lookup(hit: bool) {
    #[cfg(feature = "observe")]
    {
        let result = if hit { "hit" } else { "miss" };
        metrics::counter!("sluice.cache.lookups_total", "result" => result).increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = hit;
    }
}

/// Set the current result cache size gauge.
///
/// - `sluice.cache.size` – gauge
#[inline]
pub fn set_cache_size(size: usize) {
    #[cfg(feature = "observe")]
    {
        metrics::gauge!("sluice.cache.size").set(size as f64);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = size;
    }
}

/// Record a failed attempt that is about to be retried.
///
/// - `sluice.retry.attempts_total` – counter
#[inline]
pub fn record_retry() {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("sluice.retry.attempts_total").increment(1);
    }
}

/// Record the outcome of a transaction scope (counter + duration).
///
/// - `sluice.transaction.total` – counter with `outcome` label (`commit` / `rollback`)
/// - `sluice.transaction.duration_seconds` – histogram
#[inline]
pub fn record_transaction(duration: std::time::Duration, committed: bool) {
    #[cfg(feature = "observe")]
    {
        let outcome = if committed { "commit" } else { "rollback" };
        metrics::counter!("sluice.transaction.total", "outcome" => outcome).increment(1);
        metrics::histogram!("sluice.transaction.duration_seconds").record(duration.as_secs_f64());
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (duration, committed);
    }
}

/// Record rows handed to a stream consumer.
///
/// - `sluice.stream.rows_total` – counter
#[inline]
pub fn record_rows_streamed(rows: usize) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("sluice.stream.rows_total").increment(rows as u64);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = rows;
    }
}

/// Record a concurrent fetch run (counter + duration).
///
/// - `sluice.coordinator.runs_total` – counter with `outcome` label
/// - `sluice.coordinator.run_duration_seconds` – histogram
#[inline]
pub fn record_coordinator_run(duration: std::time::Duration, success: bool) {
    #[cfg(feature = "observe")]
    {
        let outcome = if success { "ok" } else { "fail" };
        metrics::counter!("sluice.coordinator.runs_total", "outcome" => outcome).increment(1);
        metrics::histogram!("sluice.coordinator.run_duration_seconds")
            .record(duration.as_secs_f64());
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (duration, success);
    }
}
