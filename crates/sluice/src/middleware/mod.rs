//! Reliability middleware
//!
//! Wrappers around a data-access operation, each usable on its own:
//!
//! - [`ConnectionScope`] / [`with_connection`]: open a connection per call and
//!   always release it
//! - [`transactional`] / [`run_in_transaction`]: commit on success, roll back
//!   on failure
//! - [`RetryPolicy`]: re-run failed attempts
//! - [`QueryCache`]: serve repeated queries from memory
//! - [`log_queries`]: trace each call
//!
//! [`Pipeline`] composes them in the one order that keeps every layer sound.

pub mod cache;
pub mod connection;
pub mod logging;
pub mod pipeline;
pub mod retry;
pub mod transaction;

pub use cache::{CacheStats, QueryCache, ResultCache};
pub use connection::{fetch_all, with_connection, ConnectionScope};
pub use logging::{log_queries, run_logged};
pub use pipeline::Pipeline;
pub use retry::RetryPolicy;
pub use transaction::{run_in_transaction, transactional, TransactionGuard};
