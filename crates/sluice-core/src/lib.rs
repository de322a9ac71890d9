//! Sluice Core: traits and types shared by the sluice crates
//!
//! This crate defines the vocabulary for bounded-memory access to a
//! relational store:
//! - Data model: `Value`, `Row`, `Query`, `Batch`, `Page`
//! - DataSource / Connection / Cursor traits implemented by backends
//! - Configuration for streams, retry, caching and concurrent fetches
//! - The error taxonomy (connection, query, transient, config)
//! - Cooperative cancellation shared between coordinators and backends

pub mod cancel;
pub mod config;
pub mod error;
pub mod observe;
pub mod traits;
pub mod types;

pub use cancel::{CancelRegistration, CancelToken};
pub use config::{
    BackoffStrategy, CacheConfig, CoordinatorConfig, RetryConfig, RetryOn, SqliteConfig,
    StreamConfig, SynchronousMode, TransactionBehavior,
};
pub use error::{ErrorKind, Result, SluiceError};
pub use traits::{Connection, Cursor, DataSource};
pub use types::{Batch, CacheKey, Page, Query, Row, Value};
