//! Sluice Prelude
//!
//! Import this to get all commonly used types and traits:
//!
//! ```
//! use sluice::prelude::*;
//! ```

// Core types
pub use crate::{Batch, ErrorKind, Page, Query, Result, Row, SluiceError, Value};

// Configs
pub use crate::{
    BackoffStrategy, CacheConfig, CoordinatorConfig, RetryConfig, RetryOn, SqliteConfig,
    StreamConfig,
};

// Traits
pub use crate::{Connection, Cursor, DataSource};

// Implementations
pub use crate::SqliteSource;

// Streams
pub use crate::{RunningAverage, StreamEngine};

// Middleware
pub use crate::{
    fetch_all, run_in_transaction, transactional, with_connection, ConnectionScope, Pipeline,
    QueryCache, RetryPolicy,
};

// Concurrency
pub use crate::{task, CancelToken, Coordinator};
