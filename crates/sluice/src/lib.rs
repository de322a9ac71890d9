//! Sluice: bounded-memory streaming and reliable access to a relational store
//!
//! Sluice provides:
//! - **Lazy iteration**: row, batch, paginated and aggregate streams whose
//!   memory use is bounded by the chunk size, not the result size
//! - **Middleware**: connection scoping, transactions, retry with backoff,
//!   result caching and query logging, composed in a fixed order
//! - **Concurrent fetches**: independent queries run as concurrent tasks and
//!   joined in input order
//! - **SQLite backend**: a `DataSource` built on `rusqlite`
//!
//! # Quick Start
//!
//! ```no_run
//! use sluice::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let source = SqliteSource::open_path("./users.db");
//!
//! // Stream rows in batches of 100
//! let engine = StreamEngine::new(source.clone());
//! for batch in engine.batch_stream(&Query::new("SELECT * FROM users"), 100)? {
//!     println!("batch of {}", batch?.len());
//! }
//!
//! // Cached, retried read on a scoped connection
//! let query = Query::new("SELECT * FROM users WHERE age > ?").bind(25);
//! let users = Pipeline::new(&source)
//!     .cached(QueryCache::global(), query.clone())
//!     .retry(RetryPolicy::default())
//!     .run(|conn| conn.fetch_all(&query))?;
//! println!("{} users over 25", users.len());
//! # Ok(())
//! # }
//! ```

pub mod concurrent;
pub mod middleware;
pub mod prelude;
pub mod stream;

// Re-export core types
pub use sluice_core::{
    cancel::{CancelRegistration, CancelToken},
    config::{
        BackoffStrategy, CacheConfig, CoordinatorConfig, RetryConfig, RetryOn, SqliteConfig,
        StreamConfig, SynchronousMode, TransactionBehavior,
    },
    error::{ErrorKind, Result, SluiceError},
    traits::{Connection, Cursor, DataSource},
    types::{Batch, CacheKey, Page, Query, Row, Value},
};

// Re-export implementations
pub use sluice_sqlite::{SqliteConnection, SqliteCursor, SqliteSource};

// Re-export main types from this crate
pub use concurrent::{task, Coordinator, Task};
pub use middleware::{
    fetch_all, log_queries, run_in_transaction, transactional, with_connection, CacheStats,
    ConnectionScope, Pipeline, QueryCache, ResultCache, RetryPolicy, TransactionGuard,
};
pub use stream::{
    BatchStream, FilteredBatches, PageStream, RowStream, RunningAverage, ScalarStream,
    StreamEngine,
};
