//! Lazy iteration engine
//!
//! Four forward-only strategies over a [`DataSource`], each bounded in memory
//! by its chunk size regardless of how large the result is:
//!
//! - [`StreamEngine::row_stream`]: one row per pull on a held cursor
//! - [`StreamEngine::batch_stream`]: `batch_size` rows per pull on a held cursor
//! - [`StreamEngine::paginated_stream`]: one `LIMIT`/`OFFSET` statement per pull
//! - [`StreamEngine::aggregate_stream`]: one column's values, foldable into
//!   an average, sum or count
//!
//! Streams that hold a cursor own their connection and release it when the
//! result is exhausted, when a pull fails, or when the stream is dropped.
//!
//! # Example
//!
//! ```no_run
//! use sluice::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let engine = StreamEngine::new(SqliteSource::open_path("./users.db"));
//!
//! for batch in engine.batch_stream(&Query::new("SELECT * FROM users"), 50)? {
//!     let batch = batch?;
//!     println!("{} users", batch.len());
//! }
//!
//! let average = engine
//!     .aggregate_stream("age", &Query::new("SELECT age FROM users"))?
//!     .average()?;
//! println!("average age: {:.2}", average);
//! # Ok(())
//! # }
//! ```

mod aggregate;
mod batches;
mod pages;
mod rows;

pub use aggregate::{RunningAverage, ScalarStream};
pub use batches::{BatchStream, FilteredBatches};
pub use pages::PageStream;
pub use rows::RowStream;

use rows::OpenCursor;
use sluice_core::config::stream::{validate_batch_size, validate_page_size};
use sluice_core::{DataSource, Page, Query, Result, StreamConfig};

/// Entry point for the lazy iteration strategies over one data source.
#[derive(Debug, Clone)]
pub struct StreamEngine<S> {
    source: S,
    config: StreamConfig,
}

impl<S: DataSource> StreamEngine<S> {
    /// Create an engine with the default chunk sizes.
    pub fn new(source: S) -> Self {
        Self {
            source,
            config: StreamConfig::default(),
        }
    }

    /// Create an engine with explicit default chunk sizes.
    pub fn with_config(source: S, config: StreamConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { source, config })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Stream single rows. The connection is opened and the statement
    /// executed before this returns.
    pub fn row_stream(&self, query: &Query) -> Result<RowStream<S::Connection>> {
        tracing::debug!(sql = %query.sql(), "Opening row stream");
        Ok(RowStream::new(OpenCursor::open(&self.source, query)?))
    }

    /// Stream batches of `batch_size` rows.
    ///
    /// Fails with a configuration error before touching the store when
    /// `batch_size` is zero.
    pub fn batch_stream(
        &self,
        query: &Query,
        batch_size: usize,
    ) -> Result<BatchStream<S::Connection>> {
        validate_batch_size(batch_size)?;
        tracing::debug!(sql = %query.sql(), batch_size, "Opening batch stream");
        Ok(BatchStream::new(
            OpenCursor::open(&self.source, query)?,
            batch_size,
        ))
    }

    /// [`batch_stream`](Self::batch_stream) with the configured batch size.
    pub fn batches(&self, query: &Query) -> Result<BatchStream<S::Connection>> {
        self.batch_stream(query, self.config.batch_size)
    }

    /// Page through every row of `table`, `page_size` rows at a time.
    ///
    /// Nothing is executed until the first pull.
    pub fn paginated_stream(&self, table: &str, page_size: usize) -> Result<PageStream<'_, S>> {
        self.paginated_query(pages::table_query(table)?, page_size)
    }

    /// Page through the rows of an arbitrary base query.
    pub fn paginated_query(&self, base: Query, page_size: usize) -> Result<PageStream<'_, S>> {
        validate_page_size(page_size)?;
        tracing::debug!(sql = %base.sql(), page_size, "Opening paginated stream");
        Ok(PageStream::new(&self.source, base, page_size))
    }

    /// [`paginated_stream`](Self::paginated_stream) with the configured page size.
    pub fn pages(&self, table: &str) -> Result<PageStream<'_, S>> {
        self.paginated_stream(table, self.config.page_size)
    }

    /// Fetch the single page of `table` starting at `offset`.
    pub fn fetch_page(&self, table: &str, page_size: usize, offset: u64) -> Result<Page> {
        self.fetch_query_page(&pages::table_query(table)?, page_size, offset)
    }

    /// Fetch the single page of `base` starting at `offset`.
    pub fn fetch_query_page(&self, base: &Query, page_size: usize, offset: u64) -> Result<Page> {
        validate_page_size(page_size)?;
        pages::fetch_page(&self.source, base, page_size, offset)
    }

    /// Stream the values of `column` from each row of `query`.
    pub fn aggregate_stream(
        &self,
        column: &str,
        query: &Query,
    ) -> Result<ScalarStream<S::Connection>> {
        Ok(ScalarStream::new(self.row_stream(query)?, column.to_string()))
    }
}
