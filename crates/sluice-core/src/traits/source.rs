use crate::error::Result;
use crate::types::{Batch, Query, Row};
use std::sync::Arc;

/// Rows pulled per round trip by [`Connection::fetch_all`].
const FETCH_ALL_CHUNK: usize = 256;

/// Forward-only cursor over the rows of one executed statement.
///
/// Implementations must not buffer more rows than a single call asks for.
pub trait Cursor: Send {
    /// Pull the next row. Returns `None` once the result is exhausted.
    fn next_row(&mut self) -> Result<Option<Row>>;

    /// Pull up to `max` rows.
    ///
    /// A short batch means the result is exhausted; an empty batch is only
    /// returned when no rows remain.
    fn next_batch(&mut self, max: usize) -> Result<Batch> {
        let mut batch = Vec::with_capacity(max);
        while batch.len() < max {
            match self.next_row()? {
                Some(row) => batch.push(row),
                None => break,
            }
        }
        Ok(batch)
    }
}

/// An open session with a tabular store.
///
/// A connection is owned by exactly one stream or wrapped invocation at a
/// time and is never shared between concurrent tasks. Implementations must
/// release the underlying handle on drop as well as on [`close`](Self::close).
pub trait Connection: Send {
    type Cursor: Cursor;

    /// Execute a statement that produces rows.
    ///
    /// Executing a new statement invalidates any cursor previously returned
    /// by this connection.
    fn execute(&mut self, query: &Query) -> Result<Self::Cursor>;

    /// Execute a statement that modifies data, returning the affected row count.
    fn execute_update(&mut self, query: &Query) -> Result<usize>;

    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Whether a transaction started with [`begin`](Self::begin) is open.
    fn in_transaction(&self) -> bool;

    /// Release the connection. Idempotent and never fails observably.
    fn close(&mut self);

    fn is_closed(&self) -> bool;

    /// Execute a statement and materialize every row it produces.
    fn fetch_all(&mut self, query: &Query) -> Result<Vec<Row>> {
        let mut cursor = self.execute(query)?;
        let mut rows = Vec::new();
        loop {
            let batch = cursor.next_batch(FETCH_ALL_CHUNK)?;
            if batch.is_empty() {
                break;
            }
            rows.extend(batch);
        }
        Ok(rows)
    }
}

/// Factory for connections to one tabular store.
pub trait DataSource: Send + Sync {
    type Connection: Connection;

    /// Open a new connection.
    ///
    /// Fails with [`SluiceError::Connection`](crate::SluiceError::Connection)
    /// when the store cannot be reached.
    fn open(&self) -> Result<Self::Connection>;
}

impl<S: DataSource + ?Sized> DataSource for &S {
    type Connection = S::Connection;

    fn open(&self) -> Result<Self::Connection> {
        (**self).open()
    }
}

impl<S: DataSource + ?Sized> DataSource for Arc<S> {
    type Connection = S::Connection;

    fn open(&self) -> Result<Self::Connection> {
        (**self).open()
    }
}
