//! Scoped connection acquisition

use sluice_core::{Connection, DataSource, Query, Result, Row};

/// Opens a fresh connection per invocation and closes it on every exit path.
///
/// Panics unwinding out of the operation drop the connection, which releases
/// it as well.
#[derive(Debug, Clone)]
pub struct ConnectionScope<S> {
    source: S,
}

impl<S: DataSource> ConnectionScope<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run `op` against a newly opened connection.
    pub fn run<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut S::Connection) -> Result<T>,
    {
        let mut conn = self.source.open()?;
        tracing::trace!("Connection acquired");
        let result = op(&mut conn);
        conn.close();
        tracing::trace!(ok = result.is_ok(), "Connection released");
        result
    }

    /// Turn a connection-taking operation into one that takes no connection.
    pub fn wrap<T, F>(self, mut op: F) -> impl FnMut() -> Result<T>
    where
        F: FnMut(&mut S::Connection) -> Result<T>,
    {
        move || self.run(&mut op)
    }
}

/// Shorthand for `ConnectionScope::new(source).wrap(op)`.
pub fn with_connection<S, T, F>(source: S, op: F) -> impl FnMut() -> Result<T>
where
    S: DataSource,
    F: FnMut(&mut S::Connection) -> Result<T>,
{
    ConnectionScope::new(source).wrap(op)
}

/// Execute `query` on a scoped connection and materialize every row.
pub fn fetch_all<S>(source: &S, query: &Query) -> Result<Vec<Row>>
where
    S: DataSource + ?Sized,
{
    ConnectionScope::new(source).run(|conn| conn.fetch_all(query))
}
