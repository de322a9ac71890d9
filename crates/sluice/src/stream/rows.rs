use sluice_core::{observe, Connection, Cursor, DataSource, Query, Result, Row};
use std::iter::FusedIterator;

/// A connection together with the one cursor it is serving.
///
/// Field order matters: the cursor is dropped before its connection.
pub(crate) struct OpenCursor<C: Connection> {
    pub(crate) cursor: C::Cursor,
    conn: C,
}

impl<C: Connection> OpenCursor<C> {
    pub(crate) fn open<S>(source: &S, query: &Query) -> Result<Self>
    where
        S: DataSource<Connection = C> + ?Sized,
    {
        let mut conn = source.open()?;
        // On failure `conn` is dropped here, which closes it.
        let cursor = conn.execute(query)?;
        Ok(Self { cursor, conn })
    }

    pub(crate) fn close(self) {
        let OpenCursor { cursor, mut conn } = self;
        drop(cursor);
        conn.close();
    }
}

/// Lazy stream of single rows from one statement execution.
///
/// Holds exactly one connection from creation until the result is exhausted,
/// a pull fails, or the stream is dropped.
pub struct RowStream<C: Connection> {
    open: Option<OpenCursor<C>>,
    yielded: usize,
}

impl<C: Connection> RowStream<C> {
    pub(crate) fn new(open: OpenCursor<C>) -> Self {
        Self {
            open: Some(open),
            yielded: 0,
        }
    }

    /// Rows handed out so far.
    pub fn rows_yielded(&self) -> usize {
        self.yielded
    }

    /// Whether the connection has been released.
    pub fn is_finished(&self) -> bool {
        self.open.is_none()
    }

    /// Release the connection without pulling the remaining rows.
    pub fn close(&mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if let Some(open) = self.open.take() {
            open.close();
            observe::record_rows_streamed(self.yielded);
            tracing::debug!(rows = self.yielded, "Row stream finished");
        }
    }
}

impl<C: Connection> Iterator for RowStream<C> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let open = self.open.as_mut()?;
        match open.cursor.next_row() {
            Ok(Some(row)) => {
                self.yielded += 1;
                Some(Ok(row))
            }
            Ok(None) => {
                self.finish();
                None
            }
            Err(e) => {
                self.finish();
                Some(Err(e))
            }
        }
    }
}

impl<C: Connection> FusedIterator for RowStream<C> {}

impl<C: Connection> Drop for RowStream<C> {
    fn drop(&mut self) {
        self.finish();
    }
}
