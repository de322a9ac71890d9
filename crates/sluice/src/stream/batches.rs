use super::rows::OpenCursor;
use sluice_core::{observe, Batch, Connection, Cursor, Result, Row};
use std::iter::FusedIterator;

/// Lazy stream of fixed-size batches from one statement execution.
///
/// Every batch except possibly the last holds exactly `batch_size` rows.
/// The stream ends on the first empty pull.
pub struct BatchStream<C: Connection> {
    open: Option<OpenCursor<C>>,
    batch_size: usize,
    batches: usize,
    rows: usize,
}

impl<C: Connection> BatchStream<C> {
    pub(crate) fn new(open: OpenCursor<C>, batch_size: usize) -> Self {
        Self {
            open: Some(open),
            batch_size,
            batches: 0,
            rows: 0,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn is_finished(&self) -> bool {
        self.open.is_none()
    }

    /// Apply `predicate` to every row, keeping batch boundaries.
    ///
    /// Batches left empty by the filter are skipped.
    pub fn filter_rows<P>(self, predicate: P) -> FilteredBatches<C, P>
    where
        P: FnMut(&Row) -> bool,
    {
        FilteredBatches {
            inner: self,
            predicate,
        }
    }

    fn finish(&mut self) {
        if let Some(open) = self.open.take() {
            open.close();
            observe::record_rows_streamed(self.rows);
            tracing::debug!(
                batches = self.batches,
                rows = self.rows,
                batch_size = self.batch_size,
                "Batch stream finished"
            );
        }
    }
}

impl<C: Connection> Iterator for BatchStream<C> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let open = self.open.as_mut()?;
        match open.cursor.next_batch(self.batch_size) {
            Ok(batch) if batch.is_empty() => {
                self.finish();
                None
            }
            Ok(batch) => {
                self.batches += 1;
                self.rows += batch.len();
                Some(Ok(batch))
            }
            Err(e) => {
                self.finish();
                Some(Err(e))
            }
        }
    }
}

impl<C: Connection> FusedIterator for BatchStream<C> {}

impl<C: Connection> Drop for BatchStream<C> {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Batch stream with a row predicate applied to each batch.
pub struct FilteredBatches<C: Connection, P> {
    inner: BatchStream<C>,
    predicate: P,
}

impl<C, P> Iterator for FilteredBatches<C, P>
where
    C: Connection,
    P: FnMut(&Row) -> bool,
{
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok(mut batch) => {
                    batch.retain(|row| (self.predicate)(row));
                    if !batch.is_empty() {
                        return Some(Ok(batch));
                    }
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl<C: Connection, P: FnMut(&Row) -> bool> FusedIterator for FilteredBatches<C, P> {}
