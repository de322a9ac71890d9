use sluice_core::{observe, Connection, DataSource, Page, Query, Result, SluiceError};
use std::iter::FusedIterator;

/// Build `SELECT * FROM "table"` with every identifier part quoted.
///
/// Schema-qualified names (`main.users`) are split on the first dot.
pub(crate) fn table_query(table: &str) -> Result<Query> {
    let table = table.trim();
    if table.is_empty() {
        return Err(SluiceError::config("table name must not be empty"));
    }
    let quoted = match table.split_once('.') {
        Some((schema, name)) if !schema.is_empty() && !name.is_empty() => {
            format!("{}.{}", quote_identifier(schema), quote_identifier(name))
        }
        _ => quote_identifier(table),
    };
    Ok(Query::new(format!("SELECT * FROM {}", quoted)))
}

fn quote_identifier(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Append `LIMIT ? OFFSET ?` to a base query, binding both values after the
/// base query's own parameters.
///
/// The base statement must not carry its own LIMIT clause.
pub(crate) fn page_query(base: &Query, page_size: usize, offset: u64) -> Result<Query> {
    let sql = base.sql().trim().trim_end_matches(';').trim_end();
    if sql.is_empty() {
        return Err(SluiceError::config("base query must not be empty"));
    }
    let limit = i64::try_from(page_size)
        .map_err(|_| SluiceError::config(format!("page_size {} is too large", page_size)))?;
    let offset = i64::try_from(offset)
        .map_err(|_| SluiceError::config(format!("offset {} is too large", offset)))?;

    Ok(Query::with_params(
        format!("{} LIMIT ? OFFSET ?", sql),
        base.params().iter().cloned(),
    )
    .bind(limit)
    .bind(offset))
}

/// Materialize one page on its own short-lived connection.
pub(crate) fn fetch_page<S>(source: &S, base: &Query, page_size: usize, offset: u64) -> Result<Page>
where
    S: DataSource + ?Sized,
{
    let query = page_query(base, page_size, offset)?;
    let mut conn = source.open()?;
    let result = conn.fetch_all(&query);
    conn.close();
    let rows = result?;

    tracing::debug!(offset, page_size, rows = rows.len(), "Fetched page");
    Ok(Page::new(offset, page_size, rows))
}

/// Lazy stream of `LIMIT`/`OFFSET` pages.
///
/// No connection is held between pulls: each page is an independent
/// statement execution. The stream ends on the first empty page.
pub struct PageStream<'a, S: DataSource + ?Sized> {
    source: &'a S,
    base: Query,
    page_size: usize,
    next_offset: u64,
    done: bool,
    rows: usize,
}

impl<'a, S: DataSource + ?Sized> PageStream<'a, S> {
    pub(crate) fn new(source: &'a S, base: Query, page_size: usize) -> Self {
        Self {
            source,
            base,
            page_size,
            next_offset: 0,
            done: false,
            rows: 0,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Offset the next pull will fetch from.
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    fn finish(&mut self) {
        if !self.done {
            self.done = true;
            observe::record_rows_streamed(self.rows);
        }
    }
}

impl<'a, S: DataSource + ?Sized> Iterator for PageStream<'a, S> {
    type Item = Result<Page>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match fetch_page(self.source, &self.base, self.page_size, self.next_offset) {
            Ok(page) if page.is_empty() => {
                self.finish();
                None
            }
            Ok(page) => {
                self.rows += page.len();
                self.next_offset = page.next_offset();
                Some(Ok(page))
            }
            Err(e) => {
                self.finish();
                Some(Err(e))
            }
        }
    }
}

impl<'a, S: DataSource + ?Sized> FusedIterator for PageStream<'a, S> {}
