use super::row::Row;
use serde::{Deserialize, Serialize};

/// A bounded group of consecutively fetched rows.
pub type Batch = Vec<Row>;

/// Rows materialized from one `LIMIT page_size OFFSET offset` execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    offset: u64,
    page_size: usize,
    rows: Vec<Row>,
}

impl Page {
    pub fn new(offset: u64, page_size: usize, rows: Vec<Row>) -> Self {
        Self {
            offset,
            page_size,
            rows,
        }
    }

    /// Offset of the first row of this page within the full result.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Offset the following page starts at.
    pub fn next_offset(&self) -> u64 {
        self.offset + self.page_size as u64
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl IntoIterator for Page {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
