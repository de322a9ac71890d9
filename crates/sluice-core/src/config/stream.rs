use crate::error::{Result, SluiceError};
use serde::{Deserialize, Serialize};

/// Chunk sizes for the lazy iteration strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Rows pulled per step by batch streams (default: 1000)
    ///
    /// Memory held by a batch stream is bounded by this many rows.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Rows per `LIMIT`/`OFFSET` page (default: 100)
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_batch_size() -> usize {
    1000
}

fn default_page_size() -> usize {
    100
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            page_size: default_page_size(),
        }
    }
}

impl StreamConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Reject zero-sized chunks.
    pub fn validate(&self) -> Result<()> {
        validate_batch_size(self.batch_size)?;
        validate_page_size(self.page_size)
    }
}

pub fn validate_batch_size(batch_size: usize) -> Result<()> {
    if batch_size == 0 {
        return Err(SluiceError::config("batch_size must be at least 1"));
    }
    Ok(())
}

pub fn validate_page_size(page_size: usize) -> Result<()> {
    if page_size == 0 {
        return Err(SluiceError::config("page_size must be at least 1"));
    }
    Ok(())
}
