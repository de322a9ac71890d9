use crate::conn::SqliteConnection;
use sluice_core::{DataSource, Result, SqliteConfig};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// SQLite-backed data source
///
/// Cheap to clone; clones share the configuration and the connection id
/// counter. Every [`open`](DataSource::open) creates an independent
/// connection, so concurrent tasks never share one.
#[derive(Clone)]
pub struct SqliteSource {
    config: Arc<SqliteConfig>,
    next_id: Arc<AtomicU64>,
}

impl SqliteSource {
    pub fn new(config: SqliteConfig) -> Self {
        Self {
            config: Arc::new(config),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Source with default settings for the database at `path`.
    pub fn open_path(path: impl AsRef<Path>) -> Self {
        Self::new(SqliteConfig::new(path.as_ref()))
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// Get the database path
    pub fn path(&self) -> &Path {
        &self.config.path
    }
}

impl DataSource for SqliteSource {
    type Connection = SqliteConnection;

    fn open(&self) -> Result<SqliteConnection> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        SqliteConnection::open(&self.config, id)
    }
}

impl std::fmt::Debug for SqliteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSource")
            .field("path", &self.config.path)
            .field("read_only", &self.config.read_only)
            .finish()
    }
}
