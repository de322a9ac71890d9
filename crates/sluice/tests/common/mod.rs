//! Shared fixtures for the sluice integration tests

#![allow(dead_code)]

use sluice::{
    Connection, DataSource, Query, Result, Row, SluiceError, SqliteConnection, SqliteCursor,
    SqliteSource,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// A database with a single-column `ages` table holding `ages` in rowid order.
pub fn ages_db(ages: &[i64]) -> (TempDir, SqliteSource) {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("ages.db");

    let conn = rusqlite::Connection::open(&db_path).unwrap();
    conn.execute("CREATE TABLE ages (age INTEGER)", []).unwrap();
    for age in ages {
        conn.execute("INSERT INTO ages (age) VALUES (?1)", [age])
            .unwrap();
    }
    drop(conn);

    (temp_dir, SqliteSource::open_path(db_path))
}

/// A database with a `users` table seeded with three users.
pub fn users_db() -> (TempDir, SqliteSource) {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("users.db");

    let conn = rusqlite::Connection::open(&db_path).unwrap();
    conn.execute(
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            age INTEGER
        )",
        [],
    )
    .unwrap();
    for (id, name, email, age) in [
        (1, "Ada", "ada@example.com", 36),
        (2, "Grace", "grace@example.com", 45),
        (3, "Linus", "linus@example.com", 21),
    ] {
        conn.execute(
            "INSERT INTO users (id, name, email, age) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![id, name, email, age],
        )
        .unwrap();
    }
    drop(conn);

    (temp_dir, SqliteSource::open_path(db_path))
}

pub fn count_rows(source: &impl DataSource, table: &str) -> i64 {
    let rows = sluice::fetch_all(source, &Query::new(format!("SELECT COUNT(*) AS n FROM {}", table)))
        .unwrap();
    rows[0].get("n").and_then(|v| v.as_i64()).unwrap()
}

/// The `age` column of each row.
pub fn ages(rows: &[Row]) -> Vec<i64> {
    rows.iter()
        .map(|row| row.get("age").and_then(|v| v.as_i64()).unwrap())
        .collect()
}

#[derive(Debug, Default)]
struct Counters {
    opened: AtomicUsize,
    closed: AtomicUsize,
    fail_opens: AtomicUsize,
    fail_executes: AtomicUsize,
}

/// Decrement `counter` if positive; true when a failure should be injected.
fn take(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Wraps a [`SqliteSource`], counting connection opens and closes and
/// injecting transient failures on demand.
#[derive(Debug, Clone)]
pub struct TrackingSource {
    inner: SqliteSource,
    counters: Arc<Counters>,
}

impl TrackingSource {
    pub fn new(inner: SqliteSource) -> Self {
        Self {
            inner,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Successful opens so far.
    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// Connections opened and not yet closed.
    pub fn open_now(&self) -> usize {
        self.opened() - self.closed()
    }

    /// Make the next `n` opens fail with a transient error.
    pub fn fail_next_opens(&self, n: usize) {
        self.counters.fail_opens.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` statement executions fail with a transient error.
    pub fn fail_next_executes(&self, n: usize) {
        self.counters.fail_executes.store(n, Ordering::SeqCst);
    }
}

impl DataSource for TrackingSource {
    type Connection = TrackedConnection;

    fn open(&self) -> Result<TrackedConnection> {
        if take(&self.counters.fail_opens) {
            return Err(SluiceError::transient("injected open failure"));
        }
        let inner = self.inner.open()?;
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(TrackedConnection {
            inner,
            counters: self.counters.clone(),
            closed: false,
        })
    }
}

pub struct TrackedConnection {
    inner: SqliteConnection,
    counters: Arc<Counters>,
    closed: bool,
}

impl TrackedConnection {
    fn check_execute(&self) -> Result<()> {
        if take(&self.counters.fail_executes) {
            return Err(SluiceError::transient("injected execute failure"));
        }
        Ok(())
    }
}

impl Connection for TrackedConnection {
    type Cursor = SqliteCursor;

    fn execute(&mut self, query: &Query) -> Result<SqliteCursor> {
        self.check_execute()?;
        self.inner.execute(query)
    }

    fn execute_update(&mut self, query: &Query) -> Result<usize> {
        self.check_execute()?;
        self.inner.execute_update(query)
    }

    fn begin(&mut self) -> Result<()> {
        self.inner.begin()
    }

    fn commit(&mut self) -> Result<()> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<()> {
        self.inner.rollback()
    }

    fn in_transaction(&self) -> bool {
        self.inner.in_transaction()
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.inner.close();
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for TrackedConnection {
    fn drop(&mut self) {
        self.close();
    }
}
