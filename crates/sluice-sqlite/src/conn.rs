//! SQLite connection handle
//!
//! Every connection is owned by a dedicated worker thread. The handle talks
//! to it over a command channel, which lets a prepared statement (and its
//! cursor position) stay alive between pulls without the caller holding a
//! borrow of the underlying `rusqlite::Connection`. The worker steps the
//! statement only when asked, so nothing is read ahead of the caller.
//!
//! A connection opened inside a [`CancelToken`] scope is interrupted when
//! that token is cancelled: the running statement fails with
//! [`SluiceError::Cancelled`] and every later request on the connection is
//! refused the same way.

use crate::convert::{classify, classify_open, read_row, to_sql};
use rusqlite::{params_from_iter, InterruptHandle, OpenFlags};
use sluice_core::{
    Batch, CancelRegistration, CancelToken, Connection, Cursor, Query, Result, Row, SluiceError,
    SqliteConfig,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

type Reply<T> = SyncSender<Result<T>>;

// VM instructions between interrupt-flag checks.
const PROGRESS_OPS: i32 = 1000;

enum Command {
    Query { query: Query, reply: Reply<u64> },
    Fetch { cursor: u64, max: usize, reply: Reply<Batch> },
    Update { query: Query, reply: Reply<usize> },
    Batch { sql: &'static str, reply: Reply<()> },
    Close,
}

fn worker_gone() -> SluiceError {
    SluiceError::connection("SQLite connection worker is not running")
}

fn request<T>(commands: &Sender<Command>, build: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
    let (reply_tx, reply_rx) = mpsc::sync_channel(1);
    commands.send(build(reply_tx)).map_err(|_| worker_gone())?;
    reply_rx.recv().map_err(|_| worker_gone())?
}

/// Stops the statement running on a connection and poisons the connection
/// for later requests.
struct Interrupter {
    flag: Arc<AtomicBool>,
    handle: InterruptHandle,
}

impl Interrupter {
    fn interrupt(&self) {
        // The flag covers the window where no statement is running, which
        // sqlite3_interrupt alone would miss.
        self.flag.store(true, Ordering::Release);
        self.handle.interrupt();
    }
}

/// An open SQLite connection
pub struct SqliteConnection {
    id: u64,
    commands: Option<Sender<Command>>,
    worker: Option<JoinHandle<()>>,
    interrupter: Arc<Interrupter>,
    _cancel: Option<CancelRegistration>,
    begin_sql: &'static str,
    in_txn: bool,
}

impl SqliteConnection {
    pub(crate) fn open(config: &SqliteConfig, id: u64) -> Result<Self> {
        let token = CancelToken::current();
        if let Some(token) = &token {
            token.check()?;
        }

        let (commands, inbox) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<InterruptHandle>>(1);
        let cfg = config.clone();
        let flag = Arc::new(AtomicBool::new(false));
        let worker_flag = flag.clone();

        let worker = thread::Builder::new()
            .name(format!("sluice-sqlite-{}", id))
            .spawn(move || {
                let conn = match open_connection(&cfg) {
                    Ok(conn) => conn,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let progress_flag = worker_flag.clone();
                conn.progress_handler(
                    PROGRESS_OPS,
                    Some(move || progress_flag.load(Ordering::Acquire)),
                );
                if ready_tx.send(Ok(conn.get_interrupt_handle())).is_err() {
                    return;
                }
                Worker::new(conn, worker_flag).run(inbox);
            })
            .map_err(|e| SluiceError::Connection(format!("cannot spawn connection worker: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(handle)) => {
                tracing::debug!(conn = id, path = %config.path.display(), "SQLite connection opened");
                let interrupter = Arc::new(Interrupter { flag, handle });
                let cancel = token.map(|token| {
                    let interrupter = interrupter.clone();
                    token.on_cancel(move || {
                        tracing::debug!(conn = id, "Cancellation requested, interrupting connection");
                        interrupter.interrupt();
                    })
                });
                Ok(Self {
                    id,
                    commands: Some(commands),
                    worker: Some(worker),
                    interrupter,
                    _cancel: cancel,
                    begin_sql: config.transaction_behavior.begin_statement(),
                    in_txn: false,
                })
            }
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                Err(worker_gone())
            }
        }
    }

    /// Identifier used in log records for this connection.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Abort the running statement, if any, and refuse further statements.
    ///
    /// The interrupted request fails with [`SluiceError::Cancelled`]. The
    /// connection can still be closed, which discards an open transaction.
    pub fn interrupt(&self) {
        self.interrupter.interrupt();
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupter.flag.load(Ordering::Acquire)
    }

    fn commands(&self) -> Result<&Sender<Command>> {
        self.commands
            .as_ref()
            .ok_or_else(|| SluiceError::connection("connection is closed"))
    }

    fn run_batch(&self, sql: &'static str) -> Result<()> {
        request(self.commands()?, |reply| Command::Batch { sql, reply })
    }
}

impl Connection for SqliteConnection {
    type Cursor = SqliteCursor;

    fn execute(&mut self, query: &Query) -> Result<SqliteCursor> {
        let commands = self.commands()?;
        let id = request(commands, |reply| Command::Query {
            query: query.clone(),
            reply,
        })?;
        Ok(SqliteCursor {
            commands: commands.clone(),
            id,
            exhausted: false,
        })
    }

    fn execute_update(&mut self, query: &Query) -> Result<usize> {
        request(self.commands()?, |reply| Command::Update {
            query: query.clone(),
            reply,
        })
    }

    fn begin(&mut self) -> Result<()> {
        if self.in_txn {
            return Err(SluiceError::Transaction(
                "a transaction is already open on this connection".into(),
            ));
        }
        self.run_batch(self.begin_sql)?;
        self.in_txn = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if !self.in_txn {
            return Err(SluiceError::Transaction("no open transaction to commit".into()));
        }
        // A failed COMMIT leaves the transaction open so the caller can roll back.
        self.run_batch("COMMIT")?;
        self.in_txn = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if !self.in_txn {
            return Ok(());
        }
        self.in_txn = false;
        self.run_batch("ROLLBACK")
    }

    fn in_transaction(&self) -> bool {
        self.in_txn
    }

    fn close(&mut self) {
        let Some(commands) = self.commands.take() else {
            return;
        };
        let _ = commands.send(Command::Close);
        drop(commands);

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!(conn = self.id, "SQLite connection worker panicked");
            }
        }
        if self.in_txn {
            tracing::debug!(conn = self.id, "Closing connection with open transaction, changes discarded");
            self.in_txn = false;
        }
        tracing::debug!(conn = self.id, "SQLite connection closed");
    }

    fn is_closed(&self) -> bool {
        self.commands.is_none()
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Cursor over a statement held open by a [`SqliteConnection`]
///
/// Only the most recently executed statement of a connection can be read;
/// a cursor whose statement was superseded reports a query error.
#[derive(Debug)]
pub struct SqliteCursor {
    commands: Sender<Command>,
    id: u64,
    exhausted: bool,
}

impl Cursor for SqliteCursor {
    fn next_row(&mut self) -> Result<Option<Row>> {
        Ok(self.next_batch(1)?.into_iter().next())
    }

    fn next_batch(&mut self, max: usize) -> Result<Batch> {
        if self.exhausted || max == 0 {
            return Ok(Vec::new());
        }
        let cursor = self.id;
        let batch = match request(&self.commands, |reply| Command::Fetch { cursor, max, reply }) {
            Ok(batch) => batch,
            Err(e) => {
                self.exhausted = true;
                return Err(e);
            }
        };
        if batch.len() < max {
            self.exhausted = true;
        }
        Ok(batch)
    }
}

fn open_connection(cfg: &SqliteConfig) -> Result<rusqlite::Connection> {
    let flags = if cfg.read_only {
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX
    } else {
        if let Some(parent) = cfg.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SluiceError::Connection(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
    };

    let conn = rusqlite::Connection::open_with_flags(&cfg.path, flags).map_err(classify_open)?;

    conn.busy_timeout(Duration::from_millis(cfg.busy_timeout_ms))
        .map_err(classify_open)?;
    if cfg.wal_mode && !cfg.read_only {
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(classify_open)?;
    }
    conn.pragma_update(None, "synchronous", cfg.synchronous.as_pragma())
        .map_err(classify_open)?;
    conn.pragma_update(None, "foreign_keys", if cfg.foreign_keys { "ON" } else { "OFF" })
        .map_err(classify_open)?;

    Ok(conn)
}

struct Worker {
    conn: rusqlite::Connection,
    interrupted: Arc<AtomicBool>,
    next_cursor: u64,
}

impl Worker {
    fn new(conn: rusqlite::Connection, interrupted: Arc<AtomicBool>) -> Self {
        Self {
            conn,
            interrupted,
            next_cursor: 0,
        }
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }

    fn run(mut self, inbox: Receiver<Command>) {
        let mut pending = None;
        loop {
            let command = match pending.take() {
                Some(command) => command,
                None => match inbox.recv() {
                    Ok(command) => command,
                    Err(_) => break,
                },
            };
            if self.is_interrupted() {
                match command {
                    Command::Query { reply, .. } => {
                        let _ = reply.send(Err(SluiceError::Cancelled));
                    }
                    Command::Fetch { reply, .. } => {
                        let _ = reply.send(Err(SluiceError::Cancelled));
                    }
                    Command::Update { reply, .. } => {
                        let _ = reply.send(Err(SluiceError::Cancelled));
                    }
                    Command::Batch { reply, .. } => {
                        let _ = reply.send(Err(SluiceError::Cancelled));
                    }
                    Command::Close => break,
                }
                continue;
            }
            match command {
                Command::Query { query, reply } => {
                    pending = self.serve_cursor(query, reply, &inbox);
                }
                Command::Fetch { reply, .. } => {
                    let _ = reply.send(Err(stale_cursor()));
                }
                Command::Update { query, reply } => {
                    let result = self
                        .conn
                        .execute(
                            query.sql(),
                            params_from_iter(query.params().iter().map(to_sql)),
                        )
                        .map_err(classify);
                    let _ = reply.send(result);
                }
                Command::Batch { sql, reply } => {
                    let _ = reply.send(self.conn.execute_batch(sql).map_err(classify));
                }
                Command::Close => break,
            }
        }

        if let Err((_, e)) = self.conn.close() {
            tracing::warn!(error = %e, "SQLite connection did not close cleanly");
        }
    }

    /// Keep one statement open and answer fetches for it until any other
    /// command arrives, which is handed back to the main loop.
    fn serve_cursor(
        &mut self,
        query: Query,
        reply: Reply<u64>,
        inbox: &Receiver<Command>,
    ) -> Option<Command> {
        self.next_cursor += 1;
        let id = self.next_cursor;

        let mut stmt = match self.conn.prepare(query.sql()) {
            Ok(stmt) => stmt,
            Err(e) => {
                let _ = reply.send(Err(classify(e)));
                return None;
            }
        };
        let columns: Arc<[String]> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let mut rows = match stmt.query(params_from_iter(query.params().iter().map(to_sql))) {
            Ok(rows) => rows,
            Err(e) => {
                let _ = reply.send(Err(classify(e)));
                return None;
            }
        };
        if reply.send(Ok(id)).is_err() {
            return None;
        }

        let mut exhausted = false;
        loop {
            let command = inbox.recv().ok()?;
            match command {
                Command::Fetch { cursor, reply, .. } if cursor != id => {
                    let _ = reply.send(Err(stale_cursor()));
                }
                Command::Fetch { reply, .. } if self.is_interrupted() => {
                    exhausted = true;
                    let _ = reply.send(Err(SluiceError::Cancelled));
                }
                Command::Fetch { max, reply, .. } => {
                    let mut batch = Vec::with_capacity(max.min(1024));
                    let mut failure = None;
                    while !exhausted && batch.len() < max {
                        match rows.next() {
                            Ok(Some(row)) => match read_row(row, &columns) {
                                Ok(row) => batch.push(row),
                                Err(e) => {
                                    exhausted = true;
                                    failure = Some(e);
                                }
                            },
                            Ok(None) => exhausted = true,
                            Err(e) => {
                                exhausted = true;
                                failure = Some(classify(e));
                            }
                        }
                    }
                    let _ = reply.send(match failure {
                        Some(e) => Err(e),
                        None => Ok(batch),
                    });
                }
                other => return Some(other),
            }
        }
    }
}

fn stale_cursor() -> SluiceError {
    SluiceError::query("cursor is no longer valid: a later statement ran on this connection")
}
