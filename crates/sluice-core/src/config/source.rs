use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the SQLite data source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Path to the SQLite database file
    pub path: PathBuf,

    /// How long a statement waits on a locked database before failing
    /// with a transient error (default: 5000ms)
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,

    /// Enable WAL mode
    /// Default: true
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// SQLite synchronous mode
    #[serde(default)]
    pub synchronous: SynchronousMode,

    /// Enforce foreign key constraints (default: true)
    #[serde(default = "default_true")]
    pub foreign_keys: bool,

    /// Open connections read-only (default: false)
    ///
    /// A read-only source never creates the database file; opening a
    /// missing file fails with a connection error.
    #[serde(default)]
    pub read_only: bool,

    /// Locking behaviour of `BEGIN` for transaction scopes
    #[serde(default)]
    pub transaction_behavior: TransactionBehavior,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SynchronousMode {
    /// Full fsync (safest, slowest)
    Full,
    /// fsync at critical moments (good balance)
    #[default]
    Normal,
    /// No fsync (fastest, least safe)
    Off,
}

impl SynchronousMode {
    pub fn as_pragma(&self) -> &'static str {
        match self {
            SynchronousMode::Full => "FULL",
            SynchronousMode::Normal => "NORMAL",
            SynchronousMode::Off => "OFF",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TransactionBehavior {
    /// Locks are taken on first read/write
    #[default]
    Deferred,
    /// Write lock is taken immediately
    Immediate,
    /// No other connection may read or write until commit
    Exclusive,
}

impl TransactionBehavior {
    pub fn begin_statement(&self) -> &'static str {
        match self {
            TransactionBehavior::Deferred => "BEGIN DEFERRED",
            TransactionBehavior::Immediate => "BEGIN IMMEDIATE",
            TransactionBehavior::Exclusive => "BEGIN EXCLUSIVE",
        }
    }
}

fn default_busy_timeout() -> u64 {
    5000
}

fn default_wal_mode() -> bool {
    true
}

fn default_true() -> bool {
    true
}

impl SqliteConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: default_busy_timeout(),
            wal_mode: default_wal_mode(),
            synchronous: SynchronousMode::default(),
            foreign_keys: default_true(),
            read_only: false,
            transaction_behavior: TransactionBehavior::default(),
        }
    }

    pub fn with_busy_timeout(mut self, timeout_ms: u64) -> Self {
        self.busy_timeout_ms = timeout_ms;
        self
    }

    pub fn with_wal_mode(mut self, wal_mode: bool) -> Self {
        self.wal_mode = wal_mode;
        self
    }

    pub fn with_synchronous(mut self, synchronous: SynchronousMode) -> Self {
        self.synchronous = synchronous;
        self
    }

    pub fn with_foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_transaction_behavior(mut self, behavior: TransactionBehavior) -> Self {
        self.transaction_behavior = behavior;
        self
    }
}
