//! SQLite data source for sluice
//!
//! Implements the `DataSource` / `Connection` / `Cursor` traits on top of
//! `rusqlite`.
//!
//! Key features:
//! - One worker thread per connection, holding the live statement cursor
//! - Demand-driven row pulls with no read-ahead
//! - WAL mode and busy timeout configuration
//! - Driver errors classified into connection, query and transient kinds

mod convert;

pub mod conn;
pub mod source;

pub use conn::{SqliteConnection, SqliteCursor};
pub use source::SqliteSource;
