pub mod source;

pub use source::{Connection, Cursor, DataSource};
