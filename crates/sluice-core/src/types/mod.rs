pub mod page;
pub mod query;
pub mod row;
pub mod value;

pub use page::{Batch, Page};
pub use query::{CacheKey, Query};
pub use row::Row;
pub use value::Value;
