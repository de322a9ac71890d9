pub mod reliability;
pub mod source;
pub mod stream;

pub use reliability::{BackoffStrategy, CacheConfig, CoordinatorConfig, RetryConfig, RetryOn};
pub use source::{SqliteConfig, SynchronousMode, TransactionBehavior};
pub use stream::StreamConfig;
