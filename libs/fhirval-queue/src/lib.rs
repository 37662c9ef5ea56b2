//! Priority queue and dispatcher (§4.9): admission control, strict-priority
//! with FIFO tie-break scheduling, bounded concurrency, and retry with
//! exponential backoff.

pub mod backoff;
pub mod dispatcher;
pub mod error;
pub mod item;
pub mod processor;
pub mod queue;
pub mod stats;

pub use backoff::BackoffPolicy;
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use error::{QueueError, Result};
pub use item::{ItemContext, Priority, QueueItem, QueueItemStatus};
pub use processor::ItemProcessor;
pub use queue::ValidationQueue;
pub use stats::QueueStats;
