pub mod bulk;
pub mod engine;
pub mod error;
pub mod queue;

pub use bulk::{BulkCoordinator, BulkItem, BulkSummary};
pub use engine::{Accepted, DispatchEngine, PROVIDER_FAILED_ERROR, UNKNOWN_CHANNEL_ERROR};
pub use error::{DispatchError, DispatchResult};
pub use queue::{DispatchQueue, DispatchQueueConfig, QueueItem};
