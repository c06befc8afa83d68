//! Queue module: persisted offline queue, replay dispatch and retry policy.

mod guard;
mod offline;
mod replay;
mod retry;


pub use offline::{DEFAULT_STORAGE_KEY, OfflineQueue, QueueOptions, QueuePorts};
pub use replay::replay;
pub use retry::RetryPolicy;
