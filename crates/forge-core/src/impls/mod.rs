//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryStore / FileStore**: KeyValueStore
//! - **HttpTaskApi**: TaskApi（reqwest）
//! - **ReachabilitySignal**: Reachability（watch チャネル）
//! - **TracingNotifier / RecordingNotifier**: Notifier

pub mod file_store;
pub mod http_api;
pub mod memory_store;
pub mod notifier;
pub mod reachability;

pub use self::file_store::FileStore;
pub use self::http_api::HttpTaskApi;
pub use self::memory_store::InMemoryStore;
pub use self::notifier::{RecordingNotifier, TracingNotifier};
pub use self::reachability::ReachabilitySignal;
