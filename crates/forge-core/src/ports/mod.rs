//! Ports - 抽象化レイヤー
//!
//! オフライン同期キューが依存する外部システムをすべて trait で表現します。
//!
//! - 永続ストア（local storage 相当）: KeyValueStore
//! - 到達性シグナル: Reachability
//! - リモート API: TaskApi
//! - 通知面: Notifier
//! - 時刻と ID: Clock, IdGenerator

pub mod clock;
pub mod id_generator;
pub mod notifier;
pub mod reachability;
pub mod remote;
pub mod store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::notifier::{Notification, NotificationLevel, Notifier};
pub use self::reachability::Reachability;
pub use self::remote::TaskApi;
pub use self::store::KeyValueStore;
