//! forge-core
//!
//! Offline action queue for the DopaForge task client.
//!
//! オフライン中に行ったタスク操作（作成・更新・完了）を永続ストアに積み、
//! オンラインに戻ったら 1 件ずつ順番にリモート API へ再送する。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, action, payload, outcome, errors）
//! - **ports**: 抽象化レイヤー（KeyValueStore, Reachability, TaskApi, Notifier, Clock, IdGenerator）
//! - **queue**: OfflineQueue 本体（enqueue / sync / replay / retry）
//! - **app**: ワイヤリングと再接続トリガー（SyncAppBuilder, ReconnectLoop）
//! - **impls**: ports の実装（InMemoryStore, FileStore, HttpTaskApi など）
//! - **config**: TOML 設定
//! - **observability**: キューの状態ビュー

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod queue;

pub use app::{BuildError, SyncApp, SyncAppBuilder};
pub use config::{ConfigError, SyncConfig};
pub use domain::{ActionId, ActionKind, OfflineAction, QueueError, SyncOutcome, SyncReport};
pub use queue::{OfflineQueue, QueueOptions, RetryPolicy};
