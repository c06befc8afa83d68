//! App - アプリケーション層
//!
//! queue と ports を組み合わせて「いつ sync するか」を決める。
//!
//! # 主要コンポーネント
//! - **SyncAppBuilder**: ports のワイヤリングと起動時検証
//! - **ReconnectLoop**: 起動時 / 再接続時の sync トリガー

pub mod builder;
pub mod reconnect;

pub use self::builder::{BuildError, DEFAULT_SETTLE_DELAY, SyncApp, SyncAppBuilder};
pub use self::reconnect::{ReconnectHandle, ReconnectLoop};
