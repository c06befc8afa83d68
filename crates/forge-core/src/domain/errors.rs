//! Errors - エラー型と分類
//!
//! # 分類
//! - **StorageError**: 永続化ストアの読み書き失敗（回復しない、呼び出し側へ伝播）
//! - **QueueError**: キュー操作の失敗（StorageError + blob の破損）
//! - **ReplayError**: 1 アクションの replay 失敗（キュー内で回復、集計にだけ現れる）

use thiserror::Error;

use super::action::ActionKind;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o error on key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("quota exceeded writing key '{key}': {len} bytes (limit {limit})")]
    QuotaExceeded { key: String, len: usize, limit: usize },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("persisted queue under '{key}' is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode queue: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Failure of one remote replay.
///
/// `is_transient` は将来のポリシー分岐用の分類で、現状はすべて「保持して次回再送」。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    #[error("remote returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload { kind: ActionKind, reason: String },
}

impl ReplayError {
    pub fn is_transient(&self) -> bool {
        match self {
            ReplayError::Status { status, .. } => *status >= 500 || *status == 429,
            ReplayError::Transport(_) => true,
            ReplayError::InvalidPayload { .. } => false,
        }
    }
}
