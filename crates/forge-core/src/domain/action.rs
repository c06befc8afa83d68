//! OfflineAction - オフライン中に記録されたミューテーション
//!
//! 永続化フォーマット（キー `offline_queue` の値、JSON 配列の 1 要素）:
//!
//! ```json
//! { "id": "01J...", "type": "complete_task", "data": { "id": "t-1" }, "timestamp": 1700000000000 }
//! ```
//!
//! `attempts` / `last_error` / `last_attempt_at` はリトライポリシー用の追加フィールドで、
//! 初期値のときは出力しません。既存クライアントが書いた blob もそのまま読めます。

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::ActionId;

/// Closed set of mutations the queue knows how to replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    CreateTask,
    UpdateTask,
    CompleteTask,
}

impl ActionKind {
    pub const ALL: [ActionKind; 3] = [
        ActionKind::CreateTask,
        ActionKind::UpdateTask,
        ActionKind::CompleteTask,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::CreateTask => "create_task",
            ActionKind::UpdateTask => "update_task",
            ActionKind::CompleteTask => "complete_task",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse error for [`ActionKind`] from user input.
#[derive(Debug, thiserror::Error)]
#[error("unknown action kind '{0}' (expected create_task, update_task or complete_task)")]
pub struct UnknownActionKind(pub String);

impl std::str::FromStr for ActionKind {
    type Err = UnknownActionKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownActionKind(s.to_string()))
    }
}

/// A single queued mutation.
///
/// Design:
/// - `payload` はキューから見て不透明（検証は replay 時にエンドポイント側の都合で行う）
/// - `enqueued_at` は診断用。期限切れ判定には使わない
/// - 順序は永続化配列の並びが正（enqueue 順）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineAction {
    pub id: ActionId,

    #[serde(rename = "type")]
    pub kind: ActionKind,

    #[serde(rename = "data")]
    pub payload: serde_json::Value,

    /// Epoch milliseconds at enqueue time.
    #[serde(rename = "timestamp")]
    pub enqueued_at: i64,

    /// Number of failed replays so far.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub attempts: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Epoch milliseconds of the last failed replay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<i64>,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl OfflineAction {
    pub fn new(id: ActionId, kind: ActionKind, payload: serde_json::Value, enqueued_at: i64) -> Self {
        Self {
            id,
            kind,
            payload,
            enqueued_at,
            attempts: 0,
            last_error: None,
            last_attempt_at: None,
        }
    }

    /// Record a failed replay.
    pub fn record_failure(&mut self, error: String, at_ms: i64) {
        self.attempts = self.attempts.saturating_add(1);
        self.last_error = Some(error);
        self.last_attempt_at = Some(at_ms);
    }
}
