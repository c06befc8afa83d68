//! ActionPayload - 型付き payload
//!
//! キュー自体は payload を `serde_json::Value` のまま扱いますが、
//! 呼び出し側はこの trait を実装した型を使うことで kind の取り違えを型で防げます。
//!
//! # 学習ポイント
//! - Associated Constants (`const KIND`)
//! - `#[serde(flatten)]` で任意のタスクフィールドを保持

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::action::ActionKind;

/// ActionPayload は payload 型と ActionKind を対応付ける
pub trait ActionPayload: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: ActionKind;
}

/// 任意のタスクフィールド
pub type TaskFields = serde_json::Map<String, serde_json::Value>;

/// Payload for `create_task`: the task fields as the client knows them.
///
/// `user_id` は replay 時にキューが付与するので含めなくてよい。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateTask {
    #[serde(flatten)]
    pub fields: TaskFields,
}

impl ActionPayload for CreateTask {
    const KIND: ActionKind = ActionKind::CreateTask;
}

/// Payload for `update_task`: target id plus the fields that changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateTask {
    #[serde(alias = "task_id", alias = "taskId")]
    pub id: String,

    #[serde(flatten)]
    pub fields: TaskFields,
}

impl ActionPayload for UpdateTask {
    const KIND: ActionKind = ActionKind::UpdateTask;
}

/// Payload for `complete_task`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteTask {
    #[serde(alias = "task_id", alias = "taskId")]
    pub id: String,
}

impl ActionPayload for CompleteTask {
    const KIND: ActionKind = ActionKind::CompleteTask;
}
