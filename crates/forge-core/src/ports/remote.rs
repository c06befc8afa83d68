//! TaskApi port - リモートのミューテーション API
//!
//! 各メソッドは「成功が確認できた」ときだけ `Ok(())` を返す。
//! 2xx 以外のレスポンスも必ず `Err` にすること（kind ごとに判定を変えない）。
//!
//! リモート側のハンドラは冪等である前提（at-least-once 配送）。
//! 同じ `complete_task` が 2 回届いても報酬を二重付与しないこと。

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::ReplayError;

#[async_trait]
pub trait TaskApi: Send + Sync {
    /// `POST /api/tasks`
    async fn create_task(&self, body: &Value) -> Result<(), ReplayError>;

    /// `PATCH /api/tasks/{id}`
    async fn update_task(&self, task_id: &str, body: &Value) -> Result<(), ReplayError>;

    /// `POST /api/tasks/{id}/complete`
    async fn complete_task(&self, task_id: &str, body: &Value) -> Result<(), ReplayError>;
}
