//! Observability - キューの状態ビュー（CLI の status 表示用）

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub dead_lettered: usize,
    pub syncing: bool,
}
