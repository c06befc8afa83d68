//! InMemoryStore - 開発・テスト用の KeyValueStore
//!
//! # 実装詳細
//! - HashMap<String, String> を Mutex で保護
//! - `with_quota` で値サイズの上限を設定できる（local storage の quota 超過の再現用）

use crate::domain::StorageError;
use crate::ports::KeyValueStore;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 1 値あたりのバイト数上限付き
    pub fn with_quota(limit: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota: Some(limit),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Unavailable("in-memory store poisoned".to_string()))
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(limit) = self.quota
            && value.len() > limit
        {
            return Err(StorageError::QuotaExceeded {
                key: key.to_string(),
                len: value.len(),
                limit,
            });
        }
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
