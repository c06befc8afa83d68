//! KeyValueStore port - 端末ローカルの永続ストア
//!
//! ブラウザの local storage 相当:
//! - 文字列キー → 文字列 blob
//! - 同期 get/set
//! - origin（ディレクトリ等）単位でスコープ、リロードを跨いで残るが耐久性の保証はない
//!
//! `set` は呼び出し側から見てアトミック（部分書き込みは観測されない）であること。

use crate::domain::StorageError;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }
}
