//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID
//! オフラインで積まれたアクションは、端末上で（サーバーと調整せずに）ID を振る必要があります。
//! そのため新しく振る ID は ULID (Universally Unique Lexicographically Sortable Identifier) です。
//!
//! ## ULID の特性
//! - **時刻でソート可能**: enqueue 順と ID 順がほぼ一致する（ログで追いやすい）
//! - **調整不要**: サーバーに問い合わせずに一意な ID を作れる
//!
//! ## 既存クライアントの ID
//! 以前の web クライアントは `Date.now().toString()` のような任意の文字列を ID にしていた。
//! 永続化された blob に ULID 以外の ID があっても、その文字列をそのまま保持して読み書きする。
//!
//! ## Phantom Type パターン
//! `Id<T>` で共通実装を持ち、`T` はコンパイル時だけ使うマーカー型です。
//! 永続化フォーマットでは ID 文字列そのもの（プレフィックスなし）として保存します。

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"action-" など）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Repr {
    Ulid(Ulid),
    /// ULID として読めない、または正規形でない ID（書き戻すときも元の文字列のまま）
    Legacy(Box<str>),
}

/// ジェネリック ID 型
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id<T: IdMarker> {
    repr: Repr,
    _marker: PhantomData<T>,
}

// derive(Clone) だと T: Clone を要求してしまうので手で実装する
impl<T: IdMarker> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self {
            repr: self.repr.clone(),
            _marker: PhantomData,
        }
    }
}

/// Error for an empty id string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("id must not be empty")]
pub struct EmptyId;

impl<T: IdMarker> Id<T> {
    /// ULID から Id を作成
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            repr: Repr::Ulid(ulid),
            _marker: PhantomData,
        }
    }

    /// 永続化された文字列から Id を作成。正規形の ULID ならそのまま ULID として扱う
    pub fn from_raw(raw: &str) -> Self {
        let repr = match Ulid::from_string(raw) {
            Ok(ulid) if ulid.to_string() == raw => Repr::Ulid(ulid),
            _ => Repr::Legacy(raw.into()),
        };
        Self {
            repr,
            _marker: PhantomData,
        }
    }

    /// 内部の ULID（既存クライアント由来の ID なら None）
    pub fn as_ulid(&self) -> Option<Ulid> {
        match &self.repr {
            Repr::Ulid(ulid) => Some(*ulid),
            Repr::Legacy(_) => None,
        }
    }

    /// ULID 部分に埋め込まれた生成時刻（epoch ms）
    pub fn timestamp_ms(&self) -> Option<u64> {
        self.as_ulid().map(|ulid| ulid.timestamp_ms())
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self.repr, Repr::Legacy(_))
    }

    fn write_raw(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Ulid(ulid) => write!(f, "{ulid}"),
            Repr::Legacy(raw) => f.write_str(raw),
        }
    }

    /// プレフィックスなしの永続化表現
    pub fn to_raw(&self) -> String {
        match &self.repr {
            Repr::Ulid(ulid) => ulid.to_string(),
            Repr::Legacy(raw) => raw.to_string(),
        }
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(T::prefix())?;
        self.write_raw(f)
    }
}

/// `action-01J...` と素の `01J...` のどちらも受け付ける（CLI 入力用）
impl<T: IdMarker> FromStr for Id<T> {
    type Err = EmptyId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(T::prefix()).unwrap_or(s);
        if raw.is_empty() {
            return Err(EmptyId);
        }
        Ok(Self::from_raw(raw))
    }
}

impl<T: IdMarker> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.repr {
            Repr::Ulid(ulid) => serializer.collect_str(ulid),
            Repr::Legacy(raw) => serializer.serialize_str(raw),
        }
    }
}

impl<'de, T: IdMarker> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor<T>(PhantomData<T>);

        impl<T: IdMarker> Visitor<'_> for IdVisitor<T> {
            type Value = Id<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an id string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(Id::from_raw(v))
            }

            // 数値で保存された ID も文字列として保持する
            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(Id::from_raw(&v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(Id::from_raw(&v.to_string()))
            }
        }

        deserializer.deserialize_any(IdVisitor(PhantomData))
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// OfflineAction のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {}

impl IdMarker for Action {
    fn prefix() -> &'static str {
        "action-"
    }
}

/// Identifier of a queued offline action.
pub type ActionId = Id<Action>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn display_has_prefix() {
        let ulid = Ulid::new();
        let id = ActionId::from_ulid(ulid);

        assert_eq!(id.as_ulid(), Some(ulid));
        assert_eq!(id.to_string(), format!("action-{ulid}"));
    }

    #[test]
    fn serializes_as_bare_ulid_string() {
        let ulid = Ulid::new();
        let id = ActionId::from_ulid(ulid);

        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json, serde_json::Value::String(ulid.to_string()));

        let back: ActionId = serde_json::from_value(json).unwrap();
        assert_eq!(back, id);
        assert!(!back.is_legacy());
    }

    #[rstest]
    #[case("1718000000000")]
    #[case("offline-7")]
    #[case("01hzzzzzzzzzzzzzzzzzzzzzzz")]
    fn legacy_ids_are_kept_verbatim(#[case] raw: &str) {
        let id: ActionId = serde_json::from_value(serde_json::json!(raw)).unwrap();

        assert!(id.is_legacy());
        assert_eq!(id.as_ulid(), None);
        assert_eq!(id.to_string(), format!("action-{raw}"));
        assert_eq!(serde_json::to_value(&id).unwrap(), serde_json::json!(raw));
    }

    #[test]
    fn numeric_ids_are_read_as_strings() {
        let id: ActionId = serde_json::from_value(serde_json::json!(1718000000000_u64)).unwrap();

        assert_eq!(id.to_raw(), "1718000000000");
        assert_eq!(id.timestamp_ms(), None);
    }

    #[test]
    fn parses_with_or_without_prefix() {
        let ulid = Ulid::new();

        let a: ActionId = format!("action-{ulid}").parse().unwrap();
        let b: ActionId = ulid.to_string().parse().unwrap();
        assert_eq!(a, b);

        let legacy: ActionId = "action-1718000000000".parse().unwrap();
        assert_eq!(legacy, ActionId::from_raw("1718000000000"));

        assert_eq!("action-".parse::<ActionId>(), Err(EmptyId));
    }

    #[test]
    fn ulid_ids_are_sortable() {
        // ULID は時刻ベースなので、生成順序でソート可能
        let id1 = ActionId::from_ulid(Ulid::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = ActionId::from_ulid(Ulid::new());

        assert!(id1 < id2);
    }
}
