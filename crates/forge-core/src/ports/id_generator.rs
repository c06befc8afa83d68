//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use crate::domain::ids::ActionId;
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は端末上で一意な ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（queue を Arc で共有するため）
pub trait IdGenerator: Send + Sync {
    fn generate_action_id(&self) -> ActionId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
/// テスト時に FixedClock を渡すと timestamp 部分が決定的になります。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_action_id(&self) -> ActionId {
        let timestamp_ms = u64::try_from(self.clock.now_ms()).unwrap_or(0);
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        ActionId::from(ulid)
    }
}
