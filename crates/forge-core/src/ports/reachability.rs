//! Reachability port - オンライン/オフライン信号
//!
//! 実行環境が提供する boolean と、その変化通知。
//! 変化通知は `tokio::sync::watch` で表現する（最新値だけが意味を持つため）。

use tokio::sync::watch;

pub trait Reachability: Send + Sync {
    fn is_online(&self) -> bool;

    /// 現在値と以後の変化を受け取る receiver
    ///
    /// 値が実際に変わったときだけ通知すること（online → online の重複は送らない）。
    /// watch は途中の値を合体させるので、受信側は「通知が来て値が true」を
    /// 切断を挟んだ再接続として扱う。
    fn subscribe(&self) -> watch::Receiver<bool>;
}
