//! ReachabilitySignal - 実行環境が駆動する到達性シグナル
//!
//! ホスト側（CLI の probe ループやテスト）が `set_online` を呼び、
//! キューと再接続ループは `Reachability` port 越しに読むだけ。

use tokio::sync::watch;

use crate::ports::Reachability;

#[derive(Debug)]
pub struct ReachabilitySignal {
    tx: watch::Sender<bool>,
}

impl ReachabilitySignal {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx }
    }

    /// 値が変わったときだけ購読者を起こす。変化したら true。
    pub fn set_online(&self, online: bool) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        })
    }
}

impl Reachability for ReachabilitySignal {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
