//! ReconnectLoop - いつ sync を走らせるか
//!
//! # トリガー
//! 1. 起動時にオンラインなら 1 回
//! 2. オフライン → オンラインの遷移ごとに、`settle_delay` 待ってから 1 回
//!    （待っている間にまたオフラインになったらその回は取り消し）
//!
//! ポーリングはしない。失敗したアクションは次の遷移（または再起動）まで待つ。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::ports::Reachability;
use crate::queue::OfflineQueue;

/// Handle of a running reconnect loop.
/// - `request_shutdown()` で止める（実行中の sync pass は最後まで走る）
/// - `shutdown_and_join()` で終了を待てる
pub struct ReconnectHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl ReconnectHandle {
    pub fn request_shutdown(&self) {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        if let Err(e) = self.join.await {
            tracing::error!(error = %e, "reconnect loop terminated abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

pub struct ReconnectLoop {
    queue: Arc<OfflineQueue>,
    reachability: Arc<dyn Reachability>,
    settle_delay: Duration,
}

enum Settle {
    Elapsed,
    WentOffline,
    Shutdown,
}

impl ReconnectLoop {
    pub fn new(
        queue: Arc<OfflineQueue>,
        reachability: Arc<dyn Reachability>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            queue,
            reachability,
            settle_delay,
        }
    }

    pub fn spawn(self) -> ReconnectHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(shutdown_rx));
        ReconnectHandle { shutdown_tx, join }
    }

    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut online_rx = self.reachability.subscribe();
        // sync 中に切断 → 再接続があったら、次の遷移を待たずにもう一度 settle から始める
        let mut reconnected = false;

        if *online_rx.borrow_and_update() {
            reconnected = self.sync_tracking(&mut online_rx).await;
        }

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            if !reconnected {
                let changed = tokio::select! {
                    res = shutdown_rx.changed() => {
                        if res.is_err() {
                            break;
                        }
                        continue;
                    }
                    res = online_rx.changed() => res,
                };
                if changed.is_err() {
                    tracing::debug!("reachability source dropped, stopping reconnect loop");
                    break;
                }

                // 通知は値が変わったときだけ来るので、true なら（合体した切断を含め）再接続
                if !*online_rx.borrow_and_update() {
                    continue;
                }
            }
            reconnected = false;

            tracing::debug!(delay_ms = millis(self.settle_delay), "back online, settling");
            let settle = tokio::select! {
                _ = tokio::time::sleep(self.settle_delay) => Settle::Elapsed,
                _ = wait_offline(&mut online_rx) => Settle::WentOffline,
                _ = shutdown_rx.changed() => Settle::Shutdown,
            };

            match settle {
                Settle::Elapsed => reconnected = self.sync_tracking(&mut online_rx).await,
                Settle::WentOffline => {
                    tracing::debug!("connection dropped while settling, sync cancelled");
                }
                Settle::Shutdown => break,
            }
        }
    }

    /// sync pass を 1 回走らせ、その間の到達性の変化を追う。
    /// pass 中に通知があり（= 一度はオフラインになった）、終了時点でオンラインなら true
    async fn sync_tracking(&self, online_rx: &mut watch::Receiver<bool>) -> bool {
        let pass = self.sync_once();
        tokio::pin!(pass);

        let changed = tokio::select! {
            _ = &mut pass => return false,
            res = online_rx.changed() => res.is_ok(),
        };
        (&mut pass).await;

        let reconnected = changed && *online_rx.borrow_and_update();
        if reconnected {
            tracing::debug!("connection flapped during sync, scheduling another pass");
        }
        reconnected
    }

    async fn sync_once(&self) {
        match self.queue.sync().await {
            Ok(outcome) => tracing::debug!(?outcome, "triggered sync finished"),
            Err(e) => tracing::error!(error = %e, "triggered sync failed"),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// オフラインになる（または送信側が消える）まで待つ
async fn wait_offline(online_rx: &mut watch::Receiver<bool>) {
    loop {
        if online_rx.changed().await.is_err() {
            return;
        }
        if !*online_rx.borrow_and_update() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActionKind, ReplayError};
    use crate::impls::{InMemoryStore, ReachabilitySignal, RecordingNotifier};
    use crate::ports::{SystemClock, TaskApi, UlidGenerator};
    use crate::queue::{QueueOptions, QueuePorts};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingApi {
        calls: AtomicUsize,
    }

    impl CountingApi {
        fn count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn hit(&self) -> Result<(), ReplayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl TaskApi for CountingApi {
        async fn create_task(&self, _body: &Value) -> Result<(), ReplayError> {
            self.hit()
        }
        async fn update_task(&self, _id: &str, _body: &Value) -> Result<(), ReplayError> {
            self.hit()
        }
        async fn complete_task(&self, _id: &str, _body: &Value) -> Result<(), ReplayError> {
            self.hit()
        }
    }

    /// 最初の complete_task だけ 10 秒かかって失敗する（sync 中に回線が揺れる状況の再現用）
    #[derive(Default)]
    struct SlowFirstApi {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TaskApi for SlowFirstApi {
        async fn create_task(&self, _body: &Value) -> Result<(), ReplayError> {
            Ok(())
        }
        async fn update_task(&self, _id: &str, _body: &Value) -> Result<(), ReplayError> {
            Ok(())
        }
        async fn complete_task(&self, _id: &str, _body: &Value) -> Result<(), ReplayError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_secs(10)).await;
                return Err(ReplayError::Transport("connection reset".to_string()));
            }
            Ok(())
        }
    }

    fn setup(online: bool) -> (Arc<OfflineQueue>, Arc<ReachabilitySignal>, Arc<CountingApi>) {
        let api = Arc::new(CountingApi::default());
        let (queue, signal) = setup_with(online, api.clone());
        (queue, signal, api)
    }

    fn setup_with(online: bool, api: Arc<dyn TaskApi>) -> (Arc<OfflineQueue>, Arc<ReachabilitySignal>) {
        let signal = Arc::new(ReachabilitySignal::new(online));
        let ports = QueuePorts {
            store: Arc::new(InMemoryStore::new()),
            reachability: signal.clone(),
            api,
            notifier: Arc::new(RecordingNotifier::new()),
            clock: Arc::new(SystemClock),
            ids: Arc::new(UlidGenerator::new(SystemClock)),
        };
        let queue = Arc::new(OfflineQueue::new(ports, QueueOptions::new("u-1")));
        (queue, signal)
    }

    fn spawn_loop(queue: &Arc<OfflineQueue>, signal: &Arc<ReachabilitySignal>) -> ReconnectHandle {
        ReconnectLoop::new(queue.clone(), signal.clone(), Duration::from_secs(2)).spawn()
    }

    #[tokio::test(start_paused = true)]
    async fn syncs_on_start_when_online() {
        let (queue, signal, api) = setup(true);
        queue.enqueue(ActionKind::CompleteTask, json!({ "id": "t-1" })).unwrap();

        let handle = spawn_loop(&queue, &signal);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(api.count(), 1);
        assert!(queue.pending().unwrap().is_empty());
        handle.shutdown_and_join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn syncs_after_settle_delay_on_reconnect() {
        let (queue, signal, api) = setup(false);
        queue.enqueue(ActionKind::CompleteTask, json!({ "id": "t-1" })).unwrap();
        let handle = spawn_loop(&queue, &signal);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(api.count(), 0);

        signal.set_online(true);
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(api.count(), 0, "must wait for the connection to settle");

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(api.count(), 1);
        handle.shutdown_and_join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn flapping_connection_cancels_the_pending_sync() {
        let (queue, signal, api) = setup(false);
        queue.enqueue(ActionKind::CompleteTask, json!({ "id": "t-1" })).unwrap();
        let handle = spawn_loop(&queue, &signal);
        tokio::time::sleep(Duration::from_millis(10)).await;

        signal.set_online(true);
        tokio::time::sleep(Duration::from_millis(500)).await;
        signal.set_online(false);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(api.count(), 0);

        // 次の遷移ではちゃんと走る
        signal.set_online(true);
        tokio::time::sleep(Duration::from_millis(2_100)).await;
        assert_eq!(api.count(), 1);
        handle.shutdown_and_join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_loop() {
        let (queue, signal, api) = setup(false);
        queue.enqueue(ActionKind::CompleteTask, json!({ "id": "t-1" })).unwrap();
        let handle = spawn_loop(&queue, &signal);
        tokio::time::sleep(Duration::from_millis(10)).await;

        handle.shutdown_and_join().await;

        signal.set_online(true);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(api.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_online_signal_does_not_resync() {
        let (queue, signal, api) = setup(true);
        queue.enqueue(ActionKind::CompleteTask, json!({ "id": "t-1" })).unwrap();
        let handle = spawn_loop(&queue, &signal);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(api.count(), 1);

        queue.enqueue(ActionKind::CompleteTask, json!({ "id": "t-2" })).unwrap();
        signal.set_online(true);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(api.count(), 1);
        assert_eq!(queue.pending().unwrap().len(), 1);
        handle.shutdown_and_join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_during_a_sync_pass_triggers_another_pass() {
        let api = Arc::new(SlowFirstApi::default());
        let (queue, signal) = setup_with(true, api.clone());
        queue.enqueue(ActionKind::CompleteTask, json!({ "id": "t-1" })).unwrap();
        let handle = spawn_loop(&queue, &signal);
        tokio::time::sleep(Duration::from_millis(10)).await;

        // 1 回目の pass が応答待ちの間に切断 → 再接続
        signal.set_online(false);
        tokio::time::sleep(Duration::from_millis(100)).await;
        signal.set_online(true);
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(api.calls.load(Ordering::SeqCst), 2);
        assert!(queue.pending().unwrap().is_empty());
        handle.shutdown_and_join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn coalesced_flap_during_a_sync_pass_still_counts_as_reconnect() {
        let api = Arc::new(SlowFirstApi::default());
        let (queue, signal) = setup_with(true, api.clone());
        queue.enqueue(ActionKind::CompleteTask, json!({ "id": "t-1" })).unwrap();
        let handle = spawn_loop(&queue, &signal);
        tokio::time::sleep(Duration::from_millis(10)).await;

        // ループが間の false を観測できないタイミングで揺らす
        signal.set_online(false);
        signal.set_online(true);
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(api.calls.load(Ordering::SeqCst), 2);
        assert!(queue.pending().unwrap().is_empty());
        handle.shutdown_and_join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn still_offline_after_the_pass_waits_for_the_next_transition() {
        let api = Arc::new(SlowFirstApi::default());
        let (queue, signal) = setup_with(true, api.clone());
        queue.enqueue(ActionKind::CompleteTask, json!({ "id": "t-1" })).unwrap();
        let handle = spawn_loop(&queue, &signal);
        tokio::time::sleep(Duration::from_millis(10)).await;

        signal.set_online(false);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
        assert_eq!(queue.pending().unwrap().len(), 1);

        signal.set_online(true);
        tokio::time::sleep(Duration::from_millis(2_100)).await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 2);
        assert!(queue.pending().unwrap().is_empty());
        handle.shutdown_and_join().await;
    }

    #[test]
    fn millis_saturates_instead_of_truncating() {
        assert_eq!(millis(Duration::from_secs(2)), 2_000);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
