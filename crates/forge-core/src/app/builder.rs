//! SyncAppBuilder - ports のワイヤリング
//!
//! - 必須の ports（store / reachability / api）が揃っていなければ build() で失敗する
//! - clock / ids / notifier は省略時にデフォルト実装を使う
//! - 設定ファイルからは `from_config()` で QueueOptions と settle delay を受け取る

use std::sync::Arc;
use std::time::Duration;

use super::reconnect::{ReconnectHandle, ReconnectLoop};
use crate::config::SyncConfig;
use crate::impls::TracingNotifier;
use crate::ports::{
    Clock, IdGenerator, KeyValueStore, Notifier, Reachability, SystemClock, TaskApi, UlidGenerator,
};
use crate::queue::{OfflineQueue, QueueOptions, QueuePorts, RetryPolicy};

/// 再接続後のデフォルト待ち時間
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing ports: {0:?}. These ports must be provided before build().")]
    MissingPorts(Vec<&'static str>),

    #[error("user_id must not be empty")]
    MissingUserId,
}

/// # 使用例
/// ```ignore
/// let app = SyncAppBuilder::new("user-123")
///     .store(FileStore::open(".forge")?)
///     .reachability(signal.clone())
///     .api(HttpTaskApi::new("http://127.0.0.1:3000"))
///     .build()?;
/// ```
pub struct SyncAppBuilder {
    options: QueueOptions,
    settle_delay: Duration,
    store: Option<Arc<dyn KeyValueStore>>,
    reachability: Option<Arc<dyn Reachability>>,
    api: Option<Arc<dyn TaskApi>>,
    notifier: Option<Arc<dyn Notifier>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl SyncAppBuilder {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self::with_options(QueueOptions::new(user_id))
    }

    pub fn with_options(options: QueueOptions) -> Self {
        Self {
            options,
            settle_delay: DEFAULT_SETTLE_DELAY,
            store: None,
            reachability: None,
            api: None,
            notifier: None,
            clock: None,
            ids: None,
        }
    }

    /// 設定ファイルの値で初期化（ports は別途渡す）
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::with_options(config.queue_options()).settle_delay(config.settle_delay())
    }

    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.options.retry = policy;
        self
    }

    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.options.storage_key = key.into();
        self
    }

    pub fn store(self, store: impl KeyValueStore + 'static) -> Self {
        self.store_arc(Arc::new(store))
    }

    pub fn store_arc(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn reachability(mut self, reachability: Arc<dyn Reachability>) -> Self {
        self.reachability = Some(reachability);
        self
    }

    pub fn api(self, api: impl TaskApi + 'static) -> Self {
        self.api_arc(Arc::new(api))
    }

    pub fn api_arc(mut self, api: Arc<dyn TaskApi>) -> Self {
        self.api = Some(api);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// # 検証
    /// - user_id が空でないこと
    /// - store / reachability / api が全部渡されていること（不足分をまとめて返す）
    pub fn build(self) -> Result<SyncApp, BuildError> {
        if self.options.user_id.trim().is_empty() {
            return Err(BuildError::MissingUserId);
        }

        let mut missing = Vec::new();
        if self.store.is_none() {
            missing.push("store");
        }
        if self.reachability.is_none() {
            missing.push("reachability");
        }
        if self.api.is_none() {
            missing.push("api");
        }
        let (Some(store), Some(reachability), Some(api)) = (self.store, self.reachability, self.api)
        else {
            return Err(BuildError::MissingPorts(missing));
        };

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(clock.clone())));
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier));

        let ports = QueuePorts {
            store,
            reachability: reachability.clone(),
            api,
            notifier,
            clock,
            ids,
        };

        Ok(SyncApp {
            queue: Arc::new(OfflineQueue::new(ports, self.options)),
            reachability,
            settle_delay: self.settle_delay,
            reconnect: None,
        })
    }
}

/// 組み立て済みのキューと、その再接続ループ
pub struct SyncApp {
    queue: Arc<OfflineQueue>,
    reachability: Arc<dyn Reachability>,
    settle_delay: Duration,
    reconnect: Option<ReconnectHandle>,
}

impl SyncApp {
    pub fn queue(&self) -> &Arc<OfflineQueue> {
        &self.queue
    }

    pub fn is_running(&self) -> bool {
        self.reconnect.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// 再接続ループを起動する。既に起動済みなら何もしない
    pub fn start(&mut self) {
        if self.reconnect.is_some() {
            return;
        }
        tracing::info!(
            storage_key = %self.queue.options().storage_key,
            settle_delay_ms = u64::try_from(self.settle_delay.as_millis()).unwrap_or(u64::MAX),
            "starting reconnect loop"
        );
        let handle = ReconnectLoop::new(
            self.queue.clone(),
            self.reachability.clone(),
            self.settle_delay,
        )
        .spawn();
        self.reconnect = Some(handle);
    }

    /// ループを止めて終了を待つ。キューの中身はそのまま残る
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.reconnect.take() {
            handle.shutdown_and_join().await;
        }
        tracing::info!("sync app stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActionKind, ReplayError, SyncOutcome};
    use crate::impls::{InMemoryStore, ReachabilitySignal, RecordingNotifier};
    use async_trait::async_trait;
    use serde_json::{Value, json};

    struct OkApi;

    #[async_trait]
    impl TaskApi for OkApi {
        async fn create_task(&self, _body: &Value) -> Result<(), ReplayError> {
            Ok(())
        }
        async fn update_task(&self, _id: &str, _body: &Value) -> Result<(), ReplayError> {
            Ok(())
        }
        async fn complete_task(&self, _id: &str, _body: &Value) -> Result<(), ReplayError> {
            Ok(())
        }
    }

    #[test]
    fn test_build_reports_every_missing_port() {
        let result = SyncAppBuilder::new("u-1").api(OkApi).build();
        assert!(matches!(
            result,
            Err(BuildError::MissingPorts(missing)) if missing == vec!["store", "reachability"]
        ));
    }

    #[test]
    fn test_build_rejects_empty_user() {
        let result = SyncAppBuilder::new("  ")
            .store(InMemoryStore::new())
            .reachability(Arc::new(ReachabilitySignal::new(true)))
            .api(OkApi)
            .build();
        assert!(matches!(result, Err(BuildError::MissingUserId)));
    }

    #[test]
    fn test_from_config_carries_options() {
        let config = SyncConfig::from_toml_str(
            "[queue]\nstorage_key = \"queue_u9\"\nsettle_delay_ms = 100\n[api]\nuser_id = \"u-9\"",
        )
        .unwrap();
        let app = SyncAppBuilder::from_config(&config)
            .store(InMemoryStore::new())
            .reachability(Arc::new(ReachabilitySignal::new(false)))
            .api(OkApi)
            .build()
            .unwrap();

        assert_eq!(app.queue().options().storage_key, "queue_u9");
        assert_eq!(app.queue().options().user_id, "u-9");
        assert_eq!(app.settle_delay, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_built_queue_syncs_and_notifies() {
        let notifier = Arc::new(RecordingNotifier::new());
        let app = SyncAppBuilder::new("u-1")
            .store(InMemoryStore::new())
            .reachability(Arc::new(ReachabilitySignal::new(true)))
            .api(OkApi)
            .notifier(notifier.clone())
            .build()
            .unwrap();

        app.queue()
            .enqueue(ActionKind::CreateTask, json!({ "title": "walk" }))
            .unwrap();
        let outcome = app.queue().sync().await.unwrap();

        assert!(matches!(outcome, SyncOutcome::Completed(ref r) if r.synced == 1));
        assert_eq!(
            notifier.last().map(|n| n.message),
            Some("Synced 1 offline action".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_shutdown() {
        let signal = Arc::new(ReachabilitySignal::new(false));
        let mut app = SyncAppBuilder::new("u-1")
            .store(InMemoryStore::new())
            .reachability(signal.clone())
            .api(OkApi)
            .settle_delay(Duration::from_millis(50))
            .build()
            .unwrap();
        app.queue()
            .enqueue(ActionKind::CompleteTask, json!({ "id": "t-1" }))
            .unwrap();

        app.start();
        app.start();
        assert!(app.is_running());
        tokio::time::sleep(Duration::from_millis(10)).await;

        signal.set_online(true);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(app.queue().pending().unwrap().is_empty());

        app.shutdown().await;
    }
}
