//! OfflineQueue: buffer mutations while offline, replay them when back online.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use super::guard::SyncGuard;
use super::replay::replay;
use super::retry::RetryPolicy;
use crate::domain::{
    ActionId, ActionKind, ActionPayload, OfflineAction, QueueError, SkipReason, SyncOutcome,
    SyncReport,
};
use crate::observability::QueueStats;
use crate::ports::{Clock, IdGenerator, KeyValueStore, Notification, Notifier, Reachability, TaskApi};

/// Key the web client has always used for the queue blob.
pub const DEFAULT_STORAGE_KEY: &str = "offline_queue";

/// Per-queue settings.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueOptions {
    /// Store key of the queue blob. Dead letters live under `{storage_key}_dead`.
    pub storage_key: String,

    /// Owner merged into create/complete bodies.
    pub user_id: String,

    pub retry: RetryPolicy,
}

impl QueueOptions {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            user_id: user_id.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn dead_letter_key(&self) -> String {
        format!("{}_dead", self.storage_key)
    }
}

/// Ports the queue talks to.
///
/// 全部 `Arc<dyn _>` で受け取り、組み立ては呼び出し側（`SyncAppBuilder` など）に任せる。
#[derive(Clone)]
pub struct QueuePorts {
    pub store: Arc<dyn KeyValueStore>,
    pub reachability: Arc<dyn Reachability>,
    pub api: Arc<dyn TaskApi>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
}

/// Persisted offline action queue.
///
/// Design:
/// - The store blob is the source of truth; nothing is cached in memory.
/// - Every read-modify-write of a blob happens under `write_lock`, so an
///   `enqueue` racing a sync pass can no longer be lost.
/// - Remote dispatch happens outside `write_lock`; enqueue never waits on the network.
/// - `syncing` only excludes overlapping passes inside this process.
pub struct OfflineQueue {
    ports: QueuePorts,
    options: QueueOptions,
    syncing: AtomicBool,
    write_lock: Mutex<()>,
}

impl OfflineQueue {
    pub fn new(ports: QueuePorts, options: QueueOptions) -> Self {
        Self {
            ports,
            options,
            syncing: AtomicBool::new(false),
            write_lock: Mutex::new(()),
        }
    }

    pub fn options(&self) -> &QueueOptions {
        &self.options
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    /// Record a mutation for later replay. Returns the new action's id.
    ///
    /// The payload is not validated here; a payload the endpoint cannot use
    /// fails at replay time and stays queued like any other failure.
    pub fn enqueue(&self, kind: ActionKind, payload: Value) -> Result<ActionId, QueueError> {
        let id = self.ports.ids.generate_action_id();
        let action = OfflineAction::new(id.clone(), kind, payload, self.ports.clock.now_ms());

        let _lock = self.lock();
        let mut queue = self.read(&self.options.storage_key)?;
        queue.push(action);
        self.write(&self.options.storage_key, &queue)?;

        tracing::debug!(action_id = %id, %kind, pending = queue.len(), "queued offline action");
        Ok(id)
    }

    /// Typed variant of [`enqueue`](Self::enqueue).
    pub fn enqueue_payload<P: ActionPayload>(&self, payload: &P) -> Result<ActionId, QueueError> {
        let value = serde_json::to_value(payload).map_err(QueueError::Encode)?;
        self.enqueue(P::KIND, value)
    }

    /// Replay every queued action once, in queue order.
    ///
    /// Individual replay failures never surface as `Err`; they are retained and
    /// counted in the report. `Err` means the store itself failed.
    pub async fn sync(&self) -> Result<SyncOutcome, QueueError> {
        if !self.ports.reachability.is_online() {
            tracing::debug!("sync skipped: offline");
            return Ok(SyncOutcome::Skipped(SkipReason::Offline));
        }
        let Some(_guard) = SyncGuard::acquire(&self.syncing) else {
            tracing::debug!("sync skipped: pass already running");
            return Ok(SyncOutcome::Skipped(SkipReason::AlreadyRunning));
        };

        let snapshot = {
            let _lock = self.lock();
            self.read(&self.options.storage_key)?
        };
        if snapshot.is_empty() {
            return Ok(SyncOutcome::Empty);
        }

        tracing::info!(pending = snapshot.len(), "sync pass started");

        let now_ms = self.ports.clock.now_ms();
        let mut report = SyncReport::default();
        let mut succeeded = HashSet::new();
        let mut failures = HashMap::new();

        // 1 件ずつ順番に。前の応答が確定するまで次は送らない
        for action in &snapshot {
            if !self.options.retry.is_due(action, now_ms) {
                report.deferred += 1;
                continue;
            }
            report.total += 1;

            match replay(self.ports.api.as_ref(), action, &self.options.user_id).await {
                Ok(()) => {
                    succeeded.insert(action.id.clone());
                    report.synced += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        action_id = %action.id,
                        kind = %action.kind,
                        attempts = action.attempts + 1,
                        transient = e.is_transient(),
                        error = %e,
                        "replay failed"
                    );
                    failures.insert(action.id.clone(), e.to_string());
                }
            }
        }

        self.write_back(&succeeded, failures, &mut report)?;

        tracing::info!(
            total = report.total,
            synced = report.synced,
            failed = report.failed.len(),
            dead_lettered = report.dead_lettered.len(),
            deferred = report.deferred,
            "sync pass finished"
        );

        if report.total > 0 {
            let notification = if report.is_full_success() {
                Notification::success(report.summary())
            } else {
                Notification::warning(report.summary())
            };
            self.ports.notifier.notify(notification);
        }

        Ok(SyncOutcome::Completed(report))
    }

    /// Drop synced actions from the *current* blob, bump failure counters and
    /// move exhausted actions to the dead-letter blob.
    fn write_back(
        &self,
        succeeded: &HashSet<ActionId>,
        mut failures: HashMap<ActionId, String>,
        report: &mut SyncReport,
    ) -> Result<(), QueueError> {
        let _lock = self.lock();
        let now_ms = self.ports.clock.now_ms();
        let current = self.read(&self.options.storage_key)?;

        let mut remaining = Vec::with_capacity(current.len());
        let mut dead = Vec::new();
        for mut action in current {
            if succeeded.contains(&action.id) {
                continue;
            }
            if let Some(error) = failures.remove(&action.id) {
                action.record_failure(error, now_ms);
                if self.options.retry.is_exhausted(action.attempts) {
                    tracing::warn!(
                        action_id = %action.id,
                        kind = %action.kind,
                        attempts = action.attempts,
                        "retry budget exhausted, moving to dead letters"
                    );
                    report.dead_lettered.push(action.id.clone());
                    dead.push(action);
                    continue;
                }
                report.failed.push(action.id.clone());
            }
            remaining.push(action);
        }

        // dead letter を先に書く。途中で落ちても消えるより重複の方がまし
        if !dead.is_empty() {
            let key = self.options.dead_letter_key();
            let mut letters = self.read(&key)?;
            letters.extend(dead);
            self.write(&key, &letters)?;
        }
        self.write(&self.options.storage_key, &remaining)
    }

    /// Current queue contents in replay order.
    pub fn pending(&self) -> Result<Vec<OfflineAction>, QueueError> {
        self.read(&self.options.storage_key)
    }

    /// Actions that exhausted their retry budget.
    pub fn dead_letters(&self) -> Result<Vec<OfflineAction>, QueueError> {
        self.read(&self.options.dead_letter_key())
    }

    /// Discard all dead letters, returning how many were dropped.
    pub fn clear_dead_letters(&self) -> Result<usize, QueueError> {
        let key = self.options.dead_letter_key();
        let _lock = self.lock();
        let count = self.read(&key)?.len();
        if count > 0 {
            self.write(&key, &[])?;
        }
        Ok(count)
    }

    pub fn stats(&self) -> Result<QueueStats, QueueError> {
        Ok(QueueStats {
            pending: self.pending()?.len(),
            dead_lettered: self.dead_letters()?.len(),
            syncing: self.is_syncing(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // 中身は () なので poison されても続行してよい
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read(&self, key: &str) -> Result<Vec<OfflineAction>, QueueError> {
        let Some(raw) = self.ports.store.get(key)? else {
            return Ok(Vec::new());
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str::<Option<Vec<OfflineAction>>>(&raw)
            .map(Option::unwrap_or_default)
            .map_err(|source| QueueError::Corrupt {
                key: key.to_string(),
                source,
            })
    }

    fn write(&self, key: &str, actions: &[OfflineAction]) -> Result<(), QueueError> {
        let raw = serde_json::to_string(actions).map_err(QueueError::Encode)?;
        self.ports.store.set(key, &raw)?;
        Ok(())
    }
}
