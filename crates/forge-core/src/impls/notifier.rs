//! Notifier の実装
//!
//! - **TracingNotifier**: 通知を tracing イベントとして出す（CLI 用）
//! - **RecordingNotifier**: 受け取った通知を保持する（テスト・埋め込み先での表示用）

use std::sync::Mutex;

use crate::ports::{Notification, NotificationLevel, Notifier};

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => tracing::info!(target: "forge::notify", "{}", notification.message),
            NotificationLevel::Warning => tracing::warn!(target: "forge::notify", "{}", notification.message),
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.seen
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<Notification> {
        self.notifications().pop()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_notifier_keeps_order() {
        let notifier = RecordingNotifier::new();
        notifier.notify(Notification::success("first"));
        notifier.notify(Notification::warning("second"));

        let seen = notifier.notifications();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].message, "first");
        assert_eq!(notifier.last().unwrap().level, NotificationLevel::Warning);
    }
}
