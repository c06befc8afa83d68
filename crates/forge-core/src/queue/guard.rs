//! SyncGuard - `sync_in_progress` フラグのスコープ付き確保
//!
//! 取得に成功したら、ガードが drop されるまでフラグは立ったまま。
//! 早期 return・エラー・panic・future のキャンセルのどれでも drop で必ず下ろされる。

use std::sync::atomic::{AtomicBool, Ordering};

pub(crate) struct SyncGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SyncGuard<'a> {
    /// 他の pass が走っていれば None
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_release() {
        let flag = AtomicBool::new(false);

        let guard = SyncGuard::acquire(&flag).unwrap();
        assert!(SyncGuard::acquire(&flag).is_none());
        assert!(flag.load(Ordering::Acquire));

        drop(guard);
        assert!(!flag.load(Ordering::Acquire));
        assert!(SyncGuard::acquire(&flag).is_some());
    }

    #[test]
    fn released_on_panic() {
        let flag = AtomicBool::new(false);

        let result = std::panic::catch_unwind(|| {
            let _guard = SyncGuard::acquire(&flag).unwrap();
            panic!("boom");
        });

        assert!(result.is_err());
        assert!(!flag.load(Ordering::Acquire));
    }
}
