//! Outcome model: what one sync pass did.
//!
//! The queue never raises per-action failures out of `sync()`; everything a
//! caller (or the notification surface) needs to know ends up here.

use serde::{Deserialize, Serialize};

use super::ids::ActionId;

/// Why a sync request did no work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Offline,
    AlreadyRunning,
}

/// Result of a single `sync()` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "report", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Guard short-circuit: nothing was read or sent.
    Skipped(SkipReason),

    /// The queue was empty; no notification is emitted.
    Empty,

    /// At least one action was considered.
    Completed(SyncReport),
}

impl SyncOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// Aggregate result of a pass.
///
/// `total` counts only actions that were dispatched; actions still inside their
/// backoff window are reported in `deferred` and do not appear in "X of Y".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub total: usize,
    pub synced: usize,
    pub failed: Vec<ActionId>,
    pub dead_lettered: Vec<ActionId>,
    pub deferred: usize,
}

impl SyncReport {
    pub fn is_full_success(&self) -> bool {
        self.synced == self.total
    }

    /// User-facing one-liner for the notification surface.
    pub fn summary(&self) -> String {
        if self.is_full_success() {
            let noun = if self.synced == 1 { "action" } else { "actions" };
            format!("Synced {} offline {noun}", self.synced)
        } else {
            format!("{} of {} synced", self.synced, self.total)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn summary_for_full_success() {
        let report = SyncReport {
            total: 3,
            synced: 3,
            ..SyncReport::default()
        };
        assert!(report.is_full_success());
        assert_eq!(report.summary(), "Synced 3 offline actions");

        let single = SyncReport {
            total: 1,
            synced: 1,
            ..SyncReport::default()
        };
        assert_eq!(single.summary(), "Synced 1 offline action");
    }

    #[test]
    fn summary_for_partial_failure() {
        let report = SyncReport {
            total: 3,
            synced: 2,
            failed: vec![ActionId::from_ulid(Ulid::new())],
            ..SyncReport::default()
        };
        assert!(!report.is_full_success());
        assert_eq!(report.summary(), "2 of 3 synced");
    }

    #[test]
    fn only_completed_has_report() {
        assert!(SyncOutcome::Empty.report().is_none());
        assert!(SyncOutcome::Skipped(SkipReason::Offline).report().is_none());
        assert!(
            SyncOutcome::Completed(SyncReport::default())
                .report()
                .is_some()
        );
    }
}
