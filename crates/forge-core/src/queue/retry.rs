//! Retry policy: how long a failed action waits and when it is given up on.

use std::time::Duration;

use crate::domain::OfflineAction;

/// Retry policy for actions whose replay failed.
///
/// The default (`unbounded`) keeps every failed action and re-sends it on the
/// very next pass, forever. That is the at-least-once behavior the web client
/// shipped with; a cap and a backoff are opt-in.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Give up (dead-letter) once an action has failed this many times.
    /// `None` = never give up.
    pub max_attempts: Option<u32>,

    /// Delay after the first failure. Zero disables backoff.
    pub base_delay: Duration,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,

    /// Upper bound for a single backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl RetryPolicy {
    /// Retry on every pass, never dead-letter.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            base_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::from_secs(60 * 60),
        }
    }

    /// Capped policy with exponential backoff (2s base, 2.0 multiplier).
    pub fn capped(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            ..Self::unbounded()
        }
    }

    /// Delay before the next replay, given how many times the action has failed.
    ///
    /// delay = base_delay * multiplier^(attempts - 1), clamped to `max_delay`.
    /// Example with base_delay=2s, multiplier=2.0:
    /// - 1 failure: 2s
    /// - 2 failures: 4s
    /// - 3 failures: 8s
    pub fn next_delay(&self, attempts: u32) -> Duration {
        if attempts == 0 || self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempts.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay_secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !delay_secs.is_finite() || delay_secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(delay_secs)
    }

    /// Has an action with this many failures used up its budget?
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }

    /// Is the action outside its backoff window at `now_ms`?
    pub fn is_due(&self, action: &OfflineAction, now_ms: i64) -> bool {
        let Some(last) = action.last_attempt_at else {
            return true;
        };
        let delay_ms = i64::try_from(self.next_delay(action.attempts).as_millis()).unwrap_or(i64::MAX);
        now_ms >= last.saturating_add(delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActionId, ActionKind};
    use serde_json::json;
    use ulid::Ulid;

    fn failed_action(attempts: u32, last_attempt_at: i64) -> OfflineAction {
        let mut action = OfflineAction::new(
            ActionId::from_ulid(Ulid::new()),
            ActionKind::CompleteTask,
            json!({ "id": "t-1" }),
            0,
        );
        action.attempts = attempts;
        action.last_attempt_at = Some(last_attempt_at);
        action
    }

    #[test]
    fn default_policy_never_gives_up_and_never_waits() {
        let policy = RetryPolicy::default();

        assert!(!policy.is_exhausted(u32::MAX));
        assert_eq!(policy.next_delay(10), Duration::ZERO);
        assert!(policy.is_due(&failed_action(10, 1_000), 1_000));
    }

    #[test]
    fn exponential_backoff_increases() {
        let policy = RetryPolicy::capped(5);

        assert_eq!(policy.next_delay(0), Duration::ZERO);
        assert_eq!(policy.next_delay(1), Duration::from_secs(2));
        assert_eq!(policy.next_delay(2), Duration::from_secs(4));
        assert_eq!(policy.next_delay(3), Duration::from_secs(8));
    }

    #[test]
    fn backoff_is_clamped() {
        let policy = RetryPolicy {
            max_delay: Duration::from_secs(10),
            ..RetryPolicy::capped(100)
        };

        assert_eq!(policy.next_delay(4), Duration::from_secs(10));
        assert_eq!(policy.next_delay(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn exhaustion_follows_max_attempts() {
        let policy = RetryPolicy::capped(3);

        assert!(!policy.is_exhausted(2));
        assert!(policy.is_exhausted(3));
    }

    #[test]
    fn due_after_backoff_window() {
        let policy = RetryPolicy::capped(5);
        let action = failed_action(2, 10_000); // 4s window

        assert!(!policy.is_due(&action, 13_999));
        assert!(policy.is_due(&action, 14_000));
    }
}
