use time::{Duration, OffsetDateTime};

use crate::config::SecurityConfig;

/// Lockout thresholds, taken from config so tests can shrink them.
#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    pub max_failures: i32,
    pub lockout: Duration,
}

impl LockoutPolicy {
    pub fn from_config(security: &SecurityConfig) -> Self {
        Self {
            max_failures: security.max_failed_logins,
            lockout: Duration::minutes(security.lockout_minutes),
        }
    }
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failures: 5,
            lockout: Duration::minutes(15),
        }
    }
}

/// The per-user slice of guard state, as stored on the user row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardState {
    pub failed_attempts: i32,
    pub locked_until: Option<OffsetDateTime>,
}

impl GuardState {
    pub fn clear() -> Self {
        Self {
            failed_attempts: 0,
            locked_until: None,
        }
    }
}

impl LockoutPolicy {
    /// A lockout only counts while its expiry is still in the future.
    pub fn is_locked(&self, state: GuardState, now: OffsetDateTime) -> bool {
        matches!(state.locked_until, Some(until) if until > now)
    }

    /// One more failed attempt. Reaching the threshold sets (or extends)
    /// the lockout window from the time of this failure.
    pub fn on_failure(&self, state: GuardState, now: OffsetDateTime) -> GuardState {
        let failed_attempts = state.failed_attempts + 1;
        let locked_until = if failed_attempts >= self.max_failures {
            Some(now + self.lockout)
        } else {
            state.locked_until
        };
        GuardState {
            failed_attempts,
            locked_until,
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(minutes: i64) -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + Duration::minutes(minutes)
    }

    #[test]
    fn fifth_failure_locks_for_fifteen_minutes() {
        let policy = LockoutPolicy::default();
        let mut state = GuardState::clear();
        for _ in 0..4 {
            state = policy.on_failure(state, at(0));
            assert!(state.locked_until.is_none());
        }
        state = policy.on_failure(state, at(0));
        assert_eq!(state.failed_attempts, 5);
        assert_eq!(state.locked_until, Some(at(15)));
    }

    #[test]
    fn locked_only_while_expiry_in_future() {
        let policy = LockoutPolicy::default();
        let state = GuardState {
            failed_attempts: 5,
            locked_until: Some(at(15)),
        };
        assert!(policy.is_locked(state, at(14)));
        assert!(!policy.is_locked(state, at(15)));
        assert!(!policy.is_locked(state, at(30)));
    }

    #[test]
    fn success_resets_counter_and_lockout() {
        let policy = LockoutPolicy::default();
        let mut state = GuardState::clear();
        for _ in 0..5 {
            state = policy.on_failure(state, at(0));
        }
        assert!(policy.is_locked(state, at(1)));
        state = GuardState::clear();
        assert_eq!(state.failed_attempts, 0);
        assert!(!policy.is_locked(state, at(1)));
    }

    #[test]
    fn failures_past_threshold_extend_the_window() {
        let policy = LockoutPolicy::default();
        let mut state = GuardState {
            failed_attempts: 5,
            locked_until: Some(at(15)),
        };
        state = policy.on_failure(state, at(10));
        assert_eq!(state.failed_attempts, 6);
        assert_eq!(state.locked_until, Some(at(25)));
    }

    #[test]
    fn cleared_state_is_not_locked() {
        let policy = LockoutPolicy::default();
        assert!(!policy.is_locked(GuardState::clear(), at(0)));
    }
}
