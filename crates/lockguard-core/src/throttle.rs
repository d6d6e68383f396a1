//! Failed-attempt throttle
//!
//! Per-user state machine over consecutive verification failures. Lockout
//! windows are absolute deadlines recomputed against the clock on each
//! attempt; nothing runs in the background. The escalation curve is policy,
//! not hardcoded: the base timeout doubles every `escalation_step` failures
//! beyond the first timeout threshold, capped at `max_timeout_ms`.

use serde::{Deserialize, Serialize};

use crate::credential::MIN_PATTERN_REGISTER_FAIL;

/// Consecutive failures before the first timed lockout.
pub const FAILED_ATTEMPTS_BEFORE_TIMEOUT: u32 = 5;
/// Consecutive failures after which ordinary verification is rejected until
/// an administrative reset.
pub const FAILED_ATTEMPTS_BEFORE_RESET: u32 = 20;
/// Attempts of head-room below the wipe ceiling at which the caller should
/// start warning the user.
pub const FAILED_ATTEMPTS_BEFORE_WIPE_GRACE: u32 = 5;
/// Base lockout window.
pub const FAILED_ATTEMPT_TIMEOUT_MS: u64 = 30_000;
/// Ceiling for the escalated lockout window.
pub const MAX_FAILED_ATTEMPT_TIMEOUT_MS: u64 = 600_000;
/// Tick for user-visible countdowns. Presentation concern only; consumed by
/// the caller, never stored.
pub const COUNTDOWN_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Accumulating,
    LockedOut,
    ResetRequired,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThrottlePolicy {
    pub failed_attempts_before_timeout: u32,
    pub failed_attempts_before_reset: u32,
    pub wipe_grace: u32,
    pub base_timeout_ms: u64,
    /// Failures per doubling of the timeout, beyond the first threshold.
    pub escalation_step: u32,
    pub max_timeout_ms: u64,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            failed_attempts_before_timeout: FAILED_ATTEMPTS_BEFORE_TIMEOUT,
            failed_attempts_before_reset: FAILED_ATTEMPTS_BEFORE_RESET,
            wipe_grace: FAILED_ATTEMPTS_BEFORE_WIPE_GRACE,
            base_timeout_ms: FAILED_ATTEMPT_TIMEOUT_MS,
            escalation_step: MIN_PATTERN_REGISTER_FAIL as u32,
            max_timeout_ms: MAX_FAILED_ATTEMPT_TIMEOUT_MS,
        }
    }
}

impl ThrottlePolicy {
    /// Lockout window owed after `failed_attempts` consecutive failures.
    /// Zero below the first threshold.
    pub fn timeout_for(&self, failed_attempts: u32) -> u64 {
        if failed_attempts < self.failed_attempts_before_timeout {
            return 0;
        }
        let steps = (failed_attempts - self.failed_attempts_before_timeout)
            / self.escalation_step.max(1);
        // saturate: a doubling that would shift bits out of the u64 is
        // already past any sane cap
        self.base_timeout_ms
            .checked_shl(steps)
            .filter(|t| t >> steps == self.base_timeout_ms)
            .unwrap_or(self.max_timeout_ms)
            .min(self.max_timeout_ms)
    }
}

/// Persisted throttle state for one user. `lockout_duration_ms` records the
/// window length that was set with the deadline so a wall-clock rollback can
/// never stretch an active lockout past the duration originally owed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThrottleState {
    pub failed_attempts: u32,
    pub lockout_deadline_ms: Option<i64>,
    pub lockout_duration_ms: u64,
}

impl ThrottleState {
    pub fn state(&self, policy: &ThrottlePolicy, now_ms: i64) -> LockState {
        if self.failed_attempts >= policy.failed_attempts_before_reset {
            LockState::ResetRequired
        } else if self.remaining_ms(now_ms) > 0 {
            LockState::LockedOut
        } else if self.failed_attempts > 0 {
            LockState::Accumulating
        } else {
            LockState::Unlocked
        }
    }

    /// Milliseconds left in the active lockout window, zero if none.
    /// Clamped to the persisted duration against clock rollback.
    pub fn remaining_ms(&self, now_ms: i64) -> u64 {
        match self.lockout_deadline_ms {
            Some(deadline) if deadline > now_ms => {
                ((deadline - now_ms) as u64).min(self.lockout_duration_ms)
            }
            _ => 0,
        }
    }

    /// Drop an elapsed deadline. Leaving `LockedOut` clears it as a side
    /// effect of the next processed attempt.
    pub fn clear_expired(&mut self, now_ms: i64) {
        if self.lockout_deadline_ms.is_some() && self.remaining_ms(now_ms) == 0 {
            self.lockout_deadline_ms = None;
            self.lockout_duration_ms = 0;
        }
    }

    /// Successful verification: counter and deadline cleared, from any state.
    pub fn register_success(&mut self) {
        *self = Self::default();
    }

    /// Count a verification failure and recompute the lockout window.
    /// Returns the window length set, zero if still accumulating.
    pub fn register_failure(&mut self, policy: &ThrottlePolicy, now_ms: i64) -> u64 {
        self.failed_attempts += 1;
        let timeout = policy.timeout_for(self.failed_attempts);
        if timeout > 0 {
            self.lockout_deadline_ms = Some(now_ms + timeout as i64);
            self.lockout_duration_ms = timeout;
        } else {
            self.lockout_deadline_ms = None;
            self.lockout_duration_ms = 0;
        }
        timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ThrottlePolicy {
        ThrottlePolicy::default()
    }

    #[test]
    fn accumulates_below_threshold() {
        let p = policy();
        let mut s = ThrottleState::default();
        for i in 1..FAILED_ATTEMPTS_BEFORE_TIMEOUT {
            assert_eq!(s.register_failure(&p, 0), 0);
            assert_eq!(s.failed_attempts, i);
            assert_eq!(s.state(&p, 0), LockState::Accumulating);
        }
    }

    #[test]
    fn fifth_failure_locks_out() {
        let p = policy();
        let mut s = ThrottleState::default();
        for _ in 0..4 {
            s.register_failure(&p, 1_000);
        }
        let timeout = s.register_failure(&p, 1_000);
        assert_eq!(timeout, FAILED_ATTEMPT_TIMEOUT_MS);
        assert_eq!(s.lockout_deadline_ms, Some(1_000 + timeout as i64));
        assert_eq!(s.state(&p, 1_000), LockState::LockedOut);
        assert_eq!(s.remaining_ms(1_000), timeout);
    }

    #[test]
    fn window_elapses_and_clears() {
        let p = policy();
        let mut s = ThrottleState::default();
        for _ in 0..5 {
            s.register_failure(&p, 0);
        }
        let after = FAILED_ATTEMPT_TIMEOUT_MS as i64 + 1;
        assert_eq!(s.remaining_ms(after), 0);
        assert_eq!(s.state(&p, after), LockState::Accumulating);
        s.clear_expired(after);
        assert_eq!(s.lockout_deadline_ms, None);
    }

    #[test]
    fn escalation_doubles_every_step_and_caps() {
        let p = policy();
        assert_eq!(p.timeout_for(4), 0);
        assert_eq!(p.timeout_for(5), 30_000);
        assert_eq!(p.timeout_for(7), 30_000);
        assert_eq!(p.timeout_for(8), 60_000);
        assert_eq!(p.timeout_for(11), 120_000);
        assert_eq!(p.timeout_for(14), 240_000);
        assert_eq!(p.timeout_for(17), 480_000);
        // capped
        assert_eq!(p.timeout_for(200), MAX_FAILED_ATTEMPT_TIMEOUT_MS);
    }

    #[test]
    fn escalation_saturates_at_cap_for_high_failure_counts() {
        // a policy with no reset ceiling keeps escalating indefinitely; the
        // doublings must pin at the cap, never wrap through zero
        let p = ThrottlePolicy {
            failed_attempts_before_reset: u32::MAX,
            ..ThrottlePolicy::default()
        };
        // steps 60..=63 shift every set bit of base_timeout_ms out of a u64
        for failed in [185, 190, 193, 196, 1_000, u32::MAX] {
            assert_eq!(
                p.timeout_for(failed),
                MAX_FAILED_ATTEMPT_TIMEOUT_MS,
                "failure {failed} owes the capped lockout window"
            );
        }
    }

    #[test]
    fn clock_rollback_cannot_stretch_window() {
        let p = policy();
        let mut s = ThrottleState::default();
        for _ in 0..5 {
            s.register_failure(&p, 1_000_000);
        }
        // clock rolled back well before the failure time
        assert_eq!(s.remaining_ms(0), FAILED_ATTEMPT_TIMEOUT_MS);
    }

    #[test]
    fn success_resets_from_any_state() {
        let p = policy();
        let mut s = ThrottleState::default();
        for _ in 0..6 {
            s.register_failure(&p, 0);
        }
        s.register_success();
        assert_eq!(s, ThrottleState::default());
        assert_eq!(s.state(&p, 0), LockState::Unlocked);
    }

    #[test]
    fn reset_required_at_ceiling_regardless_of_time() {
        let p = policy();
        let mut s = ThrottleState::default();
        for _ in 0..FAILED_ATTEMPTS_BEFORE_RESET {
            s.register_failure(&p, 0);
        }
        assert_eq!(s.state(&p, 0), LockState::ResetRequired);
        // far in the future, still reset-required
        assert_eq!(s.state(&p, i64::MAX / 2), LockState::ResetRequired);
    }
}
