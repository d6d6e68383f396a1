//! Verification and credential-change orchestration
//!
//! `LockManager` wires the hasher, throttle, history guard and store adapter
//! together behind the three injected collaborators (settings store, device
//! policy, trust agent). One logical lock per user id serializes the
//! read-modify-write critical sections; callers on different users never
//! block each other. Every throttle transition is persisted before the call
//! returns, so a restart mid-lockout keeps the deadline.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::credential::{CredentialKind, LockCredential, UserCredentialRecord};
use crate::error::LockError;
use crate::policy::DevicePolicy;
use crate::store::{CredentialStore, SettingsStore};
use crate::throttle::{LockState, ThrottlePolicy, ThrottleState};
use crate::trust::TrustAgent;

/// Outcome of a verification attempt. `Throttled` and `ResetRequired` are
/// ordinary outcomes, not errors: the credential itself was never judged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    /// Wrong credential. `timeout_ms` is the lockout window this failure
    /// started, zero while still accumulating.
    Rejected { failed_attempts: u32, timeout_ms: u64 },
    /// Active lockout; retry after `timeout_ms`. The attempt was not hashed
    /// and did not count.
    Throttled { timeout_ms: u64 },
    /// Failure ceiling reached; only an administrative reset unblocks.
    ResetRequired,
}

/// Capability for privileged operations (credential change, administrative
/// reset, user removal). Obtain one from the caller's authorization layer
/// after its permission check has passed; this core does not re-check
/// caller identity.
#[derive(Debug, Clone, Copy)]
pub struct AdminCapability(());

impl AdminCapability {
    pub fn granted() -> Self {
        Self(())
    }
}

pub struct LockManager {
    store: CredentialStore,
    policy: Arc<dyn DevicePolicy>,
    trust: Arc<dyn TrustAgent>,
    clock: Arc<dyn Clock>,
    throttle_policy: ThrottlePolicy,
    user_locks: Mutex<HashMap<i32, Arc<Mutex<()>>>>,
}

impl LockManager {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        policy: Arc<dyn DevicePolicy>,
        trust: Arc<dyn TrustAgent>,
    ) -> Self {
        Self::with_parts(
            settings,
            policy,
            trust,
            Arc::new(SystemClock),
            ThrottlePolicy::default(),
        )
    }

    pub fn with_parts(
        settings: Arc<dyn SettingsStore>,
        policy: Arc<dyn DevicePolicy>,
        trust: Arc<dyn TrustAgent>,
        clock: Arc<dyn Clock>,
        throttle_policy: ThrottlePolicy,
    ) -> Self {
        Self {
            store: CredentialStore::new(settings),
            policy,
            trust,
            clock,
            throttle_policy,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    fn user_lock(&self, user_id: i32) -> Arc<Mutex<()>> {
        self.user_locks
            .lock()
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Verify `credential` for `user_id`.
    ///
    /// Undersized input is rejected as `MalformedInput` before any throttle
    /// state is touched. During an active lockout the attempt is refused
    /// without hashing and without counting. Transport failures from the
    /// settings store propagate; they are never read as "no prior failures".
    pub fn verify_credential(
        &self,
        user_id: i32,
        credential: &LockCredential,
    ) -> Result<VerifyOutcome, LockError> {
        if credential.kind() == CredentialKind::None {
            return Err(LockError::MalformedInput("empty credential"));
        }
        credential.validate_shape()?;

        let lock = self.user_lock(user_id);
        let _guard = lock.lock();

        let mut throttle = self.store.load_throttle(user_id)?;
        let now = self.clock.now_ms();
        match throttle.state(&self.throttle_policy, now) {
            LockState::ResetRequired => return Ok(VerifyOutcome::ResetRequired),
            LockState::LockedOut => {
                return Ok(VerifyOutcome::Throttled {
                    timeout_ms: throttle.remaining_ms(now),
                })
            }
            LockState::Unlocked | LockState::Accumulating => {}
        }
        throttle.clear_expired(now);

        let record = self.store.load_record(user_id)?;
        if !record.has_credential() {
            return Ok(VerifyOutcome::Verified);
        }

        if record.matches(credential)? {
            throttle.register_success();
            self.store.save_throttle(user_id, &throttle)?;
            debug!(user_id, "credential verified");
            if let Err(e) = self.trust.user_present(user_id) {
                warn!(user_id, %e, "trust agent user_present notification failed");
            }
            return Ok(VerifyOutcome::Verified);
        }

        let timeout_ms = throttle.register_failure(&self.throttle_policy, now);
        self.store.save_throttle(user_id, &throttle)?;
        debug!(
            user_id,
            failed_attempts = throttle.failed_attempts,
            timeout_ms,
            "credential rejected"
        );
        if throttle.failed_attempts >= self.throttle_policy.failed_attempts_before_reset {
            return Ok(VerifyOutcome::ResetRequired);
        }
        Ok(VerifyOutcome::Rejected {
            failed_attempts: throttle.failed_attempts,
            timeout_ms,
        })
    }

    /// Set or replace the user's credential. Runs the reuse-history check at
    /// the policy-configured depth, rotates the salt, persists the new
    /// record and clears throttle state. A `None` credential clears.
    pub fn set_credential(
        &self,
        user_id: i32,
        new: &LockCredential,
        admin: &AdminCapability,
    ) -> Result<(), LockError> {
        if new.kind() == CredentialKind::None {
            return self.clear_credential(user_id, admin);
        }
        new.validate_shape()?;
        if new.quality() < self.policy.required_quality(user_id) {
            return Err(LockError::InsufficientQuality);
        }

        let lock = self.user_lock(user_id);
        let _guard = lock.lock();

        let depth = self.policy.history_depth(user_id);
        let mut history = self.store.load_history(user_id)?;
        if history.would_reuse(new.raw(), depth)? {
            return Err(LockError::ReusedCredential);
        }

        let record = UserCredentialRecord::from_credential(user_id, new)?;
        self.store.save_record(user_id, &record)?;
        history.record(record.digest.clone(), record.salt.clone(), depth);
        self.store.save_history(user_id, &history)?;
        self.store.save_throttle(user_id, &ThrottleState::default())?;
        debug!(user_id, kind = ?record.kind, "credential changed");
        Ok(())
    }

    /// Remove the user's credential: kind reset to none, salt and digest
    /// wiped, history and throttle state cleared. The trust-usually-managed
    /// flag survives credential removal.
    pub fn clear_credential(
        &self,
        user_id: i32,
        _admin: &AdminCapability,
    ) -> Result<(), LockError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock();
        self.store
            .save_record(user_id, &UserCredentialRecord::none(user_id))?;
        let mut history = self.store.load_history(user_id)?;
        history.clear();
        self.store.save_history(user_id, &history)?;
        self.store.save_throttle(user_id, &ThrottleState::default())?;
        debug!(user_id, "credential cleared");
        Ok(())
    }

    /// Profile deletion: drop every persisted key for this user. The
    /// user's lock-map entry stays: another caller may already hold its
    /// `Arc`, and a replacement mutex would let two critical sections for
    /// the same user run concurrently.
    pub fn remove_user(&self, user_id: i32, _admin: &AdminCapability) -> Result<(), LockError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock();
        self.store.clear_user(user_id)?;
        Ok(())
    }

    /// Administrative lockout reset, the alternate path out of
    /// `ResetRequired`.
    pub fn reset_lockout(&self, user_id: i32, _admin: &AdminCapability) -> Result<(), LockError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock();
        self.store.save_throttle(user_id, &ThrottleState::default())?;
        debug!(user_id, "lockout state reset");
        Ok(())
    }

    pub fn failed_attempts(&self, user_id: i32) -> Result<u32, LockError> {
        Ok(self.store.load_throttle(user_id)?.failed_attempts)
    }

    /// Milliseconds left in the active lockout window, zero if none. The
    /// caller drives any countdown display from this at
    /// `COUNTDOWN_INTERVAL_MS` granularity.
    pub fn lockout_remaining_ms(&self, user_id: i32) -> Result<u64, LockError> {
        let throttle = self.store.load_throttle(user_id)?;
        Ok(throttle.remaining_ms(self.clock.now_ms()))
    }

    /// Absolute timestamp of the active lockout deadline, `None` when no
    /// window is set. `lockout_remaining_ms` is the clamped view of the
    /// same state; prefer it for countdowns.
    pub fn lockout_deadline(&self, user_id: i32) -> Result<Option<i64>, LockError> {
        Ok(self.store.load_throttle(user_id)?.lockout_deadline_ms)
    }

    /// Attempts left before the wipe ceiling, `None` when no wipe policy is
    /// in force. Wipe execution is the policy layer's responsibility.
    pub fn remaining_attempts_before_wipe(&self, user_id: i32) -> Result<Option<u32>, LockError> {
        let max = self.policy.max_failed_for_wipe(user_id);
        if max == 0 {
            return Ok(None);
        }
        let failed = self.store.load_throttle(user_id)?.failed_attempts;
        Ok(Some(max.saturating_sub(failed)))
    }

    /// Whether the caller should start showing a wipe warning.
    pub fn wipe_warning_active(&self, user_id: i32) -> Result<bool, LockError> {
        match self.remaining_attempts_before_wipe(user_id)? {
            Some(remaining) => Ok(remaining <= self.throttle_policy.wipe_grace),
            None => Ok(false),
        }
    }

    /// Trust reporting path: persist the usually-managed flag (best-effort)
    /// and notify the trust agent. The flag is mutated only through here.
    pub fn report_trust_usually_managed(&self, user_id: i32, managed: bool) {
        self.store.set_trust_usually_managed(user_id, managed);
        if let Err(e) = self.trust.trust_usually_managed_changed(user_id, managed) {
            warn!(user_id, %e, "trust agent flag notification failed");
        }
    }

    pub fn is_trust_usually_managed(&self, user_id: i32) -> Result<bool, LockError> {
        self.store.trust_usually_managed(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::StaticPolicy;
    use crate::store::MemorySettingsStore;
    use crate::trust::NoopTrustAgent;

    fn manager() -> LockManager {
        LockManager::new(
            Arc::new(MemorySettingsStore::new()),
            Arc::new(StaticPolicy::default()),
            Arc::new(NoopTrustAgent),
        )
    }

    #[test]
    fn user_lock_identity_survives_user_removal() {
        let manager = manager();
        let before = manager.user_lock(9);
        manager.remove_user(9, &AdminCapability::granted()).unwrap();
        let after = manager.user_lock(9);
        // a fresh mutex here would let a caller still holding the old Arc
        // race a new critical section for the same user
        assert!(Arc::ptr_eq(&before, &after));
    }
}
