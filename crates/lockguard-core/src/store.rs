//! Settings-backed persistence
//!
//! `SettingsStore` — the external typed key/value collaborator, scoped by
//!   user id. Every call can fail with `LockError::Transport`.
//!
//! `CredentialStore` — the adapter this core persists through: credential
//!   record, throttle state and reuse history travel as opaque JSON blobs
//!   under stable key names. Security-relevant reads and writes propagate
//!   transport errors; only the trust-usually-managed flag is best-effort.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::credential::UserCredentialRecord;
use crate::error::LockError;
use crate::history::CredentialHistory;
use crate::throttle::ThrottleState;

pub mod keys {
    pub const CREDENTIAL_RECORD: &str = "lockscreen.credential";
    pub const THROTTLE_STATE: &str = "lockscreen.throttle";
    pub const CREDENTIAL_HISTORY: &str = "lockscreen.password_history";
    pub const TRUST_USUALLY_MANAGED: &str = "trust.usually_managed";
}

/// Typed get/set of named values scoped by user id, backed by a privileged
/// settings service. Implementations must bound their own call time: a stuck
/// backend should surface `Transport`, not block the per-user lock forever.
pub trait SettingsStore: Send + Sync {
    fn get_blob(&self, user_id: i32, key: &str) -> Result<Option<Vec<u8>>, LockError>;
    fn put_blob(&self, user_id: i32, key: &str, value: &[u8]) -> Result<(), LockError>;
    fn get_bool(&self, user_id: i32, key: &str) -> Result<Option<bool>, LockError>;
    fn put_bool(&self, user_id: i32, key: &str, value: bool) -> Result<(), LockError>;
    fn delete(&self, user_id: i32, key: &str) -> Result<(), LockError>;
}

/// Persistence boundary for one subsystem's view of the settings store.
/// Opaque to other users' data: every operation takes the user id and only
/// touches that user's keys.
pub struct CredentialStore {
    settings: Arc<dyn SettingsStore>,
}

impl CredentialStore {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }

    pub fn load_record(&self, user_id: i32) -> Result<UserCredentialRecord, LockError> {
        match self.settings.get_blob(user_id, keys::CREDENTIAL_RECORD)? {
            Some(blob) => Ok(serde_json::from_slice(&blob)?),
            None => Ok(UserCredentialRecord::none(user_id)),
        }
    }

    pub fn save_record(&self, user_id: i32, record: &UserCredentialRecord) -> Result<(), LockError> {
        let blob = serde_json::to_vec(record)?;
        self.settings.put_blob(user_id, keys::CREDENTIAL_RECORD, &blob)
    }

    pub fn load_throttle(&self, user_id: i32) -> Result<ThrottleState, LockError> {
        match self.settings.get_blob(user_id, keys::THROTTLE_STATE)? {
            Some(blob) => Ok(serde_json::from_slice(&blob)?),
            None => Ok(ThrottleState::default()),
        }
    }

    pub fn save_throttle(&self, user_id: i32, state: &ThrottleState) -> Result<(), LockError> {
        let blob = serde_json::to_vec(state)?;
        self.settings.put_blob(user_id, keys::THROTTLE_STATE, &blob)
    }

    pub fn load_history(&self, user_id: i32) -> Result<CredentialHistory, LockError> {
        match self.settings.get_blob(user_id, keys::CREDENTIAL_HISTORY)? {
            Some(blob) => Ok(serde_json::from_slice(&blob)?),
            None => Ok(CredentialHistory::default()),
        }
    }

    pub fn save_history(&self, user_id: i32, history: &CredentialHistory) -> Result<(), LockError> {
        let blob = serde_json::to_vec(history)?;
        self.settings
            .put_blob(user_id, keys::CREDENTIAL_HISTORY, &blob)
    }

    /// Remove every key owned by this subsystem for `user_id`. Used on
    /// credential removal and profile deletion.
    pub fn clear_user(&self, user_id: i32) -> Result<(), LockError> {
        self.settings.delete(user_id, keys::CREDENTIAL_RECORD)?;
        self.settings.delete(user_id, keys::THROTTLE_STATE)?;
        self.settings.delete(user_id, keys::CREDENTIAL_HISTORY)?;
        self.settings.delete(user_id, keys::TRUST_USUALLY_MANAGED)?;
        Ok(())
    }

    /// Lazily-persisted flag; absent means false.
    pub fn trust_usually_managed(&self, user_id: i32) -> Result<bool, LockError> {
        Ok(self
            .settings
            .get_bool(user_id, keys::TRUST_USUALLY_MANAGED)?
            .unwrap_or(false))
    }

    /// Informational write: a transport failure is logged and swallowed
    /// rather than failing the caller.
    pub fn set_trust_usually_managed(&self, user_id: i32, managed: bool) {
        if let Err(e) = self
            .settings
            .put_bool(user_id, keys::TRUST_USUALLY_MANAGED, managed)
        {
            warn!(user_id, %e, "failed to persist trust-usually-managed flag");
        }
    }
}

/// In-process settings store. Serves as the test double and as a working
/// backend for embedders without a privileged settings service; the offline
/// switch makes every call fail with `Transport`.
#[derive(Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<(i32, String), Vec<u8>>>,
    offline: AtomicBool,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), LockError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LockError::Transport("settings store unreachable".into()));
        }
        Ok(())
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get_blob(&self, user_id: i32, key: &str) -> Result<Option<Vec<u8>>, LockError> {
        self.check_online()?;
        Ok(self.values.lock().get(&(user_id, key.to_string())).cloned())
    }

    fn put_blob(&self, user_id: i32, key: &str, value: &[u8]) -> Result<(), LockError> {
        self.check_online()?;
        self.values
            .lock()
            .insert((user_id, key.to_string()), value.to_vec());
        Ok(())
    }

    fn get_bool(&self, user_id: i32, key: &str) -> Result<Option<bool>, LockError> {
        Ok(self
            .get_blob(user_id, key)?
            .map(|v| v.first().copied() == Some(1)))
    }

    fn put_bool(&self, user_id: i32, key: &str, value: bool) -> Result<(), LockError> {
        self.put_blob(user_id, key, &[u8::from(value)])
    }

    fn delete(&self, user_id: i32, key: &str) -> Result<(), LockError> {
        self.check_online()?;
        self.values.lock().remove(&(user_id, key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::LockCredential;
    use crate::throttle::ThrottlePolicy;

    fn store() -> (Arc<MemorySettingsStore>, CredentialStore) {
        let settings = Arc::new(MemorySettingsStore::new());
        let store = CredentialStore::new(settings.clone());
        (settings, store)
    }

    #[test]
    fn missing_state_loads_as_defaults() {
        let (_, store) = store();
        assert!(!store.load_record(0).unwrap().has_credential());
        assert_eq!(store.load_throttle(0).unwrap(), ThrottleState::default());
        assert!(store.load_history(0).unwrap().is_empty());
        assert!(!store.trust_usually_managed(0).unwrap());
    }

    #[test]
    fn record_roundtrip() {
        let (_, store) = store();
        let record =
            UserCredentialRecord::from_credential(7, &LockCredential::pin("4321")).unwrap();
        store.save_record(7, &record).unwrap();
        assert_eq!(store.load_record(7).unwrap(), record);
        // scoped per user
        assert!(!store.load_record(8).unwrap().has_credential());
    }

    #[test]
    fn throttle_roundtrip() {
        let (_, store) = store();
        let mut state = ThrottleState::default();
        state.register_failure(&ThrottlePolicy::default(), 0);
        store.save_throttle(3, &state).unwrap();
        assert_eq!(store.load_throttle(3).unwrap(), state);
    }

    #[test]
    fn offline_store_surfaces_transport_error() {
        let (settings, store) = store();
        settings.set_offline(true);
        assert!(matches!(
            store.load_throttle(0),
            Err(LockError::Transport(_))
        ));
        assert!(matches!(store.load_record(0), Err(LockError::Transport(_))));
    }

    #[test]
    fn trust_flag_write_is_best_effort() {
        let (settings, store) = store();
        settings.set_offline(true);
        // must not panic or error
        store.set_trust_usually_managed(0, true);
        settings.set_offline(false);
        assert!(!store.trust_usually_managed(0).unwrap());
        store.set_trust_usually_managed(0, true);
        assert!(store.trust_usually_managed(0).unwrap());
    }

    #[test]
    fn clear_user_removes_all_keys() {
        let (_, store) = store();
        let record =
            UserCredentialRecord::from_credential(2, &LockCredential::pin("9876")).unwrap();
        store.save_record(2, &record).unwrap();
        store.set_trust_usually_managed(2, true);
        store.clear_user(2).unwrap();
        assert!(!store.load_record(2).unwrap().has_credential());
        assert!(!store.trust_usually_managed(2).unwrap());
    }
}
