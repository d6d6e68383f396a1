//! lockguard-core — credential verification and lockout throttling
//!
//! # Design principles
//! - NO custom crypto; digests come from Argon2id, salts from the OS RNG.
//! - Zeroize raw credential material on drop; never log it.
//! - Collaborators (settings store, device policy, trust agent) are injected
//!   at construction; no lazy global lookups.
//! - Throttled and reset-required are result variants, never exceptions.
//!
//! # Module layout
//! - `credential` — credential kinds, shape rules, per-user record
//! - `hasher`     — salted Argon2id digest derivation
//! - `throttle`   — per-user failed-attempt state machine + escalation policy
//! - `history`    — bounded credential-reuse history
//! - `store`      — settings-collaborator trait + persistence adapter
//! - `policy`     — device-policy collaborator trait
//! - `trust`      — trust-agent collaborator trait
//! - `manager`    — orchestration, per-user locking
//! - `clock`      — millisecond clock abstraction
//! - `error`      — unified error type

pub mod clock;
pub mod credential;
pub mod error;
pub mod hasher;
pub mod history;
pub mod manager;
pub mod policy;
pub mod store;
pub mod throttle;
pub mod trust;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credential::{CredentialKind, LockCredential, UserCredentialRecord};
pub use error::LockError;
pub use history::CredentialHistory;
pub use manager::{AdminCapability, LockManager, VerifyOutcome};
pub use policy::{CredentialQuality, DevicePolicy, StaticPolicy};
pub use store::{CredentialStore, MemorySettingsStore, SettingsStore};
pub use throttle::{LockState, ThrottlePolicy, ThrottleState};
pub use trust::{NoopTrustAgent, TrustAgent};
