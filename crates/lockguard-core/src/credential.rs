use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::LockError;
use crate::hasher;
use crate::policy::CredentialQuality;

/// Minimum number of dots for a pattern to be accepted when set.
pub const MIN_LOCK_PATTERN_SIZE: usize = 4;
/// Minimum character count for a password or PIN to be accepted when set.
pub const MIN_LOCK_PASSWORD_SIZE: usize = 4;
/// Pattern attempts shorter than this never count toward the failure total;
/// it is also the step width of the lockout escalation curve.
pub const MIN_PATTERN_REGISTER_FAIL: usize = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialKind {
    None,
    Pattern,
    Pin,
    Password,
}

/// A user-entered credential. Raw bytes are zeroized on drop and never
/// appear in `Debug` output or logs.
pub struct LockCredential {
    kind: CredentialKind,
    raw: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for LockCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockCredential")
            .field("kind", &self.kind)
            .field("len", &self.raw.len())
            .finish()
    }
}

impl LockCredential {
    /// Pattern credential from the sequence of grid cells touched.
    pub fn pattern(cells: &[u8]) -> Self {
        Self {
            kind: CredentialKind::Pattern,
            raw: Zeroizing::new(cells.to_vec()),
        }
    }

    pub fn pin(digits: &str) -> Self {
        Self {
            kind: CredentialKind::Pin,
            raw: Zeroizing::new(digits.as_bytes().to_vec()),
        }
    }

    pub fn password(text: &str) -> Self {
        Self {
            kind: CredentialKind::Password,
            raw: Zeroizing::new(text.as_bytes().to_vec()),
        }
    }

    pub fn none() -> Self {
        Self {
            kind: CredentialKind::None,
            raw: Zeroizing::new(Vec::new()),
        }
    }

    pub fn kind(&self) -> CredentialKind {
        self.kind
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Shape rules applied before any throttle or hash work. Undersized
    /// input is rejected without consuming a failed attempt.
    pub fn validate_shape(&self) -> Result<(), LockError> {
        match self.kind {
            CredentialKind::None => Ok(()),
            CredentialKind::Pattern => {
                if self.raw.len() < MIN_LOCK_PATTERN_SIZE {
                    return Err(LockError::MalformedInput("pattern too short"));
                }
                if self.raw.iter().any(|c| *c > 8) {
                    return Err(LockError::MalformedInput("pattern cell out of range"));
                }
                Ok(())
            }
            CredentialKind::Pin | CredentialKind::Password => {
                if self.raw.len() < MIN_LOCK_PASSWORD_SIZE {
                    return Err(LockError::MalformedInput("password too short"));
                }
                Ok(())
            }
        }
    }

    /// Complexity class of this credential, compared against the device
    /// policy requirement on change.
    pub fn quality(&self) -> CredentialQuality {
        match self.kind {
            CredentialKind::None => CredentialQuality::Unspecified,
            CredentialKind::Pattern => CredentialQuality::Something,
            CredentialKind::Pin => CredentialQuality::Numeric,
            CredentialKind::Password => {
                let has_letter = self.raw.iter().any(u8::is_ascii_alphabetic);
                let has_digit = self.raw.iter().any(u8::is_ascii_digit);
                match (has_letter, has_digit) {
                    (true, true) => CredentialQuality::Alphanumeric,
                    (true, false) => CredentialQuality::Alphabetic,
                    _ => CredentialQuality::Numeric,
                }
            }
        }
    }
}

/// Persisted credential state for one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserCredentialRecord {
    pub user_id: i32,
    pub kind: CredentialKind,
    pub salt: Vec<u8>,
    pub digest: Vec<u8>,
    pub quality: CredentialQuality,
}

impl UserCredentialRecord {
    /// Record for a user with no credential set: empty salt and digest.
    pub fn none(user_id: i32) -> Self {
        Self {
            user_id,
            kind: CredentialKind::None,
            salt: Vec::new(),
            digest: Vec::new(),
            quality: CredentialQuality::Unspecified,
        }
    }

    pub fn from_credential(user_id: i32, credential: &LockCredential) -> Result<Self, LockError> {
        let salt = hasher::generate_salt();
        let digest = hasher::compute_digest(credential.raw(), &salt)?;
        Ok(Self {
            user_id,
            kind: credential.kind(),
            salt: salt.to_vec(),
            digest: digest.to_vec(),
            quality: credential.quality(),
        })
    }

    pub fn has_credential(&self) -> bool {
        self.kind != CredentialKind::None
    }

    /// Hash `candidate` under this record's salt and compare digests.
    pub fn matches(&self, candidate: &LockCredential) -> Result<bool, LockError> {
        if !self.has_credential() {
            return Ok(false);
        }
        let digest = hasher::compute_digest(candidate.raw(), &self.salt)?;
        Ok(digest.as_slice() == self.digest.as_slice())
    }
}
