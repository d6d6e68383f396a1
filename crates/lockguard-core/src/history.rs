//! Credential reuse history
//!
//! Bounded most-recent-first list of past digests, each kept with the salt
//! it was produced under. A candidate is re-hashed under every historical
//! salt before comparison; salts are not shared across entries. Consulted
//! only on credential change, never on ordinary unlock.

use serde::{Deserialize, Serialize};

use crate::error::LockError;
use crate::hasher;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub digest: Vec<u8>,
    pub salt: Vec<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialHistory {
    entries: Vec<HistoryEntry>,
}

impl CredentialHistory {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `candidate` matches any of the `depth` most recent entries.
    /// Depth 0 disables enforcement.
    pub fn would_reuse(&self, candidate: &[u8], depth: usize) -> Result<bool, LockError> {
        if depth == 0 {
            return Ok(false);
        }
        for entry in self.entries.iter().take(depth) {
            let digest = hasher::compute_digest(candidate, &entry.salt)?;
            if digest.as_slice() == entry.digest.as_slice() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Prepend an accepted credential's digest and salt, evicting the oldest
    /// entries beyond `depth`.
    pub fn record(&mut self, digest: Vec<u8>, salt: Vec<u8>, depth: usize) {
        if depth == 0 {
            return;
        }
        self.entries.insert(0, HistoryEntry { digest, salt });
        self.entries.truncate(depth);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
