//! Credential digest derivation
//!
//! `compute_digest` — Argon2id over the raw credential with a per-credential
//!   salt; the stored digest is only ever derived from the current salt and
//!   the current credential.
//!
//! `generate_salt` — fresh random salt, generated once per credential
//!   lifetime (rotated on credential change, never on verification).

use argon2::{Argon2, Params, Version};
use rand::RngCore;

use crate::error::LockError;

pub const SALT_LEN: usize = 16;
pub const DIGEST_LEN: usize = 32;

// Tuned for an interactive unlock prompt rather than a vault at rest.
pub const KDF_TIME_COST: u32 = 2;
pub const KDF_MEMORY_COST: u32 = 16 * 1024; // 16 MiB
pub const KDF_PARALLELISM: u32 = 1;

fn argon2_params() -> Result<Params, LockError> {
    Params::new(
        KDF_MEMORY_COST,
        KDF_TIME_COST,
        KDF_PARALLELISM,
        Some(DIGEST_LEN),
    )
    .map_err(|e| LockError::Configuration(format!("argon2 params: {e}")))
}

/// Derive the digest for `raw` under `salt`. Deterministic; a failure here
/// means the hash backend itself is unusable and the error is fatal.
pub fn compute_digest(raw: &[u8], salt: &[u8]) -> Result<[u8; DIGEST_LEN], LockError> {
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, argon2_params()?);
    let mut digest = [0u8; DIGEST_LEN];
    argon2
        .hash_password_into(raw, salt, &mut digest)
        .map_err(|e| LockError::Configuration(format!("argon2 derive: {e}")))?;
    Ok(digest)
}

/// Generate a fresh random salt. The salt is stored alongside the digest
/// (not secret) and is immutable until the credential changes.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let salt = generate_salt();
        let a = compute_digest(b"1234", &salt).unwrap();
        let b = compute_digest(b"1234", &salt).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn digest_depends_on_input() {
        let salt = generate_salt();
        let a = compute_digest(b"1234", &salt).unwrap();
        let b = compute_digest(b"1235", &salt).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn digest_depends_on_salt() {
        let a = compute_digest(b"1234", &[0u8; SALT_LEN]).unwrap();
        let b = compute_digest(b"1234", &[1u8; SALT_LEN]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn salts_are_unique() {
        assert_ne!(generate_salt(), generate_salt());
    }
}
