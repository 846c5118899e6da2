//! Drop passphrase hashing.
//!
//! Passphrases are stored only as Argon2id verifier strings.  Parameters
//! come from configuration so operators can tune cost; verification is
//! constant-time inside the `argon2` crate, and a verifier that fails to
//! parse is treated as a non-match rather than an error.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::config::Argon2Config;

/// Hashes and verifies drop passphrases with configured Argon2id params.
pub struct PassphraseHasher {
    argon: Argon2<'static>,
}

impl PassphraseHasher {
    /// Build a hasher from the configured parameters.
    pub fn new(cfg: &Argon2Config) -> anyhow::Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 parameters: {e}"))?;
        Ok(Self {
            argon: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a passphrase into a self-describing verifier string.
    pub fn hash(&self, passphrase: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon
            .hash_password(passphrase.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("passphrase hashing failed: {e}"))?;
        Ok(hash.to_string())
    }

    /// Verify a passphrase against a stored verifier.
    ///
    /// Returns `false` for non-matching passphrases AND for verifiers
    /// that fail to parse -- a corrupt hash must deny, not crash.
    pub fn verify(&self, passphrase: &str, verifier: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(verifier) else {
            return false;
        };
        self.argon
            .verify_password(passphrase.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Low-cost parameters so the test suite stays fast.
    fn test_hasher() -> PassphraseHasher {
        PassphraseHasher::new(&Argon2Config {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    #[test]
    fn hash_and_verify_round_trip() {
        let hasher = test_hasher();
        let verifier = hasher.hash("open sesame").unwrap();
        assert!(verifier.starts_with("$argon2id$"));
        assert!(hasher.verify("open sesame", &verifier));
    }

    #[test]
    fn wrong_passphrase_is_rejected() {
        let hasher = test_hasher();
        let verifier = hasher.hash("open").unwrap();
        assert!(!hasher.verify("shut", &verifier));
        assert!(!hasher.verify("", &verifier));
    }

    #[test]
    fn rehashing_rotates_the_salt() {
        let hasher = test_hasher();
        let first = hasher.hash("same").unwrap();
        let second = hasher.hash("same").unwrap();
        assert_ne!(first, second);
        assert!(hasher.verify("same", &first));
        assert!(hasher.verify("same", &second));
    }

    #[test]
    fn garbage_verifier_denies_instead_of_crashing() {
        let hasher = test_hasher();
        assert!(!hasher.verify("anything", "not-a-phc-string"));
        assert!(!hasher.verify("anything", ""));
        assert!(!hasher.verify("anything", "$argon2id$corrupt"));
    }
}
