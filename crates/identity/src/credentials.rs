//! Credential hashing boundary.
//!
//! Raw secrets are hashed at the service edge; the domain layer only ever
//! sees opaque hash strings.

use thiserror::Error;

/// bcrypt work factor for production hashing.
pub const BCRYPT_COST: u32 = 12;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential hashing failed: {0}")]
    Hash(String),
}

/// One-way hashing with verify-by-recompute.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, raw: &str) -> Result<String, CredentialError>;

    fn verify(&self, raw: &str, hash: &str) -> Result<bool, CredentialError>;
}

/// bcrypt-backed hasher (per-record salt baked into the hash string).
#[derive(Debug, Clone)]
pub struct BcryptPasswordHasher {
    cost: u32,
}

impl BcryptPasswordHasher {
    pub fn new() -> Self {
        Self { cost: BCRYPT_COST }
    }

    /// Lower-cost hasher for tests; production code uses [`BCRYPT_COST`].
    pub fn with_cost(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptPasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher for BcryptPasswordHasher {
    fn hash(&self, raw: &str) -> Result<String, CredentialError> {
        bcrypt::hash(raw, self.cost).map_err(|e| CredentialError::Hash(e.to_string()))
    }

    fn verify(&self, raw: &str, hash: &str) -> Result<bool, CredentialError> {
        bcrypt::verify(raw, hash).map_err(|e| CredentialError::Hash(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hasher = BcryptPasswordHasher::with_cost(4);
        let hash = hasher.hash("s3cret-passphrase").unwrap();
        assert_ne!(hash, "s3cret-passphrase");
        assert!(hasher.verify("s3cret-passphrase", &hash).unwrap());
        assert!(!hasher.verify("wrong-passphrase", &hash).unwrap());
    }

    #[test]
    fn same_secret_hashes_differently() {
        let hasher = BcryptPasswordHasher::with_cost(4);
        let a = hasher.hash("same-secret").unwrap();
        let b = hasher.hash("same-secret").unwrap();
        assert_ne!(a, b);
    }
}
