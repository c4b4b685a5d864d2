//! The shared secret that authorizes remote purge requests.

use std::fmt::{Debug, Formatter};

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use super::error::DomainError;

const FINGERPRINT_LEN: usize = 8;

/// Opaque, non-empty purge secret.
///
/// Key material is the hex-encoded SHA-256 of two random v4 UUIDs, so every
/// generated key is 64 characters drawn from the operating system CSPRNG.
/// `Debug` never prints the secret; use [`PurgeKey::fingerprint`] in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct PurgeKey(String);

impl PurgeKey {
    /// Wrap a stored value, rejecting blank strings.
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::validation("purge key must not be empty"));
        }
        Ok(Self(value))
    }

    /// Produce a fresh, unpredictable key.
    pub fn generate() -> Self {
        let seed = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        Self(hex::encode(hash_bytes(&seed)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare a presented token against this key without leaking the
    /// position of the first differing byte.
    pub fn matches(&self, candidate: &str) -> bool {
        let expected = hash_bytes(&self.0);
        let presented = hash_bytes(candidate);
        expected.ct_eq(&presented).unwrap_u8() == 1
    }

    /// Short, non-reversible identifier safe to write to logs.
    pub fn fingerprint(&self) -> String {
        let mut digest = hex::encode(hash_bytes(&self.0));
        digest.truncate(FINGERPRINT_LEN);
        digest
    }
}

impl Debug for PurgeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PurgeKey")
            .field(&format_args!("{}…", self.fingerprint()))
            .finish()
    }
}

fn hash_bytes(value: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hasher.finalize().to_vec()
}
