//! Key records: the immutable, versioned unit of key material
//!
//! A record is minted once by a registry and never changes afterwards.
//! Material is derived from the operator's configured secret, so the same
//! secret always yields the same record contents (minus version/timestamp).

use std::fmt;

use chrono::{DateTime, Utc};
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::aliases::{FieldKey32, SecretPhrase};
use crate::consts::{KDF_SALT, KEY_SIZE};
use crate::core::util::{constant_time_eq, key_fingerprint};
use crate::enums::EncryptionAlgorithm;
use crate::error::{CoreError, Result};

/// Registry-assigned key version; the first record is `1`
pub type KeyVersion = u32;

pub struct KeyRecord {
    version: KeyVersion,
    secret: FieldKey32,
    fingerprint: String,
    algorithm: EncryptionAlgorithm,
    created_at: DateTime<Utc>,
}

impl KeyRecord {
    pub fn new(
        version: KeyVersion,
        secret: FieldKey32,
        algorithm: EncryptionAlgorithm,
        created_at: DateTime<Utc>,
    ) -> Self {
        let fingerprint = key_fingerprint(secret.expose_secret());
        Self {
            version,
            secret,
            fingerprint,
            algorithm,
            created_at,
        }
    }

    pub fn version(&self) -> KeyVersion {
        self.version
    }

    /// Raw key material (use with caution)
    pub fn secret(&self) -> &FieldKey32 {
        &self.secret
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn algorithm(&self) -> EncryptionAlgorithm {
        self.algorithm
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// True when this record was minted from exactly `material`
    pub fn holds(&self, material: &FieldKey32) -> bool {
        constant_time_eq(self.secret.expose_secret(), material.expose_secret())
    }

    pub fn info(&self) -> KeyInfo {
        KeyInfo {
            version: self.version,
            fingerprint: self.fingerprint.clone(),
            algorithm: self.algorithm,
            created_at: self.created_at,
        }
    }
}

impl fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRecord")
            .field("version", &self.version)
            .field("secret", &"[REDACTED]")
            .field("fingerprint", &self.fingerprint)
            .field("algorithm", &self.algorithm)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Secret-free view of a key record for history listings and exports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
    pub version: KeyVersion,
    pub fingerprint: String,
    pub algorithm: EncryptionAlgorithm,
    pub created_at: DateTime<Utc>,
}

/// Derive 256-bit key material from a configured passphrase with HKDF-SHA256.
///
/// Deterministic: the resolver relies on this to tell whether the configured
/// secret still matches the latest stored record.
pub fn derive_key_material(
    secret: &SecretPhrase,
    algorithm: EncryptionAlgorithm,
) -> Result<FieldKey32> {
    if algorithm.key_len() != KEY_SIZE {
        return Err(CoreError::Config(format!(
            "{algorithm} needs a {}-byte key",
            algorithm.key_len()
        )));
    }

    let hkdf = Hkdf::<Sha256>::new(Some(KDF_SALT), secret.expose_secret().as_bytes());
    let info = format!("encrypted-field-vault:{algorithm}:key-record");

    let mut okm = [0u8; KEY_SIZE];
    hkdf.expand(info.as_bytes(), &mut okm)
        .map_err(|e| CoreError::Config(format!("key derivation error: {e}")))?;
    let key = FieldKey32::new(okm);
    okm.zeroize();
    Ok(key)
}
