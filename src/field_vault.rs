//! Field vault: the encryption facade surrounding services call
//!
//! Every encrypted attribute is stored as a `(ciphertext, key_version)` pair.
//! Encryption always uses the resolver's current key; decryption always uses
//! the key the pair names, however old. Nothing is re-encrypted implicitly:
//! a value moves to a newer key only when its plaintext is explicitly updated.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aliases::SecretPhrase;
use crate::config::EncryptionSettings;
use crate::core::crypto::FieldCipher;
use crate::core::key::{KeyInfo, KeyRecord, KeyVersion};
use crate::core::util::constant_time_eq;
use crate::error::{CoreError, Result};
use crate::registry::KeyRegistry;
use crate::resolver::KeyResolver;

/// One encrypted attribute as persisted by its owning entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedValue {
    /// Base64 ciphertext
    pub ciphertext: String,
    /// Version of the key that produced `ciphertext`
    pub key_version: KeyVersion,
}

/// Several attributes of one entity sharing a single key-version column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedFields {
    pub key_version: KeyVersion,
    pub ciphertexts: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RotationResult {
    pub previous_version: KeyVersion,
    pub new_version: KeyVersion,
    pub fingerprint: String,
}

impl RotationResult {
    /// False when the supplied secret was already current
    pub fn rotated(&self) -> bool {
        self.new_version != self.previous_version
    }
}

impl fmt::Display for RotationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rotated() {
            write!(
                f,
                "v{} -> v{} ({})",
                self.previous_version, self.new_version, self.fingerprint
            )
        } else {
            write!(f, "v{} unchanged ({})", self.new_version, self.fingerprint)
        }
    }
}

pub struct FieldVault<R: KeyRegistry> {
    resolver: KeyResolver<R>,
    cipher: FieldCipher,
}

impl<R: KeyRegistry> FieldVault<R> {
    /// Resolve the current key and build the facade; fails fatally on bad config
    pub fn open(registry: Arc<R>, settings: &EncryptionSettings) -> Result<Self> {
        let resolver = KeyResolver::initialize(registry, settings)?;
        Ok(Self::with_resolver(resolver))
    }

    pub fn with_resolver(resolver: KeyResolver<R>) -> Self {
        let cipher = FieldCipher::new(resolver.algorithm());
        Self { resolver, cipher }
    }

    pub fn resolver(&self) -> &KeyResolver<R> {
        &self.resolver
    }

    pub fn current_key_version(&self) -> KeyVersion {
        self.resolver.current_version()
    }

    /// Encrypt under the current key; persist both returned fields together
    pub fn encrypt_field(&self, plaintext: &str) -> Result<EncryptedValue> {
        let key = self.resolver.current();
        self.seal(plaintext, &key)
    }

    /// Decrypt with the exact key version recorded alongside the ciphertext
    pub fn decrypt_field(&self, ciphertext: &str, key_version: KeyVersion) -> Result<String> {
        let key = self.resolver.record_for(key_version)?;
        self.cipher.decrypt_from_base64(ciphertext, &key)
    }

    pub fn decrypt_value(&self, value: &EncryptedValue) -> Result<String> {
        self.decrypt_field(&value.ciphertext, value.key_version)
    }

    /// Does `candidate` equal the stored secret? (login-style check)
    ///
    /// Errors are returned as-is; whether a `DecryptionFailure` counts as
    /// "does not match" is the caller's decision.
    pub fn verify_field(&self, candidate: &str, stored: &EncryptedValue) -> Result<bool> {
        let plaintext = self.decrypt_value(stored)?;
        Ok(constant_time_eq(plaintext.as_bytes(), candidate.as_bytes()))
    }

    /// Explicit update path: re-encrypt under the current key only if the plaintext changed
    pub fn reencrypt_if_changed(
        &self,
        stored: &EncryptedValue,
        new_plaintext: &str,
    ) -> Result<Option<EncryptedValue>> {
        if self.verify_field(new_plaintext, stored)? {
            return Ok(None);
        }
        self.encrypt_field(new_plaintext).map(Some)
    }

    /// Encrypt a group of attributes under one key version
    pub fn encrypt_fields(&self, plaintexts: &[&str]) -> Result<EncryptedFields> {
        let key = self.resolver.current();
        let ciphertexts = plaintexts
            .iter()
            .map(|p| self.cipher.encrypt_to_base64(p, &key))
            .collect::<Result<Vec<_>>>()?;
        Ok(EncryptedFields {
            key_version: key.version(),
            ciphertexts,
        })
    }

    pub fn decrypt_fields(&self, stored: &EncryptedFields) -> Result<Vec<String>> {
        let key = self.resolver.record_for(stored.key_version)?;
        stored
            .ciphertexts
            .iter()
            .map(|c| self.cipher.decrypt_from_base64(c, &key))
            .collect()
    }

    /// Group update: if any member changed, re-encrypt every member under the
    /// current key so the shared version stays correct for all of them.
    pub fn update_fields(
        &self,
        stored: &EncryptedFields,
        new_plaintexts: &[&str],
    ) -> Result<Option<EncryptedFields>> {
        if stored.ciphertexts.len() != new_plaintexts.len() {
            return Err(CoreError::EncryptionFailure(format!(
                "field group has {} members, update supplied {}",
                stored.ciphertexts.len(),
                new_plaintexts.len()
            )));
        }

        let current = self.decrypt_fields(stored)?;
        let unchanged = current
            .iter()
            .zip(new_plaintexts)
            .all(|(old, new)| constant_time_eq(old.as_bytes(), new.as_bytes()));
        if unchanged {
            return Ok(None);
        }
        self.encrypt_fields(new_plaintexts).map(Some)
    }

    /// Administrative rotation to a freshly supplied secret.
    ///
    /// Existing pairs are untouched and stay decryptable; only later
    /// encryptions move to the new key. A blank or short secret is a
    /// [`CoreError::Config`] and leaves the registry untouched.
    pub fn rotate(&self, new_secret: &SecretPhrase) -> Result<RotationResult> {
        let (previous_version, record) = self.resolver.reload(new_secret)?;

        let result = RotationResult {
            previous_version,
            new_version: record.version(),
            fingerprint: record.fingerprint().to_string(),
        };
        if result.rotated() {
            info!(%result, "field encryption key rotated");
        } else {
            debug!(%result, "rotation requested with the current secret");
        }
        Ok(result)
    }

    /// Metadata of every key version ever minted
    pub fn key_history(&self) -> Result<Vec<KeyInfo>> {
        self.resolver.registry().history()
    }

    fn seal(&self, plaintext: &str, key: &KeyRecord) -> Result<EncryptedValue> {
        Ok(EncryptedValue {
            ciphertext: self.cipher.encrypt_to_base64(plaintext, key)?,
            key_version: key.version(),
        })
    }
}
