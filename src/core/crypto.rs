// src/core/crypto.rs
//! Pure cryptographic primitives with no I/O or database access
//!
//! AES-256-GCM over in-memory buffers. Every ciphertext carries its own
//! format byte and nonce, so decryption needs nothing but the bytes and the
//! key record they were produced under.
//!
//! Layout: `format (1) || nonce (12) || ciphertext || tag (16)`.
//! The record's version is bound in as associated data, so a ciphertext
//! only authenticates under the exact version it was written with.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::consts::{AAD_PREFIX, CIPHERTEXT_FORMAT_V1};
use crate::core::key::{KeyRecord, KeyVersion};
use crate::enums::EncryptionAlgorithm;
use crate::error::{CoreError, Result};

/// Stateless field cipher; the algorithm is fixed once for the whole system
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldCipher {
    algorithm: EncryptionAlgorithm,
}

impl FieldCipher {
    pub fn new(algorithm: EncryptionAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> EncryptionAlgorithm {
        self.algorithm
    }

    /// Encrypt plaintext under `key` → self-contained ciphertext bytes
    pub fn encrypt(&self, plaintext: &[u8], key: &KeyRecord) -> Result<Vec<u8>> {
        self.check_key(key).map_err(CoreError::EncryptionFailure)?;

        match self.algorithm {
            EncryptionAlgorithm::Aes256Gcm => {
                let cipher = Aes256Gcm::new_from_slice(key.secret().expose_secret())
                    .map_err(|e| CoreError::EncryptionFailure(format!("cipher init error: {e}")))?;

                let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
                let aad = associated_data(key.version());
                let sealed = cipher
                    .encrypt(
                        &nonce,
                        Payload {
                            msg: plaintext,
                            aad: &aad,
                        },
                    )
                    .map_err(|e| CoreError::EncryptionFailure(format!("AEAD error: {e}")))?;

                let mut out = Vec::with_capacity(1 + self.algorithm.nonce_len() + sealed.len());
                out.push(CIPHERTEXT_FORMAT_V1);
                out.extend_from_slice(nonce.as_slice());
                out.extend_from_slice(&sealed);
                Ok(out)
            }
        }
    }

    /// Decrypt bytes produced by [`FieldCipher::encrypt`] under the same key record
    pub fn decrypt(&self, ciphertext: &[u8], key: &KeyRecord) -> Result<Vec<u8>> {
        self.check_key(key).map_err(CoreError::DecryptionFailure)?;

        if ciphertext.len() < self.min_ciphertext_len() {
            return Err(CoreError::DecryptionFailure(format!(
                "ciphertext too short: {} bytes",
                ciphertext.len()
            )));
        }
        let (format, rest) = ciphertext.split_at(1);
        if format[0] != CIPHERTEXT_FORMAT_V1 {
            return Err(CoreError::DecryptionFailure(format!(
                "unknown ciphertext format 0x{:02x}",
                format[0]
            )));
        }

        match self.algorithm {
            EncryptionAlgorithm::Aes256Gcm => {
                let (nonce, sealed) = rest.split_at(self.algorithm.nonce_len());
                let cipher = Aes256Gcm::new_from_slice(key.secret().expose_secret())
                    .map_err(|e| CoreError::DecryptionFailure(format!("cipher init error: {e}")))?;

                let aad = associated_data(key.version());
                cipher
                    .decrypt(
                        Nonce::from_slice(nonce),
                        Payload {
                            msg: sealed,
                            aad: &aad,
                        },
                    )
                    .map_err(|_| {
                        CoreError::DecryptionFailure(
                            "authentication failed (wrong key version or tampered data)".into(),
                        )
                    })
            }
        }
    }

    /// Format byte + nonce + tag: the size of an encrypted empty string
    pub fn min_ciphertext_len(&self) -> usize {
        1 + self.algorithm.nonce_len() + self.algorithm.tag_len()
    }

    /// Encrypt UTF-8 text and encode the result as standard base64
    pub fn encrypt_to_base64(&self, plaintext: &str, key: &KeyRecord) -> Result<String> {
        let raw = self.encrypt(plaintext.as_bytes(), key)?;
        Ok(STANDARD.encode(raw))
    }

    /// Inverse of [`FieldCipher::encrypt_to_base64`]
    pub fn decrypt_from_base64(&self, encoded: &str, key: &KeyRecord) -> Result<String> {
        let raw = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CoreError::DecryptionFailure(format!("base64 decode error: {e}")))?;
        let plaintext = self.decrypt(&raw, key)?;
        String::from_utf8(plaintext)
            .map_err(|_| CoreError::DecryptionFailure("plaintext is not valid UTF-8".into()))
    }

    fn check_key(&self, key: &KeyRecord) -> std::result::Result<(), String> {
        if key.algorithm() != self.algorithm {
            return Err(format!(
                "key v{} was minted for {}, cipher is {}",
                key.version(),
                key.algorithm(),
                self.algorithm
            ));
        }
        let len = key.secret().expose_secret().len();
        if len != self.algorithm.key_len() {
            return Err(format!(
                "invalid key size: expected {}, got {len}",
                self.algorithm.key_len()
            ));
        }
        Ok(())
    }
}

fn associated_data(version: KeyVersion) -> Vec<u8> {
    let mut aad = Vec::with_capacity(AAD_PREFIX.len() + 4);
    aad.extend_from_slice(AAD_PREFIX);
    aad.extend_from_slice(&version.to_be_bytes());
    aad
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aliases::FieldKey32;
    use crate::consts::MIN_CIPHERTEXT_LEN;
    use chrono::Utc;

    fn record(version: KeyVersion, byte: u8) -> KeyRecord {
        KeyRecord::new(
            version,
            FieldKey32::new([byte; 32]),
            EncryptionAlgorithm::Aes256Gcm,
            Utc::now(),
        )
    }

    #[test]
    fn test_encrypt_decrypt() {
        let cipher = FieldCipher::default();
        let key = record(1, 7);

        let sealed = cipher.encrypt(b"4111 1111 1111 1111", &key).unwrap();
        assert_eq!(sealed[0], CIPHERTEXT_FORMAT_V1);
        assert_eq!(cipher.decrypt(&sealed, &key).unwrap(), b"4111 1111 1111 1111");
    }

    #[test]
    fn test_empty_plaintext_is_allowed() {
        let cipher = FieldCipher::default();
        let key = record(1, 7);
        let sealed = cipher.encrypt(b"", &key).unwrap();
        assert_eq!(sealed.len(), MIN_CIPHERTEXT_LEN);
        assert!(cipher.decrypt(&sealed, &key).unwrap().is_empty());
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let cipher = FieldCipher::default();
        let key = record(1, 7);
        let a = cipher.encrypt(b"same", &key).unwrap();
        let b = cipher.encrypt(b"same", &key).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_is_detected() {
        let cipher = FieldCipher::default();
        let sealed = cipher.encrypt(b"secret", &record(1, 7)).unwrap();
        let result = cipher.decrypt(&sealed, &record(1, 8));
        assert!(matches!(result, Err(CoreError::DecryptionFailure(_))));
    }

    #[test]
    fn test_same_material_other_version_is_detected() {
        let cipher = FieldCipher::default();
        let sealed = cipher.encrypt(b"secret", &record(1, 7)).unwrap();
        let result = cipher.decrypt(&sealed, &record(2, 7));
        assert!(matches!(result, Err(CoreError::DecryptionFailure(_))));
    }

    #[test]
    fn test_tampering_and_truncation_are_detected() {
        let cipher = FieldCipher::default();
        let key = record(1, 7);
        let mut sealed = cipher.encrypt(b"secret", &key).unwrap();

        let truncated = &sealed[..sealed.len() - 1];
        assert!(matches!(
            cipher.decrypt(truncated, &key),
            Err(CoreError::DecryptionFailure(_))
        ));
        assert!(matches!(
            cipher.decrypt(&sealed[..MIN_CIPHERTEXT_LEN - 1], &key),
            Err(CoreError::DecryptionFailure(_))
        ));

        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(
            cipher.decrypt(&sealed, &key),
            Err(CoreError::DecryptionFailure(_))
        ));
    }

    #[test]
    fn test_unknown_format_byte() {
        let cipher = FieldCipher::default();
        let key = record(1, 7);
        let mut sealed = cipher.encrypt(b"secret", &key).unwrap();
        sealed[0] = 0x7f;
        let err = cipher.decrypt(&sealed, &key).unwrap_err();
        assert!(err.to_string().contains("format"));
    }

    #[test]
    fn test_base64_text_path() {
        let cipher = FieldCipher::default();
        let key = record(4, 1);
        let encoded = cipher.encrypt_to_base64("pässwörd", &key).unwrap();
        assert_eq!(cipher.decrypt_from_base64(&encoded, &key).unwrap(), "pässwörd");
        assert!(matches!(
            cipher.decrypt_from_base64("***not base64***", &key),
            Err(CoreError::DecryptionFailure(_))
        ));
    }

    #[test]
    fn test_min_length_follows_algorithm_sizes() {
        let cipher = FieldCipher::default();
        assert_eq!(cipher.min_ciphertext_len(), MIN_CIPHERTEXT_LEN);

        let key = record(1, 7);
        let sealed = cipher.encrypt(b"abc", &key).unwrap();
        let algo = cipher.algorithm();
        assert_eq!(sealed.len(), 1 + algo.nonce_len() + 3 + algo.tag_len());
    }
}
