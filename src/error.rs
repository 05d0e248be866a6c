// src/error.rs
//! Public error type for the entire crate

use thiserror::Error;

use crate::core::key::KeyVersion;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    /// No current key could be resolved, or the registry could not be reached
    #[error("Encryption key unavailable: {0}")]
    KeyUnavailable(String),

    /// The registry has no record for this version
    #[error("Encryption key version {0} not found")]
    KeyNotFound(KeyVersion),

    /// Ciphertext malformed, truncated, tampered with or paired with the wrong key
    #[error("Decryption failed: {0}")]
    DecryptionFailure(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailure(String),

    /// Stored key material has the wrong shape or fails its fingerprint check
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Infrastructure hiccups are worth retrying; everything else is a bug or bad data
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::KeyUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_key_unavailable_is_retryable() {
        assert!(CoreError::KeyUnavailable("db locked".into()).is_retryable());
        assert!(!CoreError::KeyNotFound(7).is_retryable());
        assert!(!CoreError::DecryptionFailure("tag".into()).is_retryable());
        assert!(!CoreError::EncryptionFailure("init".into()).is_retryable());
    }

    #[test]
    fn key_not_found_names_the_version() {
        assert_eq!(
            CoreError::KeyNotFound(999).to_string(),
            "Encryption key version 999 not found"
        );
    }
}
