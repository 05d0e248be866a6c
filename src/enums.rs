// src/enums.rs
//! Public enum types used throughout the crate
//!
//! Central location for the user-visible choices that configuration can make.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::consts::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};
use crate::error::CoreError;

/// Supported field encryption algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[non_exhaustive]
pub enum EncryptionAlgorithm {
    #[default]
    #[serde(rename = "AES-256-GCM")]
    Aes256Gcm,
}

impl EncryptionAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncryptionAlgorithm::Aes256Gcm => "AES-256-GCM",
        }
    }

    pub fn key_len(&self) -> usize {
        match self {
            EncryptionAlgorithm::Aes256Gcm => KEY_SIZE,
        }
    }

    pub fn nonce_len(&self) -> usize {
        match self {
            EncryptionAlgorithm::Aes256Gcm => NONCE_SIZE,
        }
    }

    pub fn tag_len(&self) -> usize {
        match self {
            EncryptionAlgorithm::Aes256Gcm => TAG_SIZE,
        }
    }
}

impl fmt::Display for EncryptionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncryptionAlgorithm {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AES-256-GCM" | "AES256GCM" | "AES-GCM-256" => Ok(EncryptionAlgorithm::Aes256Gcm),
            // Bare "AES" resolves to ECB in most providers: no IV, no integrity tag
            "AES" | "AES/ECB/PKCS5PADDING" => Err(CoreError::Config(format!(
                "algorithm '{s}' is unauthenticated; use AES-256-GCM"
            ))),
            _ => Err(CoreError::Config(format!("unsupported algorithm '{s}'"))),
        }
    }
}
