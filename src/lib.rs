// src/lib.rs
//! encrypted-field-vault: versioned field-level encryption for secrets at rest
//!
//! Features:
//! - AES-256-GCM field cipher; wrong-key and tampered ciphertexts are detected
//! - Append-only key registry (in-memory or SQLite/SQLCipher)
//! - Config-driven rotation that never invalidates old ciphertext
//! - Full secure-gate integration for key material

pub mod aliases;
pub mod config;
pub mod consts;
pub mod core;
pub mod db;
pub mod enums;
pub mod export;
pub mod field_vault;
pub mod registry;
pub mod resolver;

pub mod error;

// Re-export everything users need at the crate root
pub use aliases::{FieldKey32, SecretPhrase};
pub use config::{load as load_config, Config, EncryptionSettings, RegistrySettings};
pub use self::core::{FieldCipher, KeyInfo, KeyRecord, KeyVersion};
pub use db::SqliteKeyRegistry;
pub use enums::EncryptionAlgorithm;
pub use error::{CoreError, Result as CoreResult};
pub use export::export_key_manifest;
pub use field_vault::{EncryptedFields, EncryptedValue, FieldVault, RotationResult};
pub use registry::{InMemoryKeyRegistry, KeyRegistry};
pub use resolver::KeyResolver;
