// tests/common.rs
//! Shared test utilities: logging setup + registry fixtures

#![allow(dead_code)] // each test binary uses a different subset

use std::path::{Path, PathBuf};
use std::sync::Arc;

use encrypted_field_vault::{
    EncryptionAlgorithm, EncryptionSettings, FieldVault, InMemoryKeyRegistry, RegistrySettings,
    SecretPhrase, SqliteKeyRegistry,
};
use tempfile::TempDir;

#[cfg(feature = "logging")]
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize test-friendly logging
/// Call once at the start of any test that needs logs
pub fn setup() {
    #[cfg(feature = "logging")]
    tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer()) // works in `cargo test`
        .with(EnvFilter::from_default_env()) // respects RUST_LOG=
        .try_init()
        .ok(); // idempotent, safe to call multiple times

    #[cfg(not(feature = "logging"))]
    { /* no-op */ }
}

pub fn settings(secret: &str) -> EncryptionSettings {
    EncryptionSettings::new(secret, EncryptionAlgorithm::Aes256Gcm).expect("valid test secret")
}

pub fn phrase(secret: &str) -> SecretPhrase {
    SecretPhrase::new(secret.to_string())
}

pub fn memory_vault(secret: &str) -> (Arc<InMemoryKeyRegistry>, FieldVault<InMemoryKeyRegistry>) {
    let registry = Arc::new(InMemoryKeyRegistry::new());
    let vault = FieldVault::open(registry.clone(), &settings(secret)).expect("open vault");
    (registry, vault)
}

/// Temp directory holding a registry database file; dropped with the test
pub struct TempRegistry {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl TempRegistry {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("keys.db");
        Self { dir, path }
    }

    pub fn settings(&self) -> RegistrySettings {
        RegistrySettings::at(&self.path)
    }

    /// A fresh connection; each call simulates a separate process
    pub fn open(&self) -> Arc<SqliteKeyRegistry> {
        Arc::new(SqliteKeyRegistry::open(&self.settings()).expect("open registry"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
