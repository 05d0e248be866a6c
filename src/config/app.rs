// src/config/app.rs
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::defaults::*;
use crate::aliases::{DbPassphrase, SecretPhrase};
use crate::consts::{DEFAULT_CONFIG_PATH, MIN_SECRET_LEN};
use crate::enums::EncryptionAlgorithm;
use crate::error::{CoreError, Result};

/// Validated runtime configuration
pub struct Config {
    pub encryption: EncryptionSettings,
    pub registry: RegistrySettings,
}

/// Secret + algorithm the key resolver mints records from
pub struct EncryptionSettings {
    pub secret_key: SecretPhrase,
    pub algorithm: EncryptionAlgorithm,
}

/// Where and how the key registry database is opened
pub struct RegistrySettings {
    pub db_path: PathBuf,
    pub db_key: Option<DbPassphrase>,
    pub busy_timeout: Duration,
}

// On-disk shape; every field optional so env vars can fill the gaps
#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    encryption: RawEncryption,
    #[serde(default)]
    registry: RawRegistry,
}

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEncryption {
    secret_key: Option<String>,
    algorithm: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRegistry {
    db_path: Option<String>,
    db_key: Option<String>,
    busy_timeout_ms: Option<u64>,
}

/// Reject secrets no key record may be minted from (blank or too short)
pub fn validate_secret_key(secret_key: &str) -> Result<()> {
    if secret_key.trim().is_empty() {
        return Err(CoreError::Config("encryption.secret_key is empty".into()));
    }
    if secret_key.len() < MIN_SECRET_LEN {
        return Err(CoreError::Config(format!(
            "encryption.secret_key must be at least {MIN_SECRET_LEN} bytes"
        )));
    }
    Ok(())
}

impl EncryptionSettings {
    /// Validate a secret/algorithm pair for config loading
    pub fn new(secret_key: impl Into<String>, algorithm: EncryptionAlgorithm) -> Result<Self> {
        let secret_key = secret_key.into();
        validate_secret_key(&secret_key)?;
        Ok(Self {
            secret_key: SecretPhrase::new(secret_key),
            algorithm,
        })
    }
}

impl RegistrySettings {
    /// Registry at `db_path` with no SQLCipher key and the default busy timeout
    pub fn at(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            db_key: None,
            busy_timeout: default_busy_timeout(),
        }
    }
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self::at(default_db_path())
    }
}

impl Config {
    /// Parse TOML text without consulting the environment
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| CoreError::Config(format!("invalid TOML: {e}")))?;
        Self::build(raw, |_| None)
    }

    /// Read a TOML file, then apply `EFV_*` environment overrides
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CoreError::Config(format!("cannot read {}: {e}", path.as_ref().display()))
        })?;
        let raw: RawConfig = toml::from_str(&content)
            .map_err(|e| CoreError::Config(format!("invalid TOML: {e}")))?;
        Self::build(raw, |name| std::env::var(name).ok())
    }

    /// Build purely from a variable lookup (tests pass a map, `load` passes the process env)
    pub fn from_env_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::build(RawConfig::default(), lookup)
    }

    fn build<F>(mut raw: RawConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_SECRET_KEY) {
            raw.encryption.secret_key = Some(v);
        }
        if let Some(v) = lookup(ENV_ALGORITHM) {
            raw.encryption.algorithm = Some(v);
        }
        if let Some(v) = lookup(ENV_KEY_DB) {
            raw.registry.db_path = Some(v);
        }
        if let Some(v) = lookup(ENV_KEY_DB_KEY) {
            raw.registry.db_key = Some(v);
        }

        let secret_key = raw.encryption.secret_key.ok_or_else(|| {
            CoreError::Config(format!(
                "encryption.secret_key is not configured (set it in the config file or {ENV_SECRET_KEY})"
            ))
        })?;
        let algorithm: EncryptionAlgorithm = raw
            .encryption
            .algorithm
            .unwrap_or_else(default_algorithm)
            .parse()?;

        let registry = RegistrySettings {
            db_path: raw
                .registry
                .db_path
                .map(PathBuf::from)
                .unwrap_or_else(default_db_path),
            db_key: raw
                .registry
                .db_key
                .filter(|k| !k.is_empty())
                .map(DbPassphrase::new),
            busy_timeout: raw
                .registry
                .busy_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or_else(default_busy_timeout),
        };

        Ok(Config {
            encryption: EncryptionSettings::new(secret_key, algorithm)?,
            registry,
        })
    }
}

/// Load config at startup from `EFV_CONFIG` (or `efv-config.toml`) plus env overrides.
///
/// A missing file is fine when the environment supplies the secret; anything
/// else that leaves the secret unresolved is a fatal [`CoreError::Config`].
pub fn load() -> Result<Config> {
    let config_path =
        std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    if Path::new(&config_path).exists() {
        Config::load_from(&config_path)
    } else {
        tracing::warn!(path = %config_path, "config file not found, using environment only");
        Config::from_env_with(|name| std::env::var(name).ok())
    }
}

impl fmt::Debug for EncryptionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionSettings")
            .field("secret_key", &"[REDACTED]")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

impl fmt::Debug for RegistrySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrySettings")
            .field("db_path", &self.db_path)
            .field("db_key", &self.db_key.as_ref().map(|_| "[REDACTED]"))
            .field("busy_timeout", &self.busy_timeout)
            .finish()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("encryption", &self.encryption)
            .field("registry", &self.registry)
            .finish()
    }
}
