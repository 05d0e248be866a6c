// src/config/defaults.rs
use std::path::PathBuf;
use std::time::Duration;

use crate::consts::{DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_ENCRYPTION_ALGO, DEFAULT_KEY_DB_PATH};

pub const ENV_CONFIG_PATH: &str = "EFV_CONFIG";
pub const ENV_SECRET_KEY: &str = "EFV_SECRET_KEY";
pub const ENV_ALGORITHM: &str = "EFV_ALGORITHM";
pub const ENV_KEY_DB: &str = "EFV_KEY_DB";
pub const ENV_KEY_DB_KEY: &str = "EFV_KEY_DB_KEY";

pub fn default_algorithm() -> String {
    DEFAULT_ENCRYPTION_ALGO.into()
}

pub fn default_db_path() -> PathBuf {
    PathBuf::from(DEFAULT_KEY_DB_PATH)
}

pub fn default_busy_timeout() -> Duration {
    Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS)
}
