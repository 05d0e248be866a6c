// src/config/mod.rs
//! Configuration system for encrypted-field-vault
//!
//! Explicit, validated config built from TOML + env overrides. Loading fails
//! loudly: a process without a resolvable key must not start.

pub use app::{load, validate_secret_key, Config, EncryptionSettings, RegistrySettings};

mod app;
mod defaults;
