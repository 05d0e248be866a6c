// src/export/mod.rs
//! Export utilities for encrypted-field-vault
//!
//! Exports carry key metadata only. Secrets never leave the registry.

pub use json::export_key_manifest;

pub mod json;
