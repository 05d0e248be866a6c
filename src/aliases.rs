// src/aliases.rs
//! Re-exports secure-gate's ergonomic secret types
//!
//! These are the canonical secret containers used throughout encrypted-field-vault.
//! Everything here zeroizes on drop and redacts itself in `Debug` output.

pub use secure_gate::{dynamic_alias, fixed_alias};

// Fixed-size secrets
fixed_alias!(FieldKey32, 32); // 256-bit AES-GCM key material of one key record

// Dynamic secrets
dynamic_alias!(SecretPhrase, String); // operator-supplied passphrase from configuration
dynamic_alias!(DbPassphrase, String); // SQLCipher passphrase for the key registry database
dynamic_alias!(KeyBlob, Vec<u8>); // raw key material read back from storage
