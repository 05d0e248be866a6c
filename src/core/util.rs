//! Small utility functions used across the core module
//!
//! This includes hashing helpers and other misc utilities.
//! Keep this light; split further if it grows.

use blake3::Hasher;

use crate::consts::FINGERPRINT_LEN_HEX;

/// Compute BLAKE3 hash and return as lowercase hex string
pub fn blake3_hex(data: &[u8]) -> String {
    Hasher::new().update(data).finalize().to_hex().to_string()
}

/// Short, non-reversible identifier of key material, safe to log and export
pub fn key_fingerprint(material: &[u8]) -> String {
    let mut hex = blake3_hex(material);
    hex.truncate(FINGERPRINT_LEN_HEX);
    hex
}

/// Compare two byte strings without an early exit on the first mismatch
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
