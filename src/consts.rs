// src/consts.rs
//! Shared constants: security parameters and defaults

/// AES-256 key size in bytes
pub const KEY_SIZE: usize = 32;

/// AES-GCM nonce size in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size in bytes
pub const TAG_SIZE: usize = 16;

/// Leading byte of every field ciphertext; bump when the layout changes
pub const CIPHERTEXT_FORMAT_V1: u8 = 0x01;

/// Smallest well-formed ciphertext: format byte + nonce + tag (empty plaintext)
pub const MIN_CIPHERTEXT_LEN: usize = 1 + NONCE_SIZE + TAG_SIZE;

/// Associated-data prefix; the key version is appended big-endian
pub const AAD_PREFIX: &[u8] = b"encrypted-field-vault:v1:";

/// HKDF salt for turning a configured passphrase into key material
pub const KDF_SALT: &[u8] = b"encrypted-field-vault/key-record";

/// Configured secrets shorter than this are rejected at startup
pub const MIN_SECRET_LEN: usize = 16;

/// Number of hex characters kept from the BLAKE3 digest of a key
pub const FINGERPRINT_LEN_HEX: usize = 16;

/// Default algorithm identifier
pub const DEFAULT_ENCRYPTION_ALGO: &str = "AES-256-GCM";

/// Default location of the key registry database
pub const DEFAULT_KEY_DB_PATH: &str = "data/keys.db";

/// Default config file looked up when `EFV_CONFIG` is unset
pub const DEFAULT_CONFIG_PATH: &str = "efv-config.toml";

/// How long a registry connection waits on a locked database
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Recommended KDF iterations for SQLCipher databases (2025+)
// ~0.1-0.2s on modern hardware
pub const DB_KDF_ITERATIONS: u32 = 256_000;

/// Format tag written into exported key manifests
pub const MANIFEST_FORMAT: &str = "encrypted-field-vault-keys-v1";
