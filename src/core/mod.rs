// src/core/mod.rs
pub mod crypto;
pub mod key;
pub mod util;

pub use crypto::FieldCipher;
pub use key::{derive_key_material, KeyInfo, KeyRecord, KeyVersion};
pub use util::*;
