// src/db/mod.rs
//! Durable key registry storage (SQLite / SQLCipher)

pub mod key_db_conn;
pub mod key_db_ops;

pub use key_db_conn::{open_key_db, open_key_db_at, open_key_db_in_memory};
pub use key_db_ops::SqliteKeyRegistry;
