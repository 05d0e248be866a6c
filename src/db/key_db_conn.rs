// src/db/key_db_conn.rs
use std::time::Duration;
use std::{fs, path::Path};

use rusqlite::{Connection, Result};

use crate::aliases::DbPassphrase;
use crate::config::RegistrySettings;
use crate::consts::DB_KDF_ITERATIONS;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS encryption_keys (
        key_version INTEGER PRIMARY KEY CHECK (key_version > 0),
        secret_blob BLOB    NOT NULL,
        fingerprint TEXT    NOT NULL,
        algorithm   TEXT    NOT NULL,
        created_at  TEXT    NOT NULL
    );

    -- Rotation only ever appends; old rows must stay decryptable forever
    CREATE TRIGGER IF NOT EXISTS encryption_keys_no_update
    BEFORE UPDATE ON encryption_keys
    BEGIN
        SELECT RAISE(ABORT, 'encryption_keys is append-only');
    END;

    CREATE TRIGGER IF NOT EXISTS encryption_keys_no_delete
    BEFORE DELETE ON encryption_keys
    BEGIN
        SELECT RAISE(ABORT, 'encryption_keys is append-only');
    END;
"#;

/// Open (and create if needed) the key registry database described by `settings`
pub fn open_key_db(settings: &RegistrySettings) -> Result<Connection> {
    if let Some(parent) = settings.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            let _ = fs::create_dir_all(parent);
        }
    }

    let conn = Connection::open(&settings.db_path)?;
    prepare(conn, settings.db_key.as_ref(), settings.busy_timeout)
}

/// Private in-memory registry database for tests and throwaway processes
pub fn open_key_db_in_memory(db_key: Option<&DbPassphrase>) -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    prepare(conn, db_key, Duration::ZERO)
}

/// Open the registry database at `path` with defaults (no SQLCipher key)
pub fn open_key_db_at<P: AsRef<Path>>(path: P) -> Result<Connection> {
    open_key_db(&RegistrySettings::at(path.as_ref()))
}

fn prepare(conn: Connection, db_key: Option<&DbPassphrase>, busy: Duration) -> Result<Connection> {
    // PRAGMA key must be the first statement on a SQLCipher connection
    if let Some(key) = db_key {
        conn.pragma_update(None, "key", key.expose_secret().as_str())?;
        conn.execute_batch(&format!(
            r#"
            PRAGMA cipher_page_size = 4096;
            PRAGMA kdf_iter = {DB_KDF_ITERATIONS};
            PRAGMA cipher_hmac_algorithm = HMAC_SHA512;
            PRAGMA cipher_kdf_algorithm = PBKDF2_HMAC_SHA512;
            "#
        ))?;
    }

    if !busy.is_zero() {
        conn.busy_timeout(busy)?;
    }
    conn.execute_batch(SCHEMA)?;

    Ok(conn)
}
