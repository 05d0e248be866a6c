//! Key registry database operations
//!
//! SQLite-backed [`KeyRegistry`]: appends run inside an IMMEDIATE transaction
//! so the "is the latest key already this secret?" check and the insert are
//! one atomic step, even across processes sharing the database file. The
//! `key_version` primary key is the backstop if two writers ever slip past.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use crate::aliases::{FieldKey32, KeyBlob};
use crate::config::RegistrySettings;
use crate::consts::KEY_SIZE;
use crate::core::key::{KeyInfo, KeyRecord, KeyVersion};
use crate::db::key_db_conn::{open_key_db, open_key_db_in_memory};
use crate::enums::EncryptionAlgorithm;
use crate::error::{CoreError, Result};
use crate::registry::KeyRegistry;

const SELECT_COLUMNS: &str =
    "SELECT key_version, secret_blob, fingerprint, algorithm, created_at FROM encryption_keys";

/// Raw row as stored; converted into a [`KeyRecord`] only after validation
struct KeyRow {
    version: i64,
    blob: KeyBlob,
    fingerprint: String,
    algorithm: String,
    created_at: String,
}

pub struct SqliteKeyRegistry {
    conn: Mutex<Connection>,
}

impl SqliteKeyRegistry {
    /// Wrap an already-prepared connection (see [`crate::db::key_db_conn`])
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn open(settings: &RegistrySettings) -> Result<Self> {
        Ok(Self::new(open_key_db(settings)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(open_key_db_in_memory(None)?))
    }

    /// Run `f` against the underlying connection (admin tooling, tests)
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        f(&self.conn.lock())
    }
}

impl KeyRegistry for SqliteKeyRegistry {
    fn append(&self, secret: FieldKey32, algorithm: EncryptionAlgorithm) -> Result<Arc<KeyRecord>> {
        let mut conn = self.conn.lock();

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(unavailable)?;

        let next = match query_latest(&tx)? {
            Some(latest) if latest.holds(&secret) => {
                debug!(version = latest.version(), "latest key already holds this secret");
                return Ok(Arc::new(latest));
            }
            Some(latest) => latest
                .version()
                .checked_add(1)
                .ok_or_else(|| CoreError::KeyUnavailable("key version space exhausted".into()))?,
            None => 1,
        };

        let record = KeyRecord::new(next, secret, algorithm, Utc::now());
        let inserted = tx.execute(
            "INSERT INTO encryption_keys (key_version, secret_blob, fingerprint, algorithm, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                next as i64,
                record.secret().expose_secret() as &[u8],
                record.fingerprint(),
                record.algorithm().as_str(),
                record.created_at().to_rfc3339(),
            ],
        );

        match inserted {
            Ok(_) => tx.commit().map_err(unavailable)?,
            Err(e) if is_constraint_violation(&e) => {
                // Someone else minted this version first; theirs wins
                drop(tx);
                warn!(version = next, "lost key append race, adopting winner's record");
                return query_version(&conn, next)?
                    .map(Arc::new)
                    .ok_or(CoreError::KeyNotFound(next));
            }
            Err(e) => return Err(unavailable(e)),
        }

        info!(
            version = next,
            fingerprint = record.fingerprint(),
            algorithm = %record.algorithm(),
            "minted encryption key"
        );
        Ok(Arc::new(record))
    }

    fn latest(&self) -> Result<Option<Arc<KeyRecord>>> {
        let conn = self.conn.lock();
        Ok(query_latest(&conn)?.map(Arc::new))
    }

    fn by_version(&self, version: KeyVersion) -> Result<Arc<KeyRecord>> {
        let conn = self.conn.lock();
        query_version(&conn, version)?
            .map(Arc::new)
            .ok_or(CoreError::KeyNotFound(version))
    }

    fn history(&self) -> Result<Vec<KeyInfo>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY key_version"))
            .map_err(unavailable)?;
        let rows = stmt.query_map([], read_row).map_err(unavailable)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(into_record(row.map_err(unavailable)?)?.info());
        }
        Ok(out)
    }
}

fn query_latest(conn: &Connection) -> Result<Option<KeyRecord>> {
    conn.query_row(
        &format!("{SELECT_COLUMNS} ORDER BY key_version DESC LIMIT 1"),
        [],
        read_row,
    )
    .optional()
    .map_err(unavailable)?
    .map(into_record)
    .transpose()
}

fn query_version(conn: &Connection, version: KeyVersion) -> Result<Option<KeyRecord>> {
    conn.query_row(
        &format!("{SELECT_COLUMNS} WHERE key_version = ?1"),
        [version as i64],
        read_row,
    )
    .optional()
    .map_err(unavailable)?
    .map(into_record)
    .transpose()
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<KeyRow> {
    Ok(KeyRow {
        version: row.get(0)?,
        blob: KeyBlob::new(row.get::<_, Vec<u8>>(1)?), // zeroizes on drop
        fingerprint: row.get(2)?,
        algorithm: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn into_record(row: KeyRow) -> Result<KeyRecord> {
    let version = KeyVersion::try_from(row.version)
        .map_err(|_| CoreError::InvalidKeyMaterial(format!("bad key version {}", row.version)))?;

    let mut bytes: [u8; KEY_SIZE] = row.blob.expose_secret().as_slice().try_into().map_err(|_| {
        CoreError::InvalidKeyMaterial(format!(
            "key v{version} has {} bytes, expected {KEY_SIZE}",
            row.blob.expose_secret().len()
        ))
    })?;
    let algorithm: EncryptionAlgorithm = row
        .algorithm
        .parse()
        .map_err(|_| CoreError::InvalidKeyMaterial(format!("key v{version}: unknown algorithm")))?;
    let created_at = DateTime::parse_from_rfc3339(&row.created_at)
        .map_err(|e| CoreError::InvalidKeyMaterial(format!("key v{version}: bad created_at: {e}")))?
        .with_timezone(&Utc);

    let record = KeyRecord::new(version, FieldKey32::new(bytes), algorithm, created_at);
    bytes.zeroize();
    if record.fingerprint() != row.fingerprint {
        return Err(CoreError::InvalidKeyMaterial(format!(
            "key v{version} does not match its stored fingerprint"
        )));
    }
    Ok(record)
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

// Registry I/O failures are infrastructure problems, not data problems
fn unavailable(err: rusqlite::Error) -> CoreError {
    CoreError::KeyUnavailable(format!("key registry: {err}"))
}
