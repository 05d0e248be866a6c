//! Key registry: the durable, append-only source of truth for key records
//!
//! Registries never update or delete a record. Rotation only appends, and
//! every version a registry has ever handed out stays resolvable forever.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::aliases::FieldKey32;
use crate::core::key::{KeyInfo, KeyRecord, KeyVersion};
use crate::enums::EncryptionAlgorithm;
use crate::error::{CoreError, Result};

/// Storage contract every key registry backend honors
pub trait KeyRegistry: Send + Sync {
    /// Mint the next version for `secret`, or return the latest record if it
    /// already holds exactly this material.
    ///
    /// The compare and the insert happen at one serialization point, so any
    /// number of concurrent callers with the same secret produce one record.
    fn append(&self, secret: FieldKey32, algorithm: EncryptionAlgorithm) -> Result<Arc<KeyRecord>>;

    /// Record with the highest version, or `None` when the registry is empty
    fn latest(&self) -> Result<Option<Arc<KeyRecord>>>;

    /// Exact lookup; [`CoreError::KeyNotFound`] if the version was never minted
    fn by_version(&self, version: KeyVersion) -> Result<Arc<KeyRecord>>;

    /// Metadata of every record, ascending by version
    fn history(&self) -> Result<Vec<KeyInfo>>;
}

impl<R: KeyRegistry + ?Sized> KeyRegistry for Arc<R> {
    fn append(&self, secret: FieldKey32, algorithm: EncryptionAlgorithm) -> Result<Arc<KeyRecord>> {
        (**self).append(secret, algorithm)
    }

    fn latest(&self) -> Result<Option<Arc<KeyRecord>>> {
        (**self).latest()
    }

    fn by_version(&self, version: KeyVersion) -> Result<Arc<KeyRecord>> {
        (**self).by_version(version)
    }

    fn history(&self) -> Result<Vec<KeyInfo>> {
        (**self).history()
    }
}

/// In-memory implementation of KeyRegistry
///
/// Suitable for tests and single-process embedding.
/// Records are lost when the process terminates.
pub struct InMemoryKeyRegistry {
    records: RwLock<BTreeMap<KeyVersion, Arc<KeyRecord>>>,
}

impl InMemoryKeyRegistry {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Default for InMemoryKeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyRegistry for InMemoryKeyRegistry {
    fn append(&self, secret: FieldKey32, algorithm: EncryptionAlgorithm) -> Result<Arc<KeyRecord>> {
        let mut records = self.records.write();

        let next = match records.last_key_value() {
            Some((_, latest)) if latest.holds(&secret) => {
                debug!(version = latest.version(), "latest key already holds this secret");
                return Ok(latest.clone());
            }
            Some((version, _)) => version
                .checked_add(1)
                .ok_or_else(|| CoreError::KeyUnavailable("key version space exhausted".into()))?,
            None => 1,
        };

        let record = Arc::new(KeyRecord::new(next, secret, algorithm, Utc::now()));
        records.insert(next, record.clone());
        info!(
            version = next,
            fingerprint = record.fingerprint(),
            "minted encryption key"
        );
        Ok(record)
    }

    fn latest(&self) -> Result<Option<Arc<KeyRecord>>> {
        Ok(self.records.read().last_key_value().map(|(_, r)| r.clone()))
    }

    fn by_version(&self, version: KeyVersion) -> Result<Arc<KeyRecord>> {
        self.records
            .read()
            .get(&version)
            .cloned()
            .ok_or(CoreError::KeyNotFound(version))
    }

    fn history(&self) -> Result<Vec<KeyInfo>> {
        Ok(self.records.read().values().map(|r| r.info()).collect())
    }
}
