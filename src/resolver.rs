//! Key resolver: bridges configured secret material and the key registry
//!
//! Holds the cached "current" key record every encryption reads. The cache
//! is owned by the resolver instance (no process-wide state), so tests and
//! embedders can run several independent resolvers side by side.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::aliases::SecretPhrase;
use crate::config::{validate_secret_key, EncryptionSettings};
use crate::core::key::{derive_key_material, KeyRecord, KeyVersion};
use crate::enums::EncryptionAlgorithm;
use crate::error::{CoreError, Result};
use crate::registry::KeyRegistry;

pub struct KeyResolver<R: KeyRegistry> {
    registry: Arc<R>,
    algorithm: EncryptionAlgorithm,
    current: RwLock<Arc<KeyRecord>>,
    // Serializes reloads so resolve-then-publish is atomic within the process
    reload_lock: Mutex<()>,
}

impl<R: KeyRegistry> KeyResolver<R> {
    /// Resolve the current key at startup.
    ///
    /// Any error here is fatal for the caller: a process must not serve
    /// encryption requests without a resolvable key.
    pub fn initialize(registry: Arc<R>, settings: &EncryptionSettings) -> Result<Self> {
        let record = resolve(registry.as_ref(), &settings.secret_key, settings.algorithm)
            .map_err(|e| match e {
                // Bad configuration and corrupt rows are not worth retrying
                e @ (CoreError::Config(_) | CoreError::InvalidKeyMaterial(_)) => e,
                other => CoreError::KeyUnavailable(format!("startup key resolution failed: {other}")),
            })?;

        info!(
            version = record.version(),
            fingerprint = record.fingerprint(),
            "encryption key resolved"
        );

        Ok(Self {
            registry,
            algorithm: settings.algorithm,
            current: RwLock::new(record),
            reload_lock: Mutex::new(()),
        })
    }

    /// Key record every new encryption must use
    pub fn current(&self) -> Arc<KeyRecord> {
        self.current.read().clone()
    }

    pub fn current_version(&self) -> KeyVersion {
        self.current.read().version()
    }

    pub fn algorithm(&self) -> EncryptionAlgorithm {
        self.algorithm
    }

    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    /// Re-run resolution against `secret` and publish the result as current.
    ///
    /// Mints a new record only if the registry's latest record holds
    /// different material; rotating to the current secret is a no-op.
    /// Returns the version that was current when this reload took the lock,
    /// together with the record now published.
    pub fn reload(&self, secret: &SecretPhrase) -> Result<(KeyVersion, Arc<KeyRecord>)> {
        validate_secret_key(secret.expose_secret())?;

        let _guard = self.reload_lock.lock();
        let previous = self.current_version();

        let record = resolve(self.registry.as_ref(), secret, self.algorithm)?;

        let mut current = self.current.write();
        if record.version() < current.version() {
            // Another process rotated past us; keep the newer key
            warn!(
                resolved = record.version(),
                cached = current.version(),
                "ignoring stale key resolution"
            );
            return Ok((previous, current.clone()));
        }
        if record.version() != current.version() {
            info!(
                from = current.version(),
                to = record.version(),
                fingerprint = record.fingerprint(),
                "current encryption key rotated"
            );
        }
        *current = record.clone();
        Ok((previous, record))
    }

    /// Look up any historical record, serving the current one from cache
    pub fn record_for(&self, version: KeyVersion) -> Result<Arc<KeyRecord>> {
        let current = self.current();
        if current.version() == version {
            return Ok(current);
        }
        self.registry.by_version(version)
    }
}

fn resolve<R: KeyRegistry + ?Sized>(
    registry: &R,
    secret: &SecretPhrase,
    algorithm: EncryptionAlgorithm,
) -> Result<Arc<KeyRecord>> {
    let material = derive_key_material(secret, algorithm)?;

    if let Some(latest) = registry.latest()? {
        if latest.holds(&material) {
            debug!(version = latest.version(), "configured secret matches latest key");
            return Ok(latest);
        }
    }

    // Empty registry or changed configuration: this is the rotation trigger
    registry.append(material, algorithm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aliases::FieldKey32;
    use crate::core::key::KeyInfo;
    use crate::registry::InMemoryKeyRegistry;

    fn settings(secret: &str) -> EncryptionSettings {
        EncryptionSettings::new(secret, EncryptionAlgorithm::Aes256Gcm).unwrap()
    }

    fn phrase(secret: &str) -> SecretPhrase {
        SecretPhrase::new(secret.to_string())
    }

    /// Registry whose `latest()` can be pinned to an older record, like a
    /// replica that has not caught up yet
    struct LaggingRegistry {
        inner: InMemoryKeyRegistry,
        pinned_latest: Mutex<Option<Arc<KeyRecord>>>,
    }

    impl LaggingRegistry {
        fn new() -> Self {
            Self {
                inner: InMemoryKeyRegistry::new(),
                pinned_latest: Mutex::new(None),
            }
        }

        fn pin_latest(&self, version: KeyVersion) {
            *self.pinned_latest.lock() = Some(self.inner.by_version(version).unwrap());
        }
    }

    impl KeyRegistry for LaggingRegistry {
        fn append(&self, secret: FieldKey32, algorithm: EncryptionAlgorithm) -> Result<Arc<KeyRecord>> {
            self.inner.append(secret, algorithm)
        }

        fn latest(&self) -> Result<Option<Arc<KeyRecord>>> {
            match self.pinned_latest.lock().clone() {
                Some(record) => Ok(Some(record)),
                None => self.inner.latest(),
            }
        }

        fn by_version(&self, version: KeyVersion) -> Result<Arc<KeyRecord>> {
            self.inner.by_version(version)
        }

        fn history(&self) -> Result<Vec<KeyInfo>> {
            self.inner.history()
        }
    }

    /// Registry whose every read fails with a fixed error
    struct FailingRegistry(fn() -> CoreError);

    impl KeyRegistry for FailingRegistry {
        fn append(&self, _: FieldKey32, _: EncryptionAlgorithm) -> Result<Arc<KeyRecord>> {
            Err((self.0)())
        }

        fn latest(&self) -> Result<Option<Arc<KeyRecord>>> {
            Err((self.0)())
        }

        fn by_version(&self, _: KeyVersion) -> Result<Arc<KeyRecord>> {
            Err((self.0)())
        }

        fn history(&self) -> Result<Vec<KeyInfo>> {
            Err((self.0)())
        }
    }

    #[test]
    fn test_empty_registry_mints_version_one() {
        let registry = Arc::new(InMemoryKeyRegistry::new());
        let resolver = KeyResolver::initialize(registry.clone(), &settings("S0-initial-secret")).unwrap();
        assert_eq!(resolver.current_version(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_restart_with_same_secret_reuses_record() {
        let registry = Arc::new(InMemoryKeyRegistry::new());
        KeyResolver::initialize(registry.clone(), &settings("S0-initial-secret")).unwrap();
        let again = KeyResolver::initialize(registry.clone(), &settings("S0-initial-secret")).unwrap();
        assert_eq!(again.current_version(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_restart_with_changed_secret_rotates() {
        let registry = Arc::new(InMemoryKeyRegistry::new());
        KeyResolver::initialize(registry.clone(), &settings("S1-first-secret!!")).unwrap();
        let again = KeyResolver::initialize(registry.clone(), &settings("S2-second-secret!")).unwrap();
        assert_eq!(again.current_version(), 2);
    }

    #[test]
    fn test_reload_publishes_new_current() {
        let registry = Arc::new(InMemoryKeyRegistry::new());
        let resolver = KeyResolver::initialize(registry, &settings("S1-first-secret!!")).unwrap();
        let before = resolver.current();

        let (previous, after) = resolver.reload(&phrase("S2-second-secret!")).unwrap();
        assert_eq!(previous, 1);
        assert_eq!(after.version(), 2);
        assert_eq!(resolver.current_version(), 2);
        assert_eq!(resolver.record_for(1).unwrap().fingerprint(), before.fingerprint());
    }

    #[test]
    fn test_reload_with_same_secret_is_noop() {
        let registry = Arc::new(InMemoryKeyRegistry::new());
        let resolver = KeyResolver::initialize(registry.clone(), &settings("S1-first-secret!!")).unwrap();
        let (previous, same) = resolver.reload(&phrase("S1-first-secret!!")).unwrap();
        assert_eq!((previous, same.version()), (1, 1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reload_rejects_blank_and_short_secrets() {
        let registry = Arc::new(InMemoryKeyRegistry::new());
        let resolver = KeyResolver::initialize(registry.clone(), &settings("S1-first-secret!!")).unwrap();

        for bad in ["", "   ", "x", "fifteen-bytes!!"] {
            assert!(matches!(
                resolver.reload(&phrase(bad)),
                Err(CoreError::Config(_))
            ));
        }
        assert_eq!(resolver.current_version(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reload_adopts_versions_minted_elsewhere() {
        let registry = Arc::new(InMemoryKeyRegistry::new());
        let resolver = KeyResolver::initialize(registry.clone(), &settings("S1-first-secret!!")).unwrap();

        // A second process rotates the shared registry twice
        let other = KeyResolver::initialize(registry.clone(), &settings("S2-second-secret!")).unwrap();
        other.reload(&phrase("S3-third-secret!!")).unwrap();

        let (previous, record) = resolver.reload(&phrase("S3-third-secret!!")).unwrap();
        assert_eq!((previous, record.version()), (1, 3));
        assert_eq!(resolver.current_version(), 3);
    }

    #[test]
    fn test_stale_reload_never_moves_cache_backwards() {
        let registry = Arc::new(LaggingRegistry::new());
        let resolver = KeyResolver::initialize(registry.clone(), &settings("S1-first-secret!!")).unwrap();
        resolver.reload(&phrase("S2-second-secret!")).unwrap();
        resolver.reload(&phrase("S3-third-secret!!")).unwrap();
        assert_eq!(resolver.current_version(), 3);

        // The registry now reports v1 as latest, and v1 holds the requested secret
        registry.pin_latest(1);
        let (previous, record) = resolver.reload(&phrase("S1-first-secret!!")).unwrap();

        assert_eq!(previous, 3);
        assert_eq!(record.version(), 3);
        assert_eq!(resolver.current_version(), 3);
        assert_eq!(registry.inner.len(), 3);
    }

    #[test]
    fn test_startup_keeps_corruption_distinct_from_outage() {
        let corrupt = Arc::new(FailingRegistry(|| {
            CoreError::InvalidKeyMaterial("key v1 has 5 bytes, expected 32".into())
        }));
        let err = KeyResolver::initialize(corrupt, &settings("S1-first-secret!!")).err().unwrap();
        assert!(matches!(err, CoreError::InvalidKeyMaterial(_)));
        assert!(!err.is_retryable());

        let down = Arc::new(FailingRegistry(|| {
            CoreError::KeyUnavailable("key registry: database is locked".into())
        }));
        let err = KeyResolver::initialize(down, &settings("S1-first-secret!!")).err().unwrap();
        assert!(matches!(err, CoreError::KeyUnavailable(_)));
        assert!(err.is_retryable());
    }
}
