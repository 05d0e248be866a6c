// src/export/json.rs
use std::path::Path;

use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::consts::MANIFEST_FORMAT;
use crate::error::Result;
use crate::registry::KeyRegistry;

/// Export the key history (versions, fingerprints, algorithms, timestamps) to JSON.
///
/// Key material is never written, so the manifest is safe to hand to auditors.
/// Returns the number of key versions exported.
pub fn export_key_manifest<R, P>(registry: &R, path: P) -> Result<usize>
where
    R: KeyRegistry + ?Sized,
    P: AsRef<Path>,
{
    let keys = registry.history()?;
    let current_version = keys.last().map(|k| k.version);

    let manifest = json!({
        "export_format": MANIFEST_FORMAT,
        "exported_at": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        "exporter_version": env!("CARGO_PKG_VERSION"),
        "total_keys": keys.len(),
        "current_version": current_version,
        "keys": keys,
    });

    std::fs::write(path.as_ref(), serde_json::to_string_pretty(&manifest)?)?;
    info!(
        total = keys.len(),
        path = %path.as_ref().display(),
        "exported key manifest"
    );

    Ok(keys.len())
}
