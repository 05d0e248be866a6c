//! Key registry admin tool
//!
//! Usage:
//!   efv_keys status
//!   efv_keys rotate
//!   efv_keys export <path>

use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use encrypted_field_vault::{
    export_key_manifest, load_config, EncryptionSettings, FieldVault, KeyRegistry,
    SqliteKeyRegistry,
};
use rpassword::read_password;
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("status");

    let config = load_config().context("Failed to load configuration (is EFV_SECRET_KEY set?)")?;
    let registry = Arc::new(
        SqliteKeyRegistry::open(&config.registry).with_context(|| {
            format!(
                "Failed to open key registry at {}",
                config.registry.db_path.display()
            )
        })?,
    );

    match command {
        "status" => {
            let vault = FieldVault::open(registry.clone(), &config.encryption)
                .context("Startup key resolution failed")?;
            print_history(registry.as_ref(), vault.current_key_version())?;
        }
        "rotate" => {
            let vault = FieldVault::open(registry.clone(), &config.encryption)
                .context("Startup key resolution failed")?;

            print!("New secret: ");
            std::io::stdout().flush()?;
            let first = read_password()?;
            print!("Repeat new secret: ");
            std::io::stdout().flush()?;
            let second = read_password()?;
            if first != second {
                bail!("Secrets do not match, nothing rotated");
            }

            let settings = EncryptionSettings::new(first.trim_end(), config.encryption.algorithm)
                .context("Rejected new secret")?;
            let result = vault.rotate(&settings.secret_key)?;
            if result.rotated() {
                info!("Rotated {result}");
                println!("Rotated {result}");
                println!("Update encryption.secret_key in your configuration before the next restart.");
            } else {
                println!("Secret is already current ({result}), nothing rotated");
            }
        }
        "export" => {
            let Some(path) = args.get(1) else {
                bail!("usage: efv_keys export <path>");
            };
            let total = export_key_manifest(registry.as_ref(), path)
                .with_context(|| format!("Failed to write manifest to {path}"))?;
            println!("Exported {total} key version(s) → {path}");
        }
        other => bail!("unknown command '{other}' (expected status | rotate | export <path>)"),
    }

    Ok(())
}

fn print_history(registry: &SqliteKeyRegistry, current: u32) -> Result<()> {
    let history = registry.history()?;
    println!("=== KEY REGISTRY ===");
    for key in &history {
        let marker = if key.version == current { "*" } else { " " };
        println!(
            "{marker} v{:<4} {}  {}  {}",
            key.version,
            key.fingerprint,
            key.algorithm,
            key.created_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        );
    }
    println!("Total: {} version(s), current v{current}", history.len());
    Ok(())
}
