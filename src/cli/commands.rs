//! CLI command implementations
//!
//! Each command ensures the directory layout, wires the configuration
//! into the components it needs, and logs a closing summary line.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::api::HttpMiningApi;
use crate::config::Config;
use crate::donate::Consolidator;
use crate::register::Registrar;
use crate::signing::ed25519::Ed25519Signer;
use crate::signing::SigningAdapter;
use crate::wallets::types::IdRange;
use crate::wallets::{ledger, store};

/// Create the wallet directory layout
pub async fn init(config: &Config) -> Result<()> {
    let paths = config.paths();
    paths.ensure_layout()?;
    info!("Wallet layout ready at {}", paths.root.display());
    Ok(())
}

/// Register generated wallets in the selected range
pub async fn register(
    config: &Config,
    from: Option<u32>,
    to: Option<u32>,
    force: bool,
) -> Result<()> {
    let paths = config.paths();
    paths.ensure_layout()?;

    let api = Arc::new(HttpMiningApi::new(config.api_base())?);
    let signer = SigningAdapter::new(Arc::new(Ed25519Signer));
    let registrar = Registrar::new(paths, api, signer, config.pacing());

    let summary = registrar.run(IdRange::new(from, to), force).await?;
    info!(
        "Registration pass complete: {} registered, {} skipped, {} failed",
        summary.succeeded, summary.skipped, summary.failed
    );
    Ok(())
}

/// Donate accumulated rights from registered wallets in the selected range
pub async fn donate(
    config: &Config,
    from: Option<u32>,
    to: Option<u32>,
    address: Option<String>,
) -> Result<()> {
    let paths = config.paths();
    paths.ensure_layout()?;

    let api = Arc::new(HttpMiningApi::new(config.api_base())?);
    let signer = SigningAdapter::new(Arc::new(Ed25519Signer));
    let consolidator = Consolidator::new(paths, api, signer, config.pacing());

    let summary = consolidator
        .run(IdRange::new(from, to), address.as_deref())
        .await?;
    info!(
        "Donation pass complete: {} donated, {} skipped, {} failed",
        summary.succeeded, summary.skipped, summary.failed
    );
    Ok(())
}

/// Show per-stage wallet counts and the ledger size
pub async fn status(config: &Config) -> Result<()> {
    let paths = config.paths();

    for (label, root) in [
        ("generated", &paths.generated),
        ("registered", &paths.registered),
        ("mining", &paths.mining),
    ] {
        let count = store::list_ids(root)?.len();
        info!("{:>10}: {} wallet(s)", label, count);
    }

    info!(
        "{:>10}: {} donation record(s)",
        "donors",
        count_json_files(&paths.donors)?
    );
    info!(
        "{:>10}: {} row(s)",
        "ledger",
        ledger::load_ledger(&paths.wall_file)?.len()
    );
    Ok(())
}

/// Number of `*.json` files directly under a directory; missing dir is zero
fn count_json_files(dir: &Path) -> Result<usize> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    let mut count = 0;
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_count_json_files() {
        let dir = tempdir().unwrap();
        assert_eq!(count_json_files(&dir.path().join("missing")).unwrap(), 0);

        std::fs::write(dir.path().join("000002.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("000003.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::create_dir(dir.path().join("sub.json")).unwrap();
        assert_eq!(count_json_files(dir.path()).unwrap(), 2);
    }
}
