//! Wallet folder repository
//!
//! Wallet folders live under lifecycle roots (`generated`, `registered`,
//! `mining`, ...) and are named by 6-digit zero-padded id. All JSON files
//! are written pretty-printed with a trailing newline, owner-only on Unix.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

use super::types::WalletRecord;

pub const WALLET_FILE: &str = "wallet.json";
pub const RECEIPT_FILE: &str = "registration_receipt.json";
pub const ERROR_RECEIPT_FILE: &str = "registration_receipt.error.json";

/// 6-digit zero-padded folder name for a wallet id
pub fn format_wallet_id(id: u32) -> String {
    format!("{:06}", id)
}

/// Folder of a wallet under a lifecycle root
pub fn wallet_dir(root: &Path, id: u32) -> PathBuf {
    root.join(format_wallet_id(id))
}

/// Ascending numeric ids of the wallet folders under a root.
///
/// Only all-digit directory names count; a missing root is an empty list,
/// not an error.
pub fn list_ids(root: &Path) -> Result<Vec<u32>> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::fs(root, e)),
    };

    let mut ids = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::fs(root, e))?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = name.parse::<u32>() {
                ids.push(id);
            }
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

/// Load a wallet's `wallet.json` from a lifecycle root.
///
/// A missing file is `None`; a malformed one is `InvalidWalletSchema`.
pub fn load_wallet(root: &Path, id: u32) -> Result<Option<WalletRecord>> {
    let path = wallet_dir(root, id).join(WALLET_FILE);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::fs(&path, e)),
    };
    let record = serde_json::from_str(&raw).map_err(|e| Error::InvalidWalletSchema {
        path: path.clone(),
        message: e.to_string(),
    })?;
    Ok(Some(record))
}

/// Deep-copy a wallet folder, removing any previous content at `dest`
/// first. Promotion across lifecycle roots copies; the source stays.
pub fn copy_dir(source: &Path, dest: &Path) -> Result<()> {
    if dest.exists() {
        fs::remove_dir_all(dest).map_err(|e| Error::fs(dest, e))?;
    }
    copy_tree(source, dest)
}

fn copy_tree(source: &Path, dest: &Path) -> Result<()> {
    create_dir_private(dest)?;
    let entries = fs::read_dir(source).map_err(|e| Error::fs(source, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::fs(source, e))?;
        let path = entry.path();
        let target = dest.join(entry.file_name());
        if path.is_dir() {
            copy_tree(&path, &target)?;
        } else {
            fs::copy(&path, &target).map_err(|e| Error::fs(&path, e))?;
        }
    }
    Ok(())
}

/// Create a directory tree, owner-only (0o700) on Unix
pub fn create_dir_private(path: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path).map_err(|e| Error::fs(path, e))
}

/// Read a JSON document, `None` when the file does not exist
pub fn read_json_opt<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::fs(path, e)),
    };
    Ok(Some(serde_json::from_str(&raw)?))
}

/// Write a JSON document pretty-printed with a trailing newline, creating
/// parent directories as needed; file mode 0o600 on Unix
pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_private(parent)?;
    }
    let mut body = serde_json::to_string_pretty(value)?;
    body.push('\n');
    fs::write(path, body).map_err(|e| Error::fs(path, e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .map_err(|e| Error::fs(path, e))?;
    }
    Ok(())
}

/// Delete a file if present; absence is not an error
pub fn remove_file_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::fs(path, e)),
    }
}
