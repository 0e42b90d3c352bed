//! The `wall.json` ledger: one summary row per registered wallet
//!
//! Read-modify-write of a single shared file; not safe for concurrent
//! writers. The batch orchestrators are strictly sequential, which is
//! what keeps this safe.

use std::path::Path;

use super::store;
use super::types::LedgerEntry;
use crate::error::Result;

/// Load all ledger rows; a missing file is an empty ledger
pub fn load_ledger(path: &Path) -> Result<Vec<LedgerEntry>> {
    Ok(store::read_json_opt(path)?.unwrap_or_default())
}

/// Insert or replace a ledger row.
///
/// The first existing row matching the new entry on any of id, directory,
/// or address is replaced; otherwise the entry is appended. Two wallets
/// that ever shared an address therefore collapse into one row. Known
/// ambiguity, kept as-is: downstream consumers depend on the collapsing.
pub fn upsert_entry(path: &Path, entry: LedgerEntry) -> Result<Vec<LedgerEntry>> {
    let mut rows = load_ledger(path)?;
    let found = rows.iter().position(|row| {
        row.id == entry.id || row.directory == entry.directory || row.address == entry.address
    });
    match found {
        Some(index) => rows[index] = entry,
        None => rows.push(entry),
    }
    store::write_json_pretty(path, &rows)?;
    Ok(rows)
}
