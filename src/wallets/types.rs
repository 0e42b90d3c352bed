//! Core types for wallet lifecycle documents
//!
//! Every JSON document this tool reads or writes is typed here; malformed
//! documents fail loading instead of being silently defaulted.

use serde::{Deserialize, Serialize};

use crate::api::ApiBody;
use crate::error::{Error, Result};

/// A wallet document (`wallet.json`) inside a lifecycle folder
///
/// The folder is named by the wallet's 6-digit zero-padded id, which stays
/// stable across every lifecycle root the wallet is copied into.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    /// Numeric wallet id, unique within a lifecycle root
    pub id: u32,

    /// Recovery phrase, stored either as a word array or a single string
    pub mnemonic: Mnemonic,

    /// Optional spending passphrase ("" when absent)
    #[serde(default)]
    pub passphrase: String,

    /// Chain the wallet belongs to; required for signing
    #[serde(default)]
    pub chain_id: Option<ChainId>,

    /// Account index used for key derivation
    #[serde(default)]
    pub account_index: u32,

    /// Stake key index used for key derivation
    #[serde(default)]
    pub stake_key_index: u32,

    /// How many external addresses to derive (defaults to the stored list)
    #[serde(default)]
    pub external_count: Option<u32>,

    /// How many internal addresses to derive (defaults to the stored list)
    #[serde(default)]
    pub internal_count: Option<u32>,

    /// Addresses derived at generation time
    #[serde(default)]
    pub addresses: AddressBook,
}

impl WalletRecord {
    /// Payment address of the first external entry, the wallet's identity
    /// towards the mining service
    pub fn primary_address(&self) -> Option<&str> {
        self.addresses.external.first().and_then(AddressEntry::best)
    }

    /// External derivation count: explicit value, else stored list length, else 1
    pub fn external_count(&self) -> u32 {
        self.external_count
            .unwrap_or_else(|| list_count(&self.addresses.external))
    }

    /// Internal derivation count: explicit value, else stored list length, else 1
    pub fn internal_count(&self) -> u32 {
        self.internal_count
            .unwrap_or_else(|| list_count(&self.addresses.internal))
    }
}

fn list_count(entries: &[AddressEntry]) -> u32 {
    if entries.is_empty() {
        1
    } else {
        entries.len() as u32
    }
}

/// Grouped address lists of a wallet
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddressBook {
    #[serde(default)]
    pub external: Vec<AddressEntry>,
    #[serde(default)]
    pub internal: Vec<AddressEntry>,
}

/// One derived address; generation tooling has written either key over time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl AddressEntry {
    /// Prefer the payment address, fall back to the legacy `address` key
    pub fn best(&self) -> Option<&str> {
        self.payment_address
            .as_deref()
            .or(self.address.as_deref())
    }
}

/// Chain identifier carried in wallet documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainId {
    pub network_id: u8,
    pub network_magic: u64,
}

/// Recovery phrase in either of the two shapes generation tooling produced
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Mnemonic {
    Words(Vec<String>),
    Phrase(String),
}

impl Mnemonic {
    /// Ordered word list; whitespace-splits the phrase form.
    /// An empty result means the document cannot identify a key.
    pub fn normalize(&self) -> Result<Vec<String>> {
        let words: Vec<String> = match self {
            Mnemonic::Words(words) => words.clone(),
            Mnemonic::Phrase(phrase) => phrase
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        };
        if words.is_empty() {
            return Err(Error::InvalidMnemonicFormat);
        }
        Ok(words)
    }

    /// Single space-joined phrase, as stored in the ledger
    pub fn phrase(&self) -> String {
        match self {
            Mnemonic::Words(words) => words.join(" "),
            Mnemonic::Phrase(phrase) => phrase.clone(),
        }
    }
}

/// Inclusive id range selected on the command line; absent bound = unbounded
#[derive(Debug, Clone, Copy, Default)]
pub struct IdRange {
    pub from: Option<u32>,
    pub to: Option<u32>,
}

impl IdRange {
    pub fn new(from: Option<u32>, to: Option<u32>) -> Self {
        Self { from, to }
    }

    /// Unbounded on both sides
    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: u32) -> bool {
        if let Some(from) = self.from {
            if id < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if id > to {
                return false;
            }
        }
        true
    }
}

/// Proof of a successful registration, written into the registered and
/// mining copies of the wallet folder
///
/// Its presence at the registered folder is the idempotency marker for
/// the wallet; re-runs skip wallets that already have one unless forced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationReceipt {
    pub preimage: String,
    pub timestamp: String,
    pub wallet_address: String,
    pub signature: String,
    pub public_key: Option<String>,
    pub hash: String,
    pub version: String,
    pub server_signature: Option<String>,
    pub registration_receipt: ServerReceipt,
}

/// Server-side half of a registration receipt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerReceipt {
    pub preimage: String,
    pub signature: Option<String>,
    pub timestamp: String,
}

/// Record of the most recent registration failure for a wallet
/// (`registration_receipt.error.json`); removed again on the next success
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReceipt {
    pub at: String,
    pub message: String,
}

/// One row of the `wall.json` ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: u32,
    pub directory: String,
    pub address: String,
    pub mnemonic: String,
}

/// Outcome of a single donation call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DonationOutcome {
    /// The service accepted the transfer
    Success,
    /// HTTP 409: the donor's rights were already consolidated earlier
    AlreadyConsolidated,
}

impl std::fmt::Display for DonationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DonationOutcome::Success => write!(f, "success"),
            DonationOutcome::AlreadyConsolidated => write!(f, "already-consolidated"),
        }
    }
}

/// Per-donor audit record written to the donors root after each attempt;
/// overwritten when the donor runs again
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationRecord {
    pub executed_at: String,
    /// Formatted id of the lowest wallet matched by the range
    pub from: String,
    /// Formatted id of the highest wallet matched by the range
    pub to: String,
    pub donor_id: u32,
    pub donor_address: String,
    /// Absent when donating to an explicit external address
    pub recipient_id: Option<u32>,
    pub recipient_address: String,
    pub outcome: DonationOutcome,
    pub response: ApiBody,
}
