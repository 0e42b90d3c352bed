//! Wallet documents, folder repository, and the registration ledger

pub mod ledger;
pub mod store;
pub mod types;

pub use types::{DonationOutcome, DonationRecord, LedgerEntry, RegistrationReceipt, WalletRecord};
