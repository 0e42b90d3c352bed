//! Message signing against a wallet's derived key set
//!
//! The provider trait is the seam towards the actual key/signing
//! implementation; [`SigningAdapter`] maps wallet documents onto it and
//! owns the defaulting rules for derivation parameters.

pub mod ed25519;

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::wallets::types::{ChainId, WalletRecord};

/// Detached signature over a payload.
///
/// `key` is hex key material whose trailing 64 characters double as the
/// registration nonce and the receipt's public key. That reuse is a
/// protocol convention; do not assume `key` encodes only a public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureResult {
    pub signature: String,
    pub key: String,
}

/// Secret inputs a provider derives keys from
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    pub words: Vec<String>,
    pub passphrase: String,
    pub chain_id: ChainId,
    pub account_index: u32,
}

/// How many keys to derive per role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivationPlan {
    pub external_count: u32,
    pub internal_count: u32,
    pub stake_key_index: u32,
}

/// Role of a derived payment key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    External,
    Internal,
}

/// One derived address together with its derivation coordinates, so a
/// provider can re-derive the matching key when asked to sign as it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedAddress {
    pub address: String,
    pub role: KeyRole,
    pub index: u32,
}

/// Full derived address set of a wallet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedAddresses {
    pub external: Vec<DerivedAddress>,
    pub internal: Vec<DerivedAddress>,
    pub stake_key_index: u32,
}

impl GroupedAddresses {
    pub fn all(&self) -> impl Iterator<Item = &DerivedAddress> {
        self.external.iter().chain(self.internal.iter())
    }

    pub fn find(&self, address: &str) -> Option<&DerivedAddress> {
        self.all().find(|entry| entry.address == address)
    }
}

/// A signing request: who signs, what they sign, and the address set
/// forming the verification context
#[derive(Debug, Clone)]
pub struct SignRequest {
    /// Address acting as the signer identity
    pub sign_with: String,
    /// Hex encoding of the UTF-8 message bytes
    pub payload_hex: String,
    /// Derived address set the signature is verified against
    pub known_addresses: GroupedAddresses,
}

/// External key/signing collaborator
pub trait SigningProvider: Send + Sync {
    fn derive_addresses(
        &self,
        material: &KeyMaterial,
        plan: &DerivationPlan,
    ) -> Result<GroupedAddresses>;

    fn sign(&self, material: &KeyMaterial, request: &SignRequest) -> Result<SignatureResult>;
}

/// Maps wallet documents onto a [`SigningProvider`]
#[derive(Clone)]
pub struct SigningAdapter {
    provider: Arc<dyn SigningProvider>,
}

impl SigningAdapter {
    pub fn new(provider: Arc<dyn SigningProvider>) -> Self {
        Self { provider }
    }

    /// Sign a UTF-8 message on behalf of a wallet.
    ///
    /// The signer identity is the wallet's primary external address; the
    /// verification context is the full derived address set. Provider
    /// failures propagate unchanged.
    pub fn sign(&self, wallet: &WalletRecord, message: &str) -> Result<SignatureResult> {
        let words = wallet.mnemonic.normalize()?;
        let chain_id = wallet.chain_id.ok_or(Error::MissingChainId)?;
        let signer = wallet
            .primary_address()
            .ok_or(Error::MissingAddress)?
            .to_string();

        let material = KeyMaterial {
            words,
            passphrase: wallet.passphrase.clone(),
            chain_id,
            account_index: wallet.account_index,
        };
        let plan = DerivationPlan {
            external_count: wallet.external_count(),
            internal_count: wallet.internal_count(),
            stake_key_index: wallet.stake_key_index,
        };

        let known_addresses = self.provider.derive_addresses(&material, &plan)?;
        let request = SignRequest {
            sign_with: signer,
            payload_hex: hex::encode(message.as_bytes()),
            known_addresses,
        };
        self.provider.sign(&material, &request)
    }
}

/// Trailing 64 hex characters of a signature key, after stripping an
/// optional `0x` prefix. This is both the registration nonce and the
/// receipt's public key fragment.
pub fn trailing_key_hex(key: &str) -> Result<String> {
    let stripped = key.strip_prefix("0x").unwrap_or(key);
    if stripped.len() < 64 {
        return Err(Error::NonceDerivation);
    }
    Ok(stripped[stripped.len() - 64..].to_string())
}
