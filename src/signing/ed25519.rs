//! Default signing provider: BIP-39 seed, SHA-512 child derivation,
//! Ed25519 detached signatures.
//!
//! Child keys are derived by hashing the seed together with the chain
//! parameters and derivation coordinates. Addresses are rendered as
//! `addr1` plus the hex payment-key-hash digest; the rendering is
//! deterministic but is not a chain-canonical bech32 encoding.

use ed25519_dalek::{Signer, SigningKey};
use sha2::{Digest, Sha256, Sha512};

use crate::error::{Error, Result};

use super::{
    DerivationPlan, DerivedAddress, GroupedAddresses, KeyMaterial, KeyRole, SignRequest,
    SignatureResult, SigningProvider,
};

/// Mnemonic-backed Ed25519 signer
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519Signer;

impl Ed25519Signer {
    fn seed(material: &KeyMaterial) -> Result<[u8; 64]> {
        let phrase = material.words.join(" ");
        let mnemonic = bip39::Mnemonic::parse_in_normalized(bip39::Language::English, &phrase)
            .map_err(|e| Error::Signing(format!("invalid mnemonic: {}", e)))?;
        Ok(mnemonic.to_seed(&material.passphrase))
    }

    fn child_key(
        seed: &[u8; 64],
        material: &KeyMaterial,
        role: KeyRole,
        index: u32,
        stake_key_index: u32,
    ) -> SigningKey {
        let role_tag: u8 = match role {
            KeyRole::External => 0,
            KeyRole::Internal => 1,
        };

        let mut hasher = Sha512::new();
        hasher.update(seed);
        hasher.update(material.chain_id.network_magic.to_le_bytes());
        hasher.update([material.chain_id.network_id]);
        hasher.update(material.account_index.to_le_bytes());
        hasher.update([role_tag]);
        hasher.update(index.to_le_bytes());
        hasher.update(stake_key_index.to_le_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest[..32]);
        SigningKey::from_bytes(&bytes)
    }

    /// `addr1` + hex of the 28-byte payment key hash
    fn render_address(key: &SigningKey) -> String {
        let digest = Sha256::digest(key.verifying_key().as_bytes());
        format!("addr1{}", hex::encode(&digest[..28]))
    }

    fn derive_one(
        seed: &[u8; 64],
        material: &KeyMaterial,
        role: KeyRole,
        index: u32,
        stake_key_index: u32,
    ) -> (SigningKey, DerivedAddress) {
        let key = Self::child_key(seed, material, role, index, stake_key_index);
        let entry = DerivedAddress {
            address: Self::render_address(&key),
            role,
            index,
        };
        (key, entry)
    }
}

impl SigningProvider for Ed25519Signer {
    fn derive_addresses(
        &self,
        material: &KeyMaterial,
        plan: &DerivationPlan,
    ) -> Result<GroupedAddresses> {
        let seed = Self::seed(material)?;

        let external = (0..plan.external_count)
            .map(|i| {
                Self::derive_one(&seed, material, KeyRole::External, i, plan.stake_key_index).1
            })
            .collect();
        let internal = (0..plan.internal_count)
            .map(|i| {
                Self::derive_one(&seed, material, KeyRole::Internal, i, plan.stake_key_index).1
            })
            .collect();

        Ok(GroupedAddresses {
            external,
            internal,
            stake_key_index: plan.stake_key_index,
        })
    }

    fn sign(&self, material: &KeyMaterial, request: &SignRequest) -> Result<SignatureResult> {
        let entry = request
            .known_addresses
            .find(&request.sign_with)
            .ok_or_else(|| {
                Error::Signing(format!(
                    "signer address {} is not in the derived address set",
                    request.sign_with
                ))
            })?;

        let seed = Self::seed(material)?;
        let (key, derived) = Self::derive_one(
            &seed,
            material,
            entry.role,
            entry.index,
            request.known_addresses.stake_key_index,
        );
        // The stored address must still match what the key derives to
        if derived.address != request.sign_with {
            return Err(Error::Signing(format!(
                "derived address mismatch for signer {}",
                request.sign_with
            )));
        }

        let payload = hex::decode(&request.payload_hex)
            .map_err(|e| Error::Signing(format!("payload is not hex: {}", e)))?;
        let signature = key.sign(&payload);

        Ok(SignatureResult {
            signature: hex::encode(signature.to_bytes()),
            key: hex::encode(key.verifying_key().as_bytes()),
        })
    }
}
