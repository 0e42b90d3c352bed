//! Registration orchestrator
//!
//! One pass over the generated wallets in a selected id range: idempotency
//! gate, terms signing, nonce derivation, the register call, receipt
//! persistence into the registered and mining roots, and the ledger
//! upsert. A wallet's failure is recorded and never aborts its siblings.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::api::{ApiBody, MiningApi};
use crate::config::{Pacing, WalletPaths};
use crate::error::{Error, Result};
use crate::signing::{trailing_key_hex, SignatureResult, SigningAdapter};
use crate::wallets::types::{ErrorReceipt, LedgerEntry, RegistrationReceipt, ServerReceipt};
use crate::wallets::types::IdRange;
use crate::wallets::{ledger, store};

/// Terms-of-service message every wallet signs; content and version are
/// protocol constants shared with the server.
pub const REGISTER_MESSAGE: &str = "I agree to abide by the terms and conditions as described in version 1-0 of the Defensio DFO mining process: 2da58cd94d6ccf3d933c4a55ebc720ba03b829b84033b4844aafc36828477cc0";
pub const REGISTRATION_HASH: &str =
    "2da58cd94d6ccf3d933c4a55ebc720ba03b829b84033b4844aafc36828477cc0";
pub const REGISTRATION_VERSION: &str = "1-0";

/// Counts for one orchestrator pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Fields a successful register response may carry; everything is
/// optional and locally derived values fill the gaps
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterAck {
    #[serde(default)]
    preimage: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    registration_receipt: Option<RegisterAckReceipt>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RegisterAckReceipt {
    #[serde(default)]
    preimage: Option<String>,
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
}

/// Drives registration passes over the generated lifecycle root
pub struct Registrar {
    paths: WalletPaths,
    api: Arc<dyn MiningApi>,
    signer: SigningAdapter,
    pacing: Pacing,
}

impl Registrar {
    pub fn new(
        paths: WalletPaths,
        api: Arc<dyn MiningApi>,
        signer: SigningAdapter,
        pacing: Pacing,
    ) -> Self {
        Self {
            paths,
            api,
            signer,
            pacing,
        }
    }

    /// Register every generated wallet in `range`, in ascending id order,
    /// pacing remote attempts.
    ///
    /// Wallets that already hold a registration receipt are skipped unless
    /// `force` is set; skips never touch the network and never consume a
    /// pacing slot.
    pub async fn run(&self, range: IdRange, force: bool) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();

        let ids = store::list_ids(&self.paths.generated)?;
        if ids.is_empty() {
            info!("No generated wallets found. Run `defensio generate` first.");
            return Ok(summary);
        }

        let selected: Vec<u32> = ids.into_iter().filter(|id| range.contains(*id)).collect();
        if selected.is_empty() {
            info!("No wallets matched the requested range.");
            return Ok(summary);
        }

        let mut paced = false;
        for id in selected {
            let registered_dir = store::wallet_dir(&self.paths.registered, id);
            let receipt_path = registered_dir.join(store::RECEIPT_FILE);
            if receipt_path.exists() && !force {
                info!(
                    "Skipping wallet {} (already has registration receipt).",
                    store::format_wallet_id(id)
                );
                summary.skipped += 1;
                continue;
            }

            if paced {
                self.pacing.pause().await;
            }
            paced = true;
            summary.attempted += 1;

            match self.register_wallet(id).await {
                Ok(address) => {
                    info!(
                        "Registered wallet {} ({}...)",
                        store::format_wallet_id(id),
                        preview(&address, 32)
                    );
                    summary.succeeded += 1;
                }
                Err(e) => {
                    error!(
                        "Failed to register wallet {}: {}",
                        store::format_wallet_id(id),
                        e
                    );
                    summary.failed += 1;
                    let artifact = ErrorReceipt {
                        at: Utc::now().to_rfc3339(),
                        message: e.to_string(),
                    };
                    let error_path = registered_dir.join(store::ERROR_RECEIPT_FILE);
                    if let Err(write_err) = store::write_json_pretty(&error_path, &artifact) {
                        warn!(
                            "Could not persist error receipt for wallet {}: {}",
                            store::format_wallet_id(id),
                            write_err
                        );
                    }
                }
            }
        }

        Ok(summary)
    }

    /// Full registration of one wallet; returns its address on success
    async fn register_wallet(&self, id: u32) -> Result<String> {
        let source_dir = store::wallet_dir(&self.paths.generated, id);
        let wallet = store::load_wallet(&self.paths.generated, id)?
            .ok_or_else(|| Error::MissingWalletFile(source_dir.clone()))?;
        let address = wallet
            .primary_address()
            .ok_or(Error::MissingAddress)?
            .to_string();

        let signature = self.signer.sign(&wallet, REGISTER_MESSAGE)?;
        let nonce = trailing_key_hex(&signature.key)?;

        let response = self
            .api
            .register(&address, &signature.signature, &nonce)
            .await?;
        let response_timestamp = Utc::now().to_rfc3339();
        if !response.is_success() {
            return Err(Error::RemoteRequest {
                status: response.status,
                body: response.body.render(),
            });
        }

        let receipt = build_receipt(&address, &signature, &response.body, &response_timestamp);

        // Promote into both the registered and mining roots; each copy gets
        // the receipt and sheds any stale error receipt.
        for root in [&self.paths.registered, &self.paths.mining] {
            let target = store::wallet_dir(root, id);
            store::copy_dir(&source_dir, &target)?;
            store::write_json_pretty(&target.join(store::RECEIPT_FILE), &receipt)?;
            store::remove_file_if_exists(&target.join(store::ERROR_RECEIPT_FILE))?;
        }

        let registered_dir = store::wallet_dir(&self.paths.registered, id);
        ledger::upsert_entry(
            &self.paths.wall_file,
            LedgerEntry {
                id,
                directory: self
                    .paths
                    .relative_to_root(&registered_dir)
                    .to_string_lossy()
                    .into_owned(),
                address: address.clone(),
                mnemonic: wallet.mnemonic.phrase(),
            },
        )?;

        Ok(address)
    }
}

/// Assemble the receipt, preferring server-supplied fields and falling
/// back to locally derived preimage and response-time timestamp
fn build_receipt(
    address: &str,
    signature: &SignatureResult,
    body: &ApiBody,
    response_timestamp: &str,
) -> RegistrationReceipt {
    let ack: RegisterAck = body.decode().unwrap_or_default();

    let public_key = trailing_key_hex(&signature.key).ok();
    let derived_preimage = ack.preimage.unwrap_or_else(|| {
        format!(
            "{}{}{}",
            address,
            signature.signature,
            public_key.as_deref().unwrap_or("")
        )
    });
    let timestamp = ack
        .timestamp
        .unwrap_or_else(|| response_timestamp.to_string());

    let inner = match ack.registration_receipt {
        Some(server) => ServerReceipt {
            preimage: server.preimage.unwrap_or_else(|| derived_preimage.clone()),
            signature: server.signature,
            timestamp: server
                .timestamp
                .unwrap_or_else(|| response_timestamp.to_string()),
        },
        None => ServerReceipt {
            preimage: derived_preimage.clone(),
            signature: None,
            timestamp: response_timestamp.to_string(),
        },
    };

    RegistrationReceipt {
        preimage: derived_preimage,
        timestamp,
        wallet_address: address.to_string(),
        signature: signature.signature.clone(),
        public_key,
        hash: REGISTRATION_HASH.to_string(),
        version: REGISTRATION_VERSION.to_string(),
        server_signature: inner.signature.clone(),
        registration_receipt: inner,
    }
}

/// First `len` characters of an address for log lines
pub(crate) fn preview(address: &str, len: usize) -> &str {
    let end = address
        .char_indices()
        .nth(len)
        .map_or(address.len(), |(i, _)| i);
    &address[..end]
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::tempdir;

    use super::*;
    use crate::api::ApiResponse;
    use crate::signing::{
        DerivationPlan, DerivedAddress, GroupedAddresses, KeyMaterial, KeyRole, SignRequest,
        SigningProvider,
    };
    use crate::wallets::types::{AddressBook, AddressEntry, ChainId, Mnemonic, WalletRecord};

    struct FakeSigner {
        key: String,
    }

    impl SigningProvider for FakeSigner {
        fn derive_addresses(
            &self,
            _material: &KeyMaterial,
            plan: &DerivationPlan,
        ) -> Result<GroupedAddresses> {
            Ok(GroupedAddresses {
                external: (0..plan.external_count)
                    .map(|i| DerivedAddress {
                        address: format!("addr1fake{}", i),
                        role: KeyRole::External,
                        index: i,
                    })
                    .collect(),
                internal: vec![],
                stake_key_index: plan.stake_key_index,
            })
        }

        fn sign(&self, _material: &KeyMaterial, request: &SignRequest) -> Result<SignatureResult> {
            Ok(SignatureResult {
                signature: format!("sig-for-{}", request.sign_with),
                key: self.key.clone(),
            })
        }
    }

    struct FakeApi {
        calls: Mutex<Vec<(String, String, String)>>,
        fail_addresses: HashSet<String>,
    }

    impl FakeApi {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_addresses: HashSet::new(),
            }
        }

        fn failing_for(addresses: &[&str]) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_addresses: addresses.iter().map(|a| a.to_string()).collect(),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl MiningApi for FakeApi {
        async fn register(
            &self,
            address: &str,
            signature: &str,
            nonce: &str,
        ) -> Result<ApiResponse> {
            self.calls.lock().unwrap().push((
                address.to_string(),
                signature.to_string(),
                nonce.to_string(),
            ));
            if self.fail_addresses.contains(address) {
                Ok(ApiResponse {
                    status: 500,
                    body: ApiBody::Raw("server exploded".into()),
                })
            } else {
                Ok(ApiResponse {
                    status: 200,
                    body: ApiBody::Json(serde_json::json!({
                        "preimage": "server-preimage",
                        "timestamp": "2026-01-01T00:00:00Z"
                    })),
                })
            }
        }

        async fn donate(&self, _r: &str, _d: &str, _s: &str) -> Result<ApiResponse> {
            unreachable!("registration tests never donate")
        }
    }

    fn wallet(id: u32, address: &str) -> WalletRecord {
        WalletRecord {
            id,
            mnemonic: Mnemonic::Words(vec!["alpha".into(), "beta".into(), "gamma".into()]),
            passphrase: String::new(),
            chain_id: Some(ChainId {
                network_id: 0,
                network_magic: 2,
            }),
            account_index: 0,
            stake_key_index: 0,
            external_count: None,
            internal_count: None,
            addresses: AddressBook {
                external: vec![AddressEntry {
                    payment_address: Some(address.into()),
                    address: None,
                }],
                internal: vec![],
            },
        }
    }

    fn seed_generated(paths: &WalletPaths, id: u32) -> String {
        let address = format!("addr1wallet{:06}", id);
        let path = store::wallet_dir(&paths.generated, id).join(store::WALLET_FILE);
        store::write_json_pretty(&path, &wallet(id, &address)).unwrap();
        address
    }

    fn registrar(paths: &WalletPaths, api: Arc<FakeApi>) -> Registrar {
        let signer = SigningAdapter::new(Arc::new(FakeSigner {
            key: format!("0x{}", "ab".repeat(40)),
        }));
        Registrar::new(paths.clone(), api, signer, Pacing::none())
    }

    #[tokio::test]
    async fn test_registers_all_wallets_in_ascending_order() {
        let dir = tempdir().unwrap();
        let paths = WalletPaths::resolve(dir.path());
        for id in [3, 1, 2] {
            seed_generated(&paths, id);
        }

        let api = Arc::new(FakeApi::new());
        let summary = registrar(&paths, api.clone())
            .run(IdRange::all(), false)
            .await
            .unwrap();

        assert_eq!(
            summary,
            BatchSummary {
                attempted: 3,
                succeeded: 3,
                skipped: 0,
                failed: 0
            }
        );

        let calls = api.calls.lock().unwrap();
        let addresses: Vec<_> = calls.iter().map(|(a, _, _)| a.clone()).collect();
        assert_eq!(
            addresses,
            vec!["addr1wallet000001", "addr1wallet000002", "addr1wallet000003"]
        );
        // nonce is the trailing 64 hex chars of the signature key
        assert_eq!(calls[0].2, "ab".repeat(40)[80 - 64..].to_string());

        for id in 1..=3 {
            assert!(store::wallet_dir(&paths.registered, id)
                .join(store::RECEIPT_FILE)
                .exists());
            assert!(store::wallet_dir(&paths.mining, id)
                .join(store::RECEIPT_FILE)
                .exists());
        }
        assert_eq!(ledger::load_ledger(&paths.wall_file).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let dir = tempdir().unwrap();
        let paths = WalletPaths::resolve(dir.path());
        seed_generated(&paths, 1);
        seed_generated(&paths, 2);

        let api = Arc::new(FakeApi::new());
        let worker = registrar(&paths, api.clone());
        worker.run(IdRange::all(), false).await.unwrap();
        assert_eq!(api.call_count(), 2);

        let second = worker.run(IdRange::all(), false).await.unwrap();
        assert_eq!(api.call_count(), 2); // zero network calls
        assert_eq!(second.skipped, 2);
        assert_eq!(second.attempted, 0);
        assert_eq!(ledger::load_ledger(&paths.wall_file).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_force_rerun_clears_error_receipt() {
        let dir = tempdir().unwrap();
        let paths = WalletPaths::resolve(dir.path());
        seed_generated(&paths, 1);

        let error_path = store::wallet_dir(&paths.registered, 1).join(store::ERROR_RECEIPT_FILE);
        store::write_json_pretty(
            &error_path,
            &ErrorReceipt {
                at: "earlier".into(),
                message: "boom".into(),
            },
        )
        .unwrap();

        let api = Arc::new(FakeApi::new());
        let worker = registrar(&paths, api.clone());
        worker.run(IdRange::all(), false).await.unwrap();
        assert!(!error_path.exists());

        // a forced re-run registers again and overwrites the receipt
        let summary = worker.run(IdRange::all(), true).await.unwrap();
        assert_eq!(api.call_count(), 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(ledger::load_ledger(&paths.wall_file).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_isolated_and_error_receipt_written() {
        let dir = tempdir().unwrap();
        let paths = WalletPaths::resolve(dir.path());
        for id in 1..=3 {
            seed_generated(&paths, id);
        }

        let api = Arc::new(FakeApi::failing_for(&["addr1wallet000002"]));
        let summary = registrar(&paths, api.clone())
            .run(IdRange::all(), false)
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);

        let failed_dir = store::wallet_dir(&paths.registered, 2);
        assert!(failed_dir.join(store::ERROR_RECEIPT_FILE).exists());
        assert!(!failed_dir.join(store::RECEIPT_FILE).exists());
        let artifact: ErrorReceipt =
            store::read_json_opt(&failed_dir.join(store::ERROR_RECEIPT_FILE))
                .unwrap()
                .unwrap();
        assert!(artifact.message.contains("500"));

        // siblings were promoted and ledgered normally
        assert!(store::wallet_dir(&paths.registered, 3)
            .join(store::RECEIPT_FILE)
            .exists());
        assert_eq!(ledger::load_ledger(&paths.wall_file).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_range_bounds_are_inclusive() {
        let dir = tempdir().unwrap();
        let paths = WalletPaths::resolve(dir.path());
        for id in 1..=4 {
            seed_generated(&paths, id);
        }

        let api = Arc::new(FakeApi::new());
        let summary = registrar(&paths, api.clone())
            .run(IdRange::new(Some(2), Some(3)), false)
            .await
            .unwrap();

        assert_eq!(summary.attempted, 2);
        let calls = api.calls.lock().unwrap();
        assert_eq!(calls[0].0, "addr1wallet000002");
        assert_eq!(calls[1].0, "addr1wallet000003");
    }

    #[tokio::test]
    async fn test_short_signature_key_fails_nonce_derivation() {
        let dir = tempdir().unwrap();
        let paths = WalletPaths::resolve(dir.path());
        seed_generated(&paths, 1);

        let api = Arc::new(FakeApi::new());
        let signer = SigningAdapter::new(Arc::new(FakeSigner {
            key: "0xdeadbeef".into(),
        }));
        let worker = Registrar::new(paths.clone(), api.clone(), signer, Pacing::none());
        let summary = worker.run(IdRange::all(), false).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(api.call_count(), 0); // failed before the network call
        assert!(store::wallet_dir(&paths.registered, 1)
            .join(store::ERROR_RECEIPT_FILE)
            .exists());
    }

    #[tokio::test]
    async fn test_missing_wallet_file_fails_that_wallet_only() {
        let dir = tempdir().unwrap();
        let paths = WalletPaths::resolve(dir.path());
        seed_generated(&paths, 1);
        // id 2 has a folder but no wallet.json
        store::create_dir_private(&store::wallet_dir(&paths.generated, 2)).unwrap();

        let api = Arc::new(FakeApi::new());
        let summary = registrar(&paths, api.clone())
            .run(IdRange::all(), false)
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert!(store::wallet_dir(&paths.registered, 2)
            .join(store::ERROR_RECEIPT_FILE)
            .exists());
    }

    #[test]
    fn test_build_receipt_prefers_server_fields() {
        let signature = SignatureResult {
            signature: "sig".into(),
            key: "f".repeat(64),
        };
        let body = ApiBody::Json(serde_json::json!({
            "preimage": "server-preimage",
            "timestamp": "server-time",
            "registrationReceipt": {
                "signature": "server-sig",
                "timestamp": "inner-time"
            }
        }));

        let receipt = build_receipt("addr1x", &signature, &body, "local-time");
        assert_eq!(receipt.preimage, "server-preimage");
        assert_eq!(receipt.timestamp, "server-time");
        assert_eq!(receipt.server_signature.as_deref(), Some("server-sig"));
        assert_eq!(receipt.registration_receipt.timestamp, "inner-time");
        // inner preimage falls back to the outer one when absent
        assert_eq!(receipt.registration_receipt.preimage, "server-preimage");
        assert_eq!(receipt.hash, REGISTRATION_HASH);
        assert_eq!(receipt.version, REGISTRATION_VERSION);
    }

    #[test]
    fn test_build_receipt_local_fallbacks() {
        let signature = SignatureResult {
            signature: "sig".into(),
            key: "f".repeat(64),
        };
        let body = ApiBody::Raw("ok".into());

        let receipt = build_receipt("addr1x", &signature, &body, "local-time");
        assert_eq!(receipt.preimage, format!("addr1xsig{}", "f".repeat(64)));
        assert_eq!(receipt.timestamp, "local-time");
        assert_eq!(receipt.server_signature, None);
        assert_eq!(receipt.registration_receipt.timestamp, "local-time");
        assert_eq!(receipt.public_key.as_deref(), Some(&*"f".repeat(64)));
    }

    #[test]
    fn test_preview_clamps_to_length() {
        assert_eq!(preview("short", 32), "short");
        assert_eq!(preview(&"a".repeat(40), 32), "a".repeat(32));
    }
}
