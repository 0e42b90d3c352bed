//! Donation orchestrator
//!
//! Transfers accumulated Scavenger rights from a range of registered
//! donor wallets to a recipient: by default the lowest wallet in the
//! range, or an explicitly supplied external address. Every donor gets an
//! audit record; a donor's failure never aborts its siblings.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::api::{ApiBody, MiningApi};
use crate::config::{Pacing, WalletPaths};
use crate::error::{Error, Result};
use crate::register::{preview, BatchSummary};
use crate::signing::SigningAdapter;
use crate::wallets::types::{DonationOutcome, DonationRecord, IdRange, WalletRecord};
use crate::wallets::store;

/// Message a donor signs to hand its rights to the recipient
pub fn donation_message(recipient_address: &str) -> String {
    format!(
        "Assign accumulated Scavenger rights to: {}",
        recipient_address
    )
}

/// Who receives a donation pass
enum Recipient {
    /// Lowest wallet in the selected range, excluded from the donor set
    Wallet { id: u32, address: String },
    /// Explicit external address; every selected wallet donates
    External { address: String },
}

impl Recipient {
    fn address(&self) -> &str {
        match self {
            Recipient::Wallet { address, .. } => address,
            Recipient::External { address } => address,
        }
    }

    fn id(&self) -> Option<u32> {
        match self {
            Recipient::Wallet { id, .. } => Some(*id),
            Recipient::External { .. } => None,
        }
    }

    fn label(&self) -> String {
        match self {
            Recipient::Wallet { id, address } => format!(
                "{} ({}...)",
                store::format_wallet_id(*id),
                preview(address, 32)
            ),
            Recipient::External { address } => {
                format!("external address ({}...)", preview(address, 48))
            }
        }
    }
}

/// Drives donation passes over the registered lifecycle root
pub struct Consolidator {
    paths: WalletPaths,
    api: Arc<dyn MiningApi>,
    signer: SigningAdapter,
    pacing: Pacing,
}

impl Consolidator {
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

    /// Donate from every registered wallet in `range`.
    ///
    /// With an explicit `recipient_address` at least one wallet must match
    /// the range; otherwise the lowest matched wallet receives and at
    /// least two must match. An unresolvable recipient address aborts the
    /// whole pass, since there is no valid target.
    pub async fn run(
        &self,
        range: IdRange,
        recipient_address: Option<&str>,
    ) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();

        let ids = store::list_ids(&self.paths.registered)?;
        if ids.is_empty() {
            info!("No registered wallets found. Run `defensio register` first.");
            return Ok(summary);
        }

        let selected: Vec<u32> = ids.into_iter().filter(|id| range.contains(*id)).collect();
        let manual = recipient_address
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);

        if manual.is_some() {
            if selected.is_empty() {
                info!("No wallets matched the requested range to donate from.");
                return Ok(summary);
            }
        } else if selected.len() < 2 {
            info!("Need at least two wallets in the specified range to perform donations.");
            return Ok(summary);
        }

        let range_start = selected[0];
        let range_end = selected[selected.len() - 1];

        let (recipient, donors) = match manual {
            Some(address) => (Recipient::External { address }, selected),
            None => {
                let id = range_start;
                let Some(address) = self.resolve_wallet_address(id)? else {
                    warn!(
                        "Recipient wallet {} missing address; aborting donations.",
                        store::format_wallet_id(id)
                    );
                    return Ok(summary);
                };
                (Recipient::Wallet { id, address }, selected[1..].to_vec())
            }
        };

        info!(
            "Donating from {} wallet(s) in range {}-{} to {}",
            donors.len(),
            store::format_wallet_id(range_start),
            store::format_wallet_id(range_end),
            recipient.label()
        );

        let mut paced = false;
        for donor_id in donors {
            let donor_label = store::format_wallet_id(donor_id);

            let wallet = match store::load_wallet(&self.paths.registered, donor_id) {
                Ok(Some(wallet)) => wallet,
                Ok(None) => {
                    warn!("Wallet {} missing wallet.json; skipping.", donor_label);
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => {
                    error!("Donor {} failed: {}", donor_label, e);
                    summary.failed += 1;
                    continue;
                }
            };
            let Some(donor_address) = wallet.primary_address().map(str::to_string) else {
                warn!("Wallet {} missing address; skipping.", donor_label);
                summary.skipped += 1;
                continue;
            };

            if paced {
                self.pacing.pause().await;
            }
            paced = true;
            summary.attempted += 1;

            match self
                .donate_once(&wallet, &donor_address, recipient.address())
                .await
            {
                Ok((outcome, response)) => {
                    let record = DonationRecord {
                        executed_at: Utc::now().to_rfc3339(),
                        from: store::format_wallet_id(range_start),
                        to: store::format_wallet_id(range_end),
                        donor_id,
                        donor_address,
                        recipient_id: recipient.id(),
                        recipient_address: recipient.address().to_string(),
                        outcome,
                        response,
                    };
                    let record_path = self
                        .paths
                        .donors
                        .join(format!("{}.json", store::format_wallet_id(donor_id)));
                    match store::write_json_pretty(&record_path, &record) {
                        Ok(()) => {
                            info!(
                                "Donor {} -> {}",
                                donor_label,
                                outcome.to_string().to_uppercase()
                            );
                            summary.succeeded += 1;
                        }
                        Err(e) => {
                            error!("Donor {} failed: {}", donor_label, e);
                            summary.failed += 1;
                        }
                    }
                }
                Err(e) => {
                    error!("Donor {} failed: {}", donor_label, e);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Primary address of a registered wallet; `None` when the wallet file
    /// or the address is missing
    fn resolve_wallet_address(&self, id: u32) -> Result<Option<String>> {
        let Some(wallet) = store::load_wallet(&self.paths.registered, id)? else {
            return Ok(None);
        };
        Ok(wallet.primary_address().map(str::to_string))
    }

    /// Sign and send one donation; classify the response.
    ///
    /// HTTP 409 is a terminal non-error outcome: the donor's rights were
    /// already consolidated. Anything that is not a 2xx with a JSON
    /// `status: "success"` body fails the donor.
    async fn donate_once(
        &self,
        wallet: &WalletRecord,
        donor_address: &str,
        recipient_address: &str,
    ) -> Result<(DonationOutcome, ApiBody)> {
        let message = donation_message(recipient_address);
        let signature = self.signer.sign(wallet, &message)?;

        let response = self
            .api
            .donate(recipient_address, donor_address, &signature.signature)
            .await?;

        if response.status == 409 {
            return Ok((DonationOutcome::AlreadyConsolidated, response.body));
        }
        if !response.is_success() || response.body.status_field() != Some("success") {
            return Err(Error::RemoteRequest {
                status: response.status,
                body: response.body.render(),
            });
        }
        Ok((DonationOutcome::Success, response.body))
    }
}
