//! Row exports for marketplace state.
//!
//! Two row schemas:
//! - [`OfferRow`]: one per offer, both sides resolved to assets
//! - [`HoldingRow`]: one per holding, denormalized with its account
//!
//! Rows are written as NDJSON through [`json_stream::JsonStreamSink`].

pub mod json_stream;

use crate::offer_book::OfferEntry;
use sawbuck_core::Account;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Serializable row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct OfferRow {
    pub offer_id: String,
    pub label: Option<String>,
    pub owner: Option<String>,
    pub source: String,
    pub source_asset: Option<String>,
    pub source_quantity: u64,
    /// `None` for free offers.
    pub target: Option<String>,
    pub target_asset: Option<String>,
    pub target_quantity: u64,
    pub open: bool,
    /// Rule tags, e.g. `EXCHANGE_ONCE`.
    pub rules: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HoldingRow {
    pub account: String,
    pub account_label: Option<String>,
    pub holding_id: String,
    pub asset: String,
    pub quantity: u64,
    pub label: Option<String>,
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

impl From<&OfferEntry<'_>> for OfferRow {
    fn from(entry: &OfferEntry<'_>) -> Self {
        let offer = entry.offer;
        OfferRow {
            offer_id: offer.id.clone(),
            label: offer.label.clone(),
            owner: offer.owners.first().cloned(),
            source: offer.source.clone(),
            source_asset: entry.source_asset.map(str::to_string),
            source_quantity: offer.source_quantity,
            target: offer.target.clone(),
            target_asset: entry.target_asset.map(str::to_string),
            target_quantity: offer.target_quantity,
            open: offer.is_open(),
            rules: offer
                .rules
                .iter()
                .map(|r| r.tag().to_string())
                .collect(),
        }
    }
}

/// Flattens every holding of every account.
pub fn holding_rows(accounts: &[Account]) -> Vec<HoldingRow> {
    accounts
        .iter()
        .flat_map(|account| {
            account.holdings.iter().map(move |h| HoldingRow {
                account: account.public_key.clone(),
                account_label: account.label.clone(),
                holding_id: h.id.clone(),
                asset: h.asset.clone(),
                quantity: h.quantity,
                label: h.label.clone(),
            })
        })
        .collect()
}
