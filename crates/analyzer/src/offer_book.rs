//! Offer list with both sides resolved to asset names.

use crate::lookup::HoldingIndex;
use rayon::prelude::*;
use sawbuck_core::{MarketSnapshot, Offer};
use std::collections::HashSet;

/// An offer with its source and target holdings resolved to assets.
/// `target_asset` is `None` for free offers and for holdings that could
/// not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferEntry<'a> {
    pub offer: &'a Offer,
    pub source_asset: Option<&'a str>,
    pub target_asset: Option<&'a str>,
}

#[derive(Debug, Default)]
pub struct OfferBook<'a> {
    entries: Vec<OfferEntry<'a>>,
}

impl<'a> OfferBook<'a> {
    /// Resolves every offer against the holdings of every account in the
    /// snapshot. Entries keep snapshot order.
    pub fn build(snapshot: &'a MarketSnapshot) -> Self {
        let index = HoldingIndex::build(&snapshot.accounts);

        let entries: Vec<OfferEntry<'a>> = snapshot
            .offers
            .par_iter()
            .map(|offer| OfferEntry {
                offer,
                source_asset: index.asset(&offer.source),
                target_asset: offer.target.as_deref().and_then(|t| index.asset(t)),
            })
            .collect();

        let mut unresolved = 0usize;
        for entry in &entries {
            let target_missing = entry.offer.target.is_some() && entry.target_asset.is_none();
            if entry.source_asset.is_none() || target_missing {
                unresolved += 1;
                tracing::warn!(offer = %entry.offer.id, "offer references an unknown holding");
            }
        }

        tracing::info!(
            offers = entries.len(),
            holdings = index.len(),
            unresolved,
            "built offer book"
        );

        Self { entries }
    }

    pub fn entries(&self) -> &[OfferEntry<'a>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries matching both filters; `None` matches anything.
    pub fn filter(&self, source: Option<&str>, target: Option<&str>) -> Vec<OfferEntry<'a>> {
        self.entries
            .iter()
            .filter(|e| source.map_or(true, |s| e.source_asset == Some(s)))
            .filter(|e| target.map_or(true, |t| e.target_asset == Some(t)))
            .copied()
            .collect()
    }

    /// Distinct source assets, in first-seen order.
    pub fn source_assets(&self) -> Vec<&'a str> {
        unique(self.entries.iter().filter_map(|e| e.source_asset))
    }

    /// Distinct target assets, in first-seen order. Free offers add none.
    pub fn target_assets(&self) -> Vec<&'a str> {
        unique(self.entries.iter().filter_map(|e| e.target_asset))
    }
}

fn unique<'a>(names: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    names.filter(|name| seen.insert(*name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> MarketSnapshot {
        serde_json::from_value(serde_json::json!({
            "accounts": [
                {"publicKey": "02aa", "holdings": [
                    {"id": "a-gold", "asset": "gold", "quantity": 5},
                    {"id": "a-usd", "asset": "usd", "quantity": 0}
                ]},
                {"publicKey": "03bb", "holdings": [
                    {"id": "b-silver", "asset": "silver", "quantity": 9},
                    {"id": "b-usd", "asset": "usd", "quantity": 0}
                ]}
            ],
            "offers": [
                {"id": "o1", "source": "a-gold", "sourceQuantity": 1,
                 "target": "a-usd", "targetQuantity": 3, "owners": ["02aa"]},
                {"id": "o2", "source": "b-silver", "sourceQuantity": 2,
                 "target": "b-usd", "targetQuantity": 1, "owners": ["03bb"]},
                {"id": "o3", "source": "a-gold", "sourceQuantity": 1, "owners": ["02aa"]},
                {"id": "o4", "source": "gone", "sourceQuantity": 1, "owners": ["02aa"]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn resolves_both_sides() {
        let snapshot = snapshot();
        let book = OfferBook::build(&snapshot);
        assert_eq!(book.len(), 4);
        let first = book.entries()[0];
        assert_eq!(first.offer.id, "o1");
        assert_eq!(first.source_asset, Some("gold"));
        assert_eq!(first.target_asset, Some("usd"));
        assert_eq!(book.entries()[2].target_asset, None);
        assert_eq!(book.entries()[3].source_asset, None);
    }

    #[test]
    fn filters_by_either_side() {
        let snapshot = snapshot();
        let book = OfferBook::build(&snapshot);
        let ids = |entries: Vec<OfferEntry>| {
            entries
                .iter()
                .map(|e| e.offer.id.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(book.filter(Some("gold"), None)), ["o1", "o3"]);
        assert_eq!(ids(book.filter(None, Some("usd"))), ["o1", "o2"]);
        assert_eq!(ids(book.filter(Some("gold"), Some("usd"))), ["o1"]);
        assert_eq!(book.filter(None, None).len(), 4);
    }

    #[test]
    fn unique_assets_keep_first_seen_order() {
        let snapshot = snapshot();
        let book = OfferBook::build(&snapshot);
        assert_eq!(book.source_assets(), ["gold", "silver"]);
        assert_eq!(book.target_assets(), ["usd"]);
    }
}
