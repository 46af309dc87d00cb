//! Holding → asset resolution.

use sawbuck_core::error::{MarketError, MarketResult};
use sawbuck_core::{Account, Holding};
use std::collections::HashMap;

/// Asset name of the holding with `holding_id`.
///
/// Callers derive the id from the same holdings list, so a miss is a
/// precondition violation rather than an empty result.
pub fn asset_of<'a>(holding_id: &str, holdings: &'a [Holding]) -> MarketResult<&'a str> {
    holdings
        .iter()
        .find(|h| h.id == holding_id)
        .map(|h| h.asset.as_str())
        .ok_or_else(|| MarketError::not_found(format!("holding {holding_id}")))
}

/// Holding id → asset name across many accounts.
///
/// Offers reference holdings by id only; the offer list resolves both sides
/// through one of these.
#[derive(Debug, Default)]
pub struct HoldingIndex<'a> {
    assets: HashMap<&'a str, &'a str>,
}

impl<'a> HoldingIndex<'a> {
    pub fn build(accounts: &'a [Account]) -> Self {
        let assets = accounts
            .iter()
            .flat_map(|a| a.holdings.iter())
            .map(|h| (h.id.as_str(), h.asset.as_str()))
            .collect();
        Self { assets }
    }

    pub fn asset(&self, holding_id: &str) -> Option<&'a str> {
        self.assets.get(holding_id).copied()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding(id: &str, asset: &str) -> Holding {
        Holding {
            id: id.into(),
            asset: asset.into(),
            quantity: 1,
            label: None,
            description: None,
        }
    }

    #[test]
    fn finds_asset_name() {
        let holdings = vec![holding("h1", "gold"), holding("h2", "silver")];
        assert_eq!(asset_of("h2", &holdings).unwrap(), "silver");
    }

    #[test]
    fn missing_holding_is_not_found() {
        let holdings = vec![holding("h1", "gold")];
        assert!(matches!(
            asset_of("h9", &holdings),
            Err(MarketError::NotFound(_))
        ));
    }

    #[test]
    fn index_spans_accounts() {
        let accounts = vec![
            Account {
                public_key: "02aa".into(),
                label: None,
                description: None,
                email: None,
                holdings: vec![holding("h1", "gold")],
            },
            Account {
                public_key: "03bb".into(),
                label: None,
                description: None,
                email: None,
                holdings: vec![holding("h2", "silver")],
            },
        ];
        let index = HoldingIndex::build(&accounts);
        assert_eq!(index.len(), 2);
        assert_eq!(index.asset("h2"), Some("silver"));
        assert_eq!(index.asset("h3"), None);
    }
}
