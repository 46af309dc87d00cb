//! Whether the signed-in user may act on an offer or asset.
//!
//! Gates only decide what the client offers to do; the ledger re-checks
//! everything on submission.

use crate::rules::RuleEvaluator;
use sawbuck_core::{Account, Asset, Offer};
use std::collections::HashMap;
use std::fmt;

/// Why an action is unavailable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Blocked {
    SignedOut,
    Closed,
    NoHolding { asset: String },
    /// The offer asks for payment into a holding no known account has.
    UnresolvedTarget { holding: String },
    Insufficient { asset: String, have: u64, need: u64 },
    NotTransferable { asset: String },
}

impl fmt::Display for Blocked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Blocked::SignedOut => f.write_str("sign in first"),
            Blocked::Closed => f.write_str("offer is closed"),
            Blocked::NoHolding { asset } => write!(f, "you hold no {asset}"),
            Blocked::UnresolvedTarget { holding } => {
                write!(f, "target holding {holding:?} not found")
            }
            Blocked::Insufficient { asset, have, need } => {
                write!(f, "needs {need} {asset}, you hold at most {have}")
            }
            Blocked::NotTransferable { asset } => {
                write!(f, "{asset} is not transferable by non-owners")
            }
        }
    }
}

pub type Gate = Result<(), Blocked>;

/// Largest single-holding quantity per asset. Acceptance pays from one
/// holding, so quantities are not summed.
pub fn asset_quantities(account: &Account) -> HashMap<&str, u64> {
    let mut quantities: HashMap<&str, u64> = HashMap::new();
    for holding in &account.holdings {
        let entry = quantities.entry(holding.asset.as_str()).or_default();
        *entry = (*entry).max(holding.quantity);
    }
    quantities
}

/// Accepting needs a session and, unless the offer asks for nothing, one
/// holding of the target asset covering a single exchange.
pub fn accept_gate(offer: &Offer, target_asset: Option<&str>, user: Option<&Account>) -> Gate {
    let user = user.ok_or(Blocked::SignedOut)?;
    if !offer.is_open() {
        return Err(Blocked::Closed);
    }
    if offer.target_quantity == 0 {
        return Ok(());
    }
    let Some(asset) = target_asset.map(str::to_string) else {
        return Err(Blocked::UnresolvedTarget {
            holding: offer.target.clone().unwrap_or_default(),
        });
    };
    let have = asset_quantities(user)
        .get(asset.as_str())
        .copied()
        .unwrap_or(0);
    if have == 0 {
        return Err(Blocked::NoHolding { asset });
    }
    if have < offer.target_quantity {
        return Err(Blocked::Insufficient {
            asset,
            have,
            need: offer.target_quantity,
        });
    }
    Ok(())
}

/// Offering an asset needs a non-empty holding of it, and owner status
/// when the asset is `NOT_TRANSFERABLE`.
pub fn offer_gate(asset: &Asset, user: Option<&Account>) -> Gate {
    let user = user.ok_or(Blocked::SignedOut)?;
    let have = asset_quantities(user)
        .get(asset.name.as_str())
        .copied()
        .unwrap_or(0);
    if have == 0 {
        return Err(Blocked::NoHolding {
            asset: asset.name.clone(),
        });
    }
    let restricted = RuleEvaluator::for_asset(asset).not_transferable();
    if restricted && !asset.is_owned_by(&user.public_key) {
        return Err(Blocked::NotTransferable {
            asset: asset.name.clone(),
        });
    }
    Ok(())
}

/// Requesting an asset only needs a session.
pub fn request_gate(user: Option<&Account>) -> Gate {
    user.map(|_| ()).ok_or(Blocked::SignedOut)
}
