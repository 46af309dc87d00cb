//! Domain types for the Sawbuck marketplace client.
//!
//! Every record here is a client-side copy of server state. Field names are
//! camelCase on the wire.

use crate::error::{MarketError, MarketResult};
use crate::rules::RuleList;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Accounts & holdings
// ---------------------------------------------------------------------------

/// A quantity of a named asset owned by one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub id: String,
    pub asset: String,
    #[serde(default)]
    pub quantity: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Holding {
    /// Label if set, id otherwise.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub holdings: Vec<Holding>,
}

impl Account {
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.public_key)
    }

    pub fn holding(&self, id: &str) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.id == id)
    }

    /// Holdings of one asset, in account order.
    pub fn holdings_of<'a>(&'a self, asset: &'a str) -> impl Iterator<Item = &'a Holding> + 'a {
        self.holdings.iter().filter(move |h| h.asset == asset)
    }
}

/// Account public keys are hex-encoded secp256k1 keys, compressed (33 bytes)
/// or uncompressed (65 bytes).
pub fn validate_public_key(key: &str) -> MarketResult<()> {
    let bytes = hex::decode(key)
        .map_err(|e| MarketError::invalid(format!("public key {key:?} is not hex: {e}")))?;
    match bytes.len() {
        33 | 65 => Ok(()),
        n => Err(MarketError::invalid(format!(
            "public key must be 33 or 65 bytes, got {n}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Account public keys. The first entry is the administering owner.
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default)]
    pub rules: RuleList,
}

impl Asset {
    pub fn primary_owner(&self) -> Option<&str> {
        self.owners.first().map(String::as_str)
    }

    pub fn is_owned_by(&self, public_key: &str) -> bool {
        self.owners.iter().any(|owner| owner == public_key)
    }
}

// ---------------------------------------------------------------------------
// Offers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
    Open,
    Closed,
}

/// A standing proposal: give `source_quantity` of the source holding's asset
/// for `target_quantity` of the target holding's asset, or for nothing when
/// `target` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub source: String,
    pub source_quantity: u64,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub target_quantity: u64,
    #[serde(default)]
    pub rules: RuleList,
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OfferStatus>,
}

impl Offer {
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    /// Free offers ask for nothing in return.
    pub fn is_free(&self) -> bool {
        self.target.is_none()
    }

    pub fn primary_owner(&self) -> MarketResult<&str> {
        self.owners
            .first()
            .map(String::as_str)
            .ok_or_else(|| MarketError::invalid(format!("offer {} has no owner", self.id)))
    }

    pub fn is_open(&self) -> bool {
        self.status != Some(OfferStatus::Closed)
    }
}

// ---------------------------------------------------------------------------
// Capacity
// ---------------------------------------------------------------------------

/// How much of a holding may be drawn. `Unbounded` stands for the
/// infinite-holdings rules and for the empty side of a free offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capacity {
    Limited(u64),
    Unbounded,
}

impl Capacity {
    #[inline]
    pub fn admits(self, quantity: u64) -> bool {
        match self {
            Capacity::Limited(max) => quantity <= max,
            Capacity::Unbounded => true,
        }
    }

    pub fn limit(self) -> Option<u64> {
        match self {
            Capacity::Limited(max) => Some(max),
            Capacity::Unbounded => None,
        }
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capacity::Limited(max) => write!(f, "{max}"),
            Capacity::Unbounded => f.write_str("unbounded"),
        }
    }
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Body of `PATCH offers/{id}/accept`. `target` receives the offered asset,
/// `source` pays for it (absent for free offers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptOfferRequest {
    pub count: u64,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHolding {
    pub asset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOffer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub source: String,
    pub source_quantity: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_quantity: Option<u64>,
    #[serde(default)]
    pub rules: RuleList,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAsset {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub rules: RuleList,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Body of `PATCH accounts`. Only set fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AccountUpdate {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.password.is_none()
            && self.label.is_none()
            && self.description.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Returned by account creation and login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub authorization: String,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Everything the list views need, fetched in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub offers: Vec<Offer>,
}

impl MarketSnapshot {
    pub fn account(&self, public_key: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.public_key == public_key)
    }

    pub fn asset(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.name == name)
    }

    pub fn offer(&self, id: &str) -> Option<&Offer> {
        self.offers.iter().find(|o| o.id == id)
    }
}
