//! Exchange rules attached to assets and offers.
//!
//! On the wire a rule is `{"type": "<TAG>", "value": <payload>?}`. Decoding
//! goes through [`RuleRecord`]. Tags outside [`RuleKind`] are kept verbatim
//! as [`Rule::Other`] so one unfamiliar rule never fails a whole listing.

use crate::error::MarketError;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

/// Rule lists are short; four inline slots cover every asset and offer
/// the marketplace seeds.
pub type RuleList = SmallVec<[Rule; 4]>;

/// Payload-free discriminant of a [`Rule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleKind {
    ExchangeOnce,
    ExchangeOncePerAccount,
    ExchangeLimitedToAccounts,
    NotTransferable,
    AllHoldingsInfinite,
    OwnerHoldingsInfinite,
}

impl RuleKind {
    pub const ALL: [RuleKind; 6] = [
        RuleKind::ExchangeOnce,
        RuleKind::ExchangeOncePerAccount,
        RuleKind::ExchangeLimitedToAccounts,
        RuleKind::NotTransferable,
        RuleKind::AllHoldingsInfinite,
        RuleKind::OwnerHoldingsInfinite,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            RuleKind::ExchangeOnce => "EXCHANGE_ONCE",
            RuleKind::ExchangeOncePerAccount => "EXCHANGE_ONCE_PER_ACCOUNT",
            RuleKind::ExchangeLimitedToAccounts => "EXCHANGE_LIMITED_TO_ACCOUNTS",
            RuleKind::NotTransferable => "NOT_TRANSFERABLE",
            RuleKind::AllHoldingsInfinite => "ALL_HOLDINGS_INFINITE",
            RuleKind::OwnerHoldingsInfinite => "OWNER_HOLDINGS_INFINITE",
        }
    }

    /// Human-readable description used by reports.
    pub const fn describe(self) -> &'static str {
        match self {
            RuleKind::ExchangeOnce => "Exchange only once",
            RuleKind::ExchangeOncePerAccount => "Exchange once per account",
            RuleKind::ExchangeLimitedToAccounts => "Exchange limited to accounts",
            RuleKind::NotTransferable => "Not transferable",
            RuleKind::AllHoldingsInfinite => "All holdings infinite",
            RuleKind::OwnerHoldingsInfinite => "Owner holdings infinite",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleKind {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RuleKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| MarketError::Decode(format!("unknown rule type {s:?}")))
    }
}

/// A policy constraint on how an asset or offer may be exchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RuleRecord", into = "RuleRecord")]
pub enum Rule {
    ExchangeOnce,
    ExchangeOncePerAccount,
    /// Allowed account public keys. Enforced by the ledger, display-only here.
    ExchangeLimitedToAccounts(Vec<String>),
    NotTransferable,
    AllHoldingsInfinite,
    OwnerHoldingsInfinite,
    /// A tag this client does not interpret. Displayed and re-encoded as
    /// received; no gate ever matches it.
    Other {
        kind: String,
        value: Option<serde_json::Value>,
    },
}

impl Rule {
    /// `None` for [`Rule::Other`].
    pub fn kind(&self) -> Option<RuleKind> {
        let kind = match self {
            Rule::ExchangeOnce => RuleKind::ExchangeOnce,
            Rule::ExchangeOncePerAccount => RuleKind::ExchangeOncePerAccount,
            Rule::ExchangeLimitedToAccounts(_) => RuleKind::ExchangeLimitedToAccounts,
            Rule::NotTransferable => RuleKind::NotTransferable,
            Rule::AllHoldingsInfinite => RuleKind::AllHoldingsInfinite,
            Rule::OwnerHoldingsInfinite => RuleKind::OwnerHoldingsInfinite,
            Rule::Other { .. } => return None,
        };
        Some(kind)
    }

    /// Wire tag, known or not.
    pub fn tag(&self) -> &str {
        match self {
            Rule::Other { kind, .. } => kind.as_str(),
            known => known.kind().map_or("", RuleKind::as_str),
        }
    }

    /// Builds a payload-free rule. `ExchangeLimitedToAccounts` gets an
    /// empty key list.
    pub fn from_kind(kind: RuleKind) -> Self {
        match kind {
            RuleKind::ExchangeOnce => Rule::ExchangeOnce,
            RuleKind::ExchangeOncePerAccount => Rule::ExchangeOncePerAccount,
            RuleKind::ExchangeLimitedToAccounts => Rule::ExchangeLimitedToAccounts(Vec::new()),
            RuleKind::NotTransferable => Rule::NotTransferable,
            RuleKind::AllHoldingsInfinite => Rule::AllHoldingsInfinite,
            RuleKind::OwnerHoldingsInfinite => Rule::OwnerHoldingsInfinite,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self, self.kind()) {
            (Rule::ExchangeLimitedToAccounts(keys), Some(kind)) if !keys.is_empty() => {
                write!(f, "{}: {}", kind.describe(), keys.join(", "))
            }
            (_, Some(kind)) => f.write_str(kind.describe()),
            (Rule::Other { kind, value: Some(value) }, None) => write!(f, "{kind}: {value}"),
            (_, None) => f.write_str(self.tag()),
        }
    }
}

/// Wire shape of a rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl TryFrom<RuleRecord> for Rule {
    type Error = MarketError;

    fn try_from(record: RuleRecord) -> Result<Self, Self::Error> {
        let Ok(kind) = record.kind.parse::<RuleKind>() else {
            return Ok(Rule::Other {
                kind: record.kind,
                value: record.value,
            });
        };
        if kind != RuleKind::ExchangeLimitedToAccounts {
            return Ok(Rule::from_kind(kind));
        }

        let keys = match record.value {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(serde_json::Value::String(joined)) => split_keys(&joined),
            Some(serde_json::Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    serde_json::Value::String(key) => Ok(key),
                    other => Err(MarketError::Decode(format!(
                        "account key must be a string, got {other}"
                    ))),
                })
                .collect::<Result<_, _>>()?,
            Some(other) => {
                return Err(MarketError::Decode(format!(
                    "{kind} value must be a list of account keys, got {other}"
                )))
            }
        };
        Ok(Rule::ExchangeLimitedToAccounts(keys))
    }
}

impl From<Rule> for RuleRecord {
    fn from(rule: Rule) -> Self {
        let kind = rule.tag().to_string();
        match rule {
            Rule::ExchangeLimitedToAccounts(keys) => RuleRecord {
                kind,
                value: Some(serde_json::Value::Array(
                    keys.into_iter().map(serde_json::Value::String).collect(),
                )),
            },
            Rule::Other { kind, value } => RuleRecord { kind, value },
            _ => RuleRecord { kind, value: None },
        }
    }
}

/// Splits a comma-separated key list, trimming blanks.
pub fn split_keys(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}
