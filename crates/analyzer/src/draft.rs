//! Offer drafting: holding choices, rule selection and validation for a new
//! offer, and its submission.

use sawbuck_core::error::{MarketError, MarketResult};
use sawbuck_core::rules::split_keys;
use sawbuck_core::{Account, Holding, NewHolding, NewOffer, Offer, Rule, RuleKind, RuleList};
use sawbuck_provider::MarketplaceApi;
use std::collections::BTreeMap;

/// Holdings offered as source or target choices. With an asset, only its
/// holdings in account order; without, all holdings sorted by asset and
/// then label, unlabelled last.
pub fn candidate_holdings<'a>(account: &'a Account, asset: Option<&str>) -> Vec<&'a Holding> {
    match asset {
        Some(asset) => account.holdings.iter().filter(|h| h.asset == asset).collect(),
        None => {
            let mut holdings: Vec<&Holding> = account.holdings.iter().collect();
            holdings.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
            holdings
        }
    }
}

fn sort_key(holding: &Holding) -> (&str, bool, Option<&str>) {
    (
        holding.asset.as_str(),
        holding.label.is_none(),
        holding.label.as_deref(),
    )
}

// ---------------------------------------------------------------------------
// Rule selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct RuleToggle {
    selected: bool,
    keys: Option<String>,
}

/// Checkbox-style rule picker. Keys typed for a rule survive toggling it
/// off and on again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSelection {
    toggles: BTreeMap<RuleKind, RuleToggle>,
}

impl RuleSelection {
    /// Flips `kind` and returns whether it is now selected.
    pub fn toggle(&mut self, kind: RuleKind) -> bool {
        let toggle = self.toggles.entry(kind).or_default();
        toggle.selected = !toggle.selected;
        toggle.selected
    }

    pub fn select(&mut self, kind: RuleKind) {
        self.toggles.entry(kind).or_default().selected = true;
    }

    /// Comma-separated account keys for `EXCHANGE_LIMITED_TO_ACCOUNTS`.
    /// Other kinds carry no payload and ignore them.
    pub fn set_keys(&mut self, kind: RuleKind, keys: impl Into<String>) {
        self.toggles.entry(kind).or_default().keys = Some(keys.into());
    }

    pub fn is_selected(&self, kind: RuleKind) -> bool {
        self.toggles.get(&kind).is_some_and(|t| t.selected)
    }

    /// Selected rules in tag order.
    pub fn rules(&self) -> RuleList {
        self.toggles
            .iter()
            .filter(|(_, toggle)| toggle.selected)
            .map(|(kind, toggle)| match (kind, &toggle.keys) {
                (RuleKind::ExchangeLimitedToAccounts, Some(keys)) => {
                    Rule::ExchangeLimitedToAccounts(split_keys(keys))
                }
                (kind, _) => Rule::from_kind(*kind),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

/// What the offer asks for in return.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TargetChoice {
    #[default]
    Unset,
    Existing(String),
    /// Nothing: a free offer.
    Free,
    /// Payment lands in a holding created right before the offer.
    NewHolding(NewHolding),
}

/// Form state of a new offer. Zero quantities count as missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferDraft {
    pub label: Option<String>,
    pub description: Option<String>,
    pub source: Option<String>,
    pub source_quantity: u64,
    pub target: TargetChoice,
    pub target_quantity: u64,
    pub rules: RuleSelection,
}

impl OfferDraft {
    pub fn new(source: impl Into<String>, source_quantity: u64) -> Self {
        Self {
            source: Some(source.into()),
            source_quantity,
            ..Default::default()
        }
    }

    pub fn with_target(mut self, target: TargetChoice, target_quantity: u64) -> Self {
        self.target = target;
        self.target_quantity = target_quantity;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Source and source quantity are always required. Free offers need
    /// nothing else; others need a target quantity and either an existing
    /// target holding or an asset for the new one.
    pub fn validate(&self) -> MarketResult<()> {
        if self.source.as_deref().map_or(true, str::is_empty) {
            return Err(MarketError::invalid("an offer needs a source holding"));
        }
        if self.source_quantity == 0 {
            return Err(MarketError::invalid("an offer needs a source quantity"));
        }
        if self.target == TargetChoice::Free {
            return Ok(());
        }
        if self.target_quantity == 0 {
            return Err(MarketError::invalid(
                "an offer that asks for payment needs a target quantity",
            ));
        }
        match &self.target {
            TargetChoice::NewHolding(holding) if holding.asset.is_empty() => Err(
                MarketError::invalid("pick an asset for the new target holding"),
            ),
            TargetChoice::Existing(id) if id.is_empty() => {
                Err(MarketError::invalid("an offer needs a target holding"))
            }
            TargetChoice::Unset => Err(MarketError::invalid("an offer needs a target holding")),
            _ => Ok(()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Request body, with `created` standing in for a new target holding.
    pub fn to_request(&self, created: Option<&str>) -> MarketResult<NewOffer> {
        self.validate()?;
        let (target, target_quantity) = match (&self.target, created) {
            (TargetChoice::Free, _) => (None, None),
            (_, Some(id)) => (Some(id.to_string()), Some(self.target_quantity)),
            (TargetChoice::Existing(id), None) => (Some(id.clone()), Some(self.target_quantity)),
            (TargetChoice::NewHolding(_), None) | (TargetChoice::Unset, None) => {
                return Err(MarketError::invalid(
                    "the target holding has not been created yet",
                ))
            }
        };
        Ok(NewOffer {
            label: self.label.clone(),
            description: self.description.clone(),
            source: self.source.clone().unwrap_or_default(),
            source_quantity: self.source_quantity,
            target,
            target_quantity,
            rules: self.rules.rules(),
        })
    }

    /// Creates the target holding if needed, then the offer.
    /// Nothing already created is rolled back on failure.
    pub async fn submit(&self, api: &dyn MarketplaceApi) -> MarketResult<Offer> {
        self.validate()?;
        let created = match &self.target {
            TargetChoice::NewHolding(holding) => Some(api.create_holding(holding).await?.id),
            _ => None,
        };
        let request = self.to_request(created.as_deref())?;
        let offer = api.create_offer(&request).await?;
        tracing::info!(
            offer = %offer.id,
            source = %request.source,
            rules = request.rules.len(),
            "offer created"
        );
        Ok(offer)
    }
}
