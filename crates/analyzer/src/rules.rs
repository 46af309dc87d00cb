//! Boolean gates over asset and offer rule lists.
//!
//! Every gate is a pure lookup over the current snapshot; nothing here
//! enforces a rule. Enforcement lives in the ledger.

use sawbuck_core::{Asset, Capacity, Offer, Rule, RuleKind};

/// Read-only view over one rule list.
#[derive(Debug, Clone, Copy)]
pub struct RuleEvaluator<'a> {
    rules: &'a [Rule],
}

impl<'a> RuleEvaluator<'a> {
    pub fn new(rules: &'a [Rule]) -> Self {
        Self { rules }
    }

    pub fn for_offer(offer: &'a Offer) -> Self {
        Self::new(&offer.rules)
    }

    pub fn for_asset(asset: &'a Asset) -> Self {
        Self::new(&asset.rules)
    }

    /// Exact tag match.
    pub fn has(&self, kind: RuleKind) -> bool {
        self.rules.iter().any(|rule| rule.kind() == Some(kind))
    }

    /// Single-use offers: `EXCHANGE_ONCE` and `EXCHANGE_ONCE_PER_ACCOUNT`
    /// both cap one acceptance at a count of 1. Per-account tracking is the
    /// ledger's job.
    pub fn caps_single_exchange(&self) -> bool {
        self.rules
            .iter()
            .any(|rule| matches!(rule, Rule::ExchangeOnce | Rule::ExchangeOncePerAccount))
    }

    pub fn not_transferable(&self) -> bool {
        self.has(RuleKind::NotTransferable)
    }

    /// Account keys an offer is limited to, if it carries that rule.
    pub fn allowed_accounts(&self) -> Option<&'a [String]> {
        self.rules.iter().find_map(|rule| match rule {
            Rule::ExchangeLimitedToAccounts(keys) => Some(keys.as_slice()),
            _ => None,
        })
    }

    /// Whether `holder`'s holdings of this asset are treated as unbounded.
    ///
    /// `ALL_HOLDINGS_INFINITE` applies to everyone; `OWNER_HOLDINGS_INFINITE`
    /// only to the asset's first owner.
    pub fn holdings_unbounded_for(&self, asset: &Asset, holder: &str) -> bool {
        self.has(RuleKind::AllHoldingsInfinite)
            || (self.has(RuleKind::OwnerHoldingsInfinite) && asset.primary_owner() == Some(holder))
    }
}

/// How much of an offerer's source holding an acceptance may draw.
pub fn source_capacity(asset: &Asset, offerer: &str, available: u64) -> Capacity {
    if RuleEvaluator::for_asset(asset).holdings_unbounded_for(asset, offerer) {
        Capacity::Unbounded
    } else {
        Capacity::Limited(available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sawbuck_core::RuleList;

    fn asset(rules: &[Rule], owners: &[&str]) -> Asset {
        Asset {
            name: "gold".into(),
            description: String::new(),
            owners: owners.iter().map(|o| o.to_string()).collect(),
            rules: rules.iter().cloned().collect::<RuleList>(),
        }
    }

    #[test]
    fn per_account_variant_also_caps() {
        assert!(RuleEvaluator::new(&[Rule::ExchangeOnce]).caps_single_exchange());
        assert!(RuleEvaluator::new(&[Rule::ExchangeOncePerAccount]).caps_single_exchange());
        assert!(!RuleEvaluator::new(&[Rule::NotTransferable]).caps_single_exchange());
        assert!(!RuleEvaluator::new(&[]).caps_single_exchange());
    }

    #[test]
    fn has_is_exact() {
        let rules = [Rule::ExchangeOncePerAccount];
        let eval = RuleEvaluator::new(&rules);
        assert!(eval.has(RuleKind::ExchangeOncePerAccount));
        assert!(!eval.has(RuleKind::ExchangeOnce));
    }

    #[test]
    fn allowed_accounts_exposes_keys() {
        let rules = [
            Rule::ExchangeOnce,
            Rule::ExchangeLimitedToAccounts(vec!["02aa".into()]),
        ];
        assert_eq!(
            RuleEvaluator::new(&rules).allowed_accounts(),
            Some(&["02aa".to_string()][..])
        );
        assert_eq!(RuleEvaluator::new(&rules[..1]).allowed_accounts(), None);
    }

    #[test]
    fn owner_infinite_only_for_primary_owner() {
        let a = asset(&[Rule::OwnerHoldingsInfinite], &["02aa", "03bb"]);
        assert_eq!(source_capacity(&a, "02aa", 5), Capacity::Unbounded);
        assert_eq!(source_capacity(&a, "03bb", 5), Capacity::Limited(5));
    }

    #[test]
    fn all_infinite_for_everyone() {
        let a = asset(&[Rule::AllHoldingsInfinite], &["02aa"]);
        assert_eq!(source_capacity(&a, "04cc", 0), Capacity::Unbounded);
    }

    #[test]
    fn no_rules_means_available_quantity() {
        let a = asset(&[], &["02aa"]);
        assert_eq!(source_capacity(&a, "02aa", 7), Capacity::Limited(7));
        assert!(!RuleEvaluator::for_asset(&a).not_transferable());
    }

    #[test]
    fn unrecognised_rule_matches_no_gate() {
        let other = Rule::Other {
            kind: "REQUIRE_TARGET_QUANTITIES".into(),
            value: Some(serde_json::json!([1, 2])),
        };
        let a = asset(std::slice::from_ref(&other), &["02aa"]);
        let eval = RuleEvaluator::for_asset(&a);
        assert!(RuleKind::ALL.into_iter().all(|kind| !eval.has(kind)));
        assert!(!eval.caps_single_exchange());
        assert_eq!(eval.allowed_accounts(), None);
        assert_eq!(source_capacity(&a, "02aa", 4), Capacity::Limited(4));
    }
}
