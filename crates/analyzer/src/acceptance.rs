//! Acceptance planning: everything needed to turn an offer into an
//! `accept` request.
//!
//! A plan pairs the acceptor's holdings with the offer's two sides, keeps
//! the negotiated count current as selections change, and submits the
//! result (creating a fresh receiving holding first when asked to).

use crate::lookup::asset_of;
use crate::negotiator::{Negotiation, QuantityNegotiator};
use crate::rules::{source_capacity, RuleEvaluator};
use sawbuck_core::error::{MarketError, MarketResult};
use sawbuck_core::{AcceptOfferRequest, Account, Asset, Capacity, Holding, NewHolding, Offer};
use sawbuck_provider::{AccountFetcher, MarketplaceApi};
use std::sync::Arc;

/// Where the offered asset lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receiver {
    Existing(String),
    /// Created right before the acceptance is submitted.
    NewHolding(NewHolding),
}

#[derive(Debug, Clone)]
pub struct AcceptancePlan {
    offer: Offer,
    in_asset: String,
    out_asset: Option<String>,
    in_options: Vec<Holding>,
    out_options: Vec<Holding>,
    receiver: Receiver,
    payer: Option<String>,
    negotiator: QuantityNegotiator,
    incoming_quantity: u64,
    negotiation: Negotiation,
}

impl AcceptancePlan {
    /// Builds a plan from already-fetched records.
    ///
    /// `owner` is the offer's first owner and `in_asset` the asset of the
    /// offer's source holding. The first matching holding is preselected on
    /// each side, falling back to a new receiving holding, and the count
    /// starts at the minimum exchange.
    pub fn prepare(
        offer: Offer,
        user: &Account,
        owner: &Account,
        in_asset: &Asset,
    ) -> MarketResult<Self> {
        let source_asset = asset_of(&offer.source, &owner.holdings)?;
        if source_asset != in_asset.name {
            return Err(MarketError::invalid(format!(
                "offer {} gives {source_asset}, not {}",
                offer.id, in_asset.name
            )));
        }

        let in_options: Vec<Holding> = user.holdings_of(&in_asset.name).cloned().collect();
        let receiver = match in_options.first() {
            Some(h) => Receiver::Existing(h.id.clone()),
            None => Receiver::NewHolding(new_receiving_holding(&in_asset.name)),
        };

        let (out_asset, out_options) = match &offer.target {
            Some(target) => {
                let asset = asset_of(target, &owner.holdings)?.to_string();
                let options: Vec<Holding> = user.holdings_of(&asset).cloned().collect();
                (Some(asset), options)
            }
            None => (None, Vec::new()),
        };
        let payer = out_options.first().map(|h| h.id.clone());
        let out_max = out_options
            .first()
            .map_or(Capacity::Limited(0), |h| Capacity::Limited(h.quantity));

        let available = owner
            .holding(&offer.source)
            .map(|h| h.quantity)
            .unwrap_or_default();
        let in_max = source_capacity(in_asset, &owner.public_key, available);

        let negotiator = QuantityNegotiator::for_offer(&offer, in_max, out_max)?;
        let negotiation = negotiator.negotiate(1)?;

        tracing::info!(
            offer = %offer.id,
            in_asset = %in_asset.name,
            out_asset = out_asset.as_deref().unwrap_or("free"),
            %in_max,
            out_max = %negotiator.out_max(),
            "prepared acceptance"
        );

        Ok(Self {
            offer,
            in_asset: in_asset.name.clone(),
            out_asset,
            in_options,
            out_options,
            receiver,
            payer,
            negotiator,
            incoming_quantity: 1,
            negotiation,
        })
    }

    /// Fetches the offer, the signed-in account, the offer owner and the
    /// offered asset, then prepares a plan.
    pub async fn load(api: Arc<dyn MarketplaceApi>, offer_id: &str) -> MarketResult<Self> {
        let user_key = api
            .session_key()
            .ok_or_else(|| MarketError::Unauthorized("sign in to accept offers".into()))?
            .to_string();

        let offer = api.get_offer(offer_id).await?;
        if !offer.is_open() {
            return Err(MarketError::invalid(format!("offer {offer_id} is closed")));
        }
        let owner_key = offer.primary_owner()?.to_string();

        let mut accounts = AccountFetcher::new(api.clone())
            .fetch(&[user_key.as_str(), owner_key.as_str()])
            .await?;
        let owner = accounts
            .get(&owner_key)
            .cloned()
            .ok_or_else(|| MarketError::not_found(format!("account {owner_key}")))?;
        let user = accounts
            .remove(&user_key)
            .ok_or_else(|| MarketError::not_found(format!("account {user_key}")))?;

        let in_asset_name = asset_of(&offer.source, &owner.holdings)?.to_string();
        let in_asset = api.get_asset(&in_asset_name).await?;

        Self::prepare(offer, &user, &owner, &in_asset)
    }

    pub fn offer(&self) -> &Offer {
        &self.offer
    }

    pub fn in_asset(&self) -> &str {
        &self.in_asset
    }

    /// `None` for free offers.
    pub fn out_asset(&self) -> Option<&str> {
        self.out_asset.as_deref()
    }

    /// The acceptor's holdings that can receive the offered asset.
    pub fn in_options(&self) -> &[Holding] {
        &self.in_options
    }

    /// The acceptor's holdings that can pay for the offer.
    pub fn out_options(&self) -> &[Holding] {
        &self.out_options
    }

    pub fn receiver(&self) -> &Receiver {
        &self.receiver
    }

    pub fn payer(&self) -> Option<&str> {
        self.payer.as_deref()
    }

    pub fn negotiation(&self) -> Negotiation {
        self.negotiation
    }

    pub fn in_max(&self) -> Capacity {
        self.negotiator.in_max()
    }

    pub fn out_max(&self) -> Capacity {
        self.negotiator.out_max()
    }

    /// Account keys the offer is limited to, for display.
    pub fn allowed_accounts(&self) -> Option<&[String]> {
        RuleEvaluator::for_offer(&self.offer).allowed_accounts()
    }

    pub fn select_receiver(&mut self, holding_id: &str) -> MarketResult<()> {
        if !self.in_options.iter().any(|h| h.id == holding_id) {
            return Err(MarketError::invalid(format!(
                "holding {holding_id} cannot receive {}",
                self.in_asset
            )));
        }
        self.receiver = Receiver::Existing(holding_id.to_string());
        Ok(())
    }

    /// Receive into a holding created on submission.
    pub fn select_new_holding(&mut self, label: Option<String>, description: Option<String>) {
        let mut holding = new_receiving_holding(&self.in_asset);
        holding.label = label;
        holding.description = description;
        self.receiver = Receiver::NewHolding(holding);
    }

    /// Pays from `holding_id` and renegotiates against its quantity.
    pub fn select_payer(&mut self, holding_id: &str) -> MarketResult<Negotiation> {
        let chosen = self.out_options.iter().find(|h| h.id == holding_id);
        let quantity = match (&self.out_asset, chosen) {
            (_, Some(holding)) => holding.quantity,
            (Some(asset), None) => {
                return Err(MarketError::invalid(format!(
                    "holding {holding_id} cannot pay with {asset}"
                )))
            }
            (None, None) => {
                return Err(MarketError::invalid(format!(
                    "offer {} is free",
                    self.offer.id
                )))
            }
        };
        self.negotiator = self.negotiator.with_out_max(Capacity::Limited(quantity))?;
        self.payer = Some(holding_id.to_string());
        self.set_incoming_quantity(self.incoming_quantity)
    }

    /// Negotiates a new count for the requested quantity of the offered asset.
    pub fn set_incoming_quantity(&mut self, quantity: u64) -> MarketResult<Negotiation> {
        self.negotiation = self.negotiator.negotiate(quantity)?;
        self.incoming_quantity = quantity;
        Ok(self.negotiation)
    }

    /// A zero count has nothing to submit.
    pub fn is_submittable(&self) -> bool {
        !self.negotiation.is_empty()
    }

    /// Request body, with `created` standing in for a new receiving holding.
    pub fn request(&self, created: Option<&str>) -> MarketResult<AcceptOfferRequest> {
        self.check_ready()?;
        let target = match (&self.receiver, created) {
            (_, Some(id)) => id.to_string(),
            (Receiver::Existing(id), None) => id.clone(),
            (Receiver::NewHolding(_), None) => {
                return Err(MarketError::invalid(
                    "the receiving holding has not been created yet",
                ))
            }
        };
        Ok(AcceptOfferRequest {
            count: self.negotiation.count,
            target,
            source: self.payer.clone(),
        })
    }

    fn check_ready(&self) -> MarketResult<()> {
        if !self.is_submittable() {
            return Err(MarketError::invalid(format!(
                "nothing to exchange for offer {}",
                self.offer.id
            )));
        }
        if self.payer.is_none() && !self.offer.is_free() {
            return Err(MarketError::invalid(format!(
                "no holding of {} to pay with",
                self.out_asset.as_deref().unwrap_or_default()
            )));
        }
        Ok(())
    }

    /// Creates the receiving holding if needed, then accepts the offer.
    /// Any failure aborts; nothing already created is rolled back.
    pub async fn submit(&self, api: &dyn MarketplaceApi) -> MarketResult<AcceptOfferRequest> {
        self.check_ready()?;

        let created = match &self.receiver {
            Receiver::NewHolding(holding) => Some(api.create_holding(holding).await?.id),
            Receiver::Existing(_) => None,
        };
        let request = self.request(created.as_deref())?;
        api.accept_offer(&self.offer.id, &request).await?;

        tracing::info!(
            offer = %self.offer.id,
            count = request.count,
            target = %request.target,
            "acceptance submitted"
        );
        Ok(request)
    }
}

fn new_receiving_holding(asset: &str) -> NewHolding {
    NewHolding {
        asset: asset.to_string(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sawbuck_core::{Rule, RuleList};

    fn holding(id: &str, asset: &str, quantity: u64) -> Holding {
        Holding {
            id: id.into(),
            asset: asset.into(),
            quantity,
            label: None,
            description: None,
        }
    }

    fn account(key: &str, holdings: Vec<Holding>) -> Account {
        Account {
            public_key: key.into(),
            label: None,
            description: None,
            email: None,
            holdings,
        }
    }

    fn offer(target: Option<&str>, source_quantity: u64, target_quantity: u64) -> Offer {
        Offer {
            id: "o1".into(),
            label: None,
            description: None,
            source: "own-gold".into(),
            source_quantity,
            target: target.map(str::to_string),
            target_quantity,
            rules: RuleList::new(),
            owners: vec!["02aa".into()],
            status: None,
        }
    }

    fn gold(rules: &[Rule]) -> Asset {
        Asset {
            name: "gold".into(),
            description: String::new(),
            owners: vec!["02aa".into()],
            rules: rules.iter().cloned().collect(),
        }
    }

    fn prepare(offer: Offer, user: &Account) -> AcceptancePlan {
        AcceptancePlan::prepare(offer, user, &owner(), &gold(&[])).unwrap()
    }

    fn owner() -> Account {
        account(
            "02aa",
            vec![holding("own-gold", "gold", 12), holding("own-usd", "usd", 0)],
        )
    }

    #[test]
    fn preselects_first_holdings_and_minimum_count() {
        let user = account(
            "03bb",
            vec![
                holding("my-gold", "gold", 1),
                holding("my-usd", "usd", 3),
                holding("my-usd-2", "usd", 50),
            ],
        );
        let plan = prepare(offer(Some("own-usd"), 5, 2), &user);

        assert_eq!(plan.receiver(), &Receiver::Existing("my-gold".into()));
        assert_eq!(plan.payer(), Some("my-usd"));
        assert_eq!(plan.out_asset(), Some("usd"));
        assert_eq!(plan.in_max(), Capacity::Limited(12));
        assert_eq!(plan.out_max(), Capacity::Limited(3));
        assert_eq!(
            plan.negotiation(),
            Negotiation {
                count: 1,
                in_quantity: 5,
                out_quantity: 2
            }
        );
    }

    #[test]
    fn switching_payer_renegotiates() {
        let user = account(
            "03bb",
            vec![holding("my-usd", "usd", 3), holding("my-usd-2", "usd", 50)],
        );
        let mut plan = prepare(offer(Some("own-usd"), 5, 2), &user);
        assert_eq!(plan.set_incoming_quantity(10).unwrap().count, 1);

        let n = plan.select_payer("my-usd-2").unwrap();
        assert_eq!(n.count, 2);
        assert_eq!(n.in_quantity, 10);
        assert_eq!(n.out_quantity, 4);
        assert!(plan.select_payer("my-gold").is_err());
    }

    #[test]
    fn no_receiving_holding_falls_back_to_new() {
        let user = account("03bb", vec![holding("my-usd", "usd", 10)]);
        let plan = prepare(offer(Some("own-usd"), 1, 1), &user);
        match plan.receiver() {
            Receiver::NewHolding(h) => assert_eq!(h.asset, "gold"),
            other => panic!("unexpected receiver {other:?}"),
        }
        assert!(plan.request(None).is_err());
        let request = plan.request(Some("fresh")).unwrap();
        assert_eq!(request.target, "fresh");
        assert_eq!(request.source.as_deref(), Some("my-usd"));
    }

    #[test]
    fn free_offer_has_no_payer() {
        let user = account("03bb", vec![holding("my-gold", "gold", 0)]);
        let mut plan = prepare(offer(None, 4, 0), &user);
        assert_eq!(plan.out_max(), Capacity::Unbounded);
        assert_eq!(plan.set_incoming_quantity(9).unwrap().count, 2);
        let request = plan.request(None).unwrap();
        assert_eq!(
            request,
            AcceptOfferRequest {
                count: 2,
                target: "my-gold".into(),
                source: None
            }
        );
    }

    #[test]
    fn owner_infinite_source_is_unbounded() {
        let user = account("03bb", vec![holding("my-gold", "gold", 0)]);
        let mut plan = AcceptancePlan::prepare(
            offer(None, 1, 0),
            &user,
            &owner(),
            &gold(&[Rule::OwnerHoldingsInfinite]),
        )
        .unwrap();
        assert_eq!(plan.in_max(), Capacity::Unbounded);
        assert_eq!(plan.set_incoming_quantity(500).unwrap().count, 500);
    }

    #[test]
    fn unpayable_offer_is_not_submittable() {
        let user = account("03bb", vec![holding("my-gold", "gold", 0)]);
        let plan = prepare(offer(Some("own-usd"), 1, 1), &user);
        assert_eq!(plan.payer(), None);
        assert!(!plan.is_submittable());
        assert!(plan.request(None).is_err());
    }

    #[test]
    fn mismatched_asset_is_rejected() {
        let user = account("03bb", vec![]);
        let mut silver = gold(&[]);
        silver.name = "silver".into();
        assert!(matches!(
            AcceptancePlan::prepare(offer(None, 1, 0), &user, &owner(), &silver),
            Err(MarketError::InvalidInput(_))
        ));
    }

    #[test]
    fn receiver_must_hold_offered_asset() {
        let user = account(
            "03bb",
            vec![holding("my-gold", "gold", 0), holding("my-usd", "usd", 9)],
        );
        let mut plan = prepare(offer(None, 1, 0), &user);
        assert!(plan.select_receiver("my-usd").is_err());
        plan.select_new_holding(Some("vault".into()), None);
        match plan.receiver() {
            Receiver::NewHolding(h) => assert_eq!(h.label.as_deref(), Some("vault")),
            other => panic!("unexpected receiver {other:?}"),
        }
        plan.select_receiver("my-gold").unwrap();
        assert_eq!(plan.request(None).unwrap().target, "my-gold");
    }
}
