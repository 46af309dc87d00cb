//! In-memory marketplace over a [`MarketSnapshot`].
//!
//! Serves reads from the snapshot and records mutations so offline runs and
//! tests can inspect what would have been submitted. It does not move
//! quantities between holdings; ledger rules belong to the live service.

use crate::MarketplaceApi;
use async_trait::async_trait;
use sawbuck_core::error::{MarketError, MarketResult};
use sawbuck_core::{
    AcceptOfferRequest, Account, AccountUpdate, Asset, AuthResponse, Credentials, Holding,
    MarketSnapshot, NewAccount, NewAsset, NewHolding, NewOffer, Offer, OfferStatus,
};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

/// A mutation the in-memory market accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Acceptance {
        offer: String,
        request: AcceptOfferRequest,
    },
    Closure {
        offer: String,
    },
}

pub struct MemoryMarket {
    state: RwLock<MarketSnapshot>,
    session: Option<String>,
    submissions: Mutex<Vec<Submission>>,
    next_id: AtomicU64,
}

impl MemoryMarket {
    pub fn new(snapshot: MarketSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
            session: None,
            submissions: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Loads a JSON snapshot (`{accounts, assets, offers}`) from disk.
    pub fn from_json_file(path: &Path) -> MarketResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            MarketError::invalid(format!("cannot read snapshot {}: {e}", path.display()))
        })?;
        let snapshot: MarketSnapshot = serde_json::from_str(&text).map_err(|e| {
            MarketError::Decode(format!("snapshot {} is malformed: {e}", path.display()))
        })?;
        tracing::info!(
            path = %path.display(),
            accounts = snapshot.accounts.len(),
            assets = snapshot.assets.len(),
            offers = snapshot.offers.len(),
            "loaded snapshot"
        );
        Ok(Self::new(snapshot))
    }

    /// Acts as the given account for mutating calls.
    pub fn with_session(mut self, public_key: impl Into<String>) -> Self {
        self.session = Some(public_key.into());
        self
    }

    /// Mutations accepted so far, oldest first.
    pub fn submissions(&self) -> MarketResult<Vec<Submission>> {
        self.submissions
            .lock()
            .map(|s| s.clone())
            .map_err(|_| MarketError::Internal("submission log lock poisoned".into()))
    }

    pub fn snapshot(&self) -> MarketResult<MarketSnapshot> {
        self.read(|state| Ok(state.clone()))
    }

    fn read<T>(&self, f: impl FnOnce(&MarketSnapshot) -> MarketResult<T>) -> MarketResult<T> {
        let state = self
            .state
            .read()
            .map_err(|_| MarketError::Internal("market state lock poisoned".into()))?;
        f(&state)
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut MarketSnapshot) -> MarketResult<T>,
    ) -> MarketResult<T> {
        let mut state = self
            .state
            .write()
            .map_err(|_| MarketError::Internal("market state lock poisoned".into()))?;
        f(&mut state)
    }

    fn require_session(&self) -> MarketResult<&str> {
        self.session
            .as_deref()
            .ok_or_else(|| MarketError::Unauthorized("no account is signed in".into()))
    }

    fn record(&self, submission: Submission) -> MarketResult<()> {
        self.submissions
            .lock()
            .map_err(|_| MarketError::Internal("submission log lock poisoned".into()))?
            .push(submission);
        Ok(())
    }

    fn fresh_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

fn session_account<'a>(
    state: &'a mut MarketSnapshot,
    key: &str,
) -> MarketResult<&'a mut Account> {
    state
        .accounts
        .iter_mut()
        .find(|a| a.public_key == key)
        .ok_or_else(|| MarketError::not_found(format!("account {key}")))
}

#[async_trait]
impl MarketplaceApi for MemoryMarket {
    fn session_key(&self) -> Option<&str> {
        self.session.as_deref()
    }

    async fn create_account(&self, _account: &NewAccount) -> MarketResult<AuthResponse> {
        Err(MarketError::Internal(
            "the in-memory market cannot issue credentials".into(),
        ))
    }

    async fn authorize(&self, _credentials: &Credentials) -> MarketResult<AuthResponse> {
        Err(MarketError::Internal(
            "the in-memory market cannot issue credentials".into(),
        ))
    }

    async fn list_accounts(&self) -> MarketResult<Vec<Account>> {
        self.read(|s| Ok(s.accounts.clone()))
    }

    async fn get_account(&self, public_key: &str) -> MarketResult<Account> {
        self.read(|s| {
            s.account(public_key)
                .cloned()
                .ok_or_else(|| MarketError::not_found(format!("account {public_key}")))
        })
    }

    async fn update_account(&self, update: &AccountUpdate) -> MarketResult<()> {
        let key = self.require_session()?;
        self.write(|s| {
            let account = session_account(s, key)?;
            if let Some(email) = &update.email {
                account.email = Some(email.clone());
            }
            if let Some(label) = &update.label {
                account.label = Some(label.clone());
            }
            if let Some(description) = &update.description {
                account.description = Some(description.clone());
            }
            Ok(())
        })
    }

    async fn list_assets(&self) -> MarketResult<Vec<Asset>> {
        self.read(|s| Ok(s.assets.clone()))
    }

    async fn get_asset(&self, name: &str) -> MarketResult<Asset> {
        self.read(|s| {
            s.asset(name)
                .cloned()
                .ok_or_else(|| MarketError::not_found(format!("asset {name}")))
        })
    }

    async fn create_asset(&self, asset: &NewAsset) -> MarketResult<Asset> {
        let key = self.require_session()?.to_string();
        self.write(|s| {
            if s.asset(&asset.name).is_some() {
                return Err(MarketError::invalid(format!(
                    "asset {} already exists",
                    asset.name
                )));
            }
            let created = Asset {
                name: asset.name.clone(),
                description: asset.description.clone().unwrap_or_default(),
                owners: vec![key],
                rules: asset.rules.clone(),
            };
            s.assets.push(created.clone());
            Ok(created)
        })
    }

    async fn create_holding(&self, holding: &NewHolding) -> MarketResult<Holding> {
        let key = self.require_session()?;
        let id = self.fresh_id("holding");
        self.write(|s| {
            if s.asset(&holding.asset).is_none() {
                return Err(MarketError::not_found(format!("asset {}", holding.asset)));
            }
            let created = Holding {
                id,
                asset: holding.asset.clone(),
                quantity: holding.quantity.unwrap_or(0),
                label: holding.label.clone(),
                description: holding.description.clone(),
            };
            session_account(s, key)?.holdings.push(created.clone());
            Ok(created)
        })
    }

    async fn list_offers(&self) -> MarketResult<Vec<Offer>> {
        self.read(|s| Ok(s.offers.clone()))
    }

    async fn get_offer(&self, id: &str) -> MarketResult<Offer> {
        self.read(|s| {
            s.offer(id)
                .cloned()
                .ok_or_else(|| MarketError::not_found(format!("offer {id}")))
        })
    }

    async fn create_offer(&self, offer: &NewOffer) -> MarketResult<Offer> {
        let key = self.require_session()?.to_string();
        let id = self.fresh_id("offer");
        self.write(|s| {
            let owns_source = s
                .account(&key)
                .map_or(false, |a| a.holding(&offer.source).is_some());
            if !owns_source {
                return Err(MarketError::invalid(format!(
                    "holding {} does not belong to {key}",
                    offer.source
                )));
            }
            let created = Offer {
                id,
                label: offer.label.clone(),
                description: offer.description.clone(),
                source: offer.source.clone(),
                source_quantity: offer.source_quantity,
                target: offer.target.clone(),
                target_quantity: offer.target_quantity.unwrap_or(0),
                rules: offer.rules.clone(),
                owners: vec![key],
                status: Some(OfferStatus::Open),
            };
            s.offers.push(created.clone());
            Ok(created)
        })
    }

    async fn accept_offer(&self, id: &str, acceptance: &AcceptOfferRequest) -> MarketResult<()> {
        self.require_session()?;
        self.read(|s| match s.offer(id) {
            Some(offer) if offer.is_open() => Ok(()),
            Some(_) => Err(MarketError::invalid(format!("offer {id} is not open"))),
            None => Err(MarketError::not_found(format!("offer {id}"))),
        })?;
        tracing::info!(offer = id, count = acceptance.count, "recorded acceptance");
        self.record(Submission::Acceptance {
            offer: id.to_string(),
            request: acceptance.clone(),
        })
    }

    async fn close_offer(&self, id: &str) -> MarketResult<()> {
        let key = self.require_session()?;
        self.write(|s| {
            let offer = s
                .offers
                .iter_mut()
                .find(|o| o.id == id)
                .ok_or_else(|| MarketError::not_found(format!("offer {id}")))?;
            if !offer.owners.iter().any(|owner| owner == key) {
                return Err(MarketError::Unauthorized(format!(
                    "only an owner may close offer {id}"
                )));
            }
            offer.status = Some(OfferStatus::Closed);
            Ok(())
        })?;
        self.record(Submission::Closure {
            offer: id.to_string(),
        })
    }
}
