//! Marketplace data access for Sawbuck.
//!
//! The REST service owns every business rule. This crate only moves records
//! between it and the analyzer.

pub mod auth;
pub mod memory;
pub mod rest;
pub mod snapshot;

use async_trait::async_trait;
use sawbuck_core::error::MarketResult;
use sawbuck_core::{
    AcceptOfferRequest, Account, AccountUpdate, Asset, AuthResponse, Credentials, Holding,
    NewAccount, NewAsset, NewHolding, NewOffer, Offer,
};

pub use memory::MemoryMarket;
pub use rest::{ClientConfig, RestClient};
pub use snapshot::{fetch_snapshot, AccountFetcher};

/// Abstraction over the marketplace API, one method per endpoint.
///
/// Mutating calls need an authenticated session; implementations fail with
/// `MarketError::Unauthorized` before issuing anything when there is none.
#[async_trait]
pub trait MarketplaceApi: Send + Sync {
    /// Public key of the signed-in account, if any.
    fn session_key(&self) -> Option<&str>;

    async fn create_account(&self, account: &NewAccount) -> MarketResult<AuthResponse>;
    async fn authorize(&self, credentials: &Credentials) -> MarketResult<AuthResponse>;
    async fn list_accounts(&self) -> MarketResult<Vec<Account>>;
    async fn get_account(&self, public_key: &str) -> MarketResult<Account>;
    async fn update_account(&self, update: &AccountUpdate) -> MarketResult<()>;

    async fn list_assets(&self) -> MarketResult<Vec<Asset>>;
    async fn get_asset(&self, name: &str) -> MarketResult<Asset>;
    async fn create_asset(&self, asset: &NewAsset) -> MarketResult<Asset>;

    async fn create_holding(&self, holding: &NewHolding) -> MarketResult<Holding>;

    async fn list_offers(&self) -> MarketResult<Vec<Offer>>;
    async fn get_offer(&self, id: &str) -> MarketResult<Offer>;
    async fn create_offer(&self, offer: &NewOffer) -> MarketResult<Offer>;
    async fn accept_offer(&self, id: &str, acceptance: &AcceptOfferRequest) -> MarketResult<()>;
    async fn close_offer(&self, id: &str) -> MarketResult<()>;

    /// The signed-in account, or `None` when logged out.
    async fn session_account(&self) -> MarketResult<Option<Account>> {
        match self.session_key() {
            Some(key) => self.get_account(key).await.map(Some),
            None => Ok(None),
        }
    }
}
