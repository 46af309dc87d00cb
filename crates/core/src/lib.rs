//! Domain models, shared types, and error definitions.
//!
//! Foundation crate -- no async or I/O dependencies.

pub mod error;
pub mod rules;
pub mod types;

pub use error::{MarketError, MarketResult};
pub use rules::{Rule, RuleKind, RuleList};
pub use types::{
    AcceptOfferRequest, Account, AccountUpdate, Asset, AuthResponse, Capacity, Credentials,
    Holding, MarketSnapshot, NewAccount, NewAsset, NewHolding, NewOffer, Offer, OfferStatus,
};
