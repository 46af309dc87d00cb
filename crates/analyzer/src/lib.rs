//! Offer acceptance negotiation, rule gates, offer book, reports, and data sinks.

pub mod acceptance;
pub mod draft;
pub mod eligibility;
pub mod lookup;
pub mod negotiator;
pub mod offer_book;
pub mod reporter;
pub mod rules;
pub mod sink;

pub use acceptance::{AcceptancePlan, Receiver};
pub use draft::{candidate_holdings, OfferDraft, RuleSelection, TargetChoice};
pub use eligibility::{accept_gate, asset_quantities, offer_gate, request_gate, Blocked, Gate};
pub use lookup::{asset_of, HoldingIndex};
pub use negotiator::{Negotiation, QuantityNegotiator};
pub use offer_book::{OfferBook, OfferEntry};
pub use rules::{source_capacity, RuleEvaluator};
