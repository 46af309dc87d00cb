//! Plain-text reports for the terminal.
//!
//! Every renderer returns a boxed block in the same frame so reports can be
//! printed back to back.

use crate::acceptance::{AcceptancePlan, Receiver};
use crate::eligibility::{accept_gate, Blocked, Gate};
use crate::offer_book::OfferEntry;
use sawbuck_core::{Account, Asset, Rule};

const WIDTH: usize = 62;

/// `value`, or `default` when unset, cut to ten characters: longer labels
/// keep their first seven followed by `...`.
pub fn truncated_label(value: Option<&str>, default: &str) -> String {
    truncate(value.unwrap_or(default), 10)
}

fn truncate(label: &str, max: usize) -> String {
    if label.chars().count() <= max {
        return label.to_string();
    }
    let head: String = label.chars().take(max.saturating_sub(3)).collect();
    format!("{head}...")
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

struct Frame {
    out: String,
}

impl Frame {
    fn open(title: &str) -> Self {
        let mut out = String::from("\n");
        out.push_str(&format!("╔{}╗\n", "═".repeat(WIDTH)));
        out.push_str(&format!("║{:^width$}║\n", title, width = WIDTH));
        out.push_str(&format!("╠{}╣\n", "═".repeat(WIDTH)));
        Self { out }
    }

    fn field(&mut self, key: &str, value: impl std::fmt::Display) {
        self.out
            .push_str(&format!("║  {:<20}{:>39} ║\n", format!("{key}:"), value));
    }

    /// Free-form line, left aligned. Long lines run past the frame.
    fn line(&mut self, text: impl std::fmt::Display) {
        self.out.push_str(&format!("║  {:<59} ║\n", text.to_string()));
    }

    fn section(&mut self, title: &str) {
        self.out.push_str(&format!("╠{}╣\n", "═".repeat(WIDTH)));
        self.line(title);
        self.out.push_str(&format!("╠{}╣\n", "═".repeat(WIDTH)));
    }

    fn rules(&mut self, rules: &[Rule], empty: &str) {
        if rules.is_empty() {
            self.line(empty);
        }
        for rule in rules {
            self.line(format!("- {rule}"));
        }
    }

    fn gate(&mut self, action: &str, gate: &Gate) {
        match gate {
            Ok(()) => self.field(action, "available"),
            Err(blocked) => self.field(action, blocked),
        }
    }

    fn close(mut self) -> String {
        self.out.push_str(&format!("╚{}╝\n", "═".repeat(WIDTH)));
        self.out
    }
}

// ---------------------------------------------------------------------------
// Offers
// ---------------------------------------------------------------------------

/// Short accept state for list rows. Detail views print the full reason.
fn accept_status(gate: &Gate) -> &'static str {
    match gate {
        Ok(()) => "accept",
        Err(Blocked::Closed) => "closed",
        Err(Blocked::SignedOut) => "sign in",
        Err(_) => "blocked",
    }
}

/// One line per offer: label, what it gives, what it asks and whether
/// `user` can accept it.
pub fn render_offer_list(entries: &[OfferEntry<'_>], user: Option<&Account>) -> String {
    let mut frame = Frame::open("OFFERS");
    if entries.is_empty() {
        frame.line("No offers match.");
    }
    for entry in entries {
        let offer = entry.offer;
        let asks = if offer.is_free() {
            "free".to_string()
        } else {
            format!(
                "{} {}",
                offer.target_quantity,
                entry.target_asset.unwrap_or("?")
            )
        };
        let gate = accept_gate(offer, entry.target_asset, user);
        frame.line(format!(
            "{:<10} {:>6} {:<12} for {:<14} {}",
            truncated_label(offer.label.as_deref(), &offer.id),
            offer.source_quantity,
            truncate(entry.source_asset.unwrap_or("?"), 12),
            truncate(&asks, 14),
            accept_status(&gate)
        ));
    }
    frame.close()
}

pub fn render_offer_detail(
    entry: &OfferEntry<'_>,
    owner: Option<&Account>,
    accept: &Gate,
) -> String {
    let offer = entry.offer;
    let mut frame = Frame::open(&format!("OFFER {}", offer.display_name()));
    frame.field("Id", &offer.id);
    if let Some(description) = &offer.description {
        frame.line(description);
    }
    frame.field(
        "Owner",
        owner.map_or_else(|| offer.owners.join(", "), |a| a.display_name().to_string()),
    );
    frame.field(
        "Gives",
        format!(
            "{} {}",
            offer.source_quantity,
            entry.source_asset.unwrap_or("?")
        ),
    );
    if offer.is_free() {
        frame.field("Asks", "free");
    } else {
        frame.field(
            "Asks",
            format!(
                "{} {}",
                offer.target_quantity,
                entry.target_asset.unwrap_or("?")
            ),
        );
    }
    frame.field("Status", if offer.is_open() { "open" } else { "closed" });
    frame.section("RULES");
    frame.rules(&offer.rules, "this offer has no special rules");
    frame.section("ACTIONS");
    frame.gate("Accept", accept);
    frame.close()
}

// ---------------------------------------------------------------------------
// Accounts & assets
// ---------------------------------------------------------------------------

pub fn render_account(account: &Account) -> String {
    let mut frame = Frame::open(&format!("ACCOUNT {}", account.display_name()));
    frame.field("Public key", truncate(&account.public_key, 39));
    if let Some(email) = &account.email {
        frame.field("Email", email);
    }
    if let Some(description) = &account.description {
        frame.line(description);
    }
    frame.section("HOLDINGS");
    if account.holdings.is_empty() {
        frame.line("this account currently has no holdings");
    }
    for holding in &account.holdings {
        frame.field(
            &truncated_label(holding.label.as_deref(), &holding.id),
            format!("{} {}", holding.quantity, holding.asset),
        );
    }
    frame.close()
}

pub fn render_asset(asset: &Asset, offer: &Gate, request: &Gate) -> String {
    let mut frame = Frame::open(&format!("ASSET {}", asset.name));
    if !asset.description.is_empty() {
        frame.line(&asset.description);
    }
    frame.field("Owners", asset.owners.len());
    for owner in &asset.owners {
        frame.line(format!("- {owner}"));
    }
    frame.section("RULES");
    frame.rules(&asset.rules, "this asset has no special rules");
    frame.section("ACTIONS");
    frame.gate("Offer", offer);
    frame.gate("Request", request);
    frame.close()
}

pub fn render_asset_list(assets: &[Asset]) -> String {
    let mut frame = Frame::open("ASSETS");
    if assets.is_empty() {
        frame.line("No assets yet.");
    }
    for asset in assets {
        frame.field(
            &truncate(&asset.name, 19),
            format!("{} owner(s), {} rule(s)", asset.owners.len(), asset.rules.len()),
        );
    }
    frame.close()
}

// ---------------------------------------------------------------------------
// Acceptance
// ---------------------------------------------------------------------------

/// Current state of an acceptance plan: both sides, caps and the count.
pub fn render_quote(plan: &AcceptancePlan) -> String {
    let offer = plan.offer();
    let negotiation = plan.negotiation();
    let mut frame = Frame::open(&format!("ACCEPT {}", offer.display_name()));

    frame.field("Receive", format!("{} {}", negotiation.in_quantity, plan.in_asset()));
    match plan.out_asset() {
        Some(asset) => frame.field("Pay", format!("{} {asset}", negotiation.out_quantity)),
        None => frame.field("Pay", "nothing (free)"),
    }
    frame.field("Count", negotiation.count);
    frame.field("Max receivable", plan.in_max());
    frame.field("Max payable", plan.out_max());

    frame.section("HOLDINGS");
    match plan.receiver() {
        Receiver::Existing(id) => frame.field("Into", id),
        Receiver::NewHolding(h) => frame.field(
            "Into",
            format!("new holding {}", h.label.as_deref().unwrap_or_default()).trim_end(),
        ),
    }
    frame.field("From", plan.payer().unwrap_or("-"));

    if let Some(accounts) = plan.allowed_accounts() {
        frame.section("LIMITED TO");
        for key in accounts {
            frame.line(key);
        }
    }

    frame.section(if plan.is_submittable() {
        "READY TO SUBMIT"
    } else {
        "NOTHING TO EXCHANGE"
    });
    frame.close()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sawbuck_core::{Holding, Offer, RuleList};

    #[test]
    fn labels_truncate_past_ten_chars() {
        assert_eq!(truncated_label(Some("short"), "x"), "short");
        assert_eq!(truncated_label(Some("exactly10!"), "x"), "exactly10!");
        assert_eq!(truncated_label(Some("eleven char"), "x"), "eleven ...");
        assert_eq!(truncated_label(None, "holding-12345"), "holding...");
    }

    #[test]
    fn offer_detail_shows_gate_and_rules() {
        let offer = Offer {
            id: "o1".into(),
            label: Some("Gold sale".into()),
            description: None,
            source: "h1".into(),
            source_quantity: 5,
            target: None,
            target_quantity: 0,
            rules: [Rule::ExchangeOnce].into_iter().collect::<RuleList>(),
            owners: vec!["02aa".into()],
            status: None,
        };
        let entry = OfferEntry {
            offer: &offer,
            source_asset: Some("gold"),
            target_asset: None,
        };
        let text = render_offer_detail(&entry, None, &Ok(()));
        assert!(text.contains("OFFER Gold sale"));
        assert!(text.contains("5 gold"));
        assert!(text.contains("free"));
        assert!(text.contains("Exchange only once"));
        assert!(text.contains("available"));
    }

    #[test]
    fn offer_list_marks_accept_state_per_row() {
        let paid = Offer {
            id: "o2".into(),
            label: Some("usd deal".into()),
            description: None,
            source: "h1".into(),
            source_quantity: 5,
            target: Some("h2".into()),
            target_quantity: 3,
            rules: [Rule::Other {
                kind: "REQUIRE_SOURCE_QUANTITIES".into(),
                value: Some(serde_json::json!([5])),
            }]
            .into_iter()
            .collect(),
            owners: vec!["02aa".into()],
            status: None,
        };
        let entries = [OfferEntry {
            offer: &paid,
            source_asset: Some("gold"),
            target_asset: Some("usd"),
        }];
        let buyer = |quantity| Account {
            public_key: "03bb".into(),
            label: None,
            description: None,
            email: None,
            holdings: vec![Holding {
                id: "b1".into(),
                asset: "usd".into(),
                quantity,
                label: None,
                description: None,
            }],
        };

        assert!(render_offer_list(&entries, Some(&buyer(3))).contains(" accept "));
        assert!(render_offer_list(&entries, Some(&buyer(2))).contains(" blocked "));
        assert!(render_offer_list(&entries, None).contains(" sign in "));

        let entry = entries[0];
        let text = render_offer_detail(&entry, None, &Ok(()));
        assert!(text.contains("REQUIRE_SOURCE_QUANTITIES: [5]"));
    }

    #[test]
    fn empty_account_says_so() {
        let account = Account {
            public_key: "02aa".into(),
            label: Some("alice".into()),
            description: None,
            email: None,
            holdings: Vec::<Holding>::new(),
        };
        let text = render_account(&account);
        assert!(text.contains("ACCOUNT alice"));
        assert!(text.contains("no holdings"));
        assert!(text.starts_with("\n╔"));
        assert!(text.ends_with("╝\n"));
    }
}
