//! Offer acceptance count negotiation.
//!
//! An offer trades at a fixed ratio: every unit of `count` moves
//! `source_quantity` of the offered asset to the acceptor and
//! `target_quantity` of the requested asset back. The negotiator turns a
//! requested incoming quantity into the largest count both sides can cover.

use crate::rules::RuleEvaluator;
use sawbuck_core::error::{MarketError, MarketResult};
use sawbuck_core::{Capacity, Offer, Rule};
use serde::Serialize;

/// Result of one negotiation. Always satisfies
/// `in_quantity <= in_max` and `out_quantity <= out_max`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Negotiation {
    pub count: u64,
    /// Offered asset received by the acceptor.
    pub in_quantity: u64,
    /// Requested asset paid by the acceptor.
    pub out_quantity: u64,
}

impl Negotiation {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantityNegotiator {
    source_quantity: u64,
    target_quantity: u64,
    in_max: Capacity,
    out_max: Capacity,
    single_exchange: bool,
}

impl QuantityNegotiator {
    /// Validates the exchange ratio up front so [`negotiate`](Self::negotiate)
    /// never divides by zero.
    ///
    /// `target_quantity` may only be zero when the paying side is unbounded,
    /// i.e. for free offers.
    pub fn new(
        source_quantity: u64,
        target_quantity: u64,
        in_max: Capacity,
        out_max: Capacity,
        rules: &[Rule],
    ) -> MarketResult<Self> {
        if source_quantity == 0 {
            return Err(MarketError::invalid("offer source quantity must be positive"));
        }
        if target_quantity == 0 && out_max != Capacity::Unbounded {
            return Err(MarketError::invalid(
                "offer target quantity must be positive when a payment is requested",
            ));
        }
        Ok(Self {
            source_quantity,
            target_quantity,
            in_max,
            out_max,
            single_exchange: RuleEvaluator::new(rules).caps_single_exchange(),
        })
    }

    /// Negotiator for `offer`. Free offers ignore `out_max`: nothing is paid.
    pub fn for_offer(offer: &Offer, in_max: Capacity, out_max: Capacity) -> MarketResult<Self> {
        let out_max = if offer.is_free() {
            Capacity::Unbounded
        } else {
            out_max
        };
        Self::new(
            offer.source_quantity,
            offer.target_quantity,
            in_max,
            out_max,
            &offer.rules,
        )
    }

    pub fn in_max(&self) -> Capacity {
        self.in_max
    }

    pub fn out_max(&self) -> Capacity {
        self.out_max
    }

    /// Same negotiator with a different paying-side capacity.
    pub fn with_out_max(self, out_max: Capacity) -> MarketResult<Self> {
        if self.target_quantity == 0 && out_max != Capacity::Unbounded {
            return Err(MarketError::invalid(
                "offer target quantity must be positive when a payment is requested",
            ));
        }
        Ok(Self { out_max, ..self })
    }

    /// Largest feasible count for `incoming_quantity` of the offered asset.
    ///
    /// Order matters: round down to whole units, lift a non-zero request to
    /// one unit, cap single-use offers at one, then clamp to what the offerer
    /// can give and to what the acceptor can pay. Shortfalls clamp silently,
    /// down to zero.
    pub fn negotiate(&self, incoming_quantity: u64) -> MarketResult<Negotiation> {
        let mut count = incoming_quantity / self.source_quantity;
        if incoming_quantity != 0 {
            count = count.max(1);
        }
        if self.single_exchange {
            count = count.min(1);
        }
        if let Capacity::Limited(max) = self.in_max {
            if exceeds(count, self.source_quantity, max) {
                count = max / self.source_quantity;
            }
        }
        if let Capacity::Limited(max) = self.out_max {
            // target_quantity > 0 whenever out_max is limited.
            if exceeds(count, self.target_quantity, max) {
                count = max / self.target_quantity;
            }
        }

        let in_quantity = checked_total(count, self.source_quantity)?;
        let out_quantity = checked_total(count, self.target_quantity)?;

        tracing::debug!(
            incoming_quantity,
            count,
            in_quantity,
            out_quantity,
            in_max = %self.in_max,
            out_max = %self.out_max,
            "negotiated"
        );

        Ok(Negotiation {
            count,
            in_quantity,
            out_quantity,
        })
    }
}

#[inline]
fn exceeds(count: u64, per_unit: u64, max: u64) -> bool {
    count.checked_mul(per_unit).map_or(true, |total| total > max)
}

fn checked_total(count: u64, per_unit: u64) -> MarketResult<u64> {
    count.checked_mul(per_unit).ok_or_else(|| {
        MarketError::invalid(format!("{count} x {per_unit} overflows a quantity"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use Capacity::{Limited, Unbounded};

    fn negotiate(
        incoming: u64,
        source: u64,
        target: u64,
        in_max: Capacity,
        out_max: Capacity,
        rules: &[Rule],
    ) -> Negotiation {
        QuantityNegotiator::new(source, target, in_max, out_max, rules)
            .unwrap()
            .negotiate(incoming)
            .unwrap()
    }

    #[test]
    fn clamps_to_what_acceptor_can_pay() {
        let n = negotiate(10, 5, 2, Limited(12), Limited(3), &[]);
        assert_eq!(
            n,
            Negotiation {
                count: 1,
                in_quantity: 5,
                out_quantity: 2
            }
        );
    }

    #[test]
    fn empty_source_clamps_to_zero() {
        let n = negotiate(5, 1, 1, Limited(0), Limited(100), &[]);
        assert_eq!(n, Negotiation::default());
        assert!(n.is_empty());
    }

    #[test]
    fn single_use_offer_caps_at_one() {
        let n = negotiate(50, 1, 1, Limited(100), Limited(100), &[Rule::ExchangeOnce]);
        assert_eq!(
            n,
            Negotiation {
                count: 1,
                in_quantity: 1,
                out_quantity: 1
            }
        );
        let n = negotiate(
            50,
            1,
            1,
            Limited(100),
            Limited(100),
            &[Rule::ExchangeOncePerAccount],
        );
        assert_eq!(n.count, 1);
    }

    #[test]
    fn partial_unit_rounds_up_to_one() {
        let n = negotiate(3, 5, 1, Limited(100), Limited(100), &[]);
        assert_eq!(n.count, 1);
        assert_eq!(n.in_quantity, 5);
    }

    #[test]
    fn zero_request_stays_zero() {
        let n = negotiate(0, 5, 1, Limited(100), Limited(100), &[]);
        assert!(n.is_empty());
    }

    #[test]
    fn rejects_zero_ratio() {
        assert!(matches!(
            QuantityNegotiator::new(0, 1, Limited(1), Limited(1), &[]),
            Err(MarketError::InvalidInput(_))
        ));
        assert!(matches!(
            QuantityNegotiator::new(1, 0, Limited(1), Limited(1), &[]),
            Err(MarketError::InvalidInput(_))
        ));
    }

    #[test]
    fn free_offer_allows_zero_target() {
        let n = negotiate(4, 2, 0, Limited(10), Unbounded, &[]);
        assert_eq!(
            n,
            Negotiation {
                count: 2,
                in_quantity: 4,
                out_quantity: 0
            }
        );
    }

    #[test]
    fn unbounded_source_follows_request() {
        let n = negotiate(1_000_000, 1, 1, Unbounded, Limited(u64::MAX), &[]);
        assert_eq!(n.count, 1_000_000);
    }

    #[test]
    fn overflowing_payment_is_an_error() {
        let negotiator =
            QuantityNegotiator::new(1, u64::MAX, Unbounded, Unbounded, &[]).unwrap();
        assert!(matches!(
            negotiator.negotiate(2),
            Err(MarketError::InvalidInput(_))
        ));
    }

    #[test]
    fn overflowing_payment_clamps_when_bounded() {
        let n = negotiate(4, 1, u64::MAX, Unbounded, Limited(u64::MAX), &[]);
        assert_eq!(n.count, 1);
    }

    #[test]
    fn with_out_max_rechecks_ratio() {
        let free = QuantityNegotiator::new(1, 0, Limited(5), Unbounded, &[]).unwrap();
        assert!(free.with_out_max(Limited(3)).is_err());

        let paid = QuantityNegotiator::new(1, 2, Limited(5), Limited(0), &[]).unwrap();
        let paid = paid.with_out_max(Limited(4)).unwrap();
        assert_eq!(paid.negotiate(5).unwrap().count, 2);
    }

    #[test]
    fn caps_hold_over_small_domain() {
        let once = [Rule::ExchangeOnce];
        for source in 1..=4u64 {
            for target in 1..=4u64 {
                for in_max in 0..=9u64 {
                    for out_max in 0..=9u64 {
                        for incoming in 0..=12u64 {
                            for rules in [&[][..], &once[..]] {
                                let n = negotiate(
                                    incoming,
                                    source,
                                    target,
                                    Limited(in_max),
                                    Limited(out_max),
                                    rules,
                                );
                                assert!(n.in_quantity <= in_max);
                                assert!(n.out_quantity <= out_max);
                                assert_eq!(n.in_quantity, n.count * source);
                                assert_eq!(n.out_quantity, n.count * target);
                                if !rules.is_empty() {
                                    assert!(n.count <= 1);
                                }
                                if incoming > 0 && in_max >= source && out_max >= target {
                                    assert!(n.count >= 1);
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn negotiation_is_repeatable() {
        let negotiator =
            QuantityNegotiator::new(3, 2, Limited(20), Limited(9), &[]).unwrap();
        assert_eq!(negotiator.negotiate(14).unwrap(), negotiator.negotiate(14).unwrap());
    }
}
