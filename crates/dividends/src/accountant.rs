//! Pro-rata dividend entitlement, unclaimed share and claim gating.

use serde::{Deserialize, Serialize};

use estate_core::{InvestorAddress, PropertyId};

use crate::error::{ClaimRejection, DividendError};
use crate::math::mul_div_floor;
use crate::property::{ClaimRecord, Holding, Property};

/// Share of the property's dividend pool owed to a holder:
/// `floor(balance * total_dividends / total_tokens)`.
///
/// Floors so that the sum over all holders never exceeds the pool. The result is
/// at most `total_dividends` because the balance is at most the supply.
///
/// Entitlement is derived from the *current* balance, not the balance held when each
/// deposit landed.
pub fn compute_entitlement(property: &Property, holding: &Holding) -> Result<u128, DividendError> {
    if property.total_tokens == 0 {
        return Err(DividendError::DivisionByZero {
            property_id: property.id,
        });
    }
    if holding.balance > property.total_tokens {
        return Err(DividendError::BalanceExceedsSupply {
            property_id: property.id,
            balance: holding.balance,
            total_tokens: property.total_tokens,
        });
    }

    mul_div_floor(
        property.total_dividends,
        u128::from(holding.balance),
        u128::from(property.total_tokens),
    )
    .ok_or_else(|| DividendError::Overflow {
        context: format!("entitlement for property {}", property.id),
    })
}

/// Signed difference between entitlement and what was already claimed.
///
/// Negative only when the snapshot is stale (e.g. tokens sold after claiming
/// against a larger balance). Use [`Unclaimed::payable`] for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Unclaimed(i128);

impl Unclaimed {
    pub const ZERO: Unclaimed = Unclaimed(0);

    pub fn new(amount: i128) -> Self {
        Self(amount)
    }

    pub fn amount(&self) -> i128 {
        self.0
    }

    /// Amount clamped at zero, for display and dashboard totals.
    pub fn payable(&self) -> u128 {
        u128::try_from(self.0).unwrap_or(0)
    }

    pub fn is_stale(&self) -> bool {
        self.0 < 0
    }

    /// How far claimed exceeds entitlement (zero when not stale).
    pub fn excess(&self) -> u128 {
        if self.0 < 0 { self.0.unsigned_abs() } else { 0 }
    }
}

impl core::fmt::Display for Unclaimed {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// `entitlement - claimed`.
///
/// Both sides range over `u128`; a difference outside the `i128` range cannot be
/// represented and is reported as `Overflow` instead of being clamped.
pub fn compute_unclaimed(entitlement: u128, record: &ClaimRecord) -> Result<Unclaimed, DividendError> {
    let claimed = record.claimed_amount;
    let difference = if entitlement >= claimed {
        i128::try_from(entitlement - claimed).ok()
    } else {
        i128::try_from(claimed - entitlement).ok().map(|excess| -excess)
    };
    difference.map(Unclaimed).ok_or_else(|| DividendError::Overflow {
        context: format!(
            "unclaimed dividends of {} on property {}",
            record.investor, record.property_id
        ),
    })
}

/// What gets submitted to the ledger. Carries no amount: the ledger recomputes the
/// payable share from its own state when the transaction executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClaimIntent {
    pub property_id: PropertyId,
    pub investor: InvestorAddress,
}

/// Gate a claim before submission.
///
/// Checks run in a fixed order: wallet connected, then property active, then
/// amount. A negative unclaimed value is `StaleEntitlement`, zero is
/// `NothingToClaim`.
pub fn validate_claim(
    property_id: PropertyId,
    unclaimed: Unclaimed,
    wallet: Option<InvestorAddress>,
    property_active: bool,
) -> Result<ClaimIntent, ClaimRejection> {
    let Some(investor) = wallet else {
        return Err(ClaimRejection::NotConnected);
    };

    if !property_active {
        return Err(ClaimRejection::PropertyInactive { property_id });
    }

    if unclaimed.is_stale() {
        return Err(ClaimRejection::StaleEntitlement {
            excess: unclaimed.excess(),
        });
    }
    if unclaimed.amount() == 0 {
        return Err(ClaimRejection::NothingToClaim);
    }

    Ok(ClaimIntent {
        property_id,
        investor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::fixtures::*;
    use proptest::prelude::*;

    fn entitlement(total_tokens: u64, total_dividends: u128, balance: u64) -> Result<u128, DividendError> {
        compute_entitlement(&property(total_tokens, total_dividends), &holding(balance))
    }

    #[test]
    fn scenario_partial_claim_is_approved() {
        let e = entitlement(1000, 100_000, 250).unwrap();
        assert_eq!(e, 25_000);

        let unclaimed = compute_unclaimed(e, &record(10_000)).unwrap();
        assert_eq!(unclaimed.amount(), 15_000);

        let intent = validate_claim(PropertyId::new(1), unclaimed, Some(investor(0x01)), true).unwrap();
        assert_eq!(intent.property_id, PropertyId::new(1));
        assert_eq!(intent.investor, investor(0x01));
    }

    #[test]
    fn scenario_over_claimed_snapshot_is_stale() {
        let e = entitlement(1000, 100_000, 250).unwrap();
        let unclaimed = compute_unclaimed(e, &record(30_000)).unwrap();
        assert_eq!(unclaimed.amount(), -5_000);
        assert_eq!(unclaimed.payable(), 0);

        let err = validate_claim(PropertyId::new(1), unclaimed, Some(investor(0x01)), true).unwrap_err();
        assert_eq!(err, ClaimRejection::StaleEntitlement { excess: 5_000 });
    }

    #[test]
    fn scenario_zero_supply_is_division_by_zero() {
        let err = entitlement(0, 100_000, 0).unwrap_err();
        assert_eq!(
            err,
            DividendError::DivisionByZero {
                property_id: PropertyId::new(1)
            }
        );
        assert!(err.is_data_fault());
    }

    #[test]
    fn scenario_empty_holding_has_nothing_to_claim() {
        let e = entitlement(1000, 100_000, 0).unwrap();
        assert_eq!(e, 0);
        let unclaimed = compute_unclaimed(e, &record(0)).unwrap();
        assert_eq!(
            validate_claim(PropertyId::new(1), unclaimed, Some(investor(0x01)), true),
            Err(ClaimRejection::NothingToClaim)
        );
    }

    #[test]
    fn scenario_inactive_property_is_checked_before_amount() {
        let e = entitlement(1000, 10_000, 500).unwrap();
        assert_eq!(e, 5_000);
        let unclaimed = compute_unclaimed(e, &record(0)).unwrap();
        assert_eq!(unclaimed.amount(), 5_000);
        assert_eq!(
            validate_claim(PropertyId::new(1), unclaimed, Some(investor(0x01)), false),
            Err(ClaimRejection::PropertyInactive {
                property_id: PropertyId::new(1)
            })
        );
    }

    #[test]
    fn wallet_check_comes_first() {
        assert_eq!(
            validate_claim(PropertyId::new(1), Unclaimed::new(-1), None, false),
            Err(ClaimRejection::NotConnected)
        );
        assert_eq!(
            validate_claim(PropertyId::new(1), Unclaimed::new(-1), Some(investor(1)), false),
            Err(ClaimRejection::PropertyInactive {
                property_id: PropertyId::new(1)
            })
        );
    }

    #[test]
    fn balance_above_supply_is_reported() {
        assert!(matches!(
            entitlement(10, 1_000, 11),
            Err(DividendError::BalanceExceedsSupply { balance: 11, total_tokens: 10, .. })
        ));
    }

    #[test]
    fn full_ledger_range_amounts_do_not_overflow() {
        let pool = u128::MAX - 7;
        assert_eq!(entitlement(u64::MAX, pool, u64::MAX).unwrap(), pool);
        assert_eq!(entitlement(4, pool, 1).unwrap(), pool / 4);
    }

    #[test]
    fn seller_after_claim_goes_stale() {
        // Claimed 25_000 on 250 tokens, then sold down to 100.
        let e = entitlement(1000, 100_000, 100).unwrap();
        let unclaimed = compute_unclaimed(e, &record(25_000)).unwrap();
        assert!(unclaimed.is_stale());
        assert_eq!(unclaimed.excess(), 15_000);
    }

    #[test]
    fn difference_beyond_i128_is_an_overflow() {
        assert!(matches!(
            compute_unclaimed(u128::MAX, &record(0)),
            Err(DividendError::Overflow { .. })
        ));
        assert!(matches!(
            compute_unclaimed(0, &record(u128::MAX)),
            Err(DividendError::Overflow { .. })
        ));
        assert_eq!(
            compute_unclaimed(i128::MAX as u128, &record(0)).unwrap().amount(),
            i128::MAX
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: entitlement lies in [0, total_dividends] and never decreases as
        /// the balance grows.
        #[test]
        fn entitlement_is_bounded_and_monotonic(
            total_tokens in 1u64..=u64::MAX,
            total_dividends in any::<u128>(),
            a in any::<u64>(),
            b in any::<u64>(),
        ) {
            let lo = a.min(b) % (total_tokens.saturating_add(1).max(1));
            let hi = a.max(b).min(total_tokens).max(lo);

            let e_lo = entitlement(total_tokens, total_dividends, lo).unwrap();
            let e_hi = entitlement(total_tokens, total_dividends, hi).unwrap();

            prop_assert!(e_lo <= total_dividends);
            prop_assert!(e_hi <= total_dividends);
            prop_assert!(e_lo <= e_hi);
        }

        /// Property: holding the entire supply claims the entire pool.
        #[test]
        fn full_ownership_claims_entire_pool(
            total_tokens in 1u64..=u64::MAX,
            total_dividends in any::<u128>(),
        ) {
            prop_assert_eq!(
                entitlement(total_tokens, total_dividends, total_tokens).unwrap(),
                total_dividends
            );
        }

        /// Property: same inputs, same output.
        #[test]
        fn entitlement_is_pure(
            total_tokens in 1u64..1_000_000u64,
            total_dividends in 0u128..10u128.pow(30),
            balance in 0u64..1_000_000u64,
        ) {
            let balance = balance.min(total_tokens);
            prop_assert_eq!(
                entitlement(total_tokens, total_dividends, balance),
                entitlement(total_tokens, total_dividends, balance)
            );
        }

        /// Property: summing the floored shares of any split of the supply never
        /// distributes more than the pool.
        #[test]
        fn shares_never_over_distribute(
            balances in prop::collection::vec(0u64..10_000u64, 1..20),
            total_dividends in 0u128..10u128.pow(24),
        ) {
            let total_tokens: u64 = balances.iter().sum::<u64>().max(1);
            let distributed: u128 = balances
                .iter()
                .map(|b| entitlement(total_tokens, total_dividends, *b).unwrap())
                .sum();
            prop_assert!(distributed <= total_dividends);
        }

        /// Property: unclaimed is the exact signed difference, and a negative value
        /// never validates.
        #[test]
        fn unclaimed_is_exact_difference(
            entitlement_amount in 0u128..10u128.pow(30),
            claimed in 0u128..10u128.pow(30),
        ) {
            let unclaimed = compute_unclaimed(entitlement_amount, &record(claimed)).unwrap();
            prop_assert_eq!(unclaimed.amount(), entitlement_amount as i128 - claimed as i128);

            let verdict = validate_claim(PropertyId::new(1), unclaimed, Some(investor(1)), true);
            if unclaimed.amount() < 0 {
                let is_stale = matches!(verdict, Err(ClaimRejection::StaleEntitlement { .. }));
                prop_assert!(is_stale);
            } else if unclaimed.amount() == 0 {
                prop_assert_eq!(verdict, Err(ClaimRejection::NothingToClaim));
            } else {
                prop_assert!(verdict.is_ok());
            }
        }
    }
}
