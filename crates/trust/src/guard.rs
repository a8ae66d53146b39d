//! Distribution safety checks.

use tracing::debug;

use propledger_core::Money;

use crate::balance::{PropertyBalance, TrustScope};
use crate::error::TrustError;

/// The amount that may safely leave the scope right now.
///
/// Settled cash minus every obligation the scope must still cover, clamped
/// at zero. Pending (unsettled) cash never counts toward distribution.
pub fn distributable(balance: &PropertyBalance) -> Money {
    let uncommitted = balance.cash_settled
        - balance.reserve_required
        - balance.pending_bills
        - balance.security_deposits_held
        - balance.prepaid_rent_liability;

    uncommitted.max(Money::ZERO)
}

/// Check a requested distribution against the scope's balance.
///
/// A scope whose settled cash is negative blocks every distribution,
/// whatever the requested amount; otherwise the request must not exceed
/// [`distributable`]. Errors carry the computed ceiling so callers can
/// surface it.
pub fn validate_distribution(
    requested: Money,
    balance: &PropertyBalance,
) -> Result<(), TrustError> {
    if requested <= Money::ZERO {
        return Err(TrustError::NonPositiveAmount { requested });
    }

    if balance.cash_settled.is_negative() {
        return Err(TrustError::NegativeScopeBalance {
            cash_settled: balance.cash_settled,
        });
    }

    let ceiling = distributable(balance);
    if requested > ceiling {
        return Err(TrustError::InsufficientDistributable {
            requested,
            distributable: ceiling,
        });
    }

    debug!(%requested, %ceiling, "distribution validated");
    Ok(())
}

/// Funds scoped to one property/owner may never satisfy an obligation of
/// another scope.
pub fn validate_cross_scope_transfer(
    source: TrustScope,
    target: TrustScope,
) -> Result<(), TrustError> {
    if source != target {
        return Err(TrustError::Commingle { source, target });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    use propledger_core::{OwnerId, PropertyId};

    fn money(s: &str) -> Money {
        s.parse().unwrap()
    }

    fn balance(settled: &str) -> PropertyBalance {
        PropertyBalance {
            cash_settled: money(settled),
            ..PropertyBalance::default()
        }
    }

    #[test]
    fn settled_minus_reserve_is_distributable() {
        let view = PropertyBalance {
            cash_settled: money("1000.00"),
            reserve_required: money("300.00"),
            ..PropertyBalance::default()
        };

        assert_eq!(distributable(&view), money("700.00"));
    }

    #[test]
    fn distributable_clamps_at_zero() {
        let view = PropertyBalance {
            cash_settled: money("100.00"),
            pending_bills: money("250.00"),
            ..PropertyBalance::default()
        };

        assert_eq!(distributable(&view), Money::ZERO);
    }

    #[test]
    fn pending_cash_never_counts() {
        let view = PropertyBalance {
            cash_settled: money("50.00"),
            cash_pending: money("5000.00"),
            ..PropertyBalance::default()
        };

        assert_eq!(distributable(&view), money("50.00"));
    }

    #[test]
    fn negative_settled_cash_blocks_any_request() {
        let err = validate_distribution(money("0.01"), &balance("-10.00")).unwrap_err();
        assert!(matches!(err, TrustError::NegativeScopeBalance { .. }));
    }

    #[test]
    fn over_distribution_reports_the_ceiling() {
        let view = PropertyBalance {
            cash_settled: money("1000.00"),
            security_deposits_held: money("400.00"),
            ..PropertyBalance::default()
        };

        let err = validate_distribution(money("601.00"), &view).unwrap_err();
        match err {
            TrustError::InsufficientDistributable {
                requested,
                distributable,
            } => {
                assert_eq!(requested, money("601.00"));
                assert_eq!(distributable, money("600.00"));
            }
            other => panic!("expected InsufficientDistributable, got {other:?}"),
        }

        // Exactly the ceiling is fine.
        validate_distribution(money("600.00"), &view).unwrap();
    }

    #[test]
    fn non_positive_requests_are_rejected() {
        assert!(matches!(
            validate_distribution(Money::ZERO, &balance("100.00")),
            Err(TrustError::NonPositiveAmount { .. })
        ));
        assert!(matches!(
            validate_distribution(money("-5.00"), &balance("100.00")),
            Err(TrustError::NonPositiveAmount { .. })
        ));
    }

    #[test]
    fn transfers_between_scopes_commingle() {
        let property_a = TrustScope::Property(PropertyId::new());
        let property_b = TrustScope::Property(PropertyId::new());
        let owner = TrustScope::Owner(OwnerId::new());

        validate_cross_scope_transfer(property_a, property_a).unwrap();

        assert!(matches!(
            validate_cross_scope_transfer(property_b, property_a),
            Err(TrustError::Commingle { source, target })
                if source == property_b && target == property_a
        ));
        assert!(matches!(
            validate_cross_scope_transfer(property_a, owner),
            Err(TrustError::Commingle { .. })
        ));
    }

    proptest! {
        /// Distributable never goes negative and never increases when an
        /// obligation component grows.
        #[test]
        fn distributable_is_nonnegative_and_monotone(
            settled in -500_000i64..500_000i64,
            reserve in 0i64..200_000i64,
            extra in 1i64..100_000i64,
        ) {
            let base = PropertyBalance {
                cash_settled: Money::new(Decimal::new(settled, 2)),
                reserve_required: Money::new(Decimal::new(reserve, 2)),
                ..PropertyBalance::default()
            };
            let tighter = PropertyBalance {
                reserve_required: Money::new(Decimal::new(reserve + extra, 2)),
                ..base
            };

            prop_assert!(distributable(&base) >= Money::ZERO);
            prop_assert!(distributable(&tighter) <= distributable(&base));
        }
    }
}
