//! Per-row accounting shared by the single and batch processors.

use super::Leg;
use crate::domain::{Decimal, PositionState, TransactionRecord};
use crate::error::LedgerError;

/// True when the leg opens a position from flat or grows it in its own direction.
///
/// These are exactly the legs that blend into the average cost and realize nothing.
pub fn is_opening(prev_qty: Decimal, new_qty: Decimal) -> bool {
    prev_qty.is_zero() || new_qty.abs() > prev_qty.abs()
}

/// Settle one single-directional leg against the previous position.
///
/// The leg must not cross zero; split it with
/// [`ZeroCrossSplitter`](super::ZeroCrossSplitter) first.
///
/// # Errors
/// [`LedgerError::ArithmeticOverflow`] if any intermediate value leaves the
/// decimal range.
pub fn settle_leg(
    prev: &PositionState,
    leg: &Leg,
    multiplier: Decimal,
) -> Result<TransactionRecord, LedgerError> {
    let units = checked(leg.quantity.checked_mul(multiplier), "transaction units")?;
    let value = checked(units.checked_mul(leg.price), "transaction value")?;
    let txn_avg_cost = if units.is_zero() {
        leg.price
    } else {
        checked(value.checked_div(units), "transaction average cost")?
    };

    let new_qty = checked(prev.quantity.checked_add(leg.quantity), "position quantity")?;
    let opening = is_opening(prev.quantity, new_qty);

    let position_avg_cost = if !opening {
        prev.avg_cost
    } else if new_qty.is_zero() {
        Decimal::zero()
    } else {
        let basis = prev
            .quantity
            .checked_mul(prev.avg_cost)
            .zip(leg.quantity.checked_mul(txn_avg_cost))
            .and_then(|(held, added)| held.checked_add(added));
        checked(
            basis.and_then(|basis| basis.checked_div(new_qty)),
            "position average cost",
        )?
    };

    let gross_realized_pnl = if opening {
        Decimal::zero()
    } else {
        checked(
            prev.avg_cost
                .checked_sub(txn_avg_cost)
                .and_then(|diff| units.checked_mul(diff)),
            "realized P&L",
        )?
    };
    let net_realized_pnl = checked(
        gross_realized_pnl.checked_add(leg.fee),
        "net realized P&L",
    )?;

    Ok(TransactionRecord {
        timestamp: leg.timestamp,
        txn_quantity: leg.quantity,
        txn_price: leg.price,
        txn_value: value,
        txn_avg_cost,
        position_quantity: new_qty,
        position_avg_cost,
        gross_realized_pnl,
        txn_fees: leg.fee,
        net_realized_pnl,
        contract_multiplier: multiplier,
    })
}

/// Turn a failed checked operation into an overflow error naming the quantity.
pub(crate) fn checked(
    value: Option<Decimal>,
    operation: &'static str,
) -> Result<Decimal, LedgerError> {
    value.ok_or(LedgerError::ArithmeticOverflow { operation })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parse_timestamp;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn leg(qty: &str, px: &str, fee: &str) -> Leg {
        Leg {
            timestamp: parse_timestamp("2024-01-02T10:00:00Z").unwrap(),
            quantity: d(qty),
            price: d(px),
            fee: d(fee),
        }
    }

    #[test]
    fn test_open_from_flat() {
        let rec = settle_leg(&PositionState::flat(), &leg("100", "10", "-1"), d("1")).unwrap();
        assert_eq!(rec.txn_value, d("1000"));
        assert_eq!(rec.txn_avg_cost, d("10"));
        assert_eq!(rec.position_quantity, d("100"));
        assert_eq!(rec.position_avg_cost, d("10"));
        assert_eq!(rec.gross_realized_pnl, Decimal::zero());
        assert_eq!(rec.net_realized_pnl, d("-1"));
    }

    #[test]
    fn test_add_to_long_blends_cost() {
        let prev = PositionState::new(d("100"), d("10"));
        let rec = settle_leg(&prev, &leg("100", "12", "0"), d("1")).unwrap();
        assert_eq!(rec.position_quantity, d("200"));
        assert_eq!(rec.position_avg_cost, d("11"));
        assert_eq!(rec.gross_realized_pnl, Decimal::zero());
    }

    #[test]
    fn test_add_to_short_blends_cost() {
        let prev = PositionState::new(d("-2"), d("100"));
        let rec = settle_leg(&prev, &leg("-2", "90", "0"), d("1")).unwrap();
        assert_eq!(rec.position_quantity, d("-4"));
        assert_eq!(rec.position_avg_cost, d("95"));
    }

    #[test]
    fn test_partial_close_carries_cost_and_realizes() {
        let prev = PositionState::new(d("100"), d("10"));
        let rec = settle_leg(&prev, &leg("-40", "12", "0"), d("1")).unwrap();
        assert_eq!(rec.position_quantity, d("60"));
        assert_eq!(rec.position_avg_cost, d("10"));
        // Sign convention: quantity × multiplier × (avg cost − price).
        assert_eq!(rec.gross_realized_pnl, d("-40") * (d("10") - d("12")));
        assert_eq!(rec.gross_realized_pnl, d("80"));
    }

    #[test]
    fn test_close_short_realizes_with_multiplier() {
        let prev = PositionState::new(d("-3"), d("4000"));
        let rec = settle_leg(&prev, &leg("3", "3990", "-6"), d("50")).unwrap();
        assert_eq!(rec.txn_value, d("598500"));
        assert_eq!(rec.position_quantity, Decimal::zero());
        assert_eq!(rec.position_avg_cost, d("4000"));
        assert_eq!(rec.gross_realized_pnl, d("1500"));
        assert_eq!(rec.net_realized_pnl, d("1494"));
        assert_eq!(rec.contract_multiplier, d("50"));
    }

    #[test]
    fn test_zero_quantity_leg_is_harmless() {
        let rec = settle_leg(&PositionState::flat(), &leg("0", "10", "0"), d("1")).unwrap();
        assert_eq!(rec.txn_avg_cost, d("10"));
        assert_eq!(rec.position_quantity, Decimal::zero());
        assert_eq!(rec.position_avg_cost, Decimal::zero());
        assert_eq!(rec.gross_realized_pnl, Decimal::zero());
    }

    #[test]
    fn test_overflow_is_an_error() {
        let err = settle_leg(
            &PositionState::flat(),
            &leg("1000000000000000", "100000000000000", "0"),
            d("1"),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::ArithmeticOverflow {
                operation: "transaction value"
            }
        ));
    }
}
