//! Decomposition of zero-crossing trades into a flattening and a re-opening leg.

use super::calc::checked;
use super::Leg;
use crate::domain::Decimal;
use crate::error::LedgerError;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

pub struct ZeroCrossSplitter;

impl ZeroCrossSplitter {
    /// Check whether applying `txn_qty` to `prev_qty` flips the position's sign.
    ///
    /// Landing exactly on zero is a plain close, not a crossing.
    pub fn crosses_zero(prev_qty: Decimal, txn_qty: Decimal) -> bool {
        if prev_qty.is_zero() {
            return false;
        }
        // An overflowing sum is left to settlement to report.
        match prev_qty.checked_add(txn_qty) {
            Some(new_qty) => !new_qty.is_zero() && new_qty.signum() != prev_qty.signum(),
            None => false,
        }
    }

    /// Split a crossing leg into (flatten, re-open).
    ///
    /// Fees are pro-rated by each leg's share of the original quantity. The
    /// re-open leg is stamped `2 * eps` after the original so the two records
    /// stay strictly ordered.
    ///
    /// # Errors
    /// [`LedgerError::ArithmeticOverflow`] if the fee share or the re-open
    /// timestamp cannot be represented.
    pub fn split(
        prev_qty: Decimal,
        leg: &Leg,
        eps: Duration,
    ) -> Result<(Leg, Leg), LedgerError> {
        let total = leg.quantity.abs();
        let flatten_qty = -prev_qty;
        let reopen_qty = checked(leg.quantity.checked_add(prev_qty), "re-open quantity")?;

        let flatten = Leg {
            timestamp: leg.timestamp,
            quantity: flatten_qty,
            price: leg.price,
            fee: prorate(leg.fee, flatten_qty, total)?,
        };
        let reopen = Leg {
            timestamp: Self::reopen_time(leg.timestamp, eps).ok_or(
                LedgerError::ArithmeticOverflow {
                    operation: "re-open timestamp",
                },
            )?,
            quantity: reopen_qty,
            price: leg.price,
            fee: prorate(leg.fee, reopen_qty, total)?,
        };

        debug!(
            prev_qty = %prev_qty,
            txn_qty = %leg.quantity,
            flatten_qty = %flatten_qty,
            reopen_qty = %reopen_qty,
            "splitting zero-crossing transaction"
        );

        Ok((flatten, reopen))
    }

    /// When the re-open leg of a crossing at `timestamp` is stamped.
    pub fn reopen_time(timestamp: DateTime<Utc>, eps: Duration) -> Option<DateTime<Utc>> {
        eps.checked_add(&eps).and_then(|offset| timestamp.checked_add_signed(offset))
    }

    /// The legs to settle for `leg` given the position before it: the leg
    /// itself, or its flatten/re-open pair.
    ///
    /// # Errors
    /// Propagates [`split`](Self::split) failures.
    pub fn decompose(
        prev_qty: Decimal,
        leg: Leg,
        eps: Duration,
    ) -> Result<Vec<Leg>, LedgerError> {
        if Self::crosses_zero(prev_qty, leg.quantity) {
            let (flatten, reopen) = Self::split(prev_qty, &leg, eps)?;
            Ok(vec![flatten, reopen])
        } else {
            Ok(vec![leg])
        }
    }
}

fn prorate(fee: Decimal, part: Decimal, total: Decimal) -> Result<Decimal, LedgerError> {
    checked(
        fee.checked_mul(part.abs()).and_then(|scaled| scaled.checked_div(total)),
        "split fee",
    )
}
