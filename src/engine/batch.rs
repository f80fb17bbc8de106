//! Bulk application of an ordered transaction table.
//!
//! The batch is processed column-wise: fees are validated up front, the
//! running position is derived from one cumulative sum over the quantity
//! column, crossing rows are flagged from that series and expanded, and
//! a single forward pass settles the expanded legs. The per-row math is
//! [`calc::settle_leg`], the same function the single path uses, so both
//! paths produce identical records.

use super::calc::{self, checked};
use super::{Leg, ZeroCrossSplitter};
use crate::domain::{
    table::{PRICE_COLUMN, QUANTITY_COLUMN},
    Decimal, FeeResolver, PositionState, Symbol, TransactionRecord, TransactionTable,
};
use crate::error::{LedgerError, LedgerWarning};
use chrono::Duration;
use tracing::warn;

/// Result of a batch: the derived records, the final position and any
/// non-fatal conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutput {
    pub records: Vec<TransactionRecord>,
    pub final_state: PositionState,
    pub warnings: Vec<LedgerWarning>,
}

pub struct BatchTransactionProcessor;

impl BatchTransactionProcessor {
    /// Apply `table` on top of `initial`.
    ///
    /// A table without a quantity or price column produces no records and a
    /// [`LedgerWarning::MissingColumn`] per absent column, leaving the
    /// position at `initial`. Rows are not settled with placeholder values:
    /// [`Decimal`] has no undefined value to carry through the ledger. A
    /// missing fee column means zero fees.
    ///
    /// # Errors
    /// Fails without producing anything if the table is malformed, a row is
    /// not after the previous row's re-open leg, any fee is a disallowed
    /// rebate, or the arithmetic overflows.
    pub fn process(
        initial: PositionState,
        table: &TransactionTable,
        symbol: &Symbol,
        multiplier: Decimal,
        allow_rebates: bool,
        eps: Duration,
    ) -> Result<BatchOutput, LedgerError> {
        table.validate()?;

        let mut warnings = Vec::new();
        for (name, present) in [
            (QUANTITY_COLUMN, table.quantity.is_some()),
            (PRICE_COLUMN, table.price.is_some()),
        ] {
            if !present {
                warn!(symbol = %symbol, column = name, "batch column missing");
                warnings.push(LedgerWarning::MissingColumn {
                    symbol: symbol.clone(),
                    column: name.to_string(),
                });
            }
        }
        let (Some(quantity), Some(price)) = (&table.quantity, &table.price) else {
            return Ok(BatchOutput {
                records: Vec::new(),
                final_state: initial,
                warnings,
            });
        };

        let fees = table
            .fees
            .clone()
            .unwrap_or_else(|| vec![Decimal::zero(); table.len()]);
        if let Some(fee) = fees.iter().find(|fee| fee.is_positive()) {
            FeeResolver::check_policy(*fee, symbol, allow_rebates)?;
        }

        // Position before each row.
        let mut prev_positions = Vec::with_capacity(table.len());
        let mut cum = initial.quantity;
        for qty in quantity {
            prev_positions.push(cum);
            cum = checked(cum.checked_add(*qty), "position quantity")?;
        }

        let crossing: Vec<bool> = prev_positions
            .iter()
            .zip(quantity)
            .map(|(prev, qty)| ZeroCrossSplitter::crosses_zero(*prev, *qty))
            .collect();

        // A crossing row's re-open leg must stay ahead of the next row.
        for (row, pair) in table.timestamps.windows(2).enumerate() {
            if crossing[row] {
                let reopen = ZeroCrossSplitter::reopen_time(pair[0], eps).ok_or(
                    LedgerError::ArithmeticOverflow {
                        operation: "re-open timestamp",
                    },
                )?;
                if pair[1] <= reopen {
                    return Err(LedgerError::UnorderedBatch { row: row + 1 });
                }
            }
        }

        let legs: Vec<Leg> = (0..table.len())
            .map(|i| {
                let leg = Leg {
                    timestamp: table.timestamps[i],
                    quantity: quantity[i],
                    price: price[i],
                    fee: fees[i],
                };
                if crossing[i] {
                    let (flatten, reopen) = ZeroCrossSplitter::split(prev_positions[i], &leg, eps)?;
                    Ok(vec![flatten, reopen])
                } else {
                    Ok(vec![leg])
                }
            })
            .collect::<Result<Vec<_>, LedgerError>>()?
            .into_iter()
            .flatten()
            .collect();

        let mut state = initial;
        let records = legs
            .iter()
            .map(|leg| {
                let record = calc::settle_leg(&state, leg, multiplier)?;
                state = record.position();
                Ok(record)
            })
            .collect::<Result<Vec<TransactionRecord>, LedgerError>>()?;

        Ok(BatchOutput {
            records,
            final_state: state,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parse_timestamp;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn ts(s: &str) -> chrono::DateTime<chrono::Utc> {
        parse_timestamp(s).unwrap()
    }

    fn eps() -> Duration {
        Duration::microseconds(1)
    }

    #[test]
    fn test_batch_expands_crossing_rows() {
        let table = TransactionTable::from_rows(vec![
            (ts("2024-01-02T10:00:00Z"), d("100"), d("10"), d("0")),
            (ts("2024-01-02T11:00:00Z"), d("-150"), d("12"), d("-3")),
            (ts("2024-01-02T12:00:00Z"), d("20"), d("11"), d("0")),
        ]);

        let out = BatchTransactionProcessor::process(
            PositionState::flat(),
            &table,
            &Symbol::new("ES"),
            d("1"),
            false,
            eps(),
        )
        .unwrap();

        assert_eq!(out.records.len(), 4);
        assert_eq!(out.records[1].txn_quantity, d("-100"));
        assert_eq!(out.records[1].txn_fees, d("-2"));
        assert_eq!(out.records[1].gross_realized_pnl, d("200"));
        assert_eq!(out.records[2].txn_quantity, d("-50"));
        assert_eq!(out.records[2].timestamp, ts("2024-01-02T11:00:00.000002Z"));
        assert_eq!(out.records[3].gross_realized_pnl, d("20"));
        assert_eq!(out.final_state, PositionState::new(d("-30"), d("12")));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_batch_first_row_crossing_uses_initial_position() {
        let table = TransactionTable::from_rows(vec![(
            ts("2024-01-02T10:00:00Z"),
            d("-15"),
            d("12"),
            d("0"),
        )]);

        let out = BatchTransactionProcessor::process(
            PositionState::new(d("10"), d("10")),
            &table,
            &Symbol::new("ES"),
            d("1"),
            false,
            eps(),
        )
        .unwrap();

        assert_eq!(out.records.len(), 2);
        assert_eq!(out.final_state, PositionState::new(d("-5"), d("12")));
    }

    #[test]
    fn test_batch_missing_fee_column_means_zero_fees() {
        let table = TransactionTable::new(vec![ts("2024-01-02")])
            .with_quantity(vec![d("3")])
            .with_price(vec![d("7")]);

        let out = BatchTransactionProcessor::process(
            PositionState::flat(),
            &table,
            &Symbol::new("ES"),
            d("1"),
            false,
            eps(),
        )
        .unwrap();
        assert_eq!(out.records[0].txn_fees, Decimal::zero());
    }

    #[test]
    fn test_batch_missing_price_warns_and_produces_nothing() {
        let table = TransactionTable::new(vec![ts("2024-01-02")]).with_quantity(vec![d("3")]);
        let start = PositionState::new(d("1"), d("5"));

        let out = BatchTransactionProcessor::process(
            start,
            &table,
            &Symbol::new("ES"),
            d("1"),
            false,
            eps(),
        )
        .unwrap();

        assert!(out.records.is_empty());
        assert_eq!(out.final_state, start);
        assert_eq!(
            out.warnings,
            vec![LedgerWarning::MissingColumn {
                symbol: Symbol::new("ES"),
                column: "price".to_string(),
            }]
        );
    }

    #[test]
    fn test_batch_rebate_fails_whole_batch() {
        let table = TransactionTable::from_rows(vec![
            (ts("2024-01-02T10:00:00Z"), d("1"), d("10"), d("-1")),
            (ts("2024-01-02T11:00:00Z"), d("1"), d("10"), d("0.5")),
        ]);

        let result = BatchTransactionProcessor::process(
            PositionState::flat(),
            &table,
            &Symbol::new("ES"),
            d("1"),
            false,
            eps(),
        );
        assert!(matches!(result, Err(LedgerError::FeePolicyViolation { .. })));

        let allowed = BatchTransactionProcessor::process(
            PositionState::flat(),
            &table,
            &Symbol::new("ES"),
            d("1"),
            true,
            eps(),
        )
        .unwrap();
        assert_eq!(allowed.records[1].txn_fees, d("0.5"));
    }

    #[test]
    fn test_batch_rejects_row_inside_reopen_window() {
        let crossing = ts("2024-01-02T11:00:00Z");
        for gap in [Duration::nanoseconds(1), eps(), eps() * 2] {
            let table = TransactionTable::from_rows(vec![
                (ts("2024-01-02T10:00:00Z"), d("100"), d("10"), d("0")),
                (crossing, d("-150"), d("12"), d("0")),
                (crossing + gap, d("5"), d("11"), d("0")),
            ]);

            let result = BatchTransactionProcessor::process(
                PositionState::flat(),
                &table,
                &Symbol::new("ES"),
                d("1"),
                false,
                eps(),
            );
            assert!(
                matches!(result, Err(LedgerError::UnorderedBatch { row: 2 })),
                "gap {:?} accepted",
                gap
            );
        }
    }

    #[test]
    fn test_batch_rejects_equal_timestamps() {
        let at = ts("2024-01-02T11:00:00Z");
        let table = TransactionTable::from_rows(vec![
            (at, d("100"), d("10"), d("0")),
            (at, d("-150"), d("12"), d("0")),
            (at, d("5"), d("11"), d("0")),
        ]);

        let result = BatchTransactionProcessor::process(
            PositionState::flat(),
            &table,
            &Symbol::new("ES"),
            d("1"),
            false,
            eps(),
        );
        assert!(matches!(result, Err(LedgerError::UnorderedBatch { row: 1 })));
    }

    #[test]
    fn test_batch_accepts_row_after_reopen_window() {
        let crossing = ts("2024-01-02T11:00:00Z");
        let table = TransactionTable::from_rows(vec![
            (ts("2024-01-02T10:00:00Z"), d("100"), d("10"), d("0")),
            (crossing, d("-150"), d("12"), d("0")),
            (crossing + eps() * 3, d("5"), d("11"), d("0")),
        ]);

        let out = BatchTransactionProcessor::process(
            PositionState::flat(),
            &table,
            &Symbol::new("ES"),
            d("1"),
            false,
            eps(),
        )
        .unwrap();
        let stamps: Vec<_> = out.records.iter().map(|r| r.timestamp).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(out.final_state, PositionState::new(d("-45"), d("12")));
    }

    #[test]
    fn test_batch_overflow_is_an_error() {
        let table = TransactionTable::from_rows(vec![(
            ts("2024-01-02"),
            d("1000000000000000"),
            d("100000000000000"),
            d("0"),
        )]);

        let result = BatchTransactionProcessor::process(
            PositionState::flat(),
            &table,
            &Symbol::new("ES"),
            d("1"),
            false,
            eps(),
        );
        assert!(matches!(result, Err(LedgerError::ArithmeticOverflow { .. })));
    }
}
