//! Property tests: bulk application of a table must produce exactly the
//! records that applying its rows one at a time produces.

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use tradeledger::domain::parse_timestamp;
use tradeledger::{
    apply_transaction, apply_transaction_batch, ApplyOptions, Decimal, Ledger, PortfolioName,
    PositionState, StaticInstrumentRegistry, Symbol, TransactionRequest, TransactionTable,
};

fn base_time() -> DateTime<Utc> {
    parse_timestamp("2024-01-02T00:00:00Z").unwrap()
}

fn ledger(opening: PositionState) -> Ledger {
    Ledger::new(
        PortfolioName::new("prop"),
        Symbol::new("CL"),
        parse_timestamp("1950-01-01").unwrap(),
    )
    .with_opening_position(opening)
}

/// Signed quantities in hundredths, zero included.
fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (-50_000i64..=50_000).prop_map(|q| Decimal::from_i64(q) / Decimal::from_i64(100))
}

fn price_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=100_000).prop_map(|p| Decimal::from_i64(p) / Decimal::from_i64(100))
}

fn fee_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=500).prop_map(|f| -Decimal::from_i64(f) / Decimal::from_i64(100))
}

fn rows_strategy() -> impl Strategy<Value = Vec<(i64, Decimal, Decimal, Decimal)>> {
    prop::collection::vec(
        (1i64..=3_600, quantity_strategy(), price_strategy(), fee_strategy()),
        1..40,
    )
}

/// Gaps between rows in nanoseconds: repeats, steps of one to three `eps`
/// (inside and just past a split's re-open window), or whole seconds.
fn gap_strategy() -> impl Strategy<Value = i64> {
    let eps = ApplyOptions::default().eps.num_nanoseconds().unwrap_or(1_000);
    prop_oneof![
        Just(0),
        Just(eps),
        Just(eps * 2),
        Just(eps * 3),
        (1i64..=3_600).prop_map(|s| s * 1_000_000_000),
    ]
}

fn dense_rows_strategy() -> impl Strategy<Value = Vec<(i64, Decimal, Decimal, Decimal)>> {
    prop::collection::vec(
        (gap_strategy(), quantity_strategy(), price_strategy(), fee_strategy()),
        1..40,
    )
}

/// Turn gaps (seconds) into strictly increasing timestamps.
fn to_rows(
    raw: Vec<(i64, Decimal, Decimal, Decimal)>,
) -> Vec<(DateTime<Utc>, Decimal, Decimal, Decimal)> {
    let nanos = raw
        .into_iter()
        .map(|(gap, qty, px, fee)| (gap * 1_000_000_000, qty, px, fee))
        .collect();
    to_rows_ns(nanos)
}

/// Turn gaps (nanoseconds) into non-decreasing timestamps.
fn to_rows_ns(
    raw: Vec<(i64, Decimal, Decimal, Decimal)>,
) -> Vec<(DateTime<Utc>, Decimal, Decimal, Decimal)> {
    // First row sits one second in so it is after the ledger start.
    let mut at = base_time();
    raw.into_iter()
        .enumerate()
        .map(|(i, (gap, qty, px, fee))| {
            at += Duration::nanoseconds(if i == 0 { 1_000_000_000 } else { gap });
            (at, qty, px, fee)
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn batch_equals_sequential(
        raw in rows_strategy(),
        opening_qty in quantity_strategy(),
        opening_px in price_strategy(),
        multiplier in prop_oneof![Just(1i64), Just(50i64), Just(1000i64)],
    ) {
        let opening = if opening_qty.is_zero() {
            PositionState::flat()
        } else {
            PositionState::new(opening_qty, opening_px)
        };
        let registry = StaticInstrumentRegistry::new()
            .with_instrument(Symbol::new("CL"), Decimal::from_i64(multiplier));
        let options = ApplyOptions::default();
        let rows = to_rows(raw);

        let mut sequential = ledger(opening);
        for (at, qty, px, fee) in &rows {
            let request = TransactionRequest::new(*at, *qty, *px).with_fee(*fee);
            apply_transaction(&mut sequential, &registry, &request, &options).unwrap();
        }

        let mut batched = ledger(opening);
        let table = TransactionTable::from_rows(rows);
        apply_transaction_batch(&mut batched, &registry, &table, &options).unwrap();

        prop_assert_eq!(batched.records(), sequential.records());
        prop_assert_eq!(batched.position(), sequential.position());
    }

    /// Rows packed inside a split's re-open window, or sharing a timestamp,
    /// are refused by both paths alike; everything else matches record for
    /// record and the ledger stays in time order.
    #[test]
    fn batch_and_sequential_agree_on_dense_timestamps(raw in dense_rows_strategy()) {
        let registry = StaticInstrumentRegistry::new()
            .with_instrument(Symbol::new("CL"), Decimal::one());
        let options = ApplyOptions::default();
        let rows = to_rows_ns(raw);

        let mut sequential = ledger(PositionState::flat());
        let mut sequential_failed = false;
        for (at, qty, px, fee) in &rows {
            let request = TransactionRequest::new(*at, *qty, *px).with_fee(*fee);
            if apply_transaction(&mut sequential, &registry, &request, &options).is_err() {
                sequential_failed = true;
                break;
            }
        }

        let mut batched = ledger(PositionState::flat());
        let table = TransactionTable::from_rows(rows);
        let batch_result = apply_transaction_batch(&mut batched, &registry, &table, &options);

        prop_assert_eq!(batch_result.is_err(), sequential_failed);
        if sequential_failed {
            prop_assert!(batched.is_empty());
        } else {
            prop_assert_eq!(batched.records(), sequential.records());
        }
        for book in [&batched, &sequential] {
            prop_assert!(book.records().windows(2).all(|w| w[0].timestamp < w[1].timestamp));
            let net: Decimal = book.records().iter().map(|r| r.txn_quantity).sum();
            prop_assert_eq!(net, book.position().quantity);
        }
    }

    #[test]
    fn every_record_is_single_directional(raw in rows_strategy()) {
        let registry = StaticInstrumentRegistry::new()
            .with_instrument(Symbol::new("CL"), Decimal::one());
        let mut book = ledger(PositionState::flat());
        let table = TransactionTable::from_rows(to_rows(raw));
        apply_transaction_batch(&mut book, &registry, &table, &ApplyOptions::default()).unwrap();

        let mut prev = Decimal::zero();
        for record in book.records() {
            let next = record.position_quantity;
            prop_assert!(
                prev.is_zero() || next.is_zero() || prev.signum() == next.signum(),
                "record flips {} -> {}", prev, next
            );
            prev = next;
        }
    }

    #[test]
    fn split_preserves_quantity_and_fees(raw in rows_strategy()) {
        let registry = StaticInstrumentRegistry::new()
            .with_instrument(Symbol::new("CL"), Decimal::one());
        let rows = to_rows(raw);
        let total_qty: Decimal = rows.iter().map(|(_, q, _, _)| *q).sum();
        let total_fee: Decimal = rows.iter().map(|(_, _, _, f)| *f).sum();

        let mut book = ledger(PositionState::flat());
        let table = TransactionTable::from_rows(rows);
        apply_transaction_batch(&mut book, &registry, &table, &ApplyOptions::default()).unwrap();

        prop_assert_eq!(book.position().quantity, total_qty);
        let fee_drift = (book.total_fees() - total_fee).abs();
        prop_assert!(fee_drift < Decimal::from_str_canonical("0.000000000001").unwrap());
    }
}
