use crate::domain::{Decimal, PortfolioName, PositionState, Symbol, TransactionRecord};
use chrono::{DateTime, Utc};

/// Append-only record store for one instrument in one portfolio.
///
/// Owns the instrument's position: the current state is always the last
/// record's resulting position, or the opening position while empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    portfolio: PortfolioName,
    symbol: Symbol,
    initialized_at: DateTime<Utc>,
    opening: PositionState,
    records: Vec<TransactionRecord>,
}

impl Ledger {
    pub fn new(portfolio: PortfolioName, symbol: Symbol, initialized_at: DateTime<Utc>) -> Self {
        Self {
            portfolio,
            symbol,
            initialized_at,
            opening: PositionState::flat(),
            records: Vec::new(),
        }
    }

    /// Start from a carried-in position instead of flat.
    pub fn with_opening_position(mut self, opening: PositionState) -> Self {
        self.opening = opening;
        self
    }

    /// Rebuild a ledger from stored records, in their stored order.
    pub(crate) fn restore(
        portfolio: PortfolioName,
        symbol: Symbol,
        initialized_at: DateTime<Utc>,
        opening: PositionState,
        records: Vec<TransactionRecord>,
    ) -> Self {
        Self {
            portfolio,
            symbol,
            initialized_at,
            opening,
            records,
        }
    }

    pub fn portfolio(&self) -> &PortfolioName {
        &self.portfolio
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn initialized_at(&self) -> DateTime<Utc> {
        self.initialized_at
    }

    pub fn opening_position(&self) -> PositionState {
        self.opening
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Timestamp every new record must exceed: the first record's, or the
    /// initialization time while the ledger is empty.
    pub fn first_timestamp(&self) -> DateTime<Utc> {
        self.records
            .first()
            .map(|r| r.timestamp)
            .unwrap_or(self.initialized_at)
    }

    /// Timestamp of the most recent record; new records must be later.
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.records.last().map(|r| r.timestamp)
    }

    pub fn position(&self) -> PositionState {
        self.records
            .last()
            .map(TransactionRecord::position)
            .unwrap_or(self.opening)
    }

    /// Position after every record stamped at or before `as_of`.
    pub fn position_as_of(&self, as_of: DateTime<Utc>) -> PositionState {
        let idx = self.records.partition_point(|r| r.timestamp <= as_of);
        if idx == 0 {
            self.opening
        } else {
            self.records[idx - 1].position()
        }
    }

    pub fn position_quantity(&self, as_of: DateTime<Utc>) -> Decimal {
        self.position_as_of(as_of).quantity
    }

    pub fn position_avg_cost(&self, as_of: DateTime<Utc>) -> Decimal {
        self.position_as_of(as_of).avg_cost
    }

    /// Records with `from <= timestamp <= to`.
    pub fn records_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> &[TransactionRecord] {
        let start = self.records.partition_point(|r| r.timestamp < from);
        let end = self.records.partition_point(|r| r.timestamp <= to);
        if start >= end {
            &[]
        } else {
            &self.records[start..end]
        }
    }

    pub fn net_realized_pnl(&self) -> Decimal {
        self.records.iter().map(|r| r.net_realized_pnl).sum()
    }

    pub fn total_fees(&self) -> Decimal {
        self.records.iter().map(|r| r.txn_fees).sum()
    }

    /// Callers have checked that `records` are strictly after the last one.
    pub(crate) fn append(&mut self, records: Vec<TransactionRecord>) {
        debug_assert!(self
            .last_timestamp()
            .into_iter()
            .chain(records.iter().map(|r| r.timestamp))
            .collect::<Vec<_>>()
            .windows(2)
            .all(|w| w[0] < w[1]));
        self.records.extend(records);
    }
}
