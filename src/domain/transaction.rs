//! Transaction requests, the resulting ledger records, and position state.

use crate::domain::{Decimal, FeeSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Running position of one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionState {
    /// Net units held: positive = long, negative = short, zero = flat.
    pub quantity: Decimal,

    /// Cost basis per unit. Carried forward unchanged while flat.
    pub avg_cost: Decimal,
}

impl PositionState {
    pub fn new(quantity: Decimal, avg_cost: Decimal) -> Self {
        Self { quantity, avg_cost }
    }

    pub fn flat() -> Self {
        Self::default()
    }

    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }

    pub fn is_long(&self) -> bool {
        self.quantity.is_positive()
    }

    pub fn is_short(&self) -> bool {
        self.quantity.is_negative()
    }
}

/// A trade to apply against a ledger.
#[derive(Debug, Clone)]
pub struct TransactionRequest {
    pub timestamp: DateTime<Utc>,
    /// Signed quantity: positive buys, negative sells.
    pub quantity: Decimal,
    pub price: Decimal,
    pub fee: FeeSpec,
}

impl TransactionRequest {
    pub fn new(timestamp: DateTime<Utc>, quantity: Decimal, price: Decimal) -> Self {
        Self {
            timestamp,
            quantity,
            price,
            fee: FeeSpec::none(),
        }
    }

    pub fn with_fee(mut self, fee: impl Into<FeeSpec>) -> Self {
        self.fee = fee.into();
        self
    }
}

/// One immutable ledger row. Every record is single-directional: it never
/// moves the position through zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub timestamp: DateTime<Utc>,
    pub txn_quantity: Decimal,
    pub txn_price: Decimal,
    /// quantity × price × multiplier, gross of fees.
    pub txn_value: Decimal,
    pub txn_avg_cost: Decimal,
    pub position_quantity: Decimal,
    pub position_avg_cost: Decimal,
    pub gross_realized_pnl: Decimal,
    /// Negative for costs, positive only for rebates.
    pub txn_fees: Decimal,
    pub net_realized_pnl: Decimal,
    pub contract_multiplier: Decimal,
}

impl TransactionRecord {
    /// Position right after this record.
    pub fn position(&self) -> PositionState {
        PositionState::new(self.position_quantity, self.position_avg_cost)
    }
}
