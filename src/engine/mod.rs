//! Pure computation engine for position, average cost and realized P&L.
//!
//! Nothing here touches a ledger or performs IO: processors take a starting
//! position and return records, leaving the append to the caller.

use crate::domain::Decimal;
use chrono::{DateTime, Utc};

pub mod batch;
pub mod calc;
pub mod single;
pub mod splitter;

pub use batch::{BatchOutput, BatchTransactionProcessor};
pub use calc::settle_leg;
pub use single::SingleTransactionProcessor;
pub use splitter::ZeroCrossSplitter;

/// A single-directional slice of a transaction with its fee already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leg {
    pub timestamp: DateTime<Utc>,
    pub quantity: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
}
