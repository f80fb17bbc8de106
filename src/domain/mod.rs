//! Domain types for the transaction ledger.
//!
//! This module provides:
//! - Lossless numeric handling via Decimal wrapper
//! - Domain primitives: Symbol, PortfolioName, timestamp helpers
//! - Fee specifications and the rebate policy
//! - Transaction requests, ledger records and position state
//! - Columnar batch tables with CSV loading

pub mod decimal;
pub mod fee;
pub mod primitives;
pub mod table;
pub mod transaction;

pub use decimal::Decimal;
pub use fee::{FeeResolver, FeeRule, FeeSpec, NotionalBpsFee, PerUnitFee};
pub use primitives::{from_unix_nanos, parse_timestamp, to_unix_nanos, PortfolioName, Symbol};
pub use table::TransactionTable;
pub use transaction::{PositionState, TransactionRecord, TransactionRequest};
