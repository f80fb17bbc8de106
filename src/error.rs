use crate::domain::{Decimal, Symbol};
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

/// Fatal errors. When one is returned nothing has been appended.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Fee policy violation for {symbol}: fee {fee} is positive and rebates are not allowed")]
    FeePolicyViolation { symbol: Symbol, fee: Decimal },
    #[error("Column {column} has {actual} values, expected {expected}")]
    ColumnLengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
    #[error("Batch is not in chronological order at row {row}")]
    UnorderedBatch { row: usize },
    #[error(
        "Transaction for {symbol} at {} is not after the last ledger record at {}",
        .timestamp.to_rfc3339(),
        .last.to_rfc3339()
    )]
    OutOfOrder {
        symbol: Symbol,
        timestamp: DateTime<Utc>,
        last: DateTime<Utc>,
    },
    #[error("Arithmetic overflow computing {operation}")]
    ArithmeticOverflow { operation: &'static str },
    #[error("Invalid row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Non-fatal conditions reported alongside a successful application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerWarning {
    /// No contract multiplier could be resolved; 1 was used.
    InstrumentResolution { symbol: Symbol },
    /// A new record is not later than the ledger's first timestamp.
    TimestampOrdering {
        symbol: Symbol,
        timestamp: DateTime<Utc>,
        first: DateTime<Utc>,
    },
    /// A batch column was absent.
    MissingColumn { symbol: Symbol, column: String },
}

impl fmt::Display for LedgerWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerWarning::InstrumentResolution { symbol } => write!(
                f,
                "instrument {} not found, using contract multiplier 1",
                symbol
            ),
            LedgerWarning::TimestampOrdering {
                symbol,
                timestamp,
                first,
            } => write!(
                f,
                "transaction for {} at {} is not after the ledger start {}",
                symbol,
                timestamp.to_rfc3339(),
                first.to_rfc3339()
            ),
            LedgerWarning::MissingColumn { symbol, column } => {
                write!(f, "batch for {} has no {} column", symbol, column)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_policy_message() {
        let err = LedgerError::FeePolicyViolation {
            symbol: Symbol::new("ES"),
            fee: Decimal::one(),
        };
        assert_eq!(
            err.to_string(),
            "Fee policy violation for ES: fee 1 is positive and rebates are not allowed"
        );
    }

    #[test]
    fn test_out_of_order_message() {
        let err = LedgerError::OutOfOrder {
            symbol: Symbol::new("ES"),
            timestamp: crate::domain::parse_timestamp("2024-01-03").unwrap(),
            last: crate::domain::parse_timestamp("2024-01-04").unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "Transaction for ES at 2024-01-03T00:00:00+00:00 is not after the last ledger \
             record at 2024-01-04T00:00:00+00:00"
        );
    }

    #[test]
    fn test_warning_display() {
        let warning = LedgerWarning::InstrumentResolution {
            symbol: Symbol::new("XYZ"),
        };
        assert_eq!(
            warning.to_string(),
            "instrument XYZ not found, using contract multiplier 1"
        );
    }
}
