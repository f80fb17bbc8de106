//! Columnar batch input for bulk transaction processing.
//!
//! Quantity, price and fee columns are optional so that a partially
//! populated feed can still be applied; the batch processor reports what
//! was missing.

use crate::domain::{parse_timestamp, Decimal};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use std::io::Read;

pub const TIMESTAMP_COLUMN: &str = "timestamp";
pub const QUANTITY_COLUMN: &str = "quantity";
pub const PRICE_COLUMN: &str = "price";
pub const FEES_COLUMN: &str = "fees";

/// An ordered table of transactions for one instrument.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionTable {
    pub timestamps: Vec<DateTime<Utc>>,
    pub quantity: Option<Vec<Decimal>>,
    pub price: Option<Vec<Decimal>>,
    pub fees: Option<Vec<Decimal>>,
}

impl TransactionTable {
    pub fn new(timestamps: Vec<DateTime<Utc>>) -> Self {
        Self {
            timestamps,
            ..Self::default()
        }
    }

    pub fn with_quantity(mut self, quantity: Vec<Decimal>) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_price(mut self, price: Vec<Decimal>) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_fees(mut self, fees: Vec<Decimal>) -> Self {
        self.fees = Some(fees);
        self
    }

    /// Build a fully populated table from `(timestamp, quantity, price, fee)` rows.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (DateTime<Utc>, Decimal, Decimal, Decimal)>,
    {
        let mut timestamps = Vec::new();
        let mut quantity = Vec::new();
        let mut price = Vec::new();
        let mut fees = Vec::new();
        for (ts, qty, px, fee) in rows {
            timestamps.push(ts);
            quantity.push(qty);
            price.push(px);
            fees.push(fee);
        }
        Self {
            timestamps,
            quantity: Some(quantity),
            price: Some(price),
            fees: Some(fees),
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Check column lengths and chronological order.
    ///
    /// # Errors
    /// [`LedgerError::ColumnLengthMismatch`] if a present column does not have
    /// one value per timestamp, [`LedgerError::UnorderedBatch`] if timestamps
    /// are not strictly increasing.
    pub fn validate(&self) -> Result<(), LedgerError> {
        let rows = self.len();
        let columns = [
            (QUANTITY_COLUMN, &self.quantity),
            (PRICE_COLUMN, &self.price),
            (FEES_COLUMN, &self.fees),
        ];
        for (name, column) in columns {
            if let Some(values) = column {
                if values.len() != rows {
                    return Err(LedgerError::ColumnLengthMismatch {
                        column: name.to_string(),
                        expected: rows,
                        actual: values.len(),
                    });
                }
            }
        }

        if let Some(row) = self.timestamps.windows(2).position(|w| w[1] <= w[0]) {
            return Err(LedgerError::UnorderedBatch { row: row + 1 });
        }
        Ok(())
    }

    /// Read a table from CSV with a `timestamp` header and any of the
    /// `quantity`, `price` and `fees` headers. Header names are matched
    /// case-insensitively; unknown columns are ignored.
    ///
    /// # Errors
    /// Returns an error for malformed CSV, a missing timestamp column, or an
    /// unparseable cell.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, LedgerError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = rdr.headers()?.clone();
        let find = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));

        let ts_idx = find(TIMESTAMP_COLUMN).ok_or_else(|| LedgerError::InvalidRow {
            row: 0,
            reason: "missing timestamp column".to_string(),
        })?;
        let qty_idx = find(QUANTITY_COLUMN);
        let px_idx = find(PRICE_COLUMN);
        let fee_idx = find(FEES_COLUMN);

        let mut table = TransactionTable {
            timestamps: Vec::new(),
            quantity: qty_idx.map(|_| Vec::new()),
            price: px_idx.map(|_| Vec::new()),
            fees: fee_idx.map(|_| Vec::new()),
        };

        for (i, result) in rdr.records().enumerate() {
            let record = result?;
            let row = i + 1;
            let cell = |idx: usize| record.get(idx).unwrap_or("");

            let ts = parse_timestamp(cell(ts_idx)).ok_or_else(|| LedgerError::InvalidRow {
                row,
                reason: format!("invalid timestamp {:?}", cell(ts_idx)),
            })?;
            table.timestamps.push(ts);

            push_decimal(&mut table.quantity, qty_idx.map(cell), row, QUANTITY_COLUMN)?;
            push_decimal(&mut table.price, px_idx.map(cell), row, PRICE_COLUMN)?;
            push_decimal(&mut table.fees, fee_idx.map(cell), row, FEES_COLUMN)?;
        }

        Ok(table)
    }
}

// Empty fee cells read as zero; empty quantity/price cells are errors.
fn push_decimal(
    column: &mut Option<Vec<Decimal>>,
    raw: Option<&str>,
    row: usize,
    name: &str,
) -> Result<(), LedgerError> {
    let (Some(values), Some(raw)) = (column.as_mut(), raw) else {
        return Ok(());
    };
    if raw.is_empty() && name == FEES_COLUMN {
        values.push(Decimal::zero());
        return Ok(());
    }
    let value = Decimal::from_str_canonical(raw).map_err(|_| LedgerError::InvalidRow {
        row,
        reason: format!("invalid {} {:?}", name, raw),
    })?;
    values.push(value);
    Ok(())
}
