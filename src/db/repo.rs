//! Repository layer persisting ledgers and their transaction records.

use crate::domain::{
    from_unix_nanos, to_unix_nanos, Decimal, PortfolioName, PositionState, Symbol,
    TransactionRecord,
};
use crate::ledger::Ledger;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Register a ledger's identity, initialization time and opening
    /// position. Existing ledgers are left as they are.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn ensure_ledger(&self, ledger: &Ledger) -> Result<bool, sqlx::Error> {
        let opening = ledger.opening_position();
        let result = sqlx::query(
            r#"
            INSERT INTO ledgers (
                portfolio, symbol, initialized_at_ns, opening_qty, opening_avg_cost
            )
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(portfolio, symbol) DO NOTHING
            "#,
        )
        .bind(ledger.portfolio().as_str())
        .bind(ledger.symbol().as_str())
        .bind(to_unix_nanos(&ledger.initialized_at()))
        .bind(opening.quantity.to_canonical_string())
        .bind(opening.avg_cost.to_canonical_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Load a ledger with all of its records, or `None` if it was never registered.
    ///
    /// # Errors
    /// Returns an error if a query fails or a stored value does not decode.
    pub async fn load_ledger(
        &self,
        portfolio: &PortfolioName,
        symbol: &Symbol,
    ) -> Result<Option<Ledger>, sqlx::Error> {
        let meta = sqlx::query(
            r#"
            SELECT initialized_at_ns, opening_qty, opening_avg_cost
            FROM ledgers
            WHERE portfolio = ? AND symbol = ?
            "#,
        )
        .bind(portfolio.as_str())
        .bind(symbol.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(meta) = meta else {
            return Ok(None);
        };
        let initialized_at = from_unix_nanos(meta.get::<i64, _>("initialized_at_ns"));
        let opening = PositionState::new(
            decimal_col(&meta, "opening_qty")?,
            decimal_col(&meta, "opening_avg_cost")?,
        );

        let records = self.query_records(portfolio, symbol, None, None).await?;
        Ok(Some(Ledger::restore(
            portfolio.clone(),
            symbol.clone(),
            initialized_at,
            opening,
            records,
        )))
    }

    /// Load the ledger, registering a fresh one initialized at
    /// `initialized_at` if none exists yet.
    ///
    /// # Errors
    /// Returns an error if a query fails.
    pub async fn open_ledger(
        &self,
        portfolio: &PortfolioName,
        symbol: &Symbol,
        initialized_at: DateTime<Utc>,
    ) -> Result<Ledger, sqlx::Error> {
        if let Some(ledger) = self.load_ledger(portfolio, symbol).await? {
            return Ok(ledger);
        }
        let ledger = Ledger::new(portfolio.clone(), symbol.clone(), initialized_at);
        self.ensure_ledger(&ledger).await?;
        Ok(ledger)
    }

    /// Append records after the ledger's existing ones in a single
    /// transaction: either all rows are stored or none are.
    ///
    /// # Errors
    /// Returns an error if the ledger is not registered or an insert fails.
    pub async fn append_records(
        &self,
        portfolio: &PortfolioName,
        symbol: &Symbol,
        records: &[TransactionRecord],
    ) -> Result<(), sqlx::Error> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        let (last_seq,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(seq), 0) FROM transactions WHERE portfolio = ? AND symbol = ?",
        )
        .bind(portfolio.as_str())
        .bind(symbol.as_str())
        .fetch_one(&mut *tx)
        .await?;

        for (offset, record) in records.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO transactions (
                    portfolio, symbol, seq, timestamp_ns, txn_qty, txn_price, txn_value,
                    txn_avg_cost, pos_qty, pos_avg_cost, gross_realized_pnl, txn_fees,
                    net_realized_pnl, con_mult
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(portfolio.as_str())
            .bind(symbol.as_str())
            .bind(last_seq + 1 + offset as i64)
            .bind(to_unix_nanos(&record.timestamp))
            .bind(record.txn_quantity.to_canonical_string())
            .bind(record.txn_price.to_canonical_string())
            .bind(record.txn_value.to_canonical_string())
            .bind(record.txn_avg_cost.to_canonical_string())
            .bind(record.position_quantity.to_canonical_string())
            .bind(record.position_avg_cost.to_canonical_string())
            .bind(record.gross_realized_pnl.to_canonical_string())
            .bind(record.txn_fees.to_canonical_string())
            .bind(record.net_realized_pnl.to_canonical_string())
            .bind(record.contract_multiplier.to_canonical_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Records of one ledger in append order, optionally restricted to
    /// `from <= timestamp <= to`.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored value does not decode.
    pub async fn query_records(
        &self,
        portfolio: &PortfolioName,
        symbol: &Symbol,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<TransactionRecord>, sqlx::Error> {
        let from_ns = from.map(|t| to_unix_nanos(&t)).unwrap_or(i64::MIN);
        let to_ns = to.map(|t| to_unix_nanos(&t)).unwrap_or(i64::MAX);

        let rows = sqlx::query(
            r#"
            SELECT timestamp_ns, txn_qty, txn_price, txn_value, txn_avg_cost, pos_qty,
                   pos_avg_cost, gross_realized_pnl, txn_fees, net_realized_pnl, con_mult
            FROM transactions
            WHERE portfolio = ? AND symbol = ? AND timestamp_ns >= ? AND timestamp_ns <= ?
            ORDER BY seq ASC
            "#,
        )
        .bind(portfolio.as_str())
        .bind(symbol.as_str())
        .bind(from_ns)
        .bind(to_ns)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }
}

fn record_from_row(row: &SqliteRow) -> Result<TransactionRecord, sqlx::Error> {
    Ok(TransactionRecord {
        timestamp: from_unix_nanos(row.get::<i64, _>("timestamp_ns")),
        txn_quantity: decimal_col(row, "txn_qty")?,
        txn_price: decimal_col(row, "txn_price")?,
        txn_value: decimal_col(row, "txn_value")?,
        txn_avg_cost: decimal_col(row, "txn_avg_cost")?,
        position_quantity: decimal_col(row, "pos_qty")?,
        position_avg_cost: decimal_col(row, "pos_avg_cost")?,
        gross_realized_pnl: decimal_col(row, "gross_realized_pnl")?,
        txn_fees: decimal_col(row, "txn_fees")?,
        net_realized_pnl: decimal_col(row, "net_realized_pnl")?,
        contract_multiplier: decimal_col(row, "con_mult")?,
    })
}

fn decimal_col(row: &SqliteRow, column: &str) -> Result<Decimal, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str_canonical(&raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}
