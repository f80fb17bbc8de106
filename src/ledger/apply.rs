//! Entry points applying transactions to a ledger.
//!
//! Both functions compute every record before touching the ledger and only
//! append once nothing can fail, so an error leaves the ledger unchanged.
//! New records always land after the ledger's last one: a transaction not
//! later than that record is refused, so the ledger stays sorted and its
//! position is always the last record's.

use super::{InstrumentRegistry, Ledger};
use crate::domain::{Decimal, Symbol, TransactionRecord, TransactionRequest, TransactionTable};
use crate::engine::calc::checked;
use crate::engine::{BatchTransactionProcessor, SingleTransactionProcessor};
use crate::error::{LedgerError, LedgerWarning};
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

/// Knobs shared by both entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Accept positive (rebate) fees.
    pub allow_rebates: bool,
    /// Minimum time increment; re-open legs are stamped `2 * eps` later.
    pub eps: Duration,
    /// Log a one-line summary per call.
    pub verbose: bool,
    /// Overrides the registry lookup when set.
    pub contract_multiplier: Option<Decimal>,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            allow_rebates: false,
            eps: Duration::microseconds(1),
            verbose: false,
            contract_multiplier: None,
        }
    }
}

/// What a successful call appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub records: Vec<TransactionRecord>,
    pub warnings: Vec<LedgerWarning>,
    /// Human-readable summary line, set when `verbose` is on.
    pub summary: Option<String>,
}

/// Apply one transaction, appending one record (two if it crosses zero).
///
/// # Errors
/// [`LedgerError::OutOfOrder`] if the transaction is not after the last
/// record (including a preceding split's re-open leg),
/// [`LedgerError::FeePolicyViolation`] for a disallowed rebate, and
/// [`LedgerError::ArithmeticOverflow`]; the ledger is left untouched.
pub fn apply_transaction(
    ledger: &mut Ledger,
    registry: &dyn InstrumentRegistry,
    request: &TransactionRequest,
    options: &ApplyOptions,
) -> Result<ApplyOutcome, LedgerError> {
    let symbol = ledger.symbol().clone();
    let mut warnings = Vec::new();
    let multiplier = resolve_multiplier(registry, &symbol, options, &mut warnings);

    check_after_last(ledger, &symbol, request.timestamp)?;
    let prev = ledger.position();
    let mut processor = SingleTransactionProcessor::new(prev, multiplier);
    processor.process(request, &symbol, options.allow_rebates, options.eps)?;
    let (_, records) = processor.into_outputs();

    check_ordering(ledger, &symbol, request.timestamp, &mut warnings);

    let summary = options.verbose.then(|| {
        format!(
            "{} {} {} @ {}",
            request.timestamp.to_rfc3339(),
            symbol,
            request.quantity,
            request.price
        )
    });
    if let Some(line) = &summary {
        info!("{}", line);
    }

    ledger.append(records.clone());
    Ok(ApplyOutcome {
        records,
        warnings,
        summary,
    })
}

/// Apply an ordered batch, appending every derived record at once.
///
/// # Errors
/// Malformed tables, a first row not after the last record, disallowed
/// rebates and overflow anywhere in the batch fail the whole call before
/// anything is appended.
pub fn apply_transaction_batch(
    ledger: &mut Ledger,
    registry: &dyn InstrumentRegistry,
    table: &TransactionTable,
    options: &ApplyOptions,
) -> Result<ApplyOutcome, LedgerError> {
    let symbol = ledger.symbol().clone();
    let mut warnings = Vec::new();
    let multiplier = resolve_multiplier(registry, &symbol, options, &mut warnings);

    if let Some(first) = table.timestamps.first() {
        check_after_last(ledger, &symbol, *first)?;
    }
    let prev = ledger.position();
    let output = BatchTransactionProcessor::process(
        prev,
        table,
        &symbol,
        multiplier,
        options.allow_rebates,
        options.eps,
    )?;
    warnings.extend(output.warnings);

    if let Some(first) = output.records.first() {
        check_ordering(ledger, &symbol, first.timestamp, &mut warnings);
    }

    let summary = match (options.verbose, table.timestamps.first(), table.timestamps.last()) {
        (true, Some(first), Some(last)) => {
            let net = checked(
                output
                    .records
                    .iter()
                    .try_fold(Decimal::zero(), |acc, r| acc.checked_add(r.txn_quantity)),
                "batch net quantity",
            )?;
            Some(format!(
                "{}..{} {} {} txns, net {}",
                first.to_rfc3339(),
                last.to_rfc3339(),
                symbol,
                table.len(),
                net
            ))
        }
        _ => None,
    };
    if let Some(line) = &summary {
        info!("{}", line);
    }

    ledger.append(output.records.clone());
    Ok(ApplyOutcome {
        records: output.records,
        warnings,
        summary,
    })
}

fn resolve_multiplier(
    registry: &dyn InstrumentRegistry,
    symbol: &Symbol,
    options: &ApplyOptions,
    warnings: &mut Vec<LedgerWarning>,
) -> Decimal {
    if let Some(multiplier) = options.contract_multiplier {
        return multiplier;
    }
    match registry.contract_multiplier(symbol) {
        Some(multiplier) => multiplier,
        None => {
            let warning = LedgerWarning::InstrumentResolution {
                symbol: symbol.clone(),
            };
            warn!("{}", warning);
            warnings.push(warning);
            Decimal::one()
        }
    }
}

fn check_after_last(
    ledger: &Ledger,
    symbol: &Symbol,
    timestamp: DateTime<Utc>,
) -> Result<(), LedgerError> {
    match ledger.last_timestamp() {
        Some(last) if timestamp <= last => Err(LedgerError::OutOfOrder {
            symbol: symbol.clone(),
            timestamp,
            last,
        }),
        _ => Ok(()),
    }
}

fn check_ordering(
    ledger: &Ledger,
    symbol: &Symbol,
    timestamp: DateTime<Utc>,
    warnings: &mut Vec<LedgerWarning>,
) {
    let first = ledger.first_timestamp();
    if timestamp <= first {
        let warning = LedgerWarning::TimestampOrdering {
            symbol: symbol.clone(),
            timestamp,
            first,
        };
        warn!("{}", warning);
        warnings.push(warning);
    }
}
