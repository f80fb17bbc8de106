//! Fee specifications and their resolution into a concrete signed amount.
//!
//! Fees follow the ledger sign convention: costs are negative, a positive
//! fee is a rebate and is refused unless the caller allows rebates.

use crate::domain::{Decimal, Symbol};
use crate::error::LedgerError;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// A rule computing the fee of one transaction from `(quantity, price, symbol)`.
///
/// Returning `None` means "no usable number" and resolves to a zero fee.
/// The built-in rules return `None` when the fee does not fit the decimal
/// range, after logging a warning.
pub trait FeeRule: Send + Sync {
    fn fee(&self, quantity: Decimal, price: Decimal, symbol: &Symbol) -> Option<Decimal>;

    /// Short label used in logs and Debug output.
    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> FeeRule for F
where
    F: Fn(Decimal, Decimal, &Symbol) -> Option<Decimal> + Send + Sync,
{
    fn fee(&self, quantity: Decimal, price: Decimal, symbol: &Symbol) -> Option<Decimal> {
        self(quantity, price, symbol)
    }
}

/// How the fee of a transaction is determined.
#[derive(Clone)]
pub enum FeeSpec {
    /// A literal amount, already signed.
    Fixed(Decimal),
    /// A rule evaluated against the transaction.
    Computed(Arc<dyn FeeRule>),
}

impl FeeSpec {
    pub fn none() -> Self {
        FeeSpec::Fixed(Decimal::zero())
    }

    pub fn computed(rule: impl FeeRule + 'static) -> Self {
        FeeSpec::Computed(Arc::new(rule))
    }

    /// Wrap a float-valued rule. NaN and infinite results resolve to zero.
    pub fn computed_f64<F>(rule: F) -> Self
    where
        F: Fn(Decimal, Decimal, &Symbol) -> f64 + Send + Sync + 'static,
    {
        FeeSpec::computed(move |qty: Decimal, px: Decimal, symbol: &Symbol| {
            Decimal::from_f64_lossy(rule(qty, px, symbol))
        })
    }
}

impl Default for FeeSpec {
    fn default() -> Self {
        FeeSpec::none()
    }
}

impl fmt::Debug for FeeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeeSpec::Fixed(amount) => f.debug_tuple("Fixed").field(amount).finish(),
            FeeSpec::Computed(rule) => f.debug_tuple("Computed").field(&rule.name()).finish(),
        }
    }
}

impl From<Decimal> for FeeSpec {
    fn from(amount: Decimal) -> Self {
        FeeSpec::Fixed(amount)
    }
}

/// Charges `rate` per unit traded, regardless of direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerUnitFee {
    pub rate: Decimal,
}

impl FeeRule for PerUnitFee {
    fn fee(&self, quantity: Decimal, _price: Decimal, _symbol: &Symbol) -> Option<Decimal> {
        let cost = quantity.abs().checked_mul(self.rate.abs());
        if cost.is_none() {
            warn!(quantity = %quantity, rate = %self.rate, "per-unit fee overflowed");
        }
        cost.map(|cost| -cost)
    }

    fn name(&self) -> &str {
        "per_unit"
    }
}

/// Charges basis points of traded notional, with a minimum charge per trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotionalBpsFee {
    pub bps: Decimal,
    pub min_fee: Decimal,
}

impl FeeRule for NotionalBpsFee {
    fn fee(&self, quantity: Decimal, price: Decimal, _symbol: &Symbol) -> Option<Decimal> {
        let cost = quantity
            .checked_mul(price)
            .and_then(|notional| notional.abs().checked_mul(self.bps.abs()))
            .and_then(|scaled| scaled.checked_div(Decimal::ten_thousand()));
        let Some(cost) = cost else {
            warn!(quantity = %quantity, price = %price, "notional fee overflowed");
            return None;
        };
        Some(-cost.max(self.min_fee.abs()))
    }

    fn name(&self) -> &str {
        "bps"
    }
}

/// Resolves a [`FeeSpec`] for one transaction and enforces the rebate policy.
pub struct FeeResolver;

impl FeeResolver {
    /// Resolve the fee for a transaction.
    ///
    /// # Errors
    /// Returns [`LedgerError::FeePolicyViolation`] when the resolved fee is
    /// positive and `allow_rebates` is false.
    pub fn resolve(
        spec: &FeeSpec,
        quantity: Decimal,
        price: Decimal,
        symbol: &Symbol,
        allow_rebates: bool,
    ) -> Result<Decimal, LedgerError> {
        let fee = match spec {
            FeeSpec::Fixed(amount) => *amount,
            FeeSpec::Computed(rule) => rule.fee(quantity, price, symbol).unwrap_or_default(),
        };
        Self::check_policy(fee, symbol, allow_rebates)?;
        Ok(fee)
    }

    /// Refuse positive fees unless rebates are allowed.
    pub fn check_policy(
        fee: Decimal,
        symbol: &Symbol,
        allow_rebates: bool,
    ) -> Result<(), LedgerError> {
        if fee.is_positive() && !allow_rebates {
            return Err(LedgerError::FeePolicyViolation {
                symbol: symbol.clone(),
                fee,
            });
        }
        Ok(())
    }
}
