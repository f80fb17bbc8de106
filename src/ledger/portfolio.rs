use super::Ledger;
use crate::domain::{Decimal, PortfolioName, Symbol};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A named set of per-instrument ledgers.
///
/// Each ledger is handed out as `&mut`, so mutation of one instrument is
/// serialized by the borrow checker; callers sharing a portfolio across
/// threads wrap it (or each ledger) in their own lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Portfolio {
    name: PortfolioName,
    initialized_at: DateTime<Utc>,
    ledgers: BTreeMap<Symbol, Ledger>,
}

impl Portfolio {
    pub fn new(name: PortfolioName, initialized_at: DateTime<Utc>) -> Self {
        Self {
            name,
            initialized_at,
            ledgers: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &PortfolioName {
        &self.name
    }

    pub fn initialized_at(&self) -> DateTime<Utc> {
        self.initialized_at
    }

    pub fn ledger(&self, symbol: &Symbol) -> Option<&Ledger> {
        self.ledgers.get(symbol)
    }

    /// The ledger for `symbol`, created flat at the portfolio's
    /// initialization time on first use.
    pub fn ledger_mut(&mut self, symbol: &Symbol) -> &mut Ledger {
        let name = &self.name;
        let initialized_at = self.initialized_at;
        self.ledgers
            .entry(symbol.clone())
            .or_insert_with(|| Ledger::new(name.clone(), symbol.clone(), initialized_at))
    }

    /// Add a pre-built ledger, replacing any existing one for its symbol.
    pub fn insert_ledger(&mut self, ledger: Ledger) {
        self.ledgers.insert(ledger.symbol().clone(), ledger);
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.ledgers.keys()
    }

    pub fn net_realized_pnl(&self) -> Decimal {
        self.ledgers.values().map(Ledger::net_realized_pnl).sum()
    }
}
