use crate::domain::{Decimal, Symbol};
use std::collections::HashMap;

/// Source of instrument metadata needed by the ledger.
pub trait InstrumentRegistry: Send + Sync {
    /// Contract multiplier for `symbol`, or `None` if the instrument is unknown.
    fn contract_multiplier(&self, symbol: &Symbol) -> Option<Decimal>;
}

/// In-memory registry keyed by symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticInstrumentRegistry {
    multipliers: HashMap<Symbol, Decimal>,
}

impl StaticInstrumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instrument(mut self, symbol: Symbol, multiplier: Decimal) -> Self {
        self.multipliers.insert(symbol, multiplier);
        self
    }

    pub fn insert(&mut self, symbol: Symbol, multiplier: Decimal) {
        self.multipliers.insert(symbol, multiplier);
    }

    pub fn len(&self) -> usize {
        self.multipliers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.multipliers.is_empty()
    }
}

impl FromIterator<(Symbol, Decimal)> for StaticInstrumentRegistry {
    fn from_iter<I: IntoIterator<Item = (Symbol, Decimal)>>(iter: I) -> Self {
        Self {
            multipliers: iter.into_iter().collect(),
        }
    }
}

impl InstrumentRegistry for StaticInstrumentRegistry {
    fn contract_multiplier(&self, symbol: &Symbol) -> Option<Decimal> {
        self.multipliers.get(symbol).copied()
    }
}
