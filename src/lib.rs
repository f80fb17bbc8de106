pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ledger;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    Decimal, FeeResolver, FeeSpec, PortfolioName, PositionState, Symbol, TransactionRecord,
    TransactionRequest, TransactionTable,
};
pub use engine::{BatchTransactionProcessor, SingleTransactionProcessor, ZeroCrossSplitter};
pub use error::{LedgerError, LedgerWarning};
pub use ledger::{
    apply_transaction, apply_transaction_batch, ApplyOptions, ApplyOutcome, InstrumentRegistry,
    Ledger, Portfolio, StaticInstrumentRegistry,
};
