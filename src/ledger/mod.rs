//! Per-instrument ledgers, their owning portfolio, and the entry points
//! that append to them.

pub mod apply;
pub mod book;
pub mod portfolio;
pub mod registry;

pub use apply::{apply_transaction, apply_transaction_batch, ApplyOptions, ApplyOutcome};
pub use book::Ledger;
pub use portfolio::Portfolio;
pub use registry::{InstrumentRegistry, StaticInstrumentRegistry};
