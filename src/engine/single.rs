use super::{calc, Leg, ZeroCrossSplitter};
use crate::domain::{
    Decimal, FeeResolver, PositionState, Symbol, TransactionRecord, TransactionRequest,
};
use crate::error::LedgerError;
use chrono::Duration;

/// Applies transactions one at a time against a running position.
///
/// Records accumulate in the processor and are handed out by
/// [`into_outputs`](Self::into_outputs); nothing is written anywhere else,
/// so dropping the processor after an error leaves no trace.
pub struct SingleTransactionProcessor {
    pub state: PositionState,
    multiplier: Decimal,
    records: Vec<TransactionRecord>,
}

impl SingleTransactionProcessor {
    pub fn new(state: PositionState, multiplier: Decimal) -> Self {
        Self {
            state,
            multiplier,
            records: Vec::new(),
        }
    }

    /// Resolve the fee, split on a zero crossing and settle every leg.
    ///
    /// # Errors
    /// Returns [`LedgerError::FeePolicyViolation`] before touching the
    /// position if the fee is a disallowed rebate, or
    /// [`LedgerError::ArithmeticOverflow`] if settlement overflows.
    pub fn process(
        &mut self,
        request: &TransactionRequest,
        symbol: &Symbol,
        allow_rebates: bool,
        eps: Duration,
    ) -> Result<(), LedgerError> {
        let fee = FeeResolver::resolve(
            &request.fee,
            request.quantity,
            request.price,
            symbol,
            allow_rebates,
        )?;

        let leg = Leg {
            timestamp: request.timestamp,
            quantity: request.quantity,
            price: request.price,
            fee,
        };

        // Settle every leg before committing so a failure leaves no trace.
        let mut state = self.state;
        let mut settled = Vec::with_capacity(2);
        for leg in ZeroCrossSplitter::decompose(state.quantity, leg, eps)? {
            let record = calc::settle_leg(&state, &leg, self.multiplier)?;
            state = record.position();
            settled.push(record);
        }
        self.state = state;
        self.records.extend(settled);
        Ok(())
    }

    /// Settle a leg that does not cross zero.
    ///
    /// # Errors
    /// [`LedgerError::ArithmeticOverflow`] from settlement; the state is
    /// left unchanged.
    pub fn process_leg(&mut self, leg: &Leg) -> Result<&TransactionRecord, LedgerError> {
        debug_assert!(!ZeroCrossSplitter::crosses_zero(self.state.quantity, leg.quantity));

        let record = calc::settle_leg(&self.state, leg, self.multiplier)?;
        self.state = record.position();
        self.records.push(record);
        Ok(&self.records[self.records.len() - 1])
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    /// Final position and the records produced, in order.
    pub fn into_outputs(self) -> (PositionState, Vec<TransactionRecord>) {
        (self.state, self.records)
    }
}
