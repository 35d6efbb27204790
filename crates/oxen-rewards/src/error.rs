//! Ledger error taxonomy.
//!
//! Block-validation failures reject the block; `Storage` aborts the
//! transaction in flight; `ArithmeticOverflow` is fatal and propagated.

use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Block height out of sync with batching database (expected {expected}, got {got})")]
    OutOfOrder { expected: u64, got: u64 },

    #[error("Coinbase pays {got} outputs but {expected} batch payments are due")]
    LengthMismatch { expected: usize, got: usize },

    #[error("Coinbase output {index} pays {got} but the batch payment due is {expected}")]
    AmountMismatch { index: usize, expected: u64, got: u64 },

    #[error("Coinbase output {index} one-time key does not match the derived output key")]
    KeyMismatch { index: usize },

    #[error("Coinbase total {got} does not match the batch payment total {expected}")]
    TotalMismatch { expected: u64, got: u64 },

    #[error("No accrued row for address {0}")]
    AddressNotFound(String),

    #[error("Invalid address in batching database: {0}")]
    InvalidAddress(String),

    #[error("Accrued balance for {address} would fall below zero")]
    CheckViolation { address: String },

    #[error(
        "Paid amount for {address} does not match its accrued balance \
         (accrued {accrued_milli} milli, paying {paying_milli} milli)"
    )]
    PaidAmountMismatch { address: String, accrued_milli: u64, paying_milli: u64 },

    #[error("Arithmetic overflow computing {0}")]
    ArithmeticOverflow(&'static str),

    #[error("Storage failure: {0}")]
    Storage(#[from] eyre::Report),
}
