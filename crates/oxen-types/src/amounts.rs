//! Amount units and the batched-payment record.
//!
//! The ledger stores milli-atomic units internally so that per-block
//! contributor splits of the service-node reward never lose remainders to
//! integer division; everything crossing the public API is atomic units.

use crate::AccountAddress;
use serde::{Deserialize, Serialize};

/// Internal storage scale: 1 atomic unit = 1000 milli units.
pub const MILLI_PER_ATOMIC: u64 = 1000;

/// Convert an atomic amount to the ledger's internal milli units.
pub fn to_milli(atomic: u64) -> u64 {
    atomic * MILLI_PER_ATOMIC
}

/// Convert an internal milli amount to atomic units, discarding the remainder.
pub fn to_atomic(milli: u64) -> u64 {
    milli / MILLI_PER_ATOMIC
}

/// One batched payment: an address owed (or paid) an atomic amount.
///
/// Used both as accrual input and as the unit of paid-out reward in a block's
/// coinbase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPayment {
    pub address: AccountAddress,
    /// Atomic units.
    pub amount: u64,
}

impl BatchPayment {
    pub fn new(address: AccountAddress, amount: u64) -> Self {
        Self { address, amount }
    }
}
