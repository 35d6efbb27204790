// SPDX-License-Identifier: Apache-2.0

//! The batched service-node rewards ledger.
//!
//! Every accepted block extends per-address accruals inside one write
//! transaction; per-address payouts are validated against the ledger's own
//! idea of who is due and recorded as paid rows that a reorg can roll back.

mod arithmetic;
mod error;
mod ledger;
pub mod test_support;

pub use arithmetic::*;
pub use error::*;
pub use ledger::*;
