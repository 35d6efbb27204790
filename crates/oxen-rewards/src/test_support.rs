//! Test accessors for the rewards ledger.
//!
//! These expose raw (milli-unit) table state for assertions and support
//! cloning a ledger into a second store. The clone is a *raw row copy*:
//! amounts are moved as stored with no atomic/milli rescaling, which keeps a
//! cloned ledger byte-identical to its source.

use crate::{LedgerResult, RewardsLedger};
use oxen_storage::{Accrued, Database, DbTxMut as _, LedgerInfo, PaidRaw, LEDGER_INFO_KEY};

impl<DB: Database> RewardsLedger<DB> {
    /// Number of rows in the accrual table.
    pub fn batching_count(&self) -> u64 {
        self.db().iter::<Accrued>().count() as u64
    }

    /// Raw stored milli balance for a rendered address, if a row exists.
    pub fn retrieve_amount_by_address(&self, address: &str) -> Option<u64> {
        self.db().get::<Accrued>(&address.to_string()).ok().flatten()
    }

    /// Raw paid rows as `((height_paid, address), milli)`.
    pub fn paid_rows(&self) -> Vec<((u64, String), u64)> {
        self.db().iter::<PaidRaw>().collect()
    }

    /// Copy this ledger's rows into `dst` and return a ledger over it.
    pub fn clone_into<DST: Database>(&self, dst: DST) -> LedgerResult<RewardsLedger<DST>> {
        let mut txn = dst.write_txn()?;
        for (address, milli) in self.db().iter::<Accrued>() {
            txn.insert::<Accrued>(&address, &milli)?;
        }
        for (key, milli) in self.db().iter::<PaidRaw>() {
            txn.insert::<PaidRaw>(&key, &milli)?;
        }
        txn.insert::<LedgerInfo>(&LEDGER_INFO_KEY, &self.height())?;
        txn.commit()?;
        RewardsLedger::open(dst, self.config().clone())
    }
}
