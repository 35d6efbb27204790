//! The rewards-ledger tables.
//!
//! Mirrors the relational layout: an accrual row per address, a paid row per
//! (height, address), and a singleton height record. Paid rows are keyed
//! height-first because every query against them (pruning, reorg rollback,
//! per-block payment listing) selects by height.

use crate::Table;

/// `address -> accrued milli amount`. Rows with amount 0 must not exist; the
/// ledger's debit path removes them.
#[derive(Debug)]
pub struct Accrued;

impl Table for Accrued {
    type Key = String;
    type Value = u64;

    const NAME: &'static str = "batched_payments_accrued";
}

/// `(height_paid, address) -> paid milli amount`.
#[derive(Debug)]
pub struct PaidRaw;

impl Table for PaidRaw {
    type Key = (u64, String);
    type Value = u64;

    const NAME: &'static str = "batched_payments_raw";
}

/// Singleton row holding the last durable ledger height.
#[derive(Debug)]
pub struct LedgerInfo;

impl Table for LedgerInfo {
    type Key = u8;
    type Value = u64;

    const NAME: &'static str = "batch_db_info";
}

/// The one key ever used in [`LedgerInfo`].
pub const LEDGER_INFO_KEY: u8 = 0;

/// Table names a ledger database must contain.
pub const LEDGER_TABLE_NAMES: [&str; 3] = [Accrued::NAME, PaidRaw::NAME, LedgerInfo::NAME];
