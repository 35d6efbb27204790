//! Reward formulas and batching constants.

use oxen_types::HardFork;
use std::time::Duration;

/// Denominator of operator-fee portions. Slightly below `u64::MAX` so that
/// legacy portion values computed against it never round a full-fee operator
/// above the distributed amount.
pub const STAKING_PORTIONS: u64 = 0xffff_ffff_ffff_fffc;

/// Paid rows older than this many blocks below the ledger height are pruned.
/// Deliberately identical on every network so the stored layout never
/// diverges.
pub const PAID_HISTORY: u64 = 10_000;

/// Exit/liquidation requests older than this are refused by the signing
/// endpoints.
pub const BLS_MAX_TIME_ALLOWED_FOR_EXIT_REQUEST: Duration = Duration::from_secs(10 * 60);

/// The fixed service-node reward distributed each block, in atomic units.
/// Anything a block's total reward carries above this is transaction fees
/// owed to the block producer.
pub fn service_node_reward_formula(_hf: HardFork) -> u64 {
    // 16.5 OXEN at 9 decimal places.
    16_500_000_000
}

/// The per-block governance accrual, in atomic units.
pub fn governance_reward_formula(_hf: HardFork) -> u64 {
    // 5 OXEN at 9 decimal places.
    5_000_000_000
}
