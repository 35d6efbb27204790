//! Pulse timing and quorum constants.
//!
//! Stage durations accumulate from the round start in declaration order:
//! handshakes, handshake bitsets, block template, random-value hashes,
//! random values, signed blocks.

use std::time::Duration;

/// Validators per pulse quorum (plus one block producer).
pub const PULSE_QUORUM_NUM_VALIDATORS: usize = 11;

/// Validator signatures a final pulse block must carry.
pub const PULSE_BLOCK_REQUIRED_SIGNATURES: usize = 7;

/// Fraction of validators (numerator/denominator) that must agree on the
/// participation bitset for a round to proceed.
pub const PULSE_BITSET_AGREEMENT_NUM: usize = 6;
pub const PULSE_BITSET_AGREEMENT_DEN: usize = 10;

/// Length of one pulse round; round R starts at
/// `top_block_timestamp + (R + 1) * PULSE_ROUND_TIME`.
pub const PULSE_ROUND_TIME: Duration = Duration::from_secs(60);

pub const PULSE_WAIT_FOR_HANDSHAKES_DURATION: Duration = Duration::from_secs(3);
pub const PULSE_WAIT_FOR_OTHER_VALIDATOR_HANDSHAKES_DURATION: Duration = Duration::from_secs(3);
pub const PULSE_WAIT_FOR_BLOCK_TEMPLATE_DURATION: Duration = Duration::from_secs(10);
pub const PULSE_WAIT_FOR_RANDOM_VALUE_HASH_DURATION: Duration = Duration::from_secs(3);
pub const PULSE_WAIT_FOR_RANDOM_VALUE_DURATION: Duration = Duration::from_secs(3);
pub const PULSE_WAIT_FOR_SIGNED_BLOCK_DURATION: Duration = Duration::from_secs(10);

/// How often the dedicated pulse worker wakes up without external events.
pub const PULSE_TICK_INTERVAL: Duration = Duration::from_millis(500);
