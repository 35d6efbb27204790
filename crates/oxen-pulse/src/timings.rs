//! The round clock.
//!
//! Round 0 starts one round-time after the top block's timestamp; each later
//! round starts one round-time after the previous. Stage deadlines
//! accumulate from the round start in protocol order.

use oxen_config::pulse::{
    PULSE_ROUND_TIME, PULSE_WAIT_FOR_BLOCK_TEMPLATE_DURATION,
    PULSE_WAIT_FOR_HANDSHAKES_DURATION, PULSE_WAIT_FOR_OTHER_VALIDATOR_HANDSHAKES_DURATION,
    PULSE_WAIT_FOR_RANDOM_VALUE_DURATION, PULSE_WAIT_FOR_RANDOM_VALUE_HASH_DURATION,
    PULSE_WAIT_FOR_SIGNED_BLOCK_DURATION,
};

/// Wall-clock instants are unix milliseconds; block timestamps are unix
/// seconds and get scaled on entry.
pub type TimeMs = u64;

/// When round 0 for the next block may begin.
pub fn round_0_start_time(top_block_timestamp_secs: u64) -> TimeMs {
    top_block_timestamp_secs * 1000 + PULSE_ROUND_TIME.as_millis() as TimeMs
}

/// When round `round` begins.
pub fn round_start_time(round_0_start: TimeMs, round: u8) -> TimeMs {
    round_0_start + round as TimeMs * PULSE_ROUND_TIME.as_millis() as TimeMs
}

/// The round the wall clock says we should be in.
pub fn round_for_clock(round_0_start: TimeMs, now: TimeMs) -> u8 {
    if now <= round_0_start {
        return 0;
    }
    let elapsed_rounds = (now - round_0_start) / PULSE_ROUND_TIME.as_millis() as TimeMs;
    elapsed_rounds.min(u8::MAX as TimeMs) as u8
}

/// Per-stage deadlines for one round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageDeadlines {
    pub handshakes: TimeMs,
    pub handshake_bitsets: TimeMs,
    pub block_template: TimeMs,
    pub random_value_hashes: TimeMs,
    pub random_values: TimeMs,
    pub signed_blocks: TimeMs,
}

impl StageDeadlines {
    pub fn from_round_start(start: TimeMs) -> Self {
        let handshakes = start + PULSE_WAIT_FOR_HANDSHAKES_DURATION.as_millis() as TimeMs;
        let handshake_bitsets = handshakes
            + PULSE_WAIT_FOR_OTHER_VALIDATOR_HANDSHAKES_DURATION.as_millis() as TimeMs;
        let block_template =
            handshake_bitsets + PULSE_WAIT_FOR_BLOCK_TEMPLATE_DURATION.as_millis() as TimeMs;
        let random_value_hashes =
            block_template + PULSE_WAIT_FOR_RANDOM_VALUE_HASH_DURATION.as_millis() as TimeMs;
        let random_values =
            random_value_hashes + PULSE_WAIT_FOR_RANDOM_VALUE_DURATION.as_millis() as TimeMs;
        let signed_blocks =
            random_values + PULSE_WAIT_FOR_SIGNED_BLOCK_DURATION.as_millis() as TimeMs;
        Self {
            handshakes,
            handshake_bitsets,
            block_template,
            random_value_hashes,
            random_values,
            signed_blocks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadlines_accumulate_in_stage_order() {
        let deadlines = StageDeadlines::from_round_start(1_000_000);
        assert!(deadlines.handshakes < deadlines.handshake_bitsets);
        assert!(deadlines.handshake_bitsets < deadlines.block_template);
        assert!(deadlines.block_template < deadlines.random_value_hashes);
        assert!(deadlines.random_value_hashes < deadlines.random_values);
        assert!(deadlines.random_values < deadlines.signed_blocks);
    }

    #[test]
    fn clock_round_saturates() {
        let start = round_0_start_time(1_000);
        assert_eq!(round_for_clock(start, start), 0);
        assert_eq!(round_for_clock(start, round_start_time(start, 3) + 1), 3);
        let far_future = start + 100_000 * PULSE_ROUND_TIME.as_millis() as TimeMs;
        assert_eq!(round_for_clock(start, far_future), u8::MAX);
    }
}
