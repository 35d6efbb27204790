//! Pulse failure kinds. All of these are absorbed by the state machine:
//! `QuorumTooSmall` falls back to waiting for a mined block, everything else
//! re-enters `prepare_for_round` with the round incremented.

use thiserror::Error;

pub type PulseResult<T> = Result<T, PulseError>;

#[derive(Debug, Error)]
pub enum PulseError {
    #[error("Insufficient service nodes to form a pulse quorum ({available} available)")]
    QuorumTooSmall { available: usize },

    #[error("Insufficient participation: received {received}, required {required}")]
    InsufficientParticipation { received: u16, required: u16 },

    #[error("Stage timed out")]
    Timeout,

    #[error("Chain query failed: {0}")]
    Chain(eyre::Report),

    #[error("Quorum relay failed: {0}")]
    Relay(eyre::Report),
}
