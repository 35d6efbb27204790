//! Deterministic quorum election.
//!
//! Every node derives the same seed from public chain state, shuffles the
//! active service-node list with it, and takes the head of the permutation.
//! Rounds mix the round index into the seed, so an escalated round elects an
//! independently shuffled quorum.

use crate::{PulseError, PulseResult};
use oxen_config::pulse::PULSE_QUORUM_NUM_VALIDATORS;
use oxen_types::{
    crypto::{hash_parts, Hash256, SnPubkey},
    HardFork,
};
use rand::seq::SliceRandom as _;
use rand_chacha::{rand_core::SeedableRng as _, ChaCha20Rng};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Quorum {
    pub producer: SnPubkey,
    /// Exactly [`PULSE_QUORUM_NUM_VALIDATORS`] entries in a valid quorum.
    pub validators: Vec<SnPubkey>,
}

impl Quorum {
    /// This key's validator position, if it is in the quorum.
    pub fn validator_position(&self, key: &SnPubkey) -> Option<usize> {
        self.validators.iter().position(|validator| validator == key)
    }
}

/// Elect the quorum for `(height, round)`. `active` must be the full active
/// service-node list in its canonical order.
pub fn generate_pulse_quorum(
    top_hash: &Hash256,
    block_leader: &SnPubkey,
    hf_version: HardFork,
    active: &[SnPubkey],
    round: u8,
) -> Quorum {
    let seed = hash_parts([
        top_hash.as_ref(),
        block_leader.as_bytes().as_slice(),
        &[hf_version],
        &[round],
    ]);
    let mut rng = ChaCha20Rng::from_seed(seed.0);

    let mut pool: Vec<SnPubkey> = active.to_vec();
    pool.shuffle(&mut rng);

    let mut iter = pool.into_iter();
    let producer = iter.next().unwrap_or_default();
    let validators: Vec<SnPubkey> = iter.take(PULSE_QUORUM_NUM_VALIDATORS).collect();
    Quorum { producer, validators }
}

/// A quorum is usable only at full size.
pub fn verify_pulse_quorum_sizes(quorum: &Quorum) -> PulseResult<()> {
    let available = usize::from(quorum.producer != SnPubkey::default()) + quorum.validators.len();
    if quorum.producer == SnPubkey::default()
        || quorum.validators.len() != PULSE_QUORUM_NUM_VALIDATORS
    {
        return Err(PulseError::QuorumTooSmall { available });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxen_types::crypto::ServiceNodeKeys;

    fn active(n: u8) -> Vec<SnPubkey> {
        (1..=n).map(|i| ServiceNodeKeys::from_seed([i; 32]).pubkey).collect()
    }

    fn top_hash() -> Hash256 {
        hash_parts([b"top".as_slice()])
    }

    #[test]
    fn election_is_deterministic() {
        let nodes = active(20);
        let leader = nodes[0];
        let a = generate_pulse_quorum(&top_hash(), &leader, 19, &nodes, 0);
        let b = generate_pulse_quorum(&top_hash(), &leader, 19, &nodes, 0);
        assert_eq!(a, b);
        assert!(verify_pulse_quorum_sizes(&a).is_ok());
    }

    #[test]
    fn rounds_elect_independent_quorums() {
        let nodes = active(20);
        let leader = nodes[0];
        let round0 = generate_pulse_quorum(&top_hash(), &leader, 19, &nodes, 0);
        let round1 = generate_pulse_quorum(&top_hash(), &leader, 19, &nodes, 1);
        assert_ne!(round0, round1);
    }

    #[test]
    fn quorum_members_are_distinct() {
        let nodes = active(12);
        let quorum = generate_pulse_quorum(&top_hash(), &nodes[0], 19, &nodes, 3);
        verify_pulse_quorum_sizes(&quorum).unwrap();
        let mut members = quorum.validators.clone();
        members.push(quorum.producer);
        members.sort();
        members.dedup();
        assert_eq!(members.len(), 12);
    }

    #[test]
    fn undersized_lists_fail_verification() {
        let nodes = active(11);
        let quorum = generate_pulse_quorum(&top_hash(), &nodes[0], 19, &nodes, 0);
        assert!(matches!(
            verify_pulse_quorum_sizes(&quorum),
            Err(PulseError::QuorumTooSmall { available: 11 })
        ));
    }
}
