//! Blocks as the rewards ledger and the pulse state machine see them, plus
//! the deterministic coinbase output-key derivation the ledger validates
//! against.

use crate::{
    crypto::{hash_parts, keccak256_parts, Hash256, SnPubkey, SnSignature},
    encode, AccountAddress,
};
use serde::{Deserialize, Serialize};

/// Hard-fork (major) version carried in the block header.
pub type HardFork = u8;

/// The collective random value a pulse quorum produces.
pub const PULSE_RANDOM_VALUE_LENGTH: usize = 16;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
pub struct PulseRandomValue(pub [u8; PULSE_RANDOM_VALUE_LENGTH]);

/// Pulse fields embedded in the block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PulseHeader {
    /// The round the quorum agreed this block in.
    pub round: u8,
    /// Participating validators, one bit per quorum position.
    pub validator_bitset: u16,
    /// Folded random value seeded by every participating validator.
    pub random_value: PulseRandomValue,
}

/// A validator's signature over the final block blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSignature {
    pub validator_index: u16,
    pub signature: SnSignature,
}

/// A one-time coinbase output key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutputKey(pub [u8; 32]);

/// One miner/coinbase output: a one-time key paid an atomic amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinbaseOutput {
    pub key: OutputKey,
    pub amount: u64,
}

/// A block, reduced to the fields the core subsystems consume.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub prev_hash: Hash256,
    pub major_version: HardFork,
    pub timestamp: u64,
    /// Total coinbase reward including transaction fees.
    pub reward: u64,
    /// Pulse winner key; all-zero on mined blocks.
    pub service_node_winner: SnPubkey,
    pub pulse: PulseHeader,
    /// Validator signatures attached after the signed-block stage.
    pub signatures: Vec<BlockSignature>,
    /// Coinbase outputs paying the batched rewards due at this height.
    pub miner_outputs: Vec<CoinbaseOutput>,
}

impl Block {
    /// Serialize the block to the canonical blob the quorum signs.
    pub fn to_blob(&self) -> Vec<u8> {
        encode(self)
    }

    pub fn hash(&self) -> Hash256 {
        hash_parts([self.to_blob().as_slice()])
    }
}

/// Seed tag for the per-height deterministic coinbase keypair.
const DETERMINISTIC_OUTPUT_TAG: &[u8] = b"OXEN_DETERMINISTIC_OUTPUT_KEY";

/// The per-height seed every node derives identically; stands in for the
/// deterministic transaction keypair of the original coinbase construction.
pub fn block_deterministic_seed(height: u64) -> [u8; 32] {
    keccak256_parts([DETERMINISTIC_OUTPUT_TAG, &height.to_be_bytes()])
}

/// Derive the one-time output key for paying `address` at coinbase output
/// position `index`. Validation recomputes this and compares against the
/// block's coinbase.
pub fn deterministic_output_key(
    address: &AccountAddress,
    seed: &[u8; 32],
    index: usize,
) -> OutputKey {
    let key = keccak256_parts([
        seed.as_slice(),
        &address.spend,
        &address.view,
        &(index as u64).to_le_bytes(),
    ]);
    OutputKey(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NetworkType;

    #[test]
    fn output_key_is_deterministic_and_position_bound() {
        let addr =
            AccountAddress::new(NetworkType::Fakechain, [1; 32], [2; 32]);
        let seed = block_deterministic_seed(101);
        assert_eq!(
            deterministic_output_key(&addr, &seed, 0),
            deterministic_output_key(&addr, &seed, 0)
        );
        assert_ne!(
            deterministic_output_key(&addr, &seed, 0),
            deterministic_output_key(&addr, &seed, 1)
        );
        let other_seed = block_deterministic_seed(102);
        assert_ne!(
            deterministic_output_key(&addr, &seed, 0),
            deterministic_output_key(&addr, &other_seed, 0)
        );
    }

    #[test]
    fn block_blob_round_trips() {
        let block = Block {
            height: 7,
            reward: 16_500_000_000,
            signatures: vec![BlockSignature {
                validator_index: 3,
                signature: SnSignature([9; 64]),
            }],
            ..Default::default()
        };
        let blob = block.to_blob();
        let back: Block = crate::decode(&blob);
        assert_eq!(block, back);
    }
}
