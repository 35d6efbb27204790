//! Quorum messages and their signature hashes.

use oxen_types::crypto::{hash_parts, Hash256, SnSignature};
use oxen_types::PulseRandomValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The stage a message belongs to, in protocol order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Handshakes,
    HandshakeBitsets,
    BlockTemplate,
    RandomValueHashes,
    RandomValues,
    SignedBlocks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PulseMessageKind {
    /// A validator confirming participation in the round.
    Handshake,
    /// The handshakes a validator has itself seen, one bit per position.
    HandshakeBitset { validator_bitset: u16 },
    /// The producer's serialized block template.
    BlockTemplate { block_blob: Vec<u8> },
    /// Pre-commitment to a random value.
    RandomValueHash { hash: Hash256 },
    /// The revealed random value.
    RandomValue { value: PulseRandomValue },
    /// A signature over the sender's final block blob; the signature field
    /// carries it, there is no extra payload.
    SignedBlock,
}

impl PulseMessageKind {
    pub fn stage(&self) -> Stage {
        match self {
            PulseMessageKind::Handshake => Stage::Handshakes,
            PulseMessageKind::HandshakeBitset { .. } => Stage::HandshakeBitsets,
            PulseMessageKind::BlockTemplate { .. } => Stage::BlockTemplate,
            PulseMessageKind::RandomValueHash { .. } => Stage::RandomValueHashes,
            PulseMessageKind::RandomValue { .. } => Stage::RandomValues,
            PulseMessageKind::SignedBlock => Stage::SignedBlocks,
        }
    }

    pub fn type_string(&self) -> &'static str {
        match self {
            PulseMessageKind::Handshake => "Handshake",
            PulseMessageKind::HandshakeBitset { .. } => "Handshake Bitset",
            PulseMessageKind::BlockTemplate { .. } => "Block Template",
            PulseMessageKind::RandomValueHash { .. } => "Random Value Hash",
            PulseMessageKind::RandomValue { .. } => "Random Value",
            PulseMessageKind::SignedBlock => "Signed Block",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseMessage {
    /// Sender's quorum position: validator index, or 0 for the producer's
    /// block template.
    pub quorum_position: u16,
    pub kind: PulseMessageKind,
    /// Ed25519 signature over the message's type-specific hash.
    pub signature: SnSignature,
}

impl fmt::Display for PulseMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' from {}", self.kind.type_string(), self.quorum_position)
    }
}

/// The hash a message's signature covers. Handshake-family and random-value
/// messages bind the top block hash and the sender position; the template
/// hashes its own blob; the signed-block hash is over `final_block_blob`,
/// the locally assembled final block, so it can only be computed once this
/// node has reached the signed-block stage itself.
pub fn message_signature_hash(
    top_hash: &Hash256,
    msg: &PulseMessage,
    final_block_blob: &[u8],
) -> Hash256 {
    let position = msg.quorum_position.to_le_bytes();
    match &msg.kind {
        PulseMessageKind::Handshake => hash_parts([top_hash.as_ref(), position.as_slice()]),
        PulseMessageKind::HandshakeBitset { validator_bitset } => hash_parts([
            validator_bitset.to_le_bytes().as_slice(),
            top_hash.as_ref(),
            position.as_slice(),
        ]),
        PulseMessageKind::BlockTemplate { block_blob } => hash_parts([block_blob.as_slice()]),
        PulseMessageKind::RandomValueHash { hash } => {
            hash_parts([top_hash.as_ref(), position.as_slice(), hash.as_ref()])
        }
        PulseMessageKind::RandomValue { value } => {
            hash_parts([top_hash.as_ref(), position.as_slice(), value.0.as_slice()])
        }
        PulseMessageKind::SignedBlock => hash_parts([final_block_blob]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxen_types::crypto::{verify_sn_signature, ServiceNodeKeys};

    #[test]
    fn signature_hashes_bind_position_and_top_hash() {
        let top = hash_parts([b"top".as_slice()]);
        let other_top = hash_parts([b"other".as_slice()]);
        let msg = |position| PulseMessage {
            quorum_position: position,
            kind: PulseMessageKind::Handshake,
            signature: SnSignature::default(),
        };

        assert_ne!(
            message_signature_hash(&top, &msg(0), &[]),
            message_signature_hash(&top, &msg(1), &[])
        );
        assert_ne!(
            message_signature_hash(&top, &msg(0), &[]),
            message_signature_hash(&other_top, &msg(0), &[])
        );
    }

    #[test]
    fn signed_messages_verify_against_the_sender_key() {
        let keys = ServiceNodeKeys::from_seed([3; 32]);
        let top = hash_parts([b"top".as_slice()]);
        let mut msg = PulseMessage {
            quorum_position: 4,
            kind: PulseMessageKind::RandomValueHash { hash: hash_parts([b"rv".as_slice()]) },
            signature: SnSignature::default(),
        };
        msg.signature = keys.sign(&message_signature_hash(&top, &msg, &[]));
        assert!(verify_sn_signature(
            &message_signature_hash(&top, &msg, &[]),
            &keys.pubkey,
            &msg.signature
        ));
    }
}
