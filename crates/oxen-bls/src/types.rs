//! Request/response records for the signing endpoints and the aggregator.
//!
//! Wire dicts are bencoded; struct fields are declared in lexicographic
//! order so the serialized dict is canonical.

use oxen_types::crypto::{BlsAggregateSignature, BlsPublicKey, BlsSignature};
use oxen_types::EthAddress;
use serde::{Deserialize, Serialize};

/// Which removal flow a signing request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitType {
    Exit,
    Liquidate,
}

/// Status of a bus reply; mirrors the endpoint's HTTP-style codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    Ok,
    BadRequest,
    Forbidden,
}

impl ReplyStatus {
    pub fn code(&self) -> u16 {
        match self {
            ReplyStatus::Ok => 200,
            ReplyStatus::BadRequest => 400,
            ReplyStatus::Forbidden => 403,
        }
    }
}

/// One reply from a signing endpoint: a status code plus (on 200) a bencoded
/// dict, or (otherwise) a diagnostic string.
#[derive(Debug, Clone)]
pub struct BusReply {
    pub status: ReplyStatus,
    pub body: Vec<u8>,
}

impl BusReply {
    pub fn ok(body: Vec<u8>) -> Self {
        Self { status: ReplyStatus::Ok, body }
    }

    pub fn bad_request(message: String) -> Self {
        Self { status: ReplyStatus::BadRequest, body: message.into_bytes() }
    }

    pub fn forbidden(message: String) -> Self {
        Self { status: ReplyStatus::Forbidden, body: message.into_bytes() }
    }
}

/// Bencoded body of a 200 reply from `bls.get_reward_balance`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RewardBalanceReply {
    #[serde(with = "serde_bytes")]
    pub address: Vec<u8>,
    pub amount: u64,
    pub height: u64,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
}

/// Bencoded body of a 200 reply from `bls.get_exit`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExitReply {
    #[serde(with = "serde_bytes")]
    pub exit: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
}

/// Bencoded body of a 200 reply from `bls.get_liquidation`.
#[derive(Debug, Serialize, Deserialize)]
pub struct LiquidateReply {
    #[serde(with = "serde_bytes")]
    pub liquidate: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
}

/// Bencoded request body for `bls.get_exit` / `bls.get_liquidation`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExitRequest {
    #[serde(with = "serde_bytes")]
    pub bls_pubkey: Vec<u8>,
    pub timestamp: u64,
}

/// Aggregated result of a rewards request: everything an on-chain verifier
/// needs to recompute the summed public key and check the signature.
#[derive(Debug)]
pub struct RewardsResponse {
    pub address: EthAddress,
    /// Atomic amount the aggregate signs off on.
    pub amount: u64,
    /// Ledger height the amount was read at.
    pub height: u64,
    /// The canonical signed bytes.
    pub msg_to_sign: Vec<u8>,
    pub signature: BlsSignature,
    /// Contributing keys, in arrival order.
    pub signers_bls_pubkeys: Vec<BlsPublicKey>,
}

/// Aggregated result of an exit or liquidation request.
#[derive(Debug)]
pub struct AggregateExitResponse {
    pub exit_pubkey: BlsPublicKey,
    pub timestamp: u64,
    pub msg_to_sign: Vec<u8>,
    pub signature: BlsSignature,
    pub signers_bls_pubkeys: Vec<BlsPublicKey>,
}

/// Mutex-guarded running aggregation.
#[derive(Debug)]
pub(crate) struct AggregationState {
    pub aggregate: BlsAggregateSignature,
    pub signers: Vec<BlsPublicKey>,
}

impl AggregationState {
    pub fn new() -> Self {
        Self { aggregate: BlsAggregateSignature::identity(), signers: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_dicts_round_trip_through_bencode() {
        let reply = RewardBalanceReply {
            address: vec![0xaa; 20],
            amount: 42,
            height: 7,
            signature: vec![0x01; 48],
        };
        let bytes = serde_bencode::to_bytes(&reply).unwrap();
        let back: RewardBalanceReply = serde_bencode::from_bytes(&bytes).unwrap();
        assert_eq!(back.address, reply.address);
        assert_eq!(back.amount, 42);
        assert_eq!(back.height, 7);
        assert_eq!(back.signature, reply.signature);
    }

    #[test]
    fn bencoded_dict_keys_are_sorted() {
        let reply = ExitReply { exit: vec![1, 2], signature: vec![3] };
        let bytes = serde_bencode::to_bytes(&reply).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        let exit_at = text.find("4:exit").unwrap();
        let sig_at = text.find("9:signature").unwrap();
        assert!(exit_at < sig_at);
    }
}
