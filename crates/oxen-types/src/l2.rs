//! Typed decoding of rewards-contract log entries.
//!
//! The L2 RPC provider is an external collaborator; what arrives here is the
//! raw log (topics + data words) of the rewards contract, which this module
//! turns into the state-change events the service-node list consumes.

use crate::{
    crypto::{BlsPublicKey, SnPubkey, BLS_PUBLIC_KEY_LENGTH},
    EthAddress, TypeError,
};
use alloy::primitives::{keccak256, B256};
use std::sync::LazyLock;

/// A raw contract log, as fetched from the L2 provider.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// L2 block the log was emitted in.
    pub l2_height: u64,
    pub topics: Vec<B256>,
    pub data: Vec<u8>,
}

/// A state change decoded from one rewards-contract log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    NewServiceNode {
        l2_height: u64,
        sn_pubkey: SnPubkey,
        bls_pubkey: BlsPublicKey,
        fee: u64,
        contributors: Vec<(EthAddress, u64)>,
    },
    ServiceNodeExitRequest {
        l2_height: u64,
        bls_pubkey: BlsPublicKey,
    },
    ServiceNodeExit {
        l2_height: u64,
        operator: EthAddress,
        returned_amount: u64,
        bls_pubkey: BlsPublicKey,
    },
}

static NEW_SERVICE_NODE_TOPIC: LazyLock<B256> = LazyLock::new(|| {
    keccak256(b"NewServiceNode(bytes32,bytes,uint256,(address,uint256)[])")
});
static EXIT_REQUEST_TOPIC: LazyLock<B256> =
    LazyLock::new(|| keccak256(b"ServiceNodeExitRequest(bytes)"));
static EXIT_TOPIC: LazyLock<B256> =
    LazyLock::new(|| keccak256(b"ServiceNodeExit(address,uint256,bytes)"));

/// Number of 32-byte words a compressed BLS public key occupies in log data.
const BLS_KEY_WORDS: usize = BLS_PUBLIC_KEY_LENGTH / 32;

struct WordReader<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> WordReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, cursor: 0 }
    }

    fn word(&mut self) -> Result<&'a [u8], TypeError> {
        let start = self.cursor;
        let end = start + 32;
        if end > self.data.len() {
            return Err(TypeError::MalformedLog(format!(
                "data truncated at word {}",
                start / 32
            )));
        }
        self.cursor = end;
        Ok(&self.data[start..end])
    }

    fn u64_word(&mut self) -> Result<u64, TypeError> {
        let word = self.word()?;
        if word[..24].iter().any(|b| *b != 0) {
            return Err(TypeError::MalformedLog("uint overflows u64".to_string()));
        }
        Ok(u64::from_be_bytes(word[24..].try_into().expect("8 bytes")))
    }

    fn address_word(&mut self) -> Result<EthAddress, TypeError> {
        let word = self.word()?;
        Ok(EthAddress::from_slice(&word[12..]))
    }

    fn bls_key(&mut self) -> Result<BlsPublicKey, TypeError> {
        let mut bytes = Vec::with_capacity(BLS_PUBLIC_KEY_LENGTH);
        for _ in 0..BLS_KEY_WORDS {
            bytes.extend_from_slice(self.word()?);
        }
        BlsPublicKey::from_bytes(&bytes)
    }
}

/// Decode one rewards-contract log into a typed state change.
pub fn decode_log(log: &LogEntry) -> Result<StateChange, TypeError> {
    let topic0 = log.topics.first().ok_or(TypeError::UnknownLogEvent)?;
    let mut reader = WordReader::new(&log.data);

    if *topic0 == *NEW_SERVICE_NODE_TOPIC {
        let sn_pubkey = SnPubkey(reader.word()?.try_into().expect("32 bytes"));
        let bls_pubkey = reader.bls_key()?;
        let fee = reader.u64_word()?;
        let count = reader.u64_word()? as usize;
        let mut contributors = Vec::with_capacity(count);
        for _ in 0..count {
            let address = reader.address_word()?;
            let amount = reader.u64_word()?;
            contributors.push((address, amount));
        }
        Ok(StateChange::NewServiceNode {
            l2_height: log.l2_height,
            sn_pubkey,
            bls_pubkey,
            fee,
            contributors,
        })
    } else if *topic0 == *EXIT_REQUEST_TOPIC {
        Ok(StateChange::ServiceNodeExitRequest {
            l2_height: log.l2_height,
            bls_pubkey: reader.bls_key()?,
        })
    } else if *topic0 == *EXIT_TOPIC {
        let operator = reader.address_word()?;
        let returned_amount = reader.u64_word()?;
        let bls_pubkey = reader.bls_key()?;
        Ok(StateChange::ServiceNodeExit {
            l2_height: log.l2_height,
            operator,
            returned_amount,
            bls_pubkey,
        })
    } else {
        Err(TypeError::UnknownLogEvent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::BlsKeypair;

    fn u64_word(v: u64) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[24..].copy_from_slice(&v.to_be_bytes());
        word
    }

    #[test]
    fn decodes_exit_event() {
        let kp = BlsKeypair::from_seed(&[5; 32]).unwrap();
        let operator = EthAddress::repeat_byte(0xab);

        let mut data = Vec::new();
        let mut addr_word = [0u8; 32];
        addr_word[12..].copy_from_slice(operator.as_slice());
        data.extend_from_slice(&addr_word);
        data.extend_from_slice(&u64_word(15_000_000_000));
        data.extend_from_slice(&kp.public().to_bytes());

        let log = LogEntry { l2_height: 42, topics: vec![*EXIT_TOPIC], data };
        let change = decode_log(&log).unwrap();
        assert_eq!(
            change,
            StateChange::ServiceNodeExit {
                l2_height: 42,
                operator,
                returned_amount: 15_000_000_000,
                bls_pubkey: *kp.public(),
            }
        );
    }

    #[test]
    fn unknown_topic_is_rejected() {
        let log = LogEntry {
            l2_height: 1,
            topics: vec![keccak256(b"SomethingElse()")],
            data: vec![],
        };
        assert!(matches!(decode_log(&log), Err(TypeError::UnknownLogEvent)));
    }

    #[test]
    fn truncated_data_is_rejected() {
        let log = LogEntry {
            l2_height: 1,
            topics: vec![*EXIT_REQUEST_TOPIC],
            data: vec![0; 40],
        };
        assert!(matches!(decode_log(&log), Err(TypeError::MalformedLog(_))));
    }
}
