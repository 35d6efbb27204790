//! Canonical message construction and local BLS signing.
//!
//! Domain separation follows the rewards contract: every signable message is
//! prefixed by `keccak256(tag || chain_id_be32 || contract_address)`, so a
//! signature for one chain or contract deployment can never be replayed
//! against another.

use crate::ExitType;
use oxen_config::ChainConfig;
use oxen_types::{
    crypto::{keccak256_parts, BlsKeypair, BlsPublicKey, BlsSignature, SnPubkey},
    EthAddress, U256,
};

pub const REWARD_TAG: &str = "BLS_SIG_TRYANDINCREMENT_REWARD";
pub const REMOVAL_TAG: &str = "BLS_SIG_TRYANDINCREMENT_REMOVAL";
pub const LIQUIDATE_TAG: &str = "BLS_SIG_TRYANDINCREMENT_LIQUIDATE";
pub const POP_TAG: &str = "BLS_SIG_TRYANDINCREMENT_POP";

/// `keccak256(tag || chain_id_be32 || rewards_contract_address)`.
pub fn build_tag_hash(config: &ChainConfig, tag: &str) -> [u8; 32] {
    keccak256_parts([
        tag.as_bytes(),
        U256::from(config.ethereum_chain_id).to_be_bytes::<32>().as_slice(),
        config.rewards_contract.as_slice(),
    ])
}

/// Reward claims sign `tag || recipient_address || amount_be32`.
pub fn reward_balance_msg(config: &ChainConfig, address: &EthAddress, amount: u64) -> Vec<u8> {
    let tag = build_tag_hash(config, REWARD_TAG);
    let amount_be = U256::from(amount).to_be_bytes::<32>();
    let mut msg = Vec::with_capacity(tag.len() + address.len() + amount_be.len());
    msg.extend_from_slice(&tag);
    msg.extend_from_slice(address.as_slice());
    msg.extend_from_slice(&amount_be);
    msg
}

/// Exits sign `tag || exiting_pubkey || timestamp_le8`; liquidations sign
/// `tag || exiting_pubkey` (the liquidation itself carries no deadline).
pub fn exit_msg(
    config: &ChainConfig,
    exit_type: ExitType,
    exiting_pubkey: &BlsPublicKey,
    unix_timestamp: u64,
) -> Vec<u8> {
    let key_bytes = exiting_pubkey.to_bytes();
    match exit_type {
        ExitType::Exit => {
            let tag = build_tag_hash(config, REMOVAL_TAG);
            let mut msg = Vec::with_capacity(tag.len() + key_bytes.len() + 8);
            msg.extend_from_slice(&tag);
            msg.extend_from_slice(&key_bytes);
            msg.extend_from_slice(&unix_timestamp.to_le_bytes());
            msg
        }
        ExitType::Liquidate => {
            let tag = build_tag_hash(config, LIQUIDATE_TAG);
            let mut msg = Vec::with_capacity(tag.len() + key_bytes.len());
            msg.extend_from_slice(&tag);
            msg.extend_from_slice(&key_bytes);
            msg
        }
    }
}

/// Signs canonical messages with this node's BLS key.
#[derive(Debug)]
pub struct BlsSigner {
    keypair: BlsKeypair,
    config: ChainConfig,
}

impl BlsSigner {
    pub fn new(config: ChainConfig, keypair: BlsKeypair) -> Self {
        Self { keypair, config }
    }

    pub fn public_key(&self) -> &BlsPublicKey {
        self.keypair.public()
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn sign_msg(&self, msg: &[u8]) -> BlsSignature {
        self.keypair.sign(msg)
    }

    /// Proof that this node's BLS key belongs to the registering operator:
    /// a signature over `keccak256(pop_tag || bls_pubkey || sender || sn_pubkey)`.
    pub fn proof_of_possession(
        &self,
        sender: &EthAddress,
        sn_pubkey: &SnPubkey,
    ) -> BlsSignature {
        let tag = build_tag_hash(&self.config, POP_TAG);
        let hash = keccak256_parts([
            tag.as_slice(),
            self.keypair.public().to_bytes().as_slice(),
            sender.as_slice(),
            sn_pubkey.as_bytes().as_slice(),
        ]);
        self.keypair.sign(&hash)
    }
}

/// Verify an individual signature over a canonical message.
pub fn verify_msg(signature: &BlsSignature, pubkey: &BlsPublicKey, msg: &[u8]) -> bool {
    signature.verify(msg, pubkey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxen_types::NetworkType;

    fn test_config() -> ChainConfig {
        let mut config = ChainConfig::for_network(NetworkType::Fakechain);
        config.ethereum_chain_id = 42;
        config.rewards_contract = EthAddress::repeat_byte(0xab);
        config
    }

    #[test]
    fn reward_preimage_layout_is_canonical() {
        let config = test_config();
        let address = EthAddress::repeat_byte(0xde);
        let msg = reward_balance_msg(&config, &address, 12_345);

        // tag = keccak(tag_string || chain_id_be32 || contract)
        let mut tag_input = Vec::new();
        tag_input.extend_from_slice(REWARD_TAG.as_bytes());
        let mut chain_be = [0u8; 32];
        chain_be[31] = 42;
        tag_input.extend_from_slice(&chain_be);
        tag_input.extend_from_slice(&[0xab; 20]);
        let tag = oxen_types::keccak256(&tag_input);

        let mut expected = Vec::new();
        expected.extend_from_slice(tag.as_slice());
        expected.extend_from_slice(&[0xde; 20]);
        let mut amount_be = [0u8; 32];
        amount_be[30..].copy_from_slice(&12_345u16.to_be_bytes());
        expected.extend_from_slice(&amount_be);

        assert_eq!(msg, expected);
    }

    #[test]
    fn signature_over_preimage_verifies() {
        let config = test_config();
        let keypair = BlsKeypair::from_seed(&[9; 32]).unwrap();
        let signer = BlsSigner::new(config.clone(), keypair);
        let msg = reward_balance_msg(&config, &EthAddress::repeat_byte(0x11), 77);

        let sig = signer.sign_msg(&msg);
        assert!(verify_msg(&sig, signer.public_key(), &msg));

        let other = reward_balance_msg(&config, &EthAddress::repeat_byte(0x11), 78);
        assert!(!verify_msg(&sig, signer.public_key(), &other));
    }

    #[test]
    fn exit_and_liquidation_tags_differ() {
        let config = test_config();
        let keypair = BlsKeypair::from_seed(&[2; 32]).unwrap();
        let exit = exit_msg(&config, ExitType::Exit, keypair.public(), 1_700_000_000);
        let liquidate = exit_msg(&config, ExitType::Liquidate, keypair.public(), 1_700_000_000);
        assert_ne!(&exit[..32], &liquidate[..32]);
        // The liquidation pre-image carries no timestamp.
        assert_eq!(liquidate.len(), exit.len() - 8);
    }
}
