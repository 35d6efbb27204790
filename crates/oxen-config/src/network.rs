//! Per-network chain configuration records.

use oxen_types::{AccountAddress, EthAddress, HardFork, NetworkType};

/// Hard fork that activates batched service-node rewards.
pub const HF_BATCHED_REWARDS: HardFork = 19;

/// Hard fork that activates pulse block production.
pub const HF_PULSE: HardFork = 16;

/// Static configuration for one network.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub network: NetworkType,
    /// Seconds between blocks when pulse is healthy.
    pub target_block_time_secs: u64,
    /// Height at which `HF_BATCHED_REWARDS` activates.
    pub batched_rewards_fork_height: u64,
    /// Height at which `HF_PULSE` activates.
    pub pulse_fork_height: u64,
    /// Default spacing of per-address batched payouts, in blocks.
    pub batching_interval: u64,
    /// Smallest atomic accrual that is ever paid out.
    pub min_batch_payment_amount: u64,
    /// Chain id of the L2 the rewards contract is deployed on.
    pub ethereum_chain_id: u64,
    /// The rewards contract address on that chain.
    pub rewards_contract: EthAddress,
    /// Recipient of the per-block governance accrual.
    pub governance_wallet: AccountAddress,
}

impl ChainConfig {
    pub fn for_network(network: NetworkType) -> Self {
        match network {
            NetworkType::Mainnet => Self {
                network,
                target_block_time_secs: 120,
                batched_rewards_fork_height: 1_049_700,
                pulse_fork_height: 641_111,
                batching_interval: 2520,
                min_batch_payment_amount: 1_000_000_000,
                ethereum_chain_id: 42161,
                rewards_contract: EthAddress::new([
                    0x55, 0x86, 0x7c, 0x1b, 0x32, 0x46, 0xa2, 0x9e, 0x53, 0x9a,
                    0x3e, 0x24, 0xd0, 0x1c, 0x51, 0xde, 0xcb, 0x38, 0xa2, 0x3f,
                ]),
                governance_wallet: governance_address(network, 0x1a),
            },
            NetworkType::Testnet => Self {
                network,
                target_block_time_secs: 120,
                batched_rewards_fork_height: 2_104_800,
                pulse_fork_height: 1_155_300,
                batching_interval: 20,
                min_batch_payment_amount: 1_000_000_000,
                ethereum_chain_id: 421_614,
                rewards_contract: EthAddress::new([
                    0xb6, 0x91, 0xe7, 0xc1, 0x59, 0x36, 0x9a, 0x04, 0xd3, 0x7f,
                    0x79, 0x3d, 0x13, 0x5f, 0x1e, 0x16, 0x02, 0x6c, 0x8d, 0x52,
                ]),
                governance_wallet: governance_address(network, 0x2b),
            },
            NetworkType::Devnet => Self {
                network,
                target_block_time_secs: 30,
                batched_rewards_fork_height: 200,
                pulse_fork_height: 100,
                batching_interval: 20,
                min_batch_payment_amount: 100_000_000,
                ethereum_chain_id: 421_614,
                rewards_contract: EthAddress::new([
                    0x75, 0xfc, 0x5a, 0x0a, 0x60, 0x27, 0x13, 0x71, 0x5b, 0x8a,
                    0x78, 0x87, 0x29, 0x0e, 0x01, 0x6e, 0x7a, 0xcb, 0x9f, 0x41,
                ]),
                governance_wallet: governance_address(network, 0x3c),
            },
            NetworkType::Fakechain => Self {
                network,
                target_block_time_secs: 2,
                batched_rewards_fork_height: 100,
                pulse_fork_height: 50,
                batching_interval: 4,
                min_batch_payment_amount: 1,
                ethereum_chain_id: 31_337,
                rewards_contract: EthAddress::new([
                    0x5f, 0xbd, 0xb2, 0x31, 0x56, 0x78, 0xaf, 0xec, 0xb3, 0x67,
                    0xf0, 0x32, 0xd9, 0x3f, 0x64, 0x2f, 0x64, 0x18, 0x0a, 0xa3,
                ]),
                governance_wallet: governance_address(network, 0x4d),
            },
        }
    }

    /// Activation height of a hard fork on this network, when known.
    pub fn hard_fork_height(&self, hf: HardFork) -> Option<u64> {
        match hf {
            HF_PULSE => Some(self.pulse_fork_height),
            HF_BATCHED_REWARDS => Some(self.batched_rewards_fork_height),
            _ => None,
        }
    }
}

/// The governance wallets are ordinary account addresses with well-known
/// keys published at fork time; each network pins its own.
fn governance_address(network: NetworkType, tag: u8) -> AccountAddress {
    AccountAddress::new(network, [tag; 32], [tag ^ 0xff; 32])
}
