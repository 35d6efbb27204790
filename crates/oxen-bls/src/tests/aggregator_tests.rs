//! Fan-out aggregation against an in-process loopback bus.

use super::*;
use crate::{BlsEndpoints, BlsSigner, NodeStatusView};
use oxen_types::{
    crypto::{BlsAggregateSignature, BlsKeypair, ServiceNodeKeys},
    NetworkType,
};
use std::{collections::HashMap, sync::Arc};

fn config() -> ChainConfig {
    ChainConfig::for_network(NetworkType::Fakechain)
}

#[derive(Clone)]
struct SharedRewards {
    balances: Arc<HashMap<EthAddress, (u64, u64)>>,
}

impl RewardsView for SharedRewards {
    fn accrued_balance(&self, address: &EthAddress) -> (u64, u64) {
        self.balances.get(address).copied().unwrap_or((0, 0))
    }
}

struct FixedStatus {
    removable: bool,
}

impl NodeStatusView for FixedStatus {
    fn is_removable(&self, _bls_pubkey: &BlsPublicKey) -> bool {
        self.removable
    }

    fn is_liquidatable(&self, _bls_pubkey: &BlsPublicKey) -> bool {
        self.removable
    }
}

struct LoopbackBus {
    servers: HashMap<oxen_types::crypto::SnPubkey, BlsEndpoints<SharedRewards, FixedStatus>>,
}

#[async_trait]
impl QuorumBus for LoopbackBus {
    async fn request(
        &self,
        node: &ServiceNodeAddress,
        endpoint: &str,
        body: Vec<u8>,
    ) -> eyre::Result<BusReply> {
        match self.servers.get(&node.sn_pubkey) {
            Some(server) => Ok(server.handle_request(endpoint, &[body], unix_now())),
            None => Err(eyre::eyre!("node unreachable")),
        }
    }
}

struct StaticList {
    nodes: Vec<ServiceNodeAddress>,
    height: u64,
}

impl SnListView for StaticList {
    fn reachable_active_nodes(&self) -> Vec<ServiceNodeAddress> {
        self.nodes.clone()
    }

    fn height(&self) -> u64 {
        self.height
    }
}

/// Build `n` nodes, each serving the endpoints over `rewards`, plus the
/// aggregator's own view of the same state.
fn network(
    n: u8,
    rewards: SharedRewards,
    divergent: Option<(u8, SharedRewards)>,
) -> (StaticList, LoopbackBus) {
    let mut nodes = Vec::new();
    let mut servers = HashMap::new();
    for i in 1..=n {
        let sn_keys = ServiceNodeKeys::from_seed([i; 32]);
        let bls = BlsKeypair::from_seed(&[i; 32]).unwrap();
        nodes.push(ServiceNodeAddress {
            sn_pubkey: sn_keys.pubkey,
            bls_pubkey: *bls.public(),
            address: format!("127.0.0.1:{}", 22_000 + i as u16),
        });
        let view = match &divergent {
            Some((index, other)) if *index == i => other.clone(),
            _ => rewards.clone(),
        };
        servers.insert(
            sn_keys.pubkey,
            BlsEndpoints::new(
                BlsSigner::new(config(), bls),
                view,
                FixedStatus { removable: true },
            ),
        );
    }
    (StaticList { nodes, height: 1000 }, LoopbackBus { servers })
}

fn rewards_for(address: EthAddress, height: u64, amount: u64) -> SharedRewards {
    let mut balances = HashMap::new();
    balances.insert(address, (height, amount));
    SharedRewards { balances: Arc::new(balances) }
}

#[tokio::test]
async fn rewards_aggregation_collects_every_signer() {
    let address = EthAddress::repeat_byte(0x42);
    let rewards = rewards_for(address, 500, 777);
    let (list, bus) = network(5, rewards.clone(), None);

    let aggregator = BlsAggregator::new(config(), bus, list, rewards);
    let response = aggregator.rewards_request(&address).await.expect("aggregation");

    assert_eq!(response.amount, 777);
    assert_eq!(response.height, 500);
    assert_eq!(response.signers_bls_pubkeys.len(), 5);

    // The aggregate must verify against the contributors' summed keys over
    // the exact canonical bytes.
    let aggregate = BlsAggregateSignature::from_signature(&response.signature);
    assert!(aggregate.verify(&response.msg_to_sign, &response.signers_bls_pubkeys));
}

#[tokio::test]
async fn divergent_responders_are_dropped_not_fatal() {
    let address = EthAddress::repeat_byte(0x42);
    let rewards = rewards_for(address, 500, 777);
    // Node 3 believes a different balance and must be excluded.
    let divergent = rewards_for(address, 500, 778);
    let (list, bus) = network(5, rewards.clone(), Some((3, divergent)));

    let aggregator = BlsAggregator::new(config(), bus, list, rewards);
    let response = aggregator.rewards_request(&address).await.expect("aggregation");

    assert_eq!(response.signers_bls_pubkeys.len(), 4);
    let excluded = BlsKeypair::from_seed(&[3; 32]).unwrap();
    assert!(!response.signers_bls_pubkeys.contains(excluded.public()));

    let aggregate = BlsAggregateSignature::from_signature(&response.signature);
    assert!(aggregate.verify(&response.msg_to_sign, &response.signers_bls_pubkeys));
}

#[tokio::test]
async fn unreachable_nodes_are_tolerated() {
    let address = EthAddress::repeat_byte(0x42);
    let rewards = rewards_for(address, 500, 777);
    let (mut list, bus) = network(4, rewards.clone(), None);
    // A fifth node is listed but has no server behind it.
    list.nodes.push(ServiceNodeAddress {
        sn_pubkey: ServiceNodeKeys::from_seed([99; 32]).pubkey,
        bls_pubkey: *BlsKeypair::from_seed(&[99; 32]).unwrap().public(),
        address: "127.0.0.1:1".to_string(),
    });

    let aggregator = BlsAggregator::new(config(), bus, list, rewards);
    let response = aggregator.rewards_request(&address).await.expect("aggregation");
    assert_eq!(response.signers_bls_pubkeys.len(), 4);
}

#[tokio::test]
async fn invalid_requests_fail_the_whole_aggregation() {
    let address = EthAddress::repeat_byte(0x42);
    let rewards = rewards_for(address, 500, 777);
    let (list, bus) = network(3, rewards.clone(), None);
    let aggregator = BlsAggregator::new(config(), bus, list, rewards);

    // Zero address.
    let err = aggregator.rewards_request(&EthAddress::ZERO).await.unwrap_err();
    assert!(matches!(err, BlsError::InvalidRequest(_)));

    // Zero balance.
    let err = aggregator.rewards_request(&EthAddress::repeat_byte(0x43)).await.unwrap_err();
    assert!(matches!(err, BlsError::InvalidRequest(_)));
}

#[tokio::test]
async fn exit_aggregation_signs_the_exit_preimage() {
    let address = EthAddress::repeat_byte(0x42);
    let rewards = rewards_for(address, 500, 777);
    let (list, bus) = network(4, rewards.clone(), None);
    let aggregator = BlsAggregator::new(config(), bus, list, rewards);

    let exiting = BlsKeypair::from_seed(&[77; 32]).unwrap();
    let response = aggregator.aggregate_exit(exiting.public()).await.expect("aggregation");

    assert_eq!(response.exit_pubkey, *exiting.public());
    assert_eq!(response.signers_bls_pubkeys.len(), 4);
    assert_eq!(
        response.msg_to_sign,
        crate::exit_msg(&config(), ExitType::Exit, exiting.public(), response.timestamp)
    );
    let aggregate = BlsAggregateSignature::from_signature(&response.signature);
    assert!(aggregate.verify(&response.msg_to_sign, &response.signers_bls_pubkeys));
}
