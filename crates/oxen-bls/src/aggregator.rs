//! Quorum-wide signature aggregation.
//!
//! One request fans out to every reachable active service node; responses
//! resolve on arbitrary bus threads, so the running aggregate sits behind a
//! mutex. Individual failures (unreachable node, bad echo, invalid
//! signature) drop that response and nothing else; the only way a whole
//! aggregation fails is an invalid request.

use crate::{
    exit_msg, reward_balance_msg, verify_msg, AggregateExitResponse, AggregationState, BlsError,
    BlsResult, BusReply, ExitReply, ExitRequest, ExitType, LiquidateReply, ReplyStatus,
    RewardBalanceReply, RewardsResponse, RewardsView, ENDPOINT_GET_EXIT,
    ENDPOINT_GET_LIQUIDATION, ENDPOINT_GET_REWARD_BALANCE,
};
use async_trait::async_trait;
use futures::StreamExt as _;
use oxen_config::ChainConfig;
use oxen_types::{
    crypto::{BlsPublicKey, BlsSignature},
    EthAddress, ServiceNodeAddress,
};
use parking_lot::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{trace, warn};

/// Outbound request transport to other service nodes.
#[async_trait]
pub trait QuorumBus: Send + Sync + 'static {
    async fn request(
        &self,
        node: &ServiceNodeAddress,
        endpoint: &str,
        body: Vec<u8>,
    ) -> eyre::Result<BusReply>;
}

/// Read access to the service-node list.
pub trait SnListView: Send + Sync + 'static {
    fn reachable_active_nodes(&self) -> Vec<ServiceNodeAddress>;
    fn height(&self) -> u64;
}

/// Fan-out knobs.
#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    /// Cap on concurrently outstanding requests.
    pub max_connections: usize,
    /// Hard per-request deadline.
    pub request_timeout: Duration,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self { max_connections: 900, request_timeout: Duration::from_secs(10) }
    }
}

pub struct BlsAggregator<B, L, R> {
    bus: B,
    sn_list: L,
    rewards: R,
    config: ChainConfig,
    options: AggregatorOptions,
}

impl<B: QuorumBus, L: SnListView, R: RewardsView> BlsAggregator<B, L, R> {
    pub fn new(config: ChainConfig, bus: B, sn_list: L, rewards: R) -> Self {
        Self::with_options(config, bus, sn_list, rewards, AggregatorOptions::default())
    }

    pub fn with_options(
        config: ChainConfig,
        bus: B,
        sn_list: L,
        rewards: R,
        options: AggregatorOptions,
    ) -> Self {
        Self { bus, sn_list, rewards, config, options }
    }

    /// Ask the whole network to sign off on `address`'s accrued balance and
    /// aggregate the responses.
    pub async fn rewards_request(&self, address: &EthAddress) -> BlsResult<RewardsResponse> {
        let (height, amount) = self.rewards.accrued_balance(address);
        trace!(
            target: "oxen::bls",
            %address, amount, height,
            "initiating rewards signature aggregation"
        );

        if *address == EthAddress::ZERO {
            return Err(BlsError::InvalidRequest(
                "rewards request for the zero address".to_string(),
            ));
        }
        if amount == 0 {
            return Err(BlsError::InvalidRequest(format!(
                "no rewards are available for '{address}' at height {height}"
            )));
        }
        if height > self.sn_list.height() {
            return Err(BlsError::InvalidRequest(format!(
                "balance height {height} is above the service node list height {}",
                self.sn_list.height()
            )));
        }

        let msg_to_sign = reward_balance_msg(&self.config, address, amount);
        let state = Mutex::new(AggregationState::new());

        self.nodes_request(
            ENDPOINT_GET_REWARD_BALANCE,
            address.as_slice().to_vec(),
            &|node, result| {
                match verify_rewards_response(
                    &msg_to_sign,
                    address,
                    amount,
                    height,
                    node,
                    result,
                ) {
                    Ok(signature) => accept(&state, node, &signature),
                    Err(e) => {
                        warn!(
                            target: "oxen::bls",
                            node = %node.sn_pubkey, %e,
                            "reward balance response rejected"
                        );
                    }
                }
            },
        )
        .await;

        let state = state.into_inner();
        Ok(RewardsResponse {
            address: *address,
            amount,
            height,
            msg_to_sign,
            signature: state.aggregate.to_signature(),
            signers_bls_pubkeys: state.signers,
        })
    }

    /// Aggregate signatures approving a voluntary exit.
    pub async fn aggregate_exit(
        &self,
        bls_pubkey: &BlsPublicKey,
    ) -> BlsResult<AggregateExitResponse> {
        self.aggregate_exit_or_liquidate(bls_pubkey, ExitType::Exit).await
    }

    /// Aggregate signatures approving a liquidation.
    pub async fn aggregate_liquidation(
        &self,
        bls_pubkey: &BlsPublicKey,
    ) -> BlsResult<AggregateExitResponse> {
        self.aggregate_exit_or_liquidate(bls_pubkey, ExitType::Liquidate).await
    }

    /// Exit and liquidation differ only in the endpoint, the message tag and
    /// the dict key the subject is echoed under.
    async fn aggregate_exit_or_liquidate(
        &self,
        bls_pubkey: &BlsPublicKey,
        exit_type: ExitType,
    ) -> BlsResult<AggregateExitResponse> {
        let endpoint = match exit_type {
            ExitType::Exit => ENDPOINT_GET_EXIT,
            ExitType::Liquidate => ENDPOINT_GET_LIQUIDATION,
        };
        let timestamp = unix_now();
        let msg_to_sign = exit_msg(&self.config, exit_type, bls_pubkey, timestamp);

        let request = ExitRequest {
            bls_pubkey: bls_pubkey.to_bytes().to_vec(),
            timestamp,
        };
        let body = serde_bencode::to_bytes(&request)
            .map_err(|e| BlsError::InvalidRequest(format!("failed to encode request: {e}")))?;

        let state = Mutex::new(AggregationState::new());
        self.nodes_request(endpoint, body, &|node, result| {
            match verify_exit_response(&msg_to_sign, bls_pubkey, exit_type, node, result) {
                Ok(signature) => accept(&state, node, &signature),
                Err(e) => {
                    warn!(
                        target: "oxen::bls",
                        %endpoint, node = %node.sn_pubkey, %e,
                        "signature response rejected"
                    );
                }
            }
        })
        .await;

        let state = state.into_inner();
        Ok(AggregateExitResponse {
            exit_pubkey: *bls_pubkey,
            timestamp,
            msg_to_sign,
            signature: state.aggregate.to_signature(),
            signers_bls_pubkeys: state.signers,
        })
    }

    /// Send `body` to every reachable active node, at most
    /// `max_connections` in flight, and resolve when the last response (or
    /// timeout) has been handled.
    async fn nodes_request<F>(&self, endpoint: &'static str, body: Vec<u8>, on_response: &F)
    where
        F: Fn(&ServiceNodeAddress, eyre::Result<BusReply>) + Send + Sync,
    {
        let nodes = self.sn_list.reachable_active_nodes();
        trace!(target: "oxen::bls", %endpoint, nodes = nodes.len(), "fanning out bls request");

        futures::stream::iter(nodes)
            .for_each_concurrent(self.options.max_connections, |node| {
                let body = body.clone();
                async move {
                    let result = match tokio::time::timeout(
                        self.options.request_timeout,
                        self.bus.request(&node, endpoint, body),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(eyre::eyre!("request timed out")),
                    };
                    on_response(&node, result);
                }
            })
            .await;
    }
}

/// Fold a verified signature into the running aggregate.
fn accept(state: &Mutex<AggregationState>, node: &ServiceNodeAddress, signature: &BlsSignature) {
    let mut guard = state.lock();
    if guard.aggregate.add(signature).is_ok() {
        guard.signers.push(node.bls_pubkey);
    } else {
        warn!(
            target: "oxen::bls",
            node = %node.sn_pubkey,
            "signature could not be folded into the aggregate"
        );
    }
}

fn reply_body(node_result: eyre::Result<BusReply>) -> BlsResult<Vec<u8>> {
    let reply = node_result.map_err(|e| BlsError::RequestFailed(e.to_string()))?;
    if reply.status != ReplyStatus::Ok {
        return Err(BlsError::RequestFailed(format!(
            "{} {}",
            reply.status.code(),
            String::from_utf8_lossy(&reply.body)
        )));
    }
    Ok(reply.body)
}

fn verify_rewards_response(
    msg_to_sign: &[u8],
    address: &EthAddress,
    amount: u64,
    height: u64,
    node: &ServiceNodeAddress,
    node_result: eyre::Result<BusReply>,
) -> BlsResult<BlsSignature> {
    let body = reply_body(node_result)?;
    let reply: RewardBalanceReply = serde_bencode::from_bytes(&body)
        .map_err(|e| BlsError::MalformedResponse(e.to_string()))?;

    if reply.address != address.as_slice() {
        return Err(BlsError::SubjectMismatch);
    }
    if reply.amount != amount || reply.height != height {
        return Err(BlsError::BalanceMismatch {
            expected_amount: amount,
            expected_height: height,
            amount: reply.amount,
            height: reply.height,
        });
    }

    let signature = BlsSignature::from_bytes(&reply.signature)
        .map_err(|e| BlsError::MalformedResponse(e.to_string()))?;
    if !verify_msg(&signature, &node.bls_pubkey, msg_to_sign) {
        return Err(BlsError::SignatureInvalid(node.bls_pubkey.to_string()));
    }
    Ok(signature)
}

fn verify_exit_response(
    msg_to_sign: &[u8],
    bls_pubkey: &BlsPublicKey,
    exit_type: ExitType,
    node: &ServiceNodeAddress,
    node_result: eyre::Result<BusReply>,
) -> BlsResult<BlsSignature> {
    let body = reply_body(node_result)?;
    let (echoed, signature_bytes) = match exit_type {
        ExitType::Exit => {
            let reply: ExitReply = serde_bencode::from_bytes(&body)
                .map_err(|e| BlsError::MalformedResponse(e.to_string()))?;
            (reply.exit, reply.signature)
        }
        ExitType::Liquidate => {
            let reply: LiquidateReply = serde_bencode::from_bytes(&body)
                .map_err(|e| BlsError::MalformedResponse(e.to_string()))?;
            (reply.liquidate, reply.signature)
        }
    };

    if echoed != bls_pubkey.to_bytes().as_slice() {
        return Err(BlsError::SubjectMismatch);
    }
    let signature = BlsSignature::from_bytes(&signature_bytes)
        .map_err(|e| BlsError::MalformedResponse(e.to_string()))?;
    if !verify_msg(&signature, &node.bls_pubkey, msg_to_sign) {
        return Err(BlsError::SignatureInvalid(node.bls_pubkey.to_string()));
    }
    Ok(signature)
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

#[cfg(test)]
#[path = "tests/aggregator_tests.rs"]
mod aggregator_tests;
