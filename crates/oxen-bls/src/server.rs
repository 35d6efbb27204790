// SPDX-License-Identifier: Apache-2.0

//! The three signing endpoints an active service node serves on the quorum
//! bus. Request parsing and transport live with the bus; these handlers take
//! the raw data parts and return a status + body reply.

use crate::{
    exit_msg, reward_balance_msg, BlsError, BlsSigner, BusReply, ExitReply, ExitRequest,
    ExitType, LiquidateReply, RewardBalanceReply,
};
use oxen_config::rewards::BLS_MAX_TIME_ALLOWED_FOR_EXIT_REQUEST;
use oxen_types::{
    crypto::{BlsPublicKey, BLS_PUBLIC_KEY_LENGTH},
    EthAddress,
};
use tracing::trace;

pub const ENDPOINT_GET_REWARD_BALANCE: &str = "bls.get_reward_balance";
pub const ENDPOINT_GET_EXIT: &str = "bls.get_exit";
pub const ENDPOINT_GET_LIQUIDATION: &str = "bls.get_liquidation";

/// Read access to the local rewards ledger.
pub trait RewardsView: Send + Sync + 'static {
    /// `(ledger_height, accrued_atomic_amount)` for an L2 address.
    fn accrued_balance(&self, address: &EthAddress) -> (u64, u64);
}

/// Local knowledge of whether a node may currently leave the network.
pub trait NodeStatusView: Send + Sync + 'static {
    fn is_removable(&self, bls_pubkey: &BlsPublicKey) -> bool;
    fn is_liquidatable(&self, bls_pubkey: &BlsPublicKey) -> bool;
}

/// Endpoint handlers, wired with this node's signer and local state views.
pub struct BlsEndpoints<R, S> {
    signer: BlsSigner,
    rewards: R,
    status: S,
}

impl<R: RewardsView, S: NodeStatusView> BlsEndpoints<R, S> {
    pub fn new(signer: BlsSigner, rewards: R, status: S) -> Self {
        Self { signer, rewards, status }
    }

    /// Dispatch one bus request by endpoint name.
    pub fn handle_request(&self, endpoint: &str, parts: &[Vec<u8>], now_unix: u64) -> BusReply {
        match endpoint {
            ENDPOINT_GET_REWARD_BALANCE => self.get_reward_balance(parts),
            ENDPOINT_GET_EXIT => self.get_exit(parts, now_unix),
            ENDPOINT_GET_LIQUIDATION => self.get_liquidation(parts, now_unix),
            other => BusReply::bad_request(format!("unknown bls endpoint '{other}'")),
        }
    }

    /// `bls.get_reward_balance`: sign this node's view of an address's
    /// accrued balance. 400 on malformed input or a zero balance.
    pub fn get_reward_balance(&self, parts: &[Vec<u8>]) -> BusReply {
        trace!(target: "oxen::bls", "received rewards signature request");
        let address = match extract_eth_address(parts) {
            Ok(address) => address,
            Err(reply) => return reply,
        };

        let (height, amount) = self.rewards.accrued_balance(&address);
        if amount == 0 {
            return error_reply(BlsError::BadRequest(format!(
                "address '{address}' has a zero balance in the database"
            )));
        }

        let msg = reward_balance_msg(self.signer.config(), &address, amount);
        let signature = self.signer.sign_msg(&msg);

        let reply = RewardBalanceReply {
            address: address.as_slice().to_vec(),
            amount,
            height,
            signature: signature.to_bytes().to_vec(),
        };
        match serde_bencode::to_bytes(&reply) {
            Ok(body) => BusReply::ok(body),
            Err(e) => BusReply::bad_request(format!("failed to encode reply: {e}")),
        }
    }

    /// `bls.get_exit`: sign off on a voluntary removal. 400 on malformed or
    /// stale requests, 403 when the node is not removable.
    pub fn get_exit(&self, parts: &[Vec<u8>], now_unix: u64) -> BusReply {
        trace!(target: "oxen::bls", "received exit signature request");
        let request = match extract_exit_request(parts, now_unix) {
            Ok(request) => request,
            Err(reply) => return reply,
        };

        if !self.status.is_removable(&request.pubkey) {
            return error_reply(BlsError::Forbidden(format!(
                "the BLS pubkey {} is not currently removable",
                request.pubkey
            )));
        }

        let msg =
            exit_msg(self.signer.config(), ExitType::Exit, &request.pubkey, request.timestamp);
        let signature = self.signer.sign_msg(&msg);
        let reply = ExitReply {
            exit: request.pubkey.to_bytes().to_vec(),
            signature: signature.to_bytes().to_vec(),
        };
        match serde_bencode::to_bytes(&reply) {
            Ok(body) => BusReply::ok(body),
            Err(e) => BusReply::bad_request(format!("failed to encode reply: {e}")),
        }
    }

    /// `bls.get_liquidation`: sign off on liquidating a misbehaving node.
    /// 403 when local state says the node is not liquidatable.
    pub fn get_liquidation(&self, parts: &[Vec<u8>], now_unix: u64) -> BusReply {
        trace!(target: "oxen::bls", "received liquidation signature request");
        let request = match extract_exit_request(parts, now_unix) {
            Ok(request) => request,
            Err(reply) => return reply,
        };

        if !self.status.is_liquidatable(&request.pubkey) {
            return error_reply(BlsError::Forbidden(format!(
                "the BLS key {} is not currently liquidatable",
                request.pubkey
            )));
        }

        let msg = exit_msg(
            self.signer.config(),
            ExitType::Liquidate,
            &request.pubkey,
            request.timestamp,
        );
        let signature = self.signer.sign_msg(&msg);
        let reply = LiquidateReply {
            liquidate: request.pubkey.to_bytes().to_vec(),
            signature: signature.to_bytes().to_vec(),
        };
        match serde_bencode::to_bytes(&reply) {
            Ok(body) => BusReply::ok(body),
            Err(e) => BusReply::bad_request(format!("failed to encode reply: {e}")),
        }
    }
}

/// Map a server-side error onto its bus status code.
fn error_reply(error: BlsError) -> BusReply {
    match &error {
        BlsError::Forbidden(_) => BusReply::forbidden(error.to_string()),
        _ => BusReply::bad_request(error.to_string()),
    }
}

/// Accepts raw 20 bytes, hex, or 0x-prefixed hex.
fn extract_eth_address(parts: &[Vec<u8>]) -> Result<EthAddress, BusReply> {
    if parts.len() != 1 {
        return Err(error_reply(BlsError::BadRequest(format!(
            "BLS rewards command should have one ETH address data part; received {}",
            parts.len()
        ))));
    }
    let part = &parts[0];
    if part.len() == 20 {
        return Ok(EthAddress::from_slice(part));
    }
    let hex = match part.as_slice() {
        [b'0', b'x' | b'X', rest @ ..] if rest.len() == 40 => rest,
        rest if rest.len() == 40 => rest,
        _ => {
            return Err(error_reply(BlsError::BadRequest(format!(
                "BLS rewards command data should be a 20-byte ETH address; got {} bytes",
                part.len()
            ))))
        }
    };
    let mut bytes = [0u8; 20];
    for (i, chunk) in hex.chunks_exact(2).enumerate() {
        let parsed = std::str::from_utf8(chunk)
            .ok()
            .and_then(|s| u8::from_str_radix(s, 16).ok());
        match parsed {
            Some(byte) => bytes[i] = byte,
            None => {
                return Err(error_reply(BlsError::BadRequest(
                    "BLS rewards command data is not valid hex".to_string(),
                )))
            }
        }
    }
    Ok(EthAddress::new(bytes))
}

struct ParsedExitRequest {
    pubkey: BlsPublicKey,
    timestamp: u64,
}

fn extract_exit_request(parts: &[Vec<u8>], now_unix: u64) -> Result<ParsedExitRequest, BusReply> {
    if parts.len() != 1 {
        return Err(error_reply(BlsError::BadRequest(format!(
            "BLS exit command should have one data part; received {}",
            parts.len()
        ))));
    }

    let request: ExitRequest = match serde_bencode::from_bytes(&parts[0]) {
        Ok(request) => request,
        Err(e) => {
            return Err(error_reply(BlsError::BadRequest(format!(
                "BLS exit command specified bad bls pubkey or timestamp: {e}"
            ))))
        }
    };
    if request.bls_pubkey.len() != BLS_PUBLIC_KEY_LENGTH {
        return Err(error_reply(BlsError::BadRequest(format!(
            "BLS exit command pubkey should be {BLS_PUBLIC_KEY_LENGTH} bytes; got {}",
            request.bls_pubkey.len()
        ))));
    }
    let pubkey = match BlsPublicKey::from_bytes(&request.bls_pubkey) {
        Ok(pubkey) => pubkey,
        Err(e) => {
            return Err(error_reply(BlsError::BadRequest(format!(
                "BLS exit command specified bad bls pubkey: {e}"
            ))))
        }
    };

    // Clock drift can put the request a little in the future; only the
    // absolute age matters.
    let age_secs = now_unix.abs_diff(request.timestamp);
    if age_secs > BLS_MAX_TIME_ALLOWED_FOR_EXIT_REQUEST.as_secs() {
        return Err(error_reply(BlsError::StaleTimestamp { age_secs }));
    }

    Ok(ParsedExitRequest { pubkey, timestamp: request.timestamp })
}

#[cfg(test)]
#[path = "tests/server_tests.rs"]
mod server_tests;
