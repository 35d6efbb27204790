// SPDX-License-Identifier: Apache-2.0

//! Service-node registration state as the core subsystems consume it.
//!
//! The authoritative list lives with the service-node list collaborator; the
//! ledger and pulse take immutable snapshots of it per block.

use crate::{crypto::BlsPublicKey, crypto::SnPubkey, AccountAddress};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One staker's contribution to a service node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub address: AccountAddress,
    /// Staked atomic amount.
    pub amount: u64,
}

/// Registration record for a single service node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceNodeInfo {
    pub operator_address: AccountAddress,
    /// Operator fee in staking portions (out of `STAKING_PORTIONS`).
    pub portions_for_operator: u64,
    /// Contribution rows, operator's own stake included.
    pub contributors: Vec<Contributor>,
    /// Whether the node is active (funded, not decommissioned).
    pub active: bool,
    pub bls_pubkey: BlsPublicKey,
}

impl ServiceNodeInfo {
    pub fn total_contributed(&self) -> u64 {
        self.contributors.iter().map(|c| c.amount).sum()
    }
}

/// Snapshot of the service-node list at a height.
#[derive(Debug, Clone, Default)]
pub struct ServiceNodeList {
    /// Height the snapshot was taken at.
    pub height: u64,
    /// Registered nodes keyed by Ed25519 pubkey; BTreeMap so iteration order
    /// is identical on every node.
    pub infos: BTreeMap<SnPubkey, ServiceNodeInfo>,
}

impl ServiceNodeList {
    pub fn get(&self, pubkey: &SnPubkey) -> Option<&ServiceNodeInfo> {
        self.infos.get(pubkey)
    }

    /// Active nodes eligible for the per-block reward split.
    pub fn payable_infos(&self) -> Vec<(SnPubkey, &ServiceNodeInfo)> {
        self.infos.iter().filter(|(_, info)| info.active).map(|(k, v)| (*k, v)).collect()
    }

    /// Pubkeys of active nodes, in deterministic order.
    pub fn active_pubkeys(&self) -> Vec<SnPubkey> {
        self.infos
            .iter()
            .filter(|(_, info)| info.active)
            .map(|(k, _)| *k)
            .collect()
    }
}

/// Connection identity for one reachable service node on the quorum bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceNodeAddress {
    pub sn_pubkey: SnPubkey,
    pub bls_pubkey: BlsPublicKey,
    /// Bus address, e.g. `host:port`.
    pub address: String,
}
