// SPDX-License-Identifier: Apache-2.0

//! Core types shared by the Oxen daemon subsystems: account addresses,
//! amounts, blocks, service-node records, crypto wrappers and the
//! serialization codec.

mod address;
mod amounts;
mod block;
mod codec;
pub mod crypto;
mod error;
pub mod l2;
mod network;
mod service_nodes;

pub use address::*;
pub use amounts::*;
pub use block::*;
pub use codec::*;
pub use error::*;
pub use network::*;
pub use service_nodes::*;

pub use alloy::primitives::{keccak256, Address as EthAddress, U256};
