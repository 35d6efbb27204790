// SPDX-License-Identifier: Apache-2.0

//! Chain configuration.
//!
//! Every numeric constant that differs between networks lives in the
//! [`ChainConfig`] record; protocol-wide constants (pulse quorum shape,
//! staking portions, the paid-history prune window) are module constants
//! because changing them per network would change the consensus rules.

mod network;
pub mod pulse;
pub mod rewards;

pub use network::*;
