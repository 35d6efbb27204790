// SPDX-License-Identifier: Apache-2.0

//! BLS signature service.
//!
//! Every active service node serves three signing endpoints over the quorum
//! bus (reward balance, exit, liquidation); the aggregator fans a request out
//! to the whole active list, verifies each individual signature and folds the
//! survivors into one aggregate the L2 rewards contract can check against the
//! summed public keys.

mod aggregator;
mod error;
mod server;
mod signer;
mod types;

pub use aggregator::*;
pub use error::*;
pub use server::*;
pub use signer::*;
pub use types::*;
