// SPDX-License-Identifier: Apache-2.0

//! Pulse: cooperative round-based block production.
//!
//! For every height a deterministically elected quorum (one block producer,
//! eleven validators) runs a staged exchange — participation handshakes, a
//! block template, committed random values, final signatures — to produce a
//! signed block carrying a collective random value. Rounds escalate on
//! timeout or insufficient participation; the chain falls back to mined
//! blocks only when no quorum can be formed at all.

mod context;
mod error;
mod message;
mod quorum;
mod state_machine;
mod timings;
mod worker;

pub use context::*;
pub use error::*;
pub use message::*;
pub use quorum::*;
pub use state_machine::*;
pub use timings::*;
pub use worker::*;
