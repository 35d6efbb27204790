// SPDX-License-Identifier: Apache-2.0

//! The dedicated pulse worker.
//!
//! One tokio task owns the [`RoundContext`] and drives it from two event
//! sources: a periodic tick and inbound quorum messages. Both funnel through
//! the same single-threaded loop, so the state handlers never need
//! synchronization.

use crate::{pump, PulseMessage, Quorum, RoundContext, TimeMs};
use oxen_config::{pulse::PULSE_TICK_INTERVAL, ChainConfig};
use oxen_types::{
    crypto::{Hash256, ServiceNodeKeys, SnPubkey},
    Block, HardFork,
};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// Chain tip metadata a round is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopBlockInfo {
    pub height: u64,
    pub hash: Hash256,
    /// Unix seconds.
    pub timestamp: u64,
}

/// The blockchain as pulse consumes it. Implementations must not block for
/// long: every call happens on the pulse worker's own thread.
pub trait ChainView: Send + Sync + 'static {
    fn top_block(&self) -> eyre::Result<TopBlockInfo>;

    fn hard_fork_version(&self) -> HardFork;

    /// The node owed the next block reward; mixed into the quorum seed.
    fn block_leader(&self) -> SnPubkey;

    /// Active service nodes in canonical order.
    fn active_service_nodes(&self) -> Vec<SnPubkey>;

    fn is_active_service_node(&self, key: &SnPubkey) -> bool;

    /// Build the next block paying `producer`, without pulse fields filled.
    fn create_pulse_block_template(&self, producer: &SnPubkey, height: u64)
        -> eyre::Result<Block>;

    /// Hand the fully signed pulse block to the block pipeline.
    fn submit_block(&self, block: Block) -> eyre::Result<()>;
}

/// Outbound quorum messaging.
pub trait MessageRelay: Send + Sync + 'static {
    fn relay(&self, msg: &PulseMessage, quorum: &Quorum, from_producer: bool) -> eyre::Result<()>;
}

/// Sending half handed to the quorum bus for inbound pulse messages.
#[derive(Clone, Debug)]
pub struct PulseHandle {
    tx: mpsc::Sender<PulseMessage>,
}

impl PulseHandle {
    /// Queue an inbound message for the worker; drops (with a log line) when
    /// the worker is saturated or gone.
    pub fn deliver(&self, msg: PulseMessage) {
        if let Err(e) = self.tx.try_send(msg) {
            warn!(target: "oxen::pulse", "dropping inbound pulse message: {e}");
        }
    }
}

pub struct PulseWorker<C, R> {
    context: RoundContext,
    chain: C,
    relay: R,
    keys: ServiceNodeKeys,
    config: ChainConfig,
    rx: mpsc::Receiver<PulseMessage>,
}

impl<C: ChainView, R: MessageRelay> PulseWorker<C, R> {
    const INBOUND_QUEUE_DEPTH: usize = 256;

    pub fn new(chain: C, relay: R, keys: ServiceNodeKeys, config: ChainConfig) -> (Self, PulseHandle) {
        let (tx, rx) = mpsc::channel(Self::INBOUND_QUEUE_DEPTH);
        let worker = Self { context: RoundContext::new(), chain, relay, keys, config, rx };
        (worker, PulseHandle { tx })
    }

    /// Run until shutdown. Spawn with `tokio::spawn(worker.run(shutdown))`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(target: "oxen::pulse", "pulse worker starting");
        let mut tick = tokio::time::interval(PULSE_TICK_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tick.tick() => {}
                Some(msg) = self.rx.recv() => {
                    self.context.handle_message(msg, Some(&self.relay));
                }
            }

            if !self.pulse_active() {
                continue;
            }
            pump(&mut self.context, unix_now_ms(), &self.chain, &self.relay, &self.keys);
        }
        info!(target: "oxen::pulse", "pulse worker stopped");
    }

    /// Pulse only runs once the chain has passed its activation height.
    fn pulse_active(&self) -> bool {
        match self.chain.top_block() {
            Ok(top) => top.height + 1 >= self.config.pulse_fork_height,
            Err(_) => false,
        }
    }
}

pub(crate) fn unix_now_ms() -> TimeMs {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as TimeMs).unwrap_or(0)
}
