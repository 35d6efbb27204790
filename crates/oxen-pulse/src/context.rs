//! Per-round state.
//!
//! The `RoundContext` is owned exclusively by the pulse worker and threaded
//! through the state handlers; nothing else may touch it. Each wait stage
//! keeps one early-arrival slot per validator position (first arrival wins)
//! so messages from later stages survive until the machine catches up.

use crate::{
    message_signature_hash, MessageRelay, PulseMessage, PulseMessageKind, Quorum, Stage,
    StageDeadlines, TimeMs,
};
use oxen_config::pulse::PULSE_QUORUM_NUM_VALIDATORS;
use oxen_types::{
    crypto::{hash_parts, verify_sn_signature, Hash256, SnSignature},
    try_decode, Block, PulseRandomValue,
};
use tracing::{debug, error, info};

/// States in protocol order; ordering comparisons drive the early-message
/// queueing and the lock-in filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RoundState {
    WaitForNextBlock,
    PrepareForRound,
    WaitForRound,
    SubmitHandshakes,
    WaitForHandshakes,
    SubmitHandshakeBitset,
    WaitForHandshakeBitsets,
    SubmitBlockTemplate,
    WaitForBlockTemplate,
    SubmitRandomValueHash,
    WaitForRandomValueHashes,
    SubmitRandomValue,
    WaitForRandomValue,
    SubmitSignedBlock,
    WaitForSignedBlocks,
}

impl RoundState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundState::WaitForNextBlock => "Wait For Next Block",
            RoundState::PrepareForRound => "Prepare For Round",
            RoundState::WaitForRound => "Wait For Round",
            RoundState::SubmitHandshakes => "Submit Handshakes",
            RoundState::WaitForHandshakes => "Wait For Handshakes",
            RoundState::SubmitHandshakeBitset => "Submit Handshake Bitset",
            RoundState::WaitForHandshakeBitsets => "Wait For Validator Handshake Bitsets",
            RoundState::SubmitBlockTemplate => "Submit Block Template",
            RoundState::WaitForBlockTemplate => "Wait For Block Template",
            RoundState::SubmitRandomValueHash => "Submit Random Value Hash",
            RoundState::WaitForRandomValueHashes => "Wait For Random Value Hash",
            RoundState::SubmitRandomValue => "Submit Random Value",
            RoundState::WaitForRandomValue => "Wait For Random Value",
            RoundState::SubmitSignedBlock => "Submit Signed Block",
            RoundState::WaitForSignedBlocks => "Wait For Signed Blocks",
        }
    }
}

/// What this node is doing in the current quorum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    None,
    Producer,
    Validator,
}

/// Book-keeping shared by every wait stage.
#[derive(Debug, Clone)]
pub(crate) struct WaitStage {
    /// Early arrivals, one slot per validator position.
    pub queue: [Option<PulseMessage>; PULSE_QUORUM_NUM_VALIDATORS],
    /// Positions a message has been accepted from.
    pub bitset: u16,
    /// Unique messages accepted.
    pub msgs_received: u16,
    pub end_time: TimeMs,
}

impl Default for WaitStage {
    fn default() -> Self {
        Self {
            queue: std::array::from_fn(|_| None),
            bitset: 0,
            msgs_received: 0,
            end_time: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct RoundContext {
    pub state: RoundState,

    // Scoped to the height being produced.
    pub height: u64,
    pub top_hash: Hash256,
    pub top_timestamp: u64,
    pub round_0_start: TimeMs,

    // Scoped to the round.
    pub queue_for_next_round: bool,
    pub round: u8,
    pub quorum: Quorum,
    pub role: Role,
    pub my_position: usize,
    pub node_name: String,
    pub round_start: TimeMs,
    pub deadlines: StageDeadlines,

    // Stage buffers.
    pub(crate) handshakes: [bool; PULSE_QUORUM_NUM_VALIDATORS],
    pub(crate) handshakes_stage: WaitStage,
    pub(crate) bitsets: [Option<u16>; PULSE_QUORUM_NUM_VALIDATORS],
    pub(crate) bitsets_stage: WaitStage,
    /// Most-common bitset, locked in for the round by the producer.
    pub(crate) locked_bitset: u16,
    /// Number of validators that voted for `locked_bitset`.
    pub(crate) locked_count: u16,
    pub(crate) template_block: Option<Block>,
    pub(crate) template_stage: WaitStage,
    pub(crate) my_random_value: PulseRandomValue,
    pub(crate) rv_hashes: [Option<Hash256>; PULSE_QUORUM_NUM_VALIDATORS],
    pub(crate) rv_hashes_stage: WaitStage,
    pub(crate) rv_values: [Option<PulseRandomValue>; PULSE_QUORUM_NUM_VALIDATORS],
    pub(crate) rv_values_stage: WaitStage,
    /// The final block blob this node signs and expects signatures over.
    pub(crate) final_block_blob: Vec<u8>,
    pub(crate) signatures: [Option<SnSignature>; PULSE_QUORUM_NUM_VALIDATORS],
    pub(crate) signed_stage: WaitStage,
}

impl Default for RoundState {
    fn default() -> Self {
        RoundState::WaitForNextBlock
    }
}

impl RoundContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Pulse B<height> R<round>: <name> '<state>'` — prefixed to every log
    /// line so interleaved rounds stay readable.
    pub fn log_prefix(&self) -> String {
        let round =
            if self.state >= RoundState::PrepareForRound { self.round } else { 0 };
        let name = if self.node_name.is_empty() {
            String::new()
        } else {
            format!("{} ", self.node_name)
        };
        format!("Pulse B{} R{}: {}'{}' ", self.height, round, name, self.state.as_str())
    }

    /// Clear every stage buffer for a fresh round. Deadlines are assigned by
    /// `prepare_for_round` afterwards.
    pub(crate) fn reset_stages(&mut self) {
        self.handshakes = Default::default();
        self.handshakes_stage = Default::default();
        self.bitsets = Default::default();
        self.bitsets_stage = Default::default();
        self.locked_bitset = 0;
        self.locked_count = 0;
        self.template_block = None;
        self.template_stage = Default::default();
        self.my_random_value = Default::default();
        self.rv_hashes = Default::default();
        self.rv_hashes_stage = Default::default();
        self.rv_values = Default::default();
        self.rv_values_stage = Default::default();
        self.final_block_blob.clear();
        self.signatures = Default::default();
        self.signed_stage = Default::default();
    }

    /// The bitset later stages are locked to: the template's, or 0 when no
    /// template was received (which drops everything, our own messages
    /// included).
    pub(crate) fn template_validator_bitset(&self) -> u16 {
        self.template_block.as_ref().map(|block| block.pulse.validator_bitset).unwrap_or(0)
    }

    pub(crate) fn stage_mut(&mut self, stage: Stage) -> &mut WaitStage {
        match stage {
            Stage::Handshakes => &mut self.handshakes_stage,
            Stage::HandshakeBitsets => &mut self.bitsets_stage,
            Stage::BlockTemplate => &mut self.template_stage,
            Stage::RandomValueHashes => &mut self.rv_hashes_stage,
            Stage::RandomValues => &mut self.rv_values_stage,
            Stage::SignedBlocks => &mut self.signed_stage,
        }
    }

    /// The state in which a stage's messages are consumed.
    fn consuming_state(stage: Stage) -> RoundState {
        match stage {
            Stage::Handshakes => RoundState::WaitForHandshakes,
            Stage::HandshakeBitsets => RoundState::WaitForHandshakeBitsets,
            Stage::BlockTemplate => RoundState::WaitForBlockTemplate,
            Stage::RandomValueHashes => RoundState::WaitForRandomValueHashes,
            Stage::RandomValues => RoundState::WaitForRandomValue,
            Stage::SignedBlocks => RoundState::WaitForSignedBlocks,
        }
    }

    /// Build and sign one of our own messages.
    pub(crate) fn make_signed_message(
        &self,
        kind: PulseMessageKind,
        keys: &oxen_types::crypto::ServiceNodeKeys,
    ) -> PulseMessage {
        let mut msg = PulseMessage {
            quorum_position: self.my_position as u16,
            kind,
            signature: SnSignature::default(),
        };
        msg.signature =
            keys.sign(&message_signature_hash(&self.top_hash, &msg, &self.final_block_blob));
        msg
    }

    /// Verify a message signature against the sender's quorum key. Block
    /// templates must come from position 0 (the producer); everything else
    /// from a validator position.
    pub(crate) fn msg_signature_check(&self, msg: &PulseMessage) -> bool {
        let key = match &msg.kind {
            PulseMessageKind::BlockTemplate { .. } => {
                if msg.quorum_position != 0 {
                    error!(
                        target: "oxen::pulse",
                        "{}quorum position {} in pulse message indexes oob",
                        self.log_prefix(), msg.quorum_position
                    );
                    return false;
                }
                &self.quorum.producer
            }
            _ => match self.quorum.validators.get(msg.quorum_position as usize) {
                Some(key) => key,
                None => {
                    error!(
                        target: "oxen::pulse",
                        "{}quorum position {} in pulse message indexes oob",
                        self.log_prefix(), msg.quorum_position
                    );
                    return false;
                }
            },
        };

        let hash = message_signature_hash(&self.top_hash, msg, &self.final_block_blob);
        if !verify_sn_signature(&hash, key, &msg.signature) {
            error!(
                target: "oxen::pulse",
                "{}signature for {} at height {} is invalid",
                self.log_prefix(), msg, self.height
            );
            return false;
        }
        true
    }

    /// Feed one inbound (or own) message into the round. Early messages are
    /// queued per position; messages from outside the locked-in validator
    /// set are dropped once the template is in; accepted messages are
    /// re-relayed to the quorum when `relay` is given.
    pub fn handle_message(&mut self, msg: PulseMessage, relay: Option<&dyn MessageRelay>) {
        // Signed-block signatures cover our final block blob, which only
        // exists once we reach the signed-block stage ourselves, so their
        // verification is deferred to the acceptance branch below.
        if !matches!(msg.kind, PulseMessageKind::SignedBlock) && !self.msg_signature_check(&msg) {
            return;
        }

        let position = msg.quorum_position as usize;
        if position >= PULSE_QUORUM_NUM_VALIDATORS
            && !matches!(msg.kind, PulseMessageKind::BlockTemplate { .. })
        {
            return;
        }

        let stage = msg.kind.stage();
        if self.state < Self::consuming_state(stage) {
            let prefix = self.log_prefix();
            let slot_index = position.min(PULSE_QUORUM_NUM_VALIDATORS - 1);
            let slot = &mut self.stage_mut(stage).queue[slot_index];
            if slot.is_none() {
                debug!(
                    target: "oxen::pulse",
                    "{prefix}message received early {msg}, queueing until we're ready"
                );
                *slot = Some(msg);
            }
            return;
        }

        let validator_bit = 1u16 << position;
        if self.state > RoundState::WaitForBlockTemplate
            && validator_bit & self.template_validator_bitset() == 0
        {
            debug!(
                target: "oxen::pulse",
                "{}dropping {}, not a locked in participant",
                self.log_prefix(), msg
            );
            return;
        }

        match &msg.kind {
            PulseMessageKind::Handshake => {
                if self.handshakes[position] {
                    return;
                }
                self.handshakes[position] = true;
                debug!(
                    target: "oxen::pulse",
                    "{}received handshake with quorum position bit {}",
                    self.log_prefix(), position
                );
            }
            PulseMessageKind::HandshakeBitset { validator_bitset } => {
                if self.bitsets[position].is_some() {
                    return;
                }
                self.bitsets[position] = Some(*validator_bitset);
            }
            PulseMessageKind::BlockTemplate { block_blob } => {
                if self.template_stage.msgs_received == 1 {
                    return;
                }
                let block: Block = match try_decode(block_blob) {
                    Ok(block) => block,
                    Err(_) => {
                        info!(
                            target: "oxen::pulse",
                            "{}received unparsable pulse block template blob",
                            self.log_prefix()
                        );
                        return;
                    }
                };
                if block.pulse.round != self.round {
                    info!(
                        target: "oxen::pulse",
                        "{}received pulse block template specifying different round {}, expected {}",
                        self.log_prefix(), block.pulse.round, self.round
                    );
                    return;
                }
                self.template_block = Some(block);
            }
            PulseMessageKind::RandomValueHash { hash } => {
                if self.rv_hashes[position].is_some() {
                    return;
                }
                self.rv_hashes[position] = Some(*hash);
            }
            PulseMessageKind::RandomValue { value } => {
                if self.rv_values[position].is_some() {
                    return;
                }
                if let Some(expected) = &self.rv_hashes[position] {
                    let derived = hash_parts([value.0.as_slice()]);
                    if derived != *expected {
                        info!(
                            target: "oxen::pulse",
                            "{}dropping {}, rederived random value hash does not match the original",
                            self.log_prefix(), msg
                        );
                        return;
                    }
                }
                self.rv_values[position] = Some(*value);
            }
            PulseMessageKind::SignedBlock => {
                // Deferred verification against our final block blob.
                if !self.msg_signature_check(&msg) {
                    debug!(
                        target: "oxen::pulse",
                        "{}dropping {}, sender's final block template signature does not match ours",
                        self.log_prefix(), msg
                    );
                    return;
                }
                if self.signatures[position].is_some() {
                    return;
                }
                self.signatures[position] = Some(msg.signature);
            }
        }

        let stage = self.stage_mut(stage);
        stage.bitset |= validator_bit;
        stage.msgs_received += 1;

        if let Some(relay) = relay {
            if let Err(e) = relay.relay(&msg, &self.quorum, self.role == Role::Producer) {
                debug!(target: "oxen::pulse", "{}failed to re-relay {}: {e}", self.log_prefix(), msg);
            }
        }
    }

    /// Process any messages that arrived before `stage` was entered.
    pub(crate) fn handle_messages_received_early(
        &mut self,
        stage: Stage,
        relay: Option<&dyn MessageRelay>,
    ) {
        let queued: Vec<PulseMessage> = self
            .stage_mut(stage)
            .queue
            .iter_mut()
            .filter_map(|slot| slot.take())
            .collect();
        for msg in queued {
            self.handle_message(msg, relay);
        }
    }
}
