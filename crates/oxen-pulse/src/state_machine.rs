// SPDX-License-Identifier: Apache-2.0

//! The round state handlers.
//!
//! Each handler inspects the context plus the wall clock and either advances
//! (`KeepRunning`, the driver re-enters immediately) or parks until the next
//! external event (`ReturnToCaller`). Every fatal mid-round condition funnels
//! through [`goto_preparing_for_next_round`], which bumps the round and
//! regenerates the quorum; an unformable quorum instead falls back to
//! waiting for the next (mined) block.

use crate::{
    generate_pulse_quorum, round_for_clock, round_start_time, verify_pulse_quorum_sizes,
    ChainView, MessageRelay, PulseError, PulseMessage, PulseMessageKind, PulseResult,
    RoundContext, RoundState, Role, Stage, StageDeadlines, TimeMs,
};
use oxen_config::pulse::{PULSE_BLOCK_REQUIRED_SIGNATURES, PULSE_QUORUM_NUM_VALIDATORS};
use oxen_config::pulse::{PULSE_BITSET_AGREEMENT_DEN, PULSE_BITSET_AGREEMENT_NUM};
use oxen_types::{
    crypto::{hash_parts, Hash256, ServiceNodeKeys},
    BlockSignature, PulseRandomValue,
};
use rand::seq::SliceRandom as _;
use std::collections::HashMap;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLoop {
    KeepRunning,
    ReturnToCaller,
}

/// Drive the state machine to fixed point for this tick.
pub fn pump<C: ChainView, R: MessageRelay>(
    ctx: &mut RoundContext,
    now: TimeMs,
    chain: &C,
    relay: &R,
    keys: &ServiceNodeKeys,
) {
    loop {
        let result = match ctx.state {
            RoundState::WaitForNextBlock => wait_for_next_block(ctx, chain),
            RoundState::PrepareForRound => prepare_for_round(ctx, now, chain, keys),
            RoundState::WaitForRound => wait_for_round(ctx, now, chain),
            RoundState::SubmitHandshakes => submit_handshakes(ctx, relay, keys),
            RoundState::WaitForHandshakes => wait_for_handshakes(ctx, now, relay),
            RoundState::SubmitHandshakeBitset => submit_handshake_bitset(ctx, relay, keys),
            RoundState::WaitForHandshakeBitsets => wait_for_handshake_bitsets(ctx, now, relay),
            RoundState::SubmitBlockTemplate => submit_block_template(ctx, chain, relay, keys),
            RoundState::WaitForBlockTemplate => wait_for_block_template(ctx, now, relay),
            RoundState::SubmitRandomValueHash => submit_random_value_hash(ctx, relay, keys),
            RoundState::WaitForRandomValueHashes => wait_for_random_value_hashes(ctx, now, relay),
            RoundState::SubmitRandomValue => submit_random_value(ctx, relay, keys),
            RoundState::WaitForRandomValue => wait_for_random_value(ctx, now, relay),
            RoundState::SubmitSignedBlock => submit_signed_block(ctx, relay, keys),
            RoundState::WaitForSignedBlocks => wait_for_signed_blocks(ctx, now, chain, relay),
        };
        if result == EventLoop::ReturnToCaller {
            break;
        }
    }
}

/// Bump the round and re-prepare; the quorum is regenerated from scratch.
fn goto_preparing_for_next_round(ctx: &mut RoundContext) -> EventLoop {
    ctx.state = RoundState::PrepareForRound;
    ctx.queue_for_next_round = true;
    EventLoop::KeepRunning
}

fn wait_for_next_block<C: ChainView>(ctx: &mut RoundContext, chain: &C) -> EventLoop {
    let top = match chain.top_block() {
        Ok(top) => top,
        Err(e) => {
            error!(target: "oxen::pulse", "{}failed to query the top block: {e}", ctx.log_prefix());
            return EventLoop::ReturnToCaller;
        }
    };

    let producing_height = top.height + 1;
    if ctx.height == producing_height {
        return EventLoop::ReturnToCaller;
    }

    ctx.height = producing_height;
    ctx.top_hash = top.hash;
    ctx.top_timestamp = top.timestamp;
    ctx.round_0_start = crate::round_0_start_time(top.timestamp);

    ctx.queue_for_next_round = false;
    ctx.round = 0;
    ctx.role = Role::None;
    ctx.my_position = 0;
    ctx.node_name.clear();

    ctx.state = RoundState::PrepareForRound;
    EventLoop::KeepRunning
}

fn prepare_for_round<C: ChainView>(
    ctx: &mut RoundContext,
    now: TimeMs,
    chain: &C,
    keys: &ServiceNodeKeys,
) -> EventLoop {
    ctx.reset_stages();

    if ctx.queue_for_next_round {
        // An intermediate stage failed; wait out the next round, unless the
        // chain moved on underneath us.
        ctx.queue_for_next_round = false;
        ctx.round = ctx.round.saturating_add(1);

        if let Ok(top) = chain.top_block() {
            if top.height + 1 != ctx.height {
                ctx.state = RoundState::WaitForNextBlock;
                return EventLoop::KeepRunning;
            }
        }
    }

    // Clock drift or long failures may already put us several rounds in.
    let clock_round = round_for_clock(ctx.round_0_start, now);
    if clock_round > ctx.round {
        ctx.round = clock_round;
    }

    // Rounds exhausted for this height; only a mined block can advance the
    // chain now.
    if ctx.round == u8::MAX && clock_round == u8::MAX {
        info!(
            target: "oxen::pulse",
            "{}pulse rounds exhausted for height {}, waiting for a mined block",
            ctx.log_prefix(), ctx.height
        );
        ctx.state = RoundState::WaitForNextBlock;
        return EventLoop::KeepRunning;
    }

    ctx.round_start = round_start_time(ctx.round_0_start, ctx.round);
    ctx.deadlines = StageDeadlines::from_round_start(ctx.round_start);
    ctx.handshakes_stage.end_time = ctx.deadlines.handshakes;
    ctx.bitsets_stage.end_time = ctx.deadlines.handshake_bitsets;
    ctx.template_stage.end_time = ctx.deadlines.block_template;
    ctx.rv_hashes_stage.end_time = ctx.deadlines.random_value_hashes;
    ctx.rv_values_stage.end_time = ctx.deadlines.random_values;
    ctx.signed_stage.end_time = ctx.deadlines.signed_blocks;

    let active = chain.active_service_nodes();
    ctx.quorum = generate_pulse_quorum(
        &ctx.top_hash,
        &chain.block_leader(),
        chain.hard_fork_version(),
        &active,
        ctx.round,
    );
    if let Err(e) = verify_pulse_quorum_sizes(&ctx.quorum) {
        info!(
            target: "oxen::pulse",
            "{}{e} on height {}, we require a PoW miner block. Sleeping until next block.",
            ctx.log_prefix(), ctx.height
        );
        ctx.state = RoundState::WaitForNextBlock;
        return EventLoop::KeepRunning;
    }

    if keys.pubkey == ctx.quorum.producer {
        ctx.role = Role::Producer;
        ctx.node_name = "W[0]".to_string();
    } else if let Some(position) = ctx.quorum.validator_position(&keys.pubkey) {
        ctx.role = Role::Validator;
        ctx.my_position = position;
        ctx.node_name = format!("V[{position}]");
    } else {
        // Not in this round's quorum: sit the round out and re-elect when
        // the next one starts.
        ctx.role = Role::None;
        info!(
            target: "oxen::pulse",
            "{}we are not a pulse validator. Waiting for next pulse round or block.",
            ctx.log_prefix()
        );
    }

    ctx.state = RoundState::WaitForRound;
    EventLoop::KeepRunning
}

fn wait_for_round<C: ChainView>(ctx: &mut RoundContext, now: TimeMs, chain: &C) -> EventLoop {
    if let Ok(top) = chain.top_block() {
        if top.height + 1 != ctx.height {
            info!(
                target: "oxen::pulse",
                "{}block height changed whilst waiting for round {}, restarting pulse stages",
                ctx.log_prefix(), ctx.round
            );
            ctx.state = RoundState::WaitForNextBlock;
            return EventLoop::KeepRunning;
        }
    }

    if now < ctx.round_start {
        return EventLoop::ReturnToCaller;
    }

    match ctx.role {
        Role::Validator => {
            info!(
                target: "oxen::pulse",
                "{}we are a pulse validator, sending handshake bit and collecting handshakes",
                ctx.log_prefix()
            );
            ctx.state = RoundState::SubmitHandshakes;
        }
        Role::Producer => {
            info!(
                target: "oxen::pulse",
                "{}we are the block producer for height {} in round {}, awaiting validator handshake bitsets",
                ctx.log_prefix(), ctx.height, ctx.round
            );
            ctx.state = RoundState::WaitForHandshakeBitsets;
        }
        Role::None => {
            // The round we sat out has started; escalate so the next quorum
            // gets elected once this round's time is up.
            return goto_preparing_for_next_round(ctx);
        }
    }
    EventLoop::KeepRunning
}

fn submit_handshakes<R: MessageRelay>(
    ctx: &mut RoundContext,
    relay: &R,
    keys: &ServiceNodeKeys,
) -> EventLoop {
    // State first so our own handshake is consumed, not queued.
    ctx.state = RoundState::WaitForHandshakes;
    let msg = ctx.make_signed_message(PulseMessageKind::Handshake, keys);
    ctx.handle_message(msg.clone(), None);

    if let Err(e) = relay.relay(&msg, &ctx.quorum, false) {
        error!(
            target: "oxen::pulse",
            "{}attempting to send a pulse participation handshake unexpectedly failed: {}",
            ctx.log_prefix(), PulseError::Relay(e)
        );
        return goto_preparing_for_next_round(ctx);
    }
    EventLoop::ReturnToCaller
}

fn wait_for_handshakes<R: MessageRelay>(
    ctx: &mut RoundContext,
    now: TimeMs,
    relay: &R,
) -> EventLoop {
    ctx.handle_messages_received_early(Stage::Handshakes, Some(relay));

    let timed_out = now >= ctx.handshakes_stage.end_time;
    let all_handshakes =
        ctx.handshakes_stage.msgs_received as usize == PULSE_QUORUM_NUM_VALIDATORS;

    if all_handshakes || timed_out {
        info!(
            target: "oxen::pulse",
            "{}collected validator handshakes {:#013b}{}, sending handshake bitset",
            ctx.log_prefix(),
            ctx.handshakes_stage.bitset,
            if timed_out && !all_handshakes { " (timed out, some handshakes not seen)" } else { "" }
        );
        ctx.state = RoundState::SubmitHandshakeBitset;
        return EventLoop::KeepRunning;
    }
    EventLoop::ReturnToCaller
}

fn submit_handshake_bitset<R: MessageRelay>(
    ctx: &mut RoundContext,
    relay: &R,
    keys: &ServiceNodeKeys,
) -> EventLoop {
    let mut validator_bitset = 0u16;
    for (position, received) in ctx.handshakes.iter().enumerate() {
        if *received {
            validator_bitset |= 1 << position;
        }
    }

    ctx.state = RoundState::WaitForHandshakeBitsets;
    let msg = ctx.make_signed_message(PulseMessageKind::HandshakeBitset { validator_bitset }, keys);
    ctx.handle_message(msg.clone(), None);

    if let Err(e) = relay.relay(&msg, &ctx.quorum, false) {
        error!(
            target: "oxen::pulse",
            "{}attempting to send a pulse validator bitset unexpectedly failed: {}",
            ctx.log_prefix(), PulseError::Relay(e)
        );
        return goto_preparing_for_next_round(ctx);
    }
    EventLoop::KeepRunning
}

fn wait_for_handshake_bitsets<R: MessageRelay>(
    ctx: &mut RoundContext,
    now: TimeMs,
    relay: &R,
) -> EventLoop {
    ctx.handle_messages_received_early(Stage::HandshakeBitsets, Some(relay));

    let timed_out = now >= ctx.bitsets_stage.end_time;
    let all_bitsets = ctx.bitsets_stage.msgs_received as usize == PULSE_QUORUM_NUM_VALIDATORS;

    if timed_out || all_bitsets {
        let mut counts: HashMap<u16, u16> = HashMap::new();
        let mut best_bitset = 0u16;
        let mut count = 0u16;
        for bitset in ctx.bitsets.iter().flatten() {
            let votes = counts.entry(*bitset).or_insert(0);
            *votes += 1;
            if *votes > count {
                best_bitset = *bitset;
                count = *votes;
            }
        }

        let count_threshold =
            (PULSE_QUORUM_NUM_VALIDATORS * PULSE_BITSET_AGREEMENT_NUM / PULSE_BITSET_AGREEMENT_DEN)
                as u16;
        if count < count_threshold || best_bitset == 0 {
            // Less than the agreement threshold of validators can agree on
            // who is online; wait for the next round.
            info!(
                target: "oxen::pulse",
                "{}{}/{} validators agreed on a (non-empty) participation bitset, waiting for next round",
                ctx.log_prefix(), count, PULSE_QUORUM_NUM_VALIDATORS
            );
            return goto_preparing_for_next_round(ctx);
        }

        ctx.locked_bitset = best_bitset;
        ctx.locked_count = count;
        info!(
            target: "oxen::pulse",
            "{}{}/{} validators agreed on the participating nodes in the quorum {:#013b}",
            ctx.log_prefix(), count, PULSE_QUORUM_NUM_VALIDATORS, best_bitset
        );

        ctx.state = if ctx.role == Role::Producer {
            RoundState::SubmitBlockTemplate
        } else {
            RoundState::WaitForBlockTemplate
        };
        return EventLoop::KeepRunning;
    }
    EventLoop::ReturnToCaller
}

fn submit_block_template<C: ChainView, R: MessageRelay>(
    ctx: &mut RoundContext,
    chain: &C,
    relay: &R,
    keys: &ServiceNodeKeys,
) -> EventLoop {
    debug_assert!(ctx.role == Role::Producer);

    if !chain.is_active_service_node(&keys.pubkey) {
        info!(
            target: "oxen::pulse",
            "{}block producer (us) is not an active service node, waiting until next round",
            ctx.log_prefix()
        );
        return goto_preparing_for_next_round(ctx);
    }

    let mut block = match chain.create_pulse_block_template(&keys.pubkey, ctx.height) {
        Ok(block) => block,
        Err(e) => {
            error!(
                target: "oxen::pulse",
                "{}failed to create pulse block template: {}",
                ctx.log_prefix(), PulseError::Chain(e)
            );
            return goto_preparing_for_next_round(ctx);
        }
    };
    block.pulse.round = ctx.round;
    block.pulse.validator_bitset = ctx.locked_bitset;

    let mut msg = PulseMessage {
        quorum_position: 0,
        kind: PulseMessageKind::BlockTemplate { block_blob: block.to_blob() },
        signature: Default::default(),
    };
    msg.signature =
        keys.sign(&crate::message_signature_hash(&ctx.top_hash, &msg, &ctx.final_block_blob));

    info!(
        target: "oxen::pulse",
        "{}validators are handshaken and ready, sending block template from producer (us)",
        ctx.log_prefix()
    );
    if let Err(e) = relay.relay(&msg, &ctx.quorum, true) {
        error!(
            target: "oxen::pulse",
            "{}failed to send the block template: {}",
            ctx.log_prefix(), PulseError::Relay(e)
        );
        return goto_preparing_for_next_round(ctx);
    }

    // The producer's round ends here; validators carry the block from now on.
    ctx.state = RoundState::WaitForNextBlock;
    EventLoop::KeepRunning
}

fn wait_for_block_template<R: MessageRelay>(
    ctx: &mut RoundContext,
    now: TimeMs,
    relay: &R,
) -> EventLoop {
    ctx.handle_messages_received_early(Stage::BlockTemplate, Some(relay));

    let timed_out = now >= ctx.template_stage.end_time;
    let received = ctx.template_stage.msgs_received == 1;
    if timed_out || received {
        if let Some(block) = &ctx.template_block {
            if block.pulse.validator_bitset == ctx.locked_bitset {
                info!(target: "oxen::pulse", "{}valid block template received", ctx.log_prefix());
            } else {
                info!(
                    target: "oxen::pulse",
                    "{}received pulse block template specifying different validator bitset {:#013b}, expected {:#013b}",
                    ctx.log_prefix(), block.pulse.validator_bitset, ctx.locked_bitset
                );
            }
        } else {
            info!(
                target: "oxen::pulse",
                "{}timed out, block template was not received",
                ctx.log_prefix()
            );
        }

        ctx.state = RoundState::SubmitRandomValueHash;
        return EventLoop::KeepRunning;
    }
    EventLoop::ReturnToCaller
}

fn submit_random_value_hash<R: MessageRelay>(
    ctx: &mut RoundContext,
    relay: &R,
    keys: &ServiceNodeKeys,
) -> EventLoop {
    ctx.my_random_value = PulseRandomValue(rand::random());

    ctx.state = RoundState::WaitForRandomValueHashes;
    let msg = ctx.make_signed_message(
        PulseMessageKind::RandomValueHash { hash: hash_parts([ctx.my_random_value.0.as_slice()]) },
        keys,
    );
    ctx.handle_message(msg.clone(), None);
    if let Err(e) = relay.relay(&msg, &ctx.quorum, false) {
        debug!(target: "oxen::pulse", "{}failed to send random value hash: {e}", ctx.log_prefix());
    }
    EventLoop::ReturnToCaller
}

fn wait_for_random_value_hashes<R: MessageRelay>(
    ctx: &mut RoundContext,
    now: TimeMs,
    relay: &R,
) -> EventLoop {
    ctx.handle_messages_received_early(Stage::RandomValueHashes, Some(relay));

    let timed_out = now >= ctx.rv_hashes_stage.end_time;
    let all_hashes = ctx.rv_hashes_stage.msgs_received == ctx.locked_count;

    if timed_out || all_hashes {
        if let Err(e) = enforce_validator_participation(ctx, Stage::RandomValueHashes, timed_out, all_hashes)
        {
            info!(target: "oxen::pulse", "{}{e}, waiting for next round", ctx.log_prefix());
            return goto_preparing_for_next_round(ctx);
        }
        info!(
            target: "oxen::pulse",
            "{}received {} random value hashes from {:#013b}{}",
            ctx.log_prefix(),
            ctx.rv_hashes_stage.msgs_received,
            ctx.rv_hashes_stage.bitset,
            if timed_out { " (timed out, some hashes are missing)" } else { "" }
        );
        ctx.state = RoundState::SubmitRandomValue;
        return EventLoop::KeepRunning;
    }
    EventLoop::ReturnToCaller
}

fn submit_random_value<R: MessageRelay>(
    ctx: &mut RoundContext,
    relay: &R,
    keys: &ServiceNodeKeys,
) -> EventLoop {
    ctx.state = RoundState::WaitForRandomValue;
    let msg = ctx
        .make_signed_message(PulseMessageKind::RandomValue { value: ctx.my_random_value }, keys);
    ctx.handle_message(msg.clone(), None);
    if let Err(e) = relay.relay(&msg, &ctx.quorum, false) {
        debug!(target: "oxen::pulse", "{}failed to send random value: {e}", ctx.log_prefix());
    }
    EventLoop::KeepRunning
}

fn wait_for_random_value<R: MessageRelay>(
    ctx: &mut RoundContext,
    now: TimeMs,
    relay: &R,
) -> EventLoop {
    ctx.handle_messages_received_early(Stage::RandomValues, Some(relay));

    let timed_out = now >= ctx.rv_values_stage.end_time;
    let all_values = ctx.rv_values_stage.msgs_received == ctx.locked_count;

    if timed_out || all_values {
        if let Err(e) = enforce_validator_participation(ctx, Stage::RandomValues, timed_out, all_values) {
            info!(target: "oxen::pulse", "{}{e}, waiting for next round", ctx.log_prefix());
            return goto_preparing_for_next_round(ctx);
        }

        // Fold the revealed values in validator-index order.
        let mut final_hash = Hash256::ZERO;
        for (position, value) in ctx.rv_values.iter().enumerate() {
            if let Some(value) = value {
                debug!(
                    target: "oxen::pulse",
                    "{}final random value seeding with V[{position}]",
                    ctx.log_prefix()
                );
                final_hash = hash_parts([final_hash.as_ref(), value.0.as_slice()]);
            }
        }

        let Some(mut block) = ctx.template_block.clone() else {
            return goto_preparing_for_next_round(ctx);
        };
        let mut random_value = [0u8; oxen_types::PULSE_RANDOM_VALUE_LENGTH];
        random_value.copy_from_slice(&final_hash.as_bytes()[..oxen_types::PULSE_RANDOM_VALUE_LENGTH]);
        block.pulse.random_value = PulseRandomValue(random_value);

        info!(
            target: "oxen::pulse",
            "{}block final random value generated from validators {:#013b}",
            ctx.log_prefix(), ctx.rv_values_stage.bitset
        );
        ctx.final_block_blob = block.to_blob();
        ctx.template_block = Some(block);
        ctx.state = RoundState::SubmitSignedBlock;
        return EventLoop::KeepRunning;
    }
    EventLoop::ReturnToCaller
}

fn submit_signed_block<R: MessageRelay>(
    ctx: &mut RoundContext,
    relay: &R,
    keys: &ServiceNodeKeys,
) -> EventLoop {
    ctx.state = RoundState::WaitForSignedBlocks;
    let msg = ctx.make_signed_message(PulseMessageKind::SignedBlock, keys);
    ctx.handle_message(msg.clone(), None);
    if let Err(e) = relay.relay(&msg, &ctx.quorum, false) {
        debug!(target: "oxen::pulse", "{}failed to send signed block: {e}", ctx.log_prefix());
    }
    EventLoop::KeepRunning
}

fn wait_for_signed_blocks<C: ChainView, R: MessageRelay>(
    ctx: &mut RoundContext,
    now: TimeMs,
    chain: &C,
    relay: &R,
) -> EventLoop {
    ctx.handle_messages_received_early(Stage::SignedBlocks, Some(relay));

    let timed_out = now >= ctx.signed_stage.end_time;
    let enough =
        ctx.signed_stage.msgs_received as usize >= PULSE_BLOCK_REQUIRED_SIGNATURES;

    if timed_out || enough {
        if let Err(e) = enforce_validator_participation(ctx, Stage::SignedBlocks, timed_out, enough) {
            info!(target: "oxen::pulse", "{}{e}, waiting for next round", ctx.log_prefix());
            return goto_preparing_for_next_round(ctx);
        }

        // Pick the attached signatures at random from everything received,
        // then attach them in ascending validator order.
        let mut received: Vec<usize> = (0..PULSE_QUORUM_NUM_VALIDATORS)
            .filter(|position| ctx.signatures[*position].is_some())
            .collect();
        received.shuffle(&mut rand::rng());
        let mut chosen: Vec<usize> =
            received.into_iter().take(PULSE_BLOCK_REQUIRED_SIGNATURES).collect();
        chosen.sort_unstable();

        let Some(mut final_block) = ctx.template_block.clone() else {
            return goto_preparing_for_next_round(ctx);
        };
        for position in chosen {
            if let Some(signature) = ctx.signatures[position] {
                final_block.signatures.push(BlockSignature {
                    validator_index: position as u16,
                    signature,
                });
            }
        }

        info!(
            target: "oxen::pulse",
            "{}final signed block assembled with {} signatures, submitting to chain",
            ctx.log_prefix(), final_block.signatures.len()
        );
        if let Err(e) = chain.submit_block(final_block) {
            error!(
                target: "oxen::pulse",
                "{}failed to submit the final pulse block: {}",
                ctx.log_prefix(), PulseError::Chain(e)
            );
        }

        ctx.state = RoundState::WaitForNextBlock;
        return EventLoop::KeepRunning;
    }
    EventLoop::ReturnToCaller
}

/// After the template locks participation in, every later stage must see
/// messages only from the locked-in set, and a timed-out stage must still
/// have heard from everyone it was waiting on.
fn enforce_validator_participation(
    ctx: &RoundContext,
    stage: Stage,
    timed_out: bool,
    all_received: bool,
) -> PulseResult<()> {
    debug_assert!(ctx.state >= RoundState::WaitForBlockTemplate);
    let locked_bitset = ctx.template_validator_bitset();
    let (stage_bitset, msgs_received) = match stage {
        Stage::RandomValueHashes => {
            (ctx.rv_hashes_stage.bitset, ctx.rv_hashes_stage.msgs_received)
        }
        Stage::RandomValues => (ctx.rv_values_stage.bitset, ctx.rv_values_stage.msgs_received),
        Stage::SignedBlocks => (ctx.signed_stage.bitset, ctx.signed_stage.msgs_received),
        _ => (0, 0),
    };

    if timed_out && !all_received {
        return Err(PulseError::Timeout);
    }

    // Messages from outside the locked-in set should have been filtered on
    // arrival; seeing one here is an internal invariant failure.
    let unexpected_items = (stage_bitset | locked_bitset) != locked_bitset;
    if msgs_received == 0 || unexpected_items {
        return Err(PulseError::InsufficientParticipation {
            received: msgs_received,
            required: ctx.locked_count,
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/state_machine_tests.rs"]
mod state_machine_tests;
