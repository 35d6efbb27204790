//! Ledger behavior tests over the in-memory backend.

use super::*;
use oxen_config::ChainConfig;
use oxen_storage::MemDatabase;
use oxen_types::{crypto::ServiceNodeKeys, Contributor, ServiceNodeInfo};
use std::collections::BTreeMap;

fn fakechain_config() -> ChainConfig {
    ChainConfig::for_network(NetworkType::Fakechain)
}

fn open_ledger(config: ChainConfig) -> RewardsLedger<MemDatabase> {
    RewardsLedger::open(MemDatabase::new(), config).expect("open ledger")
}

fn address(seed: u8) -> AccountAddress {
    AccountAddress::new(NetworkType::Fakechain, [seed; 32], [seed.wrapping_mul(3); 32])
}

/// An address due at every height.
fn always_due_address(seed: u8) -> AccountAddress {
    address(seed).with_payout_override(1, 0)
}

fn empty_sn_state(height: u64) -> ServiceNodeList {
    ServiceNodeList { height, infos: BTreeMap::new() }
}

fn bls_pubkey(seed: u8) -> oxen_types::crypto::BlsPublicKey {
    *oxen_types::crypto::BlsKeypair::from_seed(&[seed; 32]).unwrap().public()
}

/// A block that carries no fees, no winner and no coinbase payouts.
fn empty_block(height: u64) -> Block {
    Block {
        height,
        major_version: HF_BATCHED_REWARDS,
        reward: oxen_config::rewards::service_node_reward_formula(HF_BATCHED_REWARDS),
        ..Default::default()
    }
}

/// Advance a fresh ledger to `height` via the pre-fork fast path.
fn ledger_at(height: u64) -> RewardsLedger<MemDatabase> {
    let mut ledger = open_ledger(fakechain_config());
    let block = Block { height, major_version: HF_BATCHED_REWARDS - 1, ..Default::default() };
    ledger.add_block(&block, &empty_sn_state(height)).expect("pre-fork block");
    ledger
}

fn credit(ledger: &mut RewardsLedger<MemDatabase>, payments: &[BatchPayment]) {
    let mut txn = ledger.db().write_txn().expect("txn");
    RewardsLedger::<MemDatabase>::add_sn_payments(&mut txn, payments).expect("credit");
    txn.commit().expect("commit");
}

#[test]
fn accrual_round_trip() {
    // Fork activates at height 100 on fakechain.
    let mut ledger = ledger_at(99);
    ledger.add_block(&empty_block(100), &empty_sn_state(100)).expect("fork block");
    assert_eq!(ledger.height(), 100);
    assert_eq!(ledger.batching_count(), 0);

    // The winner is registered but inactive, so only the fee path runs:
    // 10 atomic units of fees split 40/60 across A and B.
    let winner = ServiceNodeKeys::from_seed([42; 32]).pubkey;
    let mut infos = BTreeMap::new();
    infos.insert(
        winner,
        ServiceNodeInfo {
            operator_address: address(1),
            portions_for_operator: 0,
            contributors: vec![
                Contributor { address: address(1), amount: 4 },
                Contributor { address: address(2), amount: 6 },
            ],
            active: false,
            bls_pubkey: bls_pubkey(1),
        },
    );
    let sn_state = ServiceNodeList { height: 101, infos };

    let mut block = empty_block(101);
    block.reward += 10;
    block.service_node_winner = winner;
    ledger.add_block(&block, &sn_state).expect("add block");

    assert_eq!(ledger.height(), 101);
    assert_eq!(ledger.get_accrued_earnings(&address(1)).unwrap(), 4);
    assert_eq!(ledger.get_accrued_earnings(&address(2)).unwrap(), 6);

    ledger.pop_block(&block, &sn_state).expect("pop block");
    assert_eq!(ledger.height(), 100);
    assert_eq!(ledger.batching_count(), 0);
    assert_eq!(ledger.get_accrued_earnings(&address(1)).unwrap(), 0);
}

#[test]
fn minimum_payout_filter() {
    let mut config = fakechain_config();
    config.min_batch_payment_amount = 5;
    let mut ledger = open_ledger(config);

    let a = always_due_address(1);
    let b = always_due_address(2);
    let c = always_due_address(3);
    credit(
        &mut ledger,
        &[
            BatchPayment::new(a, 4),
            BatchPayment::new(b, 6),
            // Exactly the minimum stays below the strict threshold.
            BatchPayment::new(c, 5),
        ],
    );

    let payments = ledger.get_sn_payments(50).expect("query").expect("parseable");
    assert_eq!(payments, vec![BatchPayment::new(b, 6)]);
}

#[test]
fn paying_out_the_full_balance_deletes_the_accrual_row() {
    let mut ledger = ledger_at(200);
    let a = always_due_address(7);
    credit(&mut ledger, &[BatchPayment::new(a, 10)]);
    assert_eq!(ledger.batching_count(), 1);

    let mut txn = ledger.db().write_txn().unwrap();
    RewardsLedger::<MemDatabase>::save_payments(
        &mut txn,
        201,
        &[BatchPayment::new(a, 10)],
    )
    .expect("save payments");
    txn.commit().unwrap();

    assert_eq!(ledger.batching_count(), 0);
    assert_eq!(ledger.retrieve_amount_by_address(&a.to_address_string()), None);
    assert_eq!(ledger.paid_rows(), vec![((201, a.to_address_string()), 10_000)]);
}

#[test]
fn coinbase_payout_and_reorg_restore() {
    let mut ledger = ledger_at(100);
    // Due at multiples of 4 (the fakechain batching interval).
    let a = address(9).with_payout_override(4, 0);
    credit(&mut ledger, &[BatchPayment::new(a, 7)]);

    // Heights 101..=103: nothing due, empty coinbases.
    for height in 101..=103 {
        ledger.add_block(&empty_block(height), &empty_sn_state(height)).expect("filler block");
        assert_eq!(ledger.get_accrued_earnings(&a).unwrap(), 7);
    }

    // Height 104 must pay A exactly 7 through the deterministic output key.
    let calculated = ledger.get_sn_payments(104).unwrap().unwrap();
    assert_eq!(calculated, vec![BatchPayment::new(a, 7)]);

    let seed = oxen_types::block_deterministic_seed(104);
    let mut block = empty_block(104);
    block.miner_outputs = vec![oxen_types::CoinbaseOutput {
        key: oxen_types::deterministic_output_key(&a, &seed, 0),
        amount: 7,
    }];
    ledger.add_block(&block, &empty_sn_state(104)).expect("payout block");

    assert_eq!(ledger.get_accrued_earnings(&a).unwrap(), 0);
    assert_eq!(ledger.paid_rows(), vec![((104, a.to_address_string()), 7_000)]);

    // Rolling the payout block back restores the accrual.
    ledger.pop_block(&block, &empty_sn_state(104)).expect("pop");
    assert_eq!(ledger.height(), 103);
    assert_eq!(ledger.get_accrued_earnings(&a).unwrap(), 7);
    assert!(ledger.paid_rows().is_empty());
}

#[test]
fn failed_validation_leaves_the_ledger_unchanged() {
    let mut ledger = ledger_at(100);
    let a = address(5).with_payout_override(4, 0);
    credit(&mut ledger, &[BatchPayment::new(a, 9)]);
    ledger.add_block(&empty_block(101), &empty_sn_state(101)).unwrap();

    // 104 is due but the coinbase pays the wrong amount.
    ledger.add_block(&empty_block(102), &empty_sn_state(102)).unwrap();
    ledger.add_block(&empty_block(103), &empty_sn_state(103)).unwrap();
    let seed = oxen_types::block_deterministic_seed(104);
    let mut block = empty_block(104);
    block.miner_outputs = vec![oxen_types::CoinbaseOutput {
        key: oxen_types::deterministic_output_key(&a, &seed, 0),
        amount: 8,
    }];
    let err = ledger.add_block(&block, &empty_sn_state(104)).unwrap_err();
    assert!(matches!(err, LedgerError::AmountMismatch { index: 0, expected: 9, got: 8 }));

    assert_eq!(ledger.height(), 103);
    assert_eq!(ledger.get_accrued_earnings(&a).unwrap(), 9);
    assert!(ledger.paid_rows().is_empty());
}

#[test]
fn out_of_order_blocks_are_rejected() {
    let mut ledger = ledger_at(100);
    let err = ledger.add_block(&empty_block(102), &empty_sn_state(102)).unwrap_err();
    assert!(matches!(err, LedgerError::OutOfOrder { expected: 101, got: 102 }));

    let err = ledger.pop_block(&empty_block(99), &empty_sn_state(99)).unwrap_err();
    assert!(matches!(err, LedgerError::OutOfOrder { expected: 100, got: 99 }));

    // Popping above the ledger height is a no-op, not an error.
    ledger.pop_block(&empty_block(500), &empty_sn_state(500)).expect("skip");
    assert_eq!(ledger.height(), 100);
}

#[test]
fn advancing_height_prunes_old_paid_rows() {
    let mut ledger = ledger_at(200);
    let a = always_due_address(3);
    credit(&mut ledger, &[BatchPayment::new(a, 2)]);
    let mut txn = ledger.db().write_txn().unwrap();
    RewardsLedger::<MemDatabase>::pay(&mut txn, &a.to_address_string(), 2_000, 201).unwrap();
    txn.commit().unwrap();
    assert_eq!(ledger.paid_rows().len(), 1);

    // Jump the height far enough that row 201 falls out of the window.
    let block = Block {
        height: 201 + oxen_config::rewards::PAID_HISTORY + 1,
        major_version: HF_BATCHED_REWARDS - 1,
        ..Default::default()
    };
    ledger.add_block(&block, &empty_sn_state(block.height)).unwrap();
    assert!(ledger.paid_rows().is_empty());
}

#[test]
fn governance_accrues_outside_fakechain() {
    let mut config = ChainConfig::for_network(NetworkType::Devnet);
    config.batched_rewards_fork_height = 100;
    let governance = config.governance_wallet;
    let mut ledger = open_ledger(config);

    let block = Block { height: 99, major_version: HF_BATCHED_REWARDS - 1, ..Default::default() };
    ledger.add_block(&block, &empty_sn_state(99)).unwrap();
    ledger.add_block(&empty_block(100), &empty_sn_state(100)).unwrap();
    ledger.add_block(&empty_block(101), &empty_sn_state(101)).unwrap();

    // Both post-fork blocks (100 and 101) accrue the governance reward.
    let expected = 2 * oxen_config::rewards::governance_reward_formula(HF_BATCHED_REWARDS);
    assert_eq!(ledger.get_accrued_earnings(&governance).unwrap(), expected);
}

#[test]
fn fork_height_resets_previous_state() {
    let mut ledger = ledger_at(50);
    credit(&mut ledger, &[BatchPayment::new(address(8), 123)]);
    assert_eq!(ledger.batching_count(), 1);

    // Walk up to the fork. Pre-fork blocks only move the height.
    let block = Block { height: 99, major_version: HF_BATCHED_REWARDS - 1, ..Default::default() };
    ledger.add_block(&block, &empty_sn_state(99)).unwrap();
    ledger.add_block(&empty_block(100), &empty_sn_state(100)).unwrap();

    assert_eq!(ledger.height(), 100);
    assert_eq!(ledger.batching_count(), 0);
}

#[test]
fn clone_preserves_raw_rows_and_height() {
    let mut ledger = ledger_at(300);
    let a = always_due_address(6);
    credit(&mut ledger, &[BatchPayment::new(a, 11)]);
    let mut txn = ledger.db().write_txn().unwrap();
    RewardsLedger::<MemDatabase>::pay(&mut txn, &a.to_address_string(), 4_000, 300).unwrap();
    txn.commit().unwrap();

    let clone = ledger.clone_into(MemDatabase::new()).expect("clone");
    assert_eq!(clone.height(), 300);
    assert_eq!(
        clone.retrieve_amount_by_address(&a.to_address_string()),
        ledger.retrieve_amount_by_address(&a.to_address_string())
    );
    assert_eq!(clone.paid_rows(), ledger.paid_rows());
}

#[test]
fn get_sn_payments_at_genesis_is_none() {
    let ledger = open_ledger(fakechain_config());
    assert!(ledger.get_sn_payments(0).unwrap().is_none());
}
