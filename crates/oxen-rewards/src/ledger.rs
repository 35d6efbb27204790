//! The rewards ledger proper.
//!
//! One writer applies blocks strictly in height order; every block's effects
//! (accrual credits, paid-row inserts, the height bump and its pruning) land
//! in a single write transaction, so a failure anywhere leaves the ledger at
//! the previous block. The accrual table never holds a zero row and paid
//! rows older than the prune window are dropped whenever the height
//! advances, matching the relational layout this store replaces.

use crate::{calculate_rewards, LedgerError, LedgerResult};
use oxen_config::{
    rewards::{governance_reward_formula, service_node_reward_formula, PAID_HISTORY},
    ChainConfig, HF_BATCHED_REWARDS,
};
use oxen_storage::{Accrued, Database, DbTx as _, DbTxMut, LedgerInfo, PaidRaw, LEDGER_INFO_KEY};
use oxen_types::{
    block_deterministic_seed, deterministic_output_key, to_atomic, to_milli, AccountAddress,
    BatchPayment, Block, CoinbaseOutput, NetworkType, ServiceNodeList,
};
use tracing::{debug, error, info, trace};

pub struct RewardsLedger<DB> {
    db: DB,
    config: ChainConfig,
    /// Mirror of the durable `LedgerInfo` height.
    height: u64,
}

impl<DB: Database> RewardsLedger<DB> {
    /// Open the ledger over `db`, loading the last durable height.
    pub fn open(db: DB, config: ChainConfig) -> LedgerResult<Self> {
        let height = match db.get::<LedgerInfo>(&LEDGER_INFO_KEY)? {
            Some(height) => height,
            None => {
                db.insert::<LedgerInfo>(&LEDGER_INFO_KEY, &0)?;
                0
            }
        };
        debug!(target: "oxen::ledger", height, network = %config.network, "rewards ledger opened");
        Ok(Self { db, config, height })
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn network(&self) -> NetworkType {
        self.config.network
    }

    /// Apply one block. All effects commit atomically; any error leaves the
    /// ledger exactly as it was.
    pub fn add_block(&mut self, block: &Block, sn_state: &ServiceNodeList) -> LedgerResult<()> {
        let block_height = block.height;
        trace!(target: "oxen::ledger", height = block_height, "add_block");

        if block.major_version < HF_BATCHED_REWARDS {
            self.set_height(block_height)?;
            return Ok(());
        }

        if block_height == self.config.batched_rewards_fork_height {
            info!(target: "oxen::ledger", height = block_height, "batching of service node rewards begins");
            self.reset()?;
            self.set_height(block_height - 1)?;
        }

        if block_height != self.height + 1 {
            return Err(LedgerError::OutOfOrder { expected: self.height + 1, got: block_height });
        }

        // The ledger is the source of truth for who this block must pay.
        let calculated = self
            .get_sn_payments(block_height)?
            .ok_or_else(|| LedgerError::InvalidAddress("accrual table unreadable".to_string()))?;

        let mut txn = self.db.write_txn()?;

        Self::validate_batch_payment(&mut txn, &block.miner_outputs, &calculated, block_height)?;

        // Step 1: the block producer's share of the transaction fees.
        let service_node_reward = service_node_reward_formula(block.major_version);
        if block.reward > service_node_reward && block.service_node_winner.is_valid_point() {
            if let Some(winner_info) = sn_state.get(&block.service_node_winner) {
                let fees = block.reward - service_node_reward;
                let payments = calculate_rewards(block.major_version, fees, winner_info)?;
                Self::add_sn_payments(&mut txn, &payments)?;
            }
        }

        // Step 2: every payable service node earns an equal slice of the
        // fixed reward, split across its contributors.
        let payable = sn_state.payable_infos();
        if !payable.is_empty() {
            let slice = service_node_reward / payable.len() as u64;
            for (_, info) in &payable {
                let payments = calculate_rewards(block.major_version, slice, info)?;
                Self::add_sn_payments(&mut txn, &payments)?;
            }
        }

        // Step 3: governance accrual; fakechain runs without one.
        if self.config.network != NetworkType::Fakechain {
            let governance = BatchPayment::new(
                self.config.governance_wallet,
                governance_reward_formula(block.major_version),
            );
            Self::add_sn_payments(&mut txn, std::slice::from_ref(&governance))?;
        }

        self.update_height_in(&mut txn, block_height)?;
        txn.commit()?;
        self.height = block_height;
        Ok(())
    }

    /// Remove one block: subtract exactly the accruals [`add_block`] added,
    /// then restore any rows it paid out back into the accrual table.
    pub fn pop_block(&mut self, block: &Block, sn_state: &ServiceNodeList) -> LedgerResult<()> {
        let block_height = block.height;
        trace!(target: "oxen::ledger", height = block_height, "pop_block");

        if self.height < block_height {
            debug!(target: "oxen::ledger", height = block_height, "block above ledger height, skipping pop");
            return Ok(());
        }
        if block_height != self.height {
            return Err(LedgerError::OutOfOrder { expected: self.height, got: block_height });
        }

        if block.major_version < HF_BATCHED_REWARDS {
            self.set_height(self.height - 1)?;
            return Ok(());
        }

        let mut txn = self.db.write_txn()?;

        let service_node_reward = service_node_reward_formula(block.major_version);
        if block.reward > service_node_reward && block.service_node_winner.is_valid_point() {
            if let Some(winner_info) = sn_state.get(&block.service_node_winner) {
                let fees = block.reward - service_node_reward;
                let payments = calculate_rewards(block.major_version, fees, winner_info)?;
                Self::subtract_sn_payments(&mut txn, &payments)?;
            }
        }

        let payable = sn_state.payable_infos();
        if !payable.is_empty() {
            let slice = service_node_reward / payable.len() as u64;
            for (_, info) in &payable {
                let payments = calculate_rewards(block.major_version, slice, info)?;
                Self::subtract_sn_payments(&mut txn, &payments)?;
            }
        }

        if self.config.network != NetworkType::Fakechain {
            let governance = BatchPayment::new(
                self.config.governance_wallet,
                governance_reward_formula(block.major_version),
            );
            Self::subtract_sn_payments(&mut txn, std::slice::from_ref(&governance))?;
        }

        self.delete_block_payments_in(&mut txn, block_height)?;

        self.update_height_in(&mut txn, block_height - 1)?;
        txn.commit()?;
        self.height = block_height - 1;
        Ok(())
    }

    /// The payments a block at `block_height` must make: every accrued row
    /// over the configured minimum whose address is due at that height,
    /// ascending by address. `None` at height 0 or when the store holds an
    /// address this network cannot parse.
    pub fn get_sn_payments(&self, block_height: u64) -> LedgerResult<Option<Vec<BatchPayment>>> {
        if block_height == 0 {
            return Ok(None);
        }

        let min_milli = to_milli(self.config.min_batch_payment_amount);
        let mut rows: Vec<(String, u64)> =
            self.db.iter::<Accrued>().filter(|(_, amount)| *amount > min_milli).collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));

        let mut payments = Vec::new();
        for (address_str, milli) in rows {
            let address =
                match AccountAddress::from_address_string_for(&address_str, self.config.network) {
                    Ok(address) => address,
                    Err(e) => {
                        error!(target: "oxen::ledger", %address_str, %e, "invalid address in batching database");
                        return Ok(None);
                    }
                };
            let due = address.next_payout_height(block_height - 1, self.config.batching_interval);
            if due == block_height {
                payments.push(BatchPayment::new(address, to_atomic(milli)));
            }
        }
        Ok(Some(payments))
    }

    /// Accrued balance for one address, in atomic units. Missing rows read
    /// as zero.
    pub fn get_accrued_earnings(&self, address: &AccountAddress) -> LedgerResult<u64> {
        let milli = self.db.get::<Accrued>(&address.to_address_string())?.unwrap_or(0);
        Ok(to_atomic(milli))
    }

    /// Snapshot of every accrued balance, in atomic units.
    pub fn get_all_accrued_earnings(&self) -> LedgerResult<(Vec<AccountAddress>, Vec<u64>)> {
        let mut addresses = Vec::new();
        let mut amounts = Vec::new();
        for (address_str, milli) in self.db.iter::<Accrued>() {
            match AccountAddress::from_address_string_for(&address_str, self.config.network) {
                Ok(address) => {
                    addresses.push(address);
                    amounts.push(to_atomic(milli));
                }
                Err(e) => {
                    error!(target: "oxen::ledger", %address_str, %e, "invalid address in batching database")
                }
            }
        }
        Ok((addresses, amounts))
    }

    /// Payments recorded as paid at exactly `block_height`, ascending by
    /// address, in atomic units.
    pub fn get_block_payments(&self, block_height: u64) -> LedgerResult<Vec<BatchPayment>> {
        let mut payments = Vec::new();
        for ((height, address_str), milli) in self.db.iter::<PaidRaw>() {
            if height != block_height {
                continue;
            }
            let address =
                AccountAddress::from_address_string_for(&address_str, self.config.network)
                    .map_err(|e| LedgerError::InvalidAddress(e.to_string()))?;
            payments.push(BatchPayment::new(address, to_atomic(milli)));
        }
        payments.sort_by_key(|p| p.address.to_address_string());
        Ok(payments)
    }

    /// Drop every table and restart at height 0. Runs at the rewards fork
    /// activation height; the stored layout is only ever upgraded this way.
    pub fn reset(&mut self) -> LedgerResult<()> {
        let mut txn = self.db.write_txn()?;
        txn.clear_table::<Accrued>()?;
        txn.clear_table::<PaidRaw>()?;
        txn.clear_table::<LedgerInfo>()?;
        txn.insert::<LedgerInfo>(&LEDGER_INFO_KEY, &0)?;
        txn.commit()?;
        self.height = 0;
        debug!(target: "oxen::ledger", "database reset complete");
        Ok(())
    }

    /// Credit each payment's address, creating rows as needed. Amounts are
    /// converted to milli units on the way in.
    fn add_sn_payments(txn: &mut DB::TXMut<'_>, payments: &[BatchPayment]) -> LedgerResult<()> {
        for payment in payments {
            let address = payment.address.to_address_string();
            trace!(
                target: "oxen::ledger",
                %address,
                amount = payment.amount,
                "accruing sn reward contribution"
            );
            let current = txn.get::<Accrued>(&address)?.unwrap_or(0);
            let updated = current
                .checked_add(to_milli(payment.amount))
                .ok_or(LedgerError::ArithmeticOverflow("accrued balance"))?;
            txn.insert::<Accrued>(&address, &updated)?;
        }
        Ok(())
    }

    /// Debit each payment's address. A missing row or a balance that would
    /// fall below zero aborts the transaction.
    fn subtract_sn_payments(
        txn: &mut DB::TXMut<'_>,
        payments: &[BatchPayment],
    ) -> LedgerResult<()> {
        for payment in payments {
            let address = payment.address.to_address_string();
            let current = txn
                .get::<Accrued>(&address)?
                .ok_or_else(|| LedgerError::AddressNotFound(address.clone()))?;
            let updated = current
                .checked_sub(to_milli(payment.amount))
                .ok_or_else(|| LedgerError::CheckViolation { address: address.clone() })?;
            if updated == 0 {
                txn.remove::<Accrued>(&address)?;
            } else {
                txn.insert::<Accrued>(&address, &updated)?;
            }
        }
        Ok(())
    }

    /// Check the block's coinbase against the calculated batch payments and
    /// record each validated payment as paid.
    fn validate_batch_payment(
        txn: &mut DB::TXMut<'_>,
        miner_outputs: &[CoinbaseOutput],
        calculated: &[BatchPayment],
        block_height: u64,
    ) -> LedgerResult<()> {
        if miner_outputs.len() != calculated.len() {
            return Err(LedgerError::LengthMismatch {
                expected: calculated.len(),
                got: miner_outputs.len(),
            });
        }

        let total_calculated: u64 = calculated.iter().map(|p| p.amount).sum();
        let mut total_outputs: u64 = 0;
        let seed = block_deterministic_seed(block_height);

        for (index, output) in miner_outputs.iter().enumerate() {
            let due = &calculated[index];
            if output.amount != due.amount {
                return Err(LedgerError::AmountMismatch {
                    index,
                    expected: due.amount,
                    got: output.amount,
                });
            }
            let expected_key = deterministic_output_key(&due.address, &seed, index);
            if expected_key != output.key {
                return Err(LedgerError::KeyMismatch { index });
            }
            total_outputs += output.amount;
        }

        if total_outputs != total_calculated {
            return Err(LedgerError::TotalMismatch {
                expected: total_calculated,
                got: total_outputs,
            });
        }

        Self::save_payments(txn, block_height, calculated)
    }

    /// Record validated payments through the write-through paid path: each
    /// debits the accrual row by its full milli balance and inserts the paid
    /// row. Addresses with no accrual row are skipped; a row whose balance
    /// does not match the payment exactly aborts.
    fn save_payments(
        txn: &mut DB::TXMut<'_>,
        block_height: u64,
        payments: &[BatchPayment],
    ) -> LedgerResult<()> {
        for payment in payments {
            let address = payment.address.to_address_string();
            let Some(accrued_milli) = txn.get::<Accrued>(&address)? else {
                continue;
            };
            if accrued_milli != to_milli(payment.amount) {
                return Err(LedgerError::PaidAmountMismatch {
                    address,
                    accrued_milli,
                    paying_milli: to_milli(payment.amount),
                });
            }
            Self::pay(txn, &address, accrued_milli, block_height)?;
        }
        Ok(())
    }

    /// Write-through paid insert: debit accrued, insert the paid row.
    fn pay(
        txn: &mut DB::TXMut<'_>,
        address: &str,
        milli: u64,
        block_height: u64,
    ) -> LedgerResult<()> {
        let current = txn
            .get::<Accrued>(&address.to_string())?
            .ok_or_else(|| LedgerError::AddressNotFound(address.to_string()))?;
        let updated = current
            .checked_sub(milli)
            .ok_or_else(|| LedgerError::CheckViolation { address: address.to_string() })?;
        if updated == 0 {
            txn.remove::<Accrued>(&address.to_string())?;
        } else {
            txn.insert::<Accrued>(&address.to_string(), &updated)?;
        }
        txn.insert::<PaidRaw>(&(block_height, address.to_string()), &milli)?;
        Ok(())
    }

    /// Write-through paid delete: remove every paid row at or above
    /// `from_height` and credit its amount back to the accrual table.
    fn delete_block_payments_in(
        &self,
        txn: &mut DB::TXMut<'_>,
        from_height: u64,
    ) -> LedgerResult<()> {
        // Rows being rolled back were committed by earlier blocks, so the
        // committed iterator sees all of them.
        let rows: Vec<((u64, String), u64)> = self
            .db
            .iter::<PaidRaw>()
            .filter(|((height, _), _)| *height >= from_height)
            .collect();
        for ((height, address), milli) in rows {
            txn.remove::<PaidRaw>(&(height, address.clone()))?;
            let current = txn.get::<Accrued>(&address)?.unwrap_or(0);
            let updated = current
                .checked_add(milli)
                .ok_or(LedgerError::ArithmeticOverflow("accrued balance"))?;
            txn.insert::<Accrued>(&address, &updated)?;
        }
        Ok(())
    }

    /// Move the durable height and prune paid rows that fell out of the
    /// history window.
    fn update_height_in(&self, txn: &mut DB::TXMut<'_>, new_height: u64) -> LedgerResult<()> {
        trace!(target: "oxen::ledger", new_height, "update_height");
        txn.insert::<LedgerInfo>(&LEDGER_INFO_KEY, &new_height)?;
        let cutoff = new_height.saturating_sub(PAID_HISTORY);
        if cutoff > 0 {
            let stale: Vec<(u64, String)> = self
                .db
                .iter::<PaidRaw>()
                .map(|(key, _)| key)
                .take_while(|(height, _)| *height < cutoff)
                .collect();
            for key in stale {
                txn.remove::<PaidRaw>(&key)?;
            }
        }
        Ok(())
    }

    /// Height change with no other block effects (pre-fork blocks).
    fn set_height(&mut self, new_height: u64) -> LedgerResult<()> {
        let mut txn = self.db.write_txn()?;
        self.update_height_in(&mut txn, new_height)?;
        txn.commit()?;
        self.height = new_height;
        Ok(())
    }

    pub(crate) fn db(&self) -> &DB {
        &self.db
    }

    pub(crate) fn config(&self) -> &ChainConfig {
        &self.config
    }
}

#[cfg(test)]
#[path = "tests/ledger_tests.rs"]
mod ledger_tests;
