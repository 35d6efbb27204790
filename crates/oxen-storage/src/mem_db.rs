//! In-memory backend. Used by tests and fakechain runs.
//!
//! Unlike a plain map-per-table store, the write transaction here buffers an
//! overlay of pending changes and applies it under one lock at commit, so
//! the ledger's all-or-nothing block application holds even without a real
//! storage engine underneath.

use crate::{DBIter, Database, DbTx, DbTxMut, Table};
use oxen_types::{decode, encode, encode_key, try_decode_key};
use parking_lot::RwLock;
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

type TableMap = BTreeMap<Vec<u8>, Vec<u8>>;
type Store = HashMap<&'static str, TableMap>;

#[derive(Clone, Debug, Default)]
pub struct MemDatabase {
    store: Arc<RwLock<Store>>,
}

impl MemDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug)]
pub struct MemDbTx {
    /// Snapshot of the committed state at transaction start.
    snapshot: Store,
}

impl DbTx for MemDbTx {
    fn get<T: Table>(&self, key: &T::Key) -> eyre::Result<Option<T::Value>> {
        let key_bytes = encode_key(key);
        Ok(self
            .snapshot
            .get(T::NAME)
            .and_then(|table| table.get(&key_bytes))
            .map(|bytes| decode(bytes)))
    }
}

/// Pending change for one key: `Some` writes, `None` deletes.
type Overlay = HashMap<&'static str, BTreeMap<Vec<u8>, Option<Vec<u8>>>>;

#[derive(Debug)]
pub struct MemDbTxMut {
    store: Arc<RwLock<Store>>,
    overlay: Overlay,
    cleared: HashSet<&'static str>,
}

impl DbTx for MemDbTxMut {
    fn get<T: Table>(&self, key: &T::Key) -> eyre::Result<Option<T::Value>> {
        let key_bytes = encode_key(key);
        if let Some(pending) = self.overlay.get(T::NAME).and_then(|t| t.get(&key_bytes)) {
            return Ok(pending.as_ref().map(|bytes| decode(bytes)));
        }
        if self.cleared.contains(T::NAME) {
            return Ok(None);
        }
        Ok(self
            .store
            .read()
            .get(T::NAME)
            .and_then(|table| table.get(&key_bytes))
            .map(|bytes| decode(bytes)))
    }
}

impl DbTxMut for MemDbTxMut {
    fn insert<T: Table>(&mut self, key: &T::Key, value: &T::Value) -> eyre::Result<()> {
        self.overlay
            .entry(T::NAME)
            .or_default()
            .insert(encode_key(key), Some(encode(value)));
        Ok(())
    }

    fn remove<T: Table>(&mut self, key: &T::Key) -> eyre::Result<()> {
        self.overlay.entry(T::NAME).or_default().insert(encode_key(key), None);
        Ok(())
    }

    fn clear_table<T: Table>(&mut self) -> eyre::Result<()> {
        self.overlay.remove(T::NAME);
        self.cleared.insert(T::NAME);
        Ok(())
    }

    fn commit(self) -> eyre::Result<()> {
        let mut store = self.store.write();
        for name in &self.cleared {
            store.entry(name).or_default().clear();
        }
        for (name, changes) in self.overlay {
            let table = store.entry(name).or_default();
            for (key, change) in changes {
                match change {
                    Some(value) => {
                        table.insert(key, value);
                    }
                    None => {
                        table.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }
}

impl Database for MemDatabase {
    type TX<'txn>
        = MemDbTx
    where
        Self: 'txn;

    type TXMut<'txn>
        = MemDbTxMut
    where
        Self: 'txn;

    fn read_txn(&self) -> eyre::Result<Self::TX<'_>> {
        Ok(MemDbTx { snapshot: self.store.read().clone() })
    }

    fn write_txn(&self) -> eyre::Result<Self::TXMut<'_>> {
        Ok(MemDbTxMut {
            store: self.store.clone(),
            overlay: Overlay::new(),
            cleared: HashSet::new(),
        })
    }

    fn get<T: Table>(&self, key: &T::Key) -> eyre::Result<Option<T::Value>> {
        let key_bytes = encode_key(key);
        Ok(self
            .store
            .read()
            .get(T::NAME)
            .and_then(|table| table.get(&key_bytes))
            .map(|bytes| decode(bytes)))
    }

    fn insert<T: Table>(&self, key: &T::Key, value: &T::Value) -> eyre::Result<()> {
        self.store
            .write()
            .entry(T::NAME)
            .or_default()
            .insert(encode_key(key), encode(value));
        Ok(())
    }

    fn remove<T: Table>(&self, key: &T::Key) -> eyre::Result<()> {
        if let Some(table) = self.store.write().get_mut(T::NAME) {
            table.remove(&encode_key(key));
        }
        Ok(())
    }

    fn clear_table<T: Table>(&self) -> eyre::Result<()> {
        if let Some(table) = self.store.write().get_mut(T::NAME) {
            table.clear();
        }
        Ok(())
    }

    fn is_empty<T: Table>(&self) -> bool {
        self.store.read().get(T::NAME).map(|t| t.is_empty()).unwrap_or(true)
    }

    fn iter<T: Table>(&self) -> DBIter<'_, T> {
        let rows: Vec<(T::Key, T::Value)> = self
            .store
            .read()
            .get(T::NAME)
            .map(|table| {
                table
                    .iter()
                    .filter_map(|(k, v)| {
                        let key = try_decode_key(k).ok()?;
                        Some((key, decode(v)))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Box::new(rows.into_iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_suite::*;

    #[test]
    fn memdb_txn_commit() {
        test_txn_commit(MemDatabase::new());
    }

    #[test]
    fn memdb_txn_rollback_on_drop() {
        test_txn_rollback_on_drop(MemDatabase::new());
    }

    #[test]
    fn memdb_iter_is_key_ordered() {
        test_iter_is_key_ordered(MemDatabase::new());
    }

    #[test]
    fn memdb_remove_and_clear() {
        test_remove_and_clear(MemDatabase::new());
    }

    #[test]
    fn memdb_overwrite() {
        test_overwrite(MemDatabase::new());
    }
}
