//! Persistent backend over redb: one file, ACID transactions, byte tables.
//!
//! Keys and values cross into redb as raw bytes; the typed codec lives on
//! this side so both backends share one encoding.

use crate::{DBIter, Database, DbTx, DbTxMut, Table, LEDGER_TABLE_NAMES};
use oxen_types::{decode, encode, encode_key, try_decode_key};
use redb::{ReadableTable as _, TableDefinition, TableError};
use std::{path::Path, sync::Arc};
use tracing::debug;

const fn table_def(name: &'static str) -> TableDefinition<'static, &'static [u8], &'static [u8]> {
    TableDefinition::new(name)
}

#[derive(Clone)]
pub struct RedbDatabase {
    db: Arc<redb::Database>,
}

impl std::fmt::Debug for RedbDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbDatabase").finish_non_exhaustive()
    }
}

impl RedbDatabase {
    /// Open (or create) the ledger database at `path` and make sure every
    /// ledger table exists, so later read transactions never race table
    /// creation.
    pub fn open(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let db = redb::Database::create(path.as_ref())?;
        let txn = db.begin_write()?;
        for name in LEDGER_TABLE_NAMES {
            txn.open_table(table_def(name))?;
        }
        txn.commit()?;
        debug!(target: "oxen::storage", path = %path.as_ref().display(), "opened ledger database");
        Ok(Self { db: Arc::new(db) })
    }
}

pub struct RedbTx {
    txn: redb::ReadTransaction,
}

impl DbTx for RedbTx {
    fn get<T: Table>(&self, key: &T::Key) -> eyre::Result<Option<T::Value>> {
        let table = match self.txn.open_table(table_def(T::NAME)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let key_bytes = encode_key(key);
        Ok(table.get(key_bytes.as_slice())?.map(|guard| decode(guard.value())))
    }
}

pub struct RedbTxMut {
    txn: redb::WriteTransaction,
}

impl DbTx for RedbTxMut {
    fn get<T: Table>(&self, key: &T::Key) -> eyre::Result<Option<T::Value>> {
        let table = self.txn.open_table(table_def(T::NAME))?;
        let key_bytes = encode_key(key);
        let result = table.get(key_bytes.as_slice())?.map(|guard| decode(guard.value()));
        Ok(result)
    }
}

impl DbTxMut for RedbTxMut {
    fn insert<T: Table>(&mut self, key: &T::Key, value: &T::Value) -> eyre::Result<()> {
        let mut table = self.txn.open_table(table_def(T::NAME))?;
        let key_bytes = encode_key(key);
        let value_bytes = encode(value);
        table.insert(key_bytes.as_slice(), value_bytes.as_slice())?;
        Ok(())
    }

    fn remove<T: Table>(&mut self, key: &T::Key) -> eyre::Result<()> {
        let mut table = self.txn.open_table(table_def(T::NAME))?;
        let key_bytes = encode_key(key);
        table.remove(key_bytes.as_slice())?;
        Ok(())
    }

    fn clear_table<T: Table>(&mut self) -> eyre::Result<()> {
        self.txn.delete_table(table_def(T::NAME))?;
        self.txn.open_table(table_def(T::NAME))?;
        Ok(())
    }

    /// Dropping without calling this aborts the transaction.
    fn commit(self) -> eyre::Result<()> {
        self.txn.commit()?;
        Ok(())
    }
}

impl Database for RedbDatabase {
    type TX<'txn>
        = RedbTx
    where
        Self: 'txn;

    type TXMut<'txn>
        = RedbTxMut
    where
        Self: 'txn;

    fn read_txn(&self) -> eyre::Result<Self::TX<'_>> {
        Ok(RedbTx { txn: self.db.begin_read()? })
    }

    fn write_txn(&self) -> eyre::Result<Self::TXMut<'_>> {
        Ok(RedbTxMut { txn: self.db.begin_write()? })
    }

    fn get<T: Table>(&self, key: &T::Key) -> eyre::Result<Option<T::Value>> {
        self.read_txn()?.get::<T>(key)
    }

    fn insert<T: Table>(&self, key: &T::Key, value: &T::Value) -> eyre::Result<()> {
        let mut txn = self.write_txn()?;
        txn.insert::<T>(key, value)?;
        txn.commit()
    }

    fn remove<T: Table>(&self, key: &T::Key) -> eyre::Result<()> {
        let mut txn = self.write_txn()?;
        txn.remove::<T>(key)?;
        txn.commit()
    }

    fn clear_table<T: Table>(&self) -> eyre::Result<()> {
        let mut txn = self.write_txn()?;
        txn.clear_table::<T>()?;
        txn.commit()
    }

    fn is_empty<T: Table>(&self) -> bool {
        self.iter::<T>().next().is_none()
    }

    fn iter<T: Table>(&self) -> DBIter<'_, T> {
        let rows = self.collect_rows::<T>().unwrap_or_default();
        Box::new(rows.into_iter())
    }
}

impl RedbDatabase {
    /// Collect a table's committed rows in key order. Row counts here are
    /// bounded by the paid-history prune window, so materializing is fine.
    fn collect_rows<T: Table>(&self) -> eyre::Result<Vec<(T::Key, T::Value)>> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(table_def(T::NAME)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut rows = Vec::new();
        for entry in table.iter()? {
            let (key_guard, value_guard) = entry?;
            if let Ok(key) = try_decode_key(key_guard.value()) {
                rows.push((key, decode(value_guard.value())));
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_suite::*;

    fn open_db() -> (tempfile::TempDir, RedbDatabase) {
        let dir = tempfile::tempdir().unwrap();
        let db = RedbDatabase::open(dir.path().join("ledger.redb")).unwrap();
        (dir, db)
    }

    #[test]
    fn redb_txn_commit() {
        let (_dir, db) = open_db();
        test_txn_commit(db);
    }

    #[test]
    fn redb_txn_rollback_on_drop() {
        let (_dir, db) = open_db();
        test_txn_rollback_on_drop(db);
    }

    #[test]
    fn redb_iter_is_key_ordered() {
        let (_dir, db) = open_db();
        test_iter_is_key_ordered(db);
    }

    #[test]
    fn redb_remove_and_clear() {
        let (_dir, db) = open_db();
        test_remove_and_clear(db);
    }

    #[test]
    fn redb_overwrite() {
        let (_dir, db) = open_db();
        test_overwrite(db);
    }

    #[test]
    fn redb_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.redb");
        {
            let db = RedbDatabase::open(&path).unwrap();
            db.insert::<TestTable>(&(5, "addr".to_string()), &123).unwrap();
        }
        let db = RedbDatabase::open(&path).unwrap();
        assert_eq!(db.get::<TestTable>(&(5, "addr".to_string())).unwrap(), Some(123));
    }
}
