// SPDX-License-Identifier: Apache-2.0

//! Typed table storage for the rewards ledger.
//!
//! The ledger's correctness rests on two properties of this layer: a write
//! transaction commits all of its changes or none of them, and reads inside a
//! write transaction observe that transaction's own writes. Both backends
//! (in-memory and redb) uphold both.

mod mem_db;
mod redb_db;
mod tables;
mod traits;

pub use mem_db::*;
pub use redb_db::*;
pub use tables::*;
pub use traits::*;

#[cfg(test)]
pub(crate) mod test_suite {
    use crate::{Database, DbTx as _, DbTxMut as _, Table};

    #[derive(Debug)]
    pub struct TestTable;

    impl Table for TestTable {
        type Key = (u64, String);
        type Value = u64;

        const NAME: &'static str = "test_table";
    }

    pub fn test_txn_commit<DB: Database>(db: DB) {
        let mut txn = db.write_txn().unwrap();
        txn.insert::<TestTable>(&(1, "a".to_string()), &10).unwrap();
        txn.insert::<TestTable>(&(2, "b".to_string()), &20).unwrap();
        // Reads inside the transaction see its own writes.
        assert_eq!(txn.get::<TestTable>(&(1, "a".to_string())).unwrap(), Some(10));
        // Nothing is visible outside until commit.
        assert_eq!(db.get::<TestTable>(&(1, "a".to_string())).unwrap(), None);
        txn.commit().unwrap();
        assert_eq!(db.get::<TestTable>(&(1, "a".to_string())).unwrap(), Some(10));
        assert_eq!(db.get::<TestTable>(&(2, "b".to_string())).unwrap(), Some(20));
    }

    pub fn test_txn_rollback_on_drop<DB: Database>(db: DB) {
        db.insert::<TestTable>(&(1, "a".to_string()), &10).unwrap();
        {
            let mut txn = db.write_txn().unwrap();
            txn.insert::<TestTable>(&(9, "z".to_string()), &90).unwrap();
            txn.remove::<TestTable>(&(1, "a".to_string())).unwrap();
            // dropped without commit
        }
        assert_eq!(db.get::<TestTable>(&(1, "a".to_string())).unwrap(), Some(10));
        assert_eq!(db.get::<TestTable>(&(9, "z".to_string())).unwrap(), None);
    }

    pub fn test_iter_is_key_ordered<DB: Database>(db: DB) {
        db.insert::<TestTable>(&(2, "b".to_string()), &2).unwrap();
        db.insert::<TestTable>(&(1, "b".to_string()), &1).unwrap();
        db.insert::<TestTable>(&(1, "a".to_string()), &0).unwrap();
        let keys: Vec<_> = db.iter::<TestTable>().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                (1, "a".to_string()),
                (1, "b".to_string()),
                (2, "b".to_string())
            ]
        );
    }

    pub fn test_remove_and_clear<DB: Database>(db: DB) {
        db.insert::<TestTable>(&(1, "a".to_string()), &1).unwrap();
        db.insert::<TestTable>(&(2, "b".to_string()), &2).unwrap();
        db.remove::<TestTable>(&(1, "a".to_string())).unwrap();
        assert_eq!(db.get::<TestTable>(&(1, "a".to_string())).unwrap(), None);
        assert!(!db.is_empty::<TestTable>());
        db.clear_table::<TestTable>().unwrap();
        assert!(db.is_empty::<TestTable>());
    }

    pub fn test_overwrite<DB: Database>(db: DB) {
        db.insert::<TestTable>(&(1, "a".to_string()), &1).unwrap();
        db.insert::<TestTable>(&(1, "a".to_string()), &2).unwrap();
        assert_eq!(db.get::<TestTable>(&(1, "a".to_string())).unwrap(), Some(2));
        assert_eq!(db.iter::<TestTable>().count(), 1);
    }
}
