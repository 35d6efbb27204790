//! Database traits the ledger is written against.

use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

pub trait KeyT: Serialize + DeserializeOwned + Send + Sync + Ord + Clone + Debug + 'static {}
pub trait ValueT: Serialize + DeserializeOwned + Send + Sync + Clone + Debug + 'static {}

impl<K: Serialize + DeserializeOwned + Send + Sync + Ord + Clone + Debug + 'static> KeyT for K {}
impl<V: Serialize + DeserializeOwned + Send + Sync + Clone + Debug + 'static> ValueT for V {}

/// A typed table: a name plus key and value types. Key bytes are produced
/// with the sort-preserving key codec so iteration order matches `Ord` on
/// the typed key.
pub trait Table: Send + Sync + Debug + 'static {
    type Key: KeyT;
    type Value: ValueT;

    const NAME: &'static str;
}

/// A read transaction.
pub trait DbTx {
    fn get<T: Table>(&self, key: &T::Key) -> eyre::Result<Option<T::Value>>;

    fn contains_key<T: Table>(&self, key: &T::Key) -> eyre::Result<bool> {
        Ok(self.get::<T>(key)?.is_some())
    }
}

/// A write transaction.
///
/// Dropping without [`commit`](DbTxMut::commit) discards every change.
/// `get` on a write transaction MUST observe the transaction's own writes;
/// the ledger's read-modify-write accrual updates depend on it.
pub trait DbTxMut: DbTx {
    fn insert<T: Table>(&mut self, key: &T::Key, value: &T::Value) -> eyre::Result<()>;

    fn remove<T: Table>(&mut self, key: &T::Key) -> eyre::Result<()>;

    fn clear_table<T: Table>(&mut self) -> eyre::Result<()>;

    /// Atomically publish every change in this transaction.
    fn commit(self) -> eyre::Result<()>;
}

pub type DBIter<'i, T> = Box<dyn Iterator<Item = (<T as Table>::Key, <T as Table>::Value)> + 'i>;

/// A database holding a fixed set of typed tables.
pub trait Database: Send + Sync + Clone + 'static {
    type TX<'txn>: DbTx + 'txn
    where
        Self: 'txn;
    type TXMut<'txn>: DbTxMut + 'txn
    where
        Self: 'txn;

    fn read_txn(&self) -> eyre::Result<Self::TX<'_>>;

    fn write_txn(&self) -> eyre::Result<Self::TXMut<'_>>;

    fn get<T: Table>(&self, key: &T::Key) -> eyre::Result<Option<T::Value>>;

    fn contains_key<T: Table>(&self, key: &T::Key) -> eyre::Result<bool> {
        Ok(self.get::<T>(key)?.is_some())
    }

    /// One-off insert in its own transaction.
    fn insert<T: Table>(&self, key: &T::Key, value: &T::Value) -> eyre::Result<()>;

    /// One-off remove in its own transaction.
    fn remove<T: Table>(&self, key: &T::Key) -> eyre::Result<()>;

    fn clear_table<T: Table>(&self) -> eyre::Result<()>;

    fn is_empty<T: Table>(&self) -> bool;

    /// Iterate the committed state of a table in key order.
    fn iter<T: Table>(&self) -> DBIter<'_, T>;
}
