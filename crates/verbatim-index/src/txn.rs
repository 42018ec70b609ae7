//! Transactions over the entries table
//!
//! A [`Transaction`] wraps either a redb read snapshot or a redb write
//! transaction, plus the [`Worker`] whose counters its operations feed.
//! Writes are only visible after [`Transaction::commit`]; dropping an
//! uncommitted write transaction discards everything issued on it.

use crate::error::{IndexError, IndexResult};
use crate::key::Key;
use crate::pool::Worker;
use crate::tables;
use redb::ReadableTable;

enum Inner {
    Read(redb::ReadTransaction),
    Write(redb::WriteTransaction),
}

/// One atomic read-or-write unit against the store
pub struct Transaction {
    inner: Inner,
    worker: Worker,
}

impl Transaction {
    pub(crate) const fn read(txn: redb::ReadTransaction, worker: Worker) -> Self {
        Self {
            inner: Inner::Read(txn),
            worker,
        }
    }

    pub(crate) const fn write(txn: redb::WriteTransaction, worker: Worker) -> Self {
        Self {
            inner: Inner::Write(txn),
            worker,
        }
    }

    /// Worker credited with operations on this transaction
    #[must_use]
    pub const fn worker(&self) -> Worker {
        self.worker
    }

    /// Apply every write issued on this transaction
    pub fn commit(self) -> IndexResult<()> {
        match self.inner {
            Inner::Read(_) => Ok(()),
            Inner::Write(txn) => Ok(txn.commit()?),
        }
    }

    /// Discard every write issued on this transaction
    pub fn abort(self) -> IndexResult<()> {
        match self.inner {
            Inner::Read(_) => Ok(()),
            Inner::Write(txn) => Ok(txn.abort()?),
        }
    }

    pub(crate) fn get(&self, key: Key) -> IndexResult<Option<Vec<u8>>> {
        match &self.inner {
            Inner::Read(txn) => {
                let table = txn.open_table(tables::ENTRIES)?;
                get_bytes(&table, key)
            }
            Inner::Write(txn) => {
                let table = txn.open_table(tables::ENTRIES)?;
                get_bytes(&table, key)
            }
        }
    }

    pub(crate) fn put(&self, key: Key, bytes: &[u8]) -> IndexResult<()> {
        let Inner::Write(txn) = &self.inner else {
            return Err(IndexError::ReadOnlyTransaction);
        };
        let mut table = txn.open_table(tables::ENTRIES)?;
        table.insert(key.to_table_key(), bytes)?;
        Ok(())
    }

    /// Returns whether the key was present
    pub(crate) fn delete(&self, key: Key) -> IndexResult<bool> {
        let Inner::Write(txn) = &self.inner else {
            return Err(IndexError::ReadOnlyTransaction);
        };
        let mut table = txn.open_table(tables::ENTRIES)?;
        let existed = table.remove(key.to_table_key())?.is_some();
        Ok(existed)
    }

    /// Visit every stored `(key, bytes)` pair in key order
    pub(crate) fn for_each<F>(&self, f: F) -> IndexResult<()>
    where
        F: FnMut(Key, &[u8]) -> IndexResult<()>,
    {
        match &self.inner {
            Inner::Read(txn) => {
                let table = txn.open_table(tables::ENTRIES)?;
                scan(&table, f)
            }
            Inner::Write(txn) => {
                let table = txn.open_table(tables::ENTRIES)?;
                scan(&table, f)
            }
        }
    }
}

fn get_bytes<T>(table: &T, key: Key) -> IndexResult<Option<Vec<u8>>>
where
    T: ReadableTable<(u8, u64), &'static [u8]>,
{
    let bytes = table.get(key.to_table_key())?.map(|v| v.value().to_vec());
    Ok(bytes)
}

fn scan<T, F>(table: &T, mut f: F) -> IndexResult<()>
where
    T: ReadableTable<(u8, u64), &'static [u8]>,
    F: FnMut(Key, &[u8]) -> IndexResult<()>,
{
    for entry in table.iter()? {
        let entry = entry?;
        f(Key::from_table_key(entry.0.value()), entry.1.value())?;
    }
    Ok(())
}
