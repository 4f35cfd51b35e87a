//! Transactional key-value storage over RocksDB.
//!
//! All operations are synchronous blocking I/O; the ledger application is
//! single-threaded with respect to the block lifecycle, so nothing here
//! needs internal locking beyond what RocksDB provides.
//!
//! Two transaction flavors exist over one committed store:
//!
//! - the **durable** transaction opened by `begin()`: exactly one per
//!   replica at a time, buffering every write of a block until `commit()`
//! - the **ephemeral** overlay from `ephemeral()`: same read/write API,
//!   used by CheckTx pre-validation and Query, never committed

use crate::error::StorageError;
use rocksdb::{Options, WriteBatch, WriteOptions, DB};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

pub mod accessors;
pub mod keys;

/// Handle to the replica's on-disk ledger state.
///
/// Cheap to clone; all clones share the same underlying database.
#[derive(Clone)]
pub struct LedgerDb {
    db: Arc<DB>,
}

impl LedgerDb {
    /// Open or create the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path).map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Open the block's read-write transaction.
    ///
    /// The caller is responsible for holding at most one durable transaction
    /// at a time; block lifecycle ordering guarantees this.
    pub fn begin(&self) -> StateTx {
        StateTx {
            db: Arc::clone(&self.db),
            buffer: BTreeMap::new(),
            durable: true,
        }
    }

    /// Open a discardable overlay view over the last committed state.
    ///
    /// Writes stay in the overlay's private buffer and can never reach disk;
    /// dropping the value discards them without side effects.
    pub fn ephemeral(&self) -> StateTx {
        StateTx {
            db: Arc::clone(&self.db),
            buffer: BTreeMap::new(),
            durable: false,
        }
    }

    /// Dump every committed row in key order. Test support for the
    /// determinism property; not used on the hot path.
    pub fn dump(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.db
            .iterator(rocksdb::IteratorMode::Start)
            .filter_map(|item| item.ok().map(|(k, v)| (k.to_vec(), v.to_vec())))
            .collect()
    }
}

/// A buffered read-write transaction over the committed store.
pub struct StateTx {
    db: Arc<DB>,
    buffer: BTreeMap<Vec<u8>, Vec<u8>>,
    durable: bool,
}

impl StateTx {
    /// Read a value; buffered writes shadow the committed store.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>, StorageError> {
        if let Some(v) = self.buffer.get(key) {
            return Ok(v.clone());
        }
        match self.db.get(key) {
            Ok(Some(v)) => Ok(v),
            Ok(None) => Err(StorageError::NotFound),
            Err(e) => Err(StorageError::Database(e.to_string())),
        }
    }

    /// Buffer a write. Visible to subsequent reads in this transaction.
    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.buffer.insert(key, value);
    }

    /// Iterate all rows whose key starts with `prefix`, in ascending key
    /// order, merging the write buffer over the committed store.
    pub fn iter_prefix(&self, prefix: &[u8]) -> impl Iterator<Item = (Vec<u8>, Vec<u8>)> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self
            .db
            .iterator(rocksdb::IteratorMode::From(
                prefix,
                rocksdb::Direction::Forward,
            ))
            .take_while(|item| match item {
                Ok((key, _)) => key.starts_with(prefix),
                Err(_) => false,
            })
            .filter_map(|item| item.ok().map(|(k, v)| (k.to_vec(), v.to_vec())))
            .collect();

        for (k, v) in self.buffer.range(prefix.to_vec()..) {
            if !k.starts_with(prefix) {
                break;
            }
            merged.insert(k.clone(), v.clone());
        }

        merged.into_iter()
    }

    /// Atomically and durably persist the buffered writes.
    ///
    /// Only the durable transaction may commit; callers treat failure as
    /// fatal for block application.
    pub fn commit(self) -> Result<(), StorageError> {
        if !self.durable {
            return Err(StorageError::EphemeralCommit);
        }

        let mut batch = WriteBatch::default();
        for (k, v) in &self.buffer {
            batch.put(k, v);
        }

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(true);

        self.db
            .write_opt(batch, &write_opts)
            .map_err(|e| StorageError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, LedgerDb) {
        let dir = TempDir::new().unwrap();
        let db = LedgerDb::open(dir.path()).unwrap();
        (dir, db)
    }

    #[test]
    fn test_reads_see_buffered_writes() {
        let (_dir, db) = open_temp();
        let mut tx = db.begin();

        assert!(matches!(tx.get(b"a"), Err(StorageError::NotFound)));
        tx.set(b"a".to_vec(), b"1".to_vec());
        assert_eq!(tx.get(b"a").unwrap(), b"1");
    }

    #[test]
    fn test_commit_persists_and_ephemeral_does_not() {
        let (_dir, db) = open_temp();

        let mut tx = db.begin();
        tx.set(b"a".to_vec(), b"1".to_vec());
        tx.commit().unwrap();

        let mut mock = db.ephemeral();
        mock.set(b"b".to_vec(), b"2".to_vec());
        assert_eq!(mock.get(b"a").unwrap(), b"1");
        assert_eq!(mock.get(b"b").unwrap(), b"2");
        assert!(matches!(mock.commit(), Err(StorageError::EphemeralCommit)));

        let view = db.ephemeral();
        assert!(matches!(view.get(b"b"), Err(StorageError::NotFound)));
    }

    #[test]
    fn test_prefix_iteration_merges_buffer_over_store() {
        let (_dir, db) = open_temp();

        let mut tx = db.begin();
        tx.set(b"row_a".to_vec(), b"old".to_vec());
        tx.set(b"row_c".to_vec(), b"3".to_vec());
        tx.set(b"other_z".to_vec(), b"9".to_vec());
        tx.commit().unwrap();

        let mut tx = db.begin();
        tx.set(b"row_a".to_vec(), b"new".to_vec());
        tx.set(b"row_b".to_vec(), b"2".to_vec());

        let rows: Vec<_> = tx.iter_prefix(b"row_").collect();
        assert_eq!(
            rows,
            vec![
                (b"row_a".to_vec(), b"new".to_vec()),
                (b"row_b".to_vec(), b"2".to_vec()),
                (b"row_c".to_vec(), b"3".to_vec()),
            ]
        );
    }
}
