//! Write path: `put()` and `del()`.
//!
//! Every mutation is appended to the WAL before it touches the memtable,
//! and both happen under the active-table mutex so the flusher can never
//! rotate the log between the append and the insert.

use memtable::TOMBSTONE;

use crate::{Result, Store};

impl Store {
    /// Inserts or overwrites a binding.
    ///
    /// The WAL append precedes the memtable mutation; if the append fails
    /// the error is returned and the memtable is untouched, so there is no
    /// partial visibility. Storing the reserved tombstone literal as an
    /// application value is outside the contract.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        let mut mem = self.lock_mgr.acquire_memtable(&self.active);
        self.wal.append(&key, &value)?;
        mem.put(key, value);
        Ok(())
    }

    /// Deletes a key by writing the tombstone sentinel.
    ///
    /// The tombstone shadows any older value in the SSTable tier until
    /// compaction can safely drop the key.
    pub fn del(&self, key: Vec<u8>) -> Result<()> {
        self.put(key, TOMBSTONE.to_vec())
    }
}
