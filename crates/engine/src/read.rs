//! Read path: `get()`.
//!
//! Layers are consulted freshest-first: the active memtable, then the
//! immutable slot (a freeze in progress must not hide the frozen table's
//! data), then the SSTables newest→oldest. A tombstone in any layer shadows
//! everything older. Each lock is released before the next is taken,
//! honoring the `active → immutable → sstable` ordering rule.

use memtable::is_tombstone;

use crate::{Result, Store};

impl Store {
    /// Looks up a key, returning `None` if no layer holds a live binding.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        {
            let mem = self.lock_mgr.acquire_memtable(&self.active);
            if let Some(value) = mem.get(key) {
                return Ok(if is_tombstone(value) {
                    None
                } else {
                    Some(value.to_vec())
                });
            }
        }

        if let Some(value) = self.immutable.get(key) {
            return Ok(if is_tombstone(&value) {
                None
            } else {
                Some(value)
            });
        }

        Ok(self.reader.get(key)?)
    }
}
