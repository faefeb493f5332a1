//! # LockManager — centralized lock coordination
//!
//! A single point of control for the locks shared between the store facade,
//! the flusher, and the compactor.
//!
//! ## Lock inventory
//!
//! - **SSTable set lock** (reader/writer): shared for any read of SSTable
//!   metadata or file contents, exclusive for publishing a flushed table or
//!   rewriting the set during compaction.
//! - **MemTable mutexes** are owned by their tables; [`LockManager`] only
//!   offers a scoped acquisition wrapper so every component goes through the
//!   same discipline.
//!
//! ## Ordering rule
//!
//! A thread must never hold the SSTable exclusive lock while attempting to
//! acquire a memtable mutex. The only permitted nesting order is
//! `active memtable → immutable memtable → sstable`; the read path releases
//! each lock before taking the next.

use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
pub struct LockManager {
    sstable: RwLock<()>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared access to the SSTable set: metadata walks and file reads.
    pub fn acquire_sstable_shared(&self) -> RwLockReadGuard<'_, ()> {
        self.sstable.read()
    }

    /// Exclusive access to the SSTable set: flush publish, compaction
    /// publish and input deletion, metadata reload.
    pub fn acquire_sstable_exclusive(&self) -> RwLockWriteGuard<'_, ()> {
        self.sstable.write()
    }

    /// Scoped acquisition of a caller-provided memtable mutex.
    pub fn acquire_memtable<'a, T>(&self, table: &'a Mutex<T>) -> MutexGuard<'a, T> {
        table.lock()
    }
}
