//! # Engine — SiltKV storage engine
//!
//! The central crate tying [`memtable`], [`wal`], [`sstable`], and
//! [`lockmgr`] into a persistent, single-node, embeddable LSM key-value
//! store.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌─────────────────────────────────────────────────────┐
//! │                      STORE                          │
//! │                                                     │
//! │ write.rs → WAL append → active MemTable insert      │
//! │ read.rs  → active → immutable → SSTables newest→old │
//! └───────┬─────────────────────────────────┬───────────┘
//!         │                                 │
//!         v                                 v
//!    FLUSHER (thread)                COMPACTOR (thread)
//!    size ≥ threshold?               count ≥ trigger?
//!    freeze + rotate WAL             merge oldest N
//!    write SSTable, retire WAL       publish, delete inputs
//!    refresh reader metadata         refresh reader metadata
//! ```
//!
//! ## Module responsibilities
//!
//! | Module         | Purpose                                            |
//! |----------------|----------------------------------------------------|
//! | `lib.rs`       | `Store` struct, `open`, accessors, metadata refresh |
//! | `write.rs`     | `put()` / `del()`                                  |
//! | `read.rs`      | `get()`                                            |
//! | `recovery.rs`  | WAL replay, retired-log consolidation, tmp cleanup |
//! | `flusher.rs`   | Background flusher and the immutable-table slot    |
//! | `compactor.rs` | Background compactor                               |
//! | `error.rs`     | `StoreError` / `Result`                            |
//!
//! ## Crash safety
//!
//! Every mutation is appended to the WAL before the memtable insert. The
//! flusher rotates the WAL when it freezes the memtable and deletes the
//! retired log only after the SSTable is durably published; a retired log
//! found at open is replayed and consolidated. SSTables are published via
//! temp file + rename, so a visible `.sst` is always complete.

mod compactor;
mod error;
mod flusher;
mod read;
mod recovery;
mod write;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lockmgr::LockManager;
use memtable::MemTable;
use parking_lot::Mutex;
use sstable::SstReader;
use tracing::info;
use wal::Wal;

pub use compactor::Compactor;
pub use error::{Result, StoreError};
pub use flusher::{Flusher, ImmutableTable};

/// The store facade: public read/write API plus the shared state the
/// background actors operate on.
///
/// All methods take `&self`; share the store across threads with an `Arc`.
pub struct Store {
    data_dir: PathBuf,
    active: Arc<Mutex<MemTable>>,
    immutable: Arc<ImmutableTable>,
    wal: Arc<Wal>,
    reader: Arc<SstReader>,
    lock_mgr: Arc<LockManager>,
}

impl Store {
    /// Opens the store rooted at `path`, creating the directory if missing.
    ///
    /// Recovery steps:
    /// 1. Remove orphan `.sst.tmp` files from interrupted publishes.
    /// 2. Replay the WAL (retired log first, if a flush never completed)
    ///    into a fresh memtable.
    /// 3. Open the WAL writer in append mode — failure fails construction.
    /// 4. If a retired log was found, consolidate the rebuilt state into a
    ///    single `wal.log` and delete the retired file.
    /// 5. Scan the directory and build the SSTable reader metadata.
    pub fn open(path: impl AsRef<Path>, lock_mgr: Arc<LockManager>) -> Result<Store> {
        let data_dir = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;
        recovery::remove_orphan_tmp_files(&data_dir);

        let mut mem = MemTable::new();
        let had_retired = recovery::replay_wal(&data_dir, &mut mem)?;

        let wal = Arc::new(Wal::open(&data_dir, false)?);
        if had_retired {
            recovery::consolidate_wal(&wal, &mem)?;
        }

        let reader = Arc::new(SstReader::open(&data_dir, Arc::clone(&lock_mgr))?);
        info!(
            "store opened at {:?}: {} memtable entries, {} sstables",
            data_dir,
            mem.size(),
            reader.table_count()
        );

        Ok(Store {
            data_dir,
            active: Arc::new(Mutex::new(mem)),
            immutable: Arc::new(ImmutableTable::new()),
            wal,
            reader,
            lock_mgr,
        })
    }

    /// Reloads the SSTable reader metadata from the directory.
    ///
    /// Invoked by the compactor under the SSTable exclusive lock and by the
    /// flusher after publishing. Idempotent.
    pub fn refresh_sstable_metadata(&self) -> Result<()> {
        self.reader.refresh()?;
        Ok(())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Handle to the active memtable and its mutex, for the flusher.
    pub fn active_table(&self) -> Arc<Mutex<MemTable>> {
        Arc::clone(&self.active)
    }

    /// Handle to the immutable-table slot, for the flusher.
    pub fn immutable_table(&self) -> Arc<ImmutableTable> {
        Arc::clone(&self.immutable)
    }

    /// Handle to the write-ahead log, for the flusher's rotation lifecycle.
    pub fn wal(&self) -> Arc<Wal> {
        Arc::clone(&self.wal)
    }

    /// Handle to the SSTable reader, for post-publish metadata refreshes.
    pub fn reader(&self) -> Arc<SstReader> {
        Arc::clone(&self.reader)
    }

    pub fn lock_manager(&self) -> Arc<LockManager> {
        Arc::clone(&self.lock_mgr)
    }

    /// Distinct keys currently in the active memtable.
    pub fn memtable_size(&self) -> usize {
        self.lock_mgr.acquire_memtable(&self.active).size()
    }

    /// Number of SSTables currently known to the reader.
    pub fn sstable_count(&self) -> usize {
        self.reader.table_count()
    }
}

#[cfg(test)]
mod tests;
