//! Background flusher: freezes a full memtable and persists it as an
//! SSTable.
//!
//! The flusher polls the active memtable. Once it holds at least
//! `threshold` keys, the flusher rotates the WAL and moves the table into
//! the immutable slot (all under the active mutex, so the retired log
//! covers exactly the frozen table), installs a fresh active table, and
//! then — outside the memtable locks — writes the frozen contents to a new
//! SSTable under the SSTable exclusive lock. The slot is cleared and the
//! retired log deleted only after the publish succeeds, so a failed write
//! is retried on the next cycle and a crash loses nothing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use lockmgr::LockManager;
use memtable::MemTable;
use parking_lot::{Condvar, Mutex};
use sstable::{next_file_number, SstReader, SstWriter};
use tracing::{debug, error, info, warn};
use wal::Wal;

use crate::{Result, Store, StoreError};

const ACTOR_NAME: &str = "flusher";
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Slot holding a frozen memtable between freeze and publish.
///
/// Only the flusher installs and clears the slot; the store's read path
/// consults it so data in flight is never invisible. The condvar signals
/// every state change, which also lets the flusher wait out its poll
/// quantum interruptibly.
pub struct ImmutableTable {
    slot: Mutex<Option<MemTable>>,
    handoff: Condvar,
}

impl Default for ImmutableTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ImmutableTable {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            handoff: Condvar::new(),
        }
    }

    /// Exact lookup in the frozen table, if one is present. Tombstones are
    /// returned like any other value.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.slot
            .lock()
            .as_ref()
            .and_then(|table| table.get(key).map(|v| v.to_vec()))
    }

    pub fn is_occupied(&self) -> bool {
        self.slot.lock().is_some()
    }

    fn install(&self, table: MemTable) {
        *self.slot.lock() = Some(table);
        self.handoff.notify_all();
    }

    fn snapshot(&self) -> Option<BTreeMap<Vec<u8>, Vec<u8>>> {
        self.slot.lock().as_ref().map(|table| table.snapshot())
    }

    fn clear(&self) {
        *self.slot.lock() = None;
        self.handoff.notify_all();
    }

    fn notify(&self) {
        self.handoff.notify_all();
    }

    /// Blocks for at most one poll quantum, waking early on any handoff
    /// signal (including shutdown).
    fn wait_quantum(&self) {
        let mut slot = self.slot.lock();
        let _ = self.handoff.wait_for(&mut slot, POLL_INTERVAL);
    }
}

/// Background actor that rotates full memtables out to SSTables.
pub struct Flusher {
    inner: Arc<FlusherInner>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

struct FlusherInner {
    active: Arc<parking_lot::Mutex<MemTable>>,
    immutable: Arc<ImmutableTable>,
    writer: SstWriter,
    wal: Arc<Wal>,
    reader: Arc<SstReader>,
    threshold: usize,
    lock_mgr: Arc<LockManager>,
    running: AtomicBool,
}

impl Flusher {
    /// Builds a flusher over a store's shared state. Typical wiring:
    ///
    /// ```ignore
    /// let flusher = Flusher::new(
    ///     store.active_table(),
    ///     store.immutable_table(),
    ///     SstWriter::new(store.data_dir()),
    ///     store.wal(),
    ///     store.reader(),
    ///     threshold,
    ///     store.lock_manager(),
    /// );
    /// flusher.start()?;
    /// ```
    pub fn new(
        active: Arc<parking_lot::Mutex<MemTable>>,
        immutable: Arc<ImmutableTable>,
        writer: SstWriter,
        wal: Arc<Wal>,
        reader: Arc<SstReader>,
        threshold: usize,
        lock_mgr: Arc<LockManager>,
    ) -> Self {
        Self {
            inner: Arc::new(FlusherInner {
                active,
                immutable,
                writer,
                wal,
                reader,
                threshold,
                lock_mgr,
                running: AtomicBool::new(false),
            }),
            handle: Mutex::new(None),
        }
    }

    /// Convenience constructor wiring every collaborator from the store.
    pub fn for_store(store: &Store, threshold: usize) -> Self {
        Self::new(
            store.active_table(),
            store.immutable_table(),
            SstWriter::new(store.data_dir()),
            store.wal(),
            store.reader(),
            threshold,
            store.lock_manager(),
        )
    }

    /// Starts the background thread.
    pub fn start(&self) -> Result<()> {
        let mut handle = self.handle.lock();
        if self.inner.running.load(Ordering::Acquire) {
            return Err(StoreError::AlreadyRunning(ACTOR_NAME));
        }
        if handle.is_some() {
            // A stop() is still joining the previous thread.
            return Err(StoreError::ShutdownInProgress(ACTOR_NAME));
        }
        self.inner.running.store(true, Ordering::Release);

        let inner = Arc::clone(&self.inner);
        *handle = Some(
            std::thread::Builder::new()
                .name("silt-flusher".into())
                .spawn(move || inner.run())?,
        );
        Ok(())
    }

    /// Stops the background thread, draining any frozen memtable first.
    pub fn stop(&self) -> Result<()> {
        if !self.inner.running.swap(false, Ordering::AcqRel) {
            return Err(if self.handle.lock().is_some() {
                StoreError::ShutdownInProgress(ACTOR_NAME)
            } else {
                StoreError::NotRunning(ACTOR_NAME)
            });
        }
        self.inner.immutable.notify();
        // Hold the handle lock across the join so a concurrent start()
        // cannot spawn a second thread while this one drains.
        let mut handle = self.handle.lock();
        if let Some(handle) = handle.take() {
            let _ = handle.join();
        }
        Ok(())
    }
}

impl Drop for Flusher {
    fn drop(&mut self) {
        if self.inner.running.load(Ordering::Acquire) {
            let _ = self.stop();
        }
    }
}

impl FlusherInner {
    fn run(&self) {
        info!("flusher started (threshold: {} keys)", self.threshold);
        while self.running.load(Ordering::Acquire) {
            if self.immutable.is_occupied() {
                if let Err(e) = self.flush_immutable() {
                    warn!("flush failed, keeping frozen table for retry: {}", e);
                    self.immutable.wait_quantum();
                }
                continue;
            }
            if !self.try_freeze() {
                self.immutable.wait_quantum();
            }
        }

        // Drain: a frozen table must not outlive the thread.
        if self.immutable.is_occupied() {
            if let Err(e) = self.flush_immutable() {
                error!("failed to drain frozen memtable on shutdown: {}", e);
            }
        }
        info!("flusher stopped");
    }

    /// Freezes the active table if it has reached the threshold.
    ///
    /// Rotation happens before the swap and under the same active-mutex
    /// hold, so on a rotation error nothing has moved, and on success the
    /// retired log covers exactly the frozen table.
    fn try_freeze(&self) -> bool {
        let mut active = self.lock_mgr.acquire_memtable(&self.active);
        if active.size() < self.threshold {
            return false;
        }
        if let Err(e) = self.wal.rotate() {
            warn!("wal rotation failed, deferring freeze: {}", e);
            return false;
        }
        let frozen = std::mem::take(&mut *active);
        debug!("froze memtable with {} keys", frozen.size());
        self.immutable.install(frozen);
        true
    }

    /// Publishes the frozen table as a new SSTable and releases it.
    fn flush_immutable(&self) -> Result<()> {
        let Some(sorted) = self.immutable.snapshot() else {
            return Ok(());
        };

        if !sorted.is_empty() {
            let _guard = self.lock_mgr.acquire_sstable_exclusive();
            let file_number = next_file_number(self.writer.data_dir())?;
            self.writer.write(&sorted, file_number)?;
            self.reader.refresh()?;
            info!(
                "flushed {} records to sstable {:08}",
                sorted.len(),
                file_number
            );
        }

        self.immutable.clear();
        self.wal.remove_retired()?;
        Ok(())
    }
}
