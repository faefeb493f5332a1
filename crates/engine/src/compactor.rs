//! Background compactor: multi-way merges the oldest SSTables into one.
//!
//! Each round discovers the `.sst` files, and once their count reaches the
//! trigger threshold it merges the oldest `compaction_count` of them under
//! the SSTable exclusive lock, publishes the result at `max + 1`, deletes
//! the inputs, and refreshes the store's reader metadata. Readers observe
//! either the pre-round or the post-round set, never a mix.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use lockmgr::LockManager;
use parking_lot::Mutex;
use sstable::{merge_tables, next_file_number, parse_file_number, SstWriter};
use tracing::{debug, info, warn};

use crate::{Result, Store, StoreError};

const ACTOR_NAME: &str = "compactor";
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Background actor that bounds read amplification by merging old tables.
pub struct Compactor {
    inner: Arc<CompactorInner>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

struct CompactorInner {
    data_dir: PathBuf,
    trigger_threshold: usize,
    compaction_count: usize,
    lock_mgr: Arc<LockManager>,
    /// Injected after both objects exist; used only for the idempotent
    /// metadata refresh after a publish.
    store: Mutex<Option<Weak<Store>>>,
    running: AtomicBool,
}

impl Compactor {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        trigger_threshold: usize,
        compaction_count: usize,
        lock_mgr: Arc<LockManager>,
    ) -> Self {
        Self {
            inner: Arc::new(CompactorInner {
                data_dir: data_dir.into(),
                trigger_threshold,
                compaction_count,
                lock_mgr,
                store: Mutex::new(None),
                running: AtomicBool::new(false),
            }),
            handle: Mutex::new(None),
        }
    }

    /// Links the store for post-round metadata refreshes. Held weakly, so
    /// the compactor never extends the store's lifetime.
    pub fn set_store(&self, store: &Arc<Store>) {
        *self.inner.store.lock() = Some(Arc::downgrade(store));
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
                .name("silt-compactor".into())
                .spawn(move || inner.run())?,
        );
        Ok(())
    }

    /// Stops the background thread after the in-flight round completes.
    pub fn stop(&self) -> Result<()> {
        if !self.inner.running.swap(false, Ordering::AcqRel) {
            return Err(if self.handle.lock().is_some() {
                StoreError::ShutdownInProgress(ACTOR_NAME)
            } else {
                StoreError::NotRunning(ACTOR_NAME)
            });
        }
        // Hold the handle lock across the join so a concurrent start()
        // cannot spawn a second thread while this one drains.
        let mut handle = self.handle.lock();
        if let Some(handle) = handle.take() {
            let _ = handle.join();
        }
        Ok(())
    }
}

impl Drop for Compactor {
    fn drop(&mut self) {
        if self.inner.running.load(Ordering::Acquire) {
            let _ = self.stop();
        }
    }
}

impl CompactorInner {
    fn run(&self) {
        info!(
            "compactor started (trigger: {} tables, batch: {})",
            self.trigger_threshold, self.compaction_count
        );
        while self.running.load(Ordering::Acquire) {
            if let Err(e) = self.maybe_compact() {
                warn!("compaction round failed, inputs left intact: {}", e);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
        info!("compactor stopped");
    }

    fn maybe_compact(&self) -> Result<()> {
        let tables = self.discover_tables()?;
        if tables.len() < self.trigger_threshold {
            return Ok(());
        }

        let take = self.compaction_count.min(tables.len());
        debug!(
            "compaction triggered: {} tables, merging the oldest {}",
            tables.len(),
            take
        );
        self.compact_round(&tables[..take])
    }

    /// Lists the `.sst` files oldest-first. Non-numeric names are skipped.
    fn discover_tables(&self) -> Result<Vec<(u64, PathBuf)>> {
        let mut tables = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.extension().map(|e| e == "sst").unwrap_or(false) {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            match parse_file_number(name) {
                Ok(number) => tables.push((number, path)),
                Err(_) => warn!("ignoring sstable with non-numeric name: {}", name),
            }
        }
        tables.sort_by_key(|(number, _)| *number);
        Ok(tables)
    }

    fn compact_round(&self, inputs: &[(u64, PathBuf)]) -> Result<()> {
        let _guard = self.lock_mgr.acquire_sstable_exclusive();

        // A tombstone may be dropped only when every older occurrence of
        // its key is inside this round, i.e. when the oldest live table is
        // among the inputs; otherwise it must survive to keep shadowing
        // values in older, non-input files.
        let Some(oldest_live) = self.discover_tables()?.first().map(|(n, _)| *n) else {
            return Ok(());
        };
        let drop_tombstones = inputs.iter().any(|(number, _)| *number == oldest_live);

        let paths: Vec<PathBuf> = inputs.iter().map(|(_, path)| path.clone()).collect();
        let merged = merge_tables(&paths, drop_tombstones)?;

        if merged.is_empty() {
            debug!("merge produced no records; removing inputs without an output");
        } else {
            let file_number = next_file_number(&self.data_dir)?;
            SstWriter::new(&self.data_dir).write(&merged, file_number)?;
            info!(
                "compacted {} tables into {:08} ({} records, drop_tombstones: {})",
                inputs.len(),
                file_number,
                merged.len(),
                drop_tombstones
            );
        }

        for (_, path) in inputs {
            std::fs::remove_file(path)?;
            debug!("removed compacted input {:?}", path.file_name());
        }

        if let Some(store) = self.store.lock().as_ref().and_then(Weak::upgrade) {
            store.refresh_sstable_metadata()?;
        }
        Ok(())
    }
}
