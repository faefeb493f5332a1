use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lockmgr::LockManager;
use memtable::TOMBSTONE;
use sstable::SstWriter;

use crate::Store;

pub fn open_store(dir: &Path) -> Arc<Store> {
    Arc::new(Store::open(dir, Arc::new(LockManager::new())).unwrap())
}

pub fn count_sst_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|ext| ext == "sst")
                .unwrap_or(false)
        })
        .count()
}

/// Writes an SSTable with `file_number` from `(key, value)` string pairs.
pub fn seed_table(dir: &Path, file_number: u64, pairs: &[(&str, &str)]) {
    let mut sorted = BTreeMap::new();
    for (k, v) in pairs {
        sorted.insert(k.as_bytes().to_vec(), v.as_bytes().to_vec());
    }
    SstWriter::new(dir).write(&sorted, file_number).unwrap();
}

pub fn tomb() -> &'static str {
    std::str::from_utf8(TOMBSTONE).unwrap()
}

/// Polls `pred` every 20 ms until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut pred: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if pred() {
            return true;
        }
        if Instant::now() >= deadline {
            return pred();
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}
