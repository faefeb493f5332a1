use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lockmgr::LockManager;
use memtable::is_tombstone;
use parking_lot::RwLock;
use tracing::warn;

use crate::format::{parse_file_number, read_record};
use crate::TableError;

/// Cached per-file metadata, derived by one scan when the file is opened.
#[derive(Debug, Clone)]
pub struct TableMeta {
    pub file_number: u64,
    pub path: PathBuf,
    pub min_key: Vec<u8>,
    pub max_key: Vec<u8>,
}

/// Reads keys out of the SSTable tier, newest file first.
///
/// On construction (and on [`refresh`](SstReader::refresh)) the data
/// directory is scanned for `.sst` files; each file's `min_key`/`max_key`
/// are computed in a single pass and cached, sorted by file number
/// descending. Zero-record files and files with non-numeric names are
/// excluded.
pub struct SstReader {
    data_dir: PathBuf,
    lock_mgr: Arc<LockManager>,
    tables: RwLock<Vec<TableMeta>>,
}

impl SstReader {
    pub fn open(data_dir: impl Into<PathBuf>, lock_mgr: Arc<LockManager>) -> Result<Self, TableError> {
        let data_dir = data_dir.into();
        let tables = load_tables(&data_dir)?;
        Ok(Self {
            data_dir,
            lock_mgr,
            tables: RwLock::new(tables),
        })
    }

    /// Looks `key` up across the SSTable set under the shared lock.
    ///
    /// Files are visited newest→oldest; the first file whose key range
    /// covers `key` and whose scan finds it decides the outcome. A hit on
    /// the tombstone sentinel returns `None` — the tombstone shadows any
    /// older occurrence.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, TableError> {
        let _guard = self.lock_mgr.acquire_sstable_shared();
        let tables = self.tables.read();

        for meta in tables.iter() {
            if key < meta.min_key.as_slice() || key > meta.max_key.as_slice() {
                continue;
            }
            if let Some(value) = scan_for_key(&meta.path, key)? {
                return Ok(if is_tombstone(&value) {
                    None
                } else {
                    Some(value)
                });
            }
        }
        Ok(None)
    }

    /// Reloads the metadata from the directory.
    ///
    /// Callers hold the SSTable exclusive lock; both background actors
    /// invoke this after publishing. Idempotent.
    pub fn refresh(&self) -> Result<(), TableError> {
        let fresh = load_tables(&self.data_dir)?;
        *self.tables.write() = fresh;
        Ok(())
    }

    /// Number of tables currently known to the reader.
    pub fn table_count(&self) -> usize {
        self.tables.read().len()
    }
}

fn load_tables(data_dir: &Path) -> Result<Vec<TableMeta>, TableError> {
    let mut tables = Vec::new();

    for entry in fs::read_dir(data_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.extension().map(|e| e == "sst").unwrap_or(false) {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let file_number = match parse_file_number(name) {
            Ok(n) => n,
            Err(_) => {
                warn!("ignoring sstable with non-numeric name: {}", name);
                continue;
            }
        };
        if let Some((min_key, max_key)) = scan_key_range(&path)? {
            tables.push(TableMeta {
                file_number,
                path,
                min_key,
                max_key,
            });
        }
    }

    // Newest first: the greatest file number wins ties between files.
    tables.sort_by(|a, b| b.file_number.cmp(&a.file_number));
    Ok(tables)
}

/// Walks a file's records once, returning its key range, or `None` for a
/// file with zero decodable records. A malformed record ends the walk; the
/// range covers whatever decoded before it.
fn scan_key_range(path: &Path) -> Result<Option<(Vec<u8>, Vec<u8>)>, TableError> {
    let mut rdr = BufReader::new(File::open(path)?);
    let mut range: Option<(Vec<u8>, Vec<u8>)> = None;

    loop {
        match read_record(&mut rdr) {
            Ok(Some((key, _value))) => match &mut range {
                Some((min, max)) => {
                    if key < *min {
                        *min = key;
                    } else if key > *max {
                        *max = key;
                    }
                }
                None => range = Some((key.clone(), key)),
            },
            Ok(None) => break,
            Err(TableError::Format(msg)) => {
                warn!("malformed record in {:?}: {}", path.file_name(), msg);
                break;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(range)
}

/// Linear scan of one file for `key`. A malformed record ends the scan;
/// the file counts as holding only the records read before it.
fn scan_for_key(path: &Path, key: &[u8]) -> Result<Option<Vec<u8>>, TableError> {
    let mut rdr = BufReader::new(File::open(path)?);

    loop {
        match read_record(&mut rdr) {
            Ok(Some((record_key, value))) => {
                if record_key == key {
                    return Ok(Some(value));
                }
            }
            Ok(None) => return Ok(None),
            Err(TableError::Format(msg)) => {
                warn!("malformed record in {:?}: {}", path.file_name(), msg);
                return Ok(None);
            }
            Err(e) => return Err(e),
        }
    }
}
