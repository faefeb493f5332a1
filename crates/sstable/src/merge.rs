//! Multi-way merge over SSTable files, the core primitive for compaction.
//!
//! Each input yields records in on-disk (ascending key) order and carries a
//! `file_age` equal to its position in the oldest→newest input list. A
//! min-heap orders pending records by `(key ascending, file_age ascending)`,
//! so for a duplicated key the oldest occurrence is popped first and newer
//! occurrences overwrite it in the output map.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use memtable::is_tombstone;
use tracing::warn;

use crate::format::read_record;
use crate::TableError;

/// One pending record in the merge heap.
struct HeapEntry {
    key: Vec<u8>,
    value: Vec<u8>,
    /// Index into the input list; lower = older file.
    age: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.age == other.age
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse both fields so the smallest key
        // pops first and, for equal keys, the oldest file pops first.
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.age.cmp(&self.age))
    }
}

/// Sequential record source over one input file.
struct TableIter {
    path: PathBuf,
    rdr: BufReader<File>,
}

impl TableIter {
    fn open(path: &Path) -> Result<Self, TableError> {
        Ok(Self {
            path: path.to_path_buf(),
            rdr: BufReader::new(File::open(path)?),
        })
    }

    /// Next record, or `None` when the file is exhausted. A malformed
    /// record ends this file's contribution; I/O errors abort the merge so
    /// a partial result can never replace its inputs.
    fn next_record(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>, TableError> {
        match read_record(&mut self.rdr) {
            Ok(opt) => Ok(opt),
            Err(TableError::Format(msg)) => {
                warn!("malformed record in {:?}: {}", self.path.file_name(), msg);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Merges `inputs` (ordered oldest→newest) into one ascending map.
///
/// For a key appearing in several inputs the newest occurrence wins. When a
/// key's newest occurrence is the tombstone sentinel, the key is removed
/// from the output only if `drop_tombstones` — the compactor sets that only
/// when the oldest live table is among the inputs, otherwise the tombstone
/// must survive to keep shadowing values in older, non-input files.
pub fn merge_tables(
    inputs: &[PathBuf],
    drop_tombstones: bool,
) -> Result<BTreeMap<Vec<u8>, Vec<u8>>, TableError> {
    let mut merged = BTreeMap::new();
    let mut iters = Vec::with_capacity(inputs.len());
    let mut heap = BinaryHeap::new();

    for (age, path) in inputs.iter().enumerate() {
        let mut iter = TableIter::open(path)?;
        if let Some((key, value)) = iter.next_record()? {
            heap.push(HeapEntry { key, value, age });
        }
        iters.push(iter);
    }

    while let Some(HeapEntry { key, value, age }) = heap.pop() {
        let tomb = is_tombstone(&value);
        merged.insert(key.clone(), value);
        if tomb && drop_tombstones {
            merged.remove(&key);
        }

        if let Some((key, value)) = iters[age].next_record()? {
            heap.push(HeapEntry { key, value, age });
        }
    }

    Ok(merged)
}
