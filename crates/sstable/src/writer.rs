use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::format::{encode_record, file_name, parse_file_number};
use crate::TableError;

/// Serializes sorted key→value mappings into numbered SSTable files.
pub struct SstWriter {
    data_dir: PathBuf,
}

impl SstWriter {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Writes `sorted` to `<data_dir>/<NNNNNNNN>.sst` and returns the
    /// published path.
    ///
    /// The records land in a `.sst.tmp` sibling first, are flushed and
    /// fsynced, and the file is renamed into place, so a published `.sst`
    /// is always complete — partial outputs only ever exist under the
    /// `.sst.tmp` name and are discarded at store open.
    pub fn write(
        &self,
        sorted: &BTreeMap<Vec<u8>, Vec<u8>>,
        file_number: u64,
    ) -> Result<PathBuf, TableError> {
        let path = self.data_dir.join(file_name(file_number));
        let tmp_path = path.with_extension("sst.tmp");

        let result = self.write_records(&tmp_path, sorted);
        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
            result?;
        }

        fs::rename(&tmp_path, &path)?;
        debug!(
            "published sstable {:?} ({} records)",
            path.file_name(),
            sorted.len()
        );
        Ok(path)
    }

    fn write_records(
        &self,
        tmp_path: &Path,
        sorted: &BTreeMap<Vec<u8>, Vec<u8>>,
    ) -> Result<(), TableError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(tmp_path)?;
        let mut out = BufWriter::new(file);

        for (key, value) in sorted {
            encode_record(&mut out, key, value)?;
        }

        out.flush()?;
        out.into_inner()
            .map_err(|e| TableError::Io(e.into_error()))?
            .sync_all()?;
        Ok(())
    }
}

/// Allocates the next SSTable file number: one past the highest number
/// currently in `data_dir`, or `1` for an empty directory.
///
/// Callers hold the SSTable exclusive lock; the result is never cached
/// across lock releases. Files with non-numeric stems are ignored.
pub fn next_file_number(data_dir: &Path) -> Result<u64, TableError> {
    let mut max = 0u64;
    for entry in fs::read_dir(data_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().map(|e| e == "sst").unwrap_or(false) {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if let Ok(n) = parse_file_number(name) {
                    max = max.max(n);
                }
            }
        }
    }
    Ok(max + 1)
}
