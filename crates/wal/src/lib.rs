//! # WAL — Write-Ahead Log
//!
//! Crash-safe durability for the SiltKV storage engine.
//!
//! Every mutation is appended to the WAL **before** the corresponding
//! in-memory update becomes visible. On restart the WAL is replayed to
//! reconstruct the memtable, guaranteeing that no acknowledged write is lost.
//!
//! ## Record format
//!
//! One record per line:
//!
//! ```text
//! <escaped key> SP <escaped value> LF
//! ```
//!
//! Keys and values are byte-escaped (see [`escape`]) so arbitrary byte
//! strings survive the text framing; values containing neither spaces nor
//! newlines are written byte-identical to the plain layout. Replay splits
//! each line on the first space and skips lines that do not yield two
//! non-empty, well-formed tokens.
//!
//! ## Lifecycle
//!
//! The log covers the currently active memtable. When the flusher freezes
//! the memtable it calls [`Wal::rotate`] under the active-table mutex, so
//! `wal.old` covers exactly the frozen table and a fresh `wal.log` covers
//! the new active one. After the frozen table is durably published as an
//! SSTable the flusher calls [`Wal::remove_retired`]. A `wal.old` still
//! present at open time means a flush never completed; both files are then
//! replayed in order (old first) and consolidated.

mod escape;

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

pub use escape::{escape, unescape};

/// Name of the active log within the data directory.
pub const WAL_FILE: &str = "wal.log";

/// Name the active log is rotated to when its memtable is frozen.
pub const RETIRED_WAL_FILE: &str = "wal.old";

/// Errors from WAL operations. Malformed lines are not errors — replay
/// skips them, matching the store's tolerance for a torn final record.
#[derive(Debug, Error)]
pub enum WalError {
    #[error("wal io error: {0}")]
    Io(#[from] io::Error),
}

/// Append-only WAL writer bound to `<data_dir>/wal.log`.
///
/// Appends are serialized by an internal mutex, so concurrent writers
/// observe a total order identical to record arrival. Every append is
/// flushed to the OS before returning; with `sync` set it is also fsynced.
pub struct Wal {
    path: PathBuf,
    retired_path: PathBuf,
    file: Mutex<File>,
    sync: bool,
}

impl Wal {
    /// Opens (or creates) the log in append mode. Failure here must fail
    /// store construction.
    pub fn open(data_dir: &Path, sync: bool) -> Result<Self, WalError> {
        let path = data_dir.join(WAL_FILE);
        let file = Self::open_append(&path)?;
        Ok(Self {
            path,
            retired_path: data_dir.join(RETIRED_WAL_FILE),
            file: Mutex::new(file),
            sync,
        })
    }

    fn open_append(path: &Path) -> io::Result<File> {
        OpenOptions::new().create(true).append(true).open(path)
    }

    /// Appends one `key SP value LF` record and flushes it to the OS.
    pub fn append(&self, key: &[u8], value: &[u8]) -> Result<(), WalError> {
        let mut line = escape(key);
        line.push(b' ');
        line.extend_from_slice(&escape(value));
        line.push(b'\n');

        let mut file = self.file.lock();
        file.write_all(&line)?;
        file.flush()?;
        if self.sync {
            file.sync_all()?;
        }
        Ok(())
    }

    /// Renames `wal.log` to `wal.old` and starts a fresh `wal.log`.
    ///
    /// The caller must hold the active-table mutex so no append can land
    /// between the rename and the memtable swap.
    pub fn rotate(&self) -> Result<(), WalError> {
        let mut file = self.file.lock();
        file.sync_all()?;
        std::fs::rename(&self.path, &self.retired_path)?;
        *file = Self::open_append(&self.path)?;
        Ok(())
    }

    /// Deletes the retired log. Called after the flushed SSTable is durably
    /// published; a no-op when no retired log exists.
    pub fn remove_retired(&self) -> Result<(), WalError> {
        match std::fs::remove_file(&self.retired_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Atomically replaces the active log's contents with `entries`.
    ///
    /// Used during recovery to consolidate a leftover `wal.old` with the
    /// current log into a single file covering the rebuilt memtable.
    pub fn rewrite<'a, I>(&self, entries: I) -> Result<(), WalError>
    where
        I: IntoIterator<Item = (&'a [u8], &'a [u8])>,
    {
        let mut file = self.file.lock();
        let mut fresh = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        for (key, value) in entries {
            let mut line = escape(key);
            line.push(b' ');
            line.extend_from_slice(&escape(value));
            line.push(b'\n');
            fresh.write_all(&line)?;
        }
        fresh.flush()?;
        fresh.sync_all()?;
        *file = Self::open_append(&self.path)?;
        Ok(())
    }

    /// Returns `true` if a retired log is present in `data_dir`.
    pub fn has_retired(data_dir: &Path) -> bool {
        data_dir.join(RETIRED_WAL_FILE).exists()
    }

    /// Replays `wal.old` (if present) and then `wal.log`, in order, calling
    /// `apply` for each well-formed record. Missing files are fine; lines
    /// that do not parse are skipped.
    pub fn replay<F>(data_dir: &Path, mut apply: F) -> Result<(), WalError>
    where
        F: FnMut(Vec<u8>, Vec<u8>),
    {
        for name in [RETIRED_WAL_FILE, WAL_FILE] {
            let path = data_dir.join(name);
            if path.exists() {
                replay_file(&path, &mut apply)?;
            }
        }
        Ok(())
    }
}

fn replay_file<F>(path: &Path, apply: &mut F) -> Result<(), WalError>
where
    F: FnMut(Vec<u8>, Vec<u8>),
{
    let reader = BufReader::new(File::open(path)?);
    for line in reader.split(b'\n') {
        let line = line?;
        match parse_line(&line) {
            Some((key, value)) => apply(key, value),
            None => {
                if !line.is_empty() {
                    debug!("skipping malformed wal line ({} bytes)", line.len());
                }
            }
        }
    }
    Ok(())
}

/// Splits a line on the first space and unescapes both tokens. Returns
/// `None` unless the line yields two non-empty, well-formed tokens.
fn parse_line(line: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
    let sep = line.iter().position(|&b| b == b' ')?;
    let (raw_key, raw_value) = (&line[..sep], &line[sep + 1..]);
    if raw_key.is_empty() || raw_value.is_empty() {
        return None;
    }
    Some((unescape(raw_key)?, unescape(raw_value)?))
}
