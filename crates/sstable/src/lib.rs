//! # SSTable — Sorted String Table
//!
//! Immutable, on-disk storage files for the SiltKV storage engine.
//!
//! When the in-memory [`memtable::MemTable`] crosses its flush threshold the
//! flusher persists it as an SSTable. SSTables are *write-once, read-many* —
//! once published they are never modified, only replaced during compaction.
//!
//! ## File layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ records, ascending key order                                 │
//! │                                                              │
//! │ key_len (u32 LE) | key | value_len (u32 LE) | value          │
//! │                                                              │
//! │ ... repeated for each entry ...                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! No header, footer, index, or checksum. A file's `min_key`/`max_key` are
//! derived by a single scan when the reader opens it and cached as metadata.
//!
//! ## Naming
//!
//! `<data_dir>/<NNNNNNNN>.sst` — the file number as zero-padded 8-digit
//! decimal. Numbers are `u64` and strictly increase over the store's
//! lifetime; a higher number means a newer file, and the newest occurrence
//! of a key wins.

mod format;
mod merge;
mod reader;
mod writer;

use std::io;

use thiserror::Error;

pub use format::{encode_record, file_name, parse_file_number, read_record, SST_EXT};
pub use merge::merge_tables;
pub use reader::{SstReader, TableMeta};
pub use writer::{next_file_number, SstWriter};

/// Errors from SSTable operations.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("sstable io error: {0}")]
    Io(#[from] io::Error),

    /// A record that could not be decoded (truncated frame or an
    /// implausible length). Scans stop at the first malformed record and
    /// keep whatever decoded before it.
    #[error("malformed sstable record: {0}")]
    Format(String),

    /// An `.sst` file whose stem is not a decimal file number. Such files
    /// are ignored for numbering and excluded from reader metadata.
    #[error("not an sstable file name: {0}")]
    CorruptName(String),
}

#[cfg(test)]
mod tests;
