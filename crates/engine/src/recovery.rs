//! Cold-start recovery: WAL replay, retired-log consolidation, and cleanup
//! of partial SSTable outputs.

use std::path::Path;

use memtable::MemTable;
use tracing::{info, warn};
use wal::Wal;

use crate::Result;

/// Replays the WAL into `mem`, retired log first. Returns `true` if a
/// retired log was present, meaning a flush never finished and the caller
/// must consolidate.
pub(crate) fn replay_wal(data_dir: &Path, mem: &mut MemTable) -> Result<bool> {
    let had_retired = Wal::has_retired(data_dir);
    if had_retired {
        warn!("found retired wal: an earlier flush did not complete");
    }

    Wal::replay(data_dir, |key, value| mem.put(key, value))?;
    Ok(had_retired)
}

/// Rewrites `wal.log` to cover exactly the rebuilt memtable (tombstones
/// included) and deletes the retired log. Afterwards a single log covers
/// the active table again and the next rotation cannot clobber anything.
pub(crate) fn consolidate_wal(wal: &Wal, mem: &MemTable) -> Result<()> {
    let snapshot = mem.snapshot();
    wal.rewrite(snapshot.iter().map(|(k, v)| (k.as_slice(), v.as_slice())))?;
    wal.remove_retired()?;
    info!("consolidated retired wal ({} entries)", snapshot.len());
    Ok(())
}

/// Removes leftover `.sst.tmp` files from publishes interrupted by a crash.
/// Published `.sst` files are always complete (temp + rename), so partial
/// outputs only ever carry this suffix.
pub(crate) fn remove_orphan_tmp_files(data_dir: &Path) {
    let Ok(entries) = std::fs::read_dir(data_dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let is_tmp = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with(".sst.tmp"))
            .unwrap_or(false);
        if is_tmp {
            warn!("removing orphan partial sstable {:?}", path.file_name());
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("failed to remove orphan {:?}: {}", path.file_name(), e);
            }
        }
    }
}
