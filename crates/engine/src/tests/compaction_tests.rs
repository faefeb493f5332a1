use std::io::Read;
use std::time::Duration;

use anyhow::Result;
use tempfile::tempdir;

use super::helpers::{count_sst_files, open_store, seed_table, tomb, wait_until};
use crate::{Compactor, StoreError};

// -------------------- Merging --------------------

#[test]
fn compaction_reduces_file_count_and_preserves_reads() -> Result<()> {
    let dir = tempdir()?;
    seed_table(
        dir.path(),
        1,
        &[("apple", "red_v1"), ("banana", "yellow_v1"), ("cherry", "red_v1")],
    );
    seed_table(
        dir.path(),
        2,
        &[("banana", "yellow_v2"), ("cherry", "red_v2"), ("date", "brown_v2")],
    );
    seed_table(
        dir.path(),
        3,
        &[("date", "brown_v3"), ("elderberry", "purple_v3"), ("fig", "purple_v3")],
    );
    seed_table(dir.path(), 4, &[("grape", "green_v4"), ("cherry", tomb())]);

    let store = open_store(dir.path());
    let compactor = Compactor::new(dir.path(), 3, 2, store.lock_manager());
    compactor.set_store(&store);
    compactor.start()?;

    // Steady state: rounds run until fewer tables remain than the trigger.
    assert!(
        wait_until(Duration::from_secs(10), || count_sst_files(dir.path()) < 3),
        "compactor did not reach steady state"
    );
    compactor.stop()?;
    assert!(count_sst_files(dir.path()) < 4);

    assert_eq!(store.get(b"apple")?, Some(b"red_v1".to_vec()));
    assert_eq!(store.get(b"banana")?, Some(b"yellow_v2".to_vec()));
    assert_eq!(store.get(b"date")?, Some(b"brown_v3".to_vec()));
    assert_eq!(store.get(b"grape")?, Some(b"green_v4".to_vec()));
    assert_eq!(store.get(b"elderberry")?, Some(b"purple_v3".to_vec()));
    assert_eq!(store.get(b"fig")?, Some(b"purple_v3".to_vec()));
    Ok(())
}

#[test]
fn full_merge_drops_tombstoned_keys() -> Result<()> {
    let dir = tempdir()?;
    seed_table(dir.path(), 1, &[("alive", "keep"), ("dead", "value")]);
    seed_table(dir.path(), 2, &[("dead", tomb())]);

    let store = open_store(dir.path());
    let compactor = Compactor::new(dir.path(), 2, 2, store.lock_manager());
    compactor.set_store(&store);
    compactor.start()?;

    assert!(wait_until(Duration::from_secs(10), || {
        count_sst_files(dir.path()) == 1
    }));
    compactor.stop()?;

    assert_eq!(store.get(b"alive")?, Some(b"keep".to_vec()));
    assert!(store.get(b"dead")?.is_none());

    // The merged file must not carry the key at all: both inputs were in
    // the round, so the tombstone was dropped rather than rewritten.
    let sst_path = std::fs::read_dir(dir.path())?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .find(|p| p.extension().map(|e| e == "sst").unwrap_or(false))
        .expect("one merged sstable");
    let mut raw = Vec::new();
    std::fs::File::open(&sst_path)?.read_to_end(&mut raw)?;
    let mut cursor = std::io::Cursor::new(raw);
    let mut keys = Vec::new();
    while let Some((key, _)) = sstable::read_record(&mut cursor)? {
        keys.push(key);
    }
    assert_eq!(keys, vec![b"alive".to_vec()]);
    Ok(())
}

#[test]
fn compacted_output_number_exceeds_inputs() -> Result<()> {
    let dir = tempdir()?;
    seed_table(dir.path(), 3, &[("a", "1")]);
    seed_table(dir.path(), 5, &[("b", "2")]);
    seed_table(dir.path(), 9, &[("c", "3")]);

    let store = open_store(dir.path());
    let compactor = Compactor::new(dir.path(), 2, 3, store.lock_manager());
    compactor.set_store(&store);
    compactor.start()?;

    assert!(wait_until(Duration::from_secs(10), || {
        count_sst_files(dir.path()) == 1
    }));
    compactor.stop()?;

    // max existing number + 1.
    assert!(dir.path().join("00000010.sst").exists());
    assert_eq!(store.get(b"a")?, Some(b"1".to_vec()));
    assert_eq!(store.get(b"b")?, Some(b"2".to_vec()));
    assert_eq!(store.get(b"c")?, Some(b"3".to_vec()));
    Ok(())
}

#[test]
fn all_tombstones_leave_no_output() -> Result<()> {
    let dir = tempdir()?;
    seed_table(dir.path(), 1, &[("a", "1")]);
    seed_table(dir.path(), 2, &[("a", tomb())]);

    let store = open_store(dir.path());
    let compactor = Compactor::new(dir.path(), 2, 2, store.lock_manager());
    compactor.set_store(&store);
    compactor.start()?;

    assert!(wait_until(Duration::from_secs(10), || {
        count_sst_files(dir.path()) == 0
    }));
    compactor.stop()?;

    assert!(store.get(b"a")?.is_none());
    Ok(())
}

// -------------------- Trigger threshold --------------------

#[test]
fn below_trigger_nothing_happens() -> Result<()> {
    let dir = tempdir()?;
    seed_table(dir.path(), 1, &[("a", "1")]);
    seed_table(dir.path(), 2, &[("b", "2")]);

    let store = open_store(dir.path());
    let compactor = Compactor::new(dir.path(), 3, 2, store.lock_manager());
    compactor.set_store(&store);
    compactor.start()?;

    std::thread::sleep(Duration::from_millis(400));
    compactor.stop()?;

    assert_eq!(count_sst_files(dir.path()), 2);
    Ok(())
}

// -------------------- Actor state --------------------

#[test]
fn compactor_start_stop_state_errors() -> Result<()> {
    let dir = tempdir()?;
    let store = open_store(dir.path());
    let compactor = Compactor::new(dir.path(), 4, 2, store.lock_manager());

    assert!(matches!(compactor.stop(), Err(StoreError::NotRunning(_))));
    compactor.start()?;
    assert!(matches!(
        compactor.start(),
        Err(StoreError::AlreadyRunning(_))
    ));
    compactor.stop()?;
    assert!(matches!(compactor.stop(), Err(StoreError::NotRunning(_))));
    Ok(())
}

// -------------------- Compaction + restart --------------------

#[test]
fn reads_are_stable_across_compaction_and_restart() -> Result<()> {
    let dir = tempdir()?;
    seed_table(dir.path(), 1, &[("k1", "v1"), ("k2", "old")]);
    seed_table(dir.path(), 2, &[("k2", "new"), ("k3", "v3")]);
    seed_table(dir.path(), 3, &[("k4", "v4")]);

    {
        let store = open_store(dir.path());
        let compactor = Compactor::new(dir.path(), 2, 3, store.lock_manager());
        compactor.set_store(&store);
        compactor.start()?;
        assert!(wait_until(Duration::from_secs(10), || {
            count_sst_files(dir.path()) == 1
        }));
        compactor.stop()?;
    }

    let store = open_store(dir.path());
    assert_eq!(store.get(b"k1")?, Some(b"v1".to_vec()));
    assert_eq!(store.get(b"k2")?, Some(b"new".to_vec()));
    assert_eq!(store.get(b"k3")?, Some(b"v3".to_vec()));
    assert_eq!(store.get(b"k4")?, Some(b"v4".to_vec()));
    Ok(())
}
