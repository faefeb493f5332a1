use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;

use tempfile::tempdir;

use super::seed_table;
use crate::{file_name, next_file_number, parse_file_number, read_record, SstWriter, TableError};

// -------------------- File naming --------------------

#[test]
fn file_names_are_zero_padded() {
    assert_eq!(file_name(1), "00000001.sst");
    assert_eq!(file_name(42), "00000042.sst");
    assert_eq!(file_name(99_999_999), "99999999.sst");
    // Numbers that outgrow eight digits keep their full width.
    assert_eq!(file_name(100_000_000), "100000000.sst");
}

#[test]
fn parse_file_number_roundtrip() {
    assert_eq!(parse_file_number("00000007.sst").unwrap(), 7);
    assert_eq!(parse_file_number(&file_name(123)).unwrap(), 123);
}

#[test]
fn parse_rejects_corrupt_names() {
    assert!(matches!(
        parse_file_number("notanumber.sst"),
        Err(TableError::CorruptName(_))
    ));
    assert!(matches!(
        parse_file_number("0000a001.sst"),
        Err(TableError::CorruptName(_))
    ));
    assert!(matches!(
        parse_file_number(".sst"),
        Err(TableError::CorruptName(_))
    ));
    assert!(matches!(
        parse_file_number("00000001.dat"),
        Err(TableError::CorruptName(_))
    ));
}

// -------------------- Writing --------------------

#[test]
fn write_produces_records_in_key_order() {
    let dir = tempdir().unwrap();
    seed_table(
        dir.path(),
        1,
        &[("banana", "yellow"), ("apple", "red"), ("cherry", "dark")],
    );

    let raw = fs::read(dir.path().join("00000001.sst")).unwrap();
    let mut cursor = Cursor::new(raw);

    let mut keys = Vec::new();
    while let Some((key, _value)) = read_record(&mut cursor).unwrap() {
        keys.push(key);
    }
    assert_eq!(
        keys,
        vec![b"apple".to_vec(), b"banana".to_vec(), b"cherry".to_vec()]
    );
}

#[test]
fn write_roundtrips_binary_values() {
    let dir = tempdir().unwrap();
    let mut sorted = BTreeMap::new();
    let key = vec![0x00u8, 0xFF];
    let val = vec![0xDEu8, 0xAD, 0x00, 0xEF];
    sorted.insert(key.clone(), val.clone());
    sorted.insert(b"empty".to_vec(), Vec::new());

    let path = SstWriter::new(dir.path()).write(&sorted, 3).unwrap();

    let mut cursor = Cursor::new(fs::read(path).unwrap());
    let first = read_record(&mut cursor).unwrap().unwrap();
    assert_eq!(first, (key, val));
    let second = read_record(&mut cursor).unwrap().unwrap();
    assert_eq!(second, (b"empty".to_vec(), Vec::new()));
    assert!(read_record(&mut cursor).unwrap().is_none());
}

#[test]
fn write_leaves_no_tmp_file_behind() {
    let dir = tempdir().unwrap();
    seed_table(dir.path(), 1, &[("k", "v")]);

    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().to_string_lossy().ends_with(".sst.tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

// -------------------- Record decoding --------------------

#[test]
fn read_record_clean_eof() {
    let mut cursor = Cursor::new(Vec::new());
    assert!(read_record(&mut cursor).unwrap().is_none());
}

#[test]
fn read_record_truncated_frame_is_format_error() {
    // key_len says 4 bytes but only 2 follow.
    let mut raw = 4u32.to_le_bytes().to_vec();
    raw.extend_from_slice(b"ab");
    let mut cursor = Cursor::new(raw);

    assert!(matches!(
        read_record(&mut cursor),
        Err(TableError::Format(_))
    ));
}

#[test]
fn read_record_implausible_length_is_format_error() {
    let mut cursor = Cursor::new(u32::MAX.to_le_bytes().to_vec());
    assert!(matches!(
        read_record(&mut cursor),
        Err(TableError::Format(_))
    ));
}

// -------------------- Numbering --------------------

#[test]
fn next_file_number_starts_at_one() {
    let dir = tempdir().unwrap();
    assert_eq!(next_file_number(dir.path()).unwrap(), 1);
}

#[test]
fn next_file_number_is_max_plus_one() {
    let dir = tempdir().unwrap();
    seed_table(dir.path(), 3, &[("a", "1")]);
    seed_table(dir.path(), 7, &[("b", "2")]);

    assert_eq!(next_file_number(dir.path()).unwrap(), 8);
}

#[test]
fn next_file_number_ignores_corrupt_names() {
    let dir = tempdir().unwrap();
    seed_table(dir.path(), 2, &[("a", "1")]);
    fs::write(dir.path().join("garbage.sst"), b"junk").unwrap();
    fs::write(dir.path().join("readme.txt"), b"not a table").unwrap();

    assert_eq!(next_file_number(dir.path()).unwrap(), 3);
}
