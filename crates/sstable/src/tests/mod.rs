mod writer_tests;

use std::collections::BTreeMap;
use std::path::Path;

use crate::SstWriter;

/// Writes an SSTable with `file_number` from `(key, value)` string pairs.
pub fn seed_table(dir: &Path, file_number: u64, pairs: &[(&str, &str)]) {
    let mut sorted = BTreeMap::new();
    for (k, v) in pairs {
        sorted.insert(k.as_bytes().to_vec(), v.as_bytes().to_vec());
    }
    SstWriter::new(dir).write(&sorted, file_number).unwrap();
}
