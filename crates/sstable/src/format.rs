use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::TableError;

/// SSTable file extension (without the dot).
pub const SST_EXT: &str = "sst";

/// Maximum key size accepted during reads (64 KiB). Prevents OOM on a
/// corrupt length prefix.
const MAX_KEY_BYTES: usize = 64 * 1024;
/// Maximum value size accepted during reads (10 MiB).
const MAX_VALUE_BYTES: usize = 10 * 1024 * 1024;

/// Formats a file number as a zero-padded 8-digit `.sst` name.
/// Numbers above 99 999 999 simply take more digits.
pub fn file_name(file_number: u64) -> String {
    format!("{:08}.{}", file_number, SST_EXT)
}

/// Parses an `.sst` file name back into its number.
///
/// Returns [`TableError::CorruptName`] unless the name is `<digits>.sst`
/// with a stem that fits in a `u64`.
pub fn parse_file_number(name: &str) -> Result<u64, TableError> {
    let stem = name
        .strip_suffix(".sst")
        .ok_or_else(|| TableError::CorruptName(name.to_string()))?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TableError::CorruptName(name.to_string()));
    }
    stem.parse::<u64>()
        .map_err(|_| TableError::CorruptName(name.to_string()))
}

/// Writes one `key_len | key | value_len | value` record.
pub fn encode_record<W: Write>(w: &mut W, key: &[u8], value: &[u8]) -> io::Result<()> {
    w.write_u32::<LittleEndian>(key.len() as u32)?;
    w.write_all(key)?;
    w.write_u32::<LittleEndian>(value.len() as u32)?;
    w.write_all(value)?;
    Ok(())
}

/// Reads the next record.
///
/// Returns `Ok(None)` on a clean end of file (no bytes before the next
/// record), `Err(Format)` on a truncated frame or an implausible length.
pub fn read_record<R: Read>(r: &mut R) -> Result<Option<(Vec<u8>, Vec<u8>)>, TableError> {
    let key_len = match r.read_u32::<LittleEndian>() {
        Ok(n) => n as usize,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if key_len > MAX_KEY_BYTES {
        return Err(TableError::Format(format!(
            "key_len {} exceeds maximum {}",
            key_len, MAX_KEY_BYTES
        )));
    }
    let mut key = vec![0u8; key_len];
    read_body(r, &mut key)?;

    let value_len = match r.read_u32::<LittleEndian>() {
        Ok(n) => n as usize,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(TableError::Format("record truncated after key".into()))
        }
        Err(e) => return Err(e.into()),
    };
    if value_len > MAX_VALUE_BYTES {
        return Err(TableError::Format(format!(
            "value_len {} exceeds maximum {}",
            value_len, MAX_VALUE_BYTES
        )));
    }
    let mut value = vec![0u8; value_len];
    read_body(r, &mut value)?;

    Ok(Some((key, value)))
}

fn read_body<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<(), TableError> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            TableError::Format("record truncated mid-field".into())
        } else {
            TableError::Io(e)
        }
    })
}
