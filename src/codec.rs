//! Record codec
//!
//! Encoding and decoding for the store's on-disk records.
//!
//! ## Record Format
//!
//! ```text
//! ┌──────────────────┬─────┬────────────────────┬───────┐
//! │ Key Len (varint) │ Key │ Value Len (varint) │ Value │
//! └──────────────────┴─────┴────────────────────┴───────┘
//! ```
//!
//! Records are concatenated back to back with no padding, header,
//! footer, or checksum. Lengths use unsigned LEB128 varints: seven
//! value bits per byte, high bit set on every byte except the last.

use crate::error::{FlatError, Result};

/// Maximum encoded length of a u64 varint
pub const MAX_UVARINT_LEN: usize = 10;

// =============================================================================
// Varint Encoding/Decoding
// =============================================================================

/// Number of bytes `put_uvarint` would append for `x`
pub fn uvarint_len(mut x: u64) -> usize {
    let mut n = 1;
    while x >= 0x80 {
        x >>= 7;
        n += 1;
    }
    n
}

/// Append `x` to `buf` as an unsigned varint, returning the bytes written
pub fn put_uvarint(buf: &mut Vec<u8>, mut x: u64) -> usize {
    let mut n = 0;
    while x >= 0x80 {
        buf.push(x as u8 | 0x80);
        x >>= 7;
        n += 1;
    }
    buf.push(x as u8);
    n + 1
}

/// Decode an unsigned varint from the front of `buf`
///
/// Returns the value and the number of bytes consumed, or `None` if the
/// buffer ends mid-varint or the encoding overflows 64 bits.
pub fn read_uvarint(buf: &[u8]) -> Option<(u64, usize)> {
    let mut x: u64 = 0;
    let mut shift: u32 = 0;
    for (i, &b) in buf.iter().enumerate() {
        if i == MAX_UVARINT_LEN {
            return None;
        }
        if b < 0x80 {
            // The tenth byte may only carry the final value bit
            if i == MAX_UVARINT_LEN - 1 && b > 1 {
                return None;
            }
            return Some((x | (u64::from(b) << shift), i + 1));
        }
        x |= u64::from(b & 0x7f) << shift;
        shift += 7;
    }
    None
}

// =============================================================================
// Record Encoding/Decoding
// =============================================================================

/// Exact encoded size of one record
pub fn record_len(key: &[u8], value: &[u8]) -> usize {
    uvarint_len(key.len() as u64) + key.len() + uvarint_len(value.len() as u64) + value.len()
}

/// Append one encoded record to `buf`, returning the bytes appended
pub fn put_record(buf: &mut Vec<u8>, key: &[u8], value: &[u8]) -> usize {
    let before = buf.len();
    put_uvarint(buf, key.len() as u64);
    buf.extend_from_slice(key);
    put_uvarint(buf, value.len() as u64);
    buf.extend_from_slice(value);
    buf.len() - before
}

/// Decode one record from the front of `buf`
///
/// Returns the key and value slices plus the total bytes consumed.
/// Fails with `ReadFailure` on a malformed length prefix or a body
/// shorter than its declared length.
pub fn read_record(buf: &[u8]) -> Result<(&[u8], &[u8], usize)> {
    let (key_len, mut pos) = read_uvarint(buf)
        .ok_or_else(|| FlatError::ReadFailure("malformed key length".to_string()))?;
    if ((buf.len() - pos) as u64) < key_len {
        return Err(FlatError::ReadFailure("truncated key".to_string()));
    }
    let key = &buf[pos..pos + key_len as usize];
    pos += key_len as usize;

    let (val_len, n) = read_uvarint(&buf[pos..])
        .ok_or_else(|| FlatError::ReadFailure("malformed value length".to_string()))?;
    pos += n;
    if ((buf.len() - pos) as u64) < val_len {
        return Err(FlatError::ReadFailure("truncated value".to_string()));
    }
    let value = &buf[pos..pos + val_len as usize];
    pos += val_len as usize;

    Ok((key, value, pos))
}
