//! Small binary-parsing helpers shared across record parsers.
//!
//! These are deliberately offset-agnostic: they return `None` on a
//! short read rather than an error, because only the caller knows enough
//! about the record being parsed to turn "not enough bytes" into a
//! meaningful [`crate::error::RegistryError::CorruptedRecord`] or
//! [`crate::error::RegistryError::CorruptedCell`].

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Hive offset where the first hive bin begins, i.e. the size of the base block.
pub const HBIN_START_OFFSET: u32 = 0x1000;

/// Reads a little-endian `u32` at `offset`, or `None` if out of bounds.
pub fn read_u32_le(data: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    let mut cursor = Cursor::new(data.get(offset..end)?);
    cursor.read_u32::<LittleEndian>().ok()
}

/// Reads a little-endian `u16` at `offset`, or `None` if out of bounds.
pub fn read_u16_le(data: &[u8], offset: usize) -> Option<u16> {
    let end = offset.checked_add(2)?;
    let mut cursor = Cursor::new(data.get(offset..end)?);
    cursor.read_u16::<LittleEndian>().ok()
}

/// Reads a little-endian `i32` at `offset`, or `None` if out of bounds.
pub fn read_i32_le(data: &[u8], offset: usize) -> Option<i32> {
    let end = offset.checked_add(4)?;
    let mut cursor = Cursor::new(data.get(offset..end)?);
    cursor.read_i32::<LittleEndian>().ok()
}

/// Reads a little-endian `u64` at `offset`, or `None` if out of bounds.
pub fn read_u64_le(data: &[u8], offset: usize) -> Option<u64> {
    let end = offset.checked_add(8)?;
    let mut cursor = Cursor::new(data.get(offset..end)?);
    cursor.read_u64::<LittleEndian>().ok()
}

/// Converts a hive-relative cell offset to an absolute file offset.
///
/// Hive offsets are relative to the first hive bin, which starts right
/// after the 4096-byte base block.
#[inline]
pub fn cell_offset_to_absolute(hive_offset: u32) -> Option<u64> {
    u64::from(hive_offset).checked_add(u64::from(HBIN_START_OFFSET))
}

/// Size of the unidentified field hives with minor version 0 or 1 prepend
/// to every `nk` and `vk` record, ahead of the record's own signature.
/// Versions 2 and up dropped it.
#[inline]
pub fn legacy_prefix_len(minor_version: u32) -> usize {
    if minor_version <= 1 {
        4
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_in_bounds_fields() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        assert_eq!(read_u32_le(&data, 0), Some(0x0403_0201));
        assert_eq!(read_u16_le(&data, 4), Some(0x0605));
        assert_eq!(read_i32_le(&data, 0), Some(0x0403_0201));
        assert_eq!(read_u64_le(&data, 0), Some(0x0807_0605_0403_0201));
    }

    #[test]
    fn returns_none_past_end() {
        let data = [0x01, 0x02];
        assert_eq!(read_u32_le(&data, 0), None);
        assert_eq!(read_u16_le(&data, 1), None);
    }

    #[test]
    fn cell_offset_to_absolute_adds_base_block_size() {
        assert_eq!(cell_offset_to_absolute(0), Some(0x1000));
        assert_eq!(cell_offset_to_absolute(0x20), Some(0x1020));
    }
}
