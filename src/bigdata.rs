//! Layer D — the big-data (`db`) record.
//!
//! Values whose data exceeds the big-data threshold (16,344 bytes, spec
//! §4.5) are stored as a chain of segments: a `db` cell naming a segment
//! list cell, which in turn holds the hive offsets of each data segment.
//! This module parses only the `db` header and its segment-offset list;
//! concatenating the segments into a contiguous byte buffer is layer F's
//! job ([`crate::data`]), since it needs the cell allocator to resolve
//! each segment offset.

use crate::error::{RegistryError, Result};
use crate::utils::{read_u16_le, read_u32_le};

/// Values at or above this size are stored as segmented big-data rather
/// than in a single external cell.
pub const BIG_DATA_THRESHOLD: u32 = 16_344;

const MIN_SIZE: usize = 8;

/// A parsed `db` record: how many segments the value's data is split into,
/// and where to find the list of their offsets.
#[derive(Debug, Clone)]
pub struct BigDataBlock {
    pub segment_count: u16,
    pub segment_list_offset: u32,
}

impl BigDataBlock {
    /// Parses a `db` record from cell payload bytes.
    pub fn parse(data: &[u8], offset: u32) -> Result<Self> {
        if data.len() < MIN_SIZE {
            return Err(RegistryError::corrupted_record(
                offset,
                format!("db record truncated: {} bytes", data.len()),
            ));
        }
        if &data[0..2] != b"db" {
            return Err(RegistryError::corrupted_record(
                offset,
                format!("expected 'db' signature, found {:?}", &data[0..2]),
            ));
        }

        let segment_count = read_u16_le(data, 0x02)
            .ok_or_else(|| RegistryError::corrupted_record(offset, "db field out of bounds"))?;
        let segment_list_offset = read_u32_le(data, 0x04)
            .ok_or_else(|| RegistryError::corrupted_record(offset, "db field out of bounds"))?;

        Ok(BigDataBlock {
            segment_count,
            segment_list_offset,
        })
    }
}

/// Parses a segment-list cell's payload into a list of segment cell offsets
/// (each entry masked the same way a value's own data-size field is, since
/// some tools write the high bit here too).
pub fn parse_segment_list(data: &[u8], offset: u32, segment_count: u16) -> Result<Vec<u32>> {
    let expected = segment_count as usize * 4;
    let table = data.get(..expected).ok_or_else(|| {
        RegistryError::corrupted_record(
            offset,
            format!(
                "segment list truncated: need {expected} bytes, have {}",
                data.len()
            ),
        )
    })?;
    Ok(table
        .chunks_exact(4)
        .map(|chunk| read_u32_le(chunk, 0).unwrap() & 0x7FFF_FFFF)
        .collect())
}
