//! Layer B — the hive bins list.
//!
//! Everything after the base block is a sequence of 4KB-aligned hive bins,
//! each with its own small header. This module turns that sequence into an
//! index a cell lookup can binary-search: "does a cell at hive offset X
//! live inside a bin we know about, and how big is that bin?"
//!
//! Per spec §4.2 a malformed bin header does not fail the whole hive: the
//! scan stops at the first bad header, keeps every bin indexed up to that
//! point, and marks the hive corrupted. Bins before the damage stay fully
//! usable.

use crate::error::{RegistryError, Result};
use crate::utils::read_u32_le;

/// Expected signature for a hive bin ("hbin").
pub const HBIN_SIGNATURE: &[u8; 4] = b"hbin";

/// Size of a hive bin header.
pub const HBIN_HEADER_SIZE: usize = 0x20;

/// Bins are always a multiple of this size.
pub const BIN_ALIGNMENT: u32 = 4096;

/// A hive bin's header fields.
#[derive(Debug, Clone, Copy)]
pub struct HbinHeader {
    /// Offset of this bin, relative to the start of the bins area.
    pub offset: u32,
    /// Total size of this bin in bytes, including its header.
    pub size: u32,
    /// Bin-level timestamp (rarely meaningful; last writer to touch the bin).
    pub timestamp: u64,
}

impl HbinHeader {
    /// Parses a bin header from bytes starting at the bin (its `"hbin"`
    /// signature is `data[0..4]`).
    pub fn parse(data: &[u8], expected_offset: u32) -> Result<Self> {
        if data.len() < HBIN_HEADER_SIZE {
            return Err(RegistryError::corrupted_cell(
                expected_offset,
                format!(
                    "hbin header truncated: {} bytes, need {HBIN_HEADER_SIZE}",
                    data.len()
                ),
            ));
        }

        let mut signature = [0u8; 4];
        signature.copy_from_slice(&data[0..4]);
        if &signature != HBIN_SIGNATURE {
            return Err(RegistryError::corrupted_cell(
                expected_offset,
                format!("bad hbin signature {signature:?}"),
            ));
        }

        let field = |offset| {
            read_u32_le(data, offset)
                .ok_or_else(|| RegistryError::corrupted_cell(expected_offset, "hbin field out of bounds"))
        };

        let offset = field(0x04)?;
        let size = field(0x08)?;
        let timestamp = u64::from(field(0x14)?) | (u64::from(field(0x18)?) << 32);

        if offset != expected_offset {
            return Err(RegistryError::corrupted_cell(
                expected_offset,
                format!("hbin offset mismatch: header says {offset:#x}"),
            ));
        }

        if size == 0 || size % BIN_ALIGNMENT != 0 {
            return Err(RegistryError::corrupted_cell(
                expected_offset,
                format!("implausible hbin size {size:#x}"),
            ));
        }

        Ok(HbinHeader {
            offset,
            size,
            timestamp,
        })
    }
}

/// A single indexed bin: its hive-relative offset and size.
#[derive(Debug, Clone, Copy)]
pub struct BinEntry {
    pub offset: u32,
    pub size: u32,
}

/// The bins list, indexed once at open time for binary-searchable lookups.
///
/// Bin offsets strictly increase during the scan, so `bins` is sorted by
/// construction and [`BinsIndex::find_bin`] can bisect it directly.
#[derive(Debug, Clone, Default)]
pub struct BinsIndex {
    bins: Vec<BinEntry>,
    /// True if the scan stopped early on a malformed bin header.
    pub is_corrupted: bool,
}

impl BinsIndex {
    /// Scans the bins area starting at `bins_data` (the hive bytes
    /// immediately following the base block) up to `declared_size` bytes,
    /// building an index of every well-formed bin encountered in order.
    ///
    /// Never returns an error: a malformed header simply ends the scan.
    pub fn scan(bins_data: &[u8], declared_size: u32) -> Self {
        let mut bins = Vec::new();
        let mut is_corrupted = false;
        let mut offset: u32 = 0;
        let limit = declared_size.min(bins_data.len() as u32);

        while offset < limit {
            let start = offset as usize;
            let remaining = match bins_data.get(start..) {
                Some(slice) => slice,
                None => {
                    is_corrupted = true;
                    break;
                }
            };

            match HbinHeader::parse(remaining, offset) {
                Ok(header) => {
                    if header.size as u64 + offset as u64 > limit as u64 {
                        is_corrupted = true;
                        break;
                    }
                    bins.push(BinEntry {
                        offset: header.offset,
                        size: header.size,
                    });
                    offset += header.size;
                }
                Err(_) => {
                    is_corrupted = true;
                    break;
                }
            }
        }

        BinsIndex { bins, is_corrupted }
    }

    /// Finds the bin containing `hive_offset`, if any.
    pub fn find_bin(&self, hive_offset: u32) -> Option<BinEntry> {
        let idx = self
            .bins
            .partition_point(|bin| bin.offset <= hive_offset);
        let candidate = self.bins[..idx].last()?;
        if hive_offset < candidate.offset + candidate.size {
            Some(*candidate)
        } else {
            None
        }
    }

    /// Total size in bytes of every successfully indexed bin.
    pub fn indexed_size(&self) -> u32 {
        self.bins.iter().map(|b| b.size).sum()
    }

    /// Number of bins successfully indexed.
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}
