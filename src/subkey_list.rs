//! Layer D — sub-key list records (`lf`, `lh`, `li`, `ri`).
//!
//! The four tags are kept as distinct variants rather than merged, because
//! `lf` and `lh` need different lookup treatment: an `lf` hint is only the
//! first four bytes of the name (a fast, sometimes-wrong pre-filter that
//! still requires a full comparison), while an `lh` hint is the complete
//! §4.4 name hash (a reliable pre-filter — a mismatch proves inequality).
//! Collapsing them loses that distinction and an index built on top would
//! either over-trust `lf` hints or under-trust `lh` hints.

use crate::error::{RegistryError, Result};
use crate::utils::read_u32_le;

/// One entry in an `lf` list: a key offset plus the first four name bytes.
#[derive(Debug, Clone, Copy)]
pub struct LfEntry {
    pub key_offset: u32,
    /// First four bytes of the subkey's name, in whatever encoding it was
    /// stored in. A mismatch here proves inequality; a match proves nothing
    /// by itself — full comparison is always required.
    pub name_hint: [u8; 4],
}

/// One entry in an `lh` list: a key offset plus the subkey's full §4.4 hash.
#[derive(Debug, Clone, Copy)]
pub struct LhEntry {
    pub key_offset: u32,
    pub name_hash: u32,
}

/// A parsed sub-key list record.
#[derive(Debug, Clone)]
pub enum SubkeyList {
    /// `lf` — weak 4-byte name-prefix hints.
    Lf(Vec<LfEntry>),
    /// `lh` — full name-hash hints.
    Lh(Vec<LhEntry>),
    /// `li` — bare key offsets, no hints.
    Li(Vec<u32>),
    /// `ri` — offsets of other sub-key list cells, one level of indirection.
    Ri(Vec<u32>),
}

impl SubkeyList {
    /// Parses a sub-key list from cell payload bytes.
    pub fn parse(data: &[u8], offset: u32) -> Result<Self> {
        if data.len() < 4 {
            return Err(RegistryError::corrupted_record(
                offset,
                format!("sub-key list truncated: {} bytes", data.len()),
            ));
        }

        let sig = [data[0], data[1]];
        let count = u16::from_le_bytes([data[2], data[3]]) as usize;

        match &sig {
            b"li" => Ok(SubkeyList::Li(read_offset_array(data, offset, count)?)),
            b"ri" => Ok(SubkeyList::Ri(read_offset_array(data, offset, count)?)),
            b"lf" => {
                let expected = 4 + count * 8;
                let entries_data = data.get(4..expected).ok_or_else(|| {
                    RegistryError::corrupted_record(
                        offset,
                        format!("lf list truncated: need {expected} bytes, have {}", data.len()),
                    )
                })?;
                let entries = entries_data
                    .chunks_exact(8)
                    .map(|chunk| LfEntry {
                        key_offset: u32::from_le_bytes(chunk[0..4].try_into().unwrap()),
                        name_hint: chunk[4..8].try_into().unwrap(),
                    })
                    .collect();
                Ok(SubkeyList::Lf(entries))
            }
            b"lh" => {
                let expected = 4 + count * 8;
                let entries_data = data.get(4..expected).ok_or_else(|| {
                    RegistryError::corrupted_record(
                        offset,
                        format!("lh list truncated: need {expected} bytes, have {}", data.len()),
                    )
                })?;
                let entries = entries_data
                    .chunks_exact(8)
                    .map(|chunk| LhEntry {
                        key_offset: u32::from_le_bytes(chunk[0..4].try_into().unwrap()),
                        name_hash: u32::from_le_bytes(chunk[4..8].try_into().unwrap()),
                    })
                    .collect();
                Ok(SubkeyList::Lh(entries))
            }
            _ => Err(RegistryError::corrupted_record(
                offset,
                format!("unrecognized sub-key list tag {sig:?}"),
            )),
        }
    }

    /// Returns an iterator over every offset this list directly holds (key
    /// offsets for `lf`/`lh`/`li`, sub-list offsets for `ri`).
    pub fn offsets(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        match self {
            SubkeyList::Lf(entries) => Box::new(entries.iter().map(|e| e.key_offset)),
            SubkeyList::Lh(entries) => Box::new(entries.iter().map(|e| e.key_offset)),
            SubkeyList::Li(offsets) | SubkeyList::Ri(offsets) => Box::new(offsets.iter().copied()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SubkeyList::Lf(entries) => entries.len(),
            SubkeyList::Lh(entries) => entries.len(),
            SubkeyList::Li(offsets) | SubkeyList::Ri(offsets) => offsets.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_indirect(&self) -> bool {
        matches!(self, SubkeyList::Ri(_))
    }
}

fn read_offset_array(data: &[u8], offset: u32, count: usize) -> Result<Vec<u32>> {
    let expected = 4 + count * 4;
    let table = data.get(4..expected).ok_or_else(|| {
        RegistryError::corrupted_record(
            offset,
            format!("offset list truncated: need {expected} bytes, have {}", data.len()),
        )
    })?;
    Ok(table
        .chunks_exact(4)
        .map(|chunk| read_u32_le(chunk, 0).unwrap())
        .collect())
}
