//! Layer D — the security-descriptor (`sk`) record.
//!
//! `sk` cells are shared: multiple named keys can point at the same
//! security descriptor, and the cell tracks a reference count plus a
//! doubly-linked list (`flink`/`blink`) of sibling `sk` cells so a writer
//! can find all sharers when reclaiming one. A read-only navigator has no
//! use for the list beyond exposing it — there's no mutation to coordinate
//! — so [`SecurityKey`] just carries the offsets through as data.

use crate::error::{RegistryError, Result};
use crate::utils::read_u32_le;

const MIN_SIZE: usize = 0x18;

/// A parsed `sk` record: the security descriptor's sharing metadata plus
/// its opaque descriptor bytes.
///
/// The descriptor itself (a self-relative `SECURITY_DESCRIPTOR`) is passed
/// through unparsed — interpreting SIDs and ACEs is outside this crate's
/// scope (spec Non-goals).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SecurityKey {
    /// Hive offset of the previous `sk` cell in the shared-descriptor ring.
    pub blink_offset: u32,
    /// Hive offset of the next `sk` cell in the shared-descriptor ring.
    pub flink_offset: u32,
    /// Number of named keys referencing this descriptor.
    pub reference_count: u32,
    pub descriptor: Vec<u8>,
}

impl SecurityKey {
    /// Parses an `sk` record from cell payload bytes.
    pub fn parse(data: &[u8], offset: u32) -> Result<Self> {
        if data.len() < MIN_SIZE {
            return Err(RegistryError::corrupted_record(
                offset,
                format!("sk record truncated: {} bytes", data.len()),
            ));
        }
        if &data[0..2] != b"sk" {
            return Err(RegistryError::corrupted_record(
                offset,
                format!("expected 'sk' signature, found {:?}", &data[0..2]),
            ));
        }

        let field = |off| {
            read_u32_le(data, off)
                .ok_or_else(|| RegistryError::corrupted_record(offset, "sk field out of bounds"))
        };

        let blink_offset = field(0x04)?;
        let flink_offset = field(0x08)?;
        let reference_count = field(0x0C)?;
        let descriptor_size = field(0x10)?;

        let descriptor_end = MIN_SIZE
            .checked_add(descriptor_size as usize)
            .ok_or_else(|| RegistryError::corrupted_record(offset, "descriptor size overflow"))?;
        let descriptor = data
            .get(MIN_SIZE..descriptor_end)
            .ok_or_else(|| {
                RegistryError::corrupted_record(
                    offset,
                    format!(
                        "descriptor of {descriptor_size} bytes runs past cell end ({} available)",
                        data.len().saturating_sub(MIN_SIZE)
                    ),
                )
            })?
            .to_vec();

        Ok(SecurityKey {
            blink_offset,
            flink_offset,
            reference_count,
            descriptor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_sk(descriptor: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; MIN_SIZE + descriptor.len()];
        data[0..2].copy_from_slice(b"sk");
        data[0x04..0x08].copy_from_slice(&0x100u32.to_le_bytes());
        data[0x08..0x0C].copy_from_slice(&0x200u32.to_le_bytes());
        data[0x0C..0x10].copy_from_slice(&3u32.to_le_bytes());
        data[0x10..0x14].copy_from_slice(&(descriptor.len() as u32).to_le_bytes());
        data[MIN_SIZE..].copy_from_slice(descriptor);
        data
    }

    #[test]
    fn parses_descriptor_bytes_opaquely() {
        let data = minimal_sk(&[0xAA; 16]);
        let sk = SecurityKey::parse(&data, 0).unwrap();
        assert_eq!(sk.reference_count, 3);
        assert_eq!(sk.blink_offset, 0x100);
        assert_eq!(sk.flink_offset, 0x200);
        assert_eq!(sk.descriptor, vec![0xAA; 16]);
    }

    #[test]
    fn rejects_descriptor_size_past_cell_end() {
        let mut data = minimal_sk(&[0xAA; 4]);
        data[0x10..0x14].copy_from_slice(&1000u32.to_le_bytes());
        assert!(SecurityKey::parse(&data, 0).is_err());
    }

    #[test]
    fn rejects_truncated_header() {
        let data = vec![0u8; MIN_SIZE - 1];
        assert!(SecurityKey::parse(&data, 0).is_err());
    }
}
