//! Layer D — the named key (`nk`) record.

use encoding_rs::Encoding;

use crate::cell::KeyNodeFlags;
use crate::error::{RegistryError, Result};
use crate::name::RawName;
use crate::utils::{legacy_prefix_len, read_u16_le, read_u32_le};

/// Sentinel stored in offset fields meaning "none" (no parent, no class
/// name, no security descriptor).
pub const OFFSET_NONE: u32 = 0xFFFF_FFFF;

/// Minimum size of a fixed-layout `nk` record, not counting the name.
const KEY_NODE_FIXED_SIZE: usize = 0x4C;

/// A parsed named-key (`nk`) record.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyNode {
    pub flags: KeyNodeFlags,
    pub last_written: u64,
    pub parent_offset: u32,
    pub subkey_count: u32,
    pub subkey_list_offset: u32,
    pub volatile_subkey_count: u32,
    pub volatile_subkey_list_offset: u32,
    pub value_count: u32,
    pub value_list_offset: u32,
    pub security_offset: u32,
    pub class_name_offset: u32,
    pub class_name_length: u16,
    pub max_subkey_name_len: u32,
    pub max_value_name_len: u32,
    pub max_value_data_len: u32,
    pub name: RawName,
    /// Set when the record's name could not be read in full; the record is
    /// otherwise usable (all fixed fields parse independently of the name).
    pub is_corrupted: bool,
}

impl KeyNode {
    /// Parses an `nk` record from cell payload bytes (already past the
    /// cell's own size prefix).
    ///
    /// `minor_version` comes from the hive's base block: hives with minor
    /// version 0 or 1 prepend an extra 4-byte unidentified field ahead of
    /// the `"nk"` signature, which is skipped before the fixed layout below
    /// applies.
    ///
    /// Unlike the cell allocator, a structurally short or mistagged buffer
    /// here is always [`RegistryError::CorruptedRecord`] — callers decide
    /// whether to abort the surrounding traversal or substitute a stand-in.
    pub fn parse(
        data: &[u8],
        offset: u32,
        codepage: &'static Encoding,
        minor_version: u32,
    ) -> Result<Self> {
        let data = data
            .get(legacy_prefix_len(minor_version)..)
            .ok_or_else(|| RegistryError::corrupted_record(offset, "nk record truncated before legacy prefix"))?;
        if data.len() < KEY_NODE_FIXED_SIZE {
            return Err(RegistryError::corrupted_record(
                offset,
                format!("nk record truncated: {} bytes", data.len()),
            ));
        }
        if &data[0..2] != b"nk" {
            return Err(RegistryError::corrupted_record(
                offset,
                format!("expected 'nk' signature, found {:?}", &data[0..2]),
            ));
        }

        let field32 = |off| {
            read_u32_le(data, off)
                .ok_or_else(|| RegistryError::corrupted_record(offset, "nk field out of bounds"))
        };
        let field16 = |off| {
            read_u16_le(data, off)
                .ok_or_else(|| RegistryError::corrupted_record(offset, "nk field out of bounds"))
        };

        let flags = KeyNodeFlags::new(field16(0x02)?);
        let last_written = u64::from(field32(0x04)?) | (u64::from(field32(0x08)?) << 32);
        let parent_offset = field32(0x10)?;
        let subkey_count = field32(0x14)?;
        let volatile_subkey_count = field32(0x18)?;
        let subkey_list_offset = field32(0x1C)?;
        let volatile_subkey_list_offset = field32(0x20)?;
        let value_count = field32(0x24)?;
        let value_list_offset = field32(0x28)?;
        let security_offset = field32(0x2C)?;
        let class_name_offset = field32(0x30)?;
        let max_subkey_name_len = field32(0x34)?;
        let max_value_name_len = field32(0x3C)?;
        let max_value_data_len = field32(0x40)?;
        let name_length = field16(0x48)?;
        let class_name_length = field16(0x4A)?;

        let (name, is_corrupted) = if name_length == 0 {
            (RawName::empty(), true)
        } else {
            match data
                .get(KEY_NODE_FIXED_SIZE..)
                .and_then(|rest| rest.get(..name_length as usize))
            {
                Some(name_bytes) => (
                    RawName::new(name_bytes.to_vec(), flags.is_compressed(), codepage),
                    false,
                ),
                None => (RawName::empty(), true),
            }
        };

        Ok(KeyNode {
            flags,
            last_written,
            parent_offset,
            subkey_count,
            subkey_list_offset,
            volatile_subkey_count,
            volatile_subkey_list_offset,
            value_count,
            value_list_offset,
            security_offset,
            class_name_offset,
            class_name_length,
            max_subkey_name_len,
            max_value_name_len,
            max_value_data_len,
            name,
            is_corrupted,
        })
    }

    pub fn has_subkeys(&self) -> bool {
        self.subkey_count > 0
    }

    pub fn has_values(&self) -> bool {
        self.value_count > 0
    }

    pub fn is_root(&self) -> bool {
        self.flags.is_root()
    }

    pub fn has_class_name(&self) -> bool {
        self.class_name_offset != OFFSET_NONE && self.class_name_length > 0
    }

    pub fn has_security_descriptor(&self) -> bool {
        self.security_offset != OFFSET_NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CP: &'static Encoding = encoding_rs::WINDOWS_1252;

    fn minimal_nk(name: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; KEY_NODE_FIXED_SIZE + name.len()];
        data[0..2].copy_from_slice(b"nk");
        data[0x10..0x14].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes()); // parent
        data[0x2C..0x30].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes()); // security
        data[0x30..0x34].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes()); // class name
        data[0x48..0x4A].copy_from_slice(&(name.len() as u16).to_le_bytes());
        data[KEY_NODE_FIXED_SIZE..].copy_from_slice(name);
        data
    }

    #[test]
    fn parses_minimal_key_node_with_ascii_name() {
        let data = minimal_nk(b"Software");
        let key = KeyNode::parse(&data, 0, CP, 5).unwrap();
        assert!(!key.is_corrupted);
        assert_eq!(key.name.decode(CP), "Software");
        assert!(!key.has_class_name());
        assert!(!key.has_security_descriptor());
    }

    #[test]
    fn rejects_truncated_fixed_layout() {
        let data = vec![0u8; KEY_NODE_FIXED_SIZE - 1];
        assert!(KeyNode::parse(&data, 0, CP, 5).is_err());
    }

    #[test]
    fn rejects_wrong_signature() {
        let mut data = minimal_nk(b"x");
        data[0..2].copy_from_slice(b"vk");
        assert!(KeyNode::parse(&data, 0, CP, 5).is_err());
    }

    #[test]
    fn truncated_name_marks_record_corrupted_not_failed() {
        let mut data = minimal_nk(b"ab");
        data[0x48..0x4A].copy_from_slice(&100u16.to_le_bytes());
        let key = KeyNode::parse(&data, 0, CP, 5).unwrap();
        assert!(key.is_corrupted);
        assert_eq!(key.name.bytes.len(), 0);
    }

    #[test]
    fn zero_length_name_marks_record_corrupted() {
        let data = minimal_nk(b"");
        let key = KeyNode::parse(&data, 0, CP, 5).unwrap();
        assert!(key.is_corrupted);
        assert_eq!(key.name.bytes.len(), 0);
    }

    #[test]
    fn root_flag_is_detected() {
        let mut data = minimal_nk(b"ROOT");
        data[0x02..0x04].copy_from_slice(&KeyNodeFlags::ROOT_KEY.to_le_bytes());
        let key = KeyNode::parse(&data, 0, CP, 5).unwrap();
        assert!(key.is_root());
    }

    #[test]
    fn legacy_minor_version_skips_four_byte_prefix() {
        let mut data = vec![0u8; 4];
        data.extend(minimal_nk(b"Software"));
        let key = KeyNode::parse(&data, 0, CP, 1).unwrap();
        assert_eq!(key.name.decode(CP), "Software");
    }
}
