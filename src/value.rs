//! Layer D — the value key (`vk`) record.
//!
//! `vk` only describes *where* a value's data lives (inline, in one
//! external cell, or — for types `ValueType` doesn't further interpret —
//! potentially in a segmented big-data block); turning that description
//! into typed bytes is layer F's job ([`crate::data`]).

use encoding_rs::Encoding;

use crate::cell::ValueType;
use crate::error::{RegistryError, Result};
use crate::name::RawName;
use crate::utils::{legacy_prefix_len, read_i32_le, read_u16_le, read_u32_le};

/// Flag bit meaning the value's name is stored in the hive's codepage
/// rather than UTF-16LE.
const VALUE_NAME_IS_ASCII: u16 = 0x0001;

/// Minimum size of a fixed-layout `vk` record, not counting the name.
const VALUE_KEY_FIXED_SIZE: usize = 0x14;

/// A parsed value-key (`vk`) record.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValueKey {
    /// Empty for the key's unnamed ("default") value.
    pub name: RawName,
    pub data_type: ValueType,
    /// Size of the value's data in bytes, after masking off the inline flag.
    pub data_size: u32,
    /// When `is_inline`, the data itself (up to 4 bytes, stored
    /// little-endian in this field); otherwise the hive offset of the
    /// external cell holding the data.
    pub data_offset: u32,
    pub is_inline: bool,
    /// Set when the record's name or its inline-data size needed repair to
    /// stay parseable.
    pub is_corrupted: bool,
}

impl ValueKey {
    /// Parses a `vk` record from cell payload bytes.
    ///
    /// `minor_version` comes from the hive's base block: hives with minor
    /// version 0 or 1 prepend an extra 4-byte unidentified field ahead of
    /// the `"vk"` signature, which is skipped before the fixed layout below
    /// applies.
    pub fn parse(
        data: &[u8],
        offset: u32,
        codepage: &'static Encoding,
        minor_version: u32,
    ) -> Result<Self> {
        let data = data
            .get(legacy_prefix_len(minor_version)..)
            .ok_or_else(|| RegistryError::corrupted_record(offset, "vk record truncated before legacy prefix"))?;
        if data.len() < VALUE_KEY_FIXED_SIZE {
            return Err(RegistryError::corrupted_record(
                offset,
                format!("vk record truncated: {} bytes", data.len()),
            ));
        }
        if &data[0..2] != b"vk" {
            return Err(RegistryError::corrupted_record(
                offset,
                format!("expected 'vk' signature, found {:?}", &data[0..2]),
            ));
        }

        let name_length = read_u16_le(data, 0x02)
            .ok_or_else(|| RegistryError::corrupted_record(offset, "vk field out of bounds"))?;
        let data_size_raw = read_i32_le(data, 0x04)
            .ok_or_else(|| RegistryError::corrupted_record(offset, "vk field out of bounds"))?;
        let data_offset = read_u32_le(data, 0x08)
            .ok_or_else(|| RegistryError::corrupted_record(offset, "vk field out of bounds"))?;
        let data_type_raw = read_u32_le(data, 0x0C)
            .ok_or_else(|| RegistryError::corrupted_record(offset, "vk field out of bounds"))?;
        let name_flags = read_u16_le(data, 0x10)
            .ok_or_else(|| RegistryError::corrupted_record(offset, "vk field out of bounds"))?;

        let is_inline = data_size_raw < 0;
        let mut data_size = (data_size_raw & 0x7FFF_FFFF) as u32;
        let mut is_corrupted = false;
        let data_type = ValueType::from_u32(data_type_raw);

        // Inline data is read back out of the 4-byte data_offset field as
        // whole UTF-16LE code units when the type is a string; an odd byte
        // count can't come from a well-formed string value of that shape,
        // so round up and flag it. Other inline types (DWORD, binary, ...)
        // have no such alignment requirement and are left alone.
        if is_inline
            && data_size % 2 == 1
            && data_size < 4
            && matches!(data_type, ValueType::String | ValueType::ExpandString)
        {
            data_size += 1;
            is_corrupted = true;
        }

        let is_ascii_name = name_flags & VALUE_NAME_IS_ASCII != 0;

        let (name, name_corrupted) = match data
            .get(VALUE_KEY_FIXED_SIZE..)
            .and_then(|rest| rest.get(..name_length as usize))
        {
            Some(name_bytes) => (RawName::new(name_bytes.to_vec(), is_ascii_name, codepage), false),
            None => (RawName::empty(), true),
        };

        Ok(ValueKey {
            name,
            data_type,
            data_size,
            data_offset,
            is_inline,
            is_corrupted: is_corrupted || name_corrupted,
        })
    }

    /// True if this is the key's unnamed ("default") value.
    pub fn is_default(&self) -> bool {
        self.name.bytes.is_empty()
    }

    /// Returns the inline data bytes when [`ValueKey::is_inline`] is set.
    pub fn inline_bytes(&self) -> Vec<u8> {
        debug_assert!(self.is_inline);
        let bytes = self.data_offset.to_le_bytes();
        let len = (self.data_size as usize).min(4);
        bytes[..len].to_vec()
    }
}
