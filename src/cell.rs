//! Layer C — the cell allocator, plus the small tag/flag/type vocabularies
//! shared by every record parser.
//!
//! A cell is the unit of allocation inside a hive bin: a signed 4-byte size
//! prefix (negative means allocated, positive means free) followed by that
//! many bytes of payload. [`cell_at`] is the single place that turns a hive
//! offset into validated cell bytes; every record parser in this crate goes
//! through it rather than re-deriving bounds checks of its own.

use std::borrow::Cow;

use crate::error::{RegistryError, Result};
use crate::hbin::BinsIndex;
use crate::io::ByteSource;
use crate::utils::{cell_offset_to_absolute, read_i32_le};

/// A validated cell: its hive offset, allocation state, and payload bytes
/// (the size prefix itself is not included).
#[derive(Debug)]
pub struct Cell<'a> {
    pub offset: u32,
    pub is_allocated: bool,
    pub data: Cow<'a, [u8]>,
}

/// Resolves `hive_offset` to its containing cell and returns its payload.
///
/// Validates, in order: the offset falls inside an indexed bin, the
/// 4-byte size prefix is readable, the resulting cell does not run past
/// the end of its bin. Any failure is a recoverable
/// [`RegistryError::CorruptedCell`] / [`RegistryError::InvalidOffset`] —
/// callers are expected to mark the owning hive corrupted and move on
/// rather than abort the whole traversal.
pub fn cell_at<'s>(
    source: &'s dyn ByteSource,
    bins: &BinsIndex,
    hive_offset: u32,
) -> Result<Cell<'s>> {
    let bin = bins
        .find_bin(hive_offset)
        .ok_or_else(|| RegistryError::invalid_offset(hive_offset, bins.indexed_size()))?;

    let absolute = cell_offset_to_absolute(hive_offset)
        .ok_or_else(|| RegistryError::corrupted_cell(hive_offset, "offset overflow"))?;

    let prefix = source.read_range(absolute, 4)?;
    let size = read_i32_le(&prefix, 0)
        .ok_or_else(|| RegistryError::corrupted_cell(hive_offset, "missing size prefix"))?;

    let abs_size = size.unsigned_abs();
    if abs_size < 4 {
        return Err(RegistryError::corrupted_cell(
            hive_offset,
            format!("implausible cell size {size}"),
        ));
    }

    let bin_end = bin.offset as u64 + bin.size as u64;
    if hive_offset as u64 + abs_size as u64 > bin_end {
        return Err(RegistryError::corrupted_cell(
            hive_offset,
            format!("cell of size {abs_size} runs past its bin's end"),
        ));
    }

    let payload_len = (abs_size - 4) as usize;
    let data = source.read_range(absolute + 4, payload_len)?;

    Ok(Cell {
        offset: hive_offset,
        is_allocated: size < 0,
        data,
    })
}

/// Two-character record tag found at the start of most allocated cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellType {
    KeyNode,
    ValueKey,
    Security,
    IndexLeaf,
    FastLeaf,
    HashLeaf,
    IndexRoot,
    DataBlock,
}

impl CellType {
    /// Recognizes a two-byte tag. Returns `None` for anything else — an
    /// unrecognized tag is the caller's signal to treat the cell as
    /// corrupted, not this type's job to decide.
    pub fn from_signature(sig: &[u8; 2]) -> Option<Self> {
        match sig {
            b"nk" => Some(CellType::KeyNode),
            b"vk" => Some(CellType::ValueKey),
            b"sk" => Some(CellType::Security),
            b"li" => Some(CellType::IndexLeaf),
            b"lf" => Some(CellType::FastLeaf),
            b"lh" => Some(CellType::HashLeaf),
            b"ri" => Some(CellType::IndexRoot),
            b"db" => Some(CellType::DataBlock),
            _ => None,
        }
    }

    pub fn signature(&self) -> &'static [u8; 2] {
        match self {
            CellType::KeyNode => b"nk",
            CellType::ValueKey => b"vk",
            CellType::Security => b"sk",
            CellType::IndexLeaf => b"li",
            CellType::FastLeaf => b"lf",
            CellType::HashLeaf => b"lh",
            CellType::IndexRoot => b"ri",
            CellType::DataBlock => b"db",
        }
    }

    pub fn is_subkey_list(&self) -> bool {
        matches!(
            self,
            CellType::IndexLeaf | CellType::FastLeaf | CellType::HashLeaf | CellType::IndexRoot
        )
    }
}

/// Flag bits in a named key's `nk` record.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyNodeFlags(pub u16);

impl KeyNodeFlags {
    pub const VOLATILE: u16 = 0x0001;
    /// Key is a mount point for another hive.
    pub const MOUNT_POINT: u16 = 0x0002;
    /// This key node is the root of the hive.
    pub const ROOT_KEY: u16 = 0x0004;
    pub const NO_DELETE: u16 = 0x0008;
    pub const SYM_LINK: u16 = 0x0010;
    /// Name is stored in the caller's codepage rather than UTF-16LE.
    pub const COMP_NAME: u16 = 0x0020;
    pub const PREDEF_HANDLE: u16 = 0x0040;

    pub fn new(flags: u16) -> Self {
        Self(flags)
    }

    pub fn has_flag(&self, flag: u16) -> bool {
        (self.0 & flag) != 0
    }

    pub fn is_compressed(&self) -> bool {
        self.has_flag(Self::COMP_NAME)
    }

    pub fn is_volatile(&self) -> bool {
        self.has_flag(Self::VOLATILE)
    }

    pub fn is_mount_point(&self) -> bool {
        self.has_flag(Self::MOUNT_POINT)
    }

    pub fn is_root(&self) -> bool {
        self.has_flag(Self::ROOT_KEY)
    }
}

/// Registry value data types (`REG_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueType {
    None,
    String,
    ExpandString,
    Binary,
    Dword,
    DwordBigEndian,
    Link,
    MultiString,
    ResourceList,
    FullResourceDescriptor,
    ResourceRequirementsList,
    Qword,
    /// Anything outside the 0..=11 range the format defines; not an error,
    /// just a type this crate has no typed accessor for.
    Unknown(u32),
}

impl ValueType {
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => ValueType::None,
            1 => ValueType::String,
            2 => ValueType::ExpandString,
            3 => ValueType::Binary,
            4 => ValueType::Dword,
            5 => ValueType::DwordBigEndian,
            6 => ValueType::Link,
            7 => ValueType::MultiString,
            8 => ValueType::ResourceList,
            9 => ValueType::FullResourceDescriptor,
            10 => ValueType::ResourceRequirementsList,
            11 => ValueType::Qword,
            other => ValueType::Unknown(other),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ValueType::None => "REG_NONE",
            ValueType::String => "REG_SZ",
            ValueType::ExpandString => "REG_EXPAND_SZ",
            ValueType::Binary => "REG_BINARY",
            ValueType::Dword => "REG_DWORD",
            ValueType::DwordBigEndian => "REG_DWORD_BIG_ENDIAN",
            ValueType::Link => "REG_LINK",
            ValueType::MultiString => "REG_MULTI_SZ",
            ValueType::ResourceList => "REG_RESOURCE_LIST",
            ValueType::FullResourceDescriptor => "REG_FULL_RESOURCE_DESCRIPTOR",
            ValueType::ResourceRequirementsList => "REG_RESOURCE_REQUIREMENTS_LIST",
            ValueType::Qword => "REG_QWORD",
            ValueType::Unknown(_) => "REG_UNKNOWN",
        }
    }
}
