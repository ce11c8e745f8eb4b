//! Layer B, part 1 — the hive base block (header).
//!
//! The base block is the first 4096 bytes of a hive file. It carries the
//! format signature, version, root-key offset, and a checksum. Per spec
//! §4.2, a signature, version, or file-type mismatch is fatal; a checksum
//! or sequence-number mismatch is not — it only marks the hive corrupted.

use crate::error::{RegistryError, Result};
use crate::utils::read_u32_le;
use std::fmt;

/// Size of the base block in bytes.
pub const BASE_BLOCK_SIZE: usize = 4096;

/// Expected signature for a valid registry hive ("regf").
pub const REGF_SIGNATURE: &[u8; 4] = b"regf";

/// Offset of the checksum field in the base block.
const CHECKSUM_OFFSET: usize = 0x1FC;

/// The parsed hive base block, plus whether it failed its internal
/// consistency checks (checksum, sequence numbers) without being rejected.
#[derive(Debug, Clone)]
pub struct BaseBlock {
    /// Signature, should be `"regf"`.
    pub signature: [u8; 4],

    /// Primary sequence number, incremented at the start of a write.
    pub primary_sequence: u32,

    /// Secondary sequence number, incremented at the end of a write.
    pub secondary_sequence: u32,

    /// Last-written timestamp (Windows FILETIME, 100ns ticks since 1601-01-01).
    pub last_written: u64,

    /// Major version of the hive format (always 1 for supported hives).
    pub major_version: u32,

    /// Minor version of the hive format (0 through 6 observed; 2-5 fully supported).
    pub minor_version: u32,

    /// File type (0 = primary registry; 1 = transaction log).
    pub file_type: u32,

    /// File format (1 = direct memory load).
    pub file_format: u32,

    /// Hive offset of the root named key.
    pub root_cell_offset: u32,

    /// Total size in bytes of the hive bins following this header.
    pub hive_bins_size: u32,

    /// Clustering factor (reserved, always 1 in practice).
    pub clustering_factor: u32,

    /// Embedded (possibly truncated) copy of the hive's own file name.
    pub file_name: String,

    /// Reserved codepage indicator. The effective ASCII codepage used to
    /// decode non-Unicode names is a caller-supplied parameter to
    /// [`crate::hive::Hive::open`], not this field.
    pub codepage_indicator: u32,

    /// Checksum stored in the header (XOR of the first 127 dwords).
    pub checksum: u32,

    /// True if the checksum or sequence numbers failed to validate.
    ///
    /// Per spec §4.2 this does not block opening the hive; it sets the
    /// hive-level corruption flag instead.
    pub is_corrupted: bool,
}

impl BaseBlock {
    /// Parses a base block from exactly [`BASE_BLOCK_SIZE`] bytes (or more;
    /// only the first 4096 bytes are inspected).
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnsupportedSignature`],
    /// [`RegistryError::UnsupportedVersion`], or
    /// [`RegistryError::UnsupportedFileType`] on structural rejection.
    /// Checksum and sequence-number mismatches are recorded in
    /// [`BaseBlock::is_corrupted`] instead of being returned as errors.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < BASE_BLOCK_SIZE {
            return Err(RegistryError::IoFailure(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "hive base block truncated: {} bytes, need {}",
                    data.len(),
                    BASE_BLOCK_SIZE
                ),
            )));
        }

        let mut signature = [0u8; 4];
        signature.copy_from_slice(&data[0..4]);

        if &signature != REGF_SIGNATURE {
            return Err(RegistryError::invalid_signature(REGF_SIGNATURE, &signature));
        }

        // All offsets below are fixed constants within the already
        // length-checked `data[..BASE_BLOCK_SIZE]` buffer, so a field read
        // can only fail if the base block itself is malformed in a way the
        // length check cannot catch; treat that as a truncation.
        let field = |offset| {
            read_u32_le(data, offset).ok_or_else(|| {
                RegistryError::IoFailure(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("base block field at {offset:#x} out of bounds"),
                ))
            })
        };

        let primary_sequence = field(0x04)?;
        let secondary_sequence = field(0x08)?;

        let last_written = u64::from(field(0x0C)?) | (u64::from(field(0x10)?) << 32);

        let major_version = field(0x14)?;
        let minor_version = field(0x18)?;
        let file_type = field(0x1C)?;
        let file_format = field(0x20)?;
        let root_cell_offset = field(0x24)?;
        let hive_bins_size = field(0x28)?;
        let clustering_factor = field(0x2C)?;

        // File name: 64 bytes of UTF-16LE (32 code units) starting at 0x30.
        let file_name = decode_embedded_file_name(&data[0x30..0x70]);

        // Reserved area; the codepage indicator has no fixed, documented
        // offset in the public format and is never relied on functionally.
        let codepage_indicator = field(0x90)?;

        let checksum = field(CHECKSUM_OFFSET)?;
        let calculated = calculate_checksum(data);

        if major_version != 1 || minor_version > 6 {
            return Err(RegistryError::UnsupportedVersion {
                major: major_version,
                minor: minor_version,
            });
        }

        if file_type != 0 {
            return Err(RegistryError::UnsupportedFileType(file_type));
        }

        let is_corrupted =
            checksum != calculated || primary_sequence != secondary_sequence;

        Ok(BaseBlock {
            signature,
            primary_sequence,
            secondary_sequence,
            last_written,
            major_version,
            minor_version,
            file_type,
            file_format,
            root_cell_offset,
            hive_bins_size,
            clustering_factor,
            file_name,
            codepage_indicator,
            checksum,
            is_corrupted,
        })
    }

    /// True when the primary and secondary sequence numbers match.
    pub fn is_consistent(&self) -> bool {
        self.primary_sequence == self.secondary_sequence
    }

    /// Converts the last-written FILETIME into a UTC timestamp, if in range.
    pub fn last_written_datetime(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        filetime_to_datetime(self.last_written)
    }
}

/// Converts a raw Windows FILETIME (100ns ticks since 1601-01-01) into a UTC
/// timestamp. Shared by the base block, key nodes, and hbin headers.
pub fn filetime_to_datetime(filetime: u64) -> Option<chrono::DateTime<chrono::Utc>> {
    const FILETIME_UNIX_DIFF_SECS: i64 = 11_644_473_600;
    let seconds = (filetime / 10_000_000) as i64 - FILETIME_UNIX_DIFF_SECS;
    let nanos = ((filetime % 10_000_000) * 100) as u32;
    chrono::DateTime::from_timestamp(seconds, nanos)
}

/// Decodes a fixed-width embedded UTF-16LE file name, trimming trailing NULs.
fn decode_embedded_file_name(bytes: &[u8]) -> String {
    let (decoded, _, _) = encoding_rs::UTF_16LE.decode(bytes);
    decoded.trim_end_matches('\0').to_string()
}

/// Computes the header's XOR-32 checksum over the first 127 dwords
/// (everything before the checksum field itself at 0x1FC).
pub fn calculate_checksum(data: &[u8]) -> u32 {
    let mut checksum: u32 = 0;
    for i in (0..CHECKSUM_OFFSET).step_by(4) {
        if let Some(dword) = read_u32_le(data, i) {
            checksum ^= dword;
        }
    }
    checksum
}

impl fmt::Display for BaseBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hive v{}.{}, root={:#x}, bins={}B, consistent={}, name={:?}",
            self.major_version,
            self.minor_version,
            self.root_cell_offset,
            self.hive_bins_size,
            self.is_consistent(),
            self.file_name
        )
    }
}
