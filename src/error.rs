//! Error types for registry hive parsing.
//!
//! The taxonomy mirrors the format's corruption-tolerance policy: open-time
//! structural failures (bad signature, unsupported version/file type) are
//! fatal, but per-cell and per-record damage is recoverable and only
//! surfaces when the damaged entity is actually touched. Callers track
//! recoverable damage through [`crate::hive::Hive::is_corrupted`] rather
//! than through these error variants.

use std::io;
use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors that can occur while opening or navigating a registry hive.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Caller contract violated: bad index, empty path segment, zero-sized read, etc.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The underlying byte source failed or returned a short read.
    #[error("I/O failure: {0}")]
    IoFailure(#[from] io::Error),

    /// The first four bytes of the hive were not `"regf"`.
    #[error("unsupported signature: expected {expected:?}, found {found:?}")]
    UnsupportedSignature { expected: [u8; 4], found: [u8; 4] },

    /// Major version was not 1, or minor version fell outside the 0..=6 range.
    #[error("unsupported hive version: {major}.{minor}")]
    UnsupportedVersion { major: u32, minor: u32 },

    /// The header's file-type field was not 0 (primary registry hive).
    #[error("unsupported file type: {0} (only primary registry hives are supported)")]
    UnsupportedFileType(u32),

    /// A hive offset did not fall inside any indexed hive bin.
    #[error("offset {offset:#x} is outside the hive bins (total bins size {bins_size:#x})")]
    InvalidOffset { offset: u32, bins_size: u32 },

    /// A cell's size header was zero, implausibly small, or exceeded its bin.
    #[error("corrupted cell at offset {offset:#x}: {reason}")]
    CorruptedCell { offset: u32, reason: String },

    /// A record's fields were out of bounds or internally inconsistent.
    #[error("corrupted record at offset {offset:#x}: {reason}")]
    CorruptedRecord { offset: u32, reason: String },

    /// A typed value getter was called against an incompatible value type.
    #[error("unsupported value type for this getter: {0:?}")]
    UnsupportedValueType(crate::cell::ValueType),

    /// A by-name or by-path lookup found no match.
    #[error("not found: {0}")]
    NotFound(String),
}

impl RegistryError {
    pub(crate) fn invalid_signature(expected: &[u8; 4], found: &[u8]) -> Self {
        let mut buf = [0u8; 4];
        let n = found.len().min(4);
        buf[..n].copy_from_slice(&found[..n]);
        Self::UnsupportedSignature {
            expected: *expected,
            found: buf,
        }
    }

    pub(crate) fn invalid_offset(offset: u32, bins_size: u32) -> Self {
        Self::InvalidOffset { offset, bins_size }
    }

    pub(crate) fn corrupted_cell(offset: u32, reason: impl Into<String>) -> Self {
        Self::CorruptedCell {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupted_record(offset: u32, reason: impl Into<String>) -> Self {
        Self::CorruptedRecord {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(item_type: &str, name: &str) -> Self {
        Self::NotFound(format!("{item_type} '{name}'"))
    }
}
