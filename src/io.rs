//! Layer A — the byte-source abstraction the rest of the core reads through.
//!
//! Every read made while navigating a hive goes through a [`ByteSource`].
//! The core never seeks blindly; callers are expected to bounds-check a
//! read against [`ByteSource::size`] before issuing it, and a short read or
//! I/O error aborts the current operation with [`RegistryError::IoFailure`]
//! rather than returning partial data.

use std::borrow::Cow;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;

use crate::error::{RegistryError, Result};

/// An arbitrary seekable byte source the core can read ranges from.
///
/// Sources that already hold their bytes contiguously in memory (a
/// memory-mapped file, an owned `Vec<u8>`) should override
/// [`ByteSource::as_slice`] so callers can borrow cell payloads without
/// copying; sources that cannot (a real file read without mmap, a network
/// stream) fall back to the default, which copies through `read_at`.
pub trait ByteSource {
    /// Total size of the source in bytes.
    fn size(&self) -> u64;

    /// Reads `buf.len()` bytes starting at `offset` into `buf`.
    ///
    /// Returns [`RegistryError::IoFailure`] on a short read or I/O error.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Returns a zero-copy view of the whole source, when the backing
    /// storage allows it. The default implementation returns `None`.
    fn as_slice(&self) -> Option<&[u8]> {
        None
    }

    /// Reads `len` bytes starting at `offset`, borrowing when possible.
    fn read_range(&self, offset: u64, len: usize) -> Result<Cow<'_, [u8]>> {
        if let Some(slice) = self.as_slice() {
            let start = offset as usize;
            let end = start
                .checked_add(len)
                .ok_or_else(|| RegistryError::InvalidArgument("range overflow".into()))?;
            if end > slice.len() {
                return Err(RegistryError::IoFailure(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "read_range past end of source",
                )));
            }
            Ok(Cow::Borrowed(&slice[start..end]))
        } else {
            let mut buf = vec![0u8; len];
            self.read_at(offset, &mut buf)?;
            Ok(Cow::Owned(buf))
        }
    }
}

/// An in-memory byte source, used for tests and for hives already loaded
/// into memory by the caller.
pub struct SliceSource {
    data: Arc<Vec<u8>>,
}

impl SliceSource {
    /// Wraps an owned buffer as a byte source.
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(data),
        }
    }
}

impl ByteSource for SliceSource {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let start = offset as usize;
        let end = start.checked_add(buf.len()).ok_or_else(|| {
            RegistryError::InvalidArgument("read_at range overflow".into())
        })?;
        if end > self.data.len() {
            return Err(RegistryError::IoFailure(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "read_at past end of source",
            )));
        }
        buf.copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn as_slice(&self) -> Option<&[u8]> {
        Some(&self.data)
    }
}

/// A memory-mapped file byte source.
///
/// # Safety
///
/// Memory-mapping a file is only as safe as the guarantee that nothing else
/// truncates or mutates it concurrently; the hive is opened read-only and
/// the mapping is never written through, but the underlying file could
/// still be modified by another process. This mirrors the trade-off every
/// mmap-based reader in the ecosystem makes.
pub struct FileSource {
    mmap: Mmap,
}

impl FileSource {
    /// Memory-maps the file at `path` for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the file is opened read-only and the mapping is never
        // written through; all access is bounds-checked by `ByteSource`
        // callers before it reaches the mapping.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { mmap })
    }
}

impl ByteSource for FileSource {
    fn size(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let start = offset as usize;
        let end = start.checked_add(buf.len()).ok_or_else(|| {
            RegistryError::InvalidArgument("read_at range overflow".into())
        })?;
        if end > self.mmap.len() {
            return Err(RegistryError::IoFailure(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "read_at past end of source",
            )));
        }
        buf.copy_from_slice(&self.mmap[start..end]);
        Ok(())
    }

    fn as_slice(&self) -> Option<&[u8]> {
        Some(&self.mmap)
    }
}
