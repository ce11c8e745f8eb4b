//! The composition root: ties every lower layer into the public [`Hive`]
//! type and its [`NamedKey`] / [`ValueItem`] handles.
//!
//! Per spec §5, callers hold hive offsets and handles borrowed from a
//! `Hive`, not owning pointers into parsed records — the actual `KeyNode`
//! and `ValueKey` structs live in the hive's [`crate::cache::RecordCache`]s
//! and are cloned out on each access. There is no internal locking: `Hive`
//! is single-threaded (`!Sync` by virtue of the `RefCell`s inside its
//! caches), matching the rest of this crate's no-synchronization-unless-
//! asked-for stance. A caller who needs concurrent access wraps a `Hive`
//! per thread.
//!
//! Corruption is sticky and hive-wide: any structural damage encountered
//! while parsing the header, the bins list, or any cell reachable during
//! navigation sets [`Hive::is_corrupted`] and is never cleared. Individual
//! lookups still return their own result — a damaged branch just gets
//! skipped rather than aborting the whole traversal.

use std::cell::Cell as StickyFlag;
use std::path::Path;

use chrono::{DateTime, Utc};
use encoding_rs::Encoding;
use tracing::{debug, instrument, warn};

use crate::cache::RecordCache;
use crate::cell::{cell_at, ValueType};
use crate::data::{self, ValueData};
use crate::error::{RegistryError, Result};
use crate::hbin::BinsIndex;
use crate::header::BaseBlock;
use crate::index;
use crate::io::{ByteSource, FileSource, SliceSource};
use crate::key::{KeyNode, OFFSET_NONE};
use crate::name::RawName;
use crate::security::SecurityKey;
use crate::value::ValueKey;

/// A parsed, navigable registry hive.
///
/// `S` is the underlying [`ByteSource`] — a memory-mapped file
/// ([`Hive::open`]) or an in-memory buffer ([`Hive::from_bytes`]).
pub struct Hive<S: ByteSource> {
    source: S,
    base_block: BaseBlock,
    bins: BinsIndex,
    codepage: &'static Encoding,
    key_cache: RecordCache<KeyNode>,
    value_cache: RecordCache<ValueKey>,
    is_corrupted: StickyFlag<bool>,
}

impl Hive<FileSource> {
    /// Opens and memory-maps a hive file.
    ///
    /// `codepage` decodes any key or value name stored in the hive's legacy
    /// (non-Unicode) encoding rather than UTF-16LE; callers without a
    /// better-informed choice can pass `encoding_rs::WINDOWS_1252`.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P, codepage: &'static Encoding) -> Result<Self> {
        let source = FileSource::open(path)?;
        Self::new(source, codepage)
    }
}

impl Hive<SliceSource> {
    /// Builds a hive over an already-loaded buffer.
    pub fn from_bytes(data: Vec<u8>, codepage: &'static Encoding) -> Result<Self> {
        Self::new(SliceSource::new(data), codepage)
    }
}

impl<S: ByteSource> Hive<S> {
    /// Builds a hive over an arbitrary [`ByteSource`].
    #[instrument(skip(source, codepage))]
    pub fn new(source: S, codepage: &'static Encoding) -> Result<Self> {
        let header_bytes = source.read_range(0, crate::header::BASE_BLOCK_SIZE)?;
        let base_block = BaseBlock::parse(&header_bytes)?;
        debug!(%base_block, "parsed base block");

        let bins_len = (source.size().saturating_sub(crate::header::BASE_BLOCK_SIZE as u64)) as usize;
        let bins_bytes = source.read_range(crate::header::BASE_BLOCK_SIZE as u64, bins_len)?;
        let bins = BinsIndex::scan(&bins_bytes, base_block.hive_bins_size);

        if base_block.is_corrupted {
            warn!("base block failed checksum/sequence validation");
        }
        if bins.is_corrupted {
            warn!("hive bins list scan stopped early on a malformed bin header");
        }

        Ok(Hive {
            source,
            is_corrupted: StickyFlag::new(base_block.is_corrupted || bins.is_corrupted),
            base_block,
            bins,
            codepage,
            key_cache: RecordCache::default(),
            value_cache: RecordCache::default(),
        })
    }

    /// The parsed base block header.
    pub fn base_block(&self) -> &BaseBlock {
        &self.base_block
    }

    /// The codepage this hive was opened with.
    pub fn codepage(&self) -> &'static Encoding {
        self.codepage
    }

    /// True if any structural damage has been encountered anywhere in this
    /// hive so far: in the header, the bins list, or a cell touched during
    /// navigation. Sticky — once set, never cleared.
    pub fn is_corrupted(&self) -> bool {
        self.is_corrupted.get()
    }

    fn mark_corrupted(&self) {
        self.is_corrupted.set(true);
    }

    fn source_dyn(&self) -> &dyn ByteSource {
        &self.source
    }

    /// The hive's root named key.
    pub fn root_key(&self) -> Result<NamedKey<'_, S>> {
        self.key_at(self.base_block.root_cell_offset)
    }

    fn key_at(&self, offset: u32) -> Result<NamedKey<'_, S>> {
        if let Some(node) = self.key_cache.get(offset) {
            return Ok(NamedKey {
                hive: self,
                offset,
                node,
            });
        }
        let cell = cell_at(self.source_dyn(), &self.bins, offset)?;
        let node = KeyNode::parse(&cell.data, offset, self.codepage, self.base_block.minor_version)?;
        if node.is_corrupted {
            self.mark_corrupted();
        }
        self.key_cache.insert(offset, node.clone());
        Ok(NamedKey {
            hive: self,
            offset,
            node,
        })
    }

    fn value_at(&self, offset: u32) -> Result<ValueItem<'_, S>> {
        if let Some(vk) = self.value_cache.get(offset) {
            return Ok(ValueItem {
                hive: self,
                offset,
                vk,
            });
        }
        let cell = cell_at(self.source_dyn(), &self.bins, offset)?;
        let vk = ValueKey::parse(&cell.data, offset, self.codepage, self.base_block.minor_version)?;
        if vk.is_corrupted {
            self.mark_corrupted();
        }
        self.value_cache.insert(offset, vk.clone());
        Ok(ValueItem {
            hive: self,
            offset,
            vk,
        })
    }

    fn flatten_subkeys(&self, list_offset: u32) -> (Vec<u32>, bool) {
        index::flatten_subkey_offsets(self.source_dyn(), &self.bins, list_offset)
    }

    fn value_offsets(&self, node: &KeyNode) -> Result<Vec<u32>> {
        if node.value_count == 0 || node.value_list_offset == OFFSET_NONE {
            return Ok(Vec::new());
        }
        index::read_value_list(
            self.source_dyn(),
            &self.bins,
            node.value_list_offset,
            node.value_count,
        )
    }
}

/// A named key (`nk` record) plus the hive it was read from.
pub struct NamedKey<'h, S: ByteSource> {
    hive: &'h Hive<S>,
    pub offset: u32,
    node: KeyNode,
}

impl<'h, S: ByteSource> std::fmt::Debug for NamedKey<'h, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedKey")
            .field("offset", &self.offset)
            .field("node", &self.node)
            .finish()
    }
}

impl<'h, S: ByteSource> NamedKey<'h, S> {
    /// The key's decoded name.
    pub fn name(&self) -> std::borrow::Cow<'_, str> {
        self.node.name.decode(self.hive.codepage)
    }

    /// The key's name as stored on disk, undecoded.
    pub fn name_raw(&self) -> &RawName {
        &self.node.name
    }

    pub fn is_root(&self) -> bool {
        self.node.is_root()
    }

    /// Set when this record's own fields needed repair to parse — distinct
    /// from [`Hive::is_corrupted`], which also covers damage elsewhere in
    /// the hive.
    pub fn is_corrupted(&self) -> bool {
        self.node.is_corrupted
    }

    pub fn last_written(&self) -> Option<DateTime<Utc>> {
        crate::header::filetime_to_datetime(self.node.last_written)
    }

    /// The key's class name, if it has one. Class names are always stored
    /// in UTF-16LE regardless of the hive's codepage.
    pub fn class_name(&self) -> Option<String> {
        if !self.node.has_class_name() {
            return None;
        }
        let cell = match cell_at(self.hive.source_dyn(), &self.hive.bins, self.node.class_name_offset) {
            Ok(cell) => cell,
            Err(_) => {
                self.hive.mark_corrupted();
                return None;
            }
        };
        let len = (self.node.class_name_length as usize).min(cell.data.len());
        let (decoded, _, _) = encoding_rs::UTF_16LE.decode(&cell.data[..len]);
        Some(decoded.into_owned())
    }

    /// The key's security descriptor, if it has one.
    pub fn security_descriptor(&self) -> Result<Option<SecurityKey>> {
        if !self.node.has_security_descriptor() {
            return Ok(None);
        }
        let cell = cell_at(self.hive.source_dyn(), &self.hive.bins, self.node.security_offset)?;
        Ok(Some(SecurityKey::parse(&cell.data, self.node.security_offset)?))
    }

    pub fn sub_key_count(&self) -> u32 {
        self.node.subkey_count
    }

    pub fn value_count(&self) -> u32 {
        self.node.value_count
    }

    /// Every immediate sub-key, parsed eagerly. A damaged branch is skipped
    /// and marks [`Hive::is_corrupted`] rather than aborting the whole list.
    pub fn sub_keys(&self) -> Vec<NamedKey<'h, S>> {
        if !self.node.has_subkeys() {
            return Vec::new();
        }
        let (offsets, corrupted) = self.hive.flatten_subkeys(self.node.subkey_list_offset);
        if corrupted {
            self.hive.mark_corrupted();
        }
        let mut keys = Vec::with_capacity(offsets.len());
        for offset in offsets {
            match self.hive.key_at(offset) {
                Ok(key) => keys.push(key),
                Err(_) => self.hive.mark_corrupted(),
            }
        }
        keys
    }

    /// The sub-key at position `index` in traversal order.
    pub fn sub_key_at(&self, index: usize) -> Result<NamedKey<'h, S>> {
        if !self.node.has_subkeys() {
            return Err(RegistryError::InvalidArgument(format!(
                "sub-key index {index} out of range (key has no sub-keys)"
            )));
        }
        let (offsets, corrupted) = self.hive.flatten_subkeys(self.node.subkey_list_offset);
        if corrupted {
            self.hive.mark_corrupted();
        }
        let offset = *offsets
            .get(index)
            .ok_or_else(|| RegistryError::InvalidArgument(format!("sub-key index {index} out of range")))?;
        self.hive.key_at(offset)
    }

    /// Finds a direct sub-key by case-insensitive name.
    pub fn sub_key_by_name(&self, name: &str) -> Result<Option<NamedKey<'h, S>>> {
        if !self.node.has_subkeys() {
            return Ok(None);
        }
        match index::find_subkey_by_name(
            self.hive.source_dyn(),
            &self.hive.bins,
            self.hive.codepage,
            self.hive.base_block.minor_version,
            self.node.subkey_list_offset,
            name,
        )? {
            Some(offset) => Ok(Some(self.hive.key_at(offset)?)),
            None => Ok(None),
        }
    }

    /// Resolves a backslash-separated path relative to this key. Returns
    /// [`RegistryError::NotFound`] rather than `None` when a segment along
    /// the way has no match — see [`index::find_by_path`].
    pub fn sub_key_by_path(&self, path: &str) -> Result<NamedKey<'h, S>> {
        let offset = index::find_by_path(
            self.hive.source_dyn(),
            &self.hive.bins,
            self.hive.codepage,
            self.hive.base_block.minor_version,
            self.offset,
            path,
        )?;
        self.hive.key_at(offset)
    }

    /// Every value on this key, parsed eagerly. A damaged entry is skipped
    /// and marks [`Hive::is_corrupted`].
    pub fn values(&self) -> Result<Vec<ValueItem<'h, S>>> {
        let offsets = self.hive.value_offsets(&self.node)?;
        let mut values = Vec::with_capacity(offsets.len());
        for offset in offsets {
            match self.hive.value_at(offset) {
                Ok(value) => values.push(value),
                Err(_) => self.hive.mark_corrupted(),
            }
        }
        Ok(values)
    }

    /// The value at position `index` in traversal order.
    pub fn value_at(&self, index: usize) -> Result<ValueItem<'h, S>> {
        let offsets = self.hive.value_offsets(&self.node)?;
        let offset = *offsets
            .get(index)
            .ok_or_else(|| RegistryError::InvalidArgument(format!("value index {index} out of range")))?;
        self.hive.value_at(offset)
    }

    /// Finds a value by case-insensitive name. An empty `name` finds the
    /// key's unnamed ("default") value.
    pub fn value_by_name(&self, name: &str) -> Result<Option<ValueItem<'h, S>>> {
        let offsets = self.hive.value_offsets(&self.node)?;
        match index::find_value_by_name(
            self.hive.source_dyn(),
            &self.hive.bins,
            self.hive.codepage,
            self.hive.base_block.minor_version,
            &offsets,
            name,
        )? {
            Some(offset) => Ok(Some(self.hive.value_at(offset)?)),
            None => Ok(None),
        }
    }
}

/// A value key (`vk` record) plus the hive it was read from.
pub struct ValueItem<'h, S: ByteSource> {
    hive: &'h Hive<S>,
    pub offset: u32,
    vk: ValueKey,
}

impl<'h, S: ByteSource> ValueItem<'h, S> {
    pub fn name(&self) -> std::borrow::Cow<'_, str> {
        self.vk.name.decode(self.hive.codepage)
    }

    pub fn name_raw(&self) -> &RawName {
        &self.vk.name
    }

    /// True if this is the key's unnamed ("default") value.
    pub fn is_default(&self) -> bool {
        self.vk.is_default()
    }

    pub fn value_type(&self) -> ValueType {
        self.vk.data_type
    }

    pub fn data_size(&self) -> u32 {
        self.vk.data_size
    }

    pub fn is_corrupted(&self) -> bool {
        self.vk.is_corrupted
    }

    /// Resolves and returns this value's data.
    pub fn read_data(&self) -> Result<ValueData> {
        let resolved = data::resolve(
            self.hive.source_dyn(),
            &self.hive.bins,
            &self.vk,
            self.hive.base_block.minor_version,
        )?;
        if resolved.is_corrupted {
            self.hive.mark_corrupted();
        }
        Ok(resolved)
    }
}
