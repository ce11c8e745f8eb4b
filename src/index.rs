//! Layer E — name- and path-based lookups over the raw record layers.
//!
//! Sub-key lists form a shallow tree: a named key points either directly
//! at a leaf list (`lf`/`lh`/`li`) or at one `ri` record of leaf-list
//! offsets. The format only ever emits one level of `ri` indirection, but
//! a damaged hive could in principle nest them further, so traversal
//! tolerates nesting up to [`MAX_LIST_DEPTH`] before giving up on that
//! branch and marking it corrupted rather than looping forever.

use encoding_rs::Encoding;

use crate::cell::cell_at;
use crate::error::{RegistryError, Result};
use crate::hbin::BinsIndex;
use crate::io::ByteSource;
use crate::key::KeyNode;
use crate::subkey_list::SubkeyList;
use crate::utils::read_u32_le;

/// Maximum levels of `ri`-of-`ri` indirection traversal will follow before
/// treating further nesting as corruption.
const MAX_LIST_DEPTH: u8 = 4;

/// Flattens a named key's sub-key list (following one level of `ri`
/// indirection, or tolerating deeper nesting up to [`MAX_LIST_DEPTH`]) into
/// the hive offsets of its immediate sub-key `nk` records.
///
/// Returns whatever offsets were successfully collected and whether the
/// walk hit damage along the way.
pub fn flatten_subkey_offsets(
    source: &dyn ByteSource,
    bins: &BinsIndex,
    list_offset: u32,
) -> (Vec<u32>, bool) {
    let mut offsets = Vec::new();
    let corrupted = collect(source, bins, list_offset, 0, &mut offsets);
    (offsets, corrupted)
}

fn collect(
    source: &dyn ByteSource,
    bins: &BinsIndex,
    list_offset: u32,
    depth: u8,
    out: &mut Vec<u32>,
) -> bool {
    if depth >= MAX_LIST_DEPTH {
        return true;
    }

    let cell = match cell_at(source, bins, list_offset) {
        Ok(cell) => cell,
        Err(_) => return true,
    };
    let list = match SubkeyList::parse(&cell.data, list_offset) {
        Ok(list) => list,
        Err(_) => return true,
    };

    if list.is_indirect() {
        let mut corrupted = false;
        for sub_offset in list.offsets() {
            corrupted |= collect(source, bins, sub_offset, depth + 1, out);
        }
        corrupted
    } else {
        out.extend(list.offsets());
        false
    }
}

/// Finds a direct sub-key of `parent` by case-insensitive name, parsing
/// each candidate `nk` record only as needed.
pub fn find_subkey_by_name(
    source: &dyn ByteSource,
    bins: &BinsIndex,
    codepage: &'static Encoding,
    minor_version: u32,
    list_offset: u32,
    name: &str,
) -> Result<Option<u32>> {
    let (offsets, _) = flatten_subkey_offsets(source, bins, list_offset);
    let target_hash = crate::hash::hash_utf8(name);

    for key_offset in offsets {
        let cell = match cell_at(source, bins, key_offset) {
            Ok(cell) => cell,
            Err(_) => continue,
        };
        let key = match KeyNode::parse(&cell.data, key_offset, codepage, minor_version) {
            Ok(key) => key,
            Err(_) => continue,
        };
        if key.name.hash != 0 && target_hash != 0 && key.name.hash != target_hash {
            continue;
        }
        if key.name.matches_str(name, codepage) {
            return Ok(Some(key_offset));
        }
    }
    Ok(None)
}

/// Resolves a backslash-separated path (`"Software\Vendor\Product"`)
/// relative to `root_offset`, returning the final key's hive offset.
///
/// A single leading separator is ignored (`"\Software"` behaves like
/// `"Software"`); an empty path segment anywhere else (`"A\\B"`, a
/// trailing `"\"`) aborts the lookup with
/// [`RegistryError::InvalidArgument`], since it names no real key. A
/// segment that legitimately has no match fails the whole lookup with
/// [`RegistryError::NotFound`] rather than returning `None`, since a
/// caller asking for one specific path wants to know their answer didn't
/// resolve rather than silently get nothing back.
pub fn find_by_path(
    source: &dyn ByteSource,
    bins: &BinsIndex,
    codepage: &'static Encoding,
    minor_version: u32,
    root_offset: u32,
    path: &str,
) -> Result<u32> {
    let trimmed = path.strip_prefix('\\').unwrap_or(path);
    if trimmed.is_empty() {
        return Ok(root_offset);
    }

    let mut current = root_offset;
    for segment in trimmed.split('\\') {
        if segment.is_empty() {
            return Err(RegistryError::InvalidArgument(
                "path contains an empty segment".into(),
            ));
        }

        let cell = cell_at(source, bins, current)?;
        let key = KeyNode::parse(&cell.data, current, codepage, minor_version)?;
        match find_subkey_by_name(
            source,
            bins,
            codepage,
            minor_version,
            key.subkey_list_offset,
            segment,
        )? {
            Some(next) => current = next,
            None => return Err(RegistryError::not_found("key", segment)),
        }
    }
    Ok(current)
}

/// Reads a key's value list: a flat array of `vk` cell offsets, with no
/// record tag of its own.
pub fn read_value_list(
    source: &dyn ByteSource,
    bins: &BinsIndex,
    list_offset: u32,
    count: u32,
) -> Result<Vec<u32>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let cell = cell_at(source, bins, list_offset)?;
    let expected = count as usize * 4;
    let table = cell.data.get(..expected).ok_or_else(|| {
        RegistryError::corrupted_record(
            list_offset,
            format!(
                "value list truncated: need {expected} bytes, have {}",
                cell.data.len()
            ),
        )
    })?;
    Ok(table
        .chunks_exact(4)
        .map(|chunk| read_u32_le(chunk, 0).unwrap())
        .collect())
}

/// Finds a value by case-insensitive name among `value_offsets`, returning
/// its hive offset. An empty `name` matches the key's unnamed ("default")
/// value.
pub fn find_value_by_name(
    source: &dyn ByteSource,
    bins: &BinsIndex,
    codepage: &'static Encoding,
    minor_version: u32,
    value_offsets: &[u32],
    name: &str,
) -> Result<Option<u32>> {
    use crate::value::ValueKey;

    let target_hash = crate::hash::hash_utf8(name);
    for &value_offset in value_offsets {
        let cell = match cell_at(source, bins, value_offset) {
            Ok(cell) => cell,
            Err(_) => continue,
        };
        let value = match ValueKey::parse(&cell.data, value_offset, codepage, minor_version) {
            Ok(value) => value,
            Err(_) => continue,
        };
        if name.is_empty() {
            if value.is_default() {
                return Ok(Some(value_offset));
            }
            continue;
        }
        if value.name.hash != 0 && target_hash != 0 && value.name.hash != target_hash {
            continue;
        }
        if value.name.matches_str(name, codepage) {
            return Ok(Some(value_offset));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::SliceSource;

    const CP: &'static Encoding = encoding_rs::WINDOWS_1252;

    fn put_cell(bin: &mut [u8], offset: u32, payload: &[u8]) {
        let start = offset as usize;
        let size: i32 = -(4 + payload.len() as i32);
        bin[start..start + 4].copy_from_slice(&size.to_le_bytes());
        bin[start + 4..start + 4 + payload.len()].copy_from_slice(payload);
    }

    fn nk_bytes(name: &[u8], subkey_list_offset: u32, value_count: u32, value_list_offset: u32) -> Vec<u8> {
        let mut data = vec![0u8; 0x4C + name.len()];
        data[0..2].copy_from_slice(b"nk");
        data[0x10..0x14].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        data[0x1C..0x20].copy_from_slice(&subkey_list_offset.to_le_bytes());
        data[0x24..0x28].copy_from_slice(&value_count.to_le_bytes());
        data[0x28..0x2C].copy_from_slice(&value_list_offset.to_le_bytes());
        data[0x2C..0x30].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        data[0x30..0x34].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        data[0x48..0x4A].copy_from_slice(&(name.len() as u16).to_le_bytes());
        data[0x4C..].copy_from_slice(name);
        data
    }

    fn li_bytes(offsets: &[u32]) -> Vec<u8> {
        let mut data = vec![b'l', b'i'];
        data.extend_from_slice(&(offsets.len() as u16).to_le_bytes());
        for o in offsets {
            data.extend_from_slice(&o.to_le_bytes());
        }
        data
    }

    fn vk_bytes(name: &[u8], value_type: u32) -> Vec<u8> {
        let mut data = vec![0u8; 0x14 + name.len()];
        data[0..2].copy_from_slice(b"vk");
        data[0x02..0x04].copy_from_slice(&(name.len() as u16).to_le_bytes());
        data[0x04..0x08].copy_from_slice(&4i32.to_le_bytes()); // external, size 4
        data[0x08..0x0C].copy_from_slice(&0x900u32.to_le_bytes());
        data[0x0C..0x10].copy_from_slice(&value_type.to_le_bytes());
        data[0x10..0x12].copy_from_slice(&1u16.to_le_bytes()); // ascii name
        data[0x14..].copy_from_slice(name);
        data
    }

    /// Builds a one-bin hive: root "ROOT" at 0x20 with one sub-key
    /// "Software" at 0x80 (reached through an `li` list at 0xE0), and a
    /// value "Ver" on the child reached through a value list at 0x100.
    fn sample_hive() -> (Vec<u8>, BinsIndex) {
        let mut bin = vec![0u8; 0x1000];
        bin[0..4].copy_from_slice(b"hbin");
        bin[0x08..0x0C].copy_from_slice(&0x1000u32.to_le_bytes());

        put_cell(&mut bin, 0x20, &nk_bytes(b"ROOT", 0xE0, 0, 0xFFFF_FFFF));
        put_cell(&mut bin, 0x80, &nk_bytes(b"Software", 0xFFFF_FFFF, 1, 0x100));
        put_cell(&mut bin, 0xE0, &li_bytes(&[0x80]));
        put_cell(&mut bin, 0x100, &0x120u32.to_le_bytes());
        put_cell(&mut bin, 0x120, &vk_bytes(b"Ver", 1));

        let bins = BinsIndex::scan(&bin, bin.len() as u32);
        let mut data = vec![0u8; 0x1000];
        data.extend_from_slice(&bin);
        (data, bins)
    }

    #[test]
    fn finds_direct_subkey_by_case_insensitive_name() {
        let (data, bins) = sample_hive();
        let source = SliceSource::new(data);
        let found = find_subkey_by_name(&source, &bins, CP, 5, 0xE0, "software").unwrap();
        assert_eq!(found, Some(0x80));
    }

    #[test]
    fn resolves_nested_path_from_root() {
        let (data, bins) = sample_hive();
        let source = SliceSource::new(data);
        let found = find_by_path(&source, &bins, CP, 5, 0x20, "Software").unwrap();
        assert_eq!(found, 0x80);
    }

    #[test]
    fn leading_separator_is_ignored() {
        let (data, bins) = sample_hive();
        let source = SliceSource::new(data);
        let found = find_by_path(&source, &bins, CP, 5, 0x20, "\\Software").unwrap();
        assert_eq!(found, 0x80);
    }

    #[test]
    fn missing_path_segment_is_not_found() {
        let (data, bins) = sample_hive();
        let source = SliceSource::new(data);
        let err = find_by_path(&source, &bins, CP, 5, 0x20, "Hardware").unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[test]
    fn empty_path_segment_is_rejected() {
        let (data, bins) = sample_hive();
        let source = SliceSource::new(data);
        let err = find_by_path(&source, &bins, CP, 5, 0x20, "Software\\\\Vendor").unwrap_err();
        assert!(matches!(err, RegistryError::InvalidArgument(_)));
    }

    #[test]
    fn reads_value_list_and_finds_value_by_name() {
        let (data, bins) = sample_hive();
        let source = SliceSource::new(data);
        let offsets = read_value_list(&source, &bins, 0x100, 1).unwrap();
        assert_eq!(offsets, vec![0x120]);
        let found = find_value_by_name(&source, &bins, CP, 5, &offsets, "ver").unwrap();
        assert_eq!(found, Some(0x120));
    }

    #[test]
    fn missing_subkey_returns_none() {
        let (data, bins) = sample_hive();
        let source = SliceSource::new(data);
        let found = find_subkey_by_name(&source, &bins, CP, 5, 0xE0, "Hardware").unwrap();
        assert_eq!(found, None);
    }
}
