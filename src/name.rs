//! The `RawName` type — the crate's answer to "names never become a
//! `String` below layer E" (spec §6).
//!
//! Named keys and values each store their name either as a caller-codepage
//! byte string (the `COMP_NAME` flag) or as UTF-16LE, plus a precomputed
//! 32-bit hash. Decoding either form eagerly at parse time would force a
//! choice of encoding before anyone asked for one, and would make every
//! parsed record carry an allocation it might never need (most traversal
//! code only compares hashes or offsets). [`RawName`] keeps the bytes and
//! the hash and defers decoding to whoever actually needs a displayable
//! string — normally the index and public-API layers.

use std::borrow::Cow;

use encoding_rs::Encoding;

use crate::hash;

/// A key or value name as stored on disk: raw bytes, an encoding flag, and
/// a hash computed once at parse time.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawName {
    pub bytes: Vec<u8>,
    /// `true` if `bytes` is in the hive's codepage; `false` if UTF-16LE.
    pub is_ascii: bool,
    pub hash: u32,
}

impl RawName {
    /// Builds a `RawName` from its on-disk bytes, hashing it immediately
    /// against `codepage` (only consulted when `is_ascii` is set).
    pub fn new(bytes: Vec<u8>, is_ascii: bool, codepage: &'static Encoding) -> Self {
        let hash = if is_ascii {
            hash::hash_codepage(&bytes, codepage)
        } else {
            hash::hash_utf16le(&bytes)
        };
        RawName {
            bytes,
            is_ascii,
            hash,
        }
    }

    /// An empty name (used for corrupted records that could not be parsed).
    pub fn empty() -> Self {
        RawName {
            bytes: Vec::new(),
            is_ascii: true,
            hash: 0,
        }
    }

    /// Decodes the name to a displayable string, replacing undecodable
    /// sequences rather than failing.
    pub fn decode(&self, codepage: &'static Encoding) -> Cow<'_, str> {
        if self.is_ascii {
            codepage.decode(&self.bytes).0
        } else {
            encoding_rs::UTF_16LE.decode(&self.bytes).0
        }
    }

    /// Case-insensitive comparison against a UTF-8 string, using the same
    /// folding rule as the name hash.
    pub fn matches_str(&self, other: &str, codepage: &'static Encoding) -> bool {
        let decoded = self.decode(codepage);
        hash::hash_chars(decoded.chars()) == hash::hash_utf8(other)
            && decoded.chars().map(hash::to_upper_scalar).eq(other.chars().map(hash::to_upper_scalar))
    }

    /// Case-insensitive comparison against another raw name.
    pub fn matches(&self, other: &RawName, codepage: &'static Encoding) -> bool {
        if self.hash != 0 && other.hash != 0 && self.hash != other.hash {
            return false;
        }
        hash::names_equal(
            &self.bytes,
            self.is_ascii,
            &other.bytes,
            other.is_ascii,
            codepage,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CP: &'static Encoding = encoding_rs::WINDOWS_1252;

    #[test]
    fn ascii_name_decodes_and_hashes() {
        let name = RawName::new(b"Software".to_vec(), true, CP);
        assert_eq!(name.decode(CP), "Software");
        assert_eq!(name.hash, hash::hash_utf8("Software"));
    }

    #[test]
    fn utf16_name_decodes_and_hashes() {
        let utf16: Vec<u8> = "Soft\u{00e9}".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        let name = RawName::new(utf16, false, CP);
        assert_eq!(name.decode(CP), "Soft\u{00e9}");
    }

    #[test]
    fn matches_str_is_case_insensitive() {
        let name = RawName::new(b"SOFTWARE".to_vec(), true, CP);
        assert!(name.matches_str("software", CP));
        assert!(!name.matches_str("hardware", CP));
    }

    #[test]
    fn matches_compares_across_encodings() {
        let ascii = RawName::new(b"Test".to_vec(), true, CP);
        let utf16: Vec<u8> = "test".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        let other = RawName::new(utf16, false, CP);
        assert!(ascii.matches(&other, CP));
    }
}
