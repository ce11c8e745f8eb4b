//! Layer D/E shared primitive — case-insensitive Unicode name hashing.
//!
//! Per spec §4.4, the 32-bit name hash is computed by iterating the name's
//! Unicode scalar values in encounter order and folding them into a single
//! accumulator: `hash = hash * 37 + upper(codepoint)`, starting from zero,
//! with unsigned 32-bit wraparound. The same case-folding function is used
//! here and by [`names_equal`] for full-name comparison — Design Note 9
//! warns that using two different folding rules for hashing and comparison
//! silently breaks lookups, so there is exactly one folding function in
//! this crate.
//!
//! Names reach this function in one of four encodings (UTF-16LE bytes, a
//! legacy-codepage byte buffer, a UTF-8 `&str`, or UTF-16 code units); all
//! four must hash identically for the same logical name (spec §8, property
//! 4). The codepage decode happens entirely inside this module — nothing
//! here returns a `String` to a public crate API, honoring spec §6's rule
//! that the core never materializes user-facing strings.

use encoding_rs::Encoding;

/// Folds one Unicode scalar value to its uppercase form for hashing and
/// comparison.
///
/// The on-disk format was built against a single-codepoint-in,
/// single-codepoint-out `towupper`. `char::to_uppercase()` can expand a
/// handful of characters (e.g. dotless-i variants) into multiple scalars;
/// this takes only the first, preserving the one-in-one-out contract the
/// hash accumulator depends on.
pub fn to_upper_scalar(c: char) -> char {
    c.to_uppercase().next().unwrap_or(c)
}

/// Folds an iterator of Unicode scalar values into the §4.4 name hash.
pub fn hash_chars(chars: impl Iterator<Item = char>) -> u32 {
    chars.fold(0u32, |hash, c| {
        hash.wrapping_mul(37).wrapping_add(to_upper_scalar(c) as u32)
    })
}

/// Hashes a name given as UTF-16LE bytes (as stored for non-ASCII
/// named-key and value-key names).
pub fn hash_utf16le(bytes: &[u8]) -> u32 {
    hash_chars(decode_utf16le(bytes))
}

/// Hashes a name given as bytes in the caller-supplied legacy codepage (as
/// stored for ASCII-flagged named-key and value-key names).
pub fn hash_codepage(bytes: &[u8], codepage: &'static Encoding) -> u32 {
    let (decoded, _, _) = codepage.decode(bytes);
    hash_chars(decoded.chars())
}

/// Hashes a name given as a UTF-8 string (the encoding a caller doing a
/// by-name lookup is most likely to already have on hand).
pub fn hash_utf8(s: &str) -> u32 {
    hash_chars(s.chars())
}

/// Hashes a name given as UTF-16 code units.
pub fn hash_utf16_units(units: &[u16]) -> u32 {
    hash_chars(char::decode_utf16(units.iter().copied()).map(|r| r.unwrap_or('\u{FFFD}')))
}

/// Decodes a UTF-16LE byte buffer into a scalar-value iterator, substituting
/// U+FFFD for unpaired surrogates rather than failing — corrupted names must
/// still hash to *something* so lookups over the rest of the hive keep working.
fn decode_utf16le(bytes: &[u8]) -> impl Iterator<Item = char> + '_ {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
    char::decode_utf16(units).map(|r| r.unwrap_or('\u{FFFD}'))
}

/// Compares two raw names for case-insensitive equality using the same
/// folding rule as [`hash_chars`].
///
/// `a` and `b` are each either UTF-16LE bytes (`is_ascii == false`) or
/// codepage bytes (`is_ascii == true`), matching the name-is-ASCII flag
/// stored alongside each name in its own record.
pub fn names_equal(
    a: &[u8],
    a_is_ascii: bool,
    b: &[u8],
    b_is_ascii: bool,
    codepage: &'static Encoding,
) -> bool {
    let iter_a: Box<dyn Iterator<Item = char>> = if a_is_ascii {
        Box::new(codepage.decode(a).0.chars().map(to_upper_scalar).collect::<Vec<_>>().into_iter())
    } else {
        Box::new(decode_utf16le(a).map(to_upper_scalar).collect::<Vec<_>>().into_iter())
    };
    let iter_b: Box<dyn Iterator<Item = char>> = if b_is_ascii {
        Box::new(codepage.decode(b).0.chars().map(to_upper_scalar).collect::<Vec<_>>().into_iter())
    } else {
        Box::new(decode_utf16le(b).map(to_upper_scalar).collect::<Vec<_>>().into_iter())
    };
    iter_a.eq(iter_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn utf16le(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    #[test]
    fn empty_name_hashes_to_zero() {
        assert_eq!(hash_utf16le(&[]), 0);
        assert_eq!(hash_utf8(""), 0);
    }

    #[test]
    fn hash_matches_across_encodings() {
        let name = "Software";
        let via_utf16 = hash_utf16le(&utf16le(name));
        let via_utf8 = hash_utf8(name);
        let via_codepage = hash_codepage(name.as_bytes(), encoding_rs::WINDOWS_1252);
        let via_units: Vec<u16> = name.encode_utf16().collect();
        let via_utf16_units = hash_utf16_units(&via_units);

        assert_eq!(via_utf16, via_utf8);
        assert_eq!(via_utf16, via_codepage);
        assert_eq!(via_utf16, via_utf16_units);
    }

    #[test]
    fn hash_is_case_insensitive() {
        assert_eq!(hash_utf8("SOFTWARE"), hash_utf8("software"));
        assert_eq!(hash_utf8("Software"), hash_utf8("sOfTwArE"));
    }

    #[test]
    fn names_equal_across_ascii_and_utf16_encodings() {
        let ascii = b"Test";
        let utf16 = utf16le("test");
        assert!(names_equal(
            ascii,
            true,
            &utf16,
            false,
            encoding_rs::WINDOWS_1252
        ));
    }

    #[test]
    fn names_equal_rejects_different_names() {
        assert!(!names_equal(
            b"Test",
            true,
            b"Other",
            true,
            encoding_rs::WINDOWS_1252
        ));
    }

    proptest::proptest! {
        #[test]
        fn hash_identity_holds_for_arbitrary_ascii_names(name in "[A-Za-z0-9]{0,32}") {
            let via_utf8 = hash_utf8(&name);
            let via_utf16 = hash_utf16le(&utf16le(&name));
            let via_codepage = hash_codepage(name.as_bytes(), encoding_rs::WINDOWS_1252);
            prop_assert_eq!(via_utf8, via_utf16);
            prop_assert_eq!(via_utf8, via_codepage);
        }
    }
}
