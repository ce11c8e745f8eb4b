//! Layer D/F — `REG_MULTI_SZ` decoding.
//!
//! A multi-string value is a run of NUL-terminated UTF-16LE strings, itself
//! terminated by an extra empty string (i.e. two consecutive NULs). Per
//! spec §4.5 / scenario S4, a buffer missing that final terminator is not
//! fatal: every complete string up to the point the data ran out is still
//! returned, with the owning value marked corrupted.

/// Decodes a `REG_MULTI_SZ` byte buffer into its component strings.
///
/// Returns the decoded strings and whether the buffer was well-formed
/// (ended with an empty-string terminator, or was empty to begin with).
pub fn decode(data: &[u8]) -> (Vec<String>, bool) {
    let units: Vec<u16> = data
        .chunks(2)
        .map(|chunk| {
            if chunk.len() == 2 {
                u16::from_le_bytes([chunk[0], chunk[1]])
            } else {
                // Odd trailing byte: not a valid UTF-16LE code unit.
                u16::from(chunk[0])
            }
        })
        .collect();

    // Splits on NUL code units; the final token is only "terminated" (i.e.
    // trustworthy as the format's trailing empty-string marker) if the data
    // actually ended with a NUL rather than running out mid-token.
    let mut tokens: Vec<&[u16]> = Vec::new();
    let mut pos = 0usize;
    let mut terminated = true;
    while pos < units.len() {
        match units[pos..].iter().position(|&u| u == 0) {
            Some(rel_idx) => {
                tokens.push(&units[pos..pos + rel_idx]);
                pos += rel_idx + 1;
                terminated = true;
            }
            None => {
                tokens.push(&units[pos..]);
                pos = units.len();
                terminated = false;
            }
        }
    }

    let well_formed = terminated && tokens.last().map_or(true, |t| t.is_empty());
    let keep = if well_formed && !tokens.is_empty() {
        tokens.len() - 1
    } else {
        tokens.len()
    };

    let strings = tokens[..keep]
        .iter()
        .map(|unit_run| String::from_utf16_lossy(unit_run))
        .collect();

    (strings, well_formed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16le(strings: &[&str]) -> Vec<u8> {
        let mut out = Vec::new();
        for s in strings {
            out.extend(s.encode_utf16().flat_map(|u| u.to_le_bytes()));
            out.extend([0u8, 0u8]);
        }
        out.extend([0u8, 0u8]);
        out
    }

    #[test]
    fn decodes_well_formed_multi_string() {
        let data = utf16le(&["Alpha", "Beta", "Gamma"]);
        let (strings, well_formed) = decode(&data);
        assert_eq!(strings, vec!["Alpha", "Beta", "Gamma"]);
        assert!(well_formed);
    }

    #[test]
    fn empty_buffer_decodes_to_empty_list() {
        let (strings, well_formed) = decode(&[]);
        assert!(strings.is_empty());
        assert!(well_formed);
    }

    #[test]
    fn missing_final_terminator_recovers_partial_list() {
        let mut data = utf16le(&["Alpha", "Beta"]);
        data.truncate(data.len() - 2); // drop the terminator's trailing NUL
        let (strings, well_formed) = decode(&data);
        assert_eq!(strings, vec!["Alpha", "Beta"]);
        assert!(!well_formed);
    }

    #[test]
    fn single_string_without_any_terminator_is_recovered() {
        let data: Vec<u8> = "NoTerminator".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        let (strings, well_formed) = decode(&data);
        assert_eq!(strings, vec!["NoTerminator"]);
        assert!(!well_formed);
    }
}
