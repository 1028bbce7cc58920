//! Escape sequence decoding for string and character literals.
//!
//! Escapes are introduced by `\` followed by the string's hash count, so
//! `#"…"#` text treats a bare `\n` as two literal characters while `\#n`
//! decodes to a line feed. Interpolation openers (`\{`) are recognized by
//! the scanner before this module runs.

/// Result of decoding one escape sequence.
pub enum Escape {
    /// A decoded character and the byte width consumed (including `\` and
    /// any hashes).
    Char(char, u32),
    /// The sequence is invalid; the width consumed. Callers keep the raw
    /// text and report a diagnostic.
    Invalid(u32),
}

/// Decode the escape starting at `offset` in `text`, where `text[offset]`
/// is the `\` and the escape body begins after `hashes` hash characters.
///
/// Callers have already verified the hash run matches the string's hash
/// count.
pub fn decode_escape(text: &str, offset: usize, hashes: u32) -> Escape {
    let bytes = text.as_bytes();
    // `\` + hashes
    let body = offset + 1 + hashes as usize;
    let Some(&selector) = bytes.get(body) else {
        return Escape::Invalid((1 + hashes) as u32);
    };

    let simple = |c: char| Escape::Char(c, 2 + hashes);
    match selector {
        b'n' => simple('\n'),
        b'r' => simple('\r'),
        b't' => simple('\t'),
        b'0' => simple('\0'),
        b'\\' => simple('\\'),
        b'"' => simple('"'),
        b'\'' => simple('\''),
        b'u' => decode_unicode(bytes, body, hashes),
        _ => Escape::Invalid(2 + hashes),
    }
}

/// Decode `\u{…}` starting with the `u` at `bytes[body]`.
fn decode_unicode(bytes: &[u8], body: usize, hashes: u32) -> Escape {
    let base_width = 2 + hashes; // `\` + hashes + `u`
    if bytes.get(body + 1) != Some(&b'{') {
        return Escape::Invalid(base_width);
    }
    let mut end = body + 2;
    while end < bytes.len() && bytes[end] != b'}' && bytes[end].is_ascii_hexdigit() {
        end += 1;
    }
    if bytes.get(end) != Some(&b'}') || end == body + 2 {
        // Unterminated or empty braces; consume through what was scanned.
        return Escape::Invalid((end - body) as u32 + base_width - 1);
    }
    let digits = std::str::from_utf8(&bytes[body + 2..end]).expect("hex digits are ASCII");
    let width = (end + 1 - body) as u32 + base_width - 1;
    match u32::from_str_radix(digits, 16).ok().and_then(char::from_u32) {
        Some(c) => Escape::Char(c, width),
        None => Escape::Invalid(width),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(text: &str, hashes: u32) -> Option<(char, u32)> {
        match decode_escape(text, 0, hashes) {
            Escape::Char(c, w) => Some((c, w)),
            Escape::Invalid(_) => None,
        }
    }

    #[test]
    fn test_simple_escapes() {
        assert_eq!(decode(r"\n", 0), Some(('\n', 2)));
        assert_eq!(decode(r"\t", 0), Some(('\t', 2)));
        assert_eq!(decode(r"\\", 0), Some(('\\', 2)));
        assert_eq!(decode("\\\"", 0), Some(('"', 2)));
        assert_eq!(decode(r"\0", 0), Some(('\0', 2)));
    }

    #[test]
    fn test_hashed_escape() {
        assert_eq!(decode(r"\#n", 1), Some(('\n', 3)));
        assert_eq!(decode(r"\##t", 2), Some(('\t', 4)));
    }

    #[test]
    fn test_unicode_escape() {
        assert_eq!(decode(r"\u{41}", 0), Some(('A', 6)));
        assert_eq!(decode(r"\u{1F600}", 0), Some(('\u{1F600}', 9)));
    }

    #[test]
    fn test_invalid_escapes() {
        assert!(decode(r"\q", 0).is_none());
        assert!(decode(r"\u{}", 0).is_none());
        assert!(decode(r"\u{D800}", 0).is_none());
        assert!(decode("\\", 0).is_none());
    }
}
