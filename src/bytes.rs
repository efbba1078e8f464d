//! Printable rendering of token byte strings for logs and vocabulary listings.

use std::fmt::Write as _;

/// Renders `bytes` as text, replacing invalid UTF-8 with U+FFFD and escaping control
/// characters as `\u{XXXX}` so a token always prints on a single line.
#[must_use]
pub fn render_token(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let mut rendered = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_control() {
            let _ = write!(rendered, "\\u{{{:04x}}}", u32::from(ch));
        } else {
            rendered.push(ch);
        }
    }
    rendered
}

/// Returns `true` when `bytes` form complete, valid UTF-8.
#[inline]
#[must_use]
pub fn is_complete_utf8(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_characters_are_escaped() {
        assert_eq!(render_token(b"a\nb"), "a\\u{000a}b");
        assert_eq!(render_token(b"\t"), "\\u{0009}");
    }

    #[test]
    fn partial_utf8_renders_replacement() {
        assert_eq!(render_token(&[0xE2, 0x82]), "\u{FFFD}");
        assert_eq!(render_token("é".as_bytes()), "é");
        assert!(!is_complete_utf8(&[0xE2, 0x82]));
        assert!(is_complete_utf8("é".as_bytes()));
    }
}
