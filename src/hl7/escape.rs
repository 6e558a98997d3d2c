//! Escape sequences for leaf values
//!
//! Delimiter characters inside data are written as `\F\` `\S\` `\T\` `\R\`
//! `\E\` (bracketed by the message's own escape character). Line breaks are
//! written as hex sequences `\X0D\` and `\X0A\` so they cannot end a segment.
//! Unknown or unterminated sequences are kept verbatim on unescape.

use super::model::EncodingChars;
use std::borrow::Cow;

/// Escapes every delimiter occurrence in a leaf value
pub fn escape<'a>(value: &'a str, enc: &EncodingChars) -> Cow<'a, str> {
    if !value
        .chars()
        .any(|c| enc.is_delimiter(c) || c == '\r' || c == '\n')
    {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        let code = if c == enc.escape {
            Some("E")
        } else if c == enc.field {
            Some("F")
        } else if c == enc.component {
            Some("S")
        } else if c == enc.subcomponent {
            Some("T")
        } else if c == enc.repetition {
            Some("R")
        } else if c == '\r' {
            Some("X0D")
        } else if c == '\n' {
            Some("X0A")
        } else {
            None
        };

        match code {
            Some(code) => {
                out.push(enc.escape);
                out.push_str(code);
                out.push(enc.escape);
            }
            None => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Reverses [`escape`]
pub fn unescape<'a>(value: &'a str, enc: &EncodingChars) -> Cow<'a, str> {
    if !value.contains(enc.escape) {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find(enc.escape) {
        out.push_str(&rest[..start]);
        let after = &rest[start + enc.escape.len_utf8()..];

        let Some(end) = after.find(enc.escape) else {
            // unterminated: keep the remainder literally
            out.push_str(&rest[start..]);
            return Cow::Owned(out);
        };

        let sequence = &after[..end];
        match decode_sequence(sequence, enc) {
            Some(decoded) => {
                out.push_str(&decoded);
                rest = &after[end + enc.escape.len_utf8()..];
            }
            None => {
                // not a sequence we know; emit the escape char and rescan after it
                out.push(enc.escape);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn decode_sequence(sequence: &str, enc: &EncodingChars) -> Option<String> {
    match sequence {
        "F" => Some(enc.field.to_string()),
        "S" => Some(enc.component.to_string()),
        "T" => Some(enc.subcomponent.to_string()),
        "R" => Some(enc.repetition.to_string()),
        "E" => Some(enc.escape.to_string()),
        _ => decode_hex(sequence.strip_prefix('X')?),
    }
}

fn decode_hex(hex: &str) -> Option<String> {
    if hex.is_empty() || hex.len() % 2 != 0 {
        return None;
    }
    let bytes = (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Smith|Jones", "Smith\\F\\Jones" ; "field separator")]
    #[test_case("A^B", "A\\S\\B" ; "component separator")]
    #[test_case("x~y", "x\\R\\y" ; "repetition separator")]
    #[test_case("R&D", "R\\T\\D" ; "subcomponent separator")]
    #[test_case("C:\\tmp", "C:\\E\\tmp" ; "escape character")]
    #[test_case("line1\rline2", "line1\\X0D\\line2" ; "carriage return")]
    fn test_escape(raw: &str, escaped: &str) {
        let enc = EncodingChars::default();
        assert_eq!(escape(raw, &enc), escaped);
        assert_eq!(unescape(escaped, &enc), raw);
    }

    #[test]
    fn test_plain_values_are_borrowed() {
        let enc = EncodingChars::default();
        assert!(matches!(escape("plain", &enc), Cow::Borrowed(_)));
        assert!(matches!(unescape("plain", &enc), Cow::Borrowed(_)));
    }

    #[test]
    fn test_inverse_for_mixed_delimiters() {
        let enc = EncodingChars::default();
        let values = [
            "|^~\\&",
            "\\\\F\\",
            "a\\b|c^d~e&f",
            "trailing\\",
            "\r\n",
            "\\X41\\",
        ];
        for value in values {
            assert_eq!(unescape(&escape(value, &enc), &enc), value, "value {value:?}");
        }
    }

    #[test]
    fn test_unknown_sequences_kept_verbatim() {
        let enc = EncodingChars::default();
        assert_eq!(unescape("\\H\\bold\\N\\", &enc), "\\H\\bold\\N\\");
        assert_eq!(unescape("open\\F", &enc), "open\\F");
    }

    #[test]
    fn test_hex_sequence() {
        let enc = EncodingChars::default();
        assert_eq!(unescape("\\X4142\\", &enc), "AB");
    }

    #[test]
    fn test_custom_encoding() {
        let enc = EncodingChars::parse("#$%*!").unwrap();
        assert_eq!(escape("a#b$c", &enc), "a*F*b*S*c");
        assert_eq!(unescape("a*F*b*S*c", &enc), "a#b$c");
    }
}
