//! Percent-escaping for the shareable configuration string.
//!
//! Links produced by earlier versions must keep working, so the escaping
//! rules are exactly those of ECMAScript `encodeURI` / `decodeURI`.

use crate::error::{EditError, HashError};

/// Joins the fields of a serialized emitter or attractor.
pub const FIELD_SEPARATOR: &str = "_";

/// Rejects user text that would split into extra fields once serialized.
pub fn check_field_text(field: &str, text: &str) -> Result<(), EditError> {
    if text.contains(FIELD_SEPARATOR) {
        return Err(EditError::ReservedSeparator {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Characters `decodeURI` refuses to unescape.
const RESERVED: &[u8] = b";/?:@&=+$,#";

/// Characters `encodeURI` passes through besides ASCII alphanumerics.
const UNESCAPED_MARKS: &[u8] = b"-_.!~*'()";

fn passes_through(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || UNESCAPED_MARKS.contains(&byte) || RESERVED.contains(&byte)
}

/// Escapes every byte of the UTF-8 encoding outside the URI character set.
pub fn encode_uri(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for &byte in input.as_bytes() {
        if passes_through(byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Reverses [`encode_uri`]. Escapes of reserved characters stay escaped.
pub fn decode_uri(input: &str) -> Result<String, HashError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'%' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }

        let hi = bytes.get(i + 1).copied().and_then(hex_value);
        let lo = bytes.get(i + 2).copied().and_then(hex_value);
        let (Some(hi), Some(lo)) = (hi, lo) else {
            return Err(HashError::MalformedEscape(i));
        };
        let decoded = hi << 4 | lo;

        if RESERVED.contains(&decoded) {
            out.extend_from_slice(&bytes[i..i + 3]);
        } else {
            out.push(decoded);
        }
        i += 3;
    }

    String::from_utf8(out).map_err(|_| HashError::InvalidUtf8)
}
