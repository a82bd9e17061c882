//! Literal quoting and escaping for the raw-text SQL builder.

use skydb_core::Value;

/// Escapes `'`, `\`, and `"` with a backslash. Byte-string literals also
/// escape embedded NUL bytes (as `\0`).
fn escape_literal_body(bytes: &[u8], is_bytes: bool) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'\'' => out.push_str("\\'"),
            b'\\' => out.push_str("\\\\"),
            b'"' => out.push_str("\\\""),
            0 if is_bytes => out.push_str("\\0"),
            _ => out.push(b as char),
        }
    }
    out
}

// Operates in the same "one char per original byte" space that
// `escape_literal_body` writes in: `c as u32 as u8` recovers the original
// byte exactly, regardless of how many UTF-8 bytes that codepoint takes up
// in the `String` that carries it.
fn unescape_literal_body(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('\'') => out.push(b'\''),
                Some('\\') => out.push(b'\\'),
                Some('"') => out.push(b'"'),
                Some('0') => out.push(0),
                Some(other) => out.push(other as u32 as u8),
                None => {}
            }
        } else {
            out.push(c as u32 as u8);
        }
    }
    out
}

/// Encodes a byte-string as a quoted, escaped SQL literal.
pub(crate) fn encode_bytes_literal(bytes: &[u8]) -> String {
    format!("'{}'", escape_literal_body(bytes, true))
}

/// Reverses `encode_bytes_literal`, given the literal *without* its
/// surrounding quotes.
pub(crate) fn decode_bytes_literal(quoted: &str) -> Vec<u8> {
    let inner = quoted.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')).unwrap_or(quoted);
    unescape_literal_body(inner)
}

/// Renders a `Value` as the SQL text the builder should splice into a
/// statement: `NULL` unquoted, everything else single-quoted and escaped.
pub(crate) fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Boolean(b) => if *b { "1".to_string() } else { "0".to_string() },
        Value::I8(v) => v.to_string(),
        Value::I16(v) => v.to_string(),
        Value::I32(v) => v.to_string(),
        Value::I64(v) => v.to_string(),
        Value::I128(v) => v.to_string(),
        Value::U8(v) => v.to_string(),
        Value::U16(v) => v.to_string(),
        Value::U32(v) => v.to_string(),
        Value::U64(v) => v.to_string(),
        Value::U128(v) => v.to_string(),
        Value::F32(v) => v.to_string(),
        Value::F64(v) => v.to_string(),
        Value::Str(s) => format!("'{}'", escape_literal_body(s.as_bytes(), false)),
        Value::Bytes(b) => encode_bytes_literal(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_and_backslashes() {
        let rendered = render_value(&Value::Str("it's a \\test\"".to_string()));
        assert_eq!(rendered, "'it\\'s a \\\\test\\\"'");
    }

    #[test]
    fn bytes_literal_round_trips_modulo_quotes() {
        let original = b"a\0b'c\\d\"e".to_vec();
        let encoded = encode_bytes_literal(&original);
        let decoded = decode_bytes_literal(&encoded);
        assert_eq!(decoded, original);
    }

    #[test]
    fn bytes_literal_round_trips_high_bytes() {
        let original: Vec<u8> = (0u8..=255).collect();
        let encoded = encode_bytes_literal(&original);
        let decoded = decode_bytes_literal(&encoded);
        assert_eq!(decoded, original);
    }

    #[test]
    fn null_renders_unquoted() {
        assert_eq!(render_value(&Value::Null), "NULL");
    }
}
