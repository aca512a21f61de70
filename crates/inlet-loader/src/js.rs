//! Script literal helpers.

use std::fmt::Write;

/// A double-quoted script string literal.
///
/// JSON string syntax is valid script syntax; `</` is additionally escaped so
/// the literal can never close an enclosing script element.
pub fn js_string(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    quoted.replace("</", "<\\/")
}

/// Comma-separated two-digit hex bytes: `0x00, 0x61, 0x73, 0x6d`.
pub fn byte_array_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 6);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "0x{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escapes() {
        assert_eq!(js_string("add"), "\"add\"");
        assert_eq!(js_string("a\"b\\c\n"), "\"a\\\"b\\\\c\\n\"");
        assert_eq!(js_string("</script>"), "\"<\\/script>\"");
    }

    #[test]
    fn test_byte_array_literal() {
        assert_eq!(byte_array_literal(b"\0asm"), "0x00, 0x61, 0x73, 0x6d");
        assert_eq!(byte_array_literal(&[]), "");
        assert_eq!(byte_array_literal(&[0xff]), "0xff");
    }
}
