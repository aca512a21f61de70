//! Token types for the module text lexer.
//!
//! The grammar is S-expression based, so the token set is small: parentheses,
//! keywords, `$identifiers`, strings and numbers. Numbers keep their source
//! text; the parser interprets them against the type the context expects.

use inlet_types::Span;
use std::fmt;

/// A single token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// Bare word starting with a lowercase letter: `module`, `i32.add`, `nan:0x1`.
    Keyword(String),
    /// `$name` (stored without the `$`).
    Id(String),
    /// Decoded string literal.
    Str(String),
    /// Numeric literal text, sign and underscores included: `-0x1_0`, `1.5e3`.
    Number(String),
    /// End of input.
    Eof,
}

impl TokenKind {
    /// The keyword text, if this is a keyword.
    pub fn keyword(&self) -> Option<&str> {
        match self {
            TokenKind::Keyword(k) => Some(k),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Keyword(k) => write!(f, "{k}"),
            TokenKind::Id(id) => write!(f, "${id}"),
            TokenKind::Str(s) => write!(f, "\"{}\"", s.escape_default()),
            TokenKind::Number(n) => write!(f, "{n}"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

/// Characters allowed in keywords, identifiers and numbers.
pub fn is_idchar(ch: u8) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            b'!' | b'#'
                | b'$'
                | b'%'
                | b'&'
                | b'\''
                | b'*'
                | b'+'
                | b'-'
                | b'.'
                | b'/'
                | b':'
                | b'<'
                | b'='
                | b'>'
                | b'?'
                | b'@'
                | b'\\'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~'
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(TokenKind::Id("box".into()).to_string(), "$box");
        assert_eq!(TokenKind::Str("a\"b".into()).to_string(), "\"a\\\"b\"");
        assert_eq!(TokenKind::Eof.to_string(), "end of input");
    }

    #[test]
    fn test_idchars() {
        assert!(is_idchar(b'$'));
        assert!(is_idchar(b'.'));
        assert!(!is_idchar(b'('));
        assert!(!is_idchar(b'"'));
        assert!(!is_idchar(b';'));
        assert!(!is_idchar(b' '));
    }
}
