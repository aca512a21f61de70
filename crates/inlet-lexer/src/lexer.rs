//! Module text lexer: converts source text to a token stream.
//!
//! Features:
//! - Parentheses, keywords, `$identifiers`, strings, numbers
//! - Line comments (`;;`) and nested block comments (`(; ... ;)`)
//! - Error recovery: collects up to 20 errors instead of stopping at the first
//!
//! Every scanning step consumes at least one byte, so malformed input always
//! reaches [`TokenKind::Eof`].

use inlet_types::{CompileErrors, ErrorCode, ModuleError, SourceFile, Span};

use crate::token::{is_idchar, Token, TokenKind};

/// The module text lexer.
pub struct Lexer<'src> {
    source: &'src [u8],
    source_file: &'src SourceFile,
    /// Current byte offset into `source`.
    pos: usize,
    /// Current line number (1-based).
    line: u32,
    /// Current column number (1-based).
    col: u32,
    errors: CompileErrors,
}

/// Result of lexing: tokens + any errors collected.
pub struct LexResult {
    /// The token stream (always ends with [`TokenKind::Eof`]).
    pub tokens: Vec<Token>,
    pub errors: CompileErrors,
}

impl<'src> Lexer<'src> {
    pub fn new(source_file: &'src SourceFile) -> Self {
        Self {
            source: source_file.source.as_bytes(),
            source_file,
            pos: 0,
            line: 1,
            col: 1,
            errors: CompileErrors::empty(),
        }
    }

    /// Lex the entire source file into a token stream.
    pub fn lex(mut self) -> LexResult {
        let mut tokens = Vec::new();
        loop {
            if self.errors.at_limit() {
                break;
            }
            let token = self.scan();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        if tokens.last().map_or(true, |t| t.kind != TokenKind::Eof) {
            tokens.push(Token::new(TokenKind::Eof, self.current_span()));
        }
        LexResult {
            tokens,
            errors: self.errors,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Character-level helpers
    // ─────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.source.get(self.pos).copied()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn current_span(&self) -> Span {
        Span::point(self.line, self.col)
    }

    fn span_from(&self, start_line: u32, start_col: u32) -> Span {
        Span::new(
            start_line,
            start_col,
            self.line,
            self.col.saturating_sub(1).max(1),
        )
    }

    fn emit_error(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let source_line = self
            .source_file
            .line(span.start_line)
            .unwrap_or("")
            .to_string();
        let err = ModuleError::new(&self.source_file.name, code, message, span, source_line);
        self.errors.push_error(err);
    }

    // ─────────────────────────────────────────────────────────────
    // Whitespace & comments
    // ─────────────────────────────────────────────────────────────

    /// Skip whitespace and comments. Returns once the next byte starts a token.
    fn skip_trivia(&mut self) {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(b' ' | b'\t' | b'\n' | b'\r'), _) => {
                    self.advance();
                }
                (Some(b';'), Some(b';')) => {
                    while let Some(ch) = self.peek() {
                        if ch == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                (Some(b'('), Some(b';')) => self.skip_block_comment(),
                _ => return,
            }
        }
    }

    /// Skip a (possibly nested) `(; ... ;)` comment.
    fn skip_block_comment(&mut self) {
        let start_line = self.line;
        let start_col = self.col;
        self.advance();
        self.advance();
        let mut depth = 1u32;
        while depth > 0 {
            match (self.peek(), self.peek_at(1)) {
                (None, _) => {
                    let span = self.span_from(start_line, start_col);
                    self.emit_error(
                        ErrorCode::UNTERMINATED_COMMENT,
                        "unterminated block comment",
                        span,
                    );
                    return;
                }
                (Some(b'('), Some(b';')) => {
                    self.advance();
                    self.advance();
                    depth += 1;
                }
                (Some(b';'), Some(b')')) => {
                    self.advance();
                    self.advance();
                    depth -= 1;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Token scanning
    // ─────────────────────────────────────────────────────────────

    /// Scan the next token. Bytes that cannot start a token are reported and
    /// skipped.
    fn scan(&mut self) -> Token {
        loop {
            if let Some(token) = self.scan_one() {
                return token;
            }
            if self.errors.at_limit() {
                return Token::new(TokenKind::Eof, self.current_span());
            }
        }
    }

    fn scan_one(&mut self) -> Option<Token> {
        self.skip_trivia();

        let start_line = self.line;
        let start_col = self.col;
        let start = self.pos;

        let Some(ch) = self.advance() else {
            return Some(Token::new(TokenKind::Eof, self.current_span()));
        };

        match ch {
            b'(' => Some(Token::new(
                TokenKind::LParen,
                self.span_from(start_line, start_col),
            )),
            b')' => Some(Token::new(
                TokenKind::RParen,
                self.span_from(start_line, start_col),
            )),
            b'"' => Some(self.scan_string(start_line, start_col)),
            _ if is_idchar(ch) => {
                while self.peek().is_some_and(is_idchar) {
                    self.advance();
                }
                let span = self.span_from(start_line, start_col);
                // idchars are ASCII, so the slice is valid UTF-8.
                let text = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
                self.classify_word(text, span)
            }
            _ => {
                // Skip the whole UTF-8 sequence so the column stays sensible.
                while self.peek().is_some_and(|b| b & 0xC0 == 0x80) {
                    self.advance();
                }
                let span = self.span_from(start_line, start_col);
                let shown = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
                self.emit_error(
                    ErrorCode::UNEXPECTED_CHARACTER,
                    format!("unexpected character '{shown}'"),
                    span,
                );
                None
            }
        }
    }

    fn classify_word(&mut self, text: String, span: Span) -> Option<Token> {
        let kind = match text.as_bytes()[0] {
            b'$' if text.len() > 1 => TokenKind::Id(text[1..].to_string()),
            b'a'..=b'z' => TokenKind::Keyword(text),
            b'0'..=b'9' | b'+' | b'-' => TokenKind::Number(text),
            _ => {
                self.emit_error(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("unexpected token '{text}'"),
                    span,
                );
                return None;
            }
        };
        Some(Token::new(kind, span))
    }

    /// Scan a string literal after the opening `"`.
    fn scan_string(&mut self, start_line: u32, start_col: u32) -> Token {
        let mut buf: Vec<u8> = Vec::new();
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    let span = self.span_from(start_line, start_col);
                    self.emit_error(
                        ErrorCode::UNTERMINATED_STRING,
                        "unterminated string literal",
                        span,
                    );
                    break;
                }
                Some(b'"') => {
                    self.advance();
                    break;
                }
                Some(b'\\') => self.scan_escape(&mut buf),
                Some(ch) => {
                    self.advance();
                    buf.push(ch);
                }
            }
        }
        let span = self.span_from(start_line, start_col);
        let text = match String::from_utf8(buf) {
            Ok(text) => text,
            Err(e) => {
                self.emit_error(
                    ErrorCode::INVALID_ESCAPE,
                    "string literal is not valid UTF-8",
                    span,
                );
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };
        Token::new(TokenKind::Str(text), span)
    }

    /// Decode one escape sequence starting at `\`.
    fn scan_escape(&mut self, buf: &mut Vec<u8>) {
        let start_line = self.line;
        let start_col = self.col;
        self.advance();
        match self.advance() {
            Some(b'n') => buf.push(b'\n'),
            Some(b't') => buf.push(b'\t'),
            Some(b'r') => buf.push(b'\r'),
            Some(b'"') => buf.push(b'"'),
            Some(b'\'') => buf.push(b'\''),
            Some(b'\\') => buf.push(b'\\'),
            Some(b'u') if self.peek() == Some(b'{') => {
                self.advance();
                let mut value: u32 = 0;
                let mut digits = 0;
                while let Some(d) = self.peek().and_then(|c| (c as char).to_digit(16)) {
                    self.advance();
                    value = value.saturating_mul(16).saturating_add(d);
                    digits += 1;
                }
                let closed = self.peek() == Some(b'}');
                if closed {
                    self.advance();
                }
                match char::from_u32(value).filter(|_| closed && digits > 0) {
                    Some(c) => {
                        let mut tmp = [0u8; 4];
                        buf.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
                    }
                    None => {
                        let span = self.span_from(start_line, start_col);
                        self.emit_error(
                            ErrorCode::INVALID_ESCAPE,
                            "invalid unicode escape",
                            span,
                        );
                    }
                }
            }
            Some(hi) if hi.is_ascii_hexdigit() => {
                match self.peek().filter(u8::is_ascii_hexdigit) {
                    Some(lo) => {
                        self.advance();
                        let hex = [hi, lo];
                        // Both bytes are ASCII hex digits.
                        let text = std::str::from_utf8(&hex).unwrap_or("00");
                        buf.push(u8::from_str_radix(text, 16).unwrap_or(0));
                    }
                    None => {
                        let span = self.span_from(start_line, start_col);
                        self.emit_error(
                            ErrorCode::INVALID_ESCAPE,
                            "byte escape needs two hex digits",
                            span,
                        );
                    }
                }
            }
            Some(other) => {
                let span = self.span_from(start_line, start_col);
                self.emit_error(
                    ErrorCode::INVALID_ESCAPE,
                    format!("invalid escape sequence '\\{}'", other as char),
                    span,
                );
            }
            None => {
                let span = self.span_from(start_line, start_col);
                self.emit_error(
                    ErrorCode::UNTERMINATED_STRING,
                    "unexpected end of input in escape sequence",
                    span,
                );
            }
        }
    }
}
