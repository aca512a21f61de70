//! Core parser infrastructure: token cursor, error reporting, recovery.

use inlet_lexer::token::{Token, TokenKind};
use inlet_types::ast::{Ident, Index};
use inlet_types::{CompileErrors, ErrorCode, ModuleError, SourceFile, Span};

use crate::literal;

/// Maximum nesting of parenthesised forms before the parser gives up.
pub(crate) const MAX_NESTING: u32 = 128;

/// The module text parser.
///
/// Consumes a token stream produced by the lexer and builds a [`Module`].
/// Collects errors and resumes at the next top-level field after each one.
///
/// [`Module`]: inlet_types::ast::Module
pub struct Parser<'src> {
    /// The token stream.
    tokens: Vec<Token>,
    /// Current index into `tokens`.
    pos: usize,
    /// Source file for error context.
    source_file: &'src SourceFile,
    /// File name for error messages.
    file_name: String,
    /// Collected errors.
    errors: CompileErrors,
    /// Current parenthesis nesting depth inside instruction bodies.
    pub(crate) depth: u32,
    /// Imported functions seen so far; they occupy the lowest function indices.
    pub(crate) func_imports: u32,
    /// Imported globals seen so far.
    pub(crate) global_imports: u32,
}

/// Result of parsing.
pub struct ParseResult {
    pub module: Option<inlet_types::ast::Module>,
    pub errors: CompileErrors,
}

impl<'src> Parser<'src> {
    /// Create a new parser from a token stream and source file.
    pub fn new(tokens: Vec<Token>, source_file: &'src SourceFile) -> Self {
        let mut tokens = tokens;
        if tokens.last().map_or(true, |t| t.kind != TokenKind::Eof) {
            tokens.push(Token::new(TokenKind::Eof, Span::point(1, 1)));
        }
        Self {
            tokens,
            pos: 0,
            file_name: source_file.name.clone(),
            source_file,
            errors: CompileErrors::empty(),
            depth: 0,
            func_imports: 0,
            global_imports: 0,
        }
    }

    // ── Token Cursor ──────────────────────────────────────────────────────────

    /// Returns the current token without advancing.
    pub(crate) fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    /// Returns the kind of the current token.
    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    /// Advance the cursor by one and return the consumed token.
    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    /// Returns the previously consumed token's span.
    pub(crate) fn previous_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            Span::point(1, 1)
        }
    }

    /// Returns the span of the current token.
    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }

    /// Returns `true` if the current token is `Eof`.
    pub(crate) fn at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    /// Check if the current token matches the given kind exactly.
    pub(crate) fn check_exact(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    /// If the current token matches, advance and return `true`.
    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check_exact(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Look ahead by `n` tokens from current position.
    pub(crate) fn look_ahead(&self, n: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    /// The current keyword, if the current token is one.
    pub(crate) fn peek_keyword(&self) -> Option<&str> {
        self.peek_kind().keyword()
    }

    /// `true` if the next tokens are `(` followed by the keyword `kw`.
    pub(crate) fn at_open(&self, kw: &str) -> bool {
        self.check_exact(&TokenKind::LParen) && self.look_ahead(1).keyword() == Some(kw)
    }

    /// The keyword following a `(`, if the current token opens a form.
    pub(crate) fn open_keyword(&self) -> Option<&str> {
        if self.check_exact(&TokenKind::LParen) {
            self.look_ahead(1).keyword()
        } else {
            None
        }
    }

    /// Consume `( kw` if present and return the span of the `(`.
    pub(crate) fn eat_open(&mut self, kw: &str) -> Option<Span> {
        if self.at_open(kw) {
            let span = self.advance().span;
            self.advance();
            Some(span)
        } else {
            None
        }
    }

    // ── Expect Helpers ────────────────────────────────────────────────────────

    /// Expect a specific token kind. Returns the token if matched, or emits an error.
    pub(crate) fn expect(&mut self, expected: &TokenKind) -> Option<Token> {
        if self.check_exact(expected) {
            Some(self.advance())
        } else {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expected '{}', got '{}'", expected, self.peek_kind()),
            );
            None
        }
    }

    /// Expect the `)` closing a form opened at `open`. Returns `false` (after
    /// reporting) when the form is not properly closed.
    pub(crate) fn expect_close(&mut self, open: Span, what: &str) -> bool {
        if self.eat(&TokenKind::RParen) {
            return true;
        }
        if self.at_end() {
            self.error_at(
                ErrorCode::UNCLOSED_PAREN,
                format!("unclosed '({what}' opened at {open}"),
                open,
            );
        } else {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expected ')' to close '({what}', got '{}'", self.peek_kind()),
            );
            self.recover_to_close();
        }
        false
    }

    /// Optional `$identifier`.
    pub(crate) fn opt_id(&mut self) -> Option<Ident> {
        match self.peek_kind().clone() {
            TokenKind::Id(name) => {
                let span = self.advance().span;
                Some(Ident::new(name, span))
            }
            _ => None,
        }
    }

    /// Optional index: `$name` or an unsigned integer.
    pub(crate) fn opt_index(&mut self) -> Option<Index> {
        match self.peek_kind().clone() {
            TokenKind::Id(name) => {
                let span = self.advance().span;
                Some(Index::Id(Ident::new(name, span)))
            }
            TokenKind::Number(text) => {
                let span = self.current_span();
                match literal::parse_u32(&text) {
                    Some(n) => {
                        self.advance();
                        Some(Index::Num(n, span))
                    }
                    None => None,
                }
            }
            _ => None,
        }
    }

    /// Required index; reports an error naming `what` when missing.
    pub(crate) fn expect_index(&mut self, what: &str) -> Option<Index> {
        let index = self.opt_index();
        if index.is_none() {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expected {what} index, got '{}'", self.peek_kind()),
            );
        }
        index
    }

    /// Expect a string literal token. Returns the decoded value.
    pub(crate) fn expect_string(&mut self, what: &str) -> Option<String> {
        match self.peek_kind().clone() {
            TokenKind::Str(s) => {
                self.advance();
                Some(s)
            }
            _ => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected {what} string, got '{}'", self.peek_kind()),
                );
                None
            }
        }
    }

    /// Expect a bare `u32` literal.
    pub(crate) fn expect_u32(&mut self, what: &str) -> Option<u32> {
        if let TokenKind::Number(text) = self.peek_kind().clone() {
            if let Some(n) = literal::parse_u32(&text) {
                self.advance();
                return Some(n);
            }
            self.error_at_current(
                ErrorCode::INVALID_NUMBER,
                format!("invalid {what} '{text}'"),
            );
            self.advance();
            return None;
        }
        self.error_at_current(
            ErrorCode::UNEXPECTED_TOKEN,
            format!("expected {what}, got '{}'", self.peek_kind()),
        );
        None
    }

    // ── Error Reporting ───────────────────────────────────────────────────────

    /// Report an error at the current token position.
    pub(crate) fn error_at_current(&mut self, code: ErrorCode, message: impl Into<String>) {
        let span = self.current_span();
        self.error_at(code, message, span);
    }

    /// Report an error at a specific span.
    pub(crate) fn error_at(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let source_line = self
            .source_file
            .line(span.start_line)
            .unwrap_or("")
            .to_string();
        let error = ModuleError::new(&self.file_name, code, message, span, source_line);
        self.errors.push_error(error);
    }

    /// Returns `true` if we've hit the error limit and should stop.
    pub(crate) fn too_many_errors(&self) -> bool {
        self.errors.at_limit()
    }

    // ── Recovery ──────────────────────────────────────────────────────────────

    /// Skip tokens up to and including the `)` that closes the innermost
    /// currently open form.
    pub(crate) fn recover_to_close(&mut self) {
        let mut depth = 0u32;
        while !self.at_end() {
            match self.advance().kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen if depth == 0 => return,
                TokenKind::RParen => depth -= 1,
                _ => {}
            }
        }
    }

    /// Current cursor position, for [`rewind`](Self::rewind).
    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    /// Move the cursor back to a position returned by [`position`](Self::position).
    pub(crate) fn rewind(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Skip one balanced form starting at the current `(`.
    pub(crate) fn skip_form(&mut self) {
        if self.eat(&TokenKind::LParen) {
            self.recover_to_close();
        } else if !self.at_end() {
            self.advance();
        }
    }

    // ── Public API ────────────────────────────────────────────────────────────

    /// Parse the token stream into a [`Module`](inlet_types::ast::Module).
    pub fn parse(mut self) -> ParseResult {
        let module = self.parse_module();
        ParseResult {
            module,
            errors: self.errors,
        }
    }
}
