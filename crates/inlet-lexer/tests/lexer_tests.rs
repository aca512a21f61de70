//! Lexer tests for module text.
//!
//! Covers: parentheses, keywords, identifiers, numbers, string escapes,
//! line and nested block comments, error recovery, guaranteed termination
//! on malformed input, and the 100-iteration determinism test.

use inlet_lexer::{Lexer, TokenKind};
use inlet_types::{ErrorCode, SourceFile};

// ─────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────

/// Lex source text and return just the token kinds (excluding final Eof).
fn kinds(source: &str) -> Vec<TokenKind> {
    let sf = SourceFile::new("test.wat", source);
    Lexer::new(&sf)
        .lex()
        .tokens
        .into_iter()
        .filter(|t| t.kind != TokenKind::Eof)
        .map(|t| t.kind)
        .collect()
}

fn error_codes(source: &str) -> Vec<ErrorCode> {
    let sf = SourceFile::new("test.wat", source);
    Lexer::new(&sf)
        .lex()
        .errors
        .errors
        .iter()
        .map(|e| e.code)
        .collect()
}

fn kw(s: &str) -> TokenKind {
    TokenKind::Keyword(s.to_string())
}

fn id(s: &str) -> TokenKind {
    TokenKind::Id(s.to_string())
}

fn num(s: &str) -> TokenKind {
    TokenKind::Number(s.to_string())
}

fn string(s: &str) -> TokenKind {
    TokenKind::Str(s.to_string())
}

// ══════════════════════════════════════════════════════════════════════
// Basic tokens
// ══════════════════════════════════════════════════════════════════════

#[test]
fn test_empty_source_is_just_eof() {
    let sf = SourceFile::new("test.wat", "");
    let result = Lexer::new(&sf).lex();
    assert_eq!(result.tokens.len(), 1);
    assert_eq!(result.tokens[0].kind, TokenKind::Eof);
    assert!(!result.errors.has_errors());
}

#[test]
fn test_simple_function() {
    let k = kinds("(func $add (param i32 i32) (result i32) local.get 0)");
    assert_eq!(
        k,
        vec![
            TokenKind::LParen,
            kw("func"),
            id("add"),
            TokenKind::LParen,
            kw("param"),
            kw("i32"),
            kw("i32"),
            TokenKind::RParen,
            TokenKind::LParen,
            kw("result"),
            kw("i32"),
            TokenKind::RParen,
            kw("local.get"),
            num("0"),
            TokenKind::RParen,
        ]
    );
}

#[test]
fn test_dotted_and_colon_keywords() {
    assert_eq!(kinds("struct.get_u"), vec![kw("struct.get_u")]);
    assert_eq!(kinds("nan:0x200000"), vec![kw("nan:0x200000")]);
    assert_eq!(kinds("offset=4"), vec![kw("offset=4")]);
}

#[test]
fn test_numbers_keep_source_text() {
    assert_eq!(
        kinds("42 -7 +3 0x1F 1_000 1.5e3 -0x1p-2"),
        vec![
            num("42"),
            num("-7"),
            num("+3"),
            num("0x1F"),
            num("1_000"),
            num("1.5e3"),
            num("-0x1p-2"),
        ]
    );
}

#[test]
fn test_identifier_with_symbols() {
    assert_eq!(kinds("$Point.x"), vec![id("Point.x")]);
    assert_eq!(kinds("$a/b!c"), vec![id("a/b!c")]);
}

#[test]
fn test_adjacent_parens_without_spaces() {
    assert_eq!(
        kinds("((()))"),
        vec![
            TokenKind::LParen,
            TokenKind::LParen,
            TokenKind::LParen,
            TokenKind::RParen,
            TokenKind::RParen,
            TokenKind::RParen,
        ]
    );
}

// ══════════════════════════════════════════════════════════════════════
// Strings
// ══════════════════════════════════════════════════════════════════════

#[test]
fn test_plain_string() {
    assert_eq!(kinds(r#""add""#), vec![string("add")]);
}

#[test]
fn test_string_escapes() {
    assert_eq!(
        kinds(r#""a\nb\t\"q\"\\""#),
        vec![string("a\nb\t\"q\"\\")]
    );
}

#[test]
fn test_string_hex_and_unicode_escapes() {
    assert_eq!(kinds(r#""\41\u{1F600}""#), vec![string("A\u{1F600}")]);
}

#[test]
fn test_string_with_utf8_content() {
    assert_eq!(kinds("\"héllo\""), vec![string("héllo")]);
}

#[test]
fn test_unterminated_string() {
    assert_eq!(
        error_codes("(export \"add"),
        vec![ErrorCode::UNTERMINATED_STRING]
    );
}

#[test]
fn test_invalid_escape() {
    assert_eq!(error_codes(r#""\q""#), vec![ErrorCode::INVALID_ESCAPE]);
}

#[test]
fn test_byte_escape_needs_two_digits() {
    assert_eq!(error_codes(r#""\4""#), vec![ErrorCode::INVALID_ESCAPE]);
}

#[test]
fn test_invalid_utf8_byte_escape() {
    assert_eq!(error_codes(r#""\ff""#), vec![ErrorCode::INVALID_ESCAPE]);
}

// ══════════════════════════════════════════════════════════════════════
// Comments
// ══════════════════════════════════════════════════════════════════════

#[test]
fn test_line_comment_is_skipped() {
    assert_eq!(
        kinds(";; header\n(module) ;; trailing"),
        vec![TokenKind::LParen, kw("module"), TokenKind::RParen]
    );
}

#[test]
fn test_nested_block_comment() {
    assert_eq!(
        kinds("(; outer (; inner ;) still outer ;) nop"),
        vec![kw("nop")]
    );
}

#[test]
fn test_unterminated_block_comment() {
    assert_eq!(
        error_codes("(module (; never closed"),
        vec![ErrorCode::UNTERMINATED_COMMENT]
    );
}

// ══════════════════════════════════════════════════════════════════════
// Spans
// ══════════════════════════════════════════════════════════════════════

#[test]
fn test_spans_track_lines_and_columns() {
    let sf = SourceFile::new("test.wat", "(module\n  (func))");
    let tokens = Lexer::new(&sf).lex().tokens;
    let func = tokens
        .iter()
        .find(|t| t.kind == kw("func"))
        .expect("func token");
    assert_eq!(func.span.start_line, 2);
    assert_eq!(func.span.start_col, 4);
    assert_eq!(func.span.end_col, 7);
}

// ══════════════════════════════════════════════════════════════════════
// Error recovery
// ══════════════════════════════════════════════════════════════════════

#[test]
fn test_unexpected_character_is_skipped() {
    let sf = SourceFile::new("test.wat", "(nop [ nop)");
    let result = Lexer::new(&sf).lex();
    assert_eq!(result.errors.total_errors, 1);
    assert_eq!(
        result.errors.errors[0].code,
        ErrorCode::UNEXPECTED_CHARACTER
    );
    let k: Vec<_> = result.tokens.into_iter().map(|t| t.kind).collect();
    assert_eq!(
        k,
        vec![
            TokenKind::LParen,
            kw("nop"),
            kw("nop"),
            TokenKind::RParen,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_error_limit_stops_lexing() {
    let source = "[".repeat(500);
    let sf = SourceFile::new("test.wat", source);
    let result = Lexer::new(&sf).lex();
    assert_eq!(result.errors.errors.len(), inlet_types::MAX_ERRORS);
    assert_eq!(
        result.tokens.last().map(|t| t.kind.clone()),
        Some(TokenKind::Eof)
    );
}

#[test]
fn test_markup_like_input_terminates() {
    // Script bodies are captured verbatim, so the compiler may be handed
    // anything. Lexing must still finish.
    let sf = SourceFile::new("test.wat", "<div class=\"x\">{ if (a < b) }</div>\u{0}");
    let result = Lexer::new(&sf).lex();
    assert!(result.errors.has_errors());
    assert_eq!(
        result.tokens.last().map(|t| t.kind.clone()),
        Some(TokenKind::Eof)
    );
}

#[test]
fn test_error_display_includes_location() {
    let sf = SourceFile::new("bad.wat", "(module\n  \"oops");
    let result = Lexer::new(&sf).lex();
    let err = result.errors.first().expect("one error");
    assert_eq!(err.span.start_line, 2);
    assert_eq!(err.source_line, "  \"oops");
    assert!(err.to_string().starts_with("bad.wat:2:3: E102"));
}

// ══════════════════════════════════════════════════════════════════════
// Determinism
// ══════════════════════════════════════════════════════════════════════

#[test]
fn test_determinism_100_iterations() {
    let source = r#"(module
  (type $Point (struct (field $x (mut i32)) (field $y i32)))
  (func $make (export "make") (param i32 i32) (result (ref $Point))
    (struct.new $Point (local.get 0) (local.get 1))))"#;
    let reference = kinds(source);
    for i in 0..100 {
        assert_eq!(kinds(source), reference, "iteration {i} differs");
    }
}
