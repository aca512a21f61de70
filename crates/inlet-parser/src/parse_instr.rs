//! Instruction parsing: flat and folded forms.
//!
//! Folded instructions are flattened as they are read, so `(i32.add (a) (b))`
//! yields `a b i32.add`. Structured control keeps its nesting.

use inlet_lexer::token::TokenKind;
use inlet_types::ast::*;
use inlet_types::ErrorCode;

use crate::literal;
use crate::parser::{Parser, MAX_NESTING};

/// Instructions that exist in the binary format but are outside the
/// supported subset.
fn is_unsupported_instr(kw: &str) -> bool {
    const NAMED: &[&str] = &[
        "br_table",
        "call_indirect",
        "call_ref",
        "return_call",
        "return_call_indirect",
        "return_call_ref",
        "try",
        "try_table",
        "throw",
        "throw_ref",
        "rethrow",
        "br_on_null",
        "br_on_non_null",
        "br_on_cast",
        "br_on_cast_fail",
        "ref.test",
        "ref.cast",
        "any.convert_extern",
        "extern.convert_any",
        "array.copy",
        "array.fill",
        "array.init_data",
        "array.init_elem",
        "array.new_data",
        "array.new_elem",
        "data.drop",
        "elem.drop",
    ];
    NAMED.contains(&kw)
        || kw.contains(".load")
        || kw.contains(".store")
        || kw.contains(".atomic")
        || kw.starts_with("memory.")
        || kw.starts_with("table.")
        || kw.starts_with("v128.")
        || ["i8x16.", "i16x8.", "i32x4.", "i64x2.", "f32x4.", "f64x2."]
            .iter()
            .any(|p| kw.starts_with(p))
}

impl<'src> Parser<'src> {
    /// Parse instructions up to `)`, `end`, `else` or end of input.
    pub(crate) fn parse_instr_seq(&mut self) -> Option<Vec<Instr>> {
        let mut out = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::RParen | TokenKind::Eof => break,
                TokenKind::Keyword(kw) if kw == "end" || kw == "else" => break,
                _ => {}
            }
            if self.too_many_errors() {
                return None;
            }
            self.parse_instr(&mut out)?;
        }
        Some(out)
    }

    /// Parse one instruction (flat or folded) and append it to `out`.
    fn parse_instr(&mut self, out: &mut Vec<Instr>) -> Option<()> {
        self.depth += 1;
        let result = if self.depth > MAX_NESTING {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("instructions nested deeper than {MAX_NESTING} levels"),
            );
            None
        } else if self.check_exact(&TokenKind::LParen) {
            self.parse_folded(out)
        } else {
            self.parse_flat(out)
        };
        self.depth -= 1;
        result
    }

    // ── Flat forms ────────────────────────────────────────────────────────────

    fn parse_flat(&mut self, out: &mut Vec<Instr>) -> Option<()> {
        let start = self.current_span();
        match self.peek_keyword() {
            Some("block") | Some("loop") => {
                let is_loop = self.peek_keyword() == Some("loop");
                self.advance();
                let label = self.opt_id();
                let ty = self.parse_block_type()?;
                let body = self.parse_instr_seq()?;
                self.expect_end(&label)?;
                let span = start.merge(self.previous_span());
                let kind = if is_loop {
                    InstrKind::Loop { label, ty, body }
                } else {
                    InstrKind::Block { label, ty, body }
                };
                out.push(Instr::new(kind, span));
            }
            Some("if") => {
                self.advance();
                let label = self.opt_id();
                let ty = self.parse_block_type()?;
                let then = self.parse_instr_seq()?;
                let mut otherwise = Vec::new();
                if self.peek_keyword() == Some("else") {
                    self.advance();
                    self.check_label(&label)?;
                    otherwise = self.parse_instr_seq()?;
                }
                self.expect_end(&label)?;
                let span = start.merge(self.previous_span());
                out.push(Instr::new(
                    InstrKind::If {
                        label,
                        ty,
                        then,
                        otherwise,
                    },
                    span,
                ));
            }
            Some(_) => {
                let instr = self.parse_plain()?;
                out.push(instr);
            }
            None => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected instruction, got '{}'", self.peek_kind()),
                );
                return None;
            }
        }
        Some(())
    }

    /// Expect `end`, optionally followed by the block's label.
    fn expect_end(&mut self, label: &Option<Ident>) -> Option<()> {
        if self.peek_keyword() == Some("end") {
            self.advance();
            return self.check_label(label);
        }
        if self.at_end() {
            self.error_at_current(
                ErrorCode::UNCLOSED_PAREN,
                "missing 'end' for structured instruction",
            );
        } else {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expected 'end', got '{}'", self.peek_kind()),
            );
        }
        None
    }

    /// A trailing `$label` after `end` / `else` must repeat the block's label.
    fn check_label(&mut self, label: &Option<Ident>) -> Option<()> {
        if let Some(trailing) = self.opt_id() {
            let matches = label.as_ref().is_some_and(|l| l.name == trailing.name);
            if !matches {
                self.error_at(
                    ErrorCode::UNKNOWN_LABEL,
                    format!("mismatching label '${}'", trailing.name),
                    trailing.span,
                );
                return None;
            }
        }
        Some(())
    }

    // ── Folded forms ──────────────────────────────────────────────────────────

    fn parse_folded(&mut self, out: &mut Vec<Instr>) -> Option<()> {
        let open = self.current_span();
        let kw = match self.look_ahead(1).keyword() {
            Some(kw) => kw.to_string(),
            None => {
                self.advance();
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected instruction, got '{}'", self.peek_kind()),
                );
                return None;
            }
        };
        self.advance();

        match kw.as_str() {
            "block" | "loop" => {
                self.advance();
                let label = self.opt_id();
                let ty = self.parse_block_type()?;
                let body = self.parse_instr_seq()?;
                if !self.expect_close(open, &kw) {
                    return None;
                }
                let span = open.merge(self.previous_span());
                let kind = if kw == "loop" {
                    InstrKind::Loop { label, ty, body }
                } else {
                    InstrKind::Block { label, ty, body }
                };
                out.push(Instr::new(kind, span));
            }
            "if" => {
                self.advance();
                let label = self.opt_id();
                let ty = self.parse_block_type()?;
                while self.check_exact(&TokenKind::LParen) && !self.at_open("then") {
                    self.parse_instr(out)?;
                }
                let Some(then_open) = self.eat_open("then") else {
                    self.error_at_current(
                        ErrorCode::UNEXPECTED_TOKEN,
                        format!("expected '(then', got '{}'", self.peek_kind()),
                    );
                    return None;
                };
                let then = self.parse_instr_seq()?;
                if !self.expect_close(then_open, "then") {
                    return None;
                }
                let mut otherwise = Vec::new();
                if let Some(else_open) = self.eat_open("else") {
                    otherwise = self.parse_instr_seq()?;
                    if !self.expect_close(else_open, "else") {
                        return None;
                    }
                }
                if !self.expect_close(open, "if") {
                    return None;
                }
                let span = open.merge(self.previous_span());
                out.push(Instr::new(
                    InstrKind::If {
                        label,
                        ty,
                        then,
                        otherwise,
                    },
                    span,
                ));
            }
            _ => {
                let instr = self.parse_plain()?;
                while self.check_exact(&TokenKind::LParen) {
                    self.parse_instr(out)?;
                }
                if !self.expect_close(open, &kw) {
                    return None;
                }
                out.push(instr);
            }
        }
        Some(())
    }

    // ── Plain instructions ────────────────────────────────────────────────────

    /// Parse a keyword instruction and its immediates.
    fn parse_plain(&mut self) -> Option<Instr> {
        let token = self.advance();
        let span = token.span;
        let Some(kw) = token.kind.keyword() else {
            self.error_at(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expected instruction, got '{}'", token.kind),
                span,
            );
            return None;
        };

        let kind = match kw {
            "unreachable" => InstrKind::Unreachable,
            "nop" => InstrKind::Nop,
            "return" => InstrKind::Return,
            "drop" => InstrKind::Drop,
            "select" => {
                if self.at_open("result") {
                    self.error_at(
                        ErrorCode::UNSUPPORTED_INSTRUCTION,
                        "typed 'select' is not supported",
                        span,
                    );
                    return None;
                }
                InstrKind::Select
            }
            "br" => InstrKind::Br(self.expect_index("label")?),
            "br_if" => InstrKind::BrIf(self.expect_index("label")?),
            "call" => InstrKind::Call(self.expect_index("function")?),

            "local.get" => InstrKind::LocalGet(self.expect_index("local")?),
            "local.set" => InstrKind::LocalSet(self.expect_index("local")?),
            "local.tee" => InstrKind::LocalTee(self.expect_index("local")?),
            "global.get" => InstrKind::GlobalGet(self.expect_index("global")?),
            "global.set" => InstrKind::GlobalSet(self.expect_index("global")?),

            "i32.const" => InstrKind::I32Const(self.expect_literal("i32", literal::parse_i32)?),
            "i64.const" => InstrKind::I64Const(self.expect_literal("i64", literal::parse_i64)?),
            "f32.const" => {
                InstrKind::F32Const(self.expect_literal("f32", literal::parse_f32_bits)?)
            }
            "f64.const" => {
                InstrKind::F64Const(self.expect_literal("f64", literal::parse_f64_bits)?)
            }

            "struct.new" => InstrKind::StructNew(self.expect_index("type")?),
            "struct.new_default" => InstrKind::StructNewDefault(self.expect_index("type")?),
            "struct.get" | "struct.get_s" | "struct.get_u" => {
                let ext = match kw {
                    "struct.get_s" => Some(Extension::Signed),
                    "struct.get_u" => Some(Extension::Unsigned),
                    _ => None,
                };
                let ty = self.expect_index("type")?;
                let field = self.expect_index("field")?;
                InstrKind::StructGet { ty, field, ext }
            }
            "struct.set" => {
                let ty = self.expect_index("type")?;
                let field = self.expect_index("field")?;
                InstrKind::StructSet { ty, field }
            }
            "array.new" => InstrKind::ArrayNew(self.expect_index("type")?),
            "array.new_default" => InstrKind::ArrayNewDefault(self.expect_index("type")?),
            "array.new_fixed" => {
                let ty = self.expect_index("type")?;
                let len = self.expect_u32("array length")?;
                InstrKind::ArrayNewFixed(ty, len)
            }
            "array.get" => InstrKind::ArrayGet(self.expect_index("type")?, None),
            "array.get_s" => {
                InstrKind::ArrayGet(self.expect_index("type")?, Some(Extension::Signed))
            }
            "array.get_u" => {
                InstrKind::ArrayGet(self.expect_index("type")?, Some(Extension::Unsigned))
            }
            "array.set" => InstrKind::ArraySet(self.expect_index("type")?),
            "array.len" => InstrKind::ArrayLen,

            "ref.null" => InstrKind::RefNull(self.parse_heap_type()?),
            "ref.is_null" => InstrKind::RefIsNull,
            "ref.as_non_null" => InstrKind::RefAsNonNull,
            "ref.eq" => InstrKind::RefEq,
            "ref.func" => InstrKind::RefFunc(self.expect_index("function")?),
            "ref.i31" => InstrKind::RefI31,
            "i31.get_s" => InstrKind::I31Get(Extension::Signed),
            "i31.get_u" => InstrKind::I31Get(Extension::Unsigned),

            other => {
                if let Some(op) = NumericOp::from_keyword(other) {
                    InstrKind::Numeric(op)
                } else if is_unsupported_instr(other) {
                    self.error_at(
                        ErrorCode::UNSUPPORTED_INSTRUCTION,
                        format!("instruction '{other}' is not supported in embedded modules"),
                        span,
                    );
                    return None;
                } else {
                    self.error_at(
                        ErrorCode::UNKNOWN_INSTRUCTION,
                        format!("unknown instruction '{other}'"),
                        span,
                    );
                    return None;
                }
            }
        };
        Some(Instr::new(kind, span.merge(self.previous_span())))
    }

    /// Read a numeric literal operand with `parse`, reporting invalid text.
    fn expect_literal<T>(&mut self, ty: &str, parse: fn(&str) -> Option<T>) -> Option<T> {
        let text = match self.peek_kind() {
            TokenKind::Number(text) | TokenKind::Keyword(text) => text.clone(),
            _ => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected {ty} literal, got '{}'", self.peek_kind()),
                );
                return None;
            }
        };
        match parse(&text) {
            Some(value) => {
                self.advance();
                Some(value)
            }
            None => {
                self.error_at_current(
                    ErrorCode::INVALID_NUMBER,
                    format!("invalid {ty} literal '{text}'"),
                );
                None
            }
        }
    }
}
