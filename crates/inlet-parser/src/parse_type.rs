//! Type parsing: value types, GC composite types, signatures, type uses.

use inlet_lexer::token::TokenKind;
use inlet_types::ast::*;
use inlet_types::ErrorCode;

use crate::parser::Parser;

/// Shorthand reference type keywords and what they abbreviate.
fn ref_shorthand(kw: &str) -> Option<HeapType> {
    Some(match kw {
        "funcref" => HeapType::Func,
        "externref" => HeapType::Extern,
        "anyref" => HeapType::Any,
        "eqref" => HeapType::Eq,
        "i31ref" => HeapType::I31,
        "structref" => HeapType::Struct,
        "arrayref" => HeapType::Array,
        "nullref" => HeapType::None,
        "nullfuncref" => HeapType::NoFunc,
        "nullexternref" => HeapType::NoExtern,
        _ => return None,
    })
}

/// Abstract heap type keywords.
pub(crate) fn abstract_heap_type(kw: &str) -> Option<HeapType> {
    Some(match kw {
        "func" => HeapType::Func,
        "extern" => HeapType::Extern,
        "any" => HeapType::Any,
        "eq" => HeapType::Eq,
        "i31" => HeapType::I31,
        "struct" => HeapType::Struct,
        "array" => HeapType::Array,
        "none" => HeapType::None,
        "nofunc" => HeapType::NoFunc,
        "noextern" => HeapType::NoExtern,
        _ => return None,
    })
}

impl<'src> Parser<'src> {
    /// `true` if the current tokens start a value type.
    pub(crate) fn at_val_type(&self) -> bool {
        match self.peek_kind() {
            TokenKind::Keyword(kw) => {
                matches!(kw.as_str(), "i32" | "i64" | "f32" | "f64" | "v128")
                    || ref_shorthand(kw).is_some()
            }
            TokenKind::LParen => self.look_ahead(1).keyword() == Some("ref"),
            _ => false,
        }
    }

    /// Parse a value type.
    ///
    /// ```ebnf
    /// ValType = "i32" | "i64" | "f32" | "f64" | RefShorthand
    ///         | "(" "ref" [ "null" ] HeapType ")" ;
    /// ```
    pub(crate) fn parse_val_type(&mut self) -> Option<ValType> {
        let span = self.current_span();
        match self.peek_kind().clone() {
            TokenKind::Keyword(kw) => {
                let ty = match kw.as_str() {
                    "i32" => ValType::I32,
                    "i64" => ValType::I64,
                    "f32" => ValType::F32,
                    "f64" => ValType::F64,
                    "v128" => {
                        self.advance();
                        self.error_at(
                            ErrorCode::UNSUPPORTED_TYPE,
                            "vector types are not supported",
                            span,
                        );
                        return None;
                    }
                    other => match ref_shorthand(other) {
                        Some(heap) => ValType::Ref(RefType {
                            nullable: true,
                            heap,
                        }),
                        None => {
                            self.error_at_current(
                                ErrorCode::UNEXPECTED_TOKEN,
                                format!("expected value type, got '{other}'"),
                            );
                            return None;
                        }
                    },
                };
                self.advance();
                Some(ty)
            }
            TokenKind::LParen if self.look_ahead(1).keyword() == Some("ref") => {
                let open = self.advance().span;
                self.advance();
                let nullable = self.peek_keyword() == Some("null");
                if nullable {
                    self.advance();
                }
                let heap = self.parse_heap_type()?;
                if !self.expect_close(open, "ref") {
                    return None;
                }
                Some(ValType::Ref(RefType { nullable, heap }))
            }
            other => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected value type, got '{other}'"),
                );
                None
            }
        }
    }

    /// Parse a heap type: an abstract keyword or a type index.
    pub(crate) fn parse_heap_type(&mut self) -> Option<HeapType> {
        if let Some(kw) = self.peek_keyword() {
            if let Some(heap) = abstract_heap_type(kw) {
                self.advance();
                return Some(heap);
            }
        }
        if let Some(index) = self.opt_index() {
            return Some(HeapType::Index(index));
        }
        self.error_at_current(
            ErrorCode::UNEXPECTED_TOKEN,
            format!("expected heap type, got '{}'", self.peek_kind()),
        );
        None
    }

    /// Parse a storage type: `i8`, `i16` or a value type.
    fn parse_storage_type(&mut self) -> Option<StorageType> {
        match self.peek_keyword() {
            Some("i8") => {
                self.advance();
                Some(StorageType::I8)
            }
            Some("i16") => {
                self.advance();
                Some(StorageType::I16)
            }
            _ => self.parse_val_type().map(StorageType::Val),
        }
    }

    /// Parse `storage` or `(mut storage)`.
    fn parse_field_type(&mut self) -> Option<(StorageType, bool)> {
        if let Some(open) = self.eat_open("mut") {
            let storage = self.parse_storage_type()?;
            if !self.expect_close(open, "mut") {
                return None;
            }
            Some((storage, true))
        } else {
            self.parse_storage_type().map(|s| (s, false))
        }
    }

    /// Parse a global type: `valtype` or `(mut valtype)`.
    pub(crate) fn parse_global_type(&mut self) -> Option<GlobalType> {
        if let Some(open) = self.eat_open("mut") {
            let val = self.parse_val_type()?;
            if !self.expect_close(open, "mut") {
                return None;
            }
            Some(GlobalType { val, mutable: true })
        } else {
            let val = self.parse_val_type()?;
            Some(GlobalType {
                val,
                mutable: false,
            })
        }
    }

    /// Parse the body of a type definition after `(type $id?`.
    ///
    /// ```ebnf
    /// Composite = "(" "func" Signature ")"
    ///           | "(" "struct" { Field } ")"
    ///           | "(" "array" FieldType ")" ;
    /// Field     = "(" "field" [ Id ] FieldType ")"
    ///           | "(" "field" { FieldType } ")" ;
    /// ```
    pub(crate) fn parse_composite_type(&mut self) -> Option<CompositeType> {
        let span = self.current_span();
        match self.open_keyword() {
            Some("func") => {
                let open = self.advance().span;
                self.advance();
                let sig = self.parse_signature(true)?;
                if !self.expect_close(open, "func") {
                    return None;
                }
                Some(CompositeType::Func(sig))
            }
            Some("struct") => {
                let open = self.advance().span;
                self.advance();
                let mut fields = Vec::new();
                while let Some(field_open) = self.eat_open("field") {
                    if let Some(id) = self.opt_id() {
                        let (storage, mutable) = self.parse_field_type()?;
                        fields.push(FieldDef {
                            id: Some(id),
                            storage,
                            mutable,
                            span: field_open.merge(self.current_span()),
                        });
                    } else {
                        while !self.check_exact(&TokenKind::RParen) && !self.at_end() {
                            let start = self.current_span();
                            let (storage, mutable) = self.parse_field_type()?;
                            fields.push(FieldDef {
                                id: None,
                                storage,
                                mutable,
                                span: start.merge(self.previous_span()),
                            });
                        }
                    }
                    if !self.expect_close(field_open, "field") {
                        return None;
                    }
                }
                if !self.expect_close(open, "struct") {
                    return None;
                }
                Some(CompositeType::Struct(fields))
            }
            Some("array") => {
                let open = self.advance().span;
                self.advance();
                let start = self.current_span();
                let (storage, mutable) = self.parse_field_type()?;
                let element = FieldDef {
                    id: None,
                    storage,
                    mutable,
                    span: start.merge(self.previous_span()),
                };
                if !self.expect_close(open, "array") {
                    return None;
                }
                Some(CompositeType::Array(element))
            }
            Some(kw @ ("sub" | "rec" | "cont")) => {
                let kw = kw.to_string();
                self.error_at(
                    ErrorCode::UNSUPPORTED_TYPE,
                    format!("'{kw}' type definitions are not supported"),
                    span,
                );
                self.skip_form();
                None
            }
            _ => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!(
                        "expected '(func', '(struct' or '(array', got '{}'",
                        self.peek_kind()
                    ),
                );
                None
            }
        }
    }

    /// Parse `(param ...)*` then `(result ...)*`.
    ///
    /// With `named`, a param may carry an identifier: `(param $x i32)`.
    pub(crate) fn parse_signature(&mut self, named: bool) -> Option<FuncSig> {
        let mut sig = FuncSig::default();
        while let Some(open) = self.eat_open("param") {
            if named {
                if let Some(id) = self.opt_id() {
                    let ty = self.parse_val_type()?;
                    sig.params.push(Local {
                        id: Some(id),
                        ty,
                        span: open.merge(self.current_span()),
                    });
                    if !self.expect_close(open, "param") {
                        return None;
                    }
                    continue;
                }
            }
            while !self.check_exact(&TokenKind::RParen) && !self.at_end() {
                let span = self.current_span();
                let ty = self.parse_val_type()?;
                sig.params.push(Local { id: None, ty, span });
            }
            if !self.expect_close(open, "param") {
                return None;
            }
        }
        sig.results = self.parse_results()?;
        Some(sig)
    }

    /// Parse `(result valtype*)*`.
    pub(crate) fn parse_results(&mut self) -> Option<Vec<ValType>> {
        let mut results = Vec::new();
        while let Some(open) = self.eat_open("result") {
            while !self.check_exact(&TokenKind::RParen) && !self.at_end() {
                results.push(self.parse_val_type()?);
            }
            if !self.expect_close(open, "result") {
                return None;
            }
        }
        Some(results)
    }

    /// Parse a type use: `[(type idx)] Signature`.
    pub(crate) fn parse_type_use(&mut self) -> Option<TypeUse> {
        let mut index = None;
        if let Some(open) = self.eat_open("type") {
            index = Some(self.expect_index("type")?);
            if !self.expect_close(open, "type") {
                return None;
            }
        }
        let inline = self.parse_signature(true)?;
        Some(TypeUse { index, inline })
    }

    /// Parse a structured-instruction block type.
    pub(crate) fn parse_block_type(&mut self) -> Option<BlockType> {
        if self.at_open("type") || self.at_open("param") {
            return self.parse_type_use().map(BlockType::Func);
        }
        let results = self.parse_results()?;
        Some(match results.len() {
            0 => BlockType::Empty,
            1 => BlockType::Value(results.into_iter().next()?),
            _ => BlockType::Func(TypeUse {
                index: None,
                inline: FuncSig {
                    params: Vec::new(),
                    results,
                },
            }),
        })
    }
}
