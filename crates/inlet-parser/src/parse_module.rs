//! Module and module-field parsing.

use inlet_lexer::token::TokenKind;
use inlet_types::ast::*;
use inlet_types::{ErrorCode, Span};

use crate::parser::Parser;

/// Module fields that are recognised but outside the supported subset.
const UNSUPPORTED_FIELDS: &[&str] = &["memory", "table", "data", "elem", "rec", "tag"];

impl<'src> Parser<'src> {
    /// Parse a whole module.
    ///
    /// ```ebnf
    /// Module = "(" "module" [ Id ] { Field } ")" | { Field } ;
    /// ```
    pub(crate) fn parse_module(&mut self) -> Option<Module> {
        let start = self.current_span();
        let mut name = None;
        let mut fields = Vec::new();

        if let Some(open) = self.eat_open("module") {
            name = self.opt_id();
            self.parse_fields(&mut fields);
            self.expect_close(open, "module");
        } else {
            self.parse_fields(&mut fields);
        }

        if !self.at_end() && !self.too_many_errors() {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("unexpected '{}' after module", self.peek_kind()),
            );
        }

        let span = start.merge(self.previous_span());
        Some(Module { name, fields, span })
    }

    /// Parse fields until `)` or end of input.
    fn parse_fields(&mut self, fields: &mut Vec<ModuleField>) {
        while !self.at_end() && !self.check_exact(&TokenKind::RParen) {
            if self.too_many_errors() {
                return;
            }
            if !self.check_exact(&TokenKind::LParen) {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected module field, got '{}'", self.peek_kind()),
                );
                self.advance();
                continue;
            }
            self.parse_field(fields);
        }
    }

    /// Parse a single `( keyword ... )` field. On error, skips the whole
    /// field as one balanced form.
    fn parse_field(&mut self, fields: &mut Vec<ModuleField>) {
        let open = self.current_span();
        let field_start = self.position();
        let Some(kw) = self.look_ahead(1).keyword().map(str::to_string) else {
            self.advance();
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expected module field keyword, got '{}'", self.peek_kind()),
            );
            self.recover_to_close();
            return;
        };

        if UNSUPPORTED_FIELDS.contains(&kw.as_str()) {
            self.error_at(
                ErrorCode::UNSUPPORTED_FIELD,
                format!("'{kw}' fields are not supported in embedded modules"),
                open,
            );
            self.skip_form();
            return;
        }

        self.advance();
        self.advance();
        let before = fields.len();
        let ok = match kw.as_str() {
            "type" => self.parse_type_field(open, fields),
            "import" => self.parse_import_field(open, fields),
            "func" => self.parse_func_field(open, fields),
            "global" => self.parse_global_field(open, fields),
            "export" => self.parse_export_field(open, fields),
            "start" => self.parse_start_field(open, fields),
            other => {
                self.error_at(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("unknown module field '{other}'"),
                    open,
                );
                None
            }
        };
        if ok.is_none() {
            fields.truncate(before);
            self.rewind(field_start);
            self.skip_form();
        }
    }

    /// `(type $id? composite)`
    fn parse_type_field(&mut self, open: Span, fields: &mut Vec<ModuleField>) -> Option<()> {
        let id = self.opt_id();
        let composite = self.parse_composite_type()?;
        let span = open.merge(self.current_span());
        if !self.expect_close(open, "type") {
            return None;
        }
        fields.push(ModuleField::Type(TypeDef {
            id,
            composite,
            span,
        }));
        Some(())
    }

    /// `(import "module" "name" (func $id? typeuse))` or `(global $id? gtype)`.
    fn parse_import_field(&mut self, open: Span, fields: &mut Vec<ModuleField>) -> Option<()> {
        let module = self.expect_string("import module")?;
        let name = self.expect_string("import name")?;
        let desc_open = self.current_span();
        let desc = match self.open_keyword() {
            Some("func") => {
                self.advance();
                self.advance();
                let id = self.opt_id();
                let ty = self.parse_type_use()?;
                if !self.expect_close(desc_open, "func") {
                    return None;
                }
                self.func_imports += 1;
                ImportDesc::Func { id, ty }
            }
            Some("global") => {
                self.advance();
                self.advance();
                let id = self.opt_id();
                let ty = self.parse_global_type()?;
                if !self.expect_close(desc_open, "global") {
                    return None;
                }
                self.global_imports += 1;
                ImportDesc::Global { id, ty }
            }
            Some(kw @ ("memory" | "table" | "tag")) => {
                let kw = kw.to_string();
                self.error_at(
                    ErrorCode::UNSUPPORTED_FIELD,
                    format!("importing a {kw} is not supported"),
                    desc_open,
                );
                return None;
            }
            _ => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected import descriptor, got '{}'", self.peek_kind()),
                );
                return None;
            }
        };
        let span = open.merge(self.current_span());
        if !self.expect_close(open, "import") {
            return None;
        }
        fields.push(ModuleField::Import(Import {
            module,
            name,
            desc,
            span,
        }));
        Some(())
    }

    /// Inline `(export "name")*` abbreviations.
    fn parse_inline_exports(&mut self) -> Option<Vec<String>> {
        let mut names = Vec::new();
        while let Some(open) = self.eat_open("export") {
            names.push(self.expect_string("export name")?);
            if !self.expect_close(open, "export") {
                return None;
            }
        }
        Some(names)
    }

    /// Inline `(import "module" "name")` abbreviation.
    fn parse_inline_import(&mut self) -> Option<Option<(String, String)>> {
        let Some(open) = self.eat_open("import") else {
            return Some(None);
        };
        let module = self.expect_string("import module")?;
        let name = self.expect_string("import name")?;
        if !self.expect_close(open, "import") {
            return None;
        }
        Some(Some((module, name)))
    }

    /// Push `Export` fields for an imported entity's inline exports.
    fn push_import_exports(
        fields: &mut Vec<ModuleField>,
        exports: Vec<String>,
        kind: ExportKind,
        id: &Option<Ident>,
        position: u32,
        span: Span,
    ) {
        for name in exports {
            let index = match id {
                Some(id) => Index::Id(id.clone()),
                None => Index::Num(position, span),
            };
            fields.push(ModuleField::Export(Export {
                name,
                kind,
                index,
                span,
            }));
        }
    }

    /// ```ebnf
    /// Func = "(" "func" [ Id ] { InlineExport } [ InlineImport ]
    ///        TypeUse { Local } { Instr } ")" ;
    /// ```
    fn parse_func_field(&mut self, open: Span, fields: &mut Vec<ModuleField>) -> Option<()> {
        let id = self.opt_id();
        let exports = self.parse_inline_exports()?;
        let import = self.parse_inline_import()?;
        let ty = self.parse_type_use()?;

        if let Some((module, name)) = import {
            let span = open.merge(self.current_span());
            if !self.expect_close(open, "func") {
                return None;
            }
            let position = self.func_imports;
            self.func_imports += 1;
            Self::push_import_exports(fields, exports, ExportKind::Func, &id, position, span);
            fields.push(ModuleField::Import(Import {
                module,
                name,
                desc: ImportDesc::Func { id, ty },
                span,
            }));
            return Some(());
        }

        let mut locals = Vec::new();
        while let Some(local_open) = self.eat_open("local") {
            if let Some(local_id) = self.opt_id() {
                let ty = self.parse_val_type()?;
                locals.push(Local {
                    id: Some(local_id),
                    ty,
                    span: local_open.merge(self.current_span()),
                });
            } else {
                while !self.check_exact(&TokenKind::RParen) && !self.at_end() {
                    let span = self.current_span();
                    let ty = self.parse_val_type()?;
                    locals.push(Local { id: None, ty, span });
                }
            }
            if !self.expect_close(local_open, "local") {
                return None;
            }
        }

        let body = self.parse_instr_seq()?;
        let span = open.merge(self.current_span());
        if !self.expect_close(open, "func") {
            return None;
        }
        fields.push(ModuleField::Func(Func {
            id,
            exports,
            ty,
            locals,
            body,
            span,
        }));
        Some(())
    }

    /// ```ebnf
    /// Global = "(" "global" [ Id ] { InlineExport } [ InlineImport ]
    ///          GlobalType { Instr } ")" ;
    /// ```
    fn parse_global_field(&mut self, open: Span, fields: &mut Vec<ModuleField>) -> Option<()> {
        let id = self.opt_id();
        let exports = self.parse_inline_exports()?;
        let import = self.parse_inline_import()?;
        let ty = self.parse_global_type()?;

        if let Some((module, name)) = import {
            let span = open.merge(self.current_span());
            if !self.expect_close(open, "global") {
                return None;
            }
            let position = self.global_imports;
            self.global_imports += 1;
            Self::push_import_exports(fields, exports, ExportKind::Global, &id, position, span);
            fields.push(ModuleField::Import(Import {
                module,
                name,
                desc: ImportDesc::Global { id, ty },
                span,
            }));
            return Some(());
        }

        let init = self.parse_instr_seq()?;
        let span = open.merge(self.current_span());
        if !self.expect_close(open, "global") {
            return None;
        }
        fields.push(ModuleField::Global(Global {
            id,
            exports,
            ty,
            init,
            span,
        }));
        Some(())
    }

    /// `(export "name" (func idx))` or `(export "name" (global idx))`.
    fn parse_export_field(&mut self, open: Span, fields: &mut Vec<ModuleField>) -> Option<()> {
        let name = self.expect_string("export name")?;
        let desc_open = self.current_span();
        let kind = match self.open_keyword() {
            Some("func") => ExportKind::Func,
            Some("global") => ExportKind::Global,
            Some(kw @ ("memory" | "table" | "tag")) => {
                let kw = kw.to_string();
                self.error_at(
                    ErrorCode::UNSUPPORTED_FIELD,
                    format!("exporting a {kw} is not supported"),
                    desc_open,
                );
                return None;
            }
            _ => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected export descriptor, got '{}'", self.peek_kind()),
                );
                return None;
            }
        };
        self.advance();
        self.advance();
        let index = self.expect_index("export")?;
        let what = match kind {
            ExportKind::Func => "func",
            ExportKind::Global => "global",
        };
        if !self.expect_close(desc_open, what) {
            return None;
        }
        let span = open.merge(self.current_span());
        if !self.expect_close(open, "export") {
            return None;
        }
        fields.push(ModuleField::Export(Export {
            name,
            kind,
            index,
            span,
        }));
        Some(())
    }

    /// `(start idx)`
    fn parse_start_field(&mut self, open: Span, fields: &mut Vec<ModuleField>) -> Option<()> {
        let index = self.expect_index("start function")?;
        if !self.expect_close(open, "start") {
            return None;
        }
        fields.push(ModuleField::Start(index));
        Some(())
    }
}
