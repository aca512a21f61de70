//! Main module assembler.
//!
//! Orchestrates the code generation pipeline:
//! 1. Register names in every index space (imports first)
//! 2. Lower type definitions in declaration order
//! 3. Lower globals and function bodies
//! 4. Synthesize GC accessor exports
//! 5. Assemble all sections into a module
//! 6. Validate with `wasmparser`, mapping failures back to source

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap, HashSet};

use inlet_types::ast::{self, CompositeType, ImportDesc, Index, Module, ModuleField, TypeUse};
use inlet_types::{
    Accessor, CompileErrors, ExportEntry, ImportRequirement, SourceFile, Span, SymbolKind,
};
use wasm_encoder::{
    CodeSection, ConstExpr, CustomSection, Encode, EntityType, ExportKind, ExportSection,
    Function, FunctionSection, GlobalSection, GlobalType, ImportSection, Instruction,
    RawSection, SectionId, StartSection, ValType,
};

use crate::accessors;
use crate::binary::validate;
use crate::error::{CodegenError, CodegenResult};
use crate::instr::FuncBuilder;
use crate::source_map::{FuncKind, SourceMap};
use crate::types::{self, FieldInfo, TypeEntry, TypeTable, COMPILER_VERSION, CUSTOM_SECTION_NAME};

// ══════════════════════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════════════════════

/// Everything produced by a successful compilation.
#[derive(Debug, Clone)]
pub struct CodegenOutput {
    /// The validated binary module.
    pub wasm: Vec<u8>,
    /// Exports in declaration order, synthesized accessors last.
    pub exports: Vec<ExportEntry>,
    /// Synthesized GC accessors (also present in `exports`).
    pub accessors: Vec<Accessor>,
    /// What the module expects the host to provide.
    pub imports: Vec<ImportRequirement>,
    pub source_map: SourceMap,
}

/// Compile a parsed [`Module`] into a binary module.
///
/// All-or-nothing: any resolution or validation error yields `Err` with
/// located diagnostics and no bytes.
pub fn compile(module: &Module, source: &SourceFile) -> Result<CodegenOutput, CompileErrors> {
    let mut compiler = Compiler::new(module);
    let result = compiler.compile();
    let mut errors = CompileErrors::empty();
    for err in &compiler.errors {
        errors.push_error(err.to_module_error(source));
    }
    match result {
        Some(output) if !errors.has_errors() => Ok(output),
        _ => {
            tracing::debug!(errors = errors.total_errors, "codegen failed");
            Err(errors)
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Scope: name resolution shared by every lowering step
// ══════════════════════════════════════════════════════════════════════════════

/// Index spaces and the type table.
#[derive(Debug, Default)]
pub(crate) struct Scope {
    pub(crate) types: TypeTable,
    type_names: HashMap<String, u32>,
    /// Number of types written in the module text.
    declared_types: u32,
    /// Set while lowering a type definition; later types are out of reach.
    lowering_type: Option<u32>,
    field_names: HashMap<(u32, String), u32>,
    func_names: HashMap<String, u32>,
    /// Type index of every function, imports first.
    func_types: Vec<u32>,
    global_names: HashMap<String, u32>,
    global_count: u32,
    /// Functions referenced by `ref.func` inside bodies.
    func_refs: BTreeSet<u32>,
}

impl Scope {
    fn register(
        names: &mut HashMap<String, u32>,
        space: &'static str,
        id: Option<&ast::Ident>,
        index: u32,
    ) -> CodegenResult<()> {
        let Some(id) = id else {
            return Ok(());
        };
        if names.contains_key(&id.name) {
            return Err(CodegenError::DuplicateIdentifier {
                space,
                name: id.name.clone(),
                span: id.span,
            });
        }
        names.insert(id.name.clone(), index);
        Ok(())
    }

    fn lookup(
        names: &HashMap<String, u32>,
        count: u32,
        space: &'static str,
        index: &Index,
    ) -> CodegenResult<u32> {
        match index {
            Index::Num(n, _) if *n < count => Ok(*n),
            Index::Num(n, span) => Err(CodegenError::UnknownIdentifier {
                space,
                name: n.to_string(),
                span: *span,
            }),
            Index::Id(id) => {
                names
                    .get(&id.name)
                    .copied()
                    .ok_or_else(|| CodegenError::UnknownIdentifier {
                        space,
                        name: format!("${}", id.name),
                        span: id.span,
                    })
            }
        }
    }

    pub(crate) fn resolve_type(&self, index: &Index) -> CodegenResult<u32> {
        let idx = Self::lookup(&self.type_names, self.declared_types, "type", index)?;
        if let Some(current) = self.lowering_type {
            if idx > current {
                return Err(CodegenError::ForwardTypeReference {
                    name: index.to_string(),
                    span: index.span(),
                });
            }
        }
        Ok(idx)
    }

    fn expect_kind(&self, index: &Index, expected: &'static str) -> CodegenResult<u32> {
        let idx = self.resolve_type(index)?;
        match self.types.get(idx) {
            Some(entry) if entry.kind_name() == expected => Ok(idx),
            _ => Err(CodegenError::TypeKindMismatch {
                name: index.to_string(),
                expected,
                span: index.span(),
            }),
        }
    }

    pub(crate) fn resolve_struct(&self, index: &Index) -> CodegenResult<u32> {
        self.expect_kind(index, "struct")
    }

    pub(crate) fn resolve_array(&self, index: &Index) -> CodegenResult<u32> {
        self.expect_kind(index, "array")
    }

    pub(crate) fn resolve_field(&self, struct_index: u32, field: &Index) -> CodegenResult<u32> {
        let count = match self.types.get(struct_index) {
            Some(TypeEntry::Struct(fields)) => fields.len() as u32,
            _ => 0,
        };
        let found = match field {
            Index::Num(n, _) => (*n < count).then_some(*n),
            Index::Id(id) => self
                .field_names
                .get(&(struct_index, id.name.clone()))
                .copied(),
        };
        found.ok_or_else(|| CodegenError::UnknownField {
            ty: self.types.display_name(struct_index),
            field: field.to_string(),
            span: field.span(),
        })
    }

    pub(crate) fn resolve_func(&self, index: &Index) -> CodegenResult<u32> {
        Self::lookup(
            &self.func_names,
            self.func_types.len() as u32,
            "function",
            index,
        )
    }

    pub(crate) fn resolve_global(&self, index: &Index) -> CodegenResult<u32> {
        Self::lookup(&self.global_names, self.global_count, "global", index)
    }

    pub(crate) fn lower_val_type(&self, ty: &ast::ValType) -> CodegenResult<ValType> {
        types::lower_val_type(ty, &mut |i| self.resolve_type(i))
    }

    pub(crate) fn lower_heap_type(
        &self,
        heap: &ast::HeapType,
    ) -> CodegenResult<wasm_encoder::HeapType> {
        types::lower_heap_type(heap, &mut |i| self.resolve_type(i))
    }

    /// Resolve a type use to its function type index and parameter types.
    pub(crate) fn resolve_type_use(
        &mut self,
        type_use: &TypeUse,
        span: Span,
    ) -> CodegenResult<(u32, Vec<ValType>)> {
        if let Some(index) = &type_use.index {
            let idx = self.expect_kind(index, "func")?;
            let params = match self.types.get(idx) {
                Some(TypeEntry::Func { params, .. }) => params.clone(),
                _ => Vec::new(),
            };
            if !type_use.inline.is_empty() {
                let inline = self.lower_sig(&type_use.inline)?;
                if self.types.get(idx) != Some(&inline) {
                    return Err(CodegenError::TypeKindMismatch {
                        name: index.to_string(),
                        expected: "matching func",
                        span,
                    });
                }
            }
            return Ok((idx, params));
        }
        let TypeEntry::Func { params, results } = self.lower_sig(&type_use.inline)? else {
            return Err(CodegenError::LimitExceeded {
                message: "signature did not lower to a function type".into(),
                span,
            });
        };
        let idx = self.types.intern_func(params.clone(), results);
        Ok((idx, params))
    }

    fn lower_sig(&self, sig: &ast::FuncSig) -> CodegenResult<TypeEntry> {
        let params = sig
            .params
            .iter()
            .map(|p| self.lower_val_type(&p.ty))
            .collect::<CodegenResult<Vec<_>>>()?;
        let results = sig
            .results
            .iter()
            .map(|r| self.lower_val_type(r))
            .collect::<CodegenResult<Vec<_>>>()?;
        Ok(TypeEntry::Func { params, results })
    }

    pub(crate) fn declare_func_ref(&mut self, func: u32) {
        self.func_refs.insert(func);
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Compiler
// ══════════════════════════════════════════════════════════════════════════════

/// An export after resolution.
struct ResolvedExport {
    name: String,
    kind: SymbolKind,
    index: u32,
}

/// The top-level compiler state.
struct Compiler<'a> {
    module: &'a Module,
    scope: Scope,
    errors: Vec<CodegenError>,
    func_imports: u32,
    global_imports: Vec<(GlobalType, &'a ast::Import)>,
    imported_funcs: Vec<(u32, &'a ast::Import)>,
    /// Lowered global types of defined globals, in order.
    global_types: Vec<GlobalType>,
}

impl<'a> Compiler<'a> {
    fn new(module: &'a Module) -> Self {
        Self {
            module,
            scope: Scope::default(),
            errors: Vec::new(),
            func_imports: 0,
            global_imports: Vec::new(),
            imported_funcs: Vec::new(),
            global_types: Vec::new(),
        }
    }

    fn record<T>(&mut self, result: CodegenResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                if self.errors.len() < inlet_types::MAX_ERRORS {
                    self.errors.push(err);
                }
                None
            }
        }
    }

    /// Run the full compilation pipeline.
    fn compile(&mut self) -> Option<CodegenOutput> {
        self.lower_types();
        self.register_imports();
        self.register_funcs();
        self.register_globals();
        if !self.errors.is_empty() {
            return None;
        }

        let globals = self.emit_globals();
        let (mut func_section, mut code_section, mut source_map) = self.emit_functions();
        let exports = self.resolve_exports();
        let start = self.resolve_start();
        if !self.errors.is_empty() {
            return None;
        }

        // Accessors for GC types reachable from the export surface.
        let roots = self.export_roots(&exports);
        let mut taken: HashSet<String> = exports.iter().map(|e| e.name.clone()).collect();
        let accessor_funcs = accessors::synthesize(&mut self.scope.types, roots, &mut taken);

        let mut export_section = ExportSection::new();
        let mut export_entries = Vec::new();
        for export in &exports {
            let kind = match export.kind {
                SymbolKind::Function => ExportKind::Func,
                SymbolKind::Global => ExportKind::Global,
            };
            export_section.export(&export.name, kind, export.index);
            export_entries.push(ExportEntry {
                name: export.name.clone(),
                kind: export.kind,
            });
        }
        let mut accessor_table = Vec::new();
        let first_accessor = self.scope.func_types.len() as u32;
        for (i, func) in accessor_funcs.into_iter().enumerate() {
            let func_index = first_accessor + i as u32;
            func_section.function(func.type_index);
            let mut body = Function::new(Vec::<(u32, ValType)>::new());
            for instr in &func.body {
                body.instruction(instr);
            }
            body.instruction(&Instruction::End);
            code_section.function(&body);
            export_section.export(&func.accessor.export_name, ExportKind::Func, func_index);
            export_entries.push(ExportEntry {
                name: func.accessor.export_name.clone(),
                kind: SymbolKind::Function,
            });
            source_map.push(
                func_index,
                func.accessor.export_name.clone(),
                FuncKind::Accessor,
                self.module.span,
            );
            accessor_table.push(func.accessor);
        }

        // ── Assemble ──
        let mut wasm = wasm_encoder::Module::new();
        wasm.section(&self.scope.types.encode());
        wasm.section(&self.emit_imports());
        wasm.section(&func_section);
        wasm.section(&globals);
        wasm.section(&export_section);
        if let Some(function_index) = start {
            wasm.section(&StartSection { function_index });
        }
        let elements = self.encode_declared_elements();
        if let Some(data) = &elements {
            wasm.section(&RawSection {
                id: SectionId::Element as u8,
                data,
            });
        }
        wasm.section(&code_section);
        wasm.section(&CustomSection {
            name: Cow::Borrowed(CUSTOM_SECTION_NAME),
            data: Cow::Borrowed(COMPILER_VERSION.as_bytes()),
        });
        let bytes = wasm.finish();

        if let Err(err) = validate(&bytes) {
            let span = locate_offset(&bytes, err.offset(), self.func_imports, &source_map)
                .unwrap_or(self.module.span);
            self.errors.push(CodegenError::ValidationFailed {
                message: err.message().to_string(),
                span,
            });
            return None;
        }

        tracing::debug!(
            types = self.scope.types.len(),
            functions = self.scope.func_types.len(),
            accessors = accessor_table.len(),
            bytes = bytes.len(),
            "module compiled"
        );

        Some(CodegenOutput {
            wasm: bytes,
            exports: export_entries,
            accessors: accessor_table,
            imports: self.import_requirements(),
            source_map,
        })
    }

    // ── Types ────────────────────────────────────────────────────────────

    fn lower_types(&mut self) {
        let defs: Vec<&ast::TypeDef> = self.module.types().collect();
        for (i, def) in defs.iter().enumerate() {
            let result = Scope::register(
                &mut self.scope.type_names,
                "type",
                def.id.as_ref(),
                i as u32,
            );
            self.record(result);
        }
        self.scope.declared_types = defs.len() as u32;

        for (i, def) in defs.iter().enumerate() {
            let idx = i as u32;
            self.scope.lowering_type = Some(idx);
            let lowered = self.lower_composite(idx, &def.composite);
            // Keep indices stable even when a definition fails.
            let entry = self.record(lowered).unwrap_or(TypeEntry::Struct(Vec::new()));
            self.scope
                .types
                .push(def.id.as_ref().map(|id| id.name.clone()), entry);
        }
        self.scope.lowering_type = None;
    }

    fn lower_composite(&mut self, idx: u32, composite: &CompositeType) -> CodegenResult<TypeEntry> {
        match composite {
            CompositeType::Func(sig) => self.scope.lower_sig(sig),
            CompositeType::Struct(fields) => {
                let mut lowered = Vec::with_capacity(fields.len());
                for (field_index, field) in fields.iter().enumerate() {
                    if let Some(id) = &field.id {
                        let key = (idx, id.name.clone());
                        if self.scope.field_names.contains_key(&key) {
                            return Err(CodegenError::DuplicateIdentifier {
                                space: "field",
                                name: id.name.clone(),
                                span: id.span,
                            });
                        }
                        self.scope.field_names.insert(key, field_index as u32);
                    }
                    lowered.push(self.lower_field(field)?);
                }
                Ok(TypeEntry::Struct(lowered))
            }
            CompositeType::Array(elem) => Ok(TypeEntry::Array(self.lower_field(elem)?)),
        }
    }

    fn lower_field(&self, field: &ast::FieldDef) -> CodegenResult<FieldInfo> {
        let scope = &self.scope;
        Ok(FieldInfo {
            name: field.id.as_ref().map(|id| id.name.clone()),
            storage: types::lower_storage_type(&field.storage, &mut |i| scope.resolve_type(i))?,
            mutable: field.mutable,
        })
    }

    // ── Index spaces ─────────────────────────────────────────────────────

    fn register_imports(&mut self) {
        let module = self.module;
        for import in module.imports() {
            match &import.desc {
                ImportDesc::Func { id, ty } => {
                    let index = self.scope.func_types.len() as u32;
                    let registered = Scope::register(
                        &mut self.scope.func_names,
                        "function",
                        id.as_ref(),
                        index,
                    );
                    self.record(registered);
                    let resolved = self.scope.resolve_type_use(ty, import.span);
                    let type_index = self
                        .record(resolved)
                        .map(|(t, _)| t)
                        .unwrap_or_else(|| self.scope.types.intern_func(vec![], vec![]));
                    self.scope.func_types.push(type_index);
                    self.imported_funcs.push((type_index, import));
                    self.func_imports += 1;
                }
                ImportDesc::Global { id, ty } => {
                    let index = self.scope.global_count;
                    let registered =
                        Scope::register(&mut self.scope.global_names, "global", id.as_ref(), index);
                    self.record(registered);
                    self.scope.global_count += 1;
                    let lowered = self.scope.lower_val_type(&ty.val);
                    if let Some(val_type) = self.record(lowered) {
                        self.global_imports.push((
                            GlobalType {
                                val_type,
                                mutable: ty.mutable,
                                shared: false,
                            },
                            import,
                        ));
                    }
                }
            }
        }
    }

    fn register_funcs(&mut self) {
        let module = self.module;
        for func in module.funcs() {
            let index = self.scope.func_types.len() as u32;
            let registered =
                Scope::register(&mut self.scope.func_names, "function", func.id.as_ref(), index);
            self.record(registered);
            let resolved = self.scope.resolve_type_use(&func.ty, func.span);
            let type_index = self
                .record(resolved)
                .map(|(t, _)| t)
                .unwrap_or_else(|| self.scope.types.intern_func(vec![], vec![]));
            self.scope.func_types.push(type_index);
        }
    }

    fn register_globals(&mut self) {
        let module = self.module;
        for global in module.globals() {
            let index = self.scope.global_count;
            let registered =
                Scope::register(&mut self.scope.global_names, "global", global.id.as_ref(), index);
            self.record(registered);
            self.scope.global_count += 1;
            let lowered = self.scope.lower_val_type(&global.ty.val);
            if let Some(val_type) = self.record(lowered) {
                self.global_types.push(GlobalType {
                    val_type,
                    mutable: global.ty.mutable,
                    shared: false,
                });
            }
        }
    }

    // ── Sections ─────────────────────────────────────────────────────────

    fn emit_imports(&self) -> ImportSection {
        let mut imports = ImportSection::new();
        for (type_index, import) in &self.imported_funcs {
            imports.import(&import.module, &import.name, EntityType::Function(*type_index));
        }
        for (global_type, import) in &self.global_imports {
            imports.import(&import.module, &import.name, EntityType::Global(*global_type));
        }
        imports
    }

    fn emit_globals(&mut self) -> GlobalSection {
        let mut section = GlobalSection::new();
        let module = self.module;
        for (global, global_type) in module.globals().zip(self.global_types.clone()) {
            let mut builder = FuncBuilder::new(&mut self.scope);
            let lowered = builder.lower_seq(&global.init);
            let instrs = builder.finish();
            if self.record(lowered).is_none() {
                continue;
            }
            let mut bytes = Vec::new();
            for instr in &instrs {
                instr.encode(&mut bytes);
            }
            section.global(global_type, &ConstExpr::raw(bytes));
        }
        section
    }

    fn emit_functions(&mut self) -> (FunctionSection, CodeSection, SourceMap) {
        let mut func_section = FunctionSection::new();
        let mut code_section = CodeSection::new();
        let mut source_map = SourceMap::new();
        let module = self.module;

        for (i, func) in module.funcs().enumerate() {
            let func_index = self.func_imports + i as u32;
            let type_index = self.scope.func_types[func_index as usize];
            func_section.function(type_index);

            let name = func
                .id
                .as_ref()
                .map(|id| id.name.clone())
                .or_else(|| func.exports.first().cloned())
                .unwrap_or_else(|| format!("func{func_index}"));
            source_map.push(func_index, name, FuncKind::Defined, func.span);

            if let Some(body) = self.lower_function(func) {
                code_section.function(&body);
            }
        }
        (func_section, code_section, source_map)
    }

    fn lower_function(&mut self, func: &ast::Func) -> Option<Function> {
        let resolved = self.scope.resolve_type_use(&func.ty, func.span);
        let (_, params) = self.record(resolved)?;

        let mut local_types = Vec::with_capacity(func.locals.len());
        for local in &func.locals {
            let lowered = self.scope.lower_val_type(&local.ty);
            local_types.push(self.record(lowered)?);
        }

        let mut builder = FuncBuilder::new(&mut self.scope);
        let lowered = lower_body(&mut builder, func, params.len());
        let instrs = builder.finish();
        self.record(lowered)?;

        let mut body = Function::new(group_locals(&local_types));
        for instr in &instrs {
            body.instruction(instr);
        }
        body.instruction(&Instruction::End);
        Some(body)
    }

    fn resolve_exports(&mut self) -> Vec<ResolvedExport> {
        let module = self.module;
        let mut exports = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut func_index = self.func_imports;
        let mut global_index = self.global_imports.len() as u32;

        for field in &module.fields {
            let mut found: Vec<(String, SymbolKind, CodegenResult<u32>, Span)> = Vec::new();
            match field {
                ModuleField::Func(func) => {
                    for name in &func.exports {
                        found.push((name.clone(), SymbolKind::Function, Ok(func_index), func.span));
                    }
                    func_index += 1;
                }
                ModuleField::Global(global) => {
                    for name in &global.exports {
                        found.push((
                            name.clone(),
                            SymbolKind::Global,
                            Ok(global_index),
                            global.span,
                        ));
                    }
                    global_index += 1;
                }
                ModuleField::Export(export) => {
                    let (kind, resolved) = match export.kind {
                        ast::ExportKind::Func => {
                            (SymbolKind::Function, self.scope.resolve_func(&export.index))
                        }
                        ast::ExportKind::Global => {
                            (SymbolKind::Global, self.scope.resolve_global(&export.index))
                        }
                    };
                    found.push((export.name.clone(), kind, resolved, export.span));
                }
                _ => {}
            }
            for (name, kind, resolved, span) in found {
                let Some(index) = self.record(resolved) else {
                    continue;
                };
                if !seen.insert(name.clone()) {
                    self.record::<()>(Err(CodegenError::DuplicateExport { name, span }));
                    continue;
                }
                exports.push(ResolvedExport { name, kind, index });
            }
        }
        exports
    }

    fn resolve_start(&mut self) -> Option<u32> {
        let module = self.module;
        let mut start = None;
        for field in &module.fields {
            if let ModuleField::Start(index) = field {
                if start.is_some() {
                    self.record::<()>(Err(CodegenError::DuplicateIdentifier {
                        space: "start",
                        name: index.to_string(),
                        span: index.span(),
                    }));
                    continue;
                }
                let resolved = self.scope.resolve_func(index);
                start = self.record(resolved);
            }
        }
        start
    }

    /// Type indices that appear in exported signatures and global types.
    fn export_roots(&self, exports: &[ResolvedExport]) -> Vec<u32> {
        let mut roots = Vec::new();
        for export in exports {
            match export.kind {
                SymbolKind::Function => {
                    if let Some(&type_index) = self.scope.func_types.get(export.index as usize) {
                        roots.push(type_index);
                    }
                }
                SymbolKind::Global => {
                    let imported = self.global_imports.len();
                    let global_type = match (export.index as usize).checked_sub(imported) {
                        Some(defined) => self.global_types.get(defined).copied(),
                        None => self
                            .global_imports
                            .get(export.index as usize)
                            .map(|(g, _)| *g),
                    };
                    if let Some(idx) = global_type.and_then(|g| types::concrete_index(g.val_type))
                    {
                        roots.push(idx);
                    }
                }
            }
        }
        roots
    }

    /// A declarative element segment listing every `ref.func` target.
    fn encode_declared_elements(&self) -> Option<Vec<u8>> {
        if self.scope.func_refs.is_empty() {
            return None;
        }
        let funcs: Vec<u32> = self.scope.func_refs.iter().copied().collect();
        let mut data = Vec::new();
        // One segment: flags 3 = declarative, element kind 0 = funcref.
        1u32.encode(&mut data);
        3u32.encode(&mut data);
        data.push(0x00);
        funcs[..].encode(&mut data);
        Some(data)
    }

    fn import_requirements(&self) -> Vec<ImportRequirement> {
        self.module
            .imports()
            .map(|import| ImportRequirement {
                module: import.module.clone(),
                name: import.name.clone(),
                kind: match import.desc {
                    ImportDesc::Func { .. } => SymbolKind::Function,
                    ImportDesc::Global { .. } => SymbolKind::Global,
                },
            })
            .collect()
    }
}

/// Declare parameters and locals, then lower the body.
fn lower_body(
    builder: &mut FuncBuilder<'_>,
    func: &ast::Func,
    param_count: usize,
) -> CodegenResult<()> {
    // Parameters named inline are addressable by `$name`; a `(type $t)` use
    // without inline params leaves them numeric only.
    if func.ty.inline.params.is_empty() {
        for _ in 0..param_count {
            builder.declare_local(None)?;
        }
    } else {
        for param in &func.ty.inline.params {
            builder.declare_local(param.id.as_ref())?;
        }
    }
    builder.declare_locals(&func.locals)?;
    builder.lower_seq(&func.body)
}

/// Run-length group local types for the code section.
fn group_locals(types: &[ValType]) -> Vec<(u32, ValType)> {
    let mut groups: Vec<(u32, ValType)> = Vec::new();
    for ty in types {
        match groups.last_mut() {
            Some((count, last)) if last == ty => *count += 1,
            _ => groups.push((1, *ty)),
        }
    }
    groups
}

/// Map a binary offset inside the code section to the function it belongs to.
fn locate_offset(
    bytes: &[u8],
    offset: usize,
    func_imports: u32,
    source_map: &SourceMap,
) -> Option<Span> {
    let mut defined = 0u32;
    for payload in wasmparser::Parser::new(0).parse_all(bytes) {
        if let Ok(wasmparser::Payload::CodeSectionEntry(body)) = payload {
            if body.range().contains(&offset) {
                return source_map
                    .find_by_func_index(func_imports + defined)
                    .map(|e| e.span);
            }
            defined += 1;
        }
    }
    None
}
