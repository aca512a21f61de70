//! Compiler front ends.
//!
//! A front end owns one compiled [`ResolvedKind`]: it contributes the script
//! types and extensions it claims to the markup registry and turns a
//! [`ScriptSource`] into a [`CompiledArtifact`].

use std::sync::Arc;

use inlet_codegen::inspect_binary;
use inlet_markup::ScriptTypeClaim;
use inlet_types::{
    CompileErrors, CompiledArtifact, ErrorCode, ModuleError, ResolvedKind, ScriptSource,
    SourceContent, Span, BINARY_MAGIC,
};

use crate::cache::CompileFailure;

pub trait FrontEnd: Send + Sync {
    /// The identifiers and extensions this front end compiles.
    fn claim(&self) -> ScriptTypeClaim;

    fn kind(&self) -> ResolvedKind {
        self.claim().kind
    }

    fn compile(&self, source: &ScriptSource) -> Result<CompiledArtifact, CompileFailure>;
}

// ══════════════════════════════════════════════════════════════════════════════
// Textual modules
// ══════════════════════════════════════════════════════════════════════════════

/// Module text (with the GC extension) and binary modules.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextualModuleFrontEnd;

impl TextualModuleFrontEnd {
    fn compile_binary(name: &str, bytes: &[u8]) -> Result<CompiledArtifact, CompileFailure> {
        let surface = inspect_binary(bytes).map_err(|e| {
            let mut errors = CompileErrors::empty();
            errors.push_error(ModuleError::new(
                name,
                ErrorCode::VALIDATION_FAILED,
                format!("invalid binary module: {e}"),
                Span::point(1, 1),
                "",
            ));
            CompileFailure::from_errors(name, errors)
        })?;

        let mut artifact = CompiledArtifact::module(bytes.to_vec());
        artifact.exports = surface.exports;
        artifact.imports = surface.imports;
        artifact.notes.push("binary module used as-is".to_string());
        for skipped in surface.skipped_exports {
            artifact
                .notes
                .push(format!("export `{skipped}` is not a function or global; not bound"));
        }
        Ok(artifact)
    }
}

impl FrontEnd for TextualModuleFrontEnd {
    fn claim(&self) -> ScriptTypeClaim {
        ScriptTypeClaim::new(ResolvedKind::TextualModule)
            .with_types(["application/wasm", "wat"])
            .with_extensions(["wat", "wast", "wasm"])
    }

    fn compile(&self, source: &ScriptSource) -> Result<CompiledArtifact, CompileFailure> {
        let text = match &source.content {
            SourceContent::Binary(bytes) if bytes.starts_with(BINARY_MAGIC) => {
                return Self::compile_binary(&source.name, bytes);
            }
            SourceContent::Binary(_) => {
                let mut errors = CompileErrors::empty();
                errors.push_error(ModuleError::new(
                    &source.name,
                    ErrorCode::UNEXPECTED_CHARACTER,
                    "source is neither UTF-8 module text nor a binary module",
                    Span::point(1, 1),
                    "",
                ));
                return Err(CompileFailure::from_errors(&source.name, errors));
            }
            SourceContent::Text(text) if text.as_bytes().starts_with(BINARY_MAGIC) => {
                return Self::compile_binary(&source.name, text.as_bytes());
            }
            SourceContent::Text(text) => text,
        };

        let output = crate::compile_module(text, &source.name)
            .map_err(|errors| CompileFailure::from_errors(&source.name, errors))?;

        let mut artifact = CompiledArtifact::module(output.wasm);
        if !output.accessors.is_empty() {
            artifact.notes.push(format!(
                "{} accessor export(s) synthesized",
                output.accessors.len()
            ));
        }
        artifact.exports = output.exports;
        artifact.accessors = output.accessors;
        artifact.imports = output.imports;
        Ok(artifact)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Typed dialect
// ══════════════════════════════════════════════════════════════════════════════

/// Typed dialect source → plain host script text.
pub trait Transpiler: Send + Sync {
    fn transpile(&self, source: &str, name: &str) -> Result<String, CompileErrors>;
}

/// Delegates to a [`Transpiler`]. Without one, the dialect is still claimed
/// (so its bodies are raw-captured) but every script fails as unsupported.
#[derive(Clone, Default)]
pub struct TypedDialectFrontEnd {
    transpiler: Option<Arc<dyn Transpiler>>,
}

impl TypedDialectFrontEnd {
    pub fn new(transpiler: Arc<dyn Transpiler>) -> Self {
        Self {
            transpiler: Some(transpiler),
        }
    }

    pub fn has_transpiler(&self) -> bool {
        self.transpiler.is_some()
    }
}

impl FrontEnd for TypedDialectFrontEnd {
    fn claim(&self) -> ScriptTypeClaim {
        ScriptTypeClaim::new(ResolvedKind::TypedDialect)
            .with_types(["text/typescript"])
            .with_extensions(["ts"])
    }

    fn compile(&self, source: &ScriptSource) -> Result<CompiledArtifact, CompileFailure> {
        let Some(transpiler) = &self.transpiler else {
            return Err(CompileFailure::Unsupported {
                name: source.name.clone(),
                message: "no typed dialect transpiler is configured".to_string(),
            });
        };
        let SourceContent::Text(text) = &source.content else {
            return Err(CompileFailure::Unsupported {
                name: source.name.clone(),
                message: "typed dialect source is not UTF-8 text".to_string(),
            });
        };
        let script = transpiler
            .transpile(text, &source.name)
            .map_err(|errors| CompileFailure::from_errors(&source.name, errors))?;
        Ok(CompiledArtifact::script(script))
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Registry
// ══════════════════════════════════════════════════════════════════════════════

/// The front ends of one pipeline, looked up by kind.
#[derive(Clone, Default)]
pub struct FrontEnds {
    entries: Vec<Arc<dyn FrontEnd>>,
}

impl FrontEnds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a front end. A later front end for the same kind replaces the
    /// earlier one.
    pub fn insert(&mut self, front_end: Arc<dyn FrontEnd>) {
        let kind = front_end.kind();
        self.entries.retain(|f| f.kind() != kind);
        self.entries.push(front_end);
    }

    pub fn get(&self, kind: ResolvedKind) -> Option<&Arc<dyn FrontEnd>> {
        self.entries.iter().find(|f| f.kind() == kind)
    }

    pub fn claims(&self) -> impl Iterator<Item = ScriptTypeClaim> + '_ {
        self.entries.iter().map(|f| f.claim())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
