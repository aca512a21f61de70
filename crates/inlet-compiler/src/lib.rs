//! Inlet compiler: orchestrates the script pipeline.
//!
//! ```text
//! Module text → Lexer → Parser → Codegen (+ accessors) → validated binary
//! ```
//!
//! [`compile`] and [`compile_to_result`] run the textual-module chain on one
//! source. [`DocumentPipeline`] runs every script element of a markup
//! document through classification, the [`ArtifactCache`] and the loader.

pub mod cache;
pub mod config;
pub mod frontend;
pub mod pipeline;

pub use cache::{ArtifactCache, CacheKey, CompileFailure, CompileOutcome};
pub use config::{ConfigError, PipelineConfig};
pub use frontend::{FrontEnd, FrontEnds, TextualModuleFrontEnd, Transpiler, TypedDialectFrontEnd};
pub use pipeline::{
    CompilePool, Diagnostic, DocumentPipeline, DocumentReport, Fetcher, NoFetcher, ScriptOutcome,
    ScriptReport,
};

use inlet_codegen::CodegenOutput;
use inlet_lexer::Lexer;
use inlet_parser::Parser;
use inlet_types::{Accessor, CompileErrors, ErrorCode, ExportEntry, ModuleError, SourceFile, Span};
use serde::{Deserialize, Serialize};

/// Run lexer, parser and code generator over module text.
pub fn compile_module(source: &str, filename: &str) -> Result<CodegenOutput, CompileErrors> {
    let source_file = SourceFile::new(filename, source);

    let lexed = Lexer::new(&source_file).lex();
    if lexed.errors.has_errors() {
        return Err(lexed.errors);
    }

    let parsed = Parser::new(lexed.tokens, &source_file).parse();
    if parsed.errors.has_errors() {
        return Err(parsed.errors);
    }
    let Some(module) = parsed.module else {
        let mut errors = CompileErrors::empty();
        errors.push_error(ModuleError::new(
            filename,
            ErrorCode::UNEXPECTED_TOKEN,
            "expected a module",
            Span::point(1, 1),
            source_file.line(1).unwrap_or_default(),
        ));
        return Err(errors);
    };

    inlet_codegen::compile(&module, &source_file)
}

/// Compile module text to a validated binary module.
pub fn compile(source: &str, filename: &str) -> Result<Vec<u8>, CompileErrors> {
    compile_module(source, filename).map(|output| output.wasm)
}

/// Summary of one compilation, shaped for JSON consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub wasm: Option<Vec<u8>>,
    #[serde(default)]
    pub exports: Vec<ExportEntry>,
    #[serde(default)]
    pub accessors: Vec<Accessor>,
    pub errors: CompileErrors,
}

/// Like [`compile`], but never fails: errors are carried in the result.
pub fn compile_to_result(source: &str, filename: &str) -> CompileResult {
    match compile_module(source, filename) {
        Ok(output) => CompileResult {
            success: true,
            wasm: Some(output.wasm),
            exports: output.exports,
            accessors: output.accessors,
            errors: CompileErrors::empty(),
        },
        Err(errors) => CompileResult {
            success: false,
            wasm: None,
            exports: Vec::new(),
            accessors: Vec::new(),
            errors,
        },
    }
}
