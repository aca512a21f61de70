//! Shared types for inlet.
//!
//! This crate defines source spans, structured diagnostics, the AST of the
//! textual module format, and the script-element data model used across the
//! markup, compiler and loader crates.

mod error;
mod span;
pub mod ast;
pub mod script;

pub use error::{CompileErrors, ErrorCategory, ErrorCode, ModuleError, Severity, MAX_ERRORS};
pub use script::{
    Accessor, AccessorOp, ArtifactPayload, CompiledArtifact, DeclarationError, ExportEntry,
    FailureKind, ImportRequirement, ResolvedKind, ScriptDeclaration, ScriptSource,
    SourceContent, SymbolKind, BINARY_MAGIC,
};
pub use span::{SourceFile, Span};

/// Result type used throughout the module compiler.
pub type Result<T> = std::result::Result<T, ModuleError>;
