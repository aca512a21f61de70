//! Codegen error types.

use inlet_types::{ErrorCode, ModuleError, SourceFile, Span};
use thiserror::Error;

/// Errors that can occur while lowering a module.
#[derive(Debug, Clone, Error)]
pub enum CodegenError {
    /// A `$name` or numeric index that does not resolve in its index space.
    #[error("unknown {space} '{name}'")]
    UnknownIdentifier {
        space: &'static str,
        name: String,
        span: Span,
    },

    /// The same `$name` declared twice in one index space.
    #[error("duplicate {space} identifier '${name}'")]
    DuplicateIdentifier {
        space: &'static str,
        name: String,
        span: Span,
    },

    /// A type index used where a different kind of type is required.
    #[error("type '{name}' is not a {expected} type")]
    TypeKindMismatch {
        name: String,
        expected: &'static str,
        span: Span,
    },

    /// A struct field that does not exist on the named type.
    #[error("unknown field '{field}' on type '{ty}'")]
    UnknownField {
        ty: String,
        field: String,
        span: Span,
    },

    /// A branch target not enclosing the instruction.
    #[error("unknown label '{name}'")]
    UnknownLabel { name: String, span: Span },

    /// Two exports with the same name.
    #[error("duplicate export name \"{name}\"")]
    DuplicateExport { name: String, span: Span },

    /// A type definition referring to a later type without a recursion group.
    #[error("type '{name}' is referenced before its definition")]
    ForwardTypeReference { name: String, span: Span },

    /// The encoded module failed validation.
    #[error("module failed validation: {message}")]
    ValidationFailed { message: String, span: Span },

    /// Too many functions, locals or types for the binary format.
    #[error("limit exceeded: {message}")]
    LimitExceeded { message: String, span: Span },
}

impl CodegenError {
    /// The diagnostic code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownIdentifier { .. } => ErrorCode::UNKNOWN_IDENTIFIER,
            Self::DuplicateIdentifier { .. } => ErrorCode::DUPLICATE_IDENTIFIER,
            Self::TypeKindMismatch { .. } => ErrorCode::TYPE_KIND_MISMATCH,
            Self::UnknownField { .. } => ErrorCode::UNKNOWN_FIELD,
            Self::UnknownLabel { .. } => ErrorCode::UNKNOWN_LABEL,
            Self::DuplicateExport { .. } => ErrorCode::DUPLICATE_EXPORT,
            Self::ForwardTypeReference { .. } => ErrorCode::FORWARD_TYPE_REFERENCE,
            Self::ValidationFailed { .. } | Self::LimitExceeded { .. } => {
                ErrorCode::VALIDATION_FAILED
            }
        }
    }

    /// Where in the source the error applies.
    pub fn span(&self) -> Span {
        match self {
            Self::UnknownIdentifier { span, .. }
            | Self::DuplicateIdentifier { span, .. }
            | Self::TypeKindMismatch { span, .. }
            | Self::UnknownField { span, .. }
            | Self::UnknownLabel { span, .. }
            | Self::DuplicateExport { span, .. }
            | Self::ForwardTypeReference { span, .. }
            | Self::ValidationFailed { span, .. }
            | Self::LimitExceeded { span, .. } => *span,
        }
    }

    /// Convert to a located diagnostic against `source`.
    pub fn to_module_error(&self, source: &SourceFile) -> ModuleError {
        let span = self.span();
        let source_line = source.line(span.start_line).unwrap_or("").to_string();
        ModuleError::new(&source.name, self.code(), self.to_string(), span, source_line)
    }
}

/// Codegen result type alias.
pub type CodegenResult<T> = Result<T, CodegenError>;
