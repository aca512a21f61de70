use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of errors reported before fail-fast.
pub const MAX_ERRORS: usize = 20;

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Diagnostic category, determined by error code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Grammar,
    Type,
    Unsupported,
}

/// Numeric error code (E100–E399).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    // ── Grammar errors (E100–E199) ──
    pub const UNEXPECTED_TOKEN: Self = Self(100);
    pub const UNCLOSED_PAREN: Self = Self(101);
    pub const UNTERMINATED_STRING: Self = Self(102);
    pub const UNTERMINATED_COMMENT: Self = Self(103);
    pub const INVALID_NUMBER: Self = Self(104);
    pub const INVALID_ESCAPE: Self = Self(105);
    pub const UNKNOWN_INSTRUCTION: Self = Self(106);
    pub const UNEXPECTED_CHARACTER: Self = Self(107);

    // ── Type errors (E200–E299) ──
    pub const UNKNOWN_IDENTIFIER: Self = Self(200);
    pub const DUPLICATE_IDENTIFIER: Self = Self(201);
    pub const TYPE_KIND_MISMATCH: Self = Self(202);
    pub const UNKNOWN_FIELD: Self = Self(203);
    pub const UNKNOWN_LABEL: Self = Self(204);
    pub const DUPLICATE_EXPORT: Self = Self(205);
    pub const VALIDATION_FAILED: Self = Self(210);

    // ── Unsupported features (E300–E399) ──
    pub const UNSUPPORTED_FIELD: Self = Self(300);
    pub const UNSUPPORTED_INSTRUCTION: Self = Self(301);
    pub const UNSUPPORTED_TYPE: Self = Self(302);
    pub const FORWARD_TYPE_REFERENCE: Self = Self(303);

    /// Get the category for this error code.
    pub fn category(self) -> ErrorCategory {
        match self.0 {
            200..=299 => ErrorCategory::Type,
            300..=399 => ErrorCategory::Unsupported,
            _ => ErrorCategory::Grammar,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grammar => write!(f, "grammar"),
            Self::Type => write!(f, "type"),
            Self::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// A located diagnostic produced while compiling a textual module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleError {
    /// Source name (locator or a synthetic inline name).
    pub file: String,
    pub code: ErrorCode,
    pub severity: Severity,
    /// Derived from `code`.
    pub category: ErrorCategory,
    pub message: String,
    #[serde(flatten)]
    pub span: Span,
    /// The exact source line for context.
    pub source_line: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ModuleError {
    /// Create a new error.
    pub fn new(
        file: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
        span: Span,
        source_line: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            code,
            severity: Severity::Error,
            category: code.category(),
            message: message.into(),
            span,
            source_line: source_line.into(),
            suggestion: None,
        }
    }

    /// Attach a fix suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for ModuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} [{}] {}",
            self.file, self.span, self.code, self.category, self.message
        )
    }
}

impl std::error::Error for ModuleError {}

/// Collected diagnostics for one compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileErrors {
    pub errors: Vec<ModuleError>,
    pub warnings: Vec<ModuleError>,
    pub total_errors: usize,
    pub total_warnings: usize,
}

impl CompileErrors {
    /// Create an empty result (no errors).
    pub fn empty() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            total_errors: 0,
            total_warnings: 0,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    /// `true` once the error cap is reached; producers stop scanning.
    pub fn at_limit(&self) -> bool {
        self.total_errors >= MAX_ERRORS
    }

    /// Add an error, respecting the MAX_ERRORS limit.
    pub fn push_error(&mut self, error: ModuleError) {
        if self.errors.len() < MAX_ERRORS {
            self.errors.push(error);
        }
        self.total_errors += 1;
    }

    pub fn push_warning(&mut self, warning: ModuleError) {
        self.warnings.push(warning);
        self.total_warnings += 1;
    }

    /// Append everything from `other`.
    pub fn extend(&mut self, other: CompileErrors) {
        // Errors dropped by `other`'s cap still count.
        let dropped = other.total_errors.saturating_sub(other.errors.len());
        for e in other.errors {
            self.push_error(e);
        }
        self.total_errors += dropped;
        for w in other.warnings {
            self.push_warning(w);
        }
    }

    /// The first error, if any.
    pub fn first(&self) -> Option<&ModuleError> {
        self.errors.first()
    }
}

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{e}")?;
        }
        if self.total_errors > self.errors.len() {
            write!(
                f,
                "\n... and {} more",
                self.total_errors - self.errors.len()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(code: ErrorCode) -> ModuleError {
        ModuleError::new(
            "box.wat",
            code,
            "expected ')'",
            Span::new(3, 5, 3, 9),
            "  (func $f",
        )
    }

    #[test]
    fn test_error_code_category() {
        assert_eq!(ErrorCode::UNCLOSED_PAREN.category(), ErrorCategory::Grammar);
        assert_eq!(ErrorCode::UNKNOWN_FIELD.category(), ErrorCategory::Type);
        assert_eq!(
            ErrorCode::UNSUPPORTED_INSTRUCTION.category(),
            ErrorCategory::Unsupported
        );
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::UNCLOSED_PAREN.to_string(), "E101");
        assert_eq!(ErrorCode::VALIDATION_FAILED.to_string(), "E210");
    }

    #[test]
    fn test_module_error_display() {
        let err = sample(ErrorCode::UNCLOSED_PAREN);
        assert_eq!(err.to_string(), "box.wat:3:5: E101 [grammar] expected ')'");
    }

    #[test]
    fn test_module_error_json() {
        let err = sample(ErrorCode::UNCLOSED_PAREN).with_suggestion("add ')'");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"line\":3"));
        assert!(json.contains("\"column\":5"));
        assert!(json.contains("\"category\":\"grammar\""));
        assert!(json.contains("\"suggestion\":\"add ')'\""));
        let back: ModuleError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn test_compile_errors_max_limit() {
        let mut errs = CompileErrors::empty();
        for _ in 0..25 {
            errs.push_error(sample(ErrorCode::UNEXPECTED_TOKEN));
        }
        assert_eq!(errs.errors.len(), MAX_ERRORS);
        assert_eq!(errs.total_errors, 25);
        assert!(errs.at_limit());
        assert!(errs.to_string().ends_with("... and 5 more"));
    }

    #[test]
    fn test_compile_errors_extend() {
        let mut a = CompileErrors::empty();
        a.push_error(sample(ErrorCode::UNEXPECTED_TOKEN));
        let mut b = CompileErrors::empty();
        b.push_error(sample(ErrorCode::UNKNOWN_FIELD));
        a.extend(b);
        assert_eq!(a.total_errors, 2);
        assert_eq!(a.errors[1].code, ErrorCode::UNKNOWN_FIELD);
    }
}
