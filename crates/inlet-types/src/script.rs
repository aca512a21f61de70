//! Script-element data model shared by the markup, compiler and loader crates.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::CompileErrors;

/// Magic prefix of a binary module.
pub const BINARY_MAGIC: &[u8; 4] = b"\0asm";

// ══════════════════════════════════════════════════════════════════════════════
// Declarations
// ══════════════════════════════════════════════════════════════════════════════

/// What a script element declares: a type and exactly one content source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptDeclaration {
    declared_type: Option<String>,
    locator: Option<String>,
    inline_text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeclarationError {
    #[error("script declaration has neither inline text nor a resource locator")]
    NoContent,
    #[error("script declaration has both inline text and a resource locator")]
    BothContents,
}

impl ScriptDeclaration {
    /// Validating constructor: exactly one of `locator` / `inline_text`.
    pub fn new(
        declared_type: Option<String>,
        locator: Option<String>,
        inline_text: Option<String>,
    ) -> Result<Self, DeclarationError> {
        match (&locator, &inline_text) {
            (None, None) => Err(DeclarationError::NoContent),
            (Some(_), Some(_)) => Err(DeclarationError::BothContents),
            _ => Ok(Self {
                declared_type,
                locator,
                inline_text,
            }),
        }
    }

    pub fn inline(declared_type: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            declared_type: declared_type.map(str::to_string),
            locator: None,
            inline_text: Some(text.into()),
        }
    }

    pub fn external(declared_type: Option<&str>, locator: impl Into<String>) -> Self {
        Self {
            declared_type: declared_type.map(str::to_string),
            locator: Some(locator.into()),
            inline_text: None,
        }
    }

    pub fn declared_type(&self) -> Option<&str> {
        self.declared_type.as_deref()
    }

    pub fn locator(&self) -> Option<&str> {
        self.locator.as_deref()
    }

    pub fn inline_text(&self) -> Option<&str> {
        self.inline_text.as_deref()
    }

    /// Name used in diagnostics: the locator, or `inline` for embedded text.
    pub fn source_name(&self) -> &str {
        self.locator.as_deref().unwrap_or("inline")
    }
}

/// Resolved script kind. Always computed from a declaration, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedKind {
    PlainScript,
    ModuleScript,
    TextualModule,
    TypedDialect,
    Unrecognized,
}

impl ResolvedKind {
    /// Kinds handled by a compiler front end rather than the host directly.
    pub fn is_compiled(self) -> bool {
        matches!(self, ResolvedKind::TextualModule | ResolvedKind::TypedDialect)
    }

    /// Kinds the host scripting environment executes as-is.
    pub fn is_host_script(self) -> bool {
        matches!(self, ResolvedKind::PlainScript | ResolvedKind::ModuleScript)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResolvedKind::PlainScript => "plain_script",
            ResolvedKind::ModuleScript => "module_script",
            ResolvedKind::TextualModule => "textual_module",
            ResolvedKind::TypedDialect => "typed_dialect",
            ResolvedKind::Unrecognized => "unrecognized",
        }
    }
}

impl fmt::Display for ResolvedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Sources
// ══════════════════════════════════════════════════════════════════════════════

/// Script content after inline capture or fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceContent {
    Text(String),
    Binary(Vec<u8>),
}

impl SourceContent {
    /// Classify fetched bytes: binary-module magic or invalid UTF-8 stays
    /// binary, everything else is text.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        if bytes.starts_with(BINARY_MAGIC) {
            return SourceContent::Binary(bytes);
        }
        match String::from_utf8(bytes) {
            Ok(text) => SourceContent::Text(text),
            Err(e) => SourceContent::Binary(e.into_bytes()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            SourceContent::Text(t) => t.as_bytes(),
            SourceContent::Binary(b) => b,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// Content handed to a front end, with its diagnostic name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource {
    pub name: String,
    pub locator: Option<String>,
    pub content: SourceContent,
}

impl ScriptSource {
    pub fn inline(text: impl Into<String>) -> Self {
        Self {
            name: "inline".to_string(),
            locator: None,
            content: SourceContent::Text(text.into()),
        }
    }

    pub fn fetched(locator: impl Into<String>, bytes: Vec<u8>) -> Self {
        let locator = locator.into();
        Self {
            name: locator.clone(),
            locator: Some(locator),
            content: SourceContent::from_bytes(bytes),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Artifacts
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Global,
}

/// One exported symbol, in module export order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportEntry {
    pub name: String,
    pub kind: SymbolKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessorOp {
    Get,
    Set,
    Len,
}

/// A synthesized export that reads or writes a structured value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accessor {
    pub export_name: String,
    pub type_name: String,
    /// Field name for struct accessors; `None` for array element accessors.
    pub field: Option<String>,
    pub op: AccessorOp,
}

/// An import the instantiating environment must provide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequirement {
    pub module: String,
    pub name: String,
    pub kind: SymbolKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "data")]
pub enum ArtifactPayload {
    /// Binary module bytes.
    Module(Vec<u8>),
    /// Host script text produced by a transpiling front end.
    Script(String),
}

/// The immutable result of one successful compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledArtifact {
    pub payload: ArtifactPayload,
    pub exports: Vec<ExportEntry>,
    pub accessors: Vec<Accessor>,
    pub imports: Vec<ImportRequirement>,
    /// Warnings produced alongside a successful compilation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<CompileErrors>,
    pub notes: Vec<String>,
}

impl CompiledArtifact {
    pub fn module(bytes: Vec<u8>) -> Self {
        Self {
            payload: ArtifactPayload::Module(bytes),
            exports: Vec::new(),
            accessors: Vec::new(),
            imports: Vec::new(),
            diagnostics: None,
            notes: Vec::new(),
        }
    }

    pub fn script(text: String) -> Self {
        Self {
            payload: ArtifactPayload::Script(text),
            ..Self::module(Vec::new())
        }
    }

    pub fn module_bytes(&self) -> Option<&[u8]> {
        match &self.payload {
            ArtifactPayload::Module(bytes) => Some(bytes),
            ArtifactPayload::Script(_) => None,
        }
    }

    /// Export names in module order.
    pub fn export_names(&self) -> impl Iterator<Item = &str> {
        self.exports.iter().map(|e| e.name.as_str())
    }
}

/// Failure taxonomy surfaced through the diagnostics side channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    ClassificationAmbiguous,
    GrammarError,
    UnsupportedFeature,
    InstantiationFailure,
    SourceUnavailable,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::ClassificationAmbiguous => "ClassificationAmbiguous",
            FailureKind::GrammarError => "GrammarError",
            FailureKind::UnsupportedFeature => "UnsupportedFeature",
            FailureKind::InstantiationFailure => "InstantiationFailure",
            FailureKind::SourceUnavailable => "SourceUnavailable",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_requires_exactly_one_source() {
        assert_eq!(
            ScriptDeclaration::new(None, None, None),
            Err(DeclarationError::NoContent)
        );
        assert_eq!(
            ScriptDeclaration::new(None, Some("a.wat".into()), Some("(module)".into())),
            Err(DeclarationError::BothContents)
        );
        let decl = ScriptDeclaration::new(Some("wat".into()), Some("a.wat".into()), None).unwrap();
        assert_eq!(decl.source_name(), "a.wat");
        assert_eq!(ScriptDeclaration::inline(None, "x").source_name(), "inline");
    }

    #[test]
    fn test_source_content_from_bytes() {
        assert_eq!(
            SourceContent::from_bytes(b"(module)".to_vec()),
            SourceContent::Text("(module)".into())
        );
        let bin = vec![0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
        assert_eq!(
            SourceContent::from_bytes(bin.clone()),
            SourceContent::Binary(bin)
        );
        assert!(matches!(
            SourceContent::from_bytes(vec![0xff, 0xfe]),
            SourceContent::Binary(_)
        ));
    }

    #[test]
    fn test_kind_predicates() {
        assert!(ResolvedKind::TextualModule.is_compiled());
        assert!(ResolvedKind::TypedDialect.is_compiled());
        assert!(!ResolvedKind::PlainScript.is_compiled());
        assert!(ResolvedKind::ModuleScript.is_host_script());
        assert!(!ResolvedKind::Unrecognized.is_host_script());
    }

    #[test]
    fn test_artifact_export_names_keep_order() {
        let mut artifact = CompiledArtifact::module(vec![]);
        for name in ["make", "add", "counter"] {
            artifact.exports.push(ExportEntry {
                name: name.into(),
                kind: SymbolKind::Function,
            });
        }
        assert_eq!(
            artifact.export_names().collect::<Vec<_>>(),
            vec!["make", "add", "counter"]
        );
        assert!(artifact.module_bytes().is_some());
        assert!(CompiledArtifact::script("x".into()).module_bytes().is_none());
    }
}
