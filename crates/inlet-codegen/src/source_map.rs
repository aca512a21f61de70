//! Source mapping: binary function index to module-text location.
//!
//! Each entry maps a compiled function to the span of the `(func …)` it was
//! lowered from. Validation failures use it to point at the offending
//! function, and hosts can use it to resolve traps.

use serde::{Deserialize, Serialize};

/// A complete source map for a compiled module.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceMap {
    pub entries: Vec<SourceMapEntry>,
}

/// A single source map entry: one function → one source region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMapEntry {
    /// Absolute function index (imports included).
    pub func_index: u32,
    /// `$name` of the function, its first export name, or `func<N>`.
    pub func_name: String,
    pub kind: FuncKind,
    /// Source span (1-based line/column).
    pub span: inlet_types::Span,
}

/// Where a compiled function came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FuncKind {
    /// Written in the module text.
    Defined,
    /// Synthesized GC field accessor.
    Accessor,
}

impl SourceMap {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push(
        &mut self,
        func_index: u32,
        func_name: impl Into<String>,
        kind: FuncKind,
        span: inlet_types::Span,
    ) {
        self.entries.push(SourceMapEntry {
            func_index,
            func_name: func_name.into(),
            kind,
            span,
        });
    }

    /// Find the entry for a function index.
    pub fn find_by_func_index(&self, func_index: u32) -> Option<&SourceMapEntry> {
        self.entries.iter().find(|e| e.func_index == func_index)
    }
}
