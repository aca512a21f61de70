//! Script type classification.
//!
//! A script element is classified from its declared type and, when the type
//! is absent, from the extension of its resource locator. Host scripting
//! identifiers are built in; compiler front ends add their own through
//! [`ScriptTypeClaim`]s, which also makes them raw-capture types.
//!
//! Priority, highest first:
//!
//! 1. absent or empty type → locator extension kind, else `PlainScript`
//! 2. a host scripting identifier → `PlainScript` / `ModuleScript`
//! 3. an identifier claimed by a front end → that front end's kind
//! 4. anything else (including unclaimed `text/…`) → `Unrecognized`
//!
//! Whether the tokenizer captures the body literally is a separate question
//! ([`ScriptTypeRegistry::raw_capture_eligible`]): it depends only on the
//! type string, and an unclaimed `text/…` type is raw-captured when the
//! [`TextPrefixPolicy`] says so.

use std::collections::{BTreeMap, BTreeSet};

use inlet_types::ResolvedKind;
use serde::{Deserialize, Serialize};

/// Host scripting identifiers, canonical and legacy.
const HOST_SCRIPT_TYPES: &[&str] = &[
    "text/javascript",
    "application/javascript",
    "text/ecmascript",
    "application/ecmascript",
    "application/x-javascript",
    "application/x-ecmascript",
    "text/x-javascript",
    "text/x-ecmascript",
    "text/jscript",
    "text/livescript",
    "text/javascript1.0",
    "text/javascript1.1",
    "text/javascript1.2",
    "text/javascript1.3",
    "text/javascript1.4",
    "text/javascript1.5",
];

/// Generic textual category prefix.
const TEXT_PREFIX: &str = "text/";

/// How unclaimed `text/…` types are tokenized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextPrefixPolicy {
    /// Capture the body literally, like a host script.
    #[default]
    RawCapture,
    /// Only registered identifiers are captured; other `text/…` types get a
    /// structural parse.
    RegisteredOnly,
}

/// The identifiers and extensions a front end handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTypeClaim {
    pub kind: ResolvedKind,
    pub types: Vec<String>,
    pub extensions: Vec<String>,
}

impl ScriptTypeClaim {
    pub fn new(kind: ResolvedKind) -> Self {
        Self {
            kind,
            types: Vec::new(),
            extensions: Vec::new(),
        }
    }

    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types.extend(types.into_iter().map(Into::into));
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions.extend(extensions.into_iter().map(Into::into));
        self
    }
}

/// Trim ASCII whitespace and lowercase. Parameters are kept.
pub fn normalize_type(declared: &str) -> String {
    declared
        .trim_matches(|c: char| c.is_ascii_whitespace())
        .to_ascii_lowercase()
}

/// Lowercased extension of a locator's last path segment, ignoring query
/// and fragment.
pub fn locator_extension(locator: &str) -> Option<String> {
    let path = locator
        .split(['?', '#'])
        .next()
        .unwrap_or(locator);
    let segment = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// The open registry of script types.
#[derive(Debug, Clone)]
pub struct ScriptTypeRegistry {
    policy: TextPrefixPolicy,
    types: BTreeMap<String, ResolvedKind>,
    extensions: BTreeMap<String, ResolvedKind>,
    /// Identifiers claimed by front ends of different kinds.
    ambiguous: BTreeSet<String>,
}

impl Default for ScriptTypeRegistry {
    fn default() -> Self {
        Self::new(TextPrefixPolicy::default())
    }
}

impl ScriptTypeRegistry {
    /// A registry with only the host scripting identifiers.
    pub fn new(policy: TextPrefixPolicy) -> Self {
        let mut types: BTreeMap<String, ResolvedKind> = HOST_SCRIPT_TYPES
            .iter()
            .map(|t| (t.to_string(), ResolvedKind::PlainScript))
            .collect();
        types.insert("module".to_string(), ResolvedKind::ModuleScript);
        let extensions = BTreeMap::from([
            ("js".to_string(), ResolvedKind::PlainScript),
            ("mjs".to_string(), ResolvedKind::ModuleScript),
        ]);
        Self {
            policy,
            types,
            extensions,
            ambiguous: BTreeSet::new(),
        }
    }

    pub fn policy(&self) -> TextPrefixPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: TextPrefixPolicy) {
        self.policy = policy;
    }

    /// Add a front end's identifiers and extensions.
    ///
    /// Host identifiers cannot be reclaimed. An identifier claimed by two
    /// different kinds becomes ambiguous and resolves to `Unrecognized`.
    pub fn register(&mut self, claim: &ScriptTypeClaim) {
        for ty in &claim.types {
            let ty = normalize_type(ty);
            if ty.is_empty() {
                continue;
            }
            match self.types.get(&ty).copied() {
                None => {
                    if !self.ambiguous.contains(&ty) {
                        self.types.insert(ty, claim.kind);
                    }
                }
                Some(existing) if existing == claim.kind => {}
                Some(existing) if existing.is_host_script() => {
                    tracing::warn!(ty = %ty, kind = %claim.kind, "cannot reclaim host script type");
                }
                Some(existing) => {
                    tracing::warn!(
                        ty = %ty,
                        %existing,
                        kind = %claim.kind,
                        "script type claimed twice"
                    );
                    self.types.remove(&ty);
                    self.ambiguous.insert(ty);
                }
            }
        }
        for ext in &claim.extensions {
            let ext = ext.trim_start_matches('.').to_ascii_lowercase();
            self.extensions.entry(ext).or_insert(claim.kind);
        }
    }

    /// Kind registered for a declared type, if any.
    pub fn kind_for_type(&self, declared: &str) -> Option<ResolvedKind> {
        self.types.get(&normalize_type(declared)).copied()
    }

    /// Kind registered for a locator's extension, if any.
    pub fn kind_for_locator(&self, locator: &str) -> Option<ResolvedKind> {
        let ext = locator_extension(locator)?;
        self.extensions.get(&ext).copied()
    }

    /// `true` when two front ends of different kinds claim this type.
    pub fn is_ambiguous(&self, declared: Option<&str>) -> bool {
        declared.is_some_and(|t| self.ambiguous.contains(&normalize_type(t)))
    }

    /// Classify a script element for compiler dispatch.
    pub fn resolve(&self, declared: Option<&str>, locator: Option<&str>) -> ResolvedKind {
        let ty = declared.map(normalize_type).unwrap_or_default();
        if ty.is_empty() {
            return locator
                .and_then(|l| self.kind_for_locator(l))
                .unwrap_or(ResolvedKind::PlainScript);
        }
        self.types
            .get(&ty)
            .copied()
            .unwrap_or(ResolvedKind::Unrecognized)
    }

    /// Whether the tokenizer must capture the element body literally.
    ///
    /// Computed from the type string alone.
    pub fn raw_capture_eligible(&self, declared: Option<&str>) -> bool {
        let ty = declared.map(normalize_type).unwrap_or_default();
        if ty.is_empty() || self.types.contains_key(&ty) || self.ambiguous.contains(&ty) {
            return true;
        }
        ty.starts_with(TEXT_PREFIX) && self.policy == TextPrefixPolicy::RawCapture
    }

    /// All identifiers that currently trigger raw capture, sorted.
    pub fn raw_capture_types(&self) -> impl Iterator<Item = &str> {
        self.types
            .keys()
            .chain(self.ambiguous.iter())
            .map(String::as_str)
    }
}
