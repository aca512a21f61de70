//! Compiled-artifact cache.
//!
//! One physical compilation per [`CacheKey`] for the life of the cache.
//! Concurrent callers with the same key share a single claim slot: the first
//! caller compiles, the rest block on the slot until the result is stored.
//! Failures are stored the same way and never retried.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use inlet_types::{CompileErrors, CompiledArtifact, ErrorCategory, FailureKind, ResolvedKind};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use thiserror::Error;

// ══════════════════════════════════════════════════════════════════════════════
// Keys
// ══════════════════════════════════════════════════════════════════════════════

/// Content identity of a compilation request.
///
/// Equality and hashing use only the digest of the front-end kind and the
/// content bytes. The locator rides along for diagnostics, so the same text
/// delivered inline and fetched shares one entry.
#[derive(Debug, Clone)]
pub struct CacheKey {
    digest: [u8; 32],
    locator: Option<String>,
}

impl CacheKey {
    pub fn new(kind: ResolvedKind, content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(kind.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(content);
        Self {
            digest: hasher.finalize().into(),
            locator: None,
        }
    }

    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = Some(locator.into());
        self
    }

    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    pub fn locator(&self) -> Option<&str> {
        self.locator.as_deref()
    }

    /// Lowercase hex digest.
    pub fn hex(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.digest == other.digest
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.digest.hash(state);
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.digest {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Failures
// ══════════════════════════════════════════════════════════════════════════════

/// Why a script produced no artifact.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileFailure {
    /// The front end rejected the source with located diagnostics.
    #[error("{kind} in {name}:\n{errors}")]
    Diagnostics {
        kind: FailureKind,
        name: String,
        errors: CompileErrors,
    },
    /// The source uses something no front end implements.
    #[error("unsupported in {name}: {message}")]
    Unsupported { name: String, message: String },
    /// The external resource could not be fetched.
    #[error("source unavailable: {locator}: {message}")]
    SourceUnavailable { locator: String, message: String },
}

impl CompileFailure {
    /// Wrap front-end diagnostics, classifying by the first error's code.
    pub fn from_errors(name: impl Into<String>, errors: CompileErrors) -> Self {
        let kind = match errors.first().map(|e| e.category) {
            Some(ErrorCategory::Unsupported) => FailureKind::UnsupportedFeature,
            _ => FailureKind::GrammarError,
        };
        CompileFailure::Diagnostics {
            kind,
            name: name.into(),
            errors,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            CompileFailure::Diagnostics { kind, .. } => *kind,
            CompileFailure::Unsupported { .. } => FailureKind::UnsupportedFeature,
            CompileFailure::SourceUnavailable { .. } => FailureKind::SourceUnavailable,
        }
    }

    /// Located diagnostics, when the failure carries them.
    pub fn errors(&self) -> Option<&CompileErrors> {
        match self {
            CompileFailure::Diagnostics { errors, .. } => Some(errors),
            _ => None,
        }
    }
}

pub type CompileOutcome = Result<Arc<CompiledArtifact>, CompileFailure>;

// ══════════════════════════════════════════════════════════════════════════════
// Cache
// ══════════════════════════════════════════════════════════════════════════════

type Slot = Arc<OnceLock<CompileOutcome>>;

/// Single-flight, never-evicting artifact cache.
#[derive(Debug, Default)]
pub struct ArtifactCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
    compilations: AtomicUsize,
}

static GLOBAL: OnceLock<Arc<ArtifactCache>> = OnceLock::new();

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache.
    pub fn global() -> Arc<ArtifactCache> {
        GLOBAL.get_or_init(|| Arc::new(ArtifactCache::new())).clone()
    }

    /// Return the stored outcome for `key`, running `compile` if this is the
    /// first request. Callers racing on the same key wait for that one run.
    pub fn get_or_compile<F>(&self, key: &CacheKey, compile: F) -> CompileOutcome
    where
        F: FnOnce() -> Result<CompiledArtifact, CompileFailure>,
    {
        // The map lock is held only to claim the slot, never across `compile`.
        let slot = {
            let mut slots = self.slots.lock();
            slots.entry(key.clone()).or_default().clone()
        };

        let mut compiled_here = false;
        let outcome = slot.get_or_init(|| {
            compiled_here = true;
            self.compilations.fetch_add(1, Ordering::SeqCst);
            tracing::info!(
                key = %key,
                locator = key.locator().unwrap_or("inline"),
                "compiling script"
            );
            let outcome = compile().map(Arc::new);
            if let Err(failure) = &outcome {
                tracing::warn!(key = %key, kind = %failure.kind(), "compilation failed");
            }
            outcome
        });
        if !compiled_here {
            tracing::debug!(key = %key, "artifact cache hit");
        }
        outcome.clone()
    }

    /// The stored outcome, without compiling. `None` while absent or in flight.
    pub fn peek(&self, key: &CacheKey) -> Option<CompileOutcome> {
        let slot = self.slots.lock().get(key).cloned()?;
        slot.get().cloned()
    }

    /// Number of physical compilations run so far.
    pub fn compilations(&self) -> usize {
        self.compilations.load(Ordering::SeqCst)
    }

    /// Number of claimed keys, including in-flight ones.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
