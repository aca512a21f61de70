//! Document pipeline.
//!
//! ```text
//! markup → Tokenizer (raw capture per registry) → ScriptElement*
//!        → classify → fetch → CompilePool → ArtifactCache → front end
//!        → LoaderPlan → glue, in document order
//! ```
//!
//! Tokenizing, fetching and glue rendering run on the calling thread.
//! Compilation jobs go to the [`CompilePool`]; each job answers on its own
//! channel and replies are collected in document order.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, SendError, Sender};
use inlet_loader::{render_glue, LoaderPlan};
use inlet_markup::{CaptureMode, MarkupNote, ScriptTypeRegistry, Tokenizer};
use inlet_types::{
    CompileErrors, CompiledArtifact, FailureKind, ResolvedKind, ScriptSource, SourceContent,
};
use serde::{Deserialize, Serialize};

use crate::cache::{ArtifactCache, CacheKey, CompileFailure, CompileOutcome};
use crate::config::PipelineConfig;
use crate::frontend::{FrontEnd, FrontEnds, TextualModuleFrontEnd, Transpiler, TypedDialectFrontEnd};

// ══════════════════════════════════════════════════════════════════════════════
// Fetching
// ══════════════════════════════════════════════════════════════════════════════

/// Resolves a resource locator to its bytes.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, String>;
}

/// Fails every fetch. The default until the embedder supplies a fetcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFetcher;

impl Fetcher for NoFetcher {
    fn fetch(&self, _locator: &str) -> Result<Vec<u8>, String> {
        Err("no fetcher configured".to_string())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Worker pool
// ══════════════════════════════════════════════════════════════════════════════

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool of compile threads fed by one channel.
///
/// With zero workers, jobs run on the submitting thread.
pub struct CompilePool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl CompilePool {
    pub fn new(threads: usize) -> Self {
        if threads == 0 {
            return Self::inline();
        }
        let (sender, receiver) = channel::unbounded::<Job>();
        let mut workers = Vec::with_capacity(threads);
        for id in 0..threads {
            let receiver = receiver.clone();
            let spawned = thread::Builder::new()
                .name(format!("inlet-compile-{id}"))
                .spawn(move || {
                    for job in receiver.iter() {
                        job();
                    }
                });
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => tracing::warn!(worker = id, error = %e, "failed to spawn compile worker"),
            }
        }
        if workers.is_empty() {
            return Self::inline();
        }
        tracing::debug!(workers = workers.len(), "compile pool started");
        Self {
            sender: Some(sender),
            workers,
        }
    }

    pub fn inline() -> Self {
        Self {
            sender: None,
            workers: Vec::new(),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Run `work` on a worker; the result arrives on the returned channel.
    pub fn submit<T, F>(&self, work: F) -> Receiver<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (reply, receiver) = channel::bounded(1);
        let job: Job = Box::new(move || {
            // The caller may have stopped listening.
            let _ = reply.send(work());
        });
        match &self.sender {
            Some(sender) => {
                if let Err(SendError(job)) = sender.send(job) {
                    job();
                }
            }
            None => job(),
        }
        receiver
    }
}

impl Drop for CompilePool {
    fn drop(&mut self) {
        // Closing the channel ends each worker's receive loop.
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Reports
// ══════════════════════════════════════════════════════════════════════════════

/// One entry of the diagnostics side channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Index of the script element in document order.
    pub script: usize,
    pub module: String,
    pub kind: FailureKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<CompileErrors>,
}

impl Diagnostic {
    fn from_failure(script: usize, module: &str, failure: &CompileFailure) -> Self {
        Self {
            script,
            module: module.to_string(),
            kind: failure.kind(),
            message: failure.to_string(),
            errors: failure.errors().cloned(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ScriptOutcome {
    /// Left for the host to execute as written.
    HostScript,
    /// Compiled; `glue` is ready for the scripting environment.
    Compiled {
        artifact: Arc<CompiledArtifact>,
        glue: String,
    },
    /// No artifact. The reason, if any, is in the diagnostics or notes.
    Inert,
}

#[derive(Debug, Clone)]
pub struct ScriptReport {
    pub index: usize,
    /// Locator, or `inline-<index>` for embedded text.
    pub name: String,
    pub kind: ResolvedKind,
    pub mode: CaptureMode,
    pub range: std::ops::Range<usize>,
    pub outcome: ScriptOutcome,
}

impl ScriptReport {
    pub fn glue(&self) -> Option<&str> {
        match &self.outcome {
            ScriptOutcome::Compiled { glue, .. } => Some(glue),
            _ => None,
        }
    }

    pub fn artifact(&self) -> Option<&Arc<CompiledArtifact>> {
        match &self.outcome {
            ScriptOutcome::Compiled { artifact, .. } => Some(artifact),
            _ => None,
        }
    }
}

/// Everything the pipeline learned about one document.
#[derive(Debug, Clone, Default)]
pub struct DocumentReport {
    /// Every script element, in document order.
    pub scripts: Vec<ScriptReport>,
    /// Failures, ordered by script.
    pub diagnostics: Vec<Diagnostic>,
    /// Tokenizer notes and informational notes about inert scripts.
    pub notes: Vec<MarkupNote>,
}

impl DocumentReport {
    /// Glue for each compiled script, in document order.
    pub fn glue(&self) -> impl Iterator<Item = &str> {
        self.scripts.iter().filter_map(ScriptReport::glue)
    }

    pub fn has_failures(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Pipeline
// ══════════════════════════════════════════════════════════════════════════════

struct PendingCompile {
    slot: usize,
    key: CacheKey,
    front_end: Arc<dyn FrontEnd>,
    source: Arc<ScriptSource>,
    reply: Receiver<CompileOutcome>,
}

pub struct DocumentPipeline {
    config: PipelineConfig,
    registry: ScriptTypeRegistry,
    front_ends: FrontEnds,
    cache: Arc<ArtifactCache>,
    fetcher: Arc<dyn Fetcher>,
    pool: CompilePool,
}

impl Default for DocumentPipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl DocumentPipeline {
    /// A pipeline with the textual-module front end, a typed-dialect front end
    /// without a transpiler, the global cache and no fetcher.
    pub fn new(config: PipelineConfig) -> Self {
        let pool = CompilePool::new(config.worker_threads);
        let mut pipeline = Self {
            registry: ScriptTypeRegistry::new(config.text_prefix),
            front_ends: FrontEnds::new(),
            cache: ArtifactCache::global(),
            fetcher: Arc::new(NoFetcher),
            pool,
            config,
        };
        pipeline.add_front_end(Arc::new(TextualModuleFrontEnd));
        pipeline.add_front_end(Arc::new(TypedDialectFrontEnd::default()));
        pipeline
    }

    pub fn with_front_end(mut self, front_end: Arc<dyn FrontEnd>) -> Self {
        self.add_front_end(front_end);
        self
    }

    pub fn with_transpiler(self, transpiler: Arc<dyn Transpiler>) -> Self {
        self.with_front_end(Arc::new(TypedDialectFrontEnd::new(transpiler)))
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_cache(mut self, cache: Arc<ArtifactCache>) -> Self {
        self.cache = cache;
        self
    }

    fn add_front_end(&mut self, front_end: Arc<dyn FrontEnd>) {
        self.registry.register(&front_end.claim());
        self.front_ends.insert(front_end);
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn registry(&self) -> &ScriptTypeRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<ArtifactCache> {
        &self.cache
    }

    pub fn pool(&self) -> &CompilePool {
        &self.pool
    }

    /// Compile one source through the cache on the calling thread.
    pub fn compile_script(&self, kind: ResolvedKind, source: &ScriptSource) -> CompileOutcome {
        let Some(front_end) = self.front_ends.get(kind) else {
            return Err(CompileFailure::Unsupported {
                name: source.name.clone(),
                message: format!("no front end compiles {kind}"),
            });
        };
        let key = cache_key(kind, source);
        self.cache.get_or_compile(&key, || front_end.compile(source))
    }

    /// Tokenize `document`, compile every claimed script and render glue.
    ///
    /// Never fails: problems are recorded in the report and the affected
    /// script is left inert.
    pub fn process(&self, document: &str) -> DocumentReport {
        let markup = Tokenizer::new(document, &self.registry).tokenize();
        tracing::debug!(
            scripts = markup.scripts.len(),
            tokens = markup.tokens.len(),
            "document tokenized"
        );

        let mut report = DocumentReport {
            scripts: Vec::with_capacity(markup.scripts.len()),
            diagnostics: Vec::new(),
            notes: markup.notes,
        };
        let mut pending = Vec::new();

        for (index, element) in markup.scripts.iter().enumerate() {
            let declaration = &element.declaration;
            let declared = declaration.declared_type();
            let kind = self.registry.resolve(declared, declaration.locator());
            let name = declaration
                .locator()
                .map(str::to_string)
                .unwrap_or_else(|| format!("inline-{index}"));
            let slot = report.scripts.len();
            report.scripts.push(ScriptReport {
                index,
                name: name.clone(),
                kind,
                mode: element.mode,
                range: element.range.clone(),
                outcome: ScriptOutcome::Inert,
            });

            if self.registry.is_ambiguous(declared) {
                report.diagnostics.push(Diagnostic {
                    script: index,
                    module: name,
                    kind: FailureKind::ClassificationAmbiguous,
                    message: format!(
                        "script type `{}` is claimed by more than one front end",
                        declared.unwrap_or_default()
                    ),
                    errors: None,
                });
                continue;
            }
            if kind.is_host_script() {
                report.scripts[slot].outcome = ScriptOutcome::HostScript;
                continue;
            }
            let front_end = match self.front_ends.get(kind) {
                Some(front_end) if kind.is_compiled() => Arc::clone(front_end),
                _ => {
                    tracing::debug!(script = index, ty = declared.unwrap_or_default(), "unrecognized script type");
                    report.notes.push(MarkupNote {
                        offset: element.range.start,
                        message: format!(
                            "script type `{}` is not recognized; element left inert",
                            declared.unwrap_or_default()
                        ),
                    });
                    continue;
                }
            };

            let source = match declaration.locator() {
                Some(locator) => match self.fetcher.fetch(locator) {
                    Ok(bytes) => ScriptSource::fetched(locator, bytes),
                    Err(message) => {
                        tracing::warn!(locator, %message, "script source unavailable");
                        let failure = CompileFailure::SourceUnavailable {
                            locator: locator.to_string(),
                            message,
                        };
                        report
                            .diagnostics
                            .push(Diagnostic::from_failure(index, &name, &failure));
                        continue;
                    }
                },
                None => ScriptSource {
                    name: name.clone(),
                    locator: None,
                    content: SourceContent::Text(
                        declaration.inline_text().unwrap_or_default().to_string(),
                    ),
                },
            };

            let source = Arc::new(source);
            let key = cache_key(kind, &source);
            let reply = {
                let cache = Arc::clone(&self.cache);
                let front_end = Arc::clone(&front_end);
                let source = Arc::clone(&source);
                let key = key.clone();
                self.pool
                    .submit(move || cache.get_or_compile(&key, || front_end.compile(&source)))
            };
            pending.push(PendingCompile {
                slot,
                key,
                front_end,
                source,
                reply,
            });
        }

        for job in pending {
            // A worker that died mid-job left the slot unfilled; finish here.
            let outcome = job.reply.recv().unwrap_or_else(|_| {
                self.cache
                    .get_or_compile(&job.key, || job.front_end.compile(&job.source))
            });
            let script = &mut report.scripts[job.slot];
            match outcome {
                Ok(artifact) => {
                    let plan = LoaderPlan::from_artifact(&artifact).named(script.name.as_str());
                    let glue = render_glue(&plan, &self.config.glue);
                    script.outcome = ScriptOutcome::Compiled { artifact, glue };
                }
                Err(failure) => {
                    report.diagnostics.push(Diagnostic::from_failure(
                        script.index,
                        &script.name,
                        &failure,
                    ));
                }
            }
        }

        report.diagnostics.sort_by_key(|d| d.script);
        report
    }
}

fn cache_key(kind: ResolvedKind, source: &ScriptSource) -> CacheKey {
    let key = CacheKey::new(kind, source.content.as_bytes());
    match &source.locator {
        Some(locator) => key.with_locator(locator.as_str()),
        None => key,
    }
}
