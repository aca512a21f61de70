//! End-to-end pipeline tests.
//!
//! Tests verify the full path: markup → raw capture → compile → glue, plus
//! the single-source `compile` / `compile_to_result` entry points.

use std::collections::HashMap;
use std::sync::Arc;

use inlet_compiler::{
    compile, compile_to_result, ArtifactCache, CompileResult, DocumentPipeline, Fetcher,
    PipelineConfig, ScriptOutcome, Transpiler,
};
use inlet_markup::{CaptureMode, TextPrefixPolicy};
use inlet_types::{CompileErrors, ErrorCode, FailureKind, ResolvedKind, ScriptSource};
use pretty_assertions::assert_eq;
use wasmi::{Engine, Linker, Module, Store};

// ══════════════════════════════════════════════════════════════════════════════
// Fixtures
// ══════════════════════════════════════════════════════════════════════════════

const ADD: &str = r#"
(module
  (func $add (export "add") (param $a i32) (param $b i32) (result i32)
    local.get $a
    local.get $b
    i32.add))
"#;

const POINT: &str = r#"
(module
  (type $Point (struct (field $x (mut i32)) (field $y i32)))
  (func (export "make") (param i32 i32) (result (ref $Point))
    (struct.new $Point (local.get 0) (local.get 1))))
"#;

/// Drops `: number` annotations; enough of a dialect for pipeline tests.
struct StripAnnotations;

impl Transpiler for StripAnnotations {
    fn transpile(&self, source: &str, _name: &str) -> Result<String, CompileErrors> {
        Ok(source.replace(": number", ""))
    }
}

/// Serves fixed bytes per locator.
#[derive(Default)]
struct MapFetcher {
    files: HashMap<String, Vec<u8>>,
}

impl MapFetcher {
    fn with(mut self, locator: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.insert(locator.to_string(), bytes.into());
        self
    }
}

impl Fetcher for MapFetcher {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, String> {
        self.files
            .get(locator)
            .cloned()
            .ok_or_else(|| format!("404 {locator}"))
    }
}

fn pipeline(config: PipelineConfig) -> DocumentPipeline {
    DocumentPipeline::new(config).with_cache(Arc::new(ArtifactCache::new()))
}

fn call_add(wasm: &[u8], a: i32, b: i32) -> i32 {
    let engine = Engine::default();
    let module = Module::new(&engine, wasm).expect("failed to parse wasm module");
    let mut store = Store::new(&engine, ());
    let linker = Linker::<()>::new(&engine);
    let instance = linker
        .instantiate(&mut store, &module)
        .expect("failed to instantiate")
        .start(&mut store)
        .expect("failed to start instance");
    let add = instance
        .get_typed_func::<(i32, i32), i32>(&store, "add")
        .expect("add export");
    add.call(&mut store, (a, b)).expect("call add")
}

fn wrap(body: &str) -> String {
    format!("<!doctype html>\n<html><body>\n{body}\n</body></html>\n")
}

// ══════════════════════════════════════════════════════════════════════════════
// 1. Single-source compilation
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn add_compiles_and_runs() {
    let wasm = compile(ADD, "add.wat").expect("add must compile");
    assert_eq!(&wasm[0..4], b"\0asm");
    assert_eq!(call_add(&wasm, 5, 7), 12);
}

#[test]
fn missing_close_paren_is_grammar_error() {
    let errors = compile("(module (func $f (result i32) (i32.const 1)", "bad.wat").unwrap_err();
    assert!(errors.has_errors());
    assert_eq!(errors.errors[0].code, ErrorCode::UNCLOSED_PAREN);
    assert_eq!(errors.errors[0].file, "bad.wat");
}

#[test]
fn syntax_error_produces_structured_json() {
    let result = compile_to_result("(module (func", "bad.wat");
    assert!(!result.success);
    assert!(result.wasm.is_none());
    assert!(result.errors.has_errors());

    let json = serde_json::to_string(&result).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["success"], false);
    assert!(parsed["errors"]["errors"].is_array());
    assert!(parsed["errors"]["total_errors"].as_u64().unwrap() > 0);
}

#[test]
fn valid_module_produces_success_result() {
    let result = compile_to_result(POINT, "point.wat");
    assert!(result.success, "Point should compile: {}", result.errors);
    assert!(result.wasm.is_some());
    assert!(!result.errors.has_errors());
    assert_eq!(result.accessors.len(), 3);

    let json = serde_json::to_string(&result).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["success"], true);
    assert!(!parsed["wasm"].is_null());
    assert_eq!(parsed["exports"][0]["name"], "make");
}

#[test]
fn compile_result_json_roundtrip() {
    let result = compile_to_result(ADD, "add.wat");
    let json = serde_json::to_string(&result).unwrap();
    let rt: CompileResult = serde_json::from_str(&json).unwrap();
    assert_eq!(rt.success, result.success);
    assert_eq!(rt.wasm, result.wasm);
    assert_eq!(rt.exports, result.exports);
}

#[test]
fn same_source_is_byte_identical() {
    let first = compile_to_result(POINT, "point.wat");
    for _ in 0..100 {
        let again = compile_to_result(POINT, "point.wat");
        assert_eq!(again.wasm, first.wasm);
        assert_eq!(again.exports, first.exports);
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// 2. Document pipeline
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn mixed_document_in_order() {
    let doc = wrap(&format!(
        r#"<p>Sum &amp; more</p>
<script type="wat">{ADD}</script>
<script>console.log("a < b");</script>
<script type="text/x-template"><div>{{{{ x }}}}</div></script>
<script type="text/typescript">let x: number = 1 < 2 ? 3 : 4;</script>"#
    ));
    let pipeline = pipeline(PipelineConfig::default()).with_transpiler(Arc::new(StripAnnotations));
    let report = pipeline.process(&doc);

    let kinds: Vec<_> = report.scripts.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ResolvedKind::TextualModule,
            ResolvedKind::PlainScript,
            ResolvedKind::Unrecognized,
            ResolvedKind::TypedDialect,
        ]
    );
    assert!(report
        .scripts
        .iter()
        .all(|s| s.mode == CaptureMode::RawCapture));
    assert!(!report.has_failures(), "{:?}", report.diagnostics);

    let module = &report.scripts[0];
    assert_eq!(module.name, "inline-0");
    let glue = module.glue().expect("module glue");
    assert!(glue.contains("WebAssembly.instantiate(bytes, imports)"));
    assert!(glue.contains("bindings[\"add\"] = exports[\"add\"];"));
    assert!(glue.contains("var name = \"inline-0\";"));

    assert!(matches!(report.scripts[1].outcome, ScriptOutcome::HostScript));
    assert!(matches!(report.scripts[2].outcome, ScriptOutcome::Inert));
    assert!(report
        .notes
        .iter()
        .any(|n| n.message.contains("text/x-template")));

    assert_eq!(
        report.scripts[3].glue(),
        Some("let x = 1 < 2 ? 3 : 4;")
    );
    assert_eq!(report.glue().count(), 2);
}

#[test]
fn module_text_with_markup_characters_compiles() {
    // `<`, `>` and `&` inside a string would break a structural parse.
    let doc = wrap(
        r#"<script type="application/wasm">
(module
  (import "env" "log" (func $log (param i32)))
  (func (export "run") ;; prints "</b> & <i>"
    (call $log (i32.const 1))))
</script>"#,
    );
    let report = pipeline(PipelineConfig::default()).process(&doc);
    assert!(!report.has_failures(), "{:?}", report.diagnostics);
    let artifact = report.scripts[0].artifact().expect("artifact");
    assert_eq!(artifact.imports.len(), 1);
    assert!(report.scripts[0]
        .glue()
        .unwrap()
        .contains("var imports = (g[\"__inletImports\"] || {})[name] || {};"));
}

#[test]
fn compiled_module_executes() {
    let doc = wrap(&format!("<script type=\"WAT\">{ADD}</script>"));
    let report = pipeline(PipelineConfig::default()).process(&doc);
    let artifact = report.scripts[0].artifact().expect("artifact");
    let wasm = artifact.module_bytes().expect("module payload");
    assert_eq!(call_add(wasm, 5, 7), 12);
    assert_eq!(call_add(wasm, i32::MAX, 1), i32::MIN);
}

#[test]
fn grammar_error_renders_element_inert() {
    let doc = wrap(
        r#"<script type="wat">(module (func $f (result i32) (i32.const 1)</script>
<script type="wat">(module (func (export "ok")))</script>"#,
    );
    let report = pipeline(PipelineConfig::default()).process(&doc);

    assert!(matches!(report.scripts[0].outcome, ScriptOutcome::Inert));
    assert!(report.scripts[1].glue().is_some());
    assert_eq!(report.diagnostics.len(), 1);
    let diagnostic = &report.diagnostics[0];
    assert_eq!(diagnostic.script, 0);
    assert_eq!(diagnostic.kind, FailureKind::GrammarError);
    let errors = diagnostic.errors.as_ref().expect("located errors");
    assert_eq!(errors.errors[0].code, ErrorCode::UNCLOSED_PAREN);
    assert_eq!(errors.errors[0].file, "inline-0");
}

#[test]
fn unsupported_feature_is_reported() {
    let doc = wrap(r#"<script type="wat">(module (memory 1) (func))</script>"#);
    let report = pipeline(PipelineConfig::default()).process(&doc);
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].kind, FailureKind::UnsupportedFeature);
}

#[test]
fn typed_dialect_without_transpiler_is_unsupported_but_captured() {
    let doc = wrap(r#"<script type="text/typescript">let a: number = 1 < 2;</script><p>after</p>"#);
    let report = pipeline(PipelineConfig::default()).process(&doc);
    assert_eq!(report.scripts[0].mode, CaptureMode::RawCapture);
    assert_eq!(report.diagnostics[0].kind, FailureKind::UnsupportedFeature);
}

#[test]
fn external_sources_are_fetched() {
    let fetcher = MapFetcher::default()
        .with("mods/add.wat", ADD)
        .with("mods/bin.wasm", compile(ADD, "add.wat").unwrap());
    let doc = wrap(
        r#"<script src="mods/add.wat"></script>
<script src="mods/bin.wasm?v=2"></script>
<script src="mods/missing.wat"></script>"#,
    );
    let report = pipeline(PipelineConfig::default())
        .with_fetcher(Arc::new(fetcher))
        .process(&doc);

    // Extension fallback: no type attribute.
    assert_eq!(report.scripts[0].kind, ResolvedKind::TextualModule);
    assert_eq!(report.scripts[1].kind, ResolvedKind::TextualModule);
    assert!(report.scripts[0].glue().is_some());
    assert_eq!(report.scripts[0].name, "mods/add.wat");

    // The query is ignored for classification but fetched as written.
    assert!(matches!(report.scripts[1].outcome, ScriptOutcome::Inert));

    assert_eq!(report.diagnostics.len(), 2);
    assert_eq!(report.diagnostics[0].kind, FailureKind::SourceUnavailable);
    assert_eq!(report.diagnostics[0].script, 1);
    assert_eq!(report.diagnostics[1].kind, FailureKind::SourceUnavailable);
    assert!(report.diagnostics[1].message.contains("404 mods/missing.wat"));
}

#[test]
fn binary_source_passes_through() {
    let wasm = compile(ADD, "add.wat").unwrap();
    let fetcher = MapFetcher::default().with("lib/add.wasm", wasm.clone());
    let doc = wrap(r#"<script type="application/wasm" src="lib/add.wasm"></script>"#);
    let report = pipeline(PipelineConfig::default())
        .with_fetcher(Arc::new(fetcher))
        .process(&doc);
    let artifact = report.scripts[0].artifact().expect("artifact");
    assert_eq!(artifact.module_bytes(), Some(wasm.as_slice()));
    assert_eq!(artifact.export_names().collect::<Vec<_>>(), vec!["add"]);
    assert!(artifact.accessors.is_empty());
}

#[test]
fn inline_and_fetched_share_one_compilation() {
    let cache = Arc::new(ArtifactCache::new());
    let fetcher = MapFetcher::default().with("add.wat", ADD);
    let doc = wrap(&format!(
        "<script type=\"wat\">{ADD}</script>\n<script type=\"wat\" src=\"add.wat\"></script>"
    ));
    let report = DocumentPipeline::new(PipelineConfig::default())
        .with_cache(Arc::clone(&cache))
        .with_fetcher(Arc::new(fetcher))
        .process(&doc);

    assert_eq!(cache.compilations(), 1);
    let a = report.scripts[0].artifact().unwrap();
    let b = report.scripts[1].artifact().unwrap();
    assert!(Arc::ptr_eq(a, b));
    // Same artifact, different registry names.
    assert!(report.scripts[1].glue().unwrap().contains("var name = \"add.wat\";"));
}

#[test]
fn worker_pool_matches_inline() {
    let mut body = String::new();
    for i in 0..12 {
        body.push_str(&format!(
            "<script type=\"wat\">(module (func (export \"f{i}\") (result i32) (i32.const {i})))</script>\n"
        ));
    }
    body.push_str("<script type=\"wat\">(module (func</script>\n");
    let doc = wrap(&body);

    let inline = pipeline(PipelineConfig::default()).process(&doc);
    let pooled = pipeline(PipelineConfig {
        worker_threads: 4,
        ..PipelineConfig::default()
    })
    .process(&doc);

    let inline_glue: Vec<_> = inline.glue().collect();
    let pooled_glue: Vec<_> = pooled.glue().collect();
    assert_eq!(inline_glue.len(), 12);
    assert_eq!(inline_glue, pooled_glue);
    assert_eq!(inline.diagnostics, pooled.diagnostics);
    assert_eq!(pooled.diagnostics[0].script, 12);
}

#[test]
fn registered_only_policy_parses_unknown_text_types_structurally() {
    let doc = wrap(r#"<script type="text/x-template"><b>bold</b></script>"#);
    let report = pipeline(PipelineConfig {
        text_prefix: TextPrefixPolicy::RegisteredOnly,
        ..PipelineConfig::default()
    })
    .process(&doc);
    assert_eq!(report.scripts[0].mode, CaptureMode::StructuralParse);
    assert_eq!(report.scripts[0].kind, ResolvedKind::Unrecognized);
    assert!(!report.has_failures());
}

#[test]
fn compile_script_uses_the_cache() {
    let cache = Arc::new(ArtifactCache::new());
    let pipeline = DocumentPipeline::default().with_cache(Arc::clone(&cache));
    let source = ScriptSource::inline(ADD);
    let a = pipeline
        .compile_script(ResolvedKind::TextualModule, &source)
        .unwrap();
    let b = pipeline
        .compile_script(ResolvedKind::TextualModule, &source)
        .unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(cache.compilations(), 1);
    assert!(pipeline
        .compile_script(ResolvedKind::PlainScript, &source)
        .is_err());
}

#[test]
fn pipeline_from_json_config() {
    let config = PipelineConfig::from_json(
        r#"{ "worker_threads": 2, "glue": { "expose_globals": false, "registry_global": "mods" } }"#,
    )
    .unwrap();
    let pipeline = pipeline(config);
    assert_eq!(pipeline.pool().worker_count(), 2);
    let report = pipeline.process(&wrap(&format!("<script type=\"wat\">{ADD}</script>")));
    let glue = report.scripts[0].glue().unwrap();
    assert!(glue.contains("g[\"mods\"]"));
    assert!(!glue.contains("g[key] = bindings[key]"));
}
