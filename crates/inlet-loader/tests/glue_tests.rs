//! Glue rendering tests.

use inlet_loader::{render_glue, GlueOptions, LoaderPlan};
use inlet_types::{
    Accessor, AccessorOp, CompiledArtifact, ExportEntry, ImportRequirement, SymbolKind,
};
use pretty_assertions::assert_eq;

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

const EMPTY_MODULE: &[u8] = b"\0asm\x01\x00\x00\x00";

fn export(name: &str, kind: SymbolKind) -> ExportEntry {
    ExportEntry {
        name: name.to_string(),
        kind,
    }
}

fn point_artifact() -> CompiledArtifact {
    let mut artifact = CompiledArtifact::module(EMPTY_MODULE.to_vec());
    artifact.exports = vec![
        export("make", SymbolKind::Function),
        export("Point_get_x", SymbolKind::Function),
        export("counter", SymbolKind::Global),
    ];
    artifact.accessors = vec![Accessor {
        export_name: "Point_get_x".into(),
        type_name: "Point".into(),
        field: Some("x".into()),
        op: AccessorOp::Get,
    }];
    artifact
}

fn render(artifact: &CompiledArtifact, options: &GlueOptions) -> String {
    let plan = LoaderPlan::from_artifact(artifact).named("point.wat");
    render_glue(&plan, options)
}

// ══════════════════════════════════════════════════════════════════════════════
// Module glue
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_glue_embeds_byte_literal() {
    let js = render(&point_artifact(), &GlueOptions::default());
    assert!(js.contains(
        "new Uint8Array([0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00])"
    ));
}

#[test]
fn test_glue_instantiates_asynchronously() {
    let js = render(&point_artifact(), &GlueOptions::default());
    assert!(js.contains("WebAssembly.instantiate(bytes, imports)"));
    assert!(js.contains(".then(function (result) {"));
    assert!(js.contains(".catch(function (e) {"));
    assert!(!js.contains("new WebAssembly.Module"));
    assert!(!js.contains("new WebAssembly.Instance"));
}

#[test]
fn test_glue_binds_every_export_in_order() {
    let js = render(&point_artifact(), &GlueOptions::default());
    let lines: Vec<&str> = js
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("bindings[\""))
        .collect();
    assert_eq!(
        lines,
        vec![
            "bindings[\"make\"] = exports[\"make\"];",
            "bindings[\"Point_get_x\"] = exports[\"Point_get_x\"];",
            "bindings[\"counter\"] = exports[\"counter\"];",
        ]
    );
}

#[test]
fn test_glue_records_registry_entry() {
    let js = render(&point_artifact(), &GlueOptions::default());
    assert!(js.contains("var name = \"point.wat\";"));
    assert!(js.contains("g[\"__inletModules\"] || (g[\"__inletModules\"] = {})"));
    assert!(js.contains(
        r#"registry[name] = { exports: bindings, accessors: [{"export_name":"Point_get_x","type_name":"Point","field":"x","op":"get"}] };"#
    ));
}

#[test]
fn test_expose_globals_toggle() {
    let on = render(&point_artifact(), &GlueOptions::default());
    assert!(on.contains("g[key] = bindings[key];"));

    let options = GlueOptions {
        expose_globals: false,
        ..GlueOptions::default()
    };
    let off = render(&point_artifact(), &options);
    assert!(!off.contains("g[key] = bindings[key];"));
    assert!(off.contains("registry[name] ="));
}

#[test]
fn test_custom_registry_global() {
    let options = GlueOptions {
        registry_global: "myModules".into(),
        ..GlueOptions::default()
    };
    let js = render(&point_artifact(), &options);
    assert!(js.contains("g[\"myModules\"]"));
    assert!(!js.contains("__inletModules"));
}

#[test]
fn test_helpers_installed_once() {
    let js = render(&point_artifact(), &GlueOptions::default());
    assert!(js.contains("if (typeof g.WasmGcStructGet !== \"function\")"));
    assert!(js.contains("g.WasmGcStructSet = function (value, field, newValue)"));
    assert!(js.contains("g.WasmListAccessors = function ()"));
}

#[test]
fn test_display_helper_reads_field_getters() {
    let js = render(&point_artifact(), &GlueOptions::default());
    let display = js
        .find("g.WasmGcStructDisplay = function (value, typeName)")
        .expect("display helper installed");
    let guard = js.find("if (typeof g.WasmGcStructGet").unwrap();
    assert!(display > guard);
    let body = &js[display..];
    assert!(body.contains("a.op !== \"get\" || a.field === null"));
    assert!(body.contains("a.type_name !== typeName"));
    assert!(body.contains("g[\"__inletModules\"]"));
}

#[test]
fn test_failures_reported_not_thrown() {
    let js = render(&point_artifact(), &GlueOptions::default());
    assert!(js.contains("if (typeof g[\"__inletReport\"] === \"function\")"));
    assert!(js.contains("console.error("));
    assert_eq!(js.matches("report(\"InstantiationFailure\", e);").count(), 2);
    assert!(js.trim_end().ends_with("})();"));
}

#[test]
fn test_imports_object_only_when_needed() {
    let js = render(&point_artifact(), &GlueOptions::default());
    assert!(js.contains("var imports = {};"));

    let mut artifact = point_artifact();
    artifact.imports = vec![ImportRequirement {
        module: "env".into(),
        name: "log".into(),
        kind: SymbolKind::Function,
    }];
    let js = render(&artifact, &GlueOptions::default());
    assert!(js.contains("var imports = (g[\"__inletImports\"] || {})[name] || {};"));
}

#[test]
fn test_export_names_are_escaped() {
    let mut artifact = CompiledArtifact::module(EMPTY_MODULE.to_vec());
    artifact.exports = vec![export("we\"ird</script>", SymbolKind::Function)];
    let js = render(&artifact, &GlueOptions::default());
    assert!(js.contains(r#"bindings["we\"ird<\/script>"] = exports["we\"ird<\/script>"];"#));
    assert!(!js.contains("</script>"));
}

#[test]
fn test_module_name_escaped() {
    let artifact = point_artifact();
    let plan = LoaderPlan::from_artifact(&artifact).named("a\"b.wat");
    let js = render_glue(&plan, &GlueOptions::default());
    assert!(js.contains(r#"var name = "a\"b.wat";"#));
}

// ══════════════════════════════════════════════════════════════════════════════
// Script payloads
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_script_payload_rendered_verbatim() {
    let artifact = CompiledArtifact::script("let x = 1;\n".to_string());
    let js = render(&artifact, &GlueOptions::default());
    assert_eq!(js, "let x = 1;\n");
}

#[test]
fn test_render_is_deterministic() {
    let artifact = point_artifact();
    let first = render(&artifact, &GlueOptions::default());
    for _ in 0..100 {
        assert_eq!(render(&artifact, &GlueOptions::default()), first);
    }
}
