//! Glue rendering.
//!
//! The rendered script for a module artifact:
//!
//! 1. builds a `Uint8Array` from an inline byte literal,
//! 2. calls `WebAssembly.instantiate` (never the synchronous constructor),
//! 3. on success records `{ exports, accessors }` under the module name in the
//!    registry object and, if enabled, assigns each binding onto `globalThis`,
//! 4. installs `WasmGcStructGet`, `WasmGcStructSet`, `WasmListAccessors` and
//!    `WasmGcStructDisplay` once per environment,
//! 5. on failure reports `{ kind, module, message }` to the report hook, or
//!    `console.error` when the host defines none.

use std::fmt::Write;

use inlet_types::ArtifactPayload;
use serde::{Deserialize, Serialize};

use crate::js::{byte_array_literal, js_string};
use crate::plan::LoaderPlan;

/// Rendering options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlueOptions {
    /// Assign every binding onto `globalThis` under its export name.
    pub expose_globals: bool,
    /// Global holding the process-wide module registry.
    pub registry_global: String,
    /// Global the host may define with an imports object per module.
    pub imports_global: String,
    /// Global function receiving failure reports.
    pub report_global: String,
}

impl Default for GlueOptions {
    fn default() -> Self {
        Self {
            expose_globals: true,
            registry_global: "__inletModules".to_string(),
            imports_global: "__inletImports".to_string(),
            report_global: "__inletReport".to_string(),
        }
    }
}

/// Render the glue for `plan`.
///
/// Script payloads (transpiled typed-dialect output) are returned as-is.
pub fn render_glue(plan: &LoaderPlan<'_>, options: &GlueOptions) -> String {
    let bytes = match &plan.artifact().payload {
        ArtifactPayload::Script(text) => return text.clone(),
        ArtifactPayload::Module(bytes) => bytes,
    };

    let registry = js_string(&options.registry_global);
    let report = js_string(&options.report_global);
    let accessors = serde_json::to_string(plan.accessors()).unwrap_or_else(|_| "[]".to_string());

    let mut code = String::with_capacity(bytes.len() * 6 + 2048);
    let _ = writeln!(code, "(function () {{");
    let _ = writeln!(code, "  \"use strict\";");
    let _ = writeln!(code, "  var g = globalThis;");
    let _ = writeln!(code, "  var name = {};", js_string(&plan.module_name));
    let _ = writeln!(code, "  function report(kind, error) {{");
    let _ = writeln!(
        code,
        "    var message = error && error.message ? error.message : String(error);"
    );
    let _ = writeln!(code, "    if (typeof g[{report}] === \"function\") {{");
    let _ = writeln!(
        code,
        "      g[{report}]({{ kind: kind, module: name, message: message }});"
    );
    let _ = writeln!(code, "    }} else {{");
    let _ = writeln!(
        code,
        "      console.error(\"inlet: \" + kind + \" in \" + name + \": \" + message);"
    );
    let _ = writeln!(code, "    }}");
    let _ = writeln!(code, "  }}");
    let _ = writeln!(code, "  try {{");
    let _ = writeln!(
        code,
        "    var registry = g[{registry}] || (g[{registry}] = {{}});"
    );
    let _ = writeln!(
        code,
        "    var bytes = new Uint8Array([{}]);",
        byte_array_literal(bytes)
    );
    if plan.imports().is_empty() {
        let _ = writeln!(code, "    var imports = {{}};");
    } else {
        let _ = writeln!(
            code,
            "    var imports = (g[{}] || {{}})[name] || {{}};",
            js_string(&options.imports_global)
        );
    }
    let _ = writeln!(code, "    WebAssembly.instantiate(bytes, imports)");
    let _ = writeln!(code, "      .then(function (result) {{");
    let _ = writeln!(code, "        var exports = result.instance.exports;");
    let _ = writeln!(code, "        var bindings = {{}};");
    for binding in &plan.bindings {
        let key = js_string(&binding.name);
        let _ = writeln!(code, "        bindings[{key}] = exports[{key}];");
    }
    let _ = writeln!(
        code,
        "        registry[name] = {{ exports: bindings, accessors: {accessors} }};"
    );
    if options.expose_globals {
        let _ = writeln!(
            code,
            "        for (var key in bindings) {{ g[key] = bindings[key]; }}"
        );
    }
    write_helpers(&mut code, &registry);
    let _ = writeln!(code, "      }})");
    let _ = writeln!(code, "      .catch(function (e) {{");
    let _ = writeln!(code, "        report(\"InstantiationFailure\", e);");
    let _ = writeln!(code, "      }});");
    let _ = writeln!(code, "  }} catch (e) {{");
    let _ = writeln!(code, "    report(\"InstantiationFailure\", e);");
    let _ = writeln!(code, "  }}");
    let _ = writeln!(code, "}})();");

    tracing::debug!(
        module = %plan.module_name,
        bindings = plan.bindings.len(),
        accessors = plan.accessors().len(),
        chars = code.len(),
        "glue rendered"
    );
    code
}

/// Accessor dispatch helpers, installed by whichever module loads first.
///
/// `WasmGcStructGet` / `WasmGcStructSet` try every registered accessor for
/// the field name; an accessor of the wrong type traps and the next one is
/// tried. `WasmGcStructDisplay` reads every field getter that accepts the
/// value into a plain object, optionally limited to one type name.
fn write_helpers(code: &mut String, registry: &str) {
    let _ = write!(
        code,
        r#"        if (typeof g.WasmGcStructGet !== "function") {{
          var dispatch = function (op, field, call) {{
            var modules = g[{registry}] || {{}};
            for (var m in modules) {{
              var list = modules[m].accessors;
              for (var i = 0; i < list.length; i++) {{
                var a = list[i];
                if (a.op === op && a.field === String(field)) {{
                  try {{
                    return {{ found: true, value: call(modules[m].exports[a.export_name]) }};
                  }} catch (e) {{}}
                }}
              }}
            }}
            return {{ found: false }};
          }};
          g.WasmGcStructGet = function (value, field) {{
            return dispatch("get", field, function (f) {{ return f(value); }}).value;
          }};
          g.WasmGcStructSet = function (value, field, newValue) {{
            return dispatch("set", field, function (f) {{ f(value, newValue); }}).found;
          }};
          g.WasmListAccessors = function () {{
            var names = [];
            var modules = g[{registry}] || {{}};
            for (var m in modules) {{
              var list = modules[m].accessors;
              for (var i = 0; i < list.length; i++) {{ names.push(list[i].export_name); }}
            }}
            return names;
          }};
          g.WasmGcStructDisplay = function (value, typeName) {{
            var shown = {{}};
            var modules = g[{registry}] || {{}};
            for (var m in modules) {{
              var list = modules[m].accessors;
              for (var i = 0; i < list.length; i++) {{
                var a = list[i];
                if (a.op !== "get" || a.field === null || a.field in shown) {{ continue; }}
                if (typeName !== undefined && a.type_name !== typeName) {{ continue; }}
                try {{ shown[a.field] = modules[m].exports[a.export_name](value); }} catch (e) {{}}
              }}
            }}
            return shown;
          }};
        }}
"#
    );
}
