//! Tokenizer tests: raw capture fidelity, structural fallback, termination
//! on malformed input, and the text-prefix policy.

use inlet_markup::{
    CaptureMode, MarkupOutput, MarkupToken, ScriptTypeClaim, ScriptTypeRegistry,
    TextPrefixPolicy, Tokenizer,
};
use inlet_types::ResolvedKind;

// ─────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────

fn registry(policy: TextPrefixPolicy) -> ScriptTypeRegistry {
    let mut reg = ScriptTypeRegistry::new(policy);
    reg.register(
        &ScriptTypeClaim::new(ResolvedKind::TextualModule)
            .with_types(["application/wasm", "wat"])
            .with_extensions(["wat", "wast", "wasm"]),
    );
    reg.register(
        &ScriptTypeClaim::new(ResolvedKind::TypedDialect)
            .with_types(["text/typescript"])
            .with_extensions(["ts"]),
    );
    reg
}

fn tokenize(input: &str) -> MarkupOutput {
    let reg = registry(TextPrefixPolicy::RawCapture);
    Tokenizer::new(input, &reg).tokenize()
}

fn tokenize_with(input: &str, policy: TextPrefixPolicy) -> MarkupOutput {
    let reg = registry(policy);
    Tokenizer::new(input, &reg).tokenize()
}

fn only_inline_text(out: &MarkupOutput) -> &str {
    assert_eq!(out.scripts.len(), 1, "expected one script");
    out.scripts[0]
        .declaration
        .inline_text()
        .expect("expected inline script")
}

const TRICKY_WAT: &str = r#"(module
  ;; a < b && "quoted" 'single' </scrip </scripts> &amp; <p>not a tag</p>
  (func (export "lt") (param i32 i32) (result i32)
    (i32.lt_s (local.get 0) (local.get 1))))"#;

// ─────────────────────────────────────────────────────────────────────
// Raw capture
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_textual_module_captured_byte_for_byte() {
    let doc = format!("<body><script type=\"application/wasm\">{TRICKY_WAT}</script></body>");
    let out = tokenize(&doc);
    assert_eq!(only_inline_text(&out), TRICKY_WAT);
    assert_eq!(out.scripts[0].mode, CaptureMode::RawCapture);
    assert!(out.notes.is_empty(), "{:?}", out.notes);
}

#[test]
fn test_typed_dialect_captured_byte_for_byte() {
    let src = "let x: Array<number> = [1, 2];\nif (x.length < 3 && y > 1) { s = '<b>'; }";
    let doc = format!("<script type=text/typescript>{src}</script>");
    let out = tokenize(&doc);
    assert_eq!(only_inline_text(&out), src);
}

#[test]
fn test_raw_text_token_is_not_decoded() {
    let out = tokenize("<script type=wat>&lt;</script>");
    assert!(out.tokens.contains(&MarkupToken::RawText {
        text: "&lt;".to_string()
    }));
}

#[test]
fn test_closing_tag_any_case_with_whitespace() {
    let out = tokenize("<script type=wat>(module)</SCRIPT \t>after");
    assert_eq!(only_inline_text(&out), "(module)");
    assert_eq!(
        out.tokens.last(),
        Some(&MarkupToken::Text {
            text: "after".to_string()
        })
    );
}

#[test]
fn test_partial_closing_sequences_do_not_end_capture() {
    let body = "a</scrip>b</scripts>c</script x>d";
    let out = tokenize(&format!("<script type=wat>{body}</script>"));
    assert_eq!(only_inline_text(&out), body);
}

#[test]
fn test_unterminated_script_runs_to_end() {
    let out = tokenize("<script type=wat>(module (func");
    assert_eq!(only_inline_text(&out), "(module (func");
    assert_eq!(out.notes.len(), 1);
    assert!(out.notes[0].message.contains("unterminated"));
}

#[test]
fn test_script_ranges() {
    let doc = "<p>x</p><script type=wat>(module)</script>";
    let out = tokenize(doc);
    let script = &out.scripts[0];
    assert_eq!(&doc[script.range.clone()], "<script type=wat>(module)</script>");
    assert_eq!(&doc[script.body.clone()], "(module)");
}

// ─────────────────────────────────────────────────────────────────────
// Declarations
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_external_script_declaration() {
    let reg = registry(TextPrefixPolicy::RawCapture);
    let out = Tokenizer::new("<script src=\"mod/box.wat\"></script>", &reg).tokenize();
    let decl = &out.scripts[0].declaration;
    assert_eq!(decl.locator(), Some("mod/box.wat"));
    assert_eq!(decl.declared_type(), None);
    assert_eq!(
        reg.resolve(decl.declared_type(), decl.locator()),
        ResolvedKind::TextualModule
    );
}

#[test]
fn test_src_wins_over_inline_text() {
    let out = tokenize("<script type=wat src=a.wat>(module)</script>");
    let decl = &out.scripts[0].declaration;
    assert_eq!(decl.locator(), Some("a.wat"));
    assert_eq!(decl.inline_text(), None);
    assert_eq!(out.notes.len(), 1);
}

#[test]
fn test_attribute_values_decoded() {
    let out = tokenize("<script type=\"APPLICATION/WASM\" data-x='a&amp;b' defer></script>");
    let attrs = &out.scripts[0].attributes;
    assert_eq!(attrs[0].value.as_deref(), Some("APPLICATION/WASM"));
    assert_eq!(attrs[1].value.as_deref(), Some("a&b"));
    assert_eq!(attrs[2].name, "defer");
    assert_eq!(attrs[2].value, None);
}

#[test]
fn test_multiple_scripts_in_document_order() {
    let out = tokenize(
        "<script>one()</script><div>mid</div><script type=module>two()</script>\
         <script type=wat>(module)</script>",
    );
    let bodies: Vec<_> = out
        .scripts
        .iter()
        .map(|s| s.declaration.inline_text().unwrap())
        .collect();
    assert_eq!(bodies, vec!["one()", "two()", "(module)"]);
}

// ─────────────────────────────────────────────────────────────────────
// Structural fallback and text-prefix policy
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_unrecognized_type_parsed_structurally() {
    let out = tokenize("<script type=\"application/ld+json\"><b>x</b></script>");
    let script = &out.scripts[0];
    assert_eq!(script.mode, CaptureMode::StructuralParse);
    assert_eq!(script.declaration.inline_text(), Some("<b>x</b>"));
    assert!(out.tokens.contains(&MarkupToken::StartTag {
        name: "b".to_string(),
        attributes: vec![],
        self_closing: false,
    }));
}

#[test]
fn test_text_prefix_policy_raw_capture() {
    let out = tokenize_with(
        "<script type=text/x-template><b>{{x}}</b></script>",
        TextPrefixPolicy::RawCapture,
    );
    assert_eq!(out.scripts[0].mode, CaptureMode::RawCapture);
    assert_eq!(only_inline_text(&out), "<b>{{x}}</b>");
}

#[test]
fn test_text_prefix_policy_registered_only() {
    let out = tokenize_with(
        "<script type=text/x-template><b>{{x}}</b></script>",
        TextPrefixPolicy::RegisteredOnly,
    );
    assert_eq!(out.scripts[0].mode, CaptureMode::StructuralParse);
    assert_eq!(only_inline_text(&out), "<b>{{x}}</b>");
}

#[test]
fn test_registered_types_raw_under_strict_policy() {
    let out = tokenize_with(
        "<script type=wat>(module ;; <b>\n)</script>",
        TextPrefixPolicy::RegisteredOnly,
    );
    assert_eq!(out.scripts[0].mode, CaptureMode::RawCapture);
}

#[test]
fn test_newly_registered_type_is_raw_captured() {
    let mut reg = registry(TextPrefixPolicy::RegisteredOnly);
    let doc = "<script type=application/x-custom><i>a</i></script>";
    let before = Tokenizer::new(doc, &reg).tokenize();
    assert_eq!(before.scripts[0].mode, CaptureMode::StructuralParse);

    reg.register(
        &ScriptTypeClaim::new(ResolvedKind::TextualModule).with_types(["application/x-custom"]),
    );
    let after = Tokenizer::new(doc, &reg).tokenize();
    assert_eq!(after.scripts[0].mode, CaptureMode::RawCapture);
}

// ─────────────────────────────────────────────────────────────────────
// Structural tokenizer
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_structural_tokens() {
    let out = tokenize("<!DOCTYPE html><!-- c --><P Class=a>x &amp; y<br/></p>");
    assert_eq!(
        out.tokens,
        vec![
            MarkupToken::Doctype {
                text: "html".into()
            },
            MarkupToken::Comment { text: " c ".into() },
            MarkupToken::StartTag {
                name: "p".into(),
                attributes: vec![inlet_markup::Attribute {
                    name: "class".into(),
                    value: Some("a".into()),
                }],
                self_closing: false,
            },
            MarkupToken::Text {
                text: "x & y".into()
            },
            MarkupToken::StartTag {
                name: "br".into(),
                attributes: vec![],
                self_closing: true,
            },
            MarkupToken::EndTag { name: "p".into() },
        ]
    );
}

#[test]
fn test_stray_angle_bracket_is_text() {
    let out = tokenize("1 < 2 <3");
    assert_eq!(
        out.tokens,
        vec![MarkupToken::Text {
            text: "1 < 2 <3".into()
        }]
    );
}

#[test]
fn test_malformed_inputs_terminate() {
    let inputs = [
        "<",
        "</",
        "<!--",
        "<!",
        "<a",
        "<a b='",
        "<a b=\"x",
        "<script",
        "<script type=",
        "<script type=wat>",
        "</script>",
        "<<<<>>>>",
        "&&&&;;;;",
        "<script type=application/json><script>",
        "\u{0}\u{ffff}<\u{e9}>",
    ];
    for input in inputs {
        let out = tokenize(input);
        // Reaching here is the assertion; also check nothing was invented.
        assert!(out.scripts.len() <= 1, "{input:?}");
    }
}

#[test]
fn test_large_input_linear() {
    let doc = "<div a=b>text &amp; more</div>".repeat(5_000);
    let out = tokenize(&doc);
    assert_eq!(out.tokens.len(), 15_000);
}
