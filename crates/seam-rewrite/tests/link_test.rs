//! Integration tests for whole link sessions: parse, scan, resolve,
//! rewrite, emit.

use swc_common::{SourceMap, sync::Lrc};
use swc_ecma_codegen::{Config as CodegenConfig, Emitter, text_writer::JsWriter};

use seam_graph::diagnostics::DiagnosticCode;
use seam_rewrite::{LinkOptions, LinkOutput, SourceFile, link};

fn link_sources(files: &[(&str, &str)]) -> LinkOutput {
    let sources = files
        .iter()
        .map(|(path, source)| SourceFile::new(*path, *source))
        .collect();
    link(sources, &LinkOptions::default()).expect("link failed")
}

/// Emit one linked file without comments.
fn emitted(output: &LinkOutput, path: &str) -> String {
    let module = output
        .modules
        .iter()
        .find(|m| m.path == path)
        .unwrap_or_else(|| panic!("no linked module for {path}"));
    emit(&module.module, &output.source_map, None)
}

/// Emit one linked file with its comments.
fn emitted_with_comments(output: &LinkOutput, path: &str) -> String {
    let module = output
        .modules
        .iter()
        .find(|m| m.path == path)
        .unwrap_or_else(|| panic!("no linked module for {path}"));
    emit(
        &module.module,
        &output.source_map,
        Some(&module.comments),
    )
}

fn emit(
    module: &swc_ecma_ast::Module,
    cm: &Lrc<SourceMap>,
    comments: Option<&dyn swc_common::comments::Comments>,
) -> String {
    let mut buf = vec![];
    {
        let writer = JsWriter::new(cm.clone(), "\n", &mut buf, None);
        let mut emitter = Emitter {
            cfg: CodegenConfig::default().with_minify(false),
            cm: cm.clone(),
            comments,
            wr: writer,
        };
        emitter.emit_module(module).expect("codegen failed");
    }
    String::from_utf8(buf).expect("emitted code is not UTF-8")
}

fn has_code(output: &LinkOutput, code: DiagnosticCode) -> bool {
    output.diagnostics.iter().any(|d| d.code == code)
}

#[test]
fn test_exported_vars_are_renamed() {
    let output = link_sources(&[("testcode.js", "export var a = 1, b = 2;")]);
    let code = emitted(&output, "testcode.js");
    assert!(
        code.contains("var a$$module$testcode = 1, b$$module$testcode = 2;"),
        "got: {code}"
    );
    assert!(output.diagnostics.is_empty());
}

#[test]
fn test_default_export_clause_emits_no_binding() {
    let output = link_sources(&[("testcode.js", "var f = 1;\nexport {f as default};")]);
    let code = emitted(&output, "testcode.js");
    assert!(code.contains("var f$$module$testcode = 1;"), "got: {code}");
    assert!(!code.contains("default"), "got: {code}");
}

#[test]
fn test_imported_reference_is_substituted() {
    let output = link_sources(&[
        ("other.js", "export var name;"),
        ("main.js", "import {name} from './other.js';\nuse(name);"),
    ]);
    let code = emitted(&output, "main.js");
    assert!(code.contains("use(name$$module$other);"), "got: {code}");
    // The import declaration itself is gone.
    assert!(!code.contains("import"), "got: {code}");
}

#[test]
fn test_namespace_chain_collapses_to_the_origin() {
    let output = link_sources(&[
        ("mod3.js", "export var a = 3;"),
        (
            "mod2.js",
            "import * as ns3 from './mod3.js';\nexport {ns3};",
        ),
        (
            "mod1.js",
            "import * as ns2 from './mod2.js';\nexport {ns2};",
        ),
        (
            "app.js",
            "import * as ns1 from './mod1.js';\nuse(ns1.ns2.ns3.a);",
        ),
    ]);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    let code = emitted(&output, "app.js");
    assert!(code.contains("use(a$$module$mod3);"), "got: {code}");
}

#[test]
fn test_goog_require_is_hoisted_and_aliased() {
    let output = link_sources(&[(
        "testcode.js",
        "const bar = goog.require('foo.bar');\nexport var x;",
    )]);
    let code = emitted(&output, "testcode.js");
    assert!(code.contains("goog.require('foo.bar');"), "got: {code}");
    assert!(
        code.contains("const bar$$module$testcode = foo.bar;"),
        "got: {code}"
    );
    assert!(code.contains("var x$$module$testcode;"), "got: {code}");
    // The hoisted call precedes the const.
    let call_at = code.find("goog.require").unwrap();
    let const_at = code.find("const bar$$module$testcode").unwrap();
    assert!(call_at < const_at);
}

#[test]
fn test_assignment_to_imported_binding_is_diagnosed() {
    let output = link_sources(&[
        ("mod1.js", "export var name;"),
        ("main.js", "import {name} from './mod1.js';\nname = 42;"),
    ]);
    assert!(has_code(&output, DiagnosticCode::ImportedBindingAssignment));
    // The offending node is left unrewritten.
    let code = emitted(&output, "main.js");
    assert!(code.contains("name = 42;"), "got: {code}");
}

#[test]
fn test_lone_namespace_use_is_diagnosed() {
    let output = link_sources(&[
        ("other.js", "export var name;"),
        ("main.js", "import * as ns from './other.js';\nuse(ns);"),
    ]);
    assert!(has_code(&output, DiagnosticCode::ModuleNamespaceNonGetprop));
}

#[test]
fn test_namespace_property_write_is_diagnosed() {
    let output = link_sources(&[
        ("other.js", "export var name;"),
        ("main.js", "import * as ns from './other.js';\nns.name = 1;"),
    ]);
    assert!(has_code(&output, DiagnosticCode::ModuleNamespaceAssignment));
}

#[test]
fn test_ambiguous_star_export_is_a_resolve_failure() {
    let output = link_sources(&[
        ("b.js", "export var x = 1;"),
        ("c.js", "export var x = 2;"),
        (
            "a.js",
            "export * from './b.js';\nexport * from './c.js';",
        ),
        ("app.js", "import {x} from './a.js';\nuse(x);"),
    ]);
    assert!(has_code(&output, DiagnosticCode::ResolveExportFailure));
}

#[test]
fn test_missing_module_is_a_load_error() {
    let output = link_sources(&[(
        "main.js",
        "import {x} from './missing.js';\nexport var y = x;",
    )]);
    assert!(has_code(&output, DiagnosticCode::LoadError));
}

#[test]
fn test_top_level_this_becomes_undefined() {
    let output = link_sources(&[(
        "m.js",
        "export var self = this;\nexport function f() { return this; }",
    )]);
    let code = emitted(&output, "m.js");
    assert!(
        code.contains("var self$$module$m = undefined;"),
        "got: {code}"
    );
    // `this` inside functions is untouched.
    assert!(code.contains("return this;"), "got: {code}");
}

#[test]
fn test_this_inside_top_level_arrow_becomes_undefined() {
    // Arrows have no `this` of their own; at module top level they see
    // the module's `this`.
    let output = link_sources(&[("m.js", "export var cb = () => this;")]);
    let code = emitted(&output, "m.js");
    assert!(code.contains("undefined"), "got: {code}");
    assert!(!code.contains("this"), "got: {code}");
}

#[test]
fn test_this_in_arrow_inside_function_is_kept() {
    let output = link_sources(&[(
        "m.js",
        "export function f() { return () => this; }",
    )]);
    let code = emitted(&output, "m.js");
    assert!(code.contains("this"), "got: {code}");
    assert!(!code.contains("undefined"), "got: {code}");
}

#[test]
fn test_use_strict_is_added_when_missing() {
    let output = link_sources(&[("m.js", "export var a = 1;")]);
    let code = emitted(&output, "m.js");
    assert!(code.starts_with("\"use strict\";"), "got: {code}");
}

#[test]
fn test_existing_use_strict_warns() {
    let output = link_sources(&[("m.js", "'use strict';\nexport var a = 1;")]);
    assert!(has_code(&output, DiagnosticCode::UselessUseStrict));
}

#[test]
fn test_undeclared_export_is_diagnosed() {
    let output = link_sources(&[("m.js", "export {ghost};")]);
    assert!(has_code(&output, DiagnosticCode::ExportedBindingNotDeclared));
}

#[test]
fn test_anonymous_default_export_binds_fresh_local() {
    let output = link_sources(&[("m.js", "export default function() {}")]);
    let code = emitted(&output, "m.js");
    assert!(
        code.contains("var $jscompDefaultExport$$module$m = function"),
        "got: {code}"
    );
}

#[test]
fn test_default_import_resolves_to_fresh_local() {
    let output = link_sources(&[
        ("lib.js", "export default function() {}"),
        ("main.js", "import d from './lib.js';\nuse(d);"),
    ]);
    let code = emitted(&output, "main.js");
    assert!(
        code.contains("use($jscompDefaultExport$$module$lib);"),
        "got: {code}"
    );
}

#[test]
fn test_shorthand_property_becomes_longhand_on_rename() {
    let output = link_sources(&[
        ("other.js", "export var name;"),
        (
            "main.js",
            "import {name} from './other.js';\nexport var o = {name};",
        ),
    ]);
    let code = emitted(&output, "main.js");
    assert!(
        code.contains("name: name$$module$other"),
        "got: {code}"
    );
}

#[test]
fn test_collapsed_callee_is_marked_as_free_call() {
    let output = link_sources(&[
        ("lib.js", "export function f() { return 1; }"),
        ("main.js", "import * as ns from './lib.js';\nns.f();"),
    ]);
    let main = output
        .modules
        .iter()
        .find(|m| m.path == "main.js")
        .unwrap();
    let rewrite = main.rewrite.as_ref().unwrap();
    assert_eq!(rewrite.free_calls.len(), 1);

    let code = emitted(&output, "main.js");
    assert!(code.contains("f$$module$lib();"), "got: {code}");
}

#[test]
fn test_original_names_are_recorded_for_source_maps() {
    let output = link_sources(&[("m.js", "export var a = 1;\nuse(a);")]);
    let module = output.modules.iter().find(|m| m.path == "m.js").unwrap();
    let rewrite = module.rewrite.as_ref().unwrap();
    assert!(
        rewrite
            .original_names
            .iter()
            .any(|(_, original)| original == "a")
    );
}

#[test]
fn test_legacy_script_is_left_untouched() {
    let output = link_sources(&[
        ("legacy.js", "goog.module('foo.bar');\nvar x = 1;"),
        ("m.js", "export var a = 1;"),
    ]);
    let legacy = output
        .modules
        .iter()
        .find(|m| m.path == "legacy.js")
        .unwrap();
    assert!(legacy.module_name.is_none());
    assert!(legacy.rewrite.is_none());
    let code = emitted(&output, "legacy.js");
    assert!(code.contains("goog.module"), "got: {code}");
    assert!(code.contains("var x = 1;"), "got: {code}");
}

#[test]
fn test_rewriting_is_idempotent() {
    let first = link_sources(&[("m.js", "export var a = 1;\nuse(a);")]);
    let first_code = emitted(&first, "m.js");

    // A fully rewritten file has no module syntax left; linking it again
    // demotes it to a plain script and leaves it untouched.
    let second = link_sources(&[("m.js", first_code.as_str())]);
    let second_module = second.modules.iter().find(|m| m.path == "m.js").unwrap();
    assert!(second_module.module_name.is_none());
    assert_eq!(emitted(&second, "m.js"), first_code);
}

#[test]
fn test_fileoverview_comment_carries_suppressions() {
    let output = link_sources(&[("m.js", "export var a = 1;")]);
    let code = emitted_with_comments(&output, "m.js");
    assert!(code.contains("@fileoverview"), "got: {code}");
    assert!(
        code.contains("@suppress {missingProvide,missingRequire}"),
        "got: {code}"
    );
}

#[test]
fn test_doc_comment_type_names_are_rewritten() {
    let output = link_sources(&[
        ("other.js", "export class Foo {}"),
        (
            "main.js",
            "import * as ns from './other.js';\n/** @param {ns.Foo} x */\nexport function f(x) { return x; }",
        ),
    ]);
    let code = emitted_with_comments(&output, "main.js");
    assert!(code.contains("{Foo$$module$other}"), "got: {code}");
}

#[test]
fn test_reexport_chain_resolves_through_modules() {
    let output = link_sources(&[
        ("origin.js", "export var value = 7;"),
        ("relay.js", "export {value as renamed} from './origin.js';"),
        (
            "main.js",
            "import {renamed} from './relay.js';\nuse(renamed);",
        ),
    ]);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    let code = emitted(&output, "main.js");
    assert!(code.contains("use(value$$module$origin);"), "got: {code}");
}

#[test]
fn test_star_export_chain_resolves_through_modules() {
    let output = link_sources(&[
        ("origin.js", "export var value = 7;"),
        ("relay.js", "export * from './origin.js';"),
        ("main.js", "import {value} from './relay.js';\nuse(value);"),
    ]);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    let code = emitted(&output, "main.js");
    assert!(code.contains("use(value$$module$origin);"), "got: {code}");
}

#[test]
fn test_annotations_drive_dependency_order() {
    let output = link_sources(&[
        ("main.js", "import {x} from './dep.js';\nuse(x);"),
        ("dep.js", "export var x = 1;"),
    ]);
    let main_name = output
        .modules
        .iter()
        .find(|m| m.path == "main.js")
        .and_then(|m| m.module_name.clone())
        .unwrap();
    let annotations = output.registry.annotations_for(&main_name).unwrap();
    assert_eq!(annotations.provides, "module$main");
    assert_eq!(annotations.requires, vec!["module$dep".to_string()]);
}
