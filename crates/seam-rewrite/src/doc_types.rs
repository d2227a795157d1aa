//! Rewriting of type names inside documentation comments.
//!
//! Type annotations in doc comments may reference imported bindings and
//! namespace paths, plus a relative-path syntax whose head is itself a
//! module specifier (`./foo/qux.Foo`). The dependency graph never sees
//! any of this; a type name the loader cannot resolve is diagnosed and
//! left in place.

use regex::{Captures, Regex};
use swc_common::Span;
use swc_common::comments::{CommentKind, SingleThreadedComments};

use seam_graph::diagnostics::{DiagnosticCode, DiagnosticSink};
use seam_graph::names;
use seam_graph::record::{Binding, ModuleRecord};
use seam_graph::registry::ModuleRegistry;

/// Everything type-name resolution needs about the current module.
pub(crate) struct DocTypeCx<'a> {
    pub registry: &'a ModuleRegistry,
    pub module: &'a ModuleRecord,
    pub path: &'a str,
    pub sink: &'a DiagnosticSink,
}

/// Identifier paths (`ns.Foo.Bar`) or relative-path type names
/// (`./foo/bar.Baz`), as they appear inside `{…}` groups.
const TOKEN_PATTERN: &str =
    r"\.{1,2}/[A-Za-z0-9_$./-]+|[A-Za-z_$][A-Za-z0-9_$]*(?:\.[A-Za-z_$][A-Za-z0-9_$]*)*";

/// Rewrite type names in every doc comment of the file.
pub(crate) fn rewrite_doc_comments(comments: &SingleThreadedComments, cx: &DocTypeCx<'_>) {
    let token_re = Regex::new(TOKEN_PATTERN).unwrap();
    let (leading, trailing) = comments.clone().take_all();
    for map in [leading, trailing] {
        for comment_list in map.borrow_mut().values_mut() {
            for comment in comment_list.iter_mut() {
                if comment.kind != CommentKind::Block || !comment.text.starts_with('*') {
                    continue;
                }
                if let Some(new_text) =
                    rewrite_comment(&comment.text, comment.span, &token_re, cx)
                {
                    comment.text = new_text.into();
                }
            }
        }
    }
}

/// Rewrite the brace groups of one doc comment. Returns the new text only
/// if something changed.
fn rewrite_comment(
    text: &str,
    span: Span,
    token_re: &Regex,
    cx: &DocTypeCx<'_>,
) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut changed = false;
    let mut rest = text;
    loop {
        let Some(open) = rest.find('{') else {
            out.push_str(rest);
            break;
        };
        let (before, after_open) = rest.split_at(open + 1);
        out.push_str(before);

        let mut depth = 1usize;
        let mut close = None;
        for (idx, ch) in after_open.char_indices() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(idx);
                        break;
                    }
                }
                _ => {}
            }
        }
        let Some(close) = close else {
            // Unbalanced braces; not a type expression.
            out.push_str(after_open);
            break;
        };

        let group = &after_open[..close];
        let rewritten = token_re.replace_all(group, |caps: &Captures| {
            let token = &caps[0];
            rewrite_type_name(token, span, cx).unwrap_or_else(|| token.to_string())
        });
        if rewritten != group {
            changed = true;
        }
        out.push_str(&rewritten);
        rest = &after_open[close..];
    }
    changed.then_some(out)
}

/// Map one type name to its rewritten form, or `None` to leave it alone.
fn rewrite_type_name(name: &str, span: Span, cx: &DocTypeCx<'_>) -> Option<String> {
    if name.starts_with("./") || name.starts_with("../") {
        rewrite_relative_name(name, span, cx)
    } else {
        let mut parts = name.split('.');
        let head = parts.next().unwrap();
        let binding = resolve_doc_head(head, cx)?;
        walk_namespace_path(binding, parts, name, span, cx)
    }
}

/// Relative-path syntax: the specifier is the substring up to the first
/// `.` after the last `/`; the rest is a dotted path into the module.
fn rewrite_relative_name(name: &str, span: Span, cx: &DocTypeCx<'_>) -> Option<String> {
    let last_slash = name.rfind('/').unwrap();
    let dot = name[last_slash..].find('.').map(|idx| last_slash + idx);
    let (specifier, path) = match dot {
        Some(idx) => (&name[..idx], &name[idx + 1..]),
        None => (name, ""),
    };
    let Some(target) = cx.registry.resolve_imported_module(cx.module, specifier) else {
        cx.sink.report(
            DiagnosticCode::LoadError,
            cx.path,
            span,
            format!("failed to load module '{specifier}' referenced in a type annotation"),
        );
        return None;
    };
    let binding = Binding::namespace(target.name().to_string());
    walk_namespace_path(
        binding,
        path.split('.').filter(|segment| !segment.is_empty()),
        name,
        span,
        cx,
    )
}

/// Follow the dotted path through nested namespaces until a concrete
/// binding is reached, then reassemble the remainder onto its global
/// name. A path that ends while still on a namespace is an error.
fn walk_namespace_path<'s>(
    mut binding: Binding,
    mut parts: impl Iterator<Item = &'s str>,
    full_name: &str,
    span: Span,
    cx: &DocTypeCx<'_>,
) -> Option<String> {
    loop {
        match &binding.name {
            Some(local) => {
                let mut out = names::global_name(local, &binding.module);
                let rest: Vec<&str> = parts.collect();
                if !rest.is_empty() {
                    out.push('.');
                    out.push_str(&rest.join("."));
                }
                return Some(out);
            }
            None => {
                let Some(segment) = parts.next() else {
                    cx.sink.report(
                        DiagnosticCode::ResolveExportFailure,
                        cx.path,
                        span,
                        format!("type name '{full_name}' ends at a module namespace"),
                    );
                    return None;
                };
                let module = cx
                    .registry
                    .module_by_name(&binding.module)
                    .expect("namespace binding refers to a registered module");
                let Some(next) = module.resolve_namespace_export(cx.registry, segment) else {
                    cx.sink.report(
                        DiagnosticCode::ResolveExportFailure,
                        cx.path,
                        span,
                        format!("'{}' is not exported by '{}'", segment, module.path()),
                    );
                    return None;
                };
                binding = next;
            }
        }
    }
}

/// The head of a dotted type name, resolved against module scope: an
/// imported binding, a top-level declaration, or nothing (leave it).
fn resolve_doc_head(head: &str, cx: &DocTypeCx<'_>) -> Option<Binding> {
    match cx.module.import_for_local(head) {
        Some(import) => {
            let target = cx
                .registry
                .resolve_imported_module(cx.module, &import.module_request)?;
            match &import.import_name {
                None => Some(Binding::namespace(target.name().to_string())),
                Some(import_name) => target.resolve_export(cx.registry, import_name),
            }
        }
        None => cx
            .module
            .top_level_names()
            .contains(head)
            .then(|| Binding::local(cx.module.name().to_string(), head)),
    }
}

#[cfg(test)]
mod tests {
    use swc_common::DUMMY_SP;

    use seam_graph::diagnostics::DiagnosticSink;
    use seam_graph::entry::{ExportEntry, ImportEntry, ModuleInput};
    use seam_graph::loader::PathLoader;

    use super::*;

    /// main.js imports lib.js both by name and as a namespace; lib.js
    /// exports a class Foo.
    fn fixture() -> ModuleRegistry {
        let sink = DiagnosticSink::new();
        let loader = PathLoader::new(["main.js".to_string(), "lib.js".to_string()]);
        let mut registry = ModuleRegistry::new(Box::new(loader));

        let mut lib = ModuleInput::new("lib.js");
        lib.exports.push(ExportEntry::local("Foo", "Foo", DUMMY_SP));
        lib.top_level_names.insert("Foo".to_string());
        registry.add_module(lib, &sink);

        let mut main = ModuleInput::new("main.js");
        main.requested_modules.push("./lib.js".to_string());
        main.imports
            .push(ImportEntry::named("./lib.js", "Foo", "Imported", DUMMY_SP));
        main.imports
            .push(ImportEntry::namespace("./lib.js", "ns", DUMMY_SP));
        main.top_level_names.insert("Imported".to_string());
        main.top_level_names.insert("ns".to_string());
        main.top_level_names.insert("Local".to_string());
        registry.add_module(main, &sink);

        assert!(sink.is_empty());
        registry
    }

    fn rewrite(registry: &ModuleRegistry, name: &str) -> (Option<String>, DiagnosticSink) {
        let sink = DiagnosticSink::new();
        let cx = DocTypeCx {
            registry,
            module: registry.module_for_path("main.js").unwrap(),
            path: "main.js",
            sink: &sink,
        };
        let result = rewrite_type_name(name, DUMMY_SP, &cx);
        (result, sink)
    }

    #[test]
    fn test_local_type_name() {
        let registry = fixture();
        let (result, sink) = rewrite(&registry, "Local");
        assert_eq!(result.as_deref(), Some("Local$$module$main"));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_imported_type_name() {
        let registry = fixture();
        let (result, _) = rewrite(&registry, "Imported");
        assert_eq!(result.as_deref(), Some("Foo$$module$lib"));
    }

    #[test]
    fn test_namespace_path() {
        let registry = fixture();
        let (result, _) = rewrite(&registry, "ns.Foo");
        assert_eq!(result.as_deref(), Some("Foo$$module$lib"));
    }

    #[test]
    fn test_namespace_path_with_remainder() {
        let registry = fixture();
        let (result, _) = rewrite(&registry, "ns.Foo.Inner");
        assert_eq!(result.as_deref(), Some("Foo$$module$lib.Inner"));
    }

    #[test]
    fn test_relative_path_syntax() {
        let registry = fixture();
        let (result, _) = rewrite(&registry, "./lib.Foo");
        assert_eq!(result.as_deref(), Some("Foo$$module$lib"));
    }

    #[test]
    fn test_relative_path_unresolvable_is_diagnosed() {
        let registry = fixture();
        let (result, sink) = rewrite(&registry, "./nope.Foo");
        assert!(result.is_none());
        assert!(sink.has(DiagnosticCode::LoadError));
    }

    #[test]
    fn test_path_ending_at_namespace_is_diagnosed() {
        let registry = fixture();
        let (result, sink) = rewrite(&registry, "ns");
        assert!(result.is_none());
        assert!(sink.has(DiagnosticCode::ResolveExportFailure));
    }

    #[test]
    fn test_unknown_names_are_left_alone() {
        let registry = fixture();
        let (result, sink) = rewrite(&registry, "number");
        assert!(result.is_none());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_comment_rewrite_touches_only_brace_groups() {
        let registry = fixture();
        let sink = DiagnosticSink::new();
        let cx = DocTypeCx {
            registry: &registry,
            module: registry.module_for_path("main.js").unwrap(),
            path: "main.js",
            sink: &sink,
        };
        let token_re = Regex::new(TOKEN_PATTERN).unwrap();

        let text = "* ns.Foo outside stays.\n * @param {ns.Foo} value\n * @return {number} ";
        let rewritten = rewrite_comment(text, DUMMY_SP, &token_re, &cx).unwrap();
        assert!(rewritten.contains("{Foo$$module$lib}"));
        assert!(rewritten.contains("* ns.Foo outside stays."));
        assert!(rewritten.contains("{number}"));
    }

    #[test]
    fn test_comment_without_type_names_is_unchanged() {
        let registry = fixture();
        let sink = DiagnosticSink::new();
        let cx = DocTypeCx {
            registry: &registry,
            module: registry.module_for_path("main.js").unwrap(),
            path: "main.js",
            sink: &sink,
        };
        let token_re = Regex::new(TOKEN_PATTERN).unwrap();
        assert!(rewrite_comment("* just prose ", DUMMY_SP, &token_re, &cx).is_none());
    }
}
