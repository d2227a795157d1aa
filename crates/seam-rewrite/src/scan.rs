//! The parser pass: extract import/export entries from a file and strip
//! its module declarations.
//!
//! Runs once per file over the already-parsed tree. Import declarations
//! are removed (their local names live on in the entries), export
//! declarations are rewritten into the plain declarations they wrap, so
//! the rewriter only ever sees ordinary `var`/`function`/`class` nodes.

use std::collections::HashSet;

use swc_common::{DUMMY_SP, Span, SyntaxContext};
use swc_ecma_ast::*;

use seam_graph::diagnostics::{DiagnosticCode, DiagnosticSink};
use seam_graph::entry::{ExportEntry, ImportEntry, ModuleInput};

/// Local name bound to an anonymous `export default`.
pub const DEFAULT_EXPORT_NAME: &str = "$jscompDefaultExport";

/// Scan one file, rewriting its module declarations in place.
///
/// Returns `None` when the file is a script under the legacy
/// `goog.module`/`goog.provide` system; such files are non-modules and
/// are left exactly as parsed.
pub fn scan_module(
    path: &str,
    module: &mut Module,
    top_level_ctxt: SyntaxContext,
    sink: &DiagnosticSink,
) -> Option<ModuleInput> {
    if is_legacy_script(module) {
        tracing::debug!(path, "legacy script, skipping module scan");
        return None;
    }

    let mut out = ModuleInput::new(path);
    let mut import_locals: HashSet<String> = HashSet::new();
    let mut new_items: Vec<ModuleItem> = Vec::with_capacity(module.body.len());

    for item in module.body.drain(..) {
        match item {
            ModuleItem::ModuleDecl(decl) => scan_module_decl(
                decl,
                path,
                top_level_ctxt,
                sink,
                &mut out,
                &mut import_locals,
                &mut new_items,
            ),
            ModuleItem::Stmt(stmt) => {
                collect_stmt_bindings(&stmt, &mut out.top_level_names);
                new_items.push(ModuleItem::Stmt(stmt));
            }
        }
    }

    module.body = new_items;
    Some(out)
}

#[allow(clippy::too_many_arguments)]
fn scan_module_decl(
    decl: ModuleDecl,
    path: &str,
    top_level_ctxt: SyntaxContext,
    sink: &DiagnosticSink,
    out: &mut ModuleInput,
    import_locals: &mut HashSet<String>,
    new_items: &mut Vec<ModuleItem>,
) {
    match decl {
        ModuleDecl::Import(import) => {
            let request = str_value(&import.src);
            out.requested_modules.push(request.clone());

            if import.specifiers.is_empty() {
                out.imports
                    .push(ImportEntry::side_effect(request, import.span));
                return;
            }
            for specifier in import.specifiers {
                let entry = match specifier {
                    ImportSpecifier::Named(named) => {
                        let imported = named
                            .imported
                            .as_ref()
                            .map(export_name_text)
                            .unwrap_or_else(|| named.local.sym.to_string());
                        ImportEntry::named(
                            request.clone(),
                            imported,
                            named.local.sym.to_string(),
                            named.local.span,
                        )
                    }
                    ImportSpecifier::Default(default) => ImportEntry::named(
                        request.clone(),
                        "default",
                        default.local.sym.to_string(),
                        default.local.span,
                    ),
                    ImportSpecifier::Namespace(star) => ImportEntry::namespace(
                        request.clone(),
                        star.local.sym.to_string(),
                        star.local.span,
                    ),
                };
                let local = entry.local_name.clone().unwrap();
                if !import_locals.insert(local.clone()) {
                    sink.report(
                        DiagnosticCode::DuplicateImportedNames,
                        path,
                        entry.span,
                        format!("duplicate imported binding '{local}'"),
                    );
                    continue;
                }
                out.top_level_names.insert(local);
                out.imports.push(entry);
            }
        }

        ModuleDecl::ExportDecl(mut export) => {
            match &export.decl {
                Decl::Var(var_decl) => {
                    let mut bound = Vec::new();
                    for declarator in &var_decl.decls {
                        collect_pat_idents(&declarator.name, &mut bound);
                    }
                    for ident in bound {
                        out.exports.push(ExportEntry::local(
                            ident.sym.to_string(),
                            ident.sym.to_string(),
                            ident.span,
                        ));
                        out.top_level_names.insert(ident.sym.to_string());
                    }
                }
                Decl::Fn(fn_decl) => {
                    out.exports.push(ExportEntry::local(
                        fn_decl.ident.sym.to_string(),
                        fn_decl.ident.sym.to_string(),
                        fn_decl.ident.span,
                    ));
                    out.top_level_names.insert(fn_decl.ident.sym.to_string());
                }
                Decl::Class(class_decl) => {
                    out.exports.push(ExportEntry::local(
                        class_decl.ident.sym.to_string(),
                        class_decl.ident.sym.to_string(),
                        class_decl.ident.span,
                    ));
                    out.top_level_names.insert(class_decl.ident.sym.to_string());
                }
                _ => {}
            }
            // Strip the export keyword, keep the declaration. The
            // declaration takes over the whole statement's span so
            // comments ahead of the export keyword stay attached.
            match &mut export.decl {
                Decl::Var(var_decl) => var_decl.span = export.span,
                Decl::Fn(fn_decl) => fn_decl.function.span = export.span,
                Decl::Class(class_decl) => class_decl.class.span = export.span,
                _ => {}
            }
            new_items.push(ModuleItem::Stmt(Stmt::Decl(export.decl)));
        }

        ModuleDecl::ExportDefaultDecl(export) => match export.decl {
            DefaultDecl::Fn(mut fn_expr) => match fn_expr.ident {
                Some(ident) => {
                    out.exports.push(ExportEntry::local(
                        "default",
                        ident.sym.to_string(),
                        ident.span,
                    ));
                    out.top_level_names.insert(ident.sym.to_string());
                    fn_expr.function.span = export.span;
                    new_items.push(ModuleItem::Stmt(Stmt::Decl(Decl::Fn(FnDecl {
                        ident,
                        declare: false,
                        function: fn_expr.function,
                    }))));
                }
                None => {
                    let expr = Box::new(Expr::Fn(FnExpr {
                        ident: None,
                        function: fn_expr.function,
                    }));
                    push_default_export_var(expr, export.span, top_level_ctxt, out, new_items);
                }
            },
            DefaultDecl::Class(mut class_expr) => match class_expr.ident {
                Some(ident) => {
                    out.exports.push(ExportEntry::local(
                        "default",
                        ident.sym.to_string(),
                        ident.span,
                    ));
                    out.top_level_names.insert(ident.sym.to_string());
                    class_expr.class.span = export.span;
                    new_items.push(ModuleItem::Stmt(Stmt::Decl(Decl::Class(ClassDecl {
                        ident,
                        declare: false,
                        class: class_expr.class,
                    }))));
                }
                None => {
                    let expr = Box::new(Expr::Class(ClassExpr {
                        ident: None,
                        class: class_expr.class,
                    }));
                    push_default_export_var(expr, export.span, top_level_ctxt, out, new_items);
                }
            },
            DefaultDecl::TsInterfaceDecl(_) => {}
        },

        ModuleDecl::ExportDefaultExpr(export) => {
            push_default_export_var(export.expr, export.span, top_level_ctxt, out, new_items);
        }

        ModuleDecl::ExportNamed(export) => {
            match &export.src {
                Some(src) => {
                    let request = str_value(src);
                    out.requested_modules.push(request.clone());
                    for specifier in &export.specifiers {
                        match specifier {
                            ExportSpecifier::Named(named) => {
                                let orig = export_name_text(&named.orig);
                                let exported = named
                                    .exported
                                    .as_ref()
                                    .map(export_name_text)
                                    .unwrap_or_else(|| orig.clone());
                                out.exports.push(ExportEntry::indirect(
                                    exported,
                                    request.clone(),
                                    orig,
                                    export.span,
                                ));
                            }
                            ExportSpecifier::Namespace(star) => {
                                // export * as ns from 'mod'
                                out.exports.push(ExportEntry::indirect_namespace(
                                    export_name_text(&star.name),
                                    request.clone(),
                                    export.span,
                                ));
                            }
                            ExportSpecifier::Default(_) => {}
                        }
                    }
                }
                None => {
                    for specifier in &export.specifiers {
                        if let ExportSpecifier::Named(named) = specifier {
                            let orig = export_name_text(&named.orig);
                            let exported = named
                                .exported
                                .as_ref()
                                .map(export_name_text)
                                .unwrap_or_else(|| orig.clone());
                            out.exports
                                .push(ExportEntry::local(exported, orig, export.span));
                        }
                    }
                }
            }
            // The statement is removed either way.
        }

        ModuleDecl::ExportAll(export) => {
            let request = str_value(&export.src);
            out.requested_modules.push(request.clone());
            out.exports.push(ExportEntry::star(request, export.span));
        }

        // TypeScript-only module forms pass through untouched.
        other => new_items.push(ModuleItem::ModuleDecl(other)),
    }
}

/// Emit `var $jscompDefaultExport = <expr>;` plus its export entry.
fn push_default_export_var(
    init: Box<Expr>,
    span: Span,
    top_level_ctxt: SyntaxContext,
    out: &mut ModuleInput,
    new_items: &mut Vec<ModuleItem>,
) {
    let ident = Ident::new(DEFAULT_EXPORT_NAME.into(), DUMMY_SP, top_level_ctxt);
    out.exports
        .push(ExportEntry::local("default", DEFAULT_EXPORT_NAME, span));
    out.top_level_names.insert(DEFAULT_EXPORT_NAME.to_string());
    new_items.push(ModuleItem::Stmt(Stmt::Decl(Decl::Var(Box::new(VarDecl {
        span,
        ctxt: SyntaxContext::empty(),
        kind: VarDeclKind::Var,
        declare: false,
        decls: vec![VarDeclarator {
            span,
            name: Pat::Ident(ident.into()),
            init: Some(init),
            definite: false,
        }],
    })))));
}

/// A file whose top level calls `goog.module` or `goog.provide` belongs
/// to the older module system and is treated as a non-module.
fn is_legacy_script(module: &Module) -> bool {
    module.body.iter().any(|item| {
        let ModuleItem::Stmt(Stmt::Expr(expr_stmt)) = item else {
            return false;
        };
        let Expr::Call(call) = &*expr_stmt.expr else {
            return false;
        };
        let Callee::Expr(callee) = &call.callee else {
            return false;
        };
        let Expr::Member(member) = &**callee else {
            return false;
        };
        let Expr::Ident(obj) = &*member.obj else {
            return false;
        };
        let MemberProp::Ident(prop) = &member.prop else {
            return false;
        };
        obj.sym == "goog" && (prop.sym == "module" || prop.sym == "provide")
    })
}

/// Text of an export clause name (`export {a as "b"}` allows strings).
fn export_name_text(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::Ident(ident) => ident.sym.to_string(),
        ModuleExportName::Str(s) => str_value(s),
    }
}

fn str_value(s: &Str) -> String {
    s.value.as_str().unwrap_or_default().to_string()
}

/// All identifiers bound by a pattern, destructuring included.
fn collect_pat_idents(pat: &Pat, out: &mut Vec<Ident>) {
    match pat {
        Pat::Ident(ident) => out.push(ident.id.clone()),
        Pat::Object(obj) => {
            for prop in &obj.props {
                match prop {
                    ObjectPatProp::KeyValue(kv) => collect_pat_idents(&kv.value, out),
                    ObjectPatProp::Assign(assign) => out.push(assign.key.id.clone()),
                    ObjectPatProp::Rest(rest) => collect_pat_idents(&rest.arg, out),
                }
            }
        }
        Pat::Array(arr) => {
            for elem in arr.elems.iter().flatten() {
                collect_pat_idents(elem, out);
            }
        }
        Pat::Rest(rest) => collect_pat_idents(&rest.arg, out),
        Pat::Assign(assign) => collect_pat_idents(&assign.left, out),
        _ => {}
    }
}

/// Names a top-level statement binds in module scope. Descends into
/// nested statements for `var` hoisting; `let`/`const`/functions count
/// only at the top level itself.
fn collect_stmt_bindings(stmt: &Stmt, out: &mut HashSet<String>) {
    match stmt {
        Stmt::Decl(Decl::Var(var_decl)) => {
            let mut bound = Vec::new();
            for declarator in &var_decl.decls {
                collect_pat_idents(&declarator.name, &mut bound);
            }
            out.extend(bound.into_iter().map(|ident| ident.sym.to_string()));
        }
        Stmt::Decl(Decl::Fn(fn_decl)) => {
            out.insert(fn_decl.ident.sym.to_string());
        }
        Stmt::Decl(Decl::Class(class_decl)) => {
            out.insert(class_decl.ident.sym.to_string());
        }
        _ => collect_hoisted_vars(stmt, out),
    }
}

/// `var` declarations hoist out of nested blocks into module scope.
fn collect_hoisted_vars(stmt: &Stmt, out: &mut HashSet<String>) {
    let mut visit_var = |var_decl: &VarDecl, out: &mut HashSet<String>| {
        if var_decl.kind == VarDeclKind::Var {
            let mut bound = Vec::new();
            for declarator in &var_decl.decls {
                collect_pat_idents(&declarator.name, &mut bound);
            }
            out.extend(bound.into_iter().map(|ident| ident.sym.to_string()));
        }
    };
    match stmt {
        Stmt::Block(block) => {
            for inner in &block.stmts {
                if let Stmt::Decl(Decl::Var(v)) = inner {
                    visit_var(v, out);
                } else {
                    collect_hoisted_vars(inner, out);
                }
            }
        }
        Stmt::If(if_stmt) => {
            collect_hoisted_vars(&if_stmt.cons, out);
            if let Some(alt) = &if_stmt.alt {
                collect_hoisted_vars(alt, out);
            }
        }
        Stmt::While(s) => collect_hoisted_vars(&s.body, out),
        Stmt::DoWhile(s) => collect_hoisted_vars(&s.body, out),
        Stmt::For(s) => {
            if let Some(VarDeclOrExpr::VarDecl(v)) = &s.init {
                visit_var(v, out);
            }
            collect_hoisted_vars(&s.body, out);
        }
        Stmt::ForIn(s) => {
            if let ForHead::VarDecl(v) = &s.left {
                visit_var(v, out);
            }
            collect_hoisted_vars(&s.body, out);
        }
        Stmt::ForOf(s) => {
            if let ForHead::VarDecl(v) = &s.left {
                visit_var(v, out);
            }
            collect_hoisted_vars(&s.body, out);
        }
        Stmt::Labeled(s) => collect_hoisted_vars(&s.body, out),
        Stmt::Try(s) => {
            for inner in &s.block.stmts {
                collect_hoisted_vars(inner, out);
            }
            if let Some(handler) = &s.handler {
                for inner in &handler.body.stmts {
                    collect_hoisted_vars(inner, out);
                }
            }
            if let Some(finalizer) = &s.finalizer {
                for inner in &finalizer.stmts {
                    collect_hoisted_vars(inner, out);
                }
            }
        }
        Stmt::Switch(s) => {
            for case in &s.cases {
                for inner in &case.cons {
                    collect_hoisted_vars(inner, out);
                }
            }
        }
        Stmt::Decl(Decl::Var(v)) => visit_var(v, out),
        _ => {}
    }
}
