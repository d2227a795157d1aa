//! The rewriter pass: rename every top-level binding to its global name,
//! substitute imported references, and collapse namespace accesses.
//!
//! Expressions are handled post-order (children before the node itself).
//! That ordering is what makes namespace chains collapse: rewriting the
//! innermost access produces a canonical-name identifier which only
//! becomes a collapse candidate when its parent property access is
//! visited afterwards, so `ns1.ns2.ns3.foo` reduces one link per visit
//! within a single traversal.

use std::collections::HashSet;

use swc_common::comments::{Comment, CommentKind, Comments, SingleThreadedComments};
use swc_common::{DUMMY_SP, Span, Spanned, SyntaxContext};
use swc_ecma_ast::*;
use swc_ecma_visit::{VisitMut, VisitMutWith};

use seam_graph::diagnostics::{DiagnosticCode, DiagnosticSink};
use seam_graph::names;
use seam_graph::record::{Binding, ModuleRecord};
use seam_graph::registry::ModuleRegistry;

use crate::doc_types::{self, DocTypeCx};
use crate::goog_require::rewrite_goog_requires;

/// Side output of one file's rewrite. The tree itself carries no
/// user-defined annotations, so source-map metadata and free-call marks
/// live here.
#[derive(Debug, Default)]
pub struct RewriteOutput {
    /// Original textual name per renamed identifier span.
    pub original_names: Vec<(Span, String)>,
    /// Spans of calls whose callee was collapsed from a property access;
    /// the implicit `this` binding is gone and downstream passes must not
    /// reintroduce one.
    pub free_calls: Vec<Span>,
}

/// Rewrite one file in place. Returns `None` (and leaves the tree alone)
/// when the file is not a registered module.
pub fn rewrite_module(
    path: &str,
    module: &mut Module,
    comments: &SingleThreadedComments,
    registry: &ModuleRegistry,
    top_level_ctxt: SyntaxContext,
    sink: &DiagnosticSink,
) -> Option<RewriteOutput> {
    let record = registry.module_for_path(path)?;
    tracing::debug!(path, module = record.name(), "rewriting module");

    rewrite_goog_requires(module, path, sink);

    for entry in record.local_exports() {
        let orig = entry.orig_name.as_deref().unwrap();
        if !record.top_level_names().contains(orig) {
            sink.report(
                DiagnosticCode::ExportedBindingNotDeclared,
                path,
                entry.span,
                format!("exported binding '{orig}' is not declared"),
            );
        }
    }

    let mut rewriter = Rewriter {
        registry,
        record,
        path,
        top_level_ctxt,
        sink,
        fn_depth: 0,
        in_member_obj: false,
        original_names: Vec::new(),
        collapsed: HashSet::new(),
        free_calls: Vec::new(),
    };
    module.visit_mut_with(&mut rewriter);
    let output = RewriteOutput {
        original_names: rewriter.original_names,
        free_calls: rewriter.free_calls,
    };

    doc_types::rewrite_doc_comments(
        comments,
        &DocTypeCx {
            registry,
            module: record,
            path,
            sink,
        },
    );

    ensure_fileoverview(module, comments);
    normalize_use_strict(module, path, sink);

    Some(output)
}

struct Rewriter<'a> {
    registry: &'a ModuleRegistry,
    record: &'a ModuleRecord,
    path: &'a str,
    top_level_ctxt: SyntaxContext,
    sink: &'a DiagnosticSink,
    /// Nesting depth of scopes that rebind `this`.
    fn_depth: u32,
    /// True while visiting the object of a non-computed property access;
    /// the only position where a namespace binding may appear.
    in_member_obj: bool,
    original_names: Vec<(Span, String)>,
    /// Spans of property accesses collapsed into plain identifiers.
    collapsed: HashSet<Span>,
    free_calls: Vec<Span>,
}

impl Rewriter<'_> {
    /// The binding a top-level name reference denotes, if any.
    ///
    /// Names outside module scope resolve to nothing; module-scope names
    /// without an import entry are this module's own bindings; imported
    /// names resolve through the target module's exports.
    fn resolve_module_binding(&self, ident: &Ident) -> Option<Binding> {
        if ident.ctxt != self.top_level_ctxt {
            return None;
        }
        let name = ident.sym.as_ref();
        match self.record.import_for_local(name) {
            None => Some(Binding::local(self.record.name(), name)),
            Some(import) => {
                let target = self
                    .registry
                    .resolve_imported_module(self.record, &import.module_request)?;
                match &import.import_name {
                    None => Some(Binding::namespace(target.name())),
                    Some(import_name) => target.resolve_export(self.registry, import_name),
                }
            }
        }
    }

    /// Binding-substitution rule for a name reference in read position.
    /// Returns whether the identifier changed.
    fn rewrite_ident_read(&mut self, ident: &mut Ident, in_member_obj: bool) -> bool {
        let Some(binding) = self.resolve_module_binding(ident) else {
            return false;
        };
        match &binding.name {
            Some(local) => {
                let global = names::global_name(local, &binding.module);
                self.original_names.push((ident.span, ident.sym.to_string()));
                ident.sym = global.into();
                ident.ctxt = SyntaxContext::empty();
                true
            }
            None => {
                if in_member_obj {
                    // The canonical name triggers the collapse rule when
                    // the enclosing property access is visited next.
                    self.original_names.push((ident.span, ident.sym.to_string()));
                    ident.sym = binding.module.clone().into();
                    ident.ctxt = SyntaxContext::empty();
                    true
                } else {
                    self.sink.report(
                        DiagnosticCode::ModuleNamespaceNonGetprop,
                        self.path,
                        ident.span,
                        format!(
                            "module namespace '{}' may only be used in a property access",
                            ident.sym
                        ),
                    );
                    false
                }
            }
        }
    }

    /// Rename a top-level declaration identifier.
    fn rename_declared(&mut self, ident: &mut Ident) {
        if ident.ctxt != self.top_level_ctxt {
            return;
        }
        let global = names::global_name(ident.sym.as_ref(), self.record.name());
        self.original_names.push((ident.span, ident.sym.to_string()));
        ident.sym = global.into();
        ident.ctxt = SyntaxContext::empty();
    }

    /// A name in assignment position. Writes to imported bindings are
    /// diagnosed and left alone; module-local names rename as usual.
    fn rewrite_assigned_ident(&mut self, ident: &mut Ident) {
        if ident.ctxt != self.top_level_ctxt {
            return;
        }
        if self.record.import_for_local(ident.sym.as_ref()).is_some() {
            self.sink.report(
                DiagnosticCode::ImportedBindingAssignment,
                self.path,
                ident.span,
                format!("cannot assign to imported binding '{}'", ident.sym),
            );
            return;
        }
        self.rename_declared(ident);
    }

    /// Collapse `module$….prop` into the binding it resolves to.
    ///
    /// `in_member_obj` tells whether this node may itself legally turn
    /// into a namespace identifier.
    fn maybe_collapse_member(&mut self, expr: &mut Expr, in_member_obj: bool) {
        let Expr::Member(member) = expr else { return };
        let Expr::Ident(obj) = &*member.obj else {
            return;
        };
        if !names::is_module_namespace(obj.sym.as_ref()) {
            return;
        }
        let Some(target) = self.registry.module_by_name(obj.sym.as_ref()) else {
            return;
        };
        let MemberProp::Ident(prop) = &member.prop else {
            return;
        };
        let prop_name = prop.sym.to_string();
        let span = member.span;

        let Some(binding) = target.resolve_namespace_export(self.registry, &prop_name) else {
            self.sink.report(
                DiagnosticCode::ResolveExportFailure,
                self.path,
                span,
                format!("'{}' is not exported by '{}'", prop_name, target.path()),
            );
            return;
        };
        match &binding.name {
            Some(local) => {
                let global = names::global_name(local, &binding.module);
                *expr = Expr::Ident(Ident::new(global.into(), span, SyntaxContext::empty()));
                self.collapsed.insert(span);
                self.original_names.push((span, prop_name));
            }
            None => {
                if in_member_obj {
                    *expr = Expr::Ident(Ident::new(
                        binding.module.clone().into(),
                        span,
                        SyntaxContext::empty(),
                    ));
                    self.original_names.push((span, prop_name));
                } else {
                    self.sink.report(
                        DiagnosticCode::ModuleNamespaceNonGetprop,
                        self.path,
                        span,
                        format!(
                            "module namespace '{prop_name}' may only be used in a property access"
                        ),
                    );
                }
            }
        }
    }

    /// Visit the parts of a property access, flagging the object
    /// position, then try to collapse the access itself.
    fn visit_member(&mut self, expr: &mut Expr, in_member_obj: bool) {
        if let Expr::Member(member) = expr {
            self.in_member_obj = matches!(member.prop, MemberProp::Ident(_));
            member.obj.visit_mut_with(self);
            self.in_member_obj = false;
            if let MemberProp::Computed(computed) = &mut member.prop {
                computed.expr.visit_mut_with(self);
            }
        }
        self.maybe_collapse_member(expr, in_member_obj);
    }

    /// A property access in assignment position: inner chains still
    /// collapse, but a namespace object must not be written through.
    fn rewrite_member_write(&mut self, member: &mut MemberExpr) {
        self.in_member_obj = matches!(member.prop, MemberProp::Ident(_));
        member.obj.visit_mut_with(self);
        self.in_member_obj = false;
        if let MemberProp::Computed(computed) = &mut member.prop {
            computed.expr.visit_mut_with(self);
        }
        if let Expr::Ident(obj) = &*member.obj {
            if names::is_module_namespace(obj.sym.as_ref())
                && self.registry.module_by_name(obj.sym.as_ref()).is_some()
            {
                self.sink.report(
                    DiagnosticCode::ModuleNamespaceAssignment,
                    self.path,
                    member.span,
                    "cannot assign to a property of a module namespace",
                );
            }
        }
    }

    /// An arbitrary expression in assignment position (`x = …`, `x++`,
    /// `for (x of …)`).
    fn rewrite_expr_write(&mut self, expr: &mut Box<Expr>) {
        match &mut **expr {
            Expr::Ident(ident) => self.rewrite_assigned_ident(ident),
            Expr::Member(member) => self.rewrite_member_write(member),
            other => other.visit_mut_with(self),
        }
    }

    fn rewrite_assign_target(&mut self, target: &mut AssignTarget) {
        match target {
            AssignTarget::Simple(simple) => match simple {
                SimpleAssignTarget::Ident(binding_ident) => {
                    self.rewrite_assigned_ident(&mut binding_ident.id);
                }
                SimpleAssignTarget::Member(member) => self.rewrite_member_write(member),
                SimpleAssignTarget::Paren(paren) => paren.expr.visit_mut_with(self),
                other => other.visit_mut_children_with(self),
            },
            AssignTarget::Pat(pat) => match pat {
                AssignTargetPat::Array(array) => {
                    for elem in array.elems.iter_mut().flatten() {
                        self.rewrite_pat_write(elem);
                    }
                }
                AssignTargetPat::Object(object) => {
                    self.rewrite_object_pat_write(&mut object.props);
                }
                AssignTargetPat::Invalid(_) => {}
            },
        }
    }

    fn rewrite_pat_write(&mut self, pat: &mut Pat) {
        match pat {
            Pat::Ident(binding_ident) => self.rewrite_assigned_ident(&mut binding_ident.id),
            Pat::Array(array) => {
                for elem in array.elems.iter_mut().flatten() {
                    self.rewrite_pat_write(elem);
                }
            }
            Pat::Object(object) => self.rewrite_object_pat_write(&mut object.props),
            Pat::Rest(rest) => self.rewrite_pat_write(&mut rest.arg),
            Pat::Assign(assign) => {
                self.rewrite_pat_write(&mut assign.left);
                assign.right.visit_mut_with(self);
            }
            Pat::Expr(expr) => self.rewrite_expr_write(expr),
            Pat::Invalid(_) => {}
        }
    }

    fn rewrite_object_pat_write(&mut self, props: &mut Vec<ObjectPatProp>) {
        for prop in props.iter_mut() {
            match prop {
                ObjectPatProp::KeyValue(kv) => {
                    if let PropName::Computed(computed) = &mut kv.key {
                        computed.expr.visit_mut_with(self);
                    }
                    self.rewrite_pat_write(&mut kv.value);
                }
                ObjectPatProp::Rest(rest) => self.rewrite_pat_write(&mut rest.arg),
                ObjectPatProp::Assign(assign) => {
                    // Shorthand target `({x} = o)`; renaming the binding
                    // must not disturb the property key.
                    if assign.key.id.ctxt != self.top_level_ctxt {
                        if let Some(value) = &mut assign.value {
                            value.visit_mut_with(self);
                        }
                        continue;
                    }
                    if self
                        .record
                        .import_for_local(assign.key.id.sym.as_ref())
                        .is_some()
                    {
                        self.sink.report(
                            DiagnosticCode::ImportedBindingAssignment,
                            self.path,
                            assign.key.id.span,
                            format!(
                                "cannot assign to imported binding '{}'",
                                assign.key.id.sym
                            ),
                        );
                        if let Some(value) = &mut assign.value {
                            value.visit_mut_with(self);
                        }
                        continue;
                    }
                    let key = IdentName {
                        span: assign.key.id.span,
                        sym: assign.key.id.sym.clone(),
                    };
                    let mut target = assign.key.clone();
                    self.rewrite_assigned_ident(&mut target.id);
                    let value = match assign.value.take() {
                        None => Pat::Ident(target),
                        Some(mut default) => {
                            default.visit_mut_with(self);
                            Pat::Assign(AssignPat {
                                span: assign.span,
                                left: Box::new(Pat::Ident(target)),
                                right: default,
                            })
                        }
                    };
                    *prop = ObjectPatProp::KeyValue(KeyValuePatProp {
                        key: PropName::Ident(key),
                        value: Box::new(value),
                    });
                }
            }
        }
    }
}

impl VisitMut for Rewriter<'_> {
    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        let in_member_obj = std::mem::replace(&mut self.in_member_obj, false);
        match expr {
            Expr::This(this) => {
                // Module top-level `this` is just undefined.
                if self.fn_depth == 0 {
                    *expr = Expr::Ident(Ident::new(
                        "undefined".into(),
                        this.span,
                        SyntaxContext::empty(),
                    ));
                }
            }
            Expr::Ident(ident) => {
                self.rewrite_ident_read(ident, in_member_obj);
            }
            Expr::Member(_) => self.visit_member(expr, in_member_obj),
            Expr::Assign(assign) => {
                assign.right.visit_mut_with(self);
                self.rewrite_assign_target(&mut assign.left);
            }
            Expr::Update(update) => self.rewrite_expr_write(&mut update.arg),
            Expr::Call(_) => {
                expr.visit_mut_children_with(self);
                if let Expr::Call(call) = expr {
                    if let Callee::Expr(callee) = &call.callee {
                        if let Expr::Ident(ident) = &**callee {
                            if self.collapsed.contains(&ident.span) {
                                self.free_calls.push(call.span);
                            }
                        }
                    }
                }
            }
            _ => expr.visit_mut_children_with(self),
        }
    }

    fn visit_mut_prop(&mut self, prop: &mut Prop) {
        if let Prop::Shorthand(ident) = &*prop {
            if ident.ctxt == self.top_level_ctxt {
                let key = IdentName {
                    span: ident.span,
                    sym: ident.sym.clone(),
                };
                let mut value = ident.clone();
                if self.rewrite_ident_read(&mut value, false) {
                    *prop = Prop::KeyValue(KeyValueProp {
                        key: PropName::Ident(key),
                        value: Box::new(Expr::Ident(value)),
                    });
                }
                return;
            }
        }
        prop.visit_mut_children_with(self);
    }

    fn visit_mut_binding_ident(&mut self, ident: &mut BindingIdent) {
        self.rename_declared(&mut ident.id);
    }

    fn visit_mut_object_pat_prop(&mut self, prop: &mut ObjectPatProp) {
        // Shorthand in a declaration pattern (`var {x} = o`): longhand
        // before the binding is renamed.
        if let ObjectPatProp::Assign(assign) = prop {
            if assign.key.id.ctxt == self.top_level_ctxt {
                let key = IdentName {
                    span: assign.key.id.span,
                    sym: assign.key.id.sym.clone(),
                };
                let mut target = assign.key.clone();
                self.rename_declared(&mut target.id);
                let value = match assign.value.take() {
                    None => Pat::Ident(target),
                    Some(mut default) => {
                        default.visit_mut_with(self);
                        Pat::Assign(AssignPat {
                            span: assign.span,
                            left: Box::new(Pat::Ident(target)),
                            right: default,
                        })
                    }
                };
                *prop = ObjectPatProp::KeyValue(KeyValuePatProp {
                    key: PropName::Ident(key),
                    value: Box::new(value),
                });
                return;
            }
        }
        prop.visit_mut_children_with(self);
    }

    fn visit_mut_fn_decl(&mut self, decl: &mut FnDecl) {
        self.rename_declared(&mut decl.ident);
        decl.function.visit_mut_with(self);
    }

    fn visit_mut_class_decl(&mut self, decl: &mut ClassDecl) {
        self.rename_declared(&mut decl.ident);
        decl.class.visit_mut_with(self);
    }

    fn visit_mut_for_in_stmt(&mut self, stmt: &mut ForInStmt) {
        match &mut stmt.left {
            ForHead::Pat(pat) => self.rewrite_pat_write(pat),
            other => other.visit_mut_with(self),
        }
        stmt.right.visit_mut_with(self);
        stmt.body.visit_mut_with(self);
    }

    fn visit_mut_for_of_stmt(&mut self, stmt: &mut ForOfStmt) {
        match &mut stmt.left {
            ForHead::Pat(pat) => self.rewrite_pat_write(pat),
            other => other.visit_mut_with(self),
        }
        stmt.right.visit_mut_with(self);
        stmt.body.visit_mut_with(self);
    }

    fn visit_mut_function(&mut self, function: &mut Function) {
        self.fn_depth += 1;
        function.visit_mut_children_with(self);
        self.fn_depth -= 1;
    }

    // No visit_mut_arrow_expr: arrows inherit `this` lexically, so an
    // arrow at module top level still sees the module's `this`.

    fn visit_mut_class(&mut self, class: &mut Class) {
        self.fn_depth += 1;
        class.visit_mut_children_with(self);
        self.fn_depth -= 1;
    }

    fn visit_mut_constructor(&mut self, constructor: &mut Constructor) {
        self.fn_depth += 1;
        constructor.visit_mut_children_with(self);
        self.fn_depth -= 1;
    }

    fn visit_mut_getter_prop(&mut self, prop: &mut GetterProp) {
        self.fn_depth += 1;
        prop.visit_mut_children_with(self);
        self.fn_depth -= 1;
    }

    fn visit_mut_setter_prop(&mut self, prop: &mut SetterProp) {
        self.fn_depth += 1;
        prop.visit_mut_children_with(self);
        self.fn_depth -= 1;
    }
}

/// Make sure the file has a `@fileoverview` doc comment carrying the
/// suppressions downstream passes need for synthesized provides and
/// requires.
fn ensure_fileoverview(module: &Module, comments: &SingleThreadedComments) {
    let pos = module
        .body
        .first()
        .map(|item| item.span().lo)
        .unwrap_or(module.span.lo);

    let mut leading = comments.take_leading(pos).unwrap_or_default();
    let has_overview = leading.iter().any(|c| c.text.contains("@fileoverview"));
    if has_overview {
        if !leading.iter().any(|c| c.text.contains("@suppress")) {
            for comment in &mut leading {
                if comment.text.contains("@fileoverview") {
                    comment.text =
                        format!("{}@suppress {{missingProvide,missingRequire}} ", comment.text)
                            .into();
                    break;
                }
            }
        }
    } else {
        leading.insert(
            0,
            Comment {
                kind: CommentKind::Block,
                span: DUMMY_SP,
                text: "* @fileoverview @suppress {missingProvide,missingRequire} ".into(),
            },
        );
    }
    for comment in leading {
        comments.add_leading(pos, comment);
    }
}

/// Module files are implicitly strict; a written directive is useless
/// (warned about, kept), a missing one is added so concatenated output
/// stays strict.
fn normalize_use_strict(module: &mut Module, path: &str, sink: &DiagnosticSink) {
    if let Some(ModuleItem::Stmt(Stmt::Expr(expr_stmt))) = module.body.first() {
        if let Expr::Lit(Lit::Str(s)) = &*expr_stmt.expr {
            if s.value.as_str() == Some("use strict") {
                sink.report(
                    DiagnosticCode::UselessUseStrict,
                    path,
                    expr_stmt.span,
                    "'use strict' is unnecessary in a module, modules are always strict",
                );
                return;
            }
        }
    }
    module.body.insert(
        0,
        ModuleItem::Stmt(Stmt::Expr(ExprStmt {
            span: DUMMY_SP,
            expr: Box::new(Expr::Lit(Lit::Str(Str {
                span: DUMMY_SP,
                value: "use strict".into(),
                raw: None,
            }))),
        })),
    );
}
