//! Local rewrite of `const x = goog.require('ns')` statements.
//!
//! Runs shallowly over the top-level statements before renaming. The call
//! is hoisted to its own expression statement and the declaration's
//! initializer becomes the required namespace as a qualified name, so the
//! later rename of `x` cannot disturb the `goog.require` call itself.

use swc_common::{DUMMY_SP, SyntaxContext};
use swc_ecma_ast::*;

use seam_graph::diagnostics::{DiagnosticCode, DiagnosticSink};

/// Rewrite every `const <lhs> = goog.require('<ns>')` at the top level of
/// `module`.
pub fn rewrite_goog_requires(module: &mut Module, path: &str, sink: &DiagnosticSink) {
    let mut new_items: Vec<ModuleItem> = Vec::with_capacity(module.body.len());

    for item in module.body.drain(..) {
        let ModuleItem::Stmt(Stmt::Decl(Decl::Var(mut var_decl))) = item else {
            new_items.push(item);
            continue;
        };

        // Only the single-declarator form is recognized.
        let namespace = if var_decl.decls.len() == 1 {
            goog_require_namespace(&var_decl.decls[0])
        } else {
            None
        };
        let Some(namespace) = namespace else {
            new_items.push(ModuleItem::Stmt(Stmt::Decl(Decl::Var(var_decl))));
            continue;
        };

        if var_decl.kind != VarDeclKind::Const {
            sink.report(
                DiagnosticCode::GoogRequireLhsNotConst,
                path,
                var_decl.span,
                format!("goog.require('{namespace}') must be assigned to a const"),
            );
            new_items.push(ModuleItem::Stmt(Stmt::Decl(Decl::Var(var_decl))));
            continue;
        }

        let declarator = &mut var_decl.decls[0];

        // Hoist the call to its own statement ahead of the declaration.
        let call = declarator.init.take().unwrap();
        new_items.push(ModuleItem::Stmt(Stmt::Expr(ExprStmt {
            span: DUMMY_SP,
            expr: call,
        })));

        declarator.init = Some(Box::new(qualified_name(&namespace)));
        if let Pat::Object(object_pat) = &mut declarator.name {
            canonicalize_shorthand(object_pat);
        }
        new_items.push(ModuleItem::Stmt(Stmt::Decl(Decl::Var(var_decl))));
    }

    module.body = new_items;
}

/// The namespace string if the declarator is `… = goog.require('<ns>')`.
fn goog_require_namespace(declarator: &VarDeclarator) -> Option<String> {
    let init = declarator.init.as_deref()?;
    let Expr::Call(call) = init else {
        return None;
    };
    let Callee::Expr(callee) = &call.callee else {
        return None;
    };
    let Expr::Member(member) = &**callee else {
        return None;
    };
    let Expr::Ident(obj) = &*member.obj else {
        return None;
    };
    let MemberProp::Ident(prop) = &member.prop else {
        return None;
    };
    if obj.sym != "goog" || prop.sym != "require" {
        return None;
    }
    if call.args.len() != 1 || call.args[0].spread.is_some() {
        return None;
    }
    let Expr::Lit(Lit::Str(s)) = &*call.args[0].expr else {
        return None;
    };
    s.value.as_str().map(str::to_string)
}

/// `foo.bar.baz` as a member chain. The root identifier is a global
/// provided elsewhere; it carries an empty context so the renamer leaves
/// it alone.
fn qualified_name(namespace: &str) -> Expr {
    let mut parts = namespace.split('.');
    let root = parts.next().expect("namespace is never empty");
    let mut expr = Expr::Ident(Ident::new(root.into(), DUMMY_SP, SyntaxContext::empty()));
    for part in parts {
        expr = Expr::Member(MemberExpr {
            span: DUMMY_SP,
            obj: Box::new(expr),
            prop: MemberProp::Ident(IdentName {
                span: DUMMY_SP,
                sym: part.into(),
            }),
        });
    }
    expr
}

/// `const {x} = …` and `const {x = d} = …` become `const {x: x} = …` and
/// `const {x: x = d} = …` so renaming the binding cannot disturb the
/// property key. Only top-level keys are touched; nested patterns pass
/// through unchanged.
fn canonicalize_shorthand(object_pat: &mut ObjectPat) {
    for prop in &mut object_pat.props {
        if let ObjectPatProp::Assign(assign) = prop {
            let key = assign.key.clone();
            let value: Pat = match assign.value.take() {
                None => Pat::Ident(key.clone()),
                Some(default) => Pat::Assign(AssignPat {
                    span: assign.span,
                    left: Box::new(Pat::Ident(key.clone())),
                    right: default,
                }),
            };
            *prop = ObjectPatProp::KeyValue(KeyValuePatProp {
                key: PropName::Ident(IdentName {
                    span: key.id.span,
                    sym: key.id.sym.clone(),
                }),
                value: Box::new(value),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use swc_common::{FileName, SourceMap, sync::Lrc};
    use swc_ecma_parser::{EsSyntax, Parser, StringInput, Syntax, lexer::Lexer};

    use seam_graph::diagnostics::{DiagnosticCode, DiagnosticSink};

    use super::*;

    fn rewrite_source(source: &str) -> (Module, DiagnosticSink) {
        let cm: Lrc<SourceMap> = Default::default();
        let fm = cm.new_source_file(
            Lrc::new(FileName::Custom("m.js".to_string())),
            source.to_string(),
        );
        let lexer = Lexer::new(
            Syntax::Es(EsSyntax::default()),
            EsVersion::Es2022,
            StringInput::from(&*fm),
            None,
        );
        let mut parser = Parser::new_from(lexer);
        let mut module = parser.parse_module().expect("parse failed");
        for _ in parser.take_errors() {}
        let sink = DiagnosticSink::new();
        rewrite_goog_requires(&mut module, "m.js", &sink);
        (module, sink)
    }

    fn as_var_decl(item: &ModuleItem) -> &VarDecl {
        let ModuleItem::Stmt(Stmt::Decl(Decl::Var(var_decl))) = item else {
            panic!("expected a var declaration, got {item:?}");
        };
        var_decl
    }

    #[test]
    fn test_call_is_hoisted_and_initializer_becomes_qualified_name() {
        let (module, sink) = rewrite_source("const bar = goog.require('foo.bar.baz');");
        assert!(sink.is_empty());
        assert_eq!(module.body.len(), 2);

        // First the hoisted call on its own.
        let ModuleItem::Stmt(Stmt::Expr(expr_stmt)) = &module.body[0] else {
            panic!("expected the hoisted call");
        };
        assert!(matches!(&*expr_stmt.expr, Expr::Call(_)));

        // Then the const with the qualified name as initializer.
        let var_decl = as_var_decl(&module.body[1]);
        assert_eq!(var_decl.kind, VarDeclKind::Const);
        let init = var_decl.decls[0].init.as_deref().unwrap();
        let Expr::Member(outer) = init else {
            panic!("expected a member chain, got {init:?}");
        };
        let MemberProp::Ident(prop) = &outer.prop else {
            panic!("expected an identifier property");
        };
        assert_eq!(prop.sym, "baz");
    }

    #[test]
    fn test_non_const_lhs_is_diagnosed_and_left_alone() {
        let (module, sink) = rewrite_source("var bar = goog.require('foo.bar');");
        assert!(sink.has(DiagnosticCode::GoogRequireLhsNotConst));
        // Untouched: still one statement, initializer still the call.
        assert_eq!(module.body.len(), 1);
        let var_decl = as_var_decl(&module.body[0]);
        assert!(matches!(
            var_decl.decls[0].init.as_deref(),
            Some(Expr::Call(_))
        ));
    }

    #[test]
    fn test_shorthand_destructuring_becomes_longhand() {
        let (module, _) = rewrite_source("const {x, y: z, w = 1} = goog.require('foo.bar');");
        let var_decl = as_var_decl(&module.body[1]);
        let Pat::Object(object_pat) = &var_decl.decls[0].name else {
            panic!("expected an object pattern");
        };
        // Every prop is longhand now.
        for prop in &object_pat.props {
            assert!(
                matches!(prop, ObjectPatProp::KeyValue(_)),
                "still shorthand: {prop:?}"
            );
        }
    }

    #[test]
    fn test_unrelated_declarations_pass_through() {
        let (module, sink) = rewrite_source("const a = other.require('x');\nconst b = 1;");
        assert!(sink.is_empty());
        assert_eq!(module.body.len(), 2);
    }
}
