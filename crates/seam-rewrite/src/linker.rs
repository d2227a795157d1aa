//! One link session: parse every input, build the registry, validate the
//! graph, rewrite every module.

use swc_common::comments::SingleThreadedComments;
use swc_common::{FileName, GLOBALS, Globals, Mark, SourceMap, SyntaxContext, sync::Lrc};
use swc_ecma_ast::{EsVersion, Module, Program};
use swc_ecma_parser::{EsSyntax, Parser, StringInput, Syntax, lexer::Lexer};
use swc_ecma_transforms_base::resolver;
use swc_ecma_visit::VisitMutWith;
use thiserror::Error;

use seam_graph::diagnostics::{Diagnostic, DiagnosticSink};
use seam_graph::loader::PathLoader;
use seam_graph::registry::ModuleRegistry;

use crate::rewrite::{RewriteOutput, rewrite_module};
use crate::scan::scan_module;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },
}

#[derive(Debug, Clone)]
pub struct LinkOptions {
    /// Language level the parser accepts. Default: ES2022.
    pub target: EsVersion,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            target: EsVersion::Es2022,
        }
    }
}

/// One input to a link session.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub source: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
        }
    }
}

/// One rewritten input, ready for emission.
pub struct LinkedModule {
    pub path: String,
    /// Canonical module name; `None` for files that are not modules
    /// (legacy scripts, demoted plain scripts).
    pub module_name: Option<String>,
    pub module: Module,
    pub comments: SingleThreadedComments,
    /// Rename metadata and free-call marks; `None` for non-modules.
    pub rewrite: Option<RewriteOutput>,
}

/// Result of a link session. Modules appear in input order; dependency
/// ordering is the caller's concern, driven by the registry annotations.
pub struct LinkOutput {
    pub modules: Vec<LinkedModule>,
    pub registry: ModuleRegistry,
    pub diagnostics: Vec<Diagnostic>,
    pub source_map: Lrc<SourceMap>,
}

/// Link a set of source files: parse, scan, register, validate, rewrite.
///
/// Per-node problems land in `LinkOutput::diagnostics`; only files the
/// parser cannot read at all fail the whole session.
pub fn link(inputs: Vec<SourceFile>, options: &LinkOptions) -> Result<LinkOutput, LinkError> {
    let cm: Lrc<SourceMap> = Default::default();
    let sink = DiagnosticSink::new();
    let loader = PathLoader::new(inputs.iter().map(|input| input.path.clone()));
    let mut registry = ModuleRegistry::new(Box::new(loader));

    struct ParsedFile {
        path: String,
        module: Module,
        comments: SingleThreadedComments,
        top_level_ctxt: SyntaxContext,
    }

    let modules = GLOBALS.set(&Globals::default(), || -> Result<_, LinkError> {
        let mut parsed = Vec::with_capacity(inputs.len());
        for input in inputs {
            tracing::debug!(path = %input.path, "parsing input");
            let fm = cm.new_source_file(
                Lrc::new(FileName::Custom(input.path.clone())),
                input.source,
            );
            let comments = SingleThreadedComments::default();
            let lexer = Lexer::new(
                Syntax::Es(EsSyntax::default()),
                options.target,
                StringInput::from(&*fm),
                Some(&comments),
            );
            let mut parser = Parser::new_from(lexer);
            let module = parser.parse_module().map_err(|e| LinkError::Parse {
                path: input.path.clone(),
                message: format!("{:?}", e.kind()),
            })?;
            for _ in parser.take_errors() {}

            let unresolved_mark = Mark::new();
            let top_level_mark = Mark::new();
            let mut program = Program::Module(module);
            program.visit_mut_with(&mut resolver(unresolved_mark, top_level_mark, false));
            let Program::Module(mut module) = program else {
                unreachable!("resolver does not change the program kind");
            };
            let top_level_ctxt = SyntaxContext::empty().apply_mark(top_level_mark);

            if let Some(module_input) =
                scan_module(&input.path, &mut module, top_level_ctxt, &sink)
            {
                registry.add_module(module_input, &sink);
            }
            parsed.push(ParsedFile {
                path: input.path,
                module,
                comments,
                top_level_ctxt,
            });
        }

        registry.instantiate_all(&sink);

        let mut modules = Vec::with_capacity(parsed.len());
        for file in parsed {
            let ParsedFile {
                path,
                mut module,
                comments,
                top_level_ctxt,
            } = file;
            let rewrite = rewrite_module(
                &path,
                &mut module,
                &comments,
                &registry,
                top_level_ctxt,
                &sink,
            );
            let module_name = registry.module_name_for_path(&path).map(str::to_string);
            modules.push(LinkedModule {
                path,
                module_name,
                module,
                comments,
                rewrite,
            });
        }
        Ok(modules)
    })?;

    Ok(LinkOutput {
        modules,
        registry,
        diagnostics: sink.into_diagnostics(),
        source_map: cm,
    })
}
