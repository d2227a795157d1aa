//! seam - statically link ES modules into one concatenation-safe script.
//!
//! Reads the input files, links them (rename, substitute, collapse),
//! orders them by the registry's provide/require annotations and prints
//! the concatenated bundle.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use swc_common::{SourceMap, sync::Lrc};
use swc_ecma_codegen::{Config as CodegenConfig, Emitter, text_writer::JsWriter};

use seam_graph::diagnostics::Severity;
use seam_rewrite::{LinkOptions, LinkOutput, LinkedModule, SourceFile, link};

#[derive(Parser, Debug)]
#[command(
    name = "seam",
    version,
    about = "Statically link ES modules into one concatenation-safe script"
)]
struct Args {
    /// Input files; their paths double as module addresses.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Write the bundle to a file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print diagnostics as JSON on stderr.
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut sources = Vec::with_capacity(args.inputs.len());
    for path in &args.inputs {
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        sources.push(SourceFile::new(path.to_string_lossy(), source));
    }

    let output = link(sources, &LinkOptions::default())?;
    tracing::debug!(
        modules = output.modules.len(),
        diagnostics = output.diagnostics.len(),
        "link session finished"
    );

    let mut bundle = String::new();
    for index in dependency_order(&output) {
        bundle.push_str(&emit(&output.modules[index], &output.source_map)?);
    }

    match &args.output {
        Some(path) => fs::write(path, &bundle)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{bundle}"),
    }

    report_diagnostics(&output, args.json);

    let failed = output
        .diagnostics
        .iter()
        .any(|d| d.severity() == Severity::Error);
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Emission order: every module after the modules it requires, driven by
/// the provide/require annotations. Cycles fall back to input order.
fn dependency_order(output: &LinkOutput) -> Vec<usize> {
    let mut index_by_name: HashMap<&str, usize> = HashMap::new();
    for (index, module) in output.modules.iter().enumerate() {
        if let Some(name) = &module.module_name {
            index_by_name.insert(name, index);
        }
    }

    fn visit(
        index: usize,
        output: &LinkOutput,
        index_by_name: &HashMap<&str, usize>,
        visited: &mut [bool],
        order: &mut Vec<usize>,
    ) {
        if visited[index] {
            return;
        }
        visited[index] = true;
        if let Some(name) = &output.modules[index].module_name {
            if let Some(annotations) = output.registry.annotations_for(name) {
                for required in &annotations.requires {
                    if let Some(&required_index) = index_by_name.get(required.as_str()) {
                        visit(required_index, output, index_by_name, visited, order);
                    }
                }
            }
        }
        order.push(index);
    }

    let mut visited = vec![false; output.modules.len()];
    let mut order = Vec::with_capacity(output.modules.len());
    for index in 0..output.modules.len() {
        visit(index, output, &index_by_name, &mut visited, &mut order);
    }
    order
}

fn emit(module: &LinkedModule, cm: &Lrc<SourceMap>) -> Result<String> {
    let mut buf = vec![];
    {
        let writer = JsWriter::new(cm.clone(), "\n", &mut buf, None);
        let mut emitter = Emitter {
            cfg: CodegenConfig::default().with_minify(false),
            cm: cm.clone(),
            comments: Some(&module.comments),
            wr: writer,
        };
        emitter
            .emit_module(&module.module)
            .with_context(|| format!("failed to emit {}", module.path))?;
    }
    String::from_utf8(buf).context("emitted code is not valid UTF-8")
}

fn report_diagnostics(output: &LinkOutput, as_json: bool) {
    if output.diagnostics.is_empty() {
        return;
    }
    if as_json {
        let entries: Vec<serde_json::Value> = output
            .diagnostics
            .iter()
            .map(|d| {
                let mut entry = serde_json::json!({
                    "code": d.code.as_str(),
                    "severity": match d.severity() {
                        Severity::Error => "error",
                        Severity::Warning => "warning",
                    },
                    "path": d.path,
                    "message": d.message,
                });
                if !d.span.is_dummy() {
                    let loc = output.source_map.lookup_char_pos(d.span.lo);
                    entry["line"] = loc.line.into();
                    entry["column"] = loc.col_display.into();
                }
                entry
            })
            .collect();
        eprintln!("{}", serde_json::to_string_pretty(&entries).unwrap());
        return;
    }
    for d in &output.diagnostics {
        let severity = match d.severity() {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        if d.span.is_dummy() {
            eprintln!("{severity}[{}]: {}: {}", d.code, d.path, d.message);
        } else {
            let loc = output.source_map.lookup_char_pos(d.span.lo);
            eprintln!(
                "{severity}[{}]: {}:{}:{}: {}",
                d.code,
                d.path,
                loc.line,
                loc.col_display,
                d.message
            );
        }
    }
}
