//! The module registry: canonical name ↔ record, cross-module
//! resolution, and the host-wide instantiation pass.

use std::collections::{HashMap, HashSet};

use crate::diagnostics::{DiagnosticCode, DiagnosticSink};
use crate::entry::{ExportEntry, ModuleInput};
use crate::loader::SpecifierLoader;
use crate::names;
use crate::record::ModuleRecord;

/// Provide/require metadata for one module, consumed by the external
/// dependency sorter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleAnnotations {
    /// The module's canonical name.
    pub provides: String,
    /// Canonical names of every resolved requested module, in source
    /// order.
    pub requires: Vec<String>,
}

/// Owns every module record of a link session and resolves between them.
///
/// Populated during the parse phase, validated once by
/// [`instantiate_all`](Self::instantiate_all), then consulted read-only
/// by the rewriter.
pub struct ModuleRegistry {
    loader: Box<dyn SpecifierLoader>,
    /// Canonical name → record.
    modules: HashMap<String, ModuleRecord>,
    /// Input path → canonical name.
    paths: HashMap<String, String>,
    /// Filled by `instantiate_all`.
    annotations: HashMap<String, ModuleAnnotations>,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.modules.keys())
            .finish_non_exhaustive()
    }
}

impl ModuleRegistry {
    pub fn new(loader: Box<dyn SpecifierLoader>) -> Self {
        Self {
            loader,
            modules: HashMap::new(),
            paths: HashMap::new(),
            annotations: HashMap::new(),
        }
    }

    /// Register one scanned file.
    ///
    /// Buckets the raw export entries into local/indirect/star. A raw
    /// entry with no `module_request` whose local name matches an import
    /// is rewritten into an indirect export of the import's target — this
    /// is how `import {x} from 'm'; export {x}` collapses statically.
    /// Duplicate export names are diagnosed here.
    pub fn add_module(&mut self, input: ModuleInput, sink: &DiagnosticSink) {
        let name = names::module_name(&input.path);
        tracing::debug!(path = %input.path, module = %name, "registering module");

        let mut imports_by_local: HashMap<&str, (&String, &Option<String>)> = HashMap::new();
        for entry in &input.imports {
            if let Some(local) = &entry.local_name {
                imports_by_local
                    .entry(local.as_str())
                    .or_insert((&entry.module_request, &entry.import_name));
            }
        }

        let mut local_exports = Vec::new();
        let mut indirect_exports = Vec::new();
        let mut star_exports = Vec::new();
        let mut seen_names: HashSet<String> = HashSet::new();

        for entry in input.exports {
            if let Some(export_name) = &entry.export_name {
                if !seen_names.insert(export_name.clone()) {
                    sink.report(
                        DiagnosticCode::DuplicateExportNames,
                        &input.path,
                        entry.span,
                        format!("duplicate export of '{export_name}'"),
                    );
                    continue;
                }
            }
            if entry.module_request.is_some() {
                if entry.export_name.is_some() {
                    indirect_exports.push(entry);
                } else {
                    star_exports.push(entry);
                }
                continue;
            }
            // Local shape; may actually re-export an import.
            let local = entry.orig_name.as_deref().unwrap();
            if let Some((request, import_name)) = imports_by_local.get(local) {
                indirect_exports.push(ExportEntry {
                    export_name: entry.export_name,
                    module_request: Some((*request).clone()),
                    orig_name: (*import_name).clone(),
                    span: entry.span,
                });
            } else {
                local_exports.push(entry);
            }
        }

        let record = ModuleRecord::new(
            input.path.clone(),
            name.clone(),
            input.requested_modules,
            input.imports,
            local_exports,
            indirect_exports,
            star_exports,
            input.top_level_names,
        );
        self.paths.insert(input.path, name.clone());
        self.modules.insert(name, record);
    }

    /// Resolve a specifier written in `referrer` to its module record.
    pub fn resolve_imported_module(
        &self,
        referrer: &ModuleRecord,
        specifier: &str,
    ) -> Option<&ModuleRecord> {
        let path = self.loader.locate(specifier, referrer.path())?;
        let name = self.paths.get(&path)?;
        self.modules.get(name)
    }

    pub fn module_by_name(&self, name: &str) -> Option<&ModuleRecord> {
        self.modules.get(name)
    }

    pub fn module_for_path(&self, path: &str) -> Option<&ModuleRecord> {
        self.modules.get(self.paths.get(path)?)
    }

    pub fn module_name_for_path(&self, path: &str) -> Option<&str> {
        self.paths.get(path).map(String::as_str)
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.modules.values()
    }

    /// The namespace view of a module, by canonical name.
    pub fn module_namespace(&self, name: &str) -> Option<&crate::record::Namespace> {
        self.module_by_name(name)?.namespace(self)
    }

    /// Annotations for one module, available after `instantiate_all`.
    pub fn annotations_for(&self, name: &str) -> Option<&ModuleAnnotations> {
        self.annotations.get(name)
    }

    /// Validate every import and indirect export in the program.
    ///
    /// Diagnoses unresolvable specifiers (`LOAD_ERROR`) and unresolvable
    /// names (`ES6_RESOLVE_EXPORT_FAILURE`), demotes files with no module
    /// syntax and no importers to plain scripts, and records the
    /// provide/require annotations for the dependency sorter.
    pub fn instantiate_all(&mut self, sink: &DiagnosticSink) {
        let mut imported_somewhere: HashSet<String> = HashSet::new();

        for module in self.modules.values() {
            let mut failed: HashSet<&str> = HashSet::new();

            for specifier in module.requested_modules() {
                match self.resolve_imported_module(module, specifier) {
                    Some(target) => {
                        imported_somewhere.insert(target.name().to_string());
                    }
                    None => {
                        sink.report(
                            DiagnosticCode::LoadError,
                            module.path(),
                            swc_common::DUMMY_SP,
                            format!("failed to load module '{specifier}'"),
                        );
                        failed.insert(specifier.as_str());
                    }
                }
            }

            for entry in module.indirect_exports() {
                let request = entry.module_request.as_deref().unwrap();
                if failed.contains(request) {
                    continue;
                }
                let export_name = entry.export_name.as_deref().unwrap();
                if module.resolve_export(self, export_name).is_none() {
                    sink.report(
                        DiagnosticCode::ResolveExportFailure,
                        module.path(),
                        entry.span,
                        format!("could not resolve export '{export_name}'"),
                    );
                }
            }

            for entry in module.imports() {
                let Some(import_name) = &entry.import_name else {
                    // Star and side-effect imports need only the module.
                    continue;
                };
                if failed.contains(entry.module_request.as_str()) {
                    continue;
                }
                let Some(target) = self.resolve_imported_module(module, &entry.module_request)
                else {
                    continue;
                };
                if target.resolve_export(self, import_name).is_none() {
                    sink.report(
                        DiagnosticCode::ResolveExportFailure,
                        module.path(),
                        entry.span,
                        format!(
                            "'{}' is not exported by '{}'",
                            import_name, entry.module_request
                        ),
                    );
                }
            }
        }

        // Files with no module syntax that nothing imports are plain
        // scripts; the rewriter must leave them untouched.
        let demoted: Vec<String> = self
            .modules
            .iter()
            .filter(|(name, module)| {
                !module.has_module_syntax() && !imported_somewhere.contains(*name)
            })
            .map(|(name, _)| name.clone())
            .collect();
        for name in demoted {
            if let Some(record) = self.modules.remove(&name) {
                tracing::debug!(path = %record.path(), "demoting plain script");
                self.paths.remove(record.path());
            }
        }

        let mut annotations = HashMap::new();
        for (name, module) in &self.modules {
            let requires = module
                .requested_modules()
                .iter()
                .filter_map(|specifier| {
                    self.resolve_imported_module(module, specifier)
                        .map(|target| target.name().to_string())
                })
                .collect();
            annotations.insert(
                name.clone(),
                ModuleAnnotations {
                    provides: name.clone(),
                    requires,
                },
            );
        }
        self.annotations = annotations;
        tracing::debug!(modules = self.modules.len(), "instantiated module graph");
    }
}
