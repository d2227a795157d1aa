//! Module records and export resolution.
//!
//! A [`ModuleRecord`] is built once from the parser pass's output and is
//! structurally frozen afterwards; only its memoization caches fill in as
//! the resolver runs. Cross-module references go through the registry by
//! canonical name, never by ownership, so the record graph may be cyclic
//! while the Rust ownership graph is not.

use std::cell::{OnceCell, RefCell};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::entry::{ExportEntry, ImportEntry};
use crate::registry::ModuleRegistry;

/// A resolved reference: a module plus an exported local name, or the
/// module's namespace itself when `name` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Canonical name of the module the binding lives in.
    pub module: String,
    /// Local name within that module; `None` tags a namespace binding.
    pub name: Option<String>,
}

impl Binding {
    pub fn local(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: Some(name.into()),
        }
    }

    pub fn namespace(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: None,
        }
    }

    pub fn is_namespace(&self) -> bool {
        self.name.is_none()
    }
}

/// Outcome of export resolution. `Ambiguous` never escapes the resolver:
/// external callers see it as an unresolvable export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Resolution {
    Found(Binding),
    NotFound,
    Ambiguous,
}

impl Resolution {
    fn into_binding(self) -> Option<Binding> {
        match self {
            Resolution::Found(binding) => Some(binding),
            Resolution::NotFound | Resolution::Ambiguous => None,
        }
    }
}

/// Read-only view of a module's exports: the frozen name set, without
/// `default`. Property lookup goes back through `resolve_export`.
#[derive(Debug, Clone)]
pub struct Namespace {
    exported_names: BTreeSet<String>,
}

impl Namespace {
    pub fn contains(&self, name: &str) -> bool {
        self.exported_names.contains(name)
    }

    /// Exported names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.exported_names.iter().map(String::as_str)
    }
}

/// Everything known about one module: its entries, plus lazily-filled
/// resolution caches.
#[derive(Debug)]
pub struct ModuleRecord {
    path: String,
    name: String,
    requested_modules: Vec<String>,
    imports: Vec<ImportEntry>,
    /// Index into `imports` per introduced local name.
    imports_by_local: HashMap<String, usize>,
    local_exports: Vec<ExportEntry>,
    indirect_exports: Vec<ExportEntry>,
    star_exports: Vec<ExportEntry>,
    top_level_names: HashSet<String>,
    /// Memo for `resolve_export`. Stores `NotFound` and `Ambiguous` too:
    /// "resolved to nothing" must be distinguishable from "not yet
    /// tried", or star-export fan-out goes quadratic.
    resolved: RefCell<HashMap<String, Resolution>>,
    namespace: OnceCell<Option<Namespace>>,
}

impl ModuleRecord {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        path: String,
        name: String,
        requested_modules: Vec<String>,
        imports: Vec<ImportEntry>,
        local_exports: Vec<ExportEntry>,
        indirect_exports: Vec<ExportEntry>,
        star_exports: Vec<ExportEntry>,
        top_level_names: HashSet<String>,
    ) -> Self {
        let mut imports_by_local = HashMap::new();
        for (idx, entry) in imports.iter().enumerate() {
            if let Some(local) = &entry.local_name {
                imports_by_local.entry(local.clone()).or_insert(idx);
            }
        }
        Self {
            path,
            name,
            requested_modules,
            imports,
            imports_by_local,
            local_exports,
            indirect_exports,
            star_exports,
            top_level_names,
            resolved: RefCell::new(HashMap::new()),
            namespace: OnceCell::new(),
        }
    }

    /// Input path of the source file.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Canonical module name (`module$…`).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requested_modules(&self) -> &[String] {
        &self.requested_modules
    }

    pub fn imports(&self) -> &[ImportEntry] {
        &self.imports
    }

    /// The import entry that introduced `local`, if any.
    pub fn import_for_local(&self, local: &str) -> Option<&ImportEntry> {
        self.imports_by_local.get(local).map(|&idx| &self.imports[idx])
    }

    pub fn local_exports(&self) -> &[ExportEntry] {
        &self.local_exports
    }

    pub fn indirect_exports(&self) -> &[ExportEntry] {
        &self.indirect_exports
    }

    pub fn star_exports(&self) -> &[ExportEntry] {
        &self.star_exports
    }

    pub fn top_level_names(&self) -> &HashSet<String> {
        &self.top_level_names
    }

    /// Whether the file carries any module syntax at all.
    pub fn has_module_syntax(&self) -> bool {
        !self.requested_modules.is_empty()
            || !self.imports.is_empty()
            || !self.local_exports.is_empty()
            || !self.indirect_exports.is_empty()
            || !self.star_exports.is_empty()
    }

    /// The set of names this module exports, star exports included.
    ///
    /// Returns `None` when a star-exported module fails to load; the
    /// marker propagates so callers can tell "no names" from "unknown".
    pub fn exported_names(
        &self,
        registry: &ModuleRegistry,
        visited: &mut HashSet<String>,
    ) -> Option<BTreeSet<String>> {
        if !visited.insert(self.name.clone()) {
            return Some(BTreeSet::new());
        }
        let mut names = BTreeSet::new();
        for entry in self.local_exports.iter().chain(&self.indirect_exports) {
            // export_name is always set outside the star bucket
            names.insert(entry.export_name.clone().unwrap());
        }
        for entry in &self.star_exports {
            let request = entry.module_request.as_deref().unwrap();
            let target = registry.resolve_imported_module(self, request)?;
            let star_names = target.exported_names(registry, visited)?;
            for name in star_names {
                if name != "default" {
                    names.insert(name);
                }
            }
        }
        Some(names)
    }

    /// The namespace view, materialized on first use. `None` when the
    /// exported-name set could not be computed (a star target failed to
    /// load).
    pub fn namespace(&self, registry: &ModuleRegistry) -> Option<&Namespace> {
        self.namespace
            .get_or_init(|| {
                let mut visited = HashSet::new();
                self.exported_names(registry, &mut visited).map(|mut names| {
                    names.remove("default");
                    Namespace {
                        exported_names: names,
                    }
                })
            })
            .as_ref()
    }

    /// Resolve a name through the namespace view: only names in the
    /// frozen exported set are visible.
    pub fn resolve_namespace_export(
        &self,
        registry: &ModuleRegistry,
        name: &str,
    ) -> Option<Binding> {
        let namespace = self.namespace(registry)?;
        if !namespace.contains(name) {
            return None;
        }
        self.resolve_export(registry, name)
    }

    /// Resolve an exported name to the binding that declares it.
    ///
    /// Memoized; repeated lookups of the same name are O(1) and yield the
    /// same answer. Ambiguous resolutions (two star exports disagreeing)
    /// surface as `None`: from the caller's viewpoint the export is not
    /// resolvable.
    pub fn resolve_export(&self, registry: &ModuleRegistry, export_name: &str) -> Option<Binding> {
        if let Some(resolution) = self.resolved.borrow().get(export_name) {
            return resolution.clone().into_binding();
        }
        let mut resolve_set = Vec::new();
        let mut star_set = Vec::new();
        let resolution =
            self.resolve_export_inner(registry, export_name, &mut resolve_set, &mut star_set);
        self.resolved
            .borrow_mut()
            .insert(export_name.to_string(), resolution.clone());
        resolution.into_binding()
    }

    /// The full resolution algorithm. `resolve_set` detects circular
    /// imports, `star_set` breaks `export *` cycles; both are threaded
    /// through the whole recursion unchanged.
    ///
    /// Never consults the memo: cached answers are only valid for a
    /// resolution started from empty sets.
    pub(crate) fn resolve_export_inner(
        &self,
        registry: &ModuleRegistry,
        export_name: &str,
        resolve_set: &mut Vec<(String, String)>,
        star_set: &mut Vec<String>,
    ) -> Resolution {
        if resolve_set
            .iter()
            .any(|(module, name)| *module == self.name && name == export_name)
        {
            // Circular import; the cycle cannot satisfy this entry.
            return Resolution::NotFound;
        }
        resolve_set.push((self.name.clone(), export_name.to_string()));

        for entry in &self.local_exports {
            if entry.export_name.as_deref() == Some(export_name) {
                let local = entry.orig_name.clone().unwrap();
                return Resolution::Found(Binding::local(self.name.clone(), local));
            }
        }

        for entry in &self.indirect_exports {
            if entry.export_name.as_deref() != Some(export_name) {
                continue;
            }
            let request = entry.module_request.as_deref().unwrap();
            let Some(target) = registry.resolve_imported_module(self, request) else {
                return Resolution::NotFound;
            };
            return match &entry.orig_name {
                // Re-exported namespace: the binding is the module itself.
                None => Resolution::Found(Binding::namespace(target.name().to_string())),
                Some(orig) => target.resolve_export_inner(registry, orig, resolve_set, star_set),
            };
        }

        if export_name == "default" {
            // A default export cannot be provided by export *.
            return Resolution::NotFound;
        }

        if star_set.iter().any(|name| *name == self.name) {
            return Resolution::NotFound;
        }
        star_set.push(self.name.clone());

        let mut star_resolution = Resolution::NotFound;
        for entry in &self.star_exports {
            let request = entry.module_request.as_deref().unwrap();
            let Some(target) = registry.resolve_imported_module(self, request) else {
                // Load failure was already diagnosed; contributes nothing.
                continue;
            };
            match target.resolve_export_inner(registry, export_name, resolve_set, star_set) {
                Resolution::Ambiguous => return Resolution::Ambiguous,
                Resolution::NotFound => {}
                Resolution::Found(binding) => match &star_resolution {
                    Resolution::NotFound => star_resolution = Resolution::Found(binding),
                    Resolution::Found(previous) if *previous != binding => {
                        return Resolution::Ambiguous;
                    }
                    _ => {}
                },
            }
        }
        star_resolution
    }
}
