//! Import and export entries extracted from a module's declarations.

use std::collections::HashSet;

use swc_common::Span;

/// A single imported binding (or a side-effect-only import).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    /// Module specifier as written in the source (e.g. `./utils.js`).
    pub module_request: String,
    /// Name exported by the other module. `None` is a star import: the
    /// whole namespace.
    pub import_name: Option<String>,
    /// Local binding name. `None` means the import introduces no binding
    /// (`import 'mod'`).
    pub local_name: Option<String>,
    /// Position of the binding (or of the declaration for side-effect
    /// imports), for diagnostics.
    pub span: Span,
}

impl ImportEntry {
    /// `import { foo as bar } from 'mod'` / `import foo from 'mod'`
    /// (the latter with `import_name = "default"`).
    pub fn named(
        module_request: impl Into<String>,
        import_name: impl Into<String>,
        local_name: impl Into<String>,
        span: Span,
    ) -> Self {
        Self {
            module_request: module_request.into(),
            import_name: Some(import_name.into()),
            local_name: Some(local_name.into()),
            span,
        }
    }

    /// `import * as ns from 'mod'`
    pub fn namespace(
        module_request: impl Into<String>,
        local_name: impl Into<String>,
        span: Span,
    ) -> Self {
        Self {
            module_request: module_request.into(),
            import_name: None,
            local_name: Some(local_name.into()),
            span,
        }
    }

    /// `import 'mod'`
    pub fn side_effect(module_request: impl Into<String>, span: Span) -> Self {
        Self {
            module_request: module_request.into(),
            import_name: None,
            local_name: None,
            span,
        }
    }

    /// Whether this is a star import (`import * as ns`).
    pub fn is_star(&self) -> bool {
        self.import_name.is_none() && self.local_name.is_some()
    }
}

/// A single exported name.
///
/// Four disjoint shapes:
///
/// - *local*: `module_request = None`, `orig_name` is the local binding.
/// - *indirect named*: `module_request` set, `orig_name` set.
/// - *indirect namespace*: `module_request` set, `orig_name = None`,
///   `export_name` set (`export * as ns from`, or `import * as x` plus
///   `export {x}` after registry normalization).
/// - *star*: `module_request` set, `orig_name = None`,
///   `export_name = None` (`export * from`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEntry {
    /// Name visible to importers. `None` only for star exports.
    pub export_name: Option<String>,
    /// Specifier of the source module for indirect and star exports.
    pub module_request: Option<String>,
    /// Name in the source module (the local binding for local exports,
    /// the imported name for indirect exports).
    pub orig_name: Option<String>,
    /// Position of the export clause, for diagnostics.
    pub span: Span,
}

impl ExportEntry {
    /// `export var x` / `export {x as y}` (before registry normalization).
    pub fn local(
        export_name: impl Into<String>,
        local_name: impl Into<String>,
        span: Span,
    ) -> Self {
        Self {
            export_name: Some(export_name.into()),
            module_request: None,
            orig_name: Some(local_name.into()),
            span,
        }
    }

    /// `export {x as y} from 'mod'`
    pub fn indirect(
        export_name: impl Into<String>,
        module_request: impl Into<String>,
        orig_name: impl Into<String>,
        span: Span,
    ) -> Self {
        Self {
            export_name: Some(export_name.into()),
            module_request: Some(module_request.into()),
            orig_name: Some(orig_name.into()),
            span,
        }
    }

    /// `export * as ns from 'mod'` — re-exports the whole namespace under
    /// one name.
    pub fn indirect_namespace(
        export_name: impl Into<String>,
        module_request: impl Into<String>,
        span: Span,
    ) -> Self {
        Self {
            export_name: Some(export_name.into()),
            module_request: Some(module_request.into()),
            orig_name: None,
            span,
        }
    }

    /// `export * from 'mod'`
    pub fn star(module_request: impl Into<String>, span: Span) -> Self {
        Self {
            export_name: None,
            module_request: Some(module_request.into()),
            orig_name: None,
            span,
        }
    }
}

/// Everything the parser pass hands the registry for one source file.
#[derive(Debug, Clone, Default)]
pub struct ModuleInput {
    /// Input path of the source file.
    pub path: String,
    /// Every specifier referenced by an import or from-export, in source
    /// order.
    pub requested_modules: Vec<String>,
    /// One entry per introduced local name (plus side-effect imports).
    pub imports: Vec<ImportEntry>,
    /// Raw export entries; the registry buckets them into
    /// local/indirect/star.
    pub exports: Vec<ExportEntry>,
    /// Bindings introduced by surviving top-level declarations and
    /// imports. Used to validate `export {x}` clauses.
    pub top_level_names: HashSet<String>,
}

impl ModuleInput {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use swc_common::DUMMY_SP;

    use super::*;

    #[test]
    fn test_import_entry_shapes() {
        let named = ImportEntry::named("./m.js", "foo", "bar", DUMMY_SP);
        assert!(!named.is_star());

        let star = ImportEntry::namespace("./m.js", "ns", DUMMY_SP);
        assert!(star.is_star());

        let side_effect = ImportEntry::side_effect("./m.js", DUMMY_SP);
        assert!(!side_effect.is_star());
        assert!(side_effect.local_name.is_none());
    }

    #[test]
    fn test_export_entry_shapes() {
        let local = ExportEntry::local("y", "x", DUMMY_SP);
        assert!(local.module_request.is_none());
        assert_eq!(local.orig_name.as_deref(), Some("x"));

        let star = ExportEntry::star("./m.js", DUMMY_SP);
        assert!(star.export_name.is_none());
        assert!(star.orig_name.is_none());

        let ns = ExportEntry::indirect_namespace("ns", "./m.js", DUMMY_SP);
        assert_eq!(ns.export_name.as_deref(), Some("ns"));
        assert!(ns.orig_name.is_none());
    }
}
