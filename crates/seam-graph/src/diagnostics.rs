//! Diagnostic codes and the collecting sink.
//!
//! Diagnostics are non-fatal per node: the sink accumulates them and the
//! pass that reported one leaves the offending node alone and keeps going.
//! One malformed module can therefore surface several issues in a single
//! run. Internal invariant breaks are not diagnostics; those panic.

use std::cell::RefCell;
use std::fmt;

use swc_common::Span;

/// Every condition the linker reports. The string codes are external
/// contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    /// Write to a module-namespace property.
    ModuleNamespaceAssignment,
    /// Use of a namespace object outside a property access.
    ModuleNamespaceNonGetprop,
    /// Write to an imported binding.
    ImportedBindingAssignment,
    /// `var`/`let` on the left of `goog.require`.
    GoogRequireLhsNotConst,
    /// `use strict` directive in a module file (already strict).
    UselessUseStrict,
    /// Duplicate local names introduced by imports.
    DuplicateImportedNames,
    /// Duplicate export names within one module.
    DuplicateExportNames,
    /// An export could not be resolved.
    ResolveExportFailure,
    /// `export {x}` where `x` is not declared.
    ExportedBindingNotDeclared,
    /// A specifier did not resolve to an input.
    LoadError,
}

/// Severity of a diagnostic. Warnings do not fail a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl DiagnosticCode {
    /// The stable string code.
    pub fn as_str(self) -> &'static str {
        match self {
            // The trailing misspelling is part of the contract.
            Self::ModuleNamespaceAssignment => "ES6_MODULE_NAMESPACE_OBJECT_ASSIGNEMNT",
            Self::ModuleNamespaceNonGetprop => "ES6_MODULE_NAMESPACE_OBJECT_NON_GETPROP",
            Self::ImportedBindingAssignment => "ES6_IMPORTED_BINDING_ASSIGNMENT",
            Self::GoogRequireLhsNotConst => "LHS_OF_GOOG_REQUIRE_MUST_BE_CONST",
            Self::UselessUseStrict => "USELESS_USE_STRICT_DIRECTIVE",
            Self::DuplicateImportedNames => "ES6_DUPLICATED_IMPORTED_BOUND_NAMES",
            Self::DuplicateExportNames => "ES6_DUPLICATED_EXPORT_NAMES",
            Self::ResolveExportFailure => "ES6_RESOLVE_EXPORT_FAILURE",
            Self::ExportedBindingNotDeclared => "ES6_EXPORTED_BINDING_NOT_DECLARED",
            Self::LoadError => "LOAD_ERROR",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            Self::UselessUseStrict => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reported condition, tied to a source position.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    /// Input path of the file the condition was found in.
    pub path: String,
    pub span: Span,
    pub message: String,
}

impl Diagnostic {
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.path, self.code, self.message)
    }
}

/// Collector the whole link session reports into.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    entries: RefCell<Vec<Diagnostic>>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(
        &self,
        code: DiagnosticCode,
        path: impl Into<String>,
        span: Span,
        message: impl Into<String>,
    ) {
        let diagnostic = Diagnostic {
            code,
            path: path.into(),
            span,
            message: message.into(),
        };
        match diagnostic.severity() {
            Severity::Error => tracing::error!(code = %code, path = %diagnostic.path, "{}", diagnostic.message),
            Severity::Warning => tracing::warn!(code = %code, path = %diagnostic.path, "{}", diagnostic.message),
        }
        self.entries.borrow_mut().push(diagnostic);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Number of error-severity diagnostics.
    pub fn error_count(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|d| d.severity() == Severity::Error)
            .count()
    }

    /// Whether a given code has been reported at all.
    pub fn has(&self, code: DiagnosticCode) -> bool {
        self.entries.borrow().iter().any(|d| d.code == code)
    }

    /// Snapshot of everything reported so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.entries.borrow().clone()
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.entries.into_inner()
    }
}
