//! seam-graph - module records, export resolution and the registry.
//!
//! This crate is the graph half of the seam linker: it knows what every
//! module imports and exports, resolves exported names across arbitrary
//! re-export and `export *` chains (with cycle detection and ambiguity
//! reporting), and validates the whole program in one
//! [`instantiate_all`](registry::ModuleRegistry::instantiate_all) pass.
//! It never looks at syntax trees; the companion crate `seam-rewrite`
//! feeds it entries and consumes its bindings.

pub mod diagnostics;
pub mod entry;
pub mod loader;
pub mod names;
pub mod record;
pub mod registry;

pub use diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink, Severity};
pub use entry::{ExportEntry, ImportEntry, ModuleInput};
pub use loader::{PathLoader, SpecifierLoader};
pub use record::{Binding, ModuleRecord, Namespace};
pub use registry::{ModuleAnnotations, ModuleRegistry};
