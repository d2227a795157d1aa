//! seam-rewrite - the syntax-tree half of the seam linker.
//!
//! Four pieces, run in order per file by [`link`]:
//!
//! 1. [`scan::scan_module`] - extract import/export entries and strip the
//!    module declarations (the parser pass).
//! 2. `seam-graph`'s registry build and `instantiate_all` validation.
//! 3. [`goog_require`] - the local `const x = goog.require('ns')` hoist.
//! 4. [`rewrite::rewrite_module`] - rename top-level bindings to global
//!    names, substitute imported references, collapse namespace accesses
//!    and rewrite doc-comment type names.
//!
//! After linking, every module's tree is free of import/export syntax and
//! safe to concatenate with every other module's tree.

pub mod goog_require;
pub mod linker;
pub mod rewrite;
pub mod scan;

mod doc_types;

pub use linker::{LinkError, LinkOptions, LinkOutput, LinkedModule, SourceFile, link};
pub use rewrite::{RewriteOutput, rewrite_module};
pub use scan::{DEFAULT_EXPORT_NAME, scan_module};
