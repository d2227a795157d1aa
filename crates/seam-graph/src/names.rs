//! Canonical module names and global-name mangling.
//!
//! Every module gets a canonical name derived from its input path, always
//! beginning with [`MODULE_NAME_PREFIX`]. The rewriter recognizes a
//! module-namespace identifier by that prefix alone, so the prefix must
//! never appear in a mangled character.

/// Prefix of every canonical module name.
pub const MODULE_NAME_PREFIX: &str = "module$";

/// Derive the canonical module name for an input path.
///
/// `foo/bar-baz.js` becomes `module$foo$bar_baz`. The mapping keeps
/// distinct paths distinct for the character sets that occur in practice;
/// collisions between exotic paths are the loader's problem, not ours.
pub fn module_name(path: &str) -> String {
    let path = path.strip_prefix("./").unwrap_or(path);
    let path = path.strip_suffix(".js").unwrap_or(path);

    let mut name = String::with_capacity(MODULE_NAME_PREFIX.len() + path.len());
    name.push_str(MODULE_NAME_PREFIX);
    for ch in path.chars() {
        match ch {
            '/' | '\\' | '.' => name.push('$'),
            '-' | ':' => name.push('_'),
            ch if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' => name.push(ch),
            _ => name.push('$'),
        }
    }
    name
}

/// The final identifier of a top-level binding after rewriting:
/// `local + "$$" + canonical name`.
///
/// Locals cannot contain `$$` followed by the module prefix (the scan
/// rejects no identifiers, but canonical names always start with
/// `module$`, and `$$module$` never occurs in source identifiers the
/// rewriter produces), so the mapping is injective across modules.
pub fn global_name(local: &str, module_name: &str) -> String {
    format!("{local}$${module_name}")
}

/// Whether an identifier is a canonical module name (a materialized
/// namespace reference).
pub fn is_module_namespace(name: &str) -> bool {
    name.starts_with(MODULE_NAME_PREFIX)
}
