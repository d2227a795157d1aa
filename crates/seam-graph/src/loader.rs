//! Specifier resolution.
//!
//! The physical loader is a collaborator the linker only talks to through
//! [`SpecifierLoader`]: given a specifier string and the file it appears
//! in, produce the canonical input path — or nothing, in which case the
//! registry reports a load error and moves on.

use std::collections::HashMap;

/// Maps a module specifier to the canonical path of an input.
pub trait SpecifierLoader {
    /// Resolve `specifier` as written in `referrer`. Returns the input
    /// path the specifier denotes, or `None` if it cannot be located.
    fn locate(&self, specifier: &str, referrer: &str) -> Option<String>;
}

/// Loader over the fixed set of compilation inputs.
///
/// Relative specifiers (`./`, `../`) resolve against the referrer's
/// directory; anything else is taken as a root-relative path. Candidates
/// are checked against the input set as written and with a `.js`
/// extension appended. Located paths come back exactly as the input was
/// registered, whatever normal form the specifier used.
#[derive(Debug, Default)]
pub struct PathLoader {
    /// Normalized path → path as registered.
    inputs: HashMap<String, String>,
}

impl PathLoader {
    pub fn new(inputs: impl IntoIterator<Item = String>) -> Self {
        Self {
            inputs: inputs
                .into_iter()
                .map(|path| (normalize(&path), path))
                .collect(),
        }
    }
}

impl SpecifierLoader for PathLoader {
    fn locate(&self, specifier: &str, referrer: &str) -> Option<String> {
        let candidate = if specifier.starts_with("./") || specifier.starts_with("../") {
            let base = parent_dir(referrer);
            if base.is_empty() {
                normalize(specifier)
            } else {
                normalize(&format!("{base}/{specifier}"))
            }
        } else {
            normalize(specifier)
        };

        if let Some(path) = self.inputs.get(&candidate) {
            return Some(path.clone());
        }
        self.inputs.get(&format!("{candidate}.js")).cloned()
    }
}

fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Collapse `.` and `..` segments and duplicate slashes. `..` segments
/// that would climb above the root are dropped.
fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader(paths: &[&str]) -> PathLoader {
        PathLoader::new(paths.iter().map(|p| p.to_string()))
    }

    #[test]
    fn test_relative_sibling() {
        let l = loader(&["main.js", "other.js"]);
        assert_eq!(l.locate("./other.js", "main.js").as_deref(), Some("other.js"));
    }

    #[test]
    fn test_relative_in_subdir() {
        let l = loader(&["app/main.js", "app/util.js", "lib/dep.js"]);
        assert_eq!(
            l.locate("./util.js", "app/main.js").as_deref(),
            Some("app/util.js")
        );
        assert_eq!(
            l.locate("../lib/dep.js", "app/main.js").as_deref(),
            Some("lib/dep.js")
        );
    }

    #[test]
    fn test_extension_appended() {
        let l = loader(&["other.js"]);
        assert_eq!(l.locate("./other", "main.js").as_deref(), Some("other.js"));
        assert_eq!(l.locate("other", "main.js").as_deref(), Some("other.js"));
    }

    #[test]
    fn test_unknown_specifier() {
        let l = loader(&["main.js"]);
        assert_eq!(l.locate("./missing.js", "main.js"), None);
    }

    #[test]
    fn test_excess_parent_segments_clamped() {
        let l = loader(&["dep.js"]);
        assert_eq!(l.locate("../../dep.js", "main.js").as_deref(), Some("dep.js"));
    }

    #[test]
    fn test_located_path_comes_back_as_registered() {
        let l = loader(&["./other.js", "main.js"]);
        assert_eq!(
            l.locate("./other.js", "main.js").as_deref(),
            Some("./other.js")
        );
    }
}
