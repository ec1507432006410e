//! Resolution of `import` paths to module source text.
//!
//! The parser re-enters itself on imported files; the loader is the seam
//! that decides where module source comes from, so tests can stay
//! hermetic while the CLI walks the library path on disk.

use std::collections::HashMap;
use std::path::PathBuf;

/// Resolves a dotted module path to `(source, canonical file name)`.
pub trait ModuleLoader {
    /// Loads the module named by `path` (the components of `a.b.c`).
    fn load(&self, path: &[String]) -> Option<(String, String)>;
}

/// Filesystem loader searching a fixed list of roots for
/// `<root>/<a>/<b>.hatch`.
#[derive(Debug, Clone)]
pub struct FsLoader {
    roots: Vec<PathBuf>,
}

impl FsLoader {
    /// The default library path: the working directory, then nearby `lib`
    /// directories.
    pub fn new() -> Self {
        Self::with_roots(
            ["./", "./lib", "../lib", "../../lib"]
                .into_iter()
                .map(PathBuf::from)
                .collect(),
        )
    }

    /// A loader over an explicit list of search roots.
    pub fn with_roots(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }
}

impl Default for FsLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleLoader for FsLoader {
    fn load(&self, path: &[String]) -> Option<(String, String)> {
        for root in &self.roots {
            let mut candidate = root.clone();
            for component in path {
                candidate.push(component);
            }
            candidate.set_extension("hatch");

            if let Ok(source) = std::fs::read_to_string(&candidate) {
                let canonical = std::fs::canonicalize(&candidate).unwrap_or(candidate);
                return Some((source, canonical.to_string_lossy().into_owned()));
            }
        }
        None
    }
}

/// In-memory loader keyed by dotted path; used by unit tests and
/// embedders.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    modules: HashMap<String, String>,
}

impl MemoryLoader {
    /// An empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers module source under a dotted path such as `"io"`.
    pub fn insert(&mut self, path: &str, source: &str) {
        self.modules.insert(path.to_string(), source.to_string());
    }
}

impl ModuleLoader for MemoryLoader {
    fn load(&self, path: &[String]) -> Option<(String, String)> {
        let dotted = path.join(".");
        self.modules
            .get(&dotted)
            .map(|source| (source.clone(), format!("<memory:{dotted}>")))
    }
}
