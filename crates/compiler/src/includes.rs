//! Assembly include loading
//!
//! `%asminclude` pulls assembly text in from outside the program tree.
//! Lowering only sees the `IncludeLoader` trait; the command line uses the
//! filesystem loader and tests use the in-memory one.
//!
//! Name resolution:
//! - `library:<path>` is looked up in each configured library directory first
//! - then next to the source file of the module doing the include
//! - then relative to the current working directory

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const LIBRARY_PREFIX: &str = "library:";

/// Source of included assembly text
pub trait IncludeLoader {
    /// Load `name` on behalf of the module whose source file is `module_source`
    fn load(&self, name: &str, module_source: &Path) -> Result<String, String>;
}

/// Loads includes from disk
#[derive(Debug, Clone, Default)]
pub struct FsIncludeLoader {
    library_dirs: Vec<PathBuf>,
}

impl FsIncludeLoader {
    pub fn new(library_dirs: Vec<PathBuf>) -> Self {
        FsIncludeLoader { library_dirs }
    }

    /// Candidate paths for `name`, in search order
    fn candidates(&self, name: &str, module_source: &Path) -> Result<Vec<PathBuf>, String> {
        let (library, rel_path) = match name.strip_prefix(LIBRARY_PREFIX) {
            Some(rest) => (true, rest),
            None => (false, name),
        };
        if rel_path.is_empty() {
            return Err("Include path cannot be empty".to_string());
        }
        let path = Path::new(rel_path);
        if path.is_absolute() {
            return Ok(vec![path.to_path_buf()]);
        }

        let mut candidates = Vec::new();
        if library {
            candidates.extend(self.library_dirs.iter().map(|dir| dir.join(path)));
        }
        if let Some(source_dir) = module_source.parent() {
            candidates.push(source_dir.join(path));
        }
        candidates.push(path.to_path_buf());
        Ok(candidates)
    }
}

impl IncludeLoader for FsIncludeLoader {
    fn load(&self, name: &str, module_source: &Path) -> Result<String, String> {
        let candidates = self.candidates(name, module_source)?;
        let found = candidates
            .iter()
            .find(|path| path.is_file())
            .ok_or_else(|| {
                let searched: Vec<String> =
                    candidates.iter().map(|p| p.display().to_string()).collect();
                format!("Include file '{}' not found (searched {})", name, searched.join(", "))
            })?;
        debug!(include = name, path = %found.display(), "loading assembly include");
        fs::read_to_string(found)
            .map_err(|e| format!("Failed to read include file {}: {}", found.display(), e))
    }
}

/// Serves includes from a fixed map of names to contents
#[derive(Debug, Clone, Default)]
pub struct MemoryIncludeLoader {
    files: HashMap<String, String>,
}

impl MemoryIncludeLoader {
    pub fn new() -> Self {
        MemoryIncludeLoader::default()
    }

    pub fn with_file(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.insert(name.into(), content.into());
        self
    }
}

impl IncludeLoader for MemoryIncludeLoader {
    fn load(&self, name: &str, _module_source: &Path) -> Result<String, String> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| format!("Include file '{}' not found", name))
    }
}
