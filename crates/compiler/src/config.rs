//! Compiler configuration
//!
//! Settings that change what the lowering emits or where it looks for
//! assembly includes. Built in code with the `with_*` builders or read from
//! a TOML file:
//!
//! ```toml
//! emit_line_markers = false
//! library_dirs = ["lib", "/opt/svm/lib"]
//! output_format = "json"
//! ```
//!
//! ```rust,ignore
//! use svmc::{CompilerConfig, OutputFormat};
//!
//! let config = CompilerConfig::new()
//!     .with_line_markers(false)
//!     .with_library_dir("lib")
//!     .with_output_format(OutputFormat::Json);
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// How the lowered program is written out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable instruction listing
    #[default]
    Listing,
    /// The intermediate program as JSON
    Json,
}

/// Configuration for lowering a program
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Stamp `LINE` markers with source positions into the instruction stream
    pub emit_line_markers: bool,

    /// Directories searched for `library:` assembly includes
    pub library_dirs: Vec<PathBuf>,

    pub output_format: OutputFormat,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            emit_line_markers: true,
            library_dirs: Vec::new(),
            output_format: OutputFormat::default(),
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        CompilerConfig::default()
    }

    /// Parse a configuration from TOML text; missing keys keep their defaults
    pub fn from_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| format!("Invalid configuration: {}", e))
    }

    /// Read and parse a TOML configuration file
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;
        Self::from_toml(&text).map_err(|e| format!("{} ({})", e, path.display()))
    }

    pub fn with_line_markers(mut self, emit: bool) -> Self {
        self.emit_line_markers = emit;
        self
    }

    /// Add a library directory for `library:` includes (builder pattern)
    pub fn with_library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.library_dirs.push(dir.into());
        self
    }

    pub fn with_library_dirs(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.library_dirs.extend(dirs);
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::default();
        assert!(config.emit_line_markers);
        assert!(config.library_dirs.is_empty());
        assert_eq!(config.output_format, OutputFormat::Listing);
    }

    #[test]
    fn test_config_builder() {
        let config = CompilerConfig::new()
            .with_line_markers(false)
            .with_library_dir("/custom/lib")
            .with_library_dirs(vec![PathBuf::from("lib")])
            .with_output_format(OutputFormat::Json);

        assert!(!config.emit_line_markers);
        assert_eq!(
            config.library_dirs,
            vec![PathBuf::from("/custom/lib"), PathBuf::from("lib")]
        );
        assert_eq!(config.output_format, OutputFormat::Json);
    }

    #[test]
    fn test_from_toml() {
        let config = CompilerConfig::from_toml(
            r#"
            emit_line_markers = false
            library_dirs = ["lib"]
            output_format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(
            config,
            CompilerConfig::new()
                .with_line_markers(false)
                .with_library_dir("lib")
                .with_output_format(OutputFormat::Json)
        );
    }

    #[test]
    fn test_from_toml_partial_keeps_defaults() {
        let config = CompilerConfig::from_toml("library_dirs = [\"asm\"]").unwrap();
        assert!(config.emit_line_markers);
        assert_eq!(config.library_dirs, vec![PathBuf::from("asm")]);
    }

    #[test]
    fn test_from_toml_rejects_unknown_keys() {
        let err = CompilerConfig::from_toml("optimise = true").unwrap_err();
        assert!(err.starts_with("Invalid configuration"));
    }

    #[test]
    fn test_load_from_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("svmc.toml");
        fs::write(&path, "output_format = \"listing\"\nemit_line_markers = false\n").unwrap();
        let config = CompilerConfig::load(&path).unwrap();
        assert!(!config.emit_line_markers);

        assert!(CompilerConfig::load(&temp.path().join("missing.toml")).is_err());
    }
}
