//! SVM Compiler Library
//!
//! Lowers an already-checked program tree into the intermediate program of
//! the stack virtual machine: postfix instructions, labels and variable
//! declarations, grouped into blocks.
//!
//! The front door is JSON: [`parse_program`] reads the tree that the checking
//! passes produced, [`lower_program`] runs the code generator, and [`render`]
//! writes the result as a listing or as JSON.
//!
//! ```rust,ignore
//! use svmc::{CompilerConfig, compile_file};
//!
//! let config = CompilerConfig::new().with_library_dir("lib");
//! compile_file(Path::new("game.json"), Path::new("game.svm"), &config)?;
//! ```

pub mod ast;
pub mod builtins;
pub mod codegen;
pub mod config;
pub mod includes;

pub use ast::{Program, SymbolTable};
pub use codegen::{CodeGen, CodeGenError};
pub use config::{CompilerConfig, OutputFormat};
pub use includes::{FsIncludeLoader, IncludeLoader, MemoryIncludeLoader};

use std::fs;
use std::path::Path;
use svm_core::IntermediateProgram;
use tracing::debug;

/// Read a checked program tree from its JSON form
pub fn parse_program(json: &str) -> Result<Program, String> {
    serde_json::from_str(json).map_err(|e| format!("Invalid program tree: {}", e))
}

/// Lower a checked program into an intermediate program
pub fn lower_program(
    program: &Program,
    config: &CompilerConfig,
    includes: &dyn IncludeLoader,
) -> Result<IntermediateProgram, String> {
    let symbols = SymbolTable::build(program);
    debug!(symbols = symbols.len(), "symbol table built");
    CodeGen::new(&symbols, config, includes, &program.name, program.load_address)
        .generate(program)
        .map_err(|e| format!("Lowering failed: {}", e))
}

/// Write out a lowered program in the requested format
pub fn render(program: &IntermediateProgram, format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Listing => Ok(program.to_string()),
        OutputFormat::Json => serde_json::to_string_pretty(program)
            .map_err(|e| format!("Failed to serialize program: {}", e)),
    }
}

/// Lower a JSON program tree to text, loading includes from disk
pub fn compile_source(json: &str, config: &CompilerConfig) -> Result<String, String> {
    let program = parse_program(json)?;
    let includes = FsIncludeLoader::new(config.library_dirs.clone());
    let lowered = lower_program(&program, config, &includes)?;
    render(&lowered, config.output_format)
}

/// Lower a JSON program tree file and write the result to `output_path`
pub fn compile_file(
    source_path: &Path,
    output_path: &Path,
    config: &CompilerConfig,
) -> Result<(), String> {
    let source = fs::read_to_string(source_path)
        .map_err(|e| format!("Failed to read source file: {}", e))?;
    let output = compile_source(&source, config)?;
    fs::write(output_path, output).map_err(|e| format!("Failed to write output file: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PROGRAM: &str = r#"{
        "name": "demo",
        "load_address": 2049,
        "modules": [{
            "name": "demo",
            "source": "demo.p8",
            "blocks": [{
                "name": "main",
                "options": [],
                "position": {"file": "demo.p8", "line": 1},
                "statements": [
                    {"kind": "var_decl", "name": "main.count", "datatype": "ubyte"},
                    {
                        "kind": "assignment",
                        "target": {"kind": "variable", "name": "main.count"},
                        "value": {"kind": "number", "value": {"type": "ubyte", "value": 42}},
                        "position": {"file": "demo.p8", "line": 4}
                    },
                    {
                        "kind": "directive",
                        "name": "%asminclude",
                        "args": ["library:irq.asm", "main"],
                        "position": {"file": "demo.p8", "line": 5}
                    }
                ]
            }]
        }]
    }"#;

    fn write_library(dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("irq.asm"), "  rti\n").unwrap();
    }

    #[test]
    fn test_parse_program() {
        let program = parse_program(PROGRAM).unwrap();
        assert_eq!(program.name, "demo");
        assert_eq!(program.modules[0].blocks[0].statements.len(), 3);
        assert!(parse_program("{").unwrap_err().starts_with("Invalid program tree"));
    }

    #[test]
    fn test_compile_file_listing() {
        let temp = tempdir().unwrap();
        let lib = temp.path().join("lib");
        write_library(&lib);
        let source = temp.path().join("demo.json");
        let output = temp.path().join("demo.svm");
        fs::write(&source, PROGRAM).unwrap();

        let config = CompilerConfig::new().with_library_dir(&lib);
        compile_file(&source, &output, &config).unwrap();

        let listing = fs::read_to_string(&output).unwrap();
        assert!(listing.starts_with("; program demo"));
        assert!(listing.contains("%block main"));
        assert!(listing.contains("main.count ubyte"));
        assert!(listing.contains("LINE 4 demo.p8"));
        assert!(listing.contains("PUSH_BYTE $2a"));
        assert!(listing.contains("POP_VAR_BYTE main.count"));
        assert!(listing.contains("INLINE_ASSEMBLY"));
    }

    #[test]
    fn test_compile_json_without_line_markers() {
        let temp = tempdir().unwrap();
        let lib = temp.path().join("lib");
        write_library(&lib);
        let config = CompilerConfig::new()
            .with_library_dir(&lib)
            .with_line_markers(false)
            .with_output_format(OutputFormat::Json);

        let json = compile_source(PROGRAM, &config).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["name"], "demo");
        let entries = value["blocks"][0]["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert!(!json.contains("\"LINE\""));
    }

    #[test]
    fn test_missing_include_fails_lowering() {
        let err = compile_source(PROGRAM, &CompilerConfig::new()).unwrap_err();
        assert!(err.starts_with("Lowering failed"));
        assert!(err.contains("irq.asm"));
    }

    #[test]
    fn test_compile_file_missing_source() {
        let temp = tempdir().unwrap();
        let err = compile_file(
            &temp.path().join("nope.json"),
            &temp.path().join("out.svm"),
            &CompilerConfig::default(),
        )
        .unwrap_err();
        assert!(err.starts_with("Failed to read source file"));
    }
}
