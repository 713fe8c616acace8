//! CodeGen State and Core Types
//!
//! This module contains the CodeGen struct definition and the context value
//! threaded through statement lowering.

use super::CodeGenError;
use crate::ast::{Position, SymbolTable};
use crate::config::CompilerConfig;
use crate::includes::IncludeLoader;
use std::path::PathBuf;
use svm_core::{DataType, Instruction, IntermediateProgram};
use tracing::trace;

/// Jump targets for `break` and `continue` inside the innermost loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct LoopLabels<'s> {
    pub break_label: &'s str,
    pub continue_label: &'s str,
}

/// Per-statement lowering context.
///
/// Passed by value into every recursive call, so a loop body sees its own
/// loop's labels and nothing leaks back out to the enclosing statements.
#[derive(Debug, Clone, Copy)]
pub(super) struct StmtContext<'s> {
    /// Scoped name generated labels are prefixed with
    pub scope: &'s str,
    pub loop_labels: Option<LoopLabels<'s>>,
    /// Declared return types of the enclosing subroutine
    pub return_types: &'s [DataType],
}

impl<'s> StmtContext<'s> {
    pub fn new(scope: &'s str) -> Self {
        StmtContext {
            scope,
            loop_labels: None,
            return_types: &[],
        }
    }

    pub fn with_scope(self, scope: &'s str) -> Self {
        StmtContext { scope, ..self }
    }

    pub fn with_loop(self, break_label: &'s str, continue_label: &'s str) -> Self {
        StmtContext {
            loop_labels: Some(LoopLabels {
                break_label,
                continue_label,
            }),
            ..self
        }
    }

    /// Context for a subroutine body: loops of the caller are out of reach
    pub fn subroutine(scope: &'s str, return_types: &'s [DataType]) -> Self {
        StmtContext {
            scope,
            loop_labels: None,
            return_types,
        }
    }
}

/// Lowering state for one compilation.
///
/// Owns the instruction sink and the label sequence counter; a fresh
/// instance is needed for every program.
pub struct CodeGen<'a> {
    pub(super) symbols: &'a SymbolTable,
    pub(super) config: &'a CompilerConfig,
    pub(super) includes: &'a dyn IncludeLoader,
    pub(super) prog: IntermediateProgram,
    /// Source file of the module being lowered, for relative includes
    pub(super) module_source: PathBuf,
    label_seq: usize,
}

impl<'a> CodeGen<'a> {
    pub fn new(
        symbols: &'a SymbolTable,
        config: &'a CompilerConfig,
        includes: &'a dyn IncludeLoader,
        program_name: &str,
        load_address: Option<u16>,
    ) -> Self {
        CodeGen {
            symbols,
            config,
            includes,
            prog: IntermediateProgram::new(program_name, load_address),
            module_source: PathBuf::new(),
            label_seq: 0,
        }
    }

    /// Finish lowering and hand over the program
    pub fn into_program(self) -> IntermediateProgram {
        self.prog
    }

    /// A fresh label in `scope`; the sequence number makes it unique per run
    pub(super) fn make_label(&mut self, scope: &str, suffix: &str) -> String {
        self.label_seq += 1;
        let label = format!("{scope}.<s-{}-{suffix}>", self.label_seq);
        trace!(label = %label, "generated label");
        label
    }

    pub(super) fn emit(&mut self, instruction: Instruction) -> Result<(), CodeGenError> {
        self.prog.instr(instruction)?;
        Ok(())
    }

    pub(super) fn label(&mut self, name: &str) -> Result<(), CodeGenError> {
        self.prog.label(name, false)?;
        Ok(())
    }

    /// Stamp a source position, unless disabled or unknown
    pub(super) fn line(&mut self, position: &Position) -> Result<(), CodeGenError> {
        if self.config.emit_line_markers && position.line > 0 {
            self.prog.line(position.line, &position.file)?;
        }
        Ok(())
    }
}
