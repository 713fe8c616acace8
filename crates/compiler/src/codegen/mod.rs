//! Stack VM Code Generation
//!
//! Lowers a checked program tree into an `IntermediateProgram`: blocks of
//! postfix stack instructions, labels and variable declarations.
//!
//! # Lowering Strategy
//!
//! Code is emitted in a single forward pass into the instruction sink:
//! 1. Every expression leaves exactly one value of its inferred type on the
//!    operand stack
//! 2. Every statement leaves the operand stack as it found it
//! 3. Structured control flow becomes labels plus jumps and flag branches
//!
//! Generated labels are `"{scope}.<s-{seq}-{suffix}>"` with a sequence number
//! that is unique for the whole compilation.
//!
//! # Statement Context
//!
//! The enclosing scope name, the innermost loop's break/continue labels and
//! the enclosing subroutine's return types travel down as a `StmtContext`
//! value. Nothing about loops is stored on the generator itself, so a label
//! can never leak out of the loop it belongs to.

// Submodules
mod builtin_calls;
mod calls;
mod control_flow;
mod conversion;
mod error;
mod expressions;
mod loops;
mod opcodes;
mod state;
mod statements;

// Re-exports
pub use conversion::{CastSide, common_type};
pub use error::CodeGenError;
pub use state::CodeGen;

use crate::ast::{Block, Declaration, Program, Statement, visit_declarations};
use state::StmtContext;
use svm_core::{DataType, IntermediateProgram, Storage};
use tracing::{debug, info};

impl CodeGen<'_> {
    /// Lower a whole program, module by module and block by block
    pub fn generate(mut self, program: &Program) -> Result<IntermediateProgram, CodeGenError> {
        for module in &program.modules {
            debug!(module = %module.name, blocks = module.blocks.len(), "lowering module");
            self.module_source = module.source.clone();
            for block in &module.blocks {
                self.process_block(block)?;
            }
        }
        let prog = self.into_program();
        info!(
            program = %prog.name,
            blocks = prog.blocks.len(),
            "lowering finished"
        );
        Ok(prog)
    }

    fn process_block(&mut self, block: &Block) -> Result<(), CodeGenError> {
        info!(block = %block.name, statements = block.statements.len(), "lowering block");
        self.prog
            .new_block(&block.name, block.address, block.options.clone());
        self.register_variables(&block.statements, &block.name)?;
        self.line(&block.position)?;
        self.codegen_statements(&block.statements, StmtContext::new(&block.name))
    }

    /// Declare every variable the block's statements introduce, nested scopes included
    fn register_variables(
        &mut self,
        statements: &[Statement],
        scope: &str,
    ) -> Result<(), CodeGenError> {
        let mut declared = Vec::new();
        visit_declarations(statements, scope, &mut |decl| match decl {
            // only the flattened members of a struct take up storage
            Declaration::Variable(var) if var.datatype == DataType::Struct => {}
            Declaration::Variable(var) => {
                declared.push((var.name.clone(), var.datatype, var.storage, var.length))
            }
            Declaration::Parameter(sub, param) => declared.push((
                format!("{}.{}", sub.name, param.name),
                param.datatype,
                Storage::Plain,
                None,
            )),
            Declaration::Label(_) | Declaration::Subroutine(_) => {}
        });

        for (name, datatype, storage, length) in declared {
            self.prog.variable(name, datatype, storage, length)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Helpers for lowering fragments in unit tests

    use super::state::StmtContext;
    use super::{CodeGen, CodeGenError};
    use crate::ast::{Expression, Statement, SymbolTable};
    use crate::config::CompilerConfig;
    use crate::includes::MemoryIncludeLoader;
    use svm_core::{Entry, Instruction, Opcode, ProgramBlock, Value};

    pub fn ubyte(n: u8) -> Expression {
        Expression::number(Value::UByte(n))
    }

    pub fn ident(name: &str) -> Expression {
        Expression::identifier(name)
    }

    pub fn ins(opcode: Opcode) -> Instruction {
        Instruction::new(opcode)
    }

    pub fn ins_arg(opcode: Opcode, arg: Value) -> Instruction {
        Instruction::new(opcode).with_arg(arg)
    }

    pub fn ins_label(opcode: Opcode, label: &str) -> Instruction {
        Instruction::new(opcode).with_label(label)
    }

    /// Lower statements into a block named `main`, without line markers
    pub fn lower_block_with(
        symbols: &SymbolTable,
        includes: &MemoryIncludeLoader,
        statements: &[Statement],
    ) -> Result<ProgramBlock, CodeGenError> {
        let config = CompilerConfig::default().with_line_markers(false);
        let mut codegen = CodeGen::new(symbols, &config, includes, "test", None);
        codegen.prog.new_block("main", None, Vec::new());
        codegen.codegen_statements(statements, StmtContext::new("main"))?;
        let mut prog = codegen.into_program();
        Ok(prog.blocks.remove(0))
    }

    pub fn lower_block(
        symbols: &SymbolTable,
        statements: &[Statement],
    ) -> Result<ProgramBlock, CodeGenError> {
        lower_block_with(symbols, &MemoryIncludeLoader::new(), statements)
    }

    pub fn lower_entries_with(
        symbols: &SymbolTable,
        includes: &MemoryIncludeLoader,
        statements: &[Statement],
    ) -> Result<Vec<Entry>, CodeGenError> {
        Ok(lower_block_with(symbols, includes, statements)?.entries)
    }

    pub fn lower_entries(
        symbols: &SymbolTable,
        statements: &[Statement],
    ) -> Result<Vec<Entry>, CodeGenError> {
        lower_entries_with(symbols, &MemoryIncludeLoader::new(), statements)
    }

    /// Instructions only, labels dropped
    pub fn lower_statements(
        symbols: &SymbolTable,
        statements: &[Statement],
    ) -> Result<Vec<Instruction>, CodeGenError> {
        Ok(instructions(lower_entries(symbols, statements)?))
    }

    pub fn lower_expression(
        symbols: &SymbolTable,
        expr: &Expression,
    ) -> Result<Vec<Instruction>, CodeGenError> {
        let config = CompilerConfig::default().with_line_markers(false);
        let includes = MemoryIncludeLoader::new();
        let mut codegen = CodeGen::new(symbols, &config, &includes, "test", None);
        codegen.prog.new_block("main", None, Vec::new());
        codegen.codegen_expression(expr)?;
        let prog = codegen.into_program();
        Ok(prog.blocks[0].instructions().cloned().collect())
    }

    pub fn instructions(entries: Vec<Entry>) -> Vec<Instruction> {
        entries
            .into_iter()
            .filter_map(|entry| match entry {
                Entry::Instruction(ins) => Some(ins),
                Entry::Label { .. } => None,
            })
            .collect()
    }

    pub fn labels(entries: &[Entry]) -> Vec<&str> {
        entries
            .iter()
            .filter_map(|entry| match entry {
                Entry::Label { name, .. } => Some(name.as_str()),
                Entry::Instruction(_) => None,
            })
            .collect()
    }

    /// Rendered form of a fragment, one entry per line, for sequence assertions
    pub fn listing(entries: &[Entry]) -> Vec<String> {
        entries
            .iter()
            .map(|entry| match entry {
                Entry::Label { name, .. } => format!("{name}:"),
                Entry::Instruction(ins) => ins.to_string(),
            })
            .collect()
    }
}
