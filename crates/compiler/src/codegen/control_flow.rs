//! Control Flow Code Generation
//!
//! This module handles if/else statements, status flag branches, `when`
//! dispatch and the loop exits `break` and `continue`. Loops themselves are
//! in `loops`.

use super::state::StmtContext;
use super::{CodeGen, CodeGenError, opcodes};
use crate::ast::{
    BranchStatement, IfStatement, Jump, JumpTarget, Position, Scope, Statement, WhenStatement,
};
use svm_core::{Instruction, Opcode};

impl CodeGen<'_> {
    /// Lower a nested scope with its own scope name
    pub(super) fn codegen_scope(
        &mut self,
        scope: &Scope,
        ctx: StmtContext<'_>,
    ) -> Result<(), CodeGenError> {
        self.codegen_statements(&scope.statements, ctx.with_scope(scope.scope_name(ctx.scope)))
    }

    /// Generate code for an if statement with optional else part
    ///
    /// A true part consisting of a single jump becomes a conditional jump
    /// straight to its target.
    pub(super) fn codegen_if(
        &mut self,
        stmt: &IfStatement,
        ctx: StmtContext<'_>,
    ) -> Result<(), CodeGenError> {
        self.line(&stmt.position)?;
        let condition_dt = self.expression_type(&stmt.condition)?;
        self.codegen_expression(&stmt.condition)?;

        if let [Statement::Jump(jump)] = stmt.true_part.statements.as_slice() {
            self.codegen_jump(jump, opcodes::jump_if_nonzero(condition_dt)?)?;
            return self.codegen_scope(&stmt.else_part, ctx);
        }

        let jump_if_false = opcodes::jump_if_zero(condition_dt)?;
        let end_label = self.make_label(ctx.scope, "if_end");
        if stmt.else_part.contains_no_code_nor_vars() {
            self.emit(Instruction::new(jump_if_false).with_label(end_label.as_str()))?;
            self.codegen_scope(&stmt.true_part, ctx)?;
        } else {
            let else_label = self.make_label(ctx.scope, "else");
            self.emit(Instruction::new(jump_if_false).with_label(else_label.as_str()))?;
            self.codegen_scope(&stmt.true_part, ctx)?;
            self.emit(Instruction::new(Opcode::Jump).with_label(end_label.as_str()))?;
            self.label(&else_label)?;
            self.codegen_scope(&stmt.else_part, ctx)?;
        }
        self.label(&end_label)?;
        self.emit(Instruction::new(Opcode::Nop))
    }

    /// Generate code for a status flag branch (`if_cs`, `if_z`, ...)
    ///
    /// When both parts start with a plain jump the whole statement collapses
    /// into a branch and its complement.
    pub(super) fn codegen_branch(
        &mut self,
        stmt: &BranchStatement,
        ctx: StmtContext<'_>,
    ) -> Result<(), CodeGenError> {
        if stmt.true_part.contains_no_code_nor_vars()
            && stmt.else_part.contains_no_code_nor_vars()
        {
            return Ok(());
        }
        self.line(&stmt.position)?;

        let else_jump = if stmt.else_part.contains_no_code_nor_vars() {
            Some(None)
        } else {
            leading_label_jump(&stmt.else_part).map(Some)
        };
        let true_jump = leading_label_jump(&stmt.true_part);
        if let (Some(true_jump), Some(else_jump)) = (true_jump, else_jump) {
            self.codegen_jump(true_jump, opcodes::branch(stmt.condition, false))?;
            if let Some(else_jump) = else_jump {
                self.codegen_jump(else_jump, opcodes::branch(stmt.condition, true))?;
            }
            return Ok(());
        }

        let complement = opcodes::branch(stmt.condition, true);
        let else_label = self.make_label(ctx.scope, "else");
        let end_label = self.make_label(ctx.scope, "branch_end");
        if stmt.else_part.contains_no_code_nor_vars() {
            self.emit(Instruction::new(complement).with_label(end_label.as_str()))?;
            self.codegen_scope(&stmt.true_part, ctx)?;
        } else {
            self.emit(Instruction::new(complement).with_label(else_label.as_str()))?;
            self.codegen_scope(&stmt.true_part, ctx)?;
            self.emit(Instruction::new(Opcode::Jump).with_label(end_label.as_str()))?;
            self.label(&else_label)?;
            self.codegen_scope(&stmt.else_part, ctx)?;
        }
        self.label(&end_label)?;
        self.emit(Instruction::new(Opcode::Nop))
    }

    pub(super) fn codegen_break(
        &mut self,
        position: &Position,
        ctx: StmtContext<'_>,
    ) -> Result<(), CodeGenError> {
        let labels = ctx
            .loop_labels
            .ok_or(CodeGenError::LoopControlOutsideLoop("break"))?;
        self.line(position)?;
        self.emit(Instruction::new(Opcode::Jump).with_label(labels.break_label))
    }

    pub(super) fn codegen_continue(
        &mut self,
        position: &Position,
        ctx: StmtContext<'_>,
    ) -> Result<(), CodeGenError> {
        let labels = ctx
            .loop_labels
            .ok_or(CodeGenError::LoopControlOutsideLoop("continue"))?;
        self.line(position)?;
        self.emit(Instruction::new(Opcode::Jump).with_label(labels.continue_label))
    }

    /// Generate code for a `when` statement
    ///
    /// The scrutinee stays on the stack while it is compared against every
    /// choice value in turn; each match branches to that choice's body. An
    /// else choice runs inline where it appears in the comparison chain.
    pub(super) fn codegen_when(
        &mut self,
        stmt: &WhenStatement,
        ctx: StmtContext<'_>,
    ) -> Result<(), CodeGenError> {
        self.line(&stmt.position)?;
        let dt = self.expression_type(&stmt.condition)?;
        if !dt.is_integer() {
            return Err(CodeGenError::InvalidType {
                operation: "when",
                datatype: dt,
            });
        }
        let dup = opcodes::dup(dt)?;
        let compare = opcodes::compare(dt)?;
        let discard = opcodes::discard(dt)?;

        self.codegen_expression(&stmt.condition)?;
        if stmt.choices.is_empty() {
            return self.emit(Instruction::new(discard));
        }

        let end_label = self.make_label(ctx.scope, "when_end");
        let mut choice_bodies = Vec::new();
        for choice in &stmt.choices {
            let Some(values) = &choice.values else {
                self.codegen_scope(&choice.body, ctx)?;
                continue;
            };
            let mut constants = Vec::with_capacity(values.len());
            for value in values {
                let constant = value.const_value(self.symbols).ok_or_else(|| {
                    CodeGenError::structure("when choice values must be constants")
                })?;
                constants.push(constant.cast(dt)?);
            }
            let first = constants
                .first()
                .and_then(|v| v.as_integer())
                .ok_or_else(|| CodeGenError::structure("when choice without values"))?;
            let choice_label = self.make_label(ctx.scope, &format!("choice_{first}"));
            for constant in constants {
                self.emit(Instruction::new(dup))?;
                self.emit(Instruction::new(compare).with_arg(constant))?;
                self.emit(Instruction::new(Opcode::Bz).with_label(choice_label.as_str()))?;
            }
            choice_bodies.push((choice_label, &choice.body));
        }
        self.emit(Instruction::new(Opcode::Jump).with_label(end_label.as_str()))?;

        for (choice_label, body) in choice_bodies {
            self.label(&choice_label)?;
            self.codegen_scope(body, ctx)?;
            self.emit(Instruction::new(Opcode::Jump).with_label(end_label.as_str()))?;
        }
        // the last body falls through to the end
        self.prog.remove_last_instruction()?;
        self.label(&end_label)?;
        self.emit(Instruction::new(discard))
    }
}

/// First statement of a scope if it is a jump to a label, not to an address
fn leading_label_jump(scope: &Scope) -> Option<&Jump> {
    match scope.statements.first() {
        Some(Statement::Jump(jump)) if !matches!(jump.target, JumpTarget::Address(_)) => Some(jump),
        _ => None,
    }
}
