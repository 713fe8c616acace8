//! Statement Code Generation
//!
//! Statement dispatch plus the simple statements: assignments, increments,
//! jumps, returns, directives, inline assembly and subroutine definitions.
//! Structured control flow lives in `control_flow` and `loops`.

use super::state::StmtContext;
use super::{CodeGen, CodeGenError, opcodes};
use crate::ast::{
    AssignTarget, Assignment, Directive, DirectiveArg, Expression, IncrDecr, InlineAssembly, Jump,
    JumpTarget, PostIncrDecr, Return, Statement, Subroutine, Symbol, struct_member_name,
};
use svm_core::{DataType, Instruction, Opcode, Storage, Value};
use tracing::debug;

impl CodeGen<'_> {
    pub(super) fn codegen_statements(
        &mut self,
        statements: &[Statement],
        ctx: StmtContext<'_>,
    ) -> Result<(), CodeGenError> {
        for statement in statements {
            self.codegen_statement(statement, ctx)?;
        }
        Ok(())
    }

    pub(super) fn codegen_statement(
        &mut self,
        statement: &Statement,
        ctx: StmtContext<'_>,
    ) -> Result<(), CodeGenError> {
        match statement {
            // declarations were registered with the block
            Statement::VarDecl(_) | Statement::Nop => Ok(()),
            Statement::Label(label) => {
                self.line(&label.position)?;
                self.label(&label.name)
            }
            Statement::Assignment(assignment) => self.codegen_assignment(assignment),
            Statement::PostIncrDecr(stmt) => self.codegen_post_incr_decr(stmt),
            Statement::Jump(jump) => self.codegen_jump(jump, Opcode::Jump),
            Statement::Call(call) => {
                self.line(&call.position)?;
                self.codegen_call_statement(&call.call)
            }
            Statement::If(stmt) => self.codegen_if(stmt, ctx),
            Statement::Branch(stmt) => self.codegen_branch(stmt, ctx),
            Statement::Break { position } => self.codegen_break(position, ctx),
            Statement::Continue { position } => self.codegen_continue(position, ctx),
            Statement::For(stmt) => self.codegen_for(stmt, ctx),
            Statement::While(stmt) => self.codegen_while(stmt, ctx),
            Statement::Repeat(stmt) => self.codegen_repeat(stmt, ctx),
            Statement::Scope(scope) => self.codegen_scope(scope, ctx),
            Statement::Return(ret) => self.codegen_return(ret, ctx),
            Statement::ReturnFromIrq { position } => {
                self.line(position)?;
                self.emit(Instruction::new(Opcode::Returnfromirq))
            }
            Statement::Directive(directive) => self.codegen_directive(directive),
            Statement::Subroutine(sub) => self.codegen_subroutine(sub),
            Statement::InlineAssembly(asm) => self.codegen_inline_assembly(asm, None),
            Statement::When(stmt) => self.codegen_when(stmt, ctx),
        }
    }

    // ------------------------------------------------------------------------
    // Assignment
    // ------------------------------------------------------------------------

    fn codegen_assignment(&mut self, assignment: &Assignment) -> Result<(), CodeGenError> {
        self.line(&assignment.position)?;
        match &assignment.value {
            Expression::StructLiteral { values } => {
                self.codegen_struct_assignment(&assignment.target, values)
            }
            value => self.codegen_assign(&assignment.target, value),
        }
    }

    /// Store `value` into `target`, widening it to the target's type
    pub(super) fn codegen_assign(
        &mut self,
        target: &AssignTarget,
        value: &Expression,
    ) -> Result<(), CodeGenError> {
        let target_dt = target
            .infer_type(self.symbols)
            .ok_or_else(|| {
                CodeGenError::structure(format!("cannot infer the type of {target:?}"))
            })?;
        self.codegen_value_as(value, target_dt)?;
        self.pop_into_target(target)
    }

    /// Lower `value` and leave it on the stack as a `target` typed value
    pub(super) fn codegen_value_as(
        &mut self,
        value: &Expression,
        target: DataType,
    ) -> Result<(), CodeGenError> {
        let value_dt = self.expression_type(value)?;
        self.codegen_expression(value)?;
        // a string or array in a word context is its address
        if value_dt.is_iterable() && target == DataType::UWord {
            return Ok(());
        }
        self.convert(value_dt, target)
    }

    fn codegen_struct_assignment(
        &mut self,
        target: &AssignTarget,
        values: &[Expression],
    ) -> Result<(), CodeGenError> {
        let AssignTarget::Variable { name } = target else {
            return Err(CodeGenError::structure(
                "a struct literal can only be assigned to a struct variable",
            ));
        };
        let members = self
            .symbols
            .variable(name)
            .filter(|v| v.datatype == DataType::Struct)
            .map(|v| v.struct_members.clone())
            .ok_or_else(|| CodeGenError::structure(format!("'{name}' is not a struct variable")))?;
        if members.len() != values.len() {
            return Err(CodeGenError::structure(format!(
                "struct '{name}' has {} members but the literal has {} values",
                members.len(),
                values.len()
            )));
        }
        for (member, value) in members.iter().zip(values) {
            let member_target = AssignTarget::Variable {
                name: struct_member_name(name, member),
            };
            self.codegen_assign(&member_target, value)?;
        }
        Ok(())
    }

    /// Pop the value on top of the stack into `target`
    pub(super) fn pop_into_target(&mut self, target: &AssignTarget) -> Result<(), CodeGenError> {
        match target {
            AssignTarget::Variable { name } => {
                let var = self
                    .symbols
                    .variable(name)
                    .ok_or_else(|| CodeGenError::structure(format!("'{name}' is not a variable")))?;
                match var.storage {
                    Storage::Plain => {
                        let opcode = opcodes::pop_var(var.datatype)?;
                        self.emit(Instruction::new(opcode).with_label(name.as_str()))
                    }
                    Storage::Memory(address) => {
                        let opcode = opcodes::pop_mem(var.datatype)?;
                        self.emit(Instruction::new(opcode).with_arg(Value::address(address)))
                    }
                    Storage::Const => Err(CodeGenError::structure(format!(
                        "cannot assign to constant '{name}'"
                    ))),
                }
            }
            AssignTarget::Register { register } => {
                self.emit(Instruction::new(Opcode::PopVarByte).with_label(register.name()))
            }
            AssignTarget::Indexed(index) => self.codegen_indexed(index, true),
            AssignTarget::Memory { address } => match self.const_address(address)? {
                Some(address) => self
                    .emit(Instruction::new(Opcode::PopMemByte).with_arg(Value::address(address))),
                None => {
                    self.codegen_expression(address)?;
                    self.emit(Instruction::new(Opcode::PopMemwrite))
                }
            },
        }
    }

    // ------------------------------------------------------------------------
    // Increment / decrement
    // ------------------------------------------------------------------------

    pub(super) fn codegen_post_incr_decr(
        &mut self,
        stmt: &PostIncrDecr,
    ) -> Result<(), CodeGenError> {
        self.line(&stmt.position)?;
        let incr = stmt.operator == IncrDecr::Incr;
        match &stmt.target {
            AssignTarget::Register { register } => {
                let opcode = if incr { Opcode::IncVarUb } else { Opcode::DecVarUb };
                self.emit(Instruction::new(opcode).with_label(register.name()))
            }
            AssignTarget::Variable { name } => {
                let var = self
                    .symbols
                    .variable(name)
                    .ok_or_else(|| CodeGenError::structure(format!("'{name}' is not a variable")))?;
                if var.storage == Storage::Const {
                    return Err(CodeGenError::structure(format!(
                        "cannot modify constant '{name}'"
                    )));
                }
                let opcode = if incr {
                    opcodes::inc_var(var.datatype)?
                } else {
                    opcodes::dec_var(var.datatype)?
                };
                self.emit(Instruction::new(opcode).with_label(name.as_str()))
            }
            AssignTarget::Indexed(index) => {
                let array_dt = self
                    .symbols
                    .variable(&index.array)
                    .map(|v| v.datatype)
                    .ok_or_else(|| {
                        CodeGenError::structure(format!("'{}' is not a variable", index.array))
                    })?;
                let opcode = if incr {
                    opcodes::inc_indexed(array_dt)?
                } else {
                    opcodes::dec_indexed(array_dt)?
                };
                self.codegen_expression(&index.index)?;
                self.emit(Instruction::new(opcode).with_label(index.array.as_str()))
            }
            AssignTarget::Memory { address } => match self.const_address(address)? {
                Some(address) => {
                    let opcode = if incr { Opcode::IncMemory } else { Opcode::DecMemory };
                    self.emit(Instruction::new(opcode).with_arg(Value::address(address)))
                }
                None => {
                    self.codegen_expression(address)?;
                    let opcode = if incr {
                        Opcode::PopIncMemory
                    } else {
                        Opcode::PopDecMemory
                    };
                    self.emit(Instruction::new(opcode))
                }
            },
        }
    }

    // ------------------------------------------------------------------------
    // Jumps and returns
    // ------------------------------------------------------------------------

    /// Unconditional jump, or a flag branch when `opcode` is one
    pub(super) fn codegen_jump(&mut self, jump: &Jump, opcode: Opcode) -> Result<(), CodeGenError> {
        self.line(&jump.position)?;
        let instruction = match &jump.target {
            JumpTarget::Address(address) => {
                // flag branches are relative
                if opcode.is_branch() {
                    return Err(CodeGenError::BranchToAddress(*address));
                }
                Instruction::new(opcode).with_arg(Value::address(*address))
            }
            JumpTarget::Generated(label) => Instruction::new(opcode).with_label(label.as_str()),
            JumpTarget::Identifier(name) => match self.symbols.get(name) {
                Some(Symbol::Label | Symbol::Subroutine(_)) => {
                    Instruction::new(opcode).with_label(name.as_str())
                }
                _ => return Err(CodeGenError::InvalidCallTarget(name.clone())),
            },
        };
        self.emit(instruction)
    }

    fn codegen_return(&mut self, ret: &Return, ctx: StmtContext<'_>) -> Result<(), CodeGenError> {
        if ret.values.len() != ctx.return_types.len() {
            return Err(CodeGenError::structure(format!(
                "return with {} values where {} are declared",
                ret.values.len(),
                ctx.return_types.len()
            )));
        }
        // the first return value ends up on top of the stack
        for (value, datatype) in ret.values.iter().zip(ctx.return_types).rev() {
            self.codegen_value_as(value, *datatype)?;
        }
        self.line(&ret.position)?;
        self.emit(Instruction::new(Opcode::Return))
    }

    // ------------------------------------------------------------------------
    // Directives and inline assembly
    // ------------------------------------------------------------------------

    fn codegen_directive(&mut self, directive: &Directive) -> Result<(), CodeGenError> {
        debug!(directive = %directive.name, position = %directive.position, "lowering directive");
        match directive.name.as_str() {
            "%asminclude" => self.codegen_asm_include(directive),
            "%asmbinary" => self.codegen_asm_binary(directive),
            "%breakpoint" => {
                self.line(&directive.position)?;
                self.emit(Instruction::new(Opcode::Breakpoint))
            }
            // everything else only steers the earlier passes
            _ => Ok(()),
        }
    }

    fn codegen_asm_include(&mut self, directive: &Directive) -> Result<(), CodeGenError> {
        let name = string_arg(directive, 0)?;
        let scope = match directive.args.get(1) {
            Some(arg) => arg
                .as_str()
                .ok_or_else(|| CodeGenError::structure("%asminclude scope must be a string"))?,
            None => "",
        };
        let source = self
            .includes
            .load(name, &self.module_source)
            .map_err(|reason| CodeGenError::Include {
                name: name.to_string(),
                reason,
            })?;
        let assembly = if scope.trim().is_empty() {
            source
        } else {
            format!("{scope}\t.proc\n{source}\t.pend\n")
        };
        self.line(&directive.position)?;
        self.emit(Instruction::new(Opcode::InlineAssembly).with_label2(assembly))
    }

    fn codegen_asm_binary(&mut self, directive: &Directive) -> Result<(), CodeGenError> {
        let name = string_arg(directive, 0)?;
        let mut instruction = Instruction::new(Opcode::IncludeFile).with_label(name);
        if let Some(offset) = int_arg(directive, 1)? {
            instruction = instruction.with_arg(Value::integer(offset, DataType::UWord)?);
        }
        if let Some(length) = int_arg(directive, 2)? {
            instruction = instruction.with_arg2(Value::integer(length, DataType::UWord)?);
        }
        self.line(&directive.position)?;
        self.emit(instruction)
    }

    /// `label` names the assembly when it forms a whole subroutine body
    pub(super) fn codegen_inline_assembly(
        &mut self,
        asm: &InlineAssembly,
        label: Option<&str>,
    ) -> Result<(), CodeGenError> {
        self.line(&asm.position)?;
        let mut instruction =
            Instruction::new(Opcode::InlineAssembly).with_label2(asm.assembly.as_str());
        if let Some(label) = label {
            instruction = instruction.with_label(label);
        }
        self.emit(instruction)
    }

    // ------------------------------------------------------------------------
    // Subroutine definitions
    // ------------------------------------------------------------------------

    fn codegen_subroutine(&mut self, sub: &Subroutine) -> Result<(), CodeGenError> {
        debug!(subroutine = %sub.name, statements = sub.statements.len(), "lowering subroutine");
        if let Some(address) = sub.asm.as_ref().and_then(|asm| asm.address) {
            if sub.contains_code_or_vars() {
                return Err(CodeGenError::MachineSubroutineWithBody(sub.name.clone()));
            }
            self.prog.memory_pointer(&sub.name, address, DataType::UByte)?;
            return Ok(());
        }

        self.prog.label(&sub.name, true)?;
        self.emit(Instruction::new(Opcode::StartProcdef))?;
        self.line(&sub.position)?;
        let ctx = StmtContext::subroutine(&sub.name, &sub.return_types);
        match sole_assembly(&sub.statements) {
            Some(asm) => self.codegen_inline_assembly(asm, Some(&sub.name))?,
            None => self.codegen_statements(&sub.statements, ctx)?,
        }
        self.emit(Instruction::new(Opcode::EndProcdef))
    }
}

/// The inline assembly block that makes up an entire subroutine body, if any
fn sole_assembly(statements: &[Statement]) -> Option<&InlineAssembly> {
    let mut code = statements
        .iter()
        .filter(|s| !matches!(s, Statement::VarDecl(_) | Statement::Nop));
    match (code.next(), code.next()) {
        (Some(Statement::InlineAssembly(asm)), None) => Some(asm),
        _ => None,
    }
}

fn string_arg(directive: &Directive, index: usize) -> Result<&str, CodeGenError> {
    directive
        .args
        .get(index)
        .and_then(DirectiveArg::as_str)
        .ok_or_else(|| {
            CodeGenError::structure(format!(
                "{} expects a file name as argument {}",
                directive.name,
                index + 1
            ))
        })
}

fn int_arg(directive: &Directive, index: usize) -> Result<Option<i64>, CodeGenError> {
    match directive.args.get(index) {
        None => Ok(None),
        Some(arg) => arg.as_int().map(Some).ok_or_else(|| {
            CodeGenError::structure(format!(
                "{} expects a number as argument {}",
                directive.name,
                index + 1
            ))
        }),
    }
}
