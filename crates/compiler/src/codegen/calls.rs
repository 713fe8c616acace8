//! Call Code Generation
//!
//! Subroutine calls in both calling conventions. Ordinary subroutines take
//! their arguments in their parameter variables; machine subroutines take
//! them in CPU registers and status flags and hand results back the same way.

use super::{CodeGen, CodeGenError, opcodes};
use crate::ast::{
    AsmBinding, AsmSignature, AssignTarget, Expression, FunctionCall, Register, RegisterOrPair,
    Statusflag, SubroutineSignature, Symbol,
};
use crate::builtins;
use svm_core::{DataType, Instruction, Opcode, Value};

/// The two registers of a pair, low byte first; `None` for single registers
fn pair_registers(pair: RegisterOrPair) -> Option<(Register, Register)> {
    match pair {
        RegisterOrPair::AX => Some((Register::A, Register::X)),
        RegisterOrPair::AY => Some((Register::A, Register::Y)),
        RegisterOrPair::XY => Some((Register::X, Register::Y)),
        RegisterOrPair::A | RegisterOrPair::X | RegisterOrPair::Y => None,
    }
}

fn single_register(reg: RegisterOrPair) -> Option<Register> {
    match reg {
        RegisterOrPair::A => Some(Register::A),
        RegisterOrPair::X => Some(Register::X),
        RegisterOrPair::Y => Some(Register::Y),
        _ => None,
    }
}

fn pair_opcode(opcode: Option<Opcode>, reg: RegisterOrPair) -> Result<Opcode, CodeGenError> {
    opcode.ok_or_else(|| CodeGenError::structure(format!("{reg:?} is not a register pair")))
}

fn uses_x(binding: &AsmBinding) -> bool {
    matches!(
        binding,
        AsmBinding::Register(RegisterOrPair::X | RegisterOrPair::AX | RegisterOrPair::XY)
    )
}

impl CodeGen<'_> {
    /// Call a subroutine, leaving its results on the stack
    pub(super) fn codegen_subroutine_call(
        &mut self,
        sub: &SubroutineSignature,
        args: &[Expression],
    ) -> Result<(), CodeGenError> {
        match &sub.asm {
            Some(asm) => self.codegen_asm_call(sub, asm, args),
            None => self.codegen_ordinary_call(sub, args),
        }
    }

    fn codegen_ordinary_call(
        &mut self,
        sub: &SubroutineSignature,
        args: &[Expression],
    ) -> Result<(), CodeGenError> {
        if args.len() != sub.parameters.len() {
            return Err(CodeGenError::structure(format!(
                "'{}' takes {} arguments but {} were given",
                sub.name,
                sub.parameters.len(),
                args.len()
            )));
        }
        let save_x = sub.clobbers(Register::X);
        if save_x {
            self.emit(Instruction::new(Opcode::Rsavex))?;
        }
        for (param, arg) in sub.parameters.iter().zip(args) {
            self.codegen_value_as(arg, param.datatype)?;
            let opcode = opcodes::pop_var(param.datatype)?;
            self.emit(Instruction::new(opcode).with_label(format!("{}.{}", sub.name, param.name)))?;
        }
        self.emit(Instruction::new(Opcode::Call).with_label(sub.name.as_str()))?;
        if save_x {
            self.emit(Instruction::new(Opcode::Rrestorex))?;
        }
        Ok(())
    }

    /// Machine subroutine: arguments go into registers and the carry flag
    fn codegen_asm_call(
        &mut self,
        sub: &SubroutineSignature,
        asm: &AsmSignature,
        args: &[Expression],
    ) -> Result<(), CodeGenError> {
        if asm.parameters.len() != args.len() {
            return Err(CodeGenError::unsupported(format!(
                "call to '{}' with {} arguments for {} register bindings",
                sub.name,
                args.len(),
                asm.parameters.len()
            )));
        }
        let save_x = asm.clobbers.contains(&Register::X) || asm.parameters.iter().any(uses_x);
        if save_x {
            self.emit(Instruction::new(Opcode::Rsavex))?;
        }

        // the carry is set last so no register assignment can disturb it
        let mut carry = None;
        for (binding, arg) in asm.parameters.iter().zip(args) {
            match binding {
                AsmBinding::Statusflag(Statusflag::Pc) => {
                    let value = arg.const_value(self.symbols).ok_or_else(|| {
                        CodeGenError::unsupported("carry flag argument must be a constant")
                    })?;
                    carry = Some(value.is_true());
                }
                AsmBinding::Statusflag(flag) => {
                    return Err(CodeGenError::unsupported(format!(
                        "passing an argument in status flag {flag:?}"
                    )));
                }
                AsmBinding::Register(reg) => self.codegen_register_argument(*reg, arg)?,
            }
        }
        match carry {
            Some(true) => self.emit(Instruction::new(Opcode::Sec))?,
            Some(false) => self.emit(Instruction::new(Opcode::Clc))?,
            None => {}
        }

        self.emit(Instruction::new(Opcode::Call).with_label(sub.name.as_str()))?;

        for binding in asm.returns.iter().rev() {
            match binding {
                AsmBinding::Statusflag(Statusflag::Pc) => {
                    self.emit(Instruction::new(Opcode::CarryToA))?;
                    let push_a = Instruction::new(Opcode::PushVarByte);
                    self.emit(push_a.with_label(Register::A.name()))?;
                }
                AsmBinding::Statusflag(flag) => {
                    return Err(CodeGenError::unsupported(format!(
                        "result in status flag {flag:?}"
                    )));
                }
                AsmBinding::Register(reg) => match single_register(*reg) {
                    Some(register) => {
                        let push = Instruction::new(Opcode::PushVarByte);
                        self.emit(push.with_label(register.name()))?
                    }
                    None => {
                        let push = pair_opcode(opcodes::push_register_pair(*reg), *reg)?;
                        self.emit(Instruction::new(push))?
                    }
                },
            }
        }
        if save_x {
            self.emit(Instruction::new(Opcode::Rrestorex))?;
        }
        Ok(())
    }

    fn codegen_register_argument(
        &mut self,
        reg: RegisterOrPair,
        arg: &Expression,
    ) -> Result<(), CodeGenError> {
        if let Some(register) = single_register(reg) {
            return self.codegen_assign(&AssignTarget::Register { register }, arg);
        }
        let Some((low, high)) = pair_registers(reg) else {
            return Ok(());
        };
        let dt = self.expression_type(arg)?;
        match dt {
            DataType::UByte => {
                self.codegen_assign(&AssignTarget::Register { register: low }, arg)?;
                self.codegen_assign(
                    &AssignTarget::Register { register: high },
                    &Expression::number(Value::UByte(0)),
                )
            }
            // strings and arrays are passed by address
            dt if dt.is_word() || dt.is_iterable() => {
                self.codegen_expression(arg)?;
                let opcode = pair_opcode(opcodes::pop_register_pair(reg), reg)?;
                self.emit(Instruction::new(opcode))
            }
            other => Err(CodeGenError::unsupported(format!(
                "{other} argument in register pair {reg:?}"
            ))),
        }
    }

    /// A call whose results nobody uses
    pub(super) fn codegen_call_statement(
        &mut self,
        call: &FunctionCall,
    ) -> Result<(), CodeGenError> {
        match self.symbols.get(&call.target) {
            Some(Symbol::Subroutine(sub)) => {
                let sub = sub.clone();
                self.codegen_subroutine_call(&sub, &call.args)?;
                for datatype in &sub.return_types {
                    self.emit(Instruction::new(opcodes::discard(*datatype)?))?;
                }
                Ok(())
            }
            Some(Symbol::Label) => {
                self.emit(Instruction::new(Opcode::Call).with_label(call.target.as_str()))
            }
            Some(Symbol::Variable(_)) => Err(CodeGenError::InvalidCallTarget(call.target.clone())),
            None => {
                let func = builtins::lookup(&call.target)
                    .ok_or_else(|| CodeGenError::InvalidCallTarget(call.target.clone()))?;
                let first_arg = match call.args.first() {
                    Some(arg) => Some(self.expression_type(arg)?),
                    None => None,
                };
                self.codegen_builtin_call(call)?;
                match func.returns.resolve(first_arg) {
                    Some(datatype) => self.emit(Instruction::new(opcodes::discard(datatype)?)),
                    None => Ok(()),
                }
            }
        }
    }
}
