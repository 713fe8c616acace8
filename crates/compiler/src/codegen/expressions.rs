//! Expression Code Generation
//!
//! Lowers expression trees to postfix stack code. Every expression leaves
//! exactly one value of its inferred type on the operand stack; operands are
//! lowered left before right.

use super::{CodeGen, CodeGenError, common_type, opcodes};
use crate::ast::{ArrayIndex, BinaryOperator, Expression, FunctionCall, Symbol, struct_member_name};
use crate::builtins;
use svm_core::{DataType, Instruction, Opcode, Storage, Value};

impl CodeGen<'_> {
    /// Inferred type of an expression; lowering cannot proceed without one
    pub(super) fn expression_type(&self, expr: &Expression) -> Result<DataType, CodeGenError> {
        expr.infer_type(self.symbols)
            .ok_or_else(|| CodeGenError::structure(format!("cannot infer the type of {expr:?}")))
    }

    /// Push an immediate value
    pub(super) fn push_value(&mut self, value: Value) -> Result<(), CodeGenError> {
        let opcode = opcodes::push_literal(value.datatype())?;
        self.emit(Instruction::new(opcode).with_arg(value))
    }

    /// Fixed address of a memory access, if it folds to a constant
    pub(super) fn const_address(&self, expr: &Expression) -> Result<Option<u16>, CodeGenError> {
        match expr.const_value(self.symbols) {
            None => Ok(None),
            Some(value) => {
                let address = value
                    .as_integer()
                    .and_then(|n| u16::try_from(n).ok())
                    .ok_or_else(|| {
                        CodeGenError::structure(format!("invalid memory address {value}"))
                    })?;
                Ok(Some(address))
            }
        }
    }

    pub(super) fn codegen_expression(&mut self, expr: &Expression) -> Result<(), CodeGenError> {
        match expr {
            Expression::Number { value } => self.push_value(*value),
            Expression::Register { register } => {
                self.emit(Instruction::new(Opcode::PushVarByte).with_label(register.name()))
            }
            Expression::Prefix { operator, operand } => {
                let dt = self.expression_type(operand)?;
                let opcode = opcodes::prefix(*operator, dt)?;
                self.codegen_expression(operand)?;
                match opcode {
                    Some(opcode) => self.emit(Instruction::new(opcode)),
                    None => Ok(()),
                }
            }
            Expression::Binary {
                left,
                operator,
                right,
            } => self.codegen_binary(left, *operator, right),
            Expression::Call(call) => self.codegen_call_expression(expr, call),
            Expression::Identifier { name } => self.codegen_identifier(name),
            Expression::Indexed(index) => self.codegen_indexed(index, false),
            Expression::Typecast {
                expression,
                datatype,
            } => {
                let source = self.expression_type(expression)?;
                let opcode = opcodes::cast(source, *datatype)?;
                self.codegen_expression(expression)?;
                match opcode {
                    Some(opcode) => self.emit(Instruction::new(opcode)),
                    None => Ok(()),
                }
            }
            Expression::MemoryRead { address } => match self.const_address(address)? {
                Some(address) => self
                    .emit(Instruction::new(Opcode::PushMemUb).with_arg(Value::address(address))),
                None => {
                    self.codegen_expression(address)?;
                    self.emit(Instruction::new(Opcode::PushMemread))
                }
            },
            Expression::AddressOf { name } => self.codegen_address_of(name),
            Expression::Range { .. } => Err(CodeGenError::structure(
                "a range expression can only be used as a for loop iterable",
            )),
            Expression::StructLiteral { .. } => Err(CodeGenError::structure(
                "a struct literal must be assigned to a struct variable",
            )),
        }
    }

    fn codegen_binary(
        &mut self,
        left: &Expression,
        operator: BinaryOperator,
        right: &Expression,
    ) -> Result<(), CodeGenError> {
        if operator.is_shift() {
            return self.codegen_bitshift(left, operator, right);
        }
        let left_dt = self.expression_type(left)?;
        let right_dt = self.expression_type(right)?;
        let (common, _) = common_type(left_dt, right_dt)?;
        let opcode = opcodes::binary(operator, common)?;

        self.codegen_expression(left)?;
        self.convert(left_dt, common)?;
        self.codegen_expression(right)?;
        self.convert(right_dt, common)?;
        self.emit(Instruction::new(opcode))
    }

    /// `x << n` and `x >> n` with a constant `n` expand into `n` single-bit shifts
    fn codegen_bitshift(
        &mut self,
        left: &Expression,
        operator: BinaryOperator,
        right: &Expression,
    ) -> Result<(), CodeGenError> {
        let left_dt = self.expression_type(left)?;
        let step = opcodes::shift_step(operator, left_dt)?;
        let amount = right.const_value(self.symbols).ok_or_else(|| {
            CodeGenError::unsupported(format!("shift by a non-constant amount ({operator})"))
        })?;
        let shifts = amount.as_integer().ok_or_else(|| {
            CodeGenError::structure(format!("shift amount must be an integer, not {amount}"))
        })?;
        if shifts < 0 {
            return Err(CodeGenError::structure(format!(
                "shift amount must not be negative, got {shifts}"
            )));
        }

        self.codegen_expression(left)?;
        for _ in 0..shifts {
            self.emit(Instruction::new(step))?;
        }
        Ok(())
    }

    fn codegen_call_expression(
        &mut self,
        expr: &Expression,
        call: &FunctionCall,
    ) -> Result<(), CodeGenError> {
        if let Some(value) = expr.const_value(self.symbols) {
            return self.push_value(value);
        }
        match self.symbols.get(&call.target) {
            Some(Symbol::Subroutine(sub)) => {
                let sub = sub.clone();
                self.codegen_subroutine_call(&sub, &call.args)
            }
            Some(_) => Err(CodeGenError::InvalidCallTarget(call.target.clone())),
            None if builtins::is_builtin(&call.target) => self.codegen_builtin_call(call),
            None => Err(CodeGenError::InvalidCallTarget(call.target.clone())),
        }
    }

    fn codegen_identifier(&mut self, name: &str) -> Result<(), CodeGenError> {
        let var = self
            .symbols
            .variable(name)
            .ok_or_else(|| CodeGenError::structure(format!("'{name}' is not a variable")))?;
        match var.storage {
            Storage::Plain => {
                let opcode = opcodes::push_var(var.datatype)?;
                self.emit(Instruction::new(opcode).with_label(name))
            }
            Storage::Memory(address) => {
                let opcode = opcodes::push_mem(var.datatype)?;
                self.emit(Instruction::new(opcode).with_arg(Value::address(address)))
            }
            Storage::Const => Err(CodeGenError::structure(format!(
                "constant '{name}' should have been folded into a literal"
            ))),
        }
    }

    /// Lower the index, then read the element (or write the value below it)
    pub(super) fn codegen_indexed(
        &mut self,
        index: &ArrayIndex,
        write: bool,
    ) -> Result<(), CodeGenError> {
        let array_dt = self
            .symbols
            .variable(&index.array)
            .map(|v| v.datatype)
            .ok_or_else(|| {
                CodeGenError::structure(format!("'{}' is not a variable", index.array))
            })?;
        let opcode = if write {
            opcodes::write_indexed(array_dt)?
        } else {
            opcodes::read_indexed(array_dt)?
        };
        self.codegen_expression(&index.index)?;
        self.emit(Instruction::new(opcode).with_label(index.array.as_str()))
    }

    pub(super) fn codegen_address_of(&mut self, name: &str) -> Result<(), CodeGenError> {
        let var = self
            .symbols
            .variable(name)
            .ok_or_else(|| CodeGenError::structure(format!("'{name}' is not a variable")))?;
        let target = match var.datatype {
            dt if dt.is_iterable() || dt == DataType::Float => name.to_string(),
            // the first member's address is the address of the whole struct
            DataType::Struct => {
                let first = var.struct_members.first().ok_or_else(|| {
                    CodeGenError::structure(format!("struct variable '{name}' has no members"))
                })?;
                struct_member_name(name, first)
            }
            dt => {
                return Err(CodeGenError::InvalidType {
                    operation: "address-of",
                    datatype: dt,
                });
            }
        };
        self.emit(Instruction::new(Opcode::PushAddrHeapvar).with_label(target))
    }
}
