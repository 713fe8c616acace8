//! Builtin Function Code Generation
//!
//! Builtins with a dedicated opcode (`abs`, `msb`, the in-place shifts, the
//! CPU flag setters) are lowered inline. Array reductions push the array's
//! address and length and call the element-typed syscall. Everything else
//! becomes a `SYSCALL` after its arguments are pushed.

use super::{CodeGen, CodeGenError, opcodes};
use crate::ast::{AssignTarget, Expression, FunctionCall};
use crate::builtins::{self, ParamType};
use svm_core::{DataType, Instruction, Opcode, Syscall, Value};
use tracing::trace;

/// Syscall name suffix for a reduction over bytes, words or floats
fn width_suffix(element: DataType) -> Option<&'static str> {
    match element {
        DataType::UByte | DataType::Byte => Some("b"),
        DataType::UWord | DataType::Word => Some("w"),
        DataType::Float => Some("f"),
        _ => None,
    }
}

/// Syscall name suffix for a reduction that cares about signedness
fn type_suffix(element: DataType) -> Option<&'static str> {
    match element {
        DataType::UByte => Some("ub"),
        DataType::Byte => Some("b"),
        DataType::UWord => Some("uw"),
        DataType::Word => Some("w"),
        DataType::Float => Some("f"),
        _ => None,
    }
}

impl CodeGen<'_> {
    /// Lower a call to a builtin function, leaving its result (if any) on the stack
    pub(super) fn codegen_builtin_call(&mut self, call: &FunctionCall) -> Result<(), CodeGenError> {
        let func = builtins::lookup(&call.target)
            .ok_or_else(|| CodeGenError::InvalidCallTarget(call.target.clone()))?;
        if func.name == "swap" {
            return self.codegen_swap(&call.args);
        }
        if call.args.len() != func.params.len() {
            return Err(CodeGenError::structure(format!(
                "builtin '{}' takes {} arguments but {} were given",
                func.name,
                func.params.len(),
                call.args.len()
            )));
        }
        for (param, arg) in func.params.iter().zip(&call.args) {
            let dt = self.expression_type(arg)?;
            if !param.accepts(dt) {
                return Err(CodeGenError::InvalidType {
                    operation: "builtin function argument",
                    datatype: dt,
                });
            }
        }
        trace!(builtin = func.name, "lowering builtin call");

        match (func.name, call.args.as_slice()) {
            ("len", [arg]) => self.codegen_len(arg),
            ("any" | "all", [arg]) => self.codegen_reduction(func.name, arg, width_suffix),
            ("min" | "max" | "sum", [arg]) => self.codegen_reduction(func.name, arg, type_suffix),
            ("avg", [arg]) => self.codegen_avg(arg),
            ("abs", [arg]) => self.codegen_abs(arg),
            ("msb", [arg]) => {
                let dt = self.expression_type(arg)?;
                let word = if dt.is_signed() { DataType::Word } else { DataType::UWord };
                self.codegen_value_as(arg, word)?;
                self.emit(Instruction::new(Opcode::Msb))
            }
            ("mkword", _) => {
                self.codegen_builtin_args(&func.params, &call.args)?;
                self.emit(Instruction::new(Opcode::Mkword))
            }
            ("lsl" | "lsr" | "rol" | "ror" | "rol2" | "ror2", [arg]) => {
                self.codegen_shift_in_place(func.name, arg)
            }
            ("set_carry", []) => self.emit(Instruction::new(Opcode::Sec)),
            ("clear_carry", []) => self.emit(Instruction::new(Opcode::Clc)),
            ("set_irqd", []) => self.emit(Instruction::new(Opcode::Sei)),
            ("clear_irqd", []) => self.emit(Instruction::new(Opcode::Cli)),
            ("rsave", []) => self.emit(Instruction::new(Opcode::Rsave)),
            ("rrestore", []) => self.emit(Instruction::new(Opcode::Rrestore)),
            (name, args) => {
                self.codegen_builtin_args(&func.params, args)?;
                self.syscall(name)
            }
        }
    }

    /// Push the arguments, widening each to its parameter's exact type
    fn codegen_builtin_args(
        &mut self,
        params: &[ParamType],
        args: &[Expression],
    ) -> Result<(), CodeGenError> {
        for (param, arg) in params.iter().zip(args) {
            match param {
                ParamType::Exact(dt) => self.codegen_value_as(arg, *dt)?,
                _ => self.codegen_expression(arg)?,
            }
        }
        Ok(())
    }

    fn syscall(&mut self, function: &str) -> Result<(), CodeGenError> {
        let syscall = Syscall::for_function(function)
            .ok_or_else(|| CodeGenError::UnknownSyscall(function.to_string()))?;
        self.emit(Instruction::new(Opcode::Syscall).with_arg(Value::UByte(syscall.call_number())))
    }

    /// Declared element count of an array argument
    fn array_length(&self, arg: &Expression) -> Result<(DataType, u16), CodeGenError> {
        let Expression::Identifier { name } = arg else {
            return Err(CodeGenError::structure(format!(
                "expected an array variable, got {arg:?}"
            )));
        };
        let var = self
            .symbols
            .variable(name)
            .ok_or_else(|| CodeGenError::structure(format!("'{name}' is not a variable")))?;
        let length = var
            .length
            .ok_or_else(|| CodeGenError::structure(format!("array '{name}' has no length")))?;
        Ok((var.datatype, length))
    }

    fn codegen_len(&mut self, arg: &Expression) -> Result<(), CodeGenError> {
        let dt = self.expression_type(arg)?;
        if dt.is_string() {
            self.codegen_expression(arg)?;
            return self.syscall("len_str");
        }
        let (_, length) = self.array_length(arg)?;
        self.push_value(Value::integer(i64::from(length), DataType::UByte)?)
    }

    /// Address, length, then the reduction syscall for the element type
    fn codegen_reduction(
        &mut self,
        name: &str,
        arg: &Expression,
        suffix: fn(DataType) -> Option<&'static str>,
    ) -> Result<(), CodeGenError> {
        let (array_dt, length) = self.array_length(arg)?;
        let element = array_dt.element_type().ok_or(CodeGenError::InvalidType {
            operation: "array reduction",
            datatype: array_dt,
        })?;
        let suffix = suffix(element).ok_or(CodeGenError::InvalidType {
            operation: "array reduction",
            datatype: element,
        })?;
        self.codegen_expression(arg)?;
        self.push_value(Value::integer(i64::from(length), DataType::UByte)?)?;
        self.syscall(&format!("{name}_{suffix}"))
    }

    /// `sum` as a float divided by the length
    fn codegen_avg(&mut self, arg: &Expression) -> Result<(), CodeGenError> {
        let (array_dt, length) = self.array_length(arg)?;
        self.codegen_reduction("sum", arg, type_suffix)?;
        let to_float = match array_dt.element_type() {
            Some(DataType::UByte | DataType::UWord) => Some(Opcode::CastUwToF),
            Some(DataType::Byte | DataType::Word) => Some(Opcode::CastWToF),
            _ => None,
        };
        if let Some(opcode) = to_float {
            self.emit(Instruction::new(opcode))?;
        }
        self.push_value(Value::Float(f64::from(length)))?;
        self.emit(Instruction::new(Opcode::DivF))
    }

    fn codegen_abs(&mut self, arg: &Expression) -> Result<(), CodeGenError> {
        let dt = self.expression_type(arg)?;
        self.codegen_expression(arg)?;
        let opcode = match dt {
            DataType::Byte => Opcode::AbsB,
            DataType::Word => Opcode::AbsW,
            DataType::Float => Opcode::AbsF,
            // unsigned values are their own absolute value
            _ => return Ok(()),
        };
        self.emit(Instruction::new(opcode))
    }

    /// Load, shift or rotate, and store back into the same place
    fn codegen_shift_in_place(&mut self, name: &str, arg: &Expression) -> Result<(), CodeGenError> {
        let target = AssignTarget::from_expression(arg).ok_or_else(|| {
            CodeGenError::structure(format!(
                "'{name}' needs a variable, array element or memory location"
            ))
        })?;
        let dt = self.expression_type(arg)?;
        let opcode = opcodes::shift_in_place(name, dt)?;
        self.codegen_expression(arg)?;
        self.emit(Instruction::new(opcode))?;
        self.pop_into_target(&target)
    }

    /// Exchange two storage locations through the stack
    fn codegen_swap(&mut self, args: &[Expression]) -> Result<(), CodeGenError> {
        let [first, second] = args else {
            return Err(CodeGenError::InvalidSwap("swap takes exactly two arguments"));
        };
        if first.const_value(self.symbols).is_some() || second.const_value(self.symbols).is_some() {
            return Err(CodeGenError::InvalidSwap("cannot swap a constant"));
        }
        if first == second {
            return Err(CodeGenError::InvalidSwap("cannot swap a value with itself"));
        }
        let first_dt = self.expression_type(first)?;
        let second_dt = self.expression_type(second)?;
        if first_dt != second_dt {
            return Err(CodeGenError::InvalidSwap("arguments must have the same type"));
        }
        if !first_dt.is_numeric() {
            return Err(CodeGenError::InvalidSwap("arguments must be numeric"));
        }
        let (Some(first_target), Some(second_target)) = (
            AssignTarget::from_expression(first),
            AssignTarget::from_expression(second),
        ) else {
            return Err(CodeGenError::InvalidSwap("arguments must be assignable"));
        };

        self.codegen_expression(first)?;
        self.codegen_expression(second)?;
        self.pop_into_target(&first_target)?;
        self.pop_into_target(&second_target)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::ast::{
        ArrayIndex, CallStatement, Position, Statement, Symbol, SymbolTable, VariableInfo,
    };

    fn symbols() -> SymbolTable {
        let mut symbols = SymbolTable::new()
            .with_variable("main.b", DataType::UByte)
            .with_variable("main.c", DataType::UByte)
            .with_variable("main.sw", DataType::Word)
            .with_variable("main.s", DataType::Str);
        for (name, datatype) in [("main.arr", DataType::ArrayUb), ("main.sarr", DataType::ArrayB)] {
            symbols.insert(
                name,
                Symbol::Variable(VariableInfo {
                    length: Some(5),
                    ..VariableInfo::plain(datatype)
                }),
            );
        }
        symbols
    }

    fn call(target: &str, args: Vec<Expression>) -> Statement {
        Statement::Call(CallStatement {
            call: FunctionCall {
                target: target.to_string(),
                args,
            },
            position: Position::default(),
        })
    }

    fn syscall(syscall: Syscall) -> svm_core::Instruction {
        ins_arg(Opcode::Syscall, Value::UByte(syscall.call_number()))
    }

    #[test]
    fn test_swap_exchanges_through_stack() {
        let swap = call("swap", vec![ident("main.b"), ident("main.c")]);
        let code = lower_statements(&symbols(), &[swap]).unwrap();
        assert_eq!(
            code,
            vec![
                ins_label(Opcode::PushVarByte, "main.b"),
                ins_label(Opcode::PushVarByte, "main.c"),
                ins_label(Opcode::PopVarByte, "main.b"),
                ins_label(Opcode::PopVarByte, "main.c"),
            ]
        );
    }

    #[test]
    fn test_swap_rejects_bad_arguments() {
        let cases = [
            vec![ident("main.b")],
            vec![ident("main.b"), ubyte(1)],
            vec![ident("main.b"), ident("main.b")],
            vec![ident("main.b"), ident("main.sw")],
            vec![ident("main.s"), ident("main.s2")],
        ];
        let symbols = symbols().with_variable("main.s2", DataType::Str);
        for args in cases {
            assert!(matches!(
                lower_statements(&symbols, &[call("swap", args.clone())]),
                Err(CodeGenError::InvalidSwap(_))
            ), "{args:?}");
        }
    }

    #[test]
    fn test_sum_of_byte_array() {
        let expr = Expression::call("sum", vec![ident("main.arr")]);
        let code = lower_expression(&symbols(), &expr).unwrap();
        assert_eq!(
            code,
            vec![
                ins_label(Opcode::PushAddrHeapvar, "main.arr"),
                ins_arg(Opcode::PushByte, Value::UByte(5)),
                syscall(Syscall::FuncSumUb),
            ]
        );
    }

    #[test]
    fn test_any_uses_width_suffix() {
        let expr = Expression::call("any", vec![ident("main.sarr")]);
        let code = lower_expression(&symbols(), &expr).unwrap();
        assert_eq!(code.last(), Some(&syscall(Syscall::FuncAnyB)));
    }

    #[test]
    fn test_avg_divides_float_sum() {
        let expr = Expression::call("avg", vec![ident("main.sarr")]);
        let code = lower_expression(&symbols(), &expr).unwrap();
        assert_eq!(
            code,
            vec![
                ins_label(Opcode::PushAddrHeapvar, "main.sarr"),
                ins_arg(Opcode::PushByte, Value::UByte(5)),
                syscall(Syscall::FuncSumB),
                ins(Opcode::CastWToF),
                ins_arg(Opcode::PushFloat, Value::Float(5.0)),
                ins(Opcode::DivF),
            ]
        );
    }

    #[test]
    fn test_abs() {
        let expr = Expression::call("abs", vec![ident("main.b")]);
        let code = lower_expression(&symbols(), &expr).unwrap();
        assert_eq!(code, vec![ins_label(Opcode::PushVarByte, "main.b")]);
        let expr = Expression::call("abs", vec![ident("main.sw")]);
        let code = lower_expression(&symbols(), &expr).unwrap();
        assert_eq!(code, vec![ins_label(Opcode::PushVarWord, "main.sw"), ins(Opcode::AbsW)]);
    }

    #[test]
    fn test_len_of_string_is_a_syscall() {
        let expr = Expression::call("len", vec![ident("main.s")]);
        let code = lower_expression(&symbols(), &expr).unwrap();
        assert_eq!(
            code,
            vec![ins_label(Opcode::PushAddrHeapvar, "main.s"), syscall(Syscall::FuncLenStr)]
        );
    }

    #[test]
    fn test_float_function_widens_argument() {
        let expr = Expression::call("sin", vec![ident("main.b")]);
        let code = lower_expression(&symbols(), &expr).unwrap();
        assert_eq!(
            code,
            vec![
                ins_label(Opcode::PushVarByte, "main.b"),
                ins(Opcode::CastUbToF),
                syscall(Syscall::FuncSin),
            ]
        );
    }

    #[test]
    fn test_mkword_and_msb() {
        let expr = Expression::call("mkword", vec![ident("main.b"), ubyte(3)]);
        let code = lower_expression(&symbols(), &expr).unwrap();
        assert_eq!(
            code,
            vec![
                ins_label(Opcode::PushVarByte, "main.b"),
                ins_arg(Opcode::PushByte, Value::UByte(3)),
                ins(Opcode::Mkword),
            ]
        );
        let expr = Expression::call("msb", vec![ident("main.sw")]);
        let code = lower_expression(&symbols(), &expr).unwrap();
        assert_eq!(code, vec![ins_label(Opcode::PushVarWord, "main.sw"), ins(Opcode::Msb)]);
    }

    #[test]
    fn test_rotate_array_element_in_place() {
        let element = Expression::Indexed(ArrayIndex {
            array: "main.arr".to_string(),
            index: Box::new(ubyte(2)),
        });
        let code = lower_statements(&symbols(), &[call("rol", vec![element])]).unwrap();
        assert_eq!(
            code,
            vec![
                ins_arg(Opcode::PushByte, Value::UByte(2)),
                ins_label(Opcode::ReadIndexedVarByte, "main.arr"),
                ins(Opcode::RolByte),
                ins_arg(Opcode::PushByte, Value::UByte(2)),
                ins_label(Opcode::WriteIndexedVarByte, "main.arr"),
            ]
        );
    }

    #[test]
    fn test_in_place_shift_needs_storage() {
        assert!(matches!(
            lower_statements(&symbols(), &[call("lsl", vec![ubyte(4)])]),
            Err(CodeGenError::Structure(_))
        ));
    }

    #[test]
    fn test_cpu_flag_builtins() {
        let code = lower_statements(
            &symbols(),
            &[call("set_carry", vec![]), call("clear_irqd", vec![]), call("rsave", vec![])],
        )
        .unwrap();
        assert_eq!(code, vec![ins(Opcode::Sec), ins(Opcode::Cli), ins(Opcode::Rsave)]);
    }

    #[test]
    fn test_argument_checks() {
        assert!(matches!(
            lower_statements(&symbols(), &[call("mkword", vec![ubyte(1)])]),
            Err(CodeGenError::Structure(_))
        ));
        assert!(matches!(
            lower_expression(&symbols(), &Expression::call("sum", vec![ident("main.b")])),
            Err(CodeGenError::InvalidType { .. })
        ));
    }
}
