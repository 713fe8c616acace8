//! Loop Code Generation
//!
//! `for` over a constant range, a variable range or an iterable, plus
//! `while` and `repeat`. Every loop makes three labels (loop start, continue
//! point, break point) and hands the latter two to its body through the
//! statement context.

use super::state::StmtContext;
use super::{CodeGen, CodeGenError, opcodes};
use crate::ast::{
    AssignTarget, BinaryOperator, Expression, ForLoop, IfStatement, IncrDecr, Jump, JumpTarget,
    Position, PostIncrDecr, Register, RepeatLoop, Scope, Statement, WhileLoop,
};
use svm_core::{DataType, Instruction, Opcode, Storage, Value};

/// Steps up to this size unroll into single increments or decrements
const MAX_UNROLLED_STEPS: i64 = 8;

/// Suffix of the generated index variable of a loop over an array or string
const LOOP_INDEX_VAR: &str = "forloop_index";

/// The three labels of one loop
struct LoopLabelSet {
    start: String,
    continue_label: String,
    break_label: String,
}

/// Where a `for` loop keeps its counter
enum LoopVar<'a> {
    Register(Register),
    Variable(&'a str),
}

impl LoopVar<'_> {
    fn label(&self) -> &str {
        match self {
            LoopVar::Register(register) => register.name(),
            LoopVar::Variable(name) => *name,
        }
    }

    fn target(&self) -> AssignTarget {
        match self {
            LoopVar::Register(register) => AssignTarget::Register {
                register: *register,
            },
            LoopVar::Variable(name) => AssignTarget::Variable {
                name: name.to_string(),
            },
        }
    }

    fn expression(&self) -> Expression {
        match self {
            LoopVar::Register(register) => Expression::Register {
                register: *register,
            },
            LoopVar::Variable(name) => Expression::identifier(*name),
        }
    }
}

impl CodeGen<'_> {
    fn make_loop_labels(&mut self, scope: &str) -> LoopLabelSet {
        let start = self.make_label(scope, "loop");
        let continue_label = self.make_label(scope, "continue");
        let break_label = self.make_label(scope, "break");
        LoopLabelSet {
            start,
            continue_label,
            break_label,
        }
    }

    /// Generate code for a `for` loop
    pub(super) fn codegen_for(
        &mut self,
        stmt: &ForLoop,
        ctx: StmtContext<'_>,
    ) -> Result<(), CodeGenError> {
        if stmt.body.contains_no_code_nor_vars() {
            return Ok(());
        }
        self.line(&stmt.position)?;

        let (loop_var, loop_dt) = match (stmt.loop_register, &stmt.loop_var) {
            (Some(register), _) => (LoopVar::Register(register), DataType::UByte),
            (None, Some(name)) => {
                let datatype = self
                    .symbols
                    .variable(name)
                    .map(|v| v.datatype)
                    .ok_or_else(|| CodeGenError::structure(format!("'{name}' is not a variable")))?;
                (LoopVar::Variable(name), datatype)
            }
            (None, None) => {
                return Err(CodeGenError::structure("for loop without a loop variable"));
            }
        };

        match &stmt.iterable {
            Expression::Range { from, to, step } => {
                let constant = (
                    from.const_value(self.symbols).and_then(|v| v.as_integer()),
                    to.const_value(self.symbols).and_then(|v| v.as_integer()),
                    step.const_value(self.symbols).and_then(|v| v.as_integer()),
                );
                match constant {
                    (Some(first), Some(last), Some(step)) => self.codegen_for_constant_range(
                        &loop_var, loop_dt, first, last, step, &stmt.body, ctx,
                    ),
                    _ => self.codegen_for_variable_range(
                        &loop_var, loop_dt, from, to, step, stmt, ctx,
                    ),
                }
            }
            Expression::Identifier { name } => {
                self.codegen_for_iterable(&loop_var, loop_dt, name, &stmt.body, ctx)
            }
            other => Err(CodeGenError::structure(format!(
                "cannot loop over {other:?}"
            ))),
        }
    }

    /// `for v in first..last step s` with all three known at compile time
    #[allow(clippy::too_many_arguments)]
    fn codegen_for_constant_range(
        &mut self,
        loop_var: &LoopVar<'_>,
        dt: DataType,
        first: i64,
        last: i64,
        step: i64,
        body: &Scope,
        ctx: StmtContext<'_>,
    ) -> Result<(), CodeGenError> {
        if step == 0 || (step > 0 && first > last) || (step < 0 && first < last) {
            return Err(CodeGenError::structure(format!(
                "loop over the empty range {first}..{last} step {step}"
            )));
        }
        if first == last {
            return Err(CodeGenError::structure(format!(
                "loop over the single value {first}"
            )));
        }
        if (last - first) % step != 0 {
            return Err(CodeGenError::structure(format!(
                "range {first}..{last} is not an exact multiple of step {step}"
            )));
        }
        let (min, max) = dt.integer_range().ok_or(CodeGenError::InvalidType {
            operation: "for loop counter",
            datatype: dt,
        })?;
        if !(min..=max).contains(&first) || !(min..=max).contains(&last) {
            return Err(CodeGenError::LoopRange {
                first,
                last,
                datatype: dt,
            });
        }

        let body_scope = body.scope_name(ctx.scope);
        let labels = self.make_loop_labels(body_scope);
        let var_label = loop_var.label();

        self.push_value(Value::integer(first, dt)?)?;
        self.emit(Instruction::new(opcodes::pop_var(dt)?).with_label(var_label))?;
        self.label(&labels.start)?;
        let body_ctx = ctx
            .with_scope(body_scope)
            .with_loop(&labels.break_label, &labels.continue_label);
        self.codegen_statements(&body.statements, body_ctx)?;
        self.label(&labels.continue_label)?;

        if (1..=MAX_UNROLLED_STEPS).contains(&step) {
            let inc = opcodes::inc_var(dt)?;
            for _ in 0..step {
                self.emit(Instruction::new(inc).with_label(var_label))?;
            }
        } else if (-MAX_UNROLLED_STEPS..=-1).contains(&step) {
            let dec = opcodes::dec_var(dt)?;
            for _ in 0..-step {
                self.emit(Instruction::new(dec).with_label(var_label))?;
            }
        } else {
            let operator = if step > 0 {
                BinaryOperator::Add
            } else {
                BinaryOperator::Sub
            };
            self.emit(Instruction::new(opcodes::push_var(dt)?).with_label(var_label))?;
            self.push_value(Value::integer(step.abs(), dt)?)?;
            self.emit(Instruction::new(opcodes::binary(operator, dt)?))?;
            self.emit(Instruction::new(opcodes::pop_var(dt)?).with_label(var_label))?;
        }

        if last == 0 {
            // counting down to zero: the flags of the last step tell when to stop
            let opcode = if first > 0 { Opcode::Bpos } else { Opcode::Bneg };
            self.emit(Instruction::new(opcode).with_label(labels.start.as_str()))?;
        } else {
            // the counter wraps at the type's width
            let check = Value::Word((last + step) as i16).cast(dt)?;
            self.emit(Instruction::new(opcodes::push_var(dt)?).with_label(var_label))?;
            self.emit(Instruction::new(opcodes::compare(dt)?).with_arg(check))?;
            self.emit(Instruction::new(Opcode::Bnz).with_label(labels.start.as_str()))?;
        }
        self.label(&labels.break_label)?;
        self.emit(Instruction::new(Opcode::Nop))
    }

    /// `for v in from..to` where a bound is only known at runtime; the step
    /// must still be a constant 1 or -1
    #[allow(clippy::too_many_arguments)]
    fn codegen_for_variable_range(
        &mut self,
        loop_var: &LoopVar<'_>,
        dt: DataType,
        from: &Expression,
        to: &Expression,
        step: &Expression,
        stmt: &ForLoop,
        ctx: StmtContext<'_>,
    ) -> Result<(), CodeGenError> {
        let step = match step.const_value(self.symbols).and_then(|v| v.as_integer()) {
            Some(step @ (1 | -1)) => step,
            Some(step) => {
                return Err(CodeGenError::unsupported(format!(
                    "variable range loop with step {step}"
                )));
            }
            None => {
                return Err(CodeGenError::unsupported(
                    "variable range loop with a non-constant step",
                ));
            }
        };
        let continue_jump = opcodes::jump_if_nonzero(dt)?;

        let target = loop_var.target();
        self.codegen_assign(&target, from)?;

        let body_scope = stmt.body.scope_name(ctx.scope);
        let labels = self.make_loop_labels(body_scope);
        self.label(&labels.start)?;

        let past_end = if step > 0 {
            BinaryOperator::Greater
        } else {
            BinaryOperator::Less
        };
        let exit_check = IfStatement {
            condition: Expression::binary(loop_var.expression(), past_end, to.clone()),
            true_part: Scope::new(
                "",
                vec![Statement::Jump(Jump {
                    target: JumpTarget::Generated(labels.break_label.clone()),
                    position: stmt.position.clone(),
                })],
            ),
            else_part: Scope::default(),
            position: stmt.position.clone(),
        };
        self.codegen_if(&exit_check, ctx)?;

        let body_ctx = ctx
            .with_scope(body_scope)
            .with_loop(&labels.break_label, &labels.continue_label);
        self.codegen_statements(&stmt.body.statements, body_ctx)?;
        self.label(&labels.continue_label)?;

        // zero after the step means the counter wrapped around
        self.codegen_post_incr_decr(&PostIncrDecr {
            target,
            operator: if step > 0 { IncrDecr::Incr } else { IncrDecr::Decr },
            position: Position::default(),
        })?;
        self.codegen_expression(&loop_var.expression())?;
        self.emit(Instruction::new(continue_jump).with_label(labels.start.as_str()))?;
        self.label(&labels.break_label)?;
        self.emit(Instruction::new(Opcode::Nop))
    }

    /// `for v in array` through an implicit index variable.
    ///
    /// Every loop gets an index variable of its own, sized for that loop's
    /// element count, so nested and sequential loops never share one.
    fn codegen_for_iterable(
        &mut self,
        loop_var: &LoopVar<'_>,
        loop_dt: DataType,
        iterable: &str,
        body: &Scope,
        ctx: StmtContext<'_>,
    ) -> Result<(), CodeGenError> {
        if matches!(loop_var, LoopVar::Register(Register::X)) {
            return Err(CodeGenError::structure(
                "the X register is the internal stack pointer and cannot be a loop variable",
            ));
        }
        let var = self
            .symbols
            .variable(iterable)
            .ok_or_else(|| CodeGenError::structure(format!("'{iterable}' is not a variable")))?;
        let (array_dt, length) = (var.datatype, var.length);
        let element_dt = array_dt.element_type().ok_or(CodeGenError::InvalidType {
            operation: "for loop iterable",
            datatype: array_dt,
        })?;
        let length = match length {
            Some(length) if length > 0 => i64::from(length),
            _ => {
                return Err(CodeGenError::structure(format!(
                    "cannot loop over '{iterable}' without elements"
                )));
            }
        };
        let index_dt = if length <= 255 {
            DataType::UByte
        } else {
            DataType::UWord
        };
        let end_check = Value::integer(length, index_dt)?;

        let body_scope = body.scope_name(ctx.scope);
        let index_name = self.make_label(body_scope, LOOP_INDEX_VAR);
        self.prog
            .variable(index_name.as_str(), index_dt, Storage::Plain, None)?;

        let labels = self.make_loop_labels(body_scope);
        self.push_value(Value::integer(0, index_dt)?)?;
        self.emit(Instruction::new(opcodes::pop_var(index_dt)?).with_label(index_name.as_str()))?;
        self.label(&labels.start)?;

        self.emit(Instruction::new(opcodes::push_var(index_dt)?).with_label(index_name.as_str()))?;
        self.emit(Instruction::new(opcodes::read_indexed(array_dt)?).with_label(iterable))?;
        self.convert(element_dt, loop_dt)?;
        self.pop_into_target(&loop_var.target())?;

        let body_ctx = ctx
            .with_scope(body_scope)
            .with_loop(&labels.break_label, &labels.continue_label);
        self.codegen_statements(&body.statements, body_ctx)?;
        self.label(&labels.continue_label)?;

        let inc = opcodes::inc_var(index_dt)?;
        let push = opcodes::push_var(index_dt)?;
        let compare = opcodes::compare(index_dt)?;
        self.emit(Instruction::new(inc).with_label(index_name.as_str()))?;
        self.emit(Instruction::new(push).with_label(index_name.as_str()))?;
        self.emit(Instruction::new(compare).with_arg(end_check))?;
        self.emit(Instruction::new(Opcode::Bnz).with_label(labels.start.as_str()))?;
        self.label(&labels.break_label)?;
        self.emit(Instruction::new(Opcode::Nop))
    }

    /// Generate code for a `while` loop: the condition is tested at the bottom
    pub(super) fn codegen_while(
        &mut self,
        stmt: &WhileLoop,
        ctx: StmtContext<'_>,
    ) -> Result<(), CodeGenError> {
        let start = self.make_label(ctx.scope, "loop");
        let break_label = self.make_label(ctx.scope, "break");
        let continue_label = self.make_label(ctx.scope, "continue");
        self.line(&stmt.position)?;
        let condition_dt = self.expression_type(&stmt.condition)?;
        let jump_back = opcodes::jump_if_nonzero(condition_dt)?;

        self.emit(Instruction::new(Opcode::Jump).with_label(continue_label.as_str()))?;
        self.label(&start)?;
        let body_ctx = ctx
            .with_scope(stmt.body.scope_name(ctx.scope))
            .with_loop(&break_label, &continue_label);
        self.codegen_statements(&stmt.body.statements, body_ctx)?;
        self.label(&continue_label)?;
        self.codegen_expression(&stmt.condition)?;
        self.emit(Instruction::new(jump_back).with_label(start.as_str()))?;
        self.label(&break_label)?;
        self.emit(Instruction::new(Opcode::Nop))
    }

    /// Generate code for a `repeat ... until` loop
    pub(super) fn codegen_repeat(
        &mut self,
        stmt: &RepeatLoop,
        ctx: StmtContext<'_>,
    ) -> Result<(), CodeGenError> {
        let labels = self.make_loop_labels(ctx.scope);
        self.line(&stmt.position)?;
        let condition_dt = self.expression_type(&stmt.until)?;
        let jump_back = opcodes::jump_if_zero(condition_dt)?;

        self.label(&labels.start)?;
        let body_ctx = ctx
            .with_scope(stmt.body.scope_name(ctx.scope))
            .with_loop(&labels.break_label, &labels.continue_label);
        self.codegen_statements(&stmt.body.statements, body_ctx)?;
        self.label(&labels.continue_label)?;
        self.codegen_expression(&stmt.until)?;
        self.emit(Instruction::new(jump_back).with_label(labels.start.as_str()))?;
        self.label(&labels.break_label)?;
        self.emit(Instruction::new(Opcode::Nop))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::ast::{Symbol, SymbolTable, VariableInfo};
    use std::collections::HashSet;

    fn symbols() -> SymbolTable {
        let mut symbols = SymbolTable::new()
            .with_variable("main.i", DataType::UByte)
            .with_variable("main.sb", DataType::Byte)
            .with_variable("main.w", DataType::UWord)
            .with_variable("main.n", DataType::UByte);
        symbols.insert(
            "main.arr",
            Symbol::Variable(VariableInfo {
                length: Some(5),
                ..VariableInfo::plain(DataType::ArrayUb)
            }),
        );
        symbols
    }

    fn body() -> Scope {
        Scope::new(
            "",
            vec![Statement::PostIncrDecr(PostIncrDecr {
                target: AssignTarget::Variable {
                    name: "main.w".to_string(),
                },
                operator: IncrDecr::Incr,
                position: Position::default(),
            })],
        )
    }

    fn number(n: i64) -> Expression {
        Expression::number(Value::optimal_integer(n).unwrap())
    }

    fn range(from: Expression, to: Expression, step: Expression) -> Expression {
        Expression::Range {
            from: Box::new(from),
            to: Box::new(to),
            step: Box::new(step),
        }
    }

    fn for_var(var: &str, iterable: Expression) -> Statement {
        Statement::For(ForLoop {
            loop_register: None,
            loop_var: Some(var.to_string()),
            iterable,
            body: body(),
            position: Position::default(),
        })
    }

    fn for_const(var: &str, first: i64, last: i64, step: i64) -> Statement {
        for_var(var, range(number(first), number(last), number(step)))
    }

    #[test]
    fn test_constant_range_loop() {
        let entries = lower_entries(&symbols(), &[for_const("main.i", 1, 10, 1)]).unwrap();
        assert_eq!(
            listing(&entries),
            vec![
                "PUSH_BYTE 1",
                "POP_VAR_BYTE main.i",
                "main.<s-1-loop>:",
                "INC_VAR_UW main.w",
                "main.<s-2-continue>:",
                "INC_VAR_UB main.i",
                "PUSH_VAR_BYTE main.i",
                "CMP_UB 11",
                "BNZ main.<s-1-loop>",
                "main.<s-3-break>:",
                "NOP",
            ]
        );
    }

    fn increments_i(ins: &Instruction) -> bool {
        ins.opcode == Opcode::IncVarUb && ins.call_label.as_deref() == Some("main.i")
    }

    #[test]
    fn test_small_steps_unroll() {
        let code = lower_statements(&symbols(), &[for_const("main.i", 0, 30, 3)]).unwrap();
        assert_eq!(code.iter().filter(|i| increments_i(i)).count(), 3);
        assert!(!code.iter().any(|i| i.opcode == Opcode::AddUb));

        let code = lower_statements(&symbols(), &[for_const("main.sb", 10, -10, -2)]).unwrap();
        assert_eq!(code.iter().filter(|i| i.opcode == Opcode::DecVarB).count(), 2);
    }

    #[test]
    fn test_large_step_adds() {
        let code = lower_statements(&symbols(), &[for_const("main.i", 0, 180, 9)]).unwrap();
        assert!(!code.iter().any(increments_i));
        let tail: Vec<_> = code
            .iter()
            .skip_while(|i| i.opcode != Opcode::PushVarByte)
            .take(4)
            .cloned()
            .collect();
        assert_eq!(
            tail,
            vec![
                ins_label(Opcode::PushVarByte, "main.i"),
                ins_arg(Opcode::PushByte, Value::UByte(9)),
                ins(Opcode::AddUb),
                ins_label(Opcode::PopVarByte, "main.i"),
            ]
        );

        let code = lower_statements(&symbols(), &[for_const("main.i", 200, 20, -10)]).unwrap();
        assert!(code.contains(&ins(Opcode::SubUb)));
        assert!(code.contains(&ins_arg(Opcode::CmpUb, Value::UByte(10))));
    }

    #[test]
    fn test_count_down_to_zero_uses_flags() {
        let code = lower_statements(&symbols(), &[for_const("main.i", 10, 0, -1)]).unwrap();
        assert_eq!(code.last(), Some(&ins(Opcode::Nop)));
        assert_eq!(code[code.len() - 2], ins_label(Opcode::Bpos, "main.<s-1-loop>"));
        assert!(!code.iter().any(|i| i.opcode == Opcode::CmpUb));
    }

    #[test]
    fn test_register_loop_counter() {
        let stmt = Statement::For(ForLoop {
            loop_register: Some(Register::Y),
            loop_var: None,
            iterable: range(number(0), number(9), number(1)),
            body: body(),
            position: Position::default(),
        });
        let code = lower_statements(&symbols(), &[stmt]).unwrap();
        assert_eq!(code[1], ins_label(Opcode::PopVarByte, "Y"));
        assert!(code.contains(&ins_label(Opcode::IncVarUb, "Y")));
    }

    #[test]
    fn test_bad_constant_ranges() {
        for (first, last, step) in [(5, 1, 1), (3, 3, 1), (0, 10, 3)] {
            assert!(matches!(
                lower_statements(&symbols(), &[for_const("main.i", first, last, step)]),
                Err(CodeGenError::Structure(_))
            ));
        }
        assert_eq!(
            lower_statements(&symbols(), &[for_const("main.i", 0, 300, 1)]),
            Err(CodeGenError::LoopRange {
                first: 0,
                last: 300,
                datatype: DataType::UByte
            })
        );
        assert!(matches!(
            lower_statements(&symbols(), &[for_const("main.sb", -10, 200, 10)]),
            Err(CodeGenError::LoopRange { .. })
        ));
    }

    #[test]
    fn test_identical_loops_get_distinct_labels() {
        let entries = lower_entries(
            &symbols(),
            &[for_const("main.i", 1, 10, 1), for_const("main.i", 1, 10, 1)],
        )
        .unwrap();
        let names = labels(&entries);
        assert_eq!(names.len(), 6);
        assert_eq!(names.iter().collect::<HashSet<_>>().len(), 6);
    }

    #[test]
    fn test_variable_range_loop() {
        let stmt = for_var("main.i", range(number(1), Expression::identifier("main.n"), number(1)));
        let entries = lower_entries(&symbols(), &[stmt]).unwrap();
        assert_eq!(
            listing(&entries),
            vec![
                "PUSH_BYTE 1",
                "POP_VAR_BYTE main.i",
                "main.<s-1-loop>:",
                "PUSH_VAR_BYTE main.i",
                "PUSH_VAR_BYTE main.n",
                "GREATER_UB",
                "JNZ main.<s-3-break>",
                "INC_VAR_UW main.w",
                "main.<s-2-continue>:",
                "INC_VAR_UB main.i",
                "PUSH_VAR_BYTE main.i",
                "JNZ main.<s-1-loop>",
                "main.<s-3-break>:",
                "NOP",
            ]
        );
    }

    #[test]
    fn test_variable_range_needs_unit_step() {
        let stmt = for_var("main.i", range(number(1), Expression::identifier("main.n"), number(2)));
        assert!(matches!(
            lower_statements(&symbols(), &[stmt]),
            Err(CodeGenError::Unsupported(_))
        ));
        let stmt = for_var(
            "main.i",
            range(number(1), number(10), Expression::identifier("main.n")),
        );
        assert!(matches!(
            lower_statements(&symbols(), &[stmt]),
            Err(CodeGenError::Unsupported(_))
        ));
    }

    #[test]
    fn test_iterable_loop() {
        let stmt = for_var("main.i", Expression::identifier("main.arr"));
        let block = lower_block(&symbols(), &[stmt]).unwrap();
        assert_eq!(
            listing(&block.entries),
            vec![
                "PUSH_BYTE 0",
                "POP_VAR_BYTE main.<s-1-forloop_index>",
                "main.<s-2-loop>:",
                "PUSH_VAR_BYTE main.<s-1-forloop_index>",
                "READ_INDEXED_VAR_BYTE main.arr",
                "POP_VAR_BYTE main.i",
                "INC_VAR_UW main.w",
                "main.<s-3-continue>:",
                "INC_VAR_UB main.<s-1-forloop_index>",
                "PUSH_VAR_BYTE main.<s-1-forloop_index>",
                "CMP_UB 5",
                "BNZ main.<s-2-loop>",
                "main.<s-4-break>:",
                "NOP",
            ]
        );
        assert_eq!(block.variables.len(), 1);
        assert_eq!(block.variables[0].name, "main.<s-1-forloop_index>");
        assert_eq!(block.variables[0].datatype, DataType::UByte);
    }

    #[test]
    fn test_nested_iterable_loops_have_separate_indexes() {
        let inner = for_var("main.n", Expression::identifier("main.arr"));
        let outer = Statement::For(ForLoop {
            loop_register: None,
            loop_var: Some("main.i".to_string()),
            iterable: Expression::identifier("main.arr"),
            body: Scope::new("", vec![inner]),
            position: Position::default(),
        });
        let block = lower_block(&symbols(), &[outer]).unwrap();

        let indexes: Vec<&str> = block.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(indexes.len(), 2);
        assert_ne!(indexes[0], indexes[1]);

        // each index is reset exactly once, by its own loop
        let lines = listing(&block.entries);
        for index in indexes {
            let resets = lines
                .iter()
                .filter(|line| **line == format!("POP_VAR_BYTE {index}"))
                .count();
            assert_eq!(resets, 1, "{index}");
        }
    }

    #[test]
    fn test_long_iterable_gets_word_index() {
        let mut symbols = symbols();
        symbols.insert(
            "main.big",
            Symbol::Variable(VariableInfo {
                length: Some(300),
                ..VariableInfo::plain(DataType::ArrayUb)
            }),
        );
        let statements = [
            for_var("main.i", Expression::identifier("main.arr")),
            for_var("main.n", Expression::identifier("main.big")),
        ];
        let block = lower_block(&symbols, &statements).unwrap();

        let datatypes: Vec<DataType> = block.variables.iter().map(|v| v.datatype).collect();
        assert_eq!(datatypes, vec![DataType::UByte, DataType::UWord]);
        let index = block.variables[1].name.as_str();
        let lines = listing(&block.entries);
        assert!(lines.contains(&format!("POP_VAR_WORD {index}")));
        assert!(lines.contains(&format!("INC_VAR_UW {index}")));
        assert!(lines.contains(&"CMP_UW $012c".to_string()));
        assert!(lines.contains(&"CMP_UB 5".to_string()));
    }

    #[test]
    fn test_iterable_loop_rejects_x_register() {
        let stmt = Statement::For(ForLoop {
            loop_register: Some(Register::X),
            loop_var: None,
            iterable: Expression::identifier("main.arr"),
            body: body(),
            position: Position::default(),
        });
        assert!(matches!(
            lower_statements(&symbols(), &[stmt]),
            Err(CodeGenError::Structure(_))
        ));
    }

    #[test]
    fn test_empty_body_emits_nothing() {
        let stmt = Statement::For(ForLoop {
            loop_register: None,
            loop_var: Some("main.i".to_string()),
            iterable: range(number(1), number(5), number(1)),
            body: Scope::default(),
            position: Position::default(),
        });
        assert!(lower_entries(&symbols(), &[stmt]).unwrap().is_empty());
    }

    #[test]
    fn test_while_loop() {
        let stmt = Statement::While(WhileLoop {
            condition: Expression::identifier("main.w"),
            body: Scope::new(
                "",
                vec![Statement::Continue {
                    position: Position::default(),
                }],
            ),
            position: Position::default(),
        });
        let entries = lower_entries(&symbols(), &[stmt]).unwrap();
        assert_eq!(
            listing(&entries),
            vec![
                "JUMP main.<s-3-continue>",
                "main.<s-1-loop>:",
                "JUMP main.<s-3-continue>",
                "main.<s-3-continue>:",
                "PUSH_VAR_WORD main.w",
                "JNZW main.<s-1-loop>",
                "main.<s-2-break>:",
                "NOP",
            ]
        );
    }

    #[test]
    fn test_repeat_loop() {
        let stmt = Statement::Repeat(RepeatLoop {
            body: Scope::new(
                "",
                vec![Statement::Break {
                    position: Position::default(),
                }],
            ),
            until: Expression::identifier("main.i"),
            position: Position::default(),
        });
        let entries = lower_entries(&symbols(), &[stmt]).unwrap();
        assert_eq!(
            listing(&entries),
            vec![
                "main.<s-1-loop>:",
                "JUMP main.<s-3-break>",
                "main.<s-2-continue>:",
                "PUSH_VAR_BYTE main.i",
                "JZ main.<s-1-loop>",
                "main.<s-3-break>:",
                "NOP",
            ]
        );
    }
}
