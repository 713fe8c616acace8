//! Checked program tree
//!
//! This is the input of the lowering stage: a program that has already been
//! parsed, name-resolved, type-checked and reordered. Every reference is a
//! fully scoped name (`block.sub.var`), constants have been folded into
//! literals, and variable declarations precede the code that uses them.
//!
//! The tree is plain data with serde support so a front end in any language
//! can hand it over as JSON.

use crate::builtins;
use crate::codegen::common_type;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use svm_core::{DataType, Storage, Value};

/// Scoped name of a flattened struct member variable
pub fn struct_member_name(struct_var: &str, member: &str) -> String {
    format!("{struct_var}${member}")
}

/// Source position, used for `LINE` stamps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub line: u32,
}

impl Position {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Position {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

// ============================================================================
//                     PROGRAM STRUCTURE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub name: String,
    #[serde(default)]
    pub load_address: Option<u16>,
    pub modules: Vec<Module>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    /// Path of the module's source file; `%asminclude` resolves siblings of it
    #[serde(default)]
    pub source: PathBuf,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub name: String,
    #[serde(default)]
    pub address: Option<u16>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub statements: Vec<Statement>,
    #[serde(default)]
    pub position: Position,
}

// ============================================================================
//                     CPU REGISTERS AND FLAGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Register {
    A,
    X,
    Y,
}

impl Register {
    pub fn name(self) -> &'static str {
        match self {
            Register::A => "A",
            Register::X => "X",
            Register::Y => "Y",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegisterOrPair {
    A,
    X,
    Y,
    AX,
    AY,
    XY,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Statusflag {
    /// Carry
    Pc,
    /// Zero
    Pz,
    /// Overflow
    Pv,
    /// Negative
    Pn,
}

/// Where a machine subroutine receives a parameter or delivers a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsmBinding {
    Register(RegisterOrPair),
    Statusflag(Statusflag),
}

/// Condition of a flag branch (`if_cs`, `if_z`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchCondition {
    Cs,
    Cc,
    Eq,
    Z,
    Ne,
    Nz,
    Vs,
    Vc,
    Mi,
    Neg,
    Pl,
    Pos,
}

// ============================================================================
//                     OPERATORS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrefixOperator {
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "-")]
    Minus,
    #[serde(rename = "~")]
    Invert,
    #[serde(rename = "not")]
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "%")]
    Remainder,
    #[serde(rename = "**")]
    Pow,
    #[serde(rename = "&")]
    BitAnd,
    #[serde(rename = "|")]
    BitOr,
    #[serde(rename = "^")]
    BitXor,
    #[serde(rename = "and")]
    And,
    #[serde(rename = "or")]
    Or,
    #[serde(rename = "xor")]
    Xor,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = "<=")]
    LessEq,
    #[serde(rename = ">=")]
    GreaterEq,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "<<")]
    ShiftLeft,
    #[serde(rename = ">>")]
    ShiftRight,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Remainder => "%",
            BinaryOperator::Pow => "**",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitXor => "^",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
            BinaryOperator::Xor => "xor",
            BinaryOperator::Less => "<",
            BinaryOperator::Greater => ">",
            BinaryOperator::LessEq => "<=",
            BinaryOperator::GreaterEq => ">=",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::ShiftLeft => "<<",
            BinaryOperator::ShiftRight => ">>",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Less
                | BinaryOperator::Greater
                | BinaryOperator::LessEq
                | BinaryOperator::GreaterEq
                | BinaryOperator::Equal
                | BinaryOperator::NotEqual
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(
            self,
            BinaryOperator::And | BinaryOperator::Or | BinaryOperator::Xor
        )
    }

    pub fn is_shift(self) -> bool {
        matches!(self, BinaryOperator::ShiftLeft | BinaryOperator::ShiftRight)
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncrDecr {
    #[serde(rename = "++")]
    Incr,
    #[serde(rename = "--")]
    Decr,
}

// ============================================================================
//                     EXPRESSIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub target: String,
    #[serde(default)]
    pub args: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayIndex {
    pub array: String,
    pub index: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expression {
    Number {
        value: Value,
    },
    Register {
        register: Register,
    },
    Prefix {
        operator: PrefixOperator,
        operand: Box<Expression>,
    },
    Binary {
        left: Box<Expression>,
        operator: BinaryOperator,
        right: Box<Expression>,
    },
    Call(FunctionCall),
    Identifier {
        name: String,
    },
    Indexed(ArrayIndex),
    Typecast {
        expression: Box<Expression>,
        datatype: DataType,
    },
    MemoryRead {
        address: Box<Expression>,
    },
    AddressOf {
        name: String,
    },
    Range {
        from: Box<Expression>,
        to: Box<Expression>,
        #[serde(default = "Expression::unit_step")]
        step: Box<Expression>,
    },
    StructLiteral {
        values: Vec<Expression>,
    },
}

impl Expression {
    pub fn number(value: Value) -> Self {
        Expression::Number { value }
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        Expression::Identifier { name: name.into() }
    }

    pub fn binary(left: Expression, operator: BinaryOperator, right: Expression) -> Self {
        Expression::Binary {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        }
    }

    pub fn call(target: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::Call(FunctionCall {
            target: target.into(),
            args,
        })
    }

    fn unit_step() -> Box<Expression> {
        Box::new(Expression::number(Value::UByte(1)))
    }

    /// The type of the value this expression leaves on the stack, if it leaves one
    pub fn infer_type(&self, symbols: &SymbolTable) -> Option<DataType> {
        match self {
            Expression::Number { value } => Some(value.datatype()),
            Expression::Register { .. } => Some(DataType::UByte),
            Expression::Prefix { operand, .. } => operand.infer_type(symbols),
            Expression::Binary {
                left,
                operator,
                right,
            } => {
                let left = left.infer_type(symbols)?;
                let right = right.infer_type(symbols)?;
                if operator.is_comparison() || operator.is_logical() {
                    Some(DataType::UByte)
                } else if operator.is_shift() {
                    Some(left)
                } else {
                    common_type(left, right).ok().map(|(common, _)| common)
                }
            }
            Expression::Call(call) => {
                if let Some(value) = self.const_value(symbols) {
                    return Some(value.datatype());
                }
                match symbols.get(&call.target) {
                    Some(Symbol::Subroutine(sub)) => match sub.return_types.as_slice() {
                        [single] => Some(*single),
                        _ => None,
                    },
                    Some(_) => None,
                    None => {
                        let func = builtins::lookup(&call.target)?;
                        let arg = call.args.first().and_then(|a| a.infer_type(symbols));
                        func.returns.resolve(arg)
                    }
                }
            }
            Expression::Identifier { name } => symbols.variable(name).map(|v| v.datatype),
            Expression::Indexed(index) => symbols
                .variable(&index.array)
                .and_then(|v| v.datatype.element_type()),
            Expression::Typecast { datatype, .. } => Some(*datatype),
            Expression::MemoryRead { .. } => Some(DataType::UByte),
            Expression::AddressOf { .. } => Some(DataType::UWord),
            Expression::Range { .. } => None,
            Expression::StructLiteral { .. } => Some(DataType::Struct),
        }
    }

    /// Fold to a compile-time constant, if possible
    pub fn const_value(&self, symbols: &SymbolTable) -> Option<Value> {
        match self {
            Expression::Number { value } => Some(*value),
            Expression::Typecast {
                expression,
                datatype,
            } => expression.const_value(symbols)?.cast(*datatype).ok(),
            Expression::Prefix { operator, operand } => {
                fold_prefix(*operator, operand.const_value(symbols)?)
            }
            Expression::Binary {
                left,
                operator,
                right,
            } => fold_binary(
                *operator,
                left.const_value(symbols)?,
                right.const_value(symbols)?,
            ),
            Expression::Call(call) if call.target == "len" => match call.args.as_slice() {
                [Expression::Identifier { name }] => {
                    let var = symbols.variable(name)?;
                    if !var.datatype.is_array() {
                        return None;
                    }
                    Value::optimal_integer(var.length? as i64).ok()
                }
                _ => None,
            },
            _ => None,
        }
    }
}

/// Wrap an integer result to the width of `datatype`, as the machine does
fn wrapping(n: i64, datatype: DataType) -> Option<Value> {
    match datatype {
        DataType::UByte => Some(Value::UByte(n as u8)),
        DataType::Byte => Some(Value::Byte(n as i8)),
        DataType::UWord => Some(Value::UWord(n as u16)),
        DataType::Word => Some(Value::Word(n as i16)),
        DataType::Float => Some(Value::Float(n as f64)),
        _ => None,
    }
}

fn fold_prefix(operator: PrefixOperator, value: Value) -> Option<Value> {
    let datatype = value.datatype();
    match (operator, value.as_integer()) {
        (PrefixOperator::Plus, _) => Some(value),
        (PrefixOperator::Minus, None) => Some(Value::Float(-value.as_f64())),
        (PrefixOperator::Minus, Some(n)) if datatype.is_signed() => wrapping(-n, datatype),
        (PrefixOperator::Invert, Some(n)) => wrapping(!n, datatype),
        (PrefixOperator::Not, Some(n)) => wrapping((n == 0) as i64, datatype),
        _ => None,
    }
}

fn fold_binary(operator: BinaryOperator, left: Value, right: Value) -> Option<Value> {
    let (common, _) = common_type(left.datatype(), right.datatype()).ok()?;
    let boolean = |b: bool| Some(Value::UByte(b as u8));

    if operator.is_comparison() {
        let (l, r) = (left.as_f64(), right.as_f64());
        return match operator {
            BinaryOperator::Less => boolean(l < r),
            BinaryOperator::Greater => boolean(l > r),
            BinaryOperator::LessEq => boolean(l <= r),
            BinaryOperator::GreaterEq => boolean(l >= r),
            BinaryOperator::Equal => boolean(l == r),
            _ => boolean(l != r),
        };
    }
    if operator.is_logical() {
        let (l, r) = (left.is_true(), right.is_true());
        return match operator {
            BinaryOperator::And => boolean(l && r),
            BinaryOperator::Or => boolean(l || r),
            _ => boolean(l ^ r),
        };
    }
    if operator.is_shift() {
        let (n, amount) = (left.as_integer()?, right.as_integer()?);
        if !(0..16).contains(&amount) {
            return None;
        }
        let shifted = match operator {
            BinaryOperator::ShiftLeft => n << amount,
            _ => n >> amount,
        };
        return wrapping(shifted, left.datatype());
    }

    if common == DataType::Float {
        let (l, r) = (left.as_f64(), right.as_f64());
        let result = match operator {
            BinaryOperator::Add => l + r,
            BinaryOperator::Sub => l - r,
            BinaryOperator::Mul => l * r,
            BinaryOperator::Div if r != 0.0 => l / r,
            BinaryOperator::Pow => l.powf(r),
            _ => return None,
        };
        return Some(Value::Float(result));
    }

    let (l, r) = (left.as_integer()?, right.as_integer()?);
    let result = match operator {
        BinaryOperator::Add => l + r,
        BinaryOperator::Sub => l - r,
        BinaryOperator::Mul => l * r,
        BinaryOperator::Div if r != 0 => l / r,
        BinaryOperator::Remainder if r != 0 && !common.is_signed() => l % r,
        BinaryOperator::BitAnd => l & r,
        BinaryOperator::BitOr => l | r,
        BinaryOperator::BitXor => l ^ r,
        _ => return None,
    };
    wrapping(result, common)
}

// ============================================================================
//                     STATEMENTS
// ============================================================================

/// Destination of an assignment; exactly one kind of storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssignTarget {
    Variable { name: String },
    Register { register: Register },
    Indexed(ArrayIndex),
    Memory { address: Box<Expression> },
}

impl AssignTarget {
    /// The storage an expression reads from, for builtins that write their result back
    pub fn from_expression(expr: &Expression) -> Option<AssignTarget> {
        match expr {
            Expression::Identifier { name } => Some(AssignTarget::Variable { name: name.clone() }),
            Expression::Register { register } => Some(AssignTarget::Register {
                register: *register,
            }),
            Expression::Indexed(index) => Some(AssignTarget::Indexed(index.clone())),
            Expression::MemoryRead { address } => Some(AssignTarget::Memory {
                address: address.clone(),
            }),
            _ => None,
        }
    }

    pub fn infer_type(&self, symbols: &SymbolTable) -> Option<DataType> {
        match self {
            AssignTarget::Variable { name } => symbols.variable(name).map(|v| v.datatype),
            AssignTarget::Register { .. } | AssignTarget::Memory { .. } => Some(DataType::UByte),
            AssignTarget::Indexed(index) => symbols
                .variable(&index.array)
                .and_then(|v| v.datatype.element_type()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDecl {
    pub name: String,
    pub datatype: DataType,
    #[serde(default)]
    pub storage: Storage,
    /// Element count of a string or array
    #[serde(default)]
    pub length: Option<u16>,
    /// Member names of a struct variable, in declaration order
    #[serde(default)]
    pub struct_members: Vec<String>,
    #[serde(default)]
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    #[serde(default)]
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub target: AssignTarget,
    pub value: Expression,
    #[serde(default)]
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostIncrDecr {
    pub target: AssignTarget,
    pub operator: IncrDecr,
    #[serde(default)]
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JumpTarget {
    Address(u16),
    /// A label or subroutine, resolved through the symbol table
    Identifier(String),
    /// A label produced by the compiler itself; used verbatim
    Generated(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jump {
    pub target: JumpTarget,
    #[serde(default)]
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallStatement {
    pub call: FunctionCall,
    #[serde(default)]
    pub position: Position,
}

/// A nested statement list with its own scoped name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub statements: Vec<Statement>,
    #[serde(default)]
    pub position: Position,
}

impl Scope {
    pub fn new(name: impl Into<String>, statements: Vec<Statement>) -> Self {
        Scope {
            name: name.into(),
            statements,
            position: Position::default(),
        }
    }

    pub fn contains_no_code_nor_vars(&self) -> bool {
        self.statements.iter().all(|s| matches!(s, Statement::Nop))
    }

    /// Scoped name of this scope, falling back to the enclosing one when anonymous
    pub fn scope_name<'a>(&'a self, enclosing: &'a str) -> &'a str {
        if self.name.is_empty() {
            enclosing
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStatement {
    pub condition: Expression,
    pub true_part: Scope,
    #[serde(default)]
    pub else_part: Scope,
    #[serde(default)]
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchStatement {
    pub condition: BranchCondition,
    pub true_part: Scope,
    #[serde(default)]
    pub else_part: Scope,
    #[serde(default)]
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForLoop {
    #[serde(default)]
    pub loop_register: Option<Register>,
    #[serde(default)]
    pub loop_var: Option<String>,
    pub iterable: Expression,
    pub body: Scope,
    #[serde(default)]
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhileLoop {
    pub condition: Expression,
    pub body: Scope,
    #[serde(default)]
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatLoop {
    pub body: Scope,
    pub until: Expression,
    #[serde(default)]
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Return {
    #[serde(default)]
    pub values: Vec<Expression>,
    #[serde(default)]
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DirectiveArg {
    Int(i64),
    Str(String),
}

impl DirectiveArg {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DirectiveArg::Str(s) => Some(s),
            DirectiveArg::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            DirectiveArg::Int(n) => Some(*n),
            DirectiveArg::Str(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    pub name: String,
    #[serde(default)]
    pub args: Vec<DirectiveArg>,
    #[serde(default)]
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubroutineParameter {
    pub name: String,
    pub datatype: DataType,
}

/// Register calling convention of a machine subroutine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AsmSignature {
    /// Fixed entry address of a subroutine that lives outside the program
    #[serde(default)]
    pub address: Option<u16>,
    #[serde(default)]
    pub parameters: Vec<AsmBinding>,
    #[serde(default)]
    pub returns: Vec<AsmBinding>,
    #[serde(default)]
    pub clobbers: Vec<Register>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subroutine {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<SubroutineParameter>,
    #[serde(default)]
    pub return_types: Vec<DataType>,
    /// Present for machine subroutines (asmsub)
    #[serde(default)]
    pub asm: Option<AsmSignature>,
    #[serde(default)]
    pub statements: Vec<Statement>,
    #[serde(default)]
    pub position: Position,
}

impl Subroutine {
    pub fn contains_code_or_vars(&self) -> bool {
        self.statements.iter().any(|s| !matches!(s, Statement::Nop))
    }

    pub fn signature(&self) -> SubroutineSignature {
        SubroutineSignature {
            name: self.name.clone(),
            parameters: self.parameters.clone(),
            return_types: self.return_types.clone(),
            asm: self.asm.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineAssembly {
    pub assembly: String,
    #[serde(default)]
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhenChoice {
    /// `None` marks the `else` choice
    #[serde(default)]
    pub values: Option<Vec<Expression>>,
    pub body: Scope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhenStatement {
    pub condition: Expression,
    #[serde(default)]
    pub choices: Vec<WhenChoice>,
    #[serde(default)]
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Statement {
    VarDecl(VarDecl),
    Label(Label),
    Assignment(Assignment),
    PostIncrDecr(PostIncrDecr),
    Jump(Jump),
    Call(CallStatement),
    If(IfStatement),
    Branch(BranchStatement),
    Break {
        #[serde(default)]
        position: Position,
    },
    Continue {
        #[serde(default)]
        position: Position,
    },
    For(ForLoop),
    While(WhileLoop),
    Repeat(RepeatLoop),
    Scope(Scope),
    Return(Return),
    ReturnFromIrq {
        #[serde(default)]
        position: Position,
    },
    Directive(Directive),
    Subroutine(Subroutine),
    InlineAssembly(InlineAssembly),
    When(WhenStatement),
    Nop,
}

// ============================================================================
//                     DECLARATIONS AND SYMBOLS
// ============================================================================

/// Something a statement list declares
#[derive(Debug, Clone, Copy)]
pub enum Declaration<'a> {
    Variable(&'a VarDecl),
    /// Parameter slot of an ordinary subroutine
    Parameter(&'a Subroutine, &'a SubroutineParameter),
    Label(&'a Label),
    Subroutine(&'a Subroutine),
}

/// Walk a statement list depth-first, reporting every declaration in source order
pub fn visit_declarations<'a, F>(statements: &'a [Statement], scope: &'a str, visit: &mut F)
where
    F: FnMut(Declaration<'a>),
{
    for statement in statements {
        match statement {
            Statement::VarDecl(decl) => visit(Declaration::Variable(decl)),
            Statement::Label(label) => visit(Declaration::Label(label)),
            Statement::Subroutine(sub) => {
                visit(Declaration::Subroutine(sub));
                if sub.asm.is_none() {
                    for param in &sub.parameters {
                        visit(Declaration::Parameter(sub, param));
                    }
                }
                visit_declarations(&sub.statements, &sub.name, visit);
            }
            Statement::Scope(inner) => {
                visit_declarations(&inner.statements, inner.scope_name(scope), visit)
            }
            Statement::If(stmt) => {
                visit_declarations(
                    &stmt.true_part.statements,
                    stmt.true_part.scope_name(scope),
                    visit,
                );
                visit_declarations(
                    &stmt.else_part.statements,
                    stmt.else_part.scope_name(scope),
                    visit,
                );
            }
            Statement::Branch(stmt) => {
                visit_declarations(
                    &stmt.true_part.statements,
                    stmt.true_part.scope_name(scope),
                    visit,
                );
                visit_declarations(
                    &stmt.else_part.statements,
                    stmt.else_part.scope_name(scope),
                    visit,
                );
            }
            Statement::For(for_loop) => visit_declarations(
                &for_loop.body.statements,
                for_loop.body.scope_name(scope),
                visit,
            ),
            Statement::While(stmt) => {
                visit_declarations(&stmt.body.statements, stmt.body.scope_name(scope), visit)
            }
            Statement::Repeat(stmt) => {
                visit_declarations(&stmt.body.statements, stmt.body.scope_name(scope), visit)
            }
            Statement::When(stmt) => {
                for choice in &stmt.choices {
                    visit_declarations(
                        &choice.body.statements,
                        choice.body.scope_name(scope),
                        visit,
                    );
                }
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableInfo {
    pub datatype: DataType,
    pub storage: Storage,
    pub length: Option<u16>,
    pub struct_members: Vec<String>,
}

impl VariableInfo {
    pub fn plain(datatype: DataType) -> Self {
        VariableInfo {
            datatype,
            storage: Storage::Plain,
            length: None,
            struct_members: Vec::new(),
        }
    }
}

/// What a call site needs to know about a subroutine
#[derive(Debug, Clone, PartialEq)]
pub struct SubroutineSignature {
    pub name: String,
    pub parameters: Vec<SubroutineParameter>,
    pub return_types: Vec<DataType>,
    pub asm: Option<AsmSignature>,
}

impl SubroutineSignature {
    pub fn clobbers(&self, register: Register) -> bool {
        self.asm
            .as_ref()
            .is_some_and(|asm| asm.clobbers.contains(&register))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Variable(VariableInfo),
    Subroutine(SubroutineSignature),
    Label,
}

/// Scoped name to declaration lookup, built once per program
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    pub fn build(program: &Program) -> Self {
        let mut table = SymbolTable::new();
        for block in program.modules.iter().flat_map(|m| &m.blocks) {
            visit_declarations(&block.statements, &block.name, &mut |decl| match decl {
                Declaration::Variable(var) => table.insert(
                    &var.name,
                    Symbol::Variable(VariableInfo {
                        datatype: var.datatype,
                        storage: var.storage,
                        length: var.length,
                        struct_members: var.struct_members.clone(),
                    }),
                ),
                Declaration::Parameter(sub, param) => table.insert(
                    format!("{}.{}", sub.name, param.name),
                    Symbol::Variable(VariableInfo::plain(param.datatype)),
                ),
                Declaration::Label(label) => table.insert(&label.name, Symbol::Label),
                Declaration::Subroutine(sub) => {
                    table.insert(&sub.name, Symbol::Subroutine(sub.signature()))
                }
            });
        }
        table
    }

    pub fn insert(&mut self, name: impl Into<String>, symbol: Symbol) {
        self.symbols.insert(name.into(), symbol);
    }

    /// Builder form of `insert` for a plain variable
    pub fn with_variable(mut self, name: &str, datatype: DataType) -> Self {
        self.insert(name, Symbol::Variable(VariableInfo::plain(datatype)));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn variable(&self, name: &str) -> Option<&VariableInfo> {
        match self.symbols.get(name) {
            Some(Symbol::Variable(var)) => Some(var),
            _ => None,
        }
    }

    pub fn subroutine(&self, name: &str) -> Option<&SubroutineSignature> {
        match self.symbols.get(name) {
            Some(Symbol::Subroutine(sub)) => Some(sub),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
