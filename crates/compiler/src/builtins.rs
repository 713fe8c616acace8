//! Builtin function table
//!
//! Every function the language provides without a declaration: what it
//! accepts and what it leaves on the stack. How each one is lowered lives in
//! `codegen::builtin_calls`; this table only answers typing questions.
//!
//! The `builtin!` macro takes a compact notation:
//! `builtin!(funcs, "name", (Param, Param) -> Return)` where a param is one of
//! the `ParamType` shorthands below and the return is `Nothing`, a concrete
//! type, or one of `Same`, `Element`, `Sum`.

use std::collections::HashMap;
use std::sync::LazyLock;
use svm_core::DataType;

/// What a builtin accepts for one argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Exactly this type; narrower arguments are widened to it
    Exact(DataType),
    Numeric,
    Integer,
    Array,
    Iterable,
    /// Integer storage the function writes its result back into
    InPlace,
}

impl ParamType {
    pub fn accepts(self, datatype: DataType) -> bool {
        match self {
            ParamType::Exact(dt) => dt == datatype || dt.is_wider_than(datatype),
            ParamType::Numeric => datatype.is_numeric(),
            ParamType::Integer | ParamType::InPlace => datatype.is_integer(),
            ParamType::Array => datatype.is_array(),
            ParamType::Iterable => datatype.is_iterable(),
        }
    }
}

/// Type of the value a builtin leaves on the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinReturn {
    Nothing,
    Fixed(DataType),
    /// Same type as the first argument
    SameAsArg,
    /// Element type of the first (array) argument
    ElementOfArg,
    /// Sum of the first argument's elements: bytes widen to words
    SumOfArg,
}

impl BuiltinReturn {
    /// Resolve the result type given the first argument's type
    pub fn resolve(self, arg: Option<DataType>) -> Option<DataType> {
        match self {
            BuiltinReturn::Nothing => None,
            BuiltinReturn::Fixed(dt) => Some(dt),
            BuiltinReturn::SameAsArg => arg,
            BuiltinReturn::ElementOfArg => arg?.element_type(),
            BuiltinReturn::SumOfArg => match arg?.element_type()? {
                DataType::UByte => Some(DataType::UWord),
                DataType::Byte => Some(DataType::Word),
                other => Some(other),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinFunction {
    pub name: &'static str,
    pub params: Vec<ParamType>,
    pub returns: BuiltinReturn,
}

macro_rules! param {
    (Numeric) => {
        ParamType::Numeric
    };
    (Integer) => {
        ParamType::Integer
    };
    (Array) => {
        ParamType::Array
    };
    (Iterable) => {
        ParamType::Iterable
    };
    (InPlace) => {
        ParamType::InPlace
    };
    (UByte) => {
        ParamType::Exact(DataType::UByte)
    };
    (UWord) => {
        ParamType::Exact(DataType::UWord)
    };
    (Word) => {
        ParamType::Exact(DataType::Word)
    };
    (Float) => {
        ParamType::Exact(DataType::Float)
    };
}

macro_rules! returns {
    (Nothing) => {
        BuiltinReturn::Nothing
    };
    (Same) => {
        BuiltinReturn::SameAsArg
    };
    (Element) => {
        BuiltinReturn::ElementOfArg
    };
    (Sum) => {
        BuiltinReturn::SumOfArg
    };
    ($dt:ident) => {
        BuiltinReturn::Fixed(DataType::$dt)
    };
}

macro_rules! builtin {
    ($funcs:ident, $name:expr, ($($p:tt),*) -> $ret:tt) => {
        $funcs.insert(
            $name,
            BuiltinFunction {
                name: $name,
                params: vec![$(param!($p)),*],
                returns: returns!($ret),
            },
        );
    };
}

macro_rules! builtins_float_to_float {
    ($funcs:ident, $($name:expr),+ $(,)?) => {
        $(
            builtin!($funcs, $name, (Float) -> Float);
        )+
    };
}

macro_rules! builtins_in_place {
    ($funcs:ident, $($name:expr),+ $(,)?) => {
        $(
            builtin!($funcs, $name, (InPlace) -> Nothing);
        )+
    };
}

macro_rules! builtins_no_args {
    ($funcs:ident, $($name:expr),+ $(,)?) => {
        $(
            builtin!($funcs, $name, () -> Nothing);
        )+
    };
}

static BUILTIN_FUNCTIONS: LazyLock<HashMap<&'static str, BuiltinFunction>> =
    LazyLock::new(builtin_functions);

/// Look up a builtin by name
pub fn lookup(name: &str) -> Option<&'static BuiltinFunction> {
    BUILTIN_FUNCTIONS.get(name)
}

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_FUNCTIONS.contains_key(name)
}

fn builtin_functions() -> HashMap<&'static str, BuiltinFunction> {
    let mut funcs = HashMap::new();

    // =========================================================================
    // In-place shifts and rotates
    // =========================================================================

    builtins_in_place!(funcs, "lsl", "lsr", "rol", "ror", "rol2", "ror2");

    // =========================================================================
    // Float math
    // =========================================================================

    builtins_float_to_float!(
        funcs, "sin", "cos", "tan", "atan", "ln", "log2", "sqrt", "rad", "deg", "round", "floor",
        "ceil",
    );

    // =========================================================================
    // Integer trigonometry and roots
    // =========================================================================

    builtin!(funcs, "sin8", (UByte) -> Byte);
    builtin!(funcs, "sin8u", (UByte) -> UByte);
    builtin!(funcs, "sin16", (UByte) -> Word);
    builtin!(funcs, "sin16u", (UByte) -> UWord);
    builtin!(funcs, "cos8", (UByte) -> Byte);
    builtin!(funcs, "cos8u", (UByte) -> UByte);
    builtin!(funcs, "cos16", (UByte) -> Word);
    builtin!(funcs, "cos16u", (UByte) -> UWord);
    builtin!(funcs, "sqrt16", (UWord) -> UByte);
    builtin!(funcs, "abs", (Numeric) -> Same);

    // =========================================================================
    // Arrays and strings
    // =========================================================================

    builtin!(funcs, "len", (Iterable) -> UByte);
    builtin!(funcs, "strlen", (Iterable) -> UByte);
    builtin!(funcs, "any", (Array) -> UByte);
    builtin!(funcs, "all", (Array) -> UByte);
    builtin!(funcs, "max", (Array) -> Element);
    builtin!(funcs, "min", (Array) -> Element);
    builtin!(funcs, "sum", (Array) -> Sum);
    builtin!(funcs, "avg", (Array) -> Float);

    // =========================================================================
    // Bytes, words and memory
    // =========================================================================

    builtin!(funcs, "msb", (Integer) -> UByte);
    builtin!(funcs, "mkword", (UByte, UByte) -> UWord);
    builtin!(funcs, "memcopy", (UWord, UWord, UWord) -> Nothing);
    builtin!(funcs, "memset", (UWord, UWord, UByte) -> Nothing);
    builtin!(funcs, "memsetw", (UWord, UWord, UWord) -> Nothing);
    builtin!(funcs, "swap", (Numeric, Numeric) -> Nothing);

    // =========================================================================
    // Random numbers and CPU state
    // =========================================================================

    builtin!(funcs, "rnd", () -> UByte);
    builtin!(funcs, "rndw", () -> UWord);
    builtin!(funcs, "rndf", () -> Float);
    builtin!(funcs, "read_flags", () -> UByte);
    builtins_no_args!(
        funcs,
        "set_carry",
        "clear_carry",
        "set_irqd",
        "clear_irqd",
        "rsave",
        "rrestore",
    );

    // =========================================================================
    // Virtual machine services
    // =========================================================================

    builtin!(funcs, "vm_write_memchr", (UWord) -> Nothing);
    builtin!(funcs, "vm_write_memstr", (UWord) -> Nothing);
    builtin!(funcs, "vm_write_num", (Numeric) -> Nothing);
    builtin!(funcs, "vm_write_char", (UByte) -> Nothing);
    builtin!(funcs, "vm_write_str", (Iterable) -> Nothing);
    builtin!(funcs, "vm_input_str", (Iterable) -> Nothing);
    builtin!(funcs, "vm_gfx_pixel", (UWord, UWord, UByte) -> Nothing);
    builtin!(funcs, "vm_gfx_clearscr", (UByte) -> Nothing);
    builtin!(funcs, "vm_gfx_text", (UWord, UWord, UByte, Iterable) -> Nothing);
    builtin!(funcs, "vm_gfx_line", (UWord, UWord, UWord, UWord, UByte) -> Nothing);

    funcs
}

#[cfg(test)]
mod tests {
    use super::*;
    use svm_core::Syscall;

    #[test]
    fn test_lookup() {
        let sin = lookup("sin").unwrap();
        assert_eq!(sin.params, vec![ParamType::Exact(DataType::Float)]);
        assert_eq!(sin.returns, BuiltinReturn::Fixed(DataType::Float));
        assert!(lookup("frobnicate").is_none());
        assert!(is_builtin("lsl"));
    }

    #[test]
    fn test_return_resolution() {
        assert_eq!(
            BuiltinReturn::SumOfArg.resolve(Some(DataType::ArrayUb)),
            Some(DataType::UWord)
        );
        assert_eq!(
            BuiltinReturn::SumOfArg.resolve(Some(DataType::ArrayF)),
            Some(DataType::Float)
        );
        assert_eq!(
            BuiltinReturn::ElementOfArg.resolve(Some(DataType::ArrayB)),
            Some(DataType::Byte)
        );
        assert_eq!(BuiltinReturn::SameAsArg.resolve(Some(DataType::Word)), Some(DataType::Word));
        assert_eq!(BuiltinReturn::Nothing.resolve(Some(DataType::Word)), None);
    }

    #[test]
    fn test_param_acceptance() {
        assert!(ParamType::Exact(DataType::UWord).accepts(DataType::UByte));
        assert!(!ParamType::Exact(DataType::UByte).accepts(DataType::UWord));
        assert!(ParamType::Iterable.accepts(DataType::Str));
        assert!(!ParamType::Array.accepts(DataType::Str));
    }

    #[test]
    fn test_syscall_backed_builtins_resolve() {
        // everything without a dedicated opcode lowering must map onto a syscall
        for name in [
            "sin", "cos", "tan", "atan", "ln", "log2", "sqrt", "rad", "deg", "round", "floor",
            "ceil", "sin8", "sin8u", "sin16", "sin16u", "cos8", "cos8u", "cos16", "cos16u",
            "sqrt16", "rnd", "rndw", "rndf", "read_flags", "memcopy", "memset", "memsetw",
            "strlen", "vm_write_str", "vm_gfx_line",
        ] {
            assert!(lookup(name).is_some(), "{name} missing from table");
            assert!(Syscall::for_function(name).is_some(), "{name} has no syscall");
        }
    }
}
