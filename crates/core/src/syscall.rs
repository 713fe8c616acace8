//! Numbered runtime services of the virtual machine
//!
//! A `SYSCALL` instruction carries one of these call numbers as a ubyte
//! immediate. Builtin functions are looked up by their canonical name:
//! `vm_*` names are used as-is, every other builtin gets a `FUNC_` prefix.
//! Lookup is case-insensitive on the input side.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! syscalls {
    ($($variant:ident = $nr:literal => $name:literal,)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Syscall {
            $(
                #[serde(rename = $name)]
                $variant,
            )*
        }

        impl Syscall {
            pub const ALL: &'static [Syscall] = &[$(Syscall::$variant,)*];

            pub fn call_number(self) -> u8 {
                match self {
                    $(Syscall::$variant => $nr,)*
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(Syscall::$variant => $name,)*
                }
            }

            fn from_canonical(name: &str) -> Option<Syscall> {
                match name {
                    $($name => Some(Syscall::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

syscalls! {
    VmWriteMemchr = 10 => "VM_WRITE_MEMCHR",
    VmWriteMemstr = 11 => "VM_WRITE_MEMSTR",
    VmWriteNum = 12 => "VM_WRITE_NUM",
    VmWriteChar = 13 => "VM_WRITE_CHAR",
    VmWriteStr = 14 => "VM_WRITE_STR",
    VmInputStr = 15 => "VM_INPUT_STR",
    VmGfxPixel = 16 => "VM_GFX_PIXEL",
    VmGfxClearscr = 17 => "VM_GFX_CLEARSCR",
    VmGfxText = 18 => "VM_GFX_TEXT",
    VmGfxLine = 19 => "VM_GFX_LINE",

    FuncSin = 66 => "FUNC_SIN",
    FuncCos = 67 => "FUNC_COS",
    FuncAbs = 68 => "FUNC_ABS",
    FuncTan = 69 => "FUNC_TAN",
    FuncAtan = 70 => "FUNC_ATAN",
    FuncLn = 71 => "FUNC_LN",
    FuncLog2 = 72 => "FUNC_LOG2",
    FuncSqrt16 = 73 => "FUNC_SQRT16",
    FuncSqrt = 74 => "FUNC_SQRT",
    FuncRad = 75 => "FUNC_RAD",
    FuncDeg = 76 => "FUNC_DEG",
    FuncRound = 77 => "FUNC_ROUND",
    FuncFloor = 78 => "FUNC_FLOOR",
    FuncCeil = 79 => "FUNC_CEIL",
    FuncRnd = 80 => "FUNC_RND",
    FuncRndw = 81 => "FUNC_RNDW",
    FuncRndf = 82 => "FUNC_RNDF",
    FuncLenStr = 83 => "FUNC_LEN_STR",
    FuncAnyB = 84 => "FUNC_ANY_B",
    FuncAnyW = 85 => "FUNC_ANY_W",
    FuncAnyF = 86 => "FUNC_ANY_F",
    FuncAllB = 87 => "FUNC_ALL_B",
    FuncAllW = 88 => "FUNC_ALL_W",
    FuncAllF = 89 => "FUNC_ALL_F",
    FuncMaxUb = 90 => "FUNC_MAX_UB",
    FuncMaxB = 91 => "FUNC_MAX_B",
    FuncMaxUw = 92 => "FUNC_MAX_UW",
    FuncMaxW = 93 => "FUNC_MAX_W",
    FuncMaxF = 94 => "FUNC_MAX_F",
    FuncMinUb = 95 => "FUNC_MIN_UB",
    FuncMinB = 96 => "FUNC_MIN_B",
    FuncMinUw = 97 => "FUNC_MIN_UW",
    FuncMinW = 98 => "FUNC_MIN_W",
    FuncMinF = 99 => "FUNC_MIN_F",
    FuncSumUb = 100 => "FUNC_SUM_UB",
    FuncSumB = 101 => "FUNC_SUM_B",
    FuncSumUw = 102 => "FUNC_SUM_UW",
    FuncSumW = 103 => "FUNC_SUM_W",
    FuncSumF = 104 => "FUNC_SUM_F",
    FuncMemcopy = 105 => "FUNC_MEMCOPY",
    FuncMemset = 106 => "FUNC_MEMSET",
    FuncMemsetw = 107 => "FUNC_MEMSETW",
    FuncReadFlags = 108 => "FUNC_READ_FLAGS",
    FuncSin8 = 109 => "FUNC_SIN8",
    FuncSin8u = 110 => "FUNC_SIN8U",
    FuncSin16 = 111 => "FUNC_SIN16",
    FuncSin16u = 112 => "FUNC_SIN16U",
    FuncCos8 = 113 => "FUNC_COS8",
    FuncCos8u = 114 => "FUNC_COS8U",
    FuncCos16 = 115 => "FUNC_COS16",
    FuncCos16u = 116 => "FUNC_COS16U",
    FuncStrlen = 117 => "FUNC_STRLEN",
}

impl Syscall {
    /// Resolve a builtin function name (`sin`, `sum_ub`, `vm_write_str`) to its syscall
    pub fn for_function(funcname: &str) -> Option<Syscall> {
        let canonical = if funcname.starts_with("vm_") {
            funcname.to_uppercase()
        } else {
            format!("FUNC_{}", funcname.to_uppercase())
        };
        Syscall::from_canonical(&canonical)
    }
}

impl fmt::Display for Syscall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_function_lookup() {
        assert_eq!(Syscall::for_function("sin"), Some(Syscall::FuncSin));
        assert_eq!(Syscall::for_function("sum_ub"), Some(Syscall::FuncSumUb));
        assert_eq!(Syscall::for_function("len_str"), Some(Syscall::FuncLenStr));
        assert_eq!(Syscall::for_function("vm_write_str"), Some(Syscall::VmWriteStr));
        assert_eq!(Syscall::for_function("frobnicate"), None);
    }

    #[test]
    fn test_call_numbers_unique() {
        let numbers: HashSet<_> = Syscall::ALL.iter().map(|s| s.call_number()).collect();
        assert_eq!(numbers.len(), Syscall::ALL.len());
        assert_eq!(Syscall::FuncSin.call_number(), 66);
    }
}
