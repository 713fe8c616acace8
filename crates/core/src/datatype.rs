//! Data types understood by the stack machine
//!
//! The machine itself is untyped at the bytecode level; these types drive
//! opcode selection at compile time and tag the immediate operands and
//! variable declarations that end up in the intermediate program.
//!
//! Widening is one-directional:
//!
//! ```text
//!   UBYTE ──> UWORD ──┐
//!     │  \            ├──> FLOAT
//!   BYTE ──> WORD  ───┘
//! ```
//!
//! A byte kind widens to either word kind, any integer kind widens to float.
//! Nothing ever narrows implicitly.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    #[serde(rename = "ubyte")]
    UByte,
    Byte,
    #[serde(rename = "uword")]
    UWord,
    Word,
    Float,
    Str,
    /// Screencode-encoded string
    #[serde(rename = "str_s")]
    StrS,
    #[serde(rename = "array_ub")]
    ArrayUb,
    #[serde(rename = "array_b")]
    ArrayB,
    #[serde(rename = "array_uw")]
    ArrayUw,
    #[serde(rename = "array_w")]
    ArrayW,
    #[serde(rename = "array_f")]
    ArrayF,
    Struct,
}

impl DataType {
    pub fn is_byte(self) -> bool {
        matches!(self, DataType::UByte | DataType::Byte)
    }

    pub fn is_word(self) -> bool {
        matches!(self, DataType::UWord | DataType::Word)
    }

    pub fn is_integer(self) -> bool {
        self.is_byte() || self.is_word()
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self == DataType::Float
    }

    pub fn is_signed(self) -> bool {
        matches!(self, DataType::Byte | DataType::Word | DataType::Float)
    }

    pub fn is_string(self) -> bool {
        matches!(self, DataType::Str | DataType::StrS)
    }

    pub fn is_array(self) -> bool {
        matches!(
            self,
            DataType::ArrayUb
                | DataType::ArrayB
                | DataType::ArrayUw
                | DataType::ArrayW
                | DataType::ArrayF
        )
    }

    /// Strings and arrays: values that live on the heap and are referenced by address
    pub fn is_iterable(self) -> bool {
        self.is_string() || self.is_array()
    }

    /// Element type of an iterable, `None` for scalars
    pub fn element_type(self) -> Option<DataType> {
        match self {
            DataType::Str | DataType::StrS | DataType::ArrayUb => Some(DataType::UByte),
            DataType::ArrayB => Some(DataType::Byte),
            DataType::ArrayUw => Some(DataType::UWord),
            DataType::ArrayW => Some(DataType::Word),
            DataType::ArrayF => Some(DataType::Float),
            _ => None,
        }
    }

    /// Rank in the widening order: byte < word < float.
    ///
    /// Signedness is not ranked; a same-rank conversion reinterprets the bits.
    pub fn width_rank(self) -> Option<u8> {
        match self {
            DataType::UByte | DataType::Byte => Some(0),
            DataType::UWord | DataType::Word => Some(1),
            DataType::Float => Some(2),
            _ => None,
        }
    }

    /// True if a value of this type cannot be stored in `other` without losing range
    pub fn is_wider_than(self, other: DataType) -> bool {
        match (self.width_rank(), other.width_rank()) {
            (Some(a), Some(b)) => a > b,
            _ => false,
        }
    }

    /// Inclusive integer range representable by this type
    pub fn integer_range(self) -> Option<(i64, i64)> {
        match self {
            DataType::UByte => Some((0, 255)),
            DataType::Byte => Some((-128, 127)),
            DataType::UWord => Some((0, 65535)),
            DataType::Word => Some((-32768, 32767)),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::UByte => "ubyte",
            DataType::Byte => "byte",
            DataType::UWord => "uword",
            DataType::Word => "word",
            DataType::Float => "float",
            DataType::Str => "str",
            DataType::StrS => "str_s",
            DataType::ArrayUb => "ubyte[]",
            DataType::ArrayB => "byte[]",
            DataType::ArrayUw => "uword[]",
            DataType::ArrayW => "word[]",
            DataType::ArrayF => "float[]",
            DataType::Struct => "struct",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
