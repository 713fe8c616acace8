//! Typed immediate values
//!
//! A `Value` is what an instruction carries as its immediate operand: a
//! literal to push, a comparison constant, a fixed memory address, a syscall
//! number. Every value knows its `DataType`, and construction is range checked
//! so an out-of-range literal can never reach the instruction stream.

use crate::datatype::DataType;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    UByte(u8),
    Byte(i8),
    UWord(u16),
    Word(i16),
    Float(f64),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("value {value} out of range for {datatype}")]
    OutOfRange { value: String, datatype: DataType },

    #[error("{0} is not a numeric type")]
    NotNumeric(DataType),
}

impl Value {
    /// Build an integer value of the given type, failing if it doesn't fit
    pub fn integer(n: i64, datatype: DataType) -> Result<Value, ValueError> {
        let out_of_range = || ValueError::OutOfRange {
            value: n.to_string(),
            datatype,
        };
        match datatype {
            DataType::UByte => u8::try_from(n).map(Value::UByte).map_err(|_| out_of_range()),
            DataType::Byte => i8::try_from(n).map(Value::Byte).map_err(|_| out_of_range()),
            DataType::UWord => u16::try_from(n).map(Value::UWord).map_err(|_| out_of_range()),
            DataType::Word => i16::try_from(n).map(Value::Word).map_err(|_| out_of_range()),
            DataType::Float => Ok(Value::Float(n as f64)),
            other => Err(ValueError::NotNumeric(other)),
        }
    }

    /// Build a value of the given type from a float, truncating towards zero for integer types
    pub fn number(n: f64, datatype: DataType) -> Result<Value, ValueError> {
        if datatype == DataType::Float {
            return Ok(Value::Float(n));
        }
        if !n.is_finite() {
            return Err(ValueError::OutOfRange {
                value: n.to_string(),
                datatype,
            });
        }
        Value::integer(n.trunc() as i64, datatype)
    }

    /// Smallest integer type that holds `n`: ubyte, byte, uword, then word
    pub fn optimal_integer(n: i64) -> Result<Value, ValueError> {
        match n {
            0..=255 => Value::integer(n, DataType::UByte),
            -128..=-1 => Value::integer(n, DataType::Byte),
            256..=65535 => Value::integer(n, DataType::UWord),
            _ => Value::integer(n, DataType::Word),
        }
    }

    /// Address operand; addresses are always uword
    pub fn address(address: u16) -> Value {
        Value::UWord(address)
    }

    pub fn datatype(&self) -> DataType {
        match self {
            Value::UByte(_) => DataType::UByte,
            Value::Byte(_) => DataType::Byte,
            Value::UWord(_) => DataType::UWord,
            Value::Word(_) => DataType::Word,
            Value::Float(_) => DataType::Float,
        }
    }

    /// Integer payload; `None` for floats
    pub fn as_integer(&self) -> Option<i64> {
        match *self {
            Value::UByte(v) => Some(v as i64),
            Value::Byte(v) => Some(v as i64),
            Value::UWord(v) => Some(v as i64),
            Value::Word(v) => Some(v as i64),
            Value::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::Float(v) => v,
            _ => self.as_integer().unwrap_or_default() as f64,
        }
    }

    pub fn is_true(&self) -> bool {
        self.as_f64() != 0.0
    }

    /// Convert to another numeric type the way the machine's cast opcodes do:
    /// integers wrap to the target width, floats truncate and must fit.
    pub fn cast(&self, to: DataType) -> Result<Value, ValueError> {
        match (self.as_integer(), to) {
            (_, DataType::Float) => Ok(Value::Float(self.as_f64())),
            (Some(n), DataType::UByte) => Ok(Value::UByte(n as u8)),
            (Some(n), DataType::Byte) => Ok(Value::Byte(n as i8)),
            (Some(n), DataType::UWord) => Ok(Value::UWord(n as u16)),
            (Some(n), DataType::Word) => Ok(Value::Word(n as i16)),
            (_, to) => Value::number(self.as_f64(), to),
        }
    }
}

impl fmt::Display for Value {
    /// Integers print as in assembler listings: 0..15 decimal, otherwise `$`-hex
    /// padded to the byte or word width. Negative values get a leading `-`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_integer() {
            None => write!(f, "{}", self.as_f64()),
            Some(n) => {
                let sign = if n < 0 { "-" } else { "" };
                let abs = n.unsigned_abs();
                match abs {
                    0..=15 => write!(f, "{sign}{abs}"),
                    16..=0xff => write!(f, "{sign}${abs:02x}"),
                    _ => write!(f, "{sign}${abs:04x}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_range_checked() {
        assert_eq!(Value::integer(200, DataType::UByte), Ok(Value::UByte(200)));
        assert!(Value::integer(256, DataType::UByte).is_err());
        assert!(Value::integer(-1, DataType::UWord).is_err());
        assert!(matches!(
            Value::integer(1, DataType::Str),
            Err(ValueError::NotNumeric(DataType::Str))
        ));
    }

    #[test]
    fn test_optimal_integer() {
        assert_eq!(Value::optimal_integer(0).unwrap().datatype(), DataType::UByte);
        assert_eq!(Value::optimal_integer(-5).unwrap().datatype(), DataType::Byte);
        assert_eq!(Value::optimal_integer(1000).unwrap().datatype(), DataType::UWord);
        assert_eq!(Value::optimal_integer(-1000).unwrap().datatype(), DataType::Word);
        assert!(Value::optimal_integer(70000).is_err());
    }

    #[test]
    fn test_cast_wraps_integers() {
        assert_eq!(Value::Byte(-1).cast(DataType::UByte), Ok(Value::UByte(255)));
        assert_eq!(Value::UWord(0x1234).cast(DataType::UByte), Ok(Value::UByte(0x34)));
        assert_eq!(Value::UByte(3).cast(DataType::Float), Ok(Value::Float(3.0)));
        assert_eq!(Value::Float(2.9).cast(DataType::UByte), Ok(Value::UByte(2)));
        assert!(Value::Float(300.0).cast(DataType::UByte).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::UByte(9).to_string(), "9");
        assert_eq!(Value::UByte(200).to_string(), "$c8");
        assert_eq!(Value::UWord(0xd020).to_string(), "$d020");
        assert_eq!(Value::Word(-300).to_string(), "-$012c");
        assert_eq!(Value::Float(1.5).to_string(), "1.5");
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_string(&Value::UByte(7)).unwrap();
        assert_eq!(json, r#"{"type":"ubyte","value":7}"#);
        let back: Value = serde_json::from_str(r#"{"type":"word","value":-2}"#).unwrap();
        assert_eq!(back, Value::Word(-2));
    }
}
