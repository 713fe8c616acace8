//! Type Coercion
//!
//! Implicit conversions only ever widen: byte kinds widen to word kinds,
//! integers widen to float. A conversion in the other direction is an error,
//! never a silent truncation. A sign change between types of the same width
//! reuses the bits as they are and emits nothing. Explicit typecasts go
//! through `opcodes::cast` instead and may narrow or reinterpret.

use super::{CodeGen, CodeGenError, opcodes};
use svm_core::{DataType, Instruction, Opcode};

/// Which operand of a binary operation has to be cast to the common type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastSide {
    Neither,
    Left,
    Right,
}

/// Join two numeric types: the wider rank wins, and the result is signed if
/// either side is signed. Only an operand of narrower width than the result
/// needs a cast, so at most one side is ever converted.
pub fn common_type(left: DataType, right: DataType) -> Result<(DataType, CastSide), CodeGenError> {
    let (Some(left_rank), Some(right_rank)) = (left.width_rank(), right.width_rank()) else {
        let bad = if left.is_numeric() { right } else { left };
        return Err(CodeGenError::NonNumeric(bad));
    };
    let rank = left_rank.max(right_rank);
    let signed = left.is_signed() || right.is_signed();
    let common = match rank {
        _ if left == right => left,
        0 if signed => DataType::Byte,
        0 => DataType::UByte,
        1 if signed => DataType::Word,
        1 => DataType::UWord,
        _ => DataType::Float,
    };
    let side = if left_rank < rank {
        CastSide::Left
    } else if right_rank < rank {
        CastSide::Right
    } else {
        CastSide::Neither
    };
    Ok((common, side))
}

/// Implicit cast from `from` to `to`, or `None` when the value can be used as it is
pub(super) fn conversion_opcode(
    from: DataType,
    to: DataType,
) -> Result<Option<Opcode>, CodeGenError> {
    if from == to {
        return Ok(None);
    }
    let (Some(from_rank), Some(to_rank)) = (from.width_rank(), to.width_rank()) else {
        let bad = if from.is_numeric() { to } else { from };
        return Err(CodeGenError::NonNumeric(bad));
    };
    if from.is_wider_than(to) {
        return Err(CodeGenError::Narrowing { from, to });
    }
    if from_rank == to_rank {
        return Ok(None);
    }
    opcodes::cast(from, to)
}

impl CodeGen<'_> {
    /// Convert the value on top of the stack from `from` to `to`.
    ///
    /// Emits nothing for equal types or a same-width sign change and exactly
    /// one cast otherwise. Fails without emitting anything if the conversion
    /// would narrow.
    pub(super) fn convert(&mut self, from: DataType, to: DataType) -> Result<(), CodeGenError> {
        if let Some(opcode) = conversion_opcode(from, to)? {
            self.emit(Instruction::new(opcode))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NUMERIC: [DataType; 5] = [
        DataType::UByte,
        DataType::Byte,
        DataType::UWord,
        DataType::Word,
        DataType::Float,
    ];

    #[test]
    fn test_common_type_same() {
        for dt in NUMERIC {
            assert_eq!(common_type(dt, dt), Ok((dt, CastSide::Neither)));
        }
    }

    #[test]
    fn test_common_type_widens_narrower_side() {
        assert_eq!(
            common_type(DataType::UByte, DataType::UWord),
            Ok((DataType::UWord, CastSide::Left))
        );
        assert_eq!(
            common_type(DataType::Float, DataType::Word),
            Ok((DataType::Float, CastSide::Right))
        );
        assert_eq!(
            common_type(DataType::UByte, DataType::Word),
            Ok((DataType::Word, CastSide::Left))
        );
        assert_eq!(
            common_type(DataType::UWord, DataType::Byte),
            Ok((DataType::Word, CastSide::Right))
        );
        assert_eq!(
            common_type(DataType::UByte, DataType::Byte),
            Ok((DataType::Byte, CastSide::Neither))
        );
    }

    #[test]
    fn test_common_type_rejects_non_numeric() {
        assert_eq!(
            common_type(DataType::UByte, DataType::Str),
            Err(CodeGenError::NonNumeric(DataType::Str))
        );
        assert_eq!(
            common_type(DataType::ArrayF, DataType::Float),
            Err(CodeGenError::NonNumeric(DataType::ArrayF))
        );
    }

    #[test]
    fn test_every_narrowing_pair_fails() {
        for from in NUMERIC {
            for to in NUMERIC {
                let result = conversion_opcode(from, to);
                if from.is_wider_than(to) {
                    assert_eq!(result, Err(CodeGenError::Narrowing { from, to }));
                } else {
                    assert!(result.is_ok(), "{from} -> {to}");
                }
            }
        }
    }

    #[test]
    fn test_widening_opcodes() {
        assert_eq!(
            conversion_opcode(DataType::UByte, DataType::UWord),
            Ok(Some(Opcode::CastUbToUw))
        );
        assert_eq!(
            conversion_opcode(DataType::Word, DataType::Float),
            Ok(Some(Opcode::CastWToF))
        );
        assert_eq!(conversion_opcode(DataType::Float, DataType::Float), Ok(None));
        assert_eq!(
            conversion_opcode(DataType::Str, DataType::UWord),
            Err(CodeGenError::NonNumeric(DataType::Str))
        );
    }

    #[test]
    fn test_same_width_sign_change_reuses_bits() {
        assert_eq!(conversion_opcode(DataType::UByte, DataType::Byte), Ok(None));
        assert_eq!(conversion_opcode(DataType::UWord, DataType::Word), Ok(None));
        assert_eq!(conversion_opcode(DataType::Word, DataType::UWord), Ok(None));
        assert_eq!(
            conversion_opcode(DataType::Byte, DataType::UWord),
            Ok(Some(Opcode::CastBToUw))
        );
    }

    #[test]
    fn test_equal_iterable_types_need_no_conversion() {
        assert_eq!(conversion_opcode(DataType::Str, DataType::Str), Ok(None));
        assert_eq!(conversion_opcode(DataType::ArrayUb, DataType::ArrayUb), Ok(None));
        assert_eq!(
            conversion_opcode(DataType::Str, DataType::ArrayUb),
            Err(CodeGenError::NonNumeric(DataType::Str))
        );
    }
}
