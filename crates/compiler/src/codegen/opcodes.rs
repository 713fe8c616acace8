//! Opcode Selection
//!
//! Pure lookup tables from an operation and its operand type to the opcode
//! that implements it. This is the only place the type-to-opcode mapping is
//! spelled out; expression, loop and call lowering all go through here.
//! Every table rejects types it has no opcode for.

use super::CodeGenError;
use crate::ast::{BinaryOperator, BranchCondition, PrefixOperator, RegisterOrPair};
use svm_core::{DataType, Opcode};

fn invalid(operation: &'static str, datatype: DataType) -> CodeGenError {
    CodeGenError::InvalidType {
        operation,
        datatype,
    }
}

/// Push an immediate value; iterables are pushed as their word address
pub(super) fn push_literal(dt: DataType) -> Result<Opcode, CodeGenError> {
    match dt {
        _ if dt.is_byte() => Ok(Opcode::PushByte),
        _ if dt.is_word() || dt.is_iterable() => Ok(Opcode::PushWord),
        DataType::Float => Ok(Opcode::PushFloat),
        _ => Err(invalid("push", dt)),
    }
}

pub(super) fn push_var(dt: DataType) -> Result<Opcode, CodeGenError> {
    match dt {
        _ if dt.is_byte() => Ok(Opcode::PushVarByte),
        _ if dt.is_word() => Ok(Opcode::PushVarWord),
        _ if dt.is_iterable() => Ok(Opcode::PushAddrHeapvar),
        DataType::Float => Ok(Opcode::PushVarFloat),
        _ => Err(invalid("push variable", dt)),
    }
}

/// Read a memory-mapped variable at a fixed address
pub(super) fn push_mem(dt: DataType) -> Result<Opcode, CodeGenError> {
    match dt {
        DataType::UByte => Ok(Opcode::PushMemUb),
        DataType::Byte => Ok(Opcode::PushMemB),
        DataType::UWord => Ok(Opcode::PushMemUw),
        DataType::Word => Ok(Opcode::PushMemW),
        DataType::Float => Ok(Opcode::PushMemFloat),
        _ => Err(invalid("memory read", dt)),
    }
}

pub(super) fn pop_var(dt: DataType) -> Result<Opcode, CodeGenError> {
    match dt {
        _ if dt.is_byte() => Ok(Opcode::PopVarByte),
        _ if dt.is_word() || dt.is_iterable() => Ok(Opcode::PopVarWord),
        DataType::Float => Ok(Opcode::PopVarFloat),
        _ => Err(invalid("pop variable", dt)),
    }
}

pub(super) fn pop_mem(dt: DataType) -> Result<Opcode, CodeGenError> {
    match dt {
        _ if dt.is_byte() => Ok(Opcode::PopMemByte),
        _ if dt.is_word() || dt.is_iterable() => Ok(Opcode::PopMemWord),
        DataType::Float => Ok(Opcode::PopMemFloat),
        _ => Err(invalid("memory write", dt)),
    }
}

pub(super) fn discard(dt: DataType) -> Result<Opcode, CodeGenError> {
    match dt {
        _ if dt.is_byte() => Ok(Opcode::DiscardByte),
        _ if dt.is_word() || dt.is_iterable() => Ok(Opcode::DiscardWord),
        DataType::Float => Ok(Opcode::DiscardFloat),
        _ => Err(invalid("discard", dt)),
    }
}

pub(super) fn dup(dt: DataType) -> Result<Opcode, CodeGenError> {
    match dt {
        _ if dt.is_byte() => Ok(Opcode::DupB),
        _ if dt.is_word() => Ok(Opcode::DupW),
        _ => Err(invalid("duplicate", dt)),
    }
}

/// Indexed element read, keyed by the iterable's type
pub(super) fn read_indexed(iterable: DataType) -> Result<Opcode, CodeGenError> {
    match iterable {
        DataType::ArrayUb | DataType::ArrayB | DataType::Str | DataType::StrS => {
            Ok(Opcode::ReadIndexedVarByte)
        }
        DataType::ArrayUw | DataType::ArrayW => Ok(Opcode::ReadIndexedVarWord),
        DataType::ArrayF => Ok(Opcode::ReadIndexedVarFloat),
        _ => Err(invalid("indexed read", iterable)),
    }
}

pub(super) fn write_indexed(iterable: DataType) -> Result<Opcode, CodeGenError> {
    match iterable {
        DataType::ArrayUb | DataType::ArrayB | DataType::Str | DataType::StrS => {
            Ok(Opcode::WriteIndexedVarByte)
        }
        DataType::ArrayUw | DataType::ArrayW => Ok(Opcode::WriteIndexedVarWord),
        DataType::ArrayF => Ok(Opcode::WriteIndexedVarFloat),
        _ => Err(invalid("indexed write", iterable)),
    }
}

pub(super) fn inc_var(dt: DataType) -> Result<Opcode, CodeGenError> {
    match dt {
        DataType::UByte => Ok(Opcode::IncVarUb),
        DataType::Byte => Ok(Opcode::IncVarB),
        DataType::UWord => Ok(Opcode::IncVarUw),
        DataType::Word => Ok(Opcode::IncVarW),
        DataType::Float => Ok(Opcode::IncVarF),
        _ => Err(invalid("increment", dt)),
    }
}

pub(super) fn dec_var(dt: DataType) -> Result<Opcode, CodeGenError> {
    match dt {
        DataType::UByte => Ok(Opcode::DecVarUb),
        DataType::Byte => Ok(Opcode::DecVarB),
        DataType::UWord => Ok(Opcode::DecVarUw),
        DataType::Word => Ok(Opcode::DecVarW),
        DataType::Float => Ok(Opcode::DecVarF),
        _ => Err(invalid("decrement", dt)),
    }
}

pub(super) fn inc_indexed(iterable: DataType) -> Result<Opcode, CodeGenError> {
    match iterable {
        DataType::ArrayUb => Ok(Opcode::IncIndexedVarUb),
        DataType::ArrayB => Ok(Opcode::IncIndexedVarB),
        DataType::ArrayUw => Ok(Opcode::IncIndexedVarUw),
        DataType::ArrayW => Ok(Opcode::IncIndexedVarW),
        DataType::ArrayF => Ok(Opcode::IncIndexedVarFloat),
        _ => Err(invalid("indexed increment", iterable)),
    }
}

pub(super) fn dec_indexed(iterable: DataType) -> Result<Opcode, CodeGenError> {
    match iterable {
        DataType::ArrayUb => Ok(Opcode::DecIndexedVarUb),
        DataType::ArrayB => Ok(Opcode::DecIndexedVarB),
        DataType::ArrayUw => Ok(Opcode::DecIndexedVarUw),
        DataType::ArrayW => Ok(Opcode::DecIndexedVarW),
        DataType::ArrayF => Ok(Opcode::DecIndexedVarFloat),
        _ => Err(invalid("indexed decrement", iterable)),
    }
}

/// Compare top of stack against an immediate, setting the status flags
pub(super) fn compare(dt: DataType) -> Result<Opcode, CodeGenError> {
    match dt {
        DataType::UByte => Ok(Opcode::CmpUb),
        DataType::Byte => Ok(Opcode::CmpB),
        DataType::UWord => Ok(Opcode::CmpUw),
        DataType::Word => Ok(Opcode::CmpW),
        _ => Err(invalid("compare", dt)),
    }
}

/// Binary operator on two values of the same type `dt`
pub(super) fn binary(op: BinaryOperator, dt: DataType) -> Result<Opcode, CodeGenError> {
    use BinaryOperator as B;
    use DataType as T;
    use Opcode as O;

    if !dt.is_numeric() {
        return Err(CodeGenError::NonNumeric(dt));
    }
    let opcode = match (op, dt) {
        (B::Add, T::UByte) => O::AddUb,
        (B::Add, T::Byte) => O::AddB,
        (B::Add, T::UWord) => O::AddUw,
        (B::Add, T::Word) => O::AddW,
        (B::Add, T::Float) => O::AddF,
        (B::Sub, T::UByte) => O::SubUb,
        (B::Sub, T::Byte) => O::SubB,
        (B::Sub, T::UWord) => O::SubUw,
        (B::Sub, T::Word) => O::SubW,
        (B::Sub, T::Float) => O::SubF,
        (B::Mul, T::UByte) => O::MulUb,
        (B::Mul, T::Byte) => O::MulB,
        (B::Mul, T::UWord) => O::MulUw,
        (B::Mul, T::Word) => O::MulW,
        (B::Mul, T::Float) => O::MulF,
        (B::Div, T::UByte) => O::IdivUb,
        (B::Div, T::Byte) => O::IdivB,
        (B::Div, T::UWord) => O::IdivUw,
        (B::Div, T::Word) => O::IdivW,
        (B::Div, T::Float) => O::DivF,
        // remainder is only defined for unsigned integers
        (B::Remainder, T::UByte) => O::RemainderUb,
        (B::Remainder, T::UWord) => O::RemainderUw,
        // power is only defined for floats
        (B::Pow, T::Float) => O::PowF,
        (B::BitAnd, _) if dt.is_byte() => O::BitandByte,
        (B::BitAnd, _) if dt.is_word() => O::BitandWord,
        (B::BitOr, _) if dt.is_byte() => O::BitorByte,
        (B::BitOr, _) if dt.is_word() => O::BitorWord,
        (B::BitXor, _) if dt.is_byte() => O::BitxorByte,
        (B::BitXor, _) if dt.is_word() => O::BitxorWord,
        (B::And, _) if dt.is_byte() => O::AndByte,
        (B::And, _) if dt.is_word() => O::AndWord,
        (B::Or, _) if dt.is_byte() => O::OrByte,
        (B::Or, _) if dt.is_word() => O::OrWord,
        (B::Xor, _) if dt.is_byte() => O::XorByte,
        (B::Xor, _) if dt.is_word() => O::XorWord,
        (B::Less, T::UByte) => O::LessUb,
        (B::Less, T::Byte) => O::LessB,
        (B::Less, T::UWord) => O::LessUw,
        (B::Less, T::Word) => O::LessW,
        (B::Less, T::Float) => O::LessF,
        (B::Greater, T::UByte) => O::GreaterUb,
        (B::Greater, T::Byte) => O::GreaterB,
        (B::Greater, T::UWord) => O::GreaterUw,
        (B::Greater, T::Word) => O::GreaterW,
        (B::Greater, T::Float) => O::GreaterF,
        (B::LessEq, T::UByte) => O::LesseqUb,
        (B::LessEq, T::Byte) => O::LesseqB,
        (B::LessEq, T::UWord) => O::LesseqUw,
        (B::LessEq, T::Word) => O::LesseqW,
        (B::LessEq, T::Float) => O::LesseqF,
        (B::GreaterEq, T::UByte) => O::GreatereqUb,
        (B::GreaterEq, T::Byte) => O::GreatereqB,
        (B::GreaterEq, T::UWord) => O::GreatereqUw,
        (B::GreaterEq, T::Word) => O::GreatereqW,
        (B::GreaterEq, T::Float) => O::GreatereqF,
        (B::Equal, _) if dt.is_byte() => O::EqualByte,
        (B::Equal, _) if dt.is_word() => O::EqualWord,
        (B::Equal, T::Float) => O::EqualF,
        (B::NotEqual, _) if dt.is_byte() => O::NotequalByte,
        (B::NotEqual, _) if dt.is_word() => O::NotequalWord,
        (B::NotEqual, T::Float) => O::NotequalF,
        _ => return Err(invalid(op.symbol(), dt)),
    };
    Ok(opcode)
}

/// A single one-bit shift, used to expand `<<` and `>>` by a constant
pub(super) fn shift_step(op: BinaryOperator, dt: DataType) -> Result<Opcode, CodeGenError> {
    match (op, dt) {
        (BinaryOperator::ShiftLeft, _) if dt.is_byte() => Ok(Opcode::ShiftedlByte),
        (BinaryOperator::ShiftLeft, _) if dt.is_word() => Ok(Opcode::ShiftedlWord),
        (BinaryOperator::ShiftRight, DataType::UByte) => Ok(Opcode::ShiftedrUbyte),
        (BinaryOperator::ShiftRight, DataType::Byte) => Ok(Opcode::ShiftedrSbyte),
        (BinaryOperator::ShiftRight, DataType::UWord) => Ok(Opcode::ShiftedrUword),
        (BinaryOperator::ShiftRight, DataType::Word) => Ok(Opcode::ShiftedrSword),
        _ => Err(invalid(op.symbol(), dt)),
    }
}

/// In-place shift or rotate builtin (`lsl`, `ror2`, ...) by its name
pub(super) fn shift_in_place(function: &str, dt: DataType) -> Result<Opcode, CodeGenError> {
    let opcode = match (function, dt) {
        ("lsl", _) if dt.is_byte() => Opcode::ShlByte,
        ("lsl", _) if dt.is_word() => Opcode::ShlWord,
        ("lsr", DataType::UByte) => Opcode::ShrUbyte,
        ("lsr", DataType::Byte) => Opcode::ShrSbyte,
        ("lsr", DataType::UWord) => Opcode::ShrUword,
        ("lsr", DataType::Word) => Opcode::ShrSword,
        ("rol", _) if dt.is_byte() => Opcode::RolByte,
        ("rol", _) if dt.is_word() => Opcode::RolWord,
        ("ror", _) if dt.is_byte() => Opcode::RorByte,
        ("ror", _) if dt.is_word() => Opcode::RorWord,
        ("rol2", _) if dt.is_byte() => Opcode::Rol2Byte,
        ("rol2", _) if dt.is_word() => Opcode::Rol2Word,
        ("ror2", _) if dt.is_byte() => Opcode::Ror2Byte,
        ("ror2", _) if dt.is_word() => Opcode::Ror2Word,
        _ => return Err(invalid("in-place shift", dt)),
    };
    Ok(opcode)
}

/// Unary operator; `+` has no opcode
pub(super) fn prefix(op: PrefixOperator, dt: DataType) -> Result<Option<Opcode>, CodeGenError> {
    let opcode = match (op, dt) {
        (PrefixOperator::Plus, _) => return Ok(None),
        (PrefixOperator::Minus, DataType::Byte) => Opcode::NegB,
        (PrefixOperator::Minus, DataType::Word) => Opcode::NegW,
        (PrefixOperator::Minus, DataType::Float) => Opcode::NegF,
        (PrefixOperator::Invert, _) if dt.is_byte() => Opcode::InvByte,
        (PrefixOperator::Invert, _) if dt.is_word() => Opcode::InvWord,
        (PrefixOperator::Not, _) if dt.is_byte() => Opcode::NotByte,
        (PrefixOperator::Not, _) if dt.is_word() => Opcode::NotWord,
        (PrefixOperator::Minus, _) => return Err(invalid("negation", dt)),
        (PrefixOperator::Invert, _) => return Err(invalid("~", dt)),
        (PrefixOperator::Not, _) => return Err(invalid("not", dt)),
    };
    Ok(Some(opcode))
}

/// Cast between numeric types in either direction; `None` for identity
pub(super) fn cast(from: DataType, to: DataType) -> Result<Option<Opcode>, CodeGenError> {
    use DataType as T;
    use Opcode as O;

    if !from.is_numeric() {
        return Err(CodeGenError::NonNumeric(from));
    }
    if !to.is_numeric() {
        return Err(CodeGenError::NonNumeric(to));
    }
    let opcode = match (from, to) {
        _ if from == to => return Ok(None),
        (T::UByte, T::Byte) => O::CastUbToB,
        (T::UByte, T::UWord) => O::CastUbToUw,
        (T::UByte, T::Word) => O::CastUbToW,
        (T::UByte, T::Float) => O::CastUbToF,
        (T::Byte, T::UByte) => O::CastBToUb,
        (T::Byte, T::UWord) => O::CastBToUw,
        (T::Byte, T::Word) => O::CastBToW,
        (T::Byte, T::Float) => O::CastBToF,
        (T::UWord, T::UByte) => O::CastUwToUb,
        (T::UWord, T::Byte) => O::CastUwToB,
        (T::UWord, T::Word) => O::CastUwToW,
        (T::UWord, T::Float) => O::CastUwToF,
        (T::Word, T::UByte) => O::CastWToUb,
        (T::Word, T::Byte) => O::CastWToB,
        (T::Word, T::UWord) => O::CastWToUw,
        (T::Word, T::Float) => O::CastWToF,
        (T::Float, T::UByte) => O::CastFToUb,
        (T::Float, T::Byte) => O::CastFToB,
        (T::Float, T::UWord) => O::CastFToUw,
        (T::Float, T::Word) => O::CastFToW,
        _ => return Err(invalid("cast", to)),
    };
    Ok(Some(opcode))
}

/// Branch opcode for a status flag condition, or its complement
pub(super) fn branch(condition: BranchCondition, complement: bool) -> Opcode {
    use BranchCondition as C;
    match (condition, complement) {
        (C::Cs, false) | (C::Cc, true) => Opcode::Bcs,
        (C::Cc, false) | (C::Cs, true) => Opcode::Bcc,
        (C::Eq | C::Z, false) | (C::Ne | C::Nz, true) => Opcode::Bz,
        (C::Ne | C::Nz, false) | (C::Eq | C::Z, true) => Opcode::Bnz,
        (C::Vs, false) | (C::Vc, true) => Opcode::Bvs,
        (C::Vc, false) | (C::Vs, true) => Opcode::Bvc,
        (C::Mi | C::Neg, false) | (C::Pl | C::Pos, true) => Opcode::Bneg,
        (C::Pl | C::Pos, false) | (C::Mi | C::Neg, true) => Opcode::Bpos,
    }
}

/// Jump taken when the popped condition value is zero
pub(super) fn jump_if_zero(dt: DataType) -> Result<Opcode, CodeGenError> {
    match dt {
        _ if dt.is_byte() => Ok(Opcode::Jz),
        _ if dt.is_word() => Ok(Opcode::Jzw),
        _ => Err(invalid("condition", dt)),
    }
}

pub(super) fn jump_if_nonzero(dt: DataType) -> Result<Opcode, CodeGenError> {
    match dt {
        _ if dt.is_byte() => Ok(Opcode::Jnz),
        _ if dt.is_word() => Ok(Opcode::Jnzw),
        _ => Err(invalid("condition", dt)),
    }
}

/// Pop a word into a register pair; `None` for single registers
pub(super) fn pop_register_pair(pair: RegisterOrPair) -> Option<Opcode> {
    match pair {
        RegisterOrPair::AX => Some(Opcode::PopRegaxWord),
        RegisterOrPair::AY => Some(Opcode::PopRegayWord),
        RegisterOrPair::XY => Some(Opcode::PopRegxyWord),
        RegisterOrPair::A | RegisterOrPair::X | RegisterOrPair::Y => None,
    }
}

pub(super) fn push_register_pair(pair: RegisterOrPair) -> Option<Opcode> {
    match pair {
        RegisterOrPair::AX => Some(Opcode::PushRegaxWord),
        RegisterOrPair::AY => Some(Opcode::PushRegayWord),
        RegisterOrPair::XY => Some(Opcode::PushRegxyWord),
        RegisterOrPair::A | RegisterOrPair::X | RegisterOrPair::Y => None,
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
    fn test_arithmetic_total_over_numeric_types() {
        for op in [
            BinaryOperator::Add,
            BinaryOperator::Sub,
            BinaryOperator::Mul,
            BinaryOperator::Div,
            BinaryOperator::Less,
            BinaryOperator::Equal,
        ] {
            for dt in NUMERIC {
                assert!(binary(op, dt).is_ok(), "{op} {dt}");
            }
        }
        assert_eq!(binary(BinaryOperator::Div, DataType::Float), Ok(Opcode::DivF));
    }

    #[test]
    fn test_remainder_unsigned_only_and_power_float_only() {
        assert_eq!(
            binary(BinaryOperator::Remainder, DataType::UWord),
            Ok(Opcode::RemainderUw)
        );
        for dt in [DataType::Byte, DataType::Word, DataType::Float] {
            assert!(matches!(
                binary(BinaryOperator::Remainder, dt),
                Err(CodeGenError::InvalidType { operation: "%", .. })
            ));
        }
        assert_eq!(binary(BinaryOperator::Pow, DataType::Float), Ok(Opcode::PowF));
        for dt in [DataType::UByte, DataType::Byte, DataType::UWord, DataType::Word] {
            assert!(matches!(
                binary(BinaryOperator::Pow, dt),
                Err(CodeGenError::InvalidType { operation: "**", .. })
            ));
        }
    }

    #[test]
    fn test_bitwise_rejects_float() {
        assert!(binary(BinaryOperator::BitAnd, DataType::Float).is_err());
        assert_eq!(binary(BinaryOperator::BitAnd, DataType::Byte), Ok(Opcode::BitandByte));
    }

    #[test]
    fn test_non_numeric_rejected() {
        assert_eq!(
            binary(BinaryOperator::Add, DataType::Str),
            Err(CodeGenError::NonNumeric(DataType::Str))
        );
    }

    #[test]
    fn test_prefix_negation_undefined_for_unsigned() {
        assert_eq!(prefix(PrefixOperator::Plus, DataType::UByte), Ok(None));
        assert_eq!(prefix(PrefixOperator::Minus, DataType::Word), Ok(Some(Opcode::NegW)));
        assert!(prefix(PrefixOperator::Minus, DataType::UByte).is_err());
        assert!(prefix(PrefixOperator::Invert, DataType::Float).is_err());
    }

    #[test]
    fn test_cast_table() {
        assert_eq!(cast(DataType::Word, DataType::Word), Ok(None));
        assert_eq!(
            cast(DataType::Float, DataType::UByte),
            Ok(Some(Opcode::CastFToUb))
        );
        for from in NUMERIC {
            for to in NUMERIC {
                let opcode = cast(from, to).unwrap();
                assert_eq!(opcode.is_some(), from != to);
                assert!(opcode.is_none_or(|o| o.is_cast()));
            }
        }
    }

    #[test]
    fn test_branch_complements() {
        for cond in [
            BranchCondition::Cs,
            BranchCondition::Cc,
            BranchCondition::Eq,
            BranchCondition::Z,
            BranchCondition::Ne,
            BranchCondition::Nz,
            BranchCondition::Vs,
            BranchCondition::Vc,
            BranchCondition::Mi,
            BranchCondition::Neg,
            BranchCondition::Pl,
            BranchCondition::Pos,
        ] {
            assert_ne!(branch(cond, false), branch(cond, true));
            assert!(branch(cond, false).is_branch());
        }
        assert_eq!(branch(BranchCondition::Cs, true), Opcode::Bcc);
        assert_eq!(branch(BranchCondition::Z, true), Opcode::Bnz);
        assert_eq!(branch(BranchCondition::Neg, true), Opcode::Bpos);
    }

    #[test]
    fn test_iterables_push_as_addresses() {
        assert_eq!(push_var(DataType::Str), Ok(Opcode::PushAddrHeapvar));
        assert_eq!(pop_var(DataType::ArrayUb), Ok(Opcode::PopVarWord));
        assert_eq!(read_indexed(DataType::StrS), Ok(Opcode::ReadIndexedVarByte));
        assert!(inc_indexed(DataType::Str).is_err());
    }

    #[test]
    fn test_shift_in_place_respects_signedness() {
        assert_eq!(shift_in_place("lsr", DataType::Byte), Ok(Opcode::ShrSbyte));
        assert_eq!(shift_in_place("lsr", DataType::UWord), Ok(Opcode::ShrUword));
        assert_eq!(shift_in_place("rol2", DataType::Word), Ok(Opcode::Rol2Word));
        assert!(shift_in_place("lsl", DataType::Float).is_err());
    }
}
