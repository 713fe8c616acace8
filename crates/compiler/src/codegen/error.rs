//! Code generation error types.

use svm_core::{DataType, SinkError, ValueError};
use thiserror::Error;

/// Error type for lowering.
///
/// Every variant aborts the compilation; nothing is recovered and no partial
/// program is returned. `Unsupported` marks shapes that are recognised but
/// cannot be lowered yet, as opposed to programs that are simply wrong.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodeGenError {
    #[error("invalid type {datatype} for {operation}")]
    InvalidType {
        operation: &'static str,
        datatype: DataType,
    },

    #[error("non-numeric type {0} where a number is required")]
    NonNumeric(DataType),

    #[error("narrowing conversion from {from} to {to}")]
    Narrowing { from: DataType, to: DataType },

    #[error("{0} outside of a loop")]
    LoopControlOutsideLoop(&'static str),

    #[error("cannot branch to address {0}, use an absolute jump instead")]
    BranchToAddress(u16),

    #[error("invalid call or jump target '{0}'")]
    InvalidCallTarget(String),

    #[error("no syscall for builtin function '{0}'")]
    UnknownSyscall(String),

    #[error("machine subroutine '{0}' has a fixed address and cannot have a body")]
    MachineSubroutineWithBody(String),

    #[error("loop range {first}..{last} out of bounds for {datatype}")]
    LoopRange {
        first: i64,
        last: i64,
        datatype: DataType,
    },

    #[error("invalid swap: {0}")]
    InvalidSwap(&'static str),

    #[error("unsupported construct: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Structure(String),

    #[error("cannot include '{name}': {reason}")]
    Include { name: String, reason: String },

    #[error("internal error: {0}")]
    Internal(#[from] SinkError),

    #[error(transparent)]
    InvalidValue(#[from] ValueError),
}

impl CodeGenError {
    pub(super) fn structure(message: impl Into<String>) -> Self {
        CodeGenError::Structure(message.into())
    }

    pub(super) fn unsupported(message: impl Into<String>) -> Self {
        CodeGenError::Unsupported(message.into())
    }
}
