//! SVM Core: the data model of the stack virtual machine
//!
//! This crate holds what the compiler and the downstream loader must agree
//! on: the type lattice, immediate values, the opcode set, the syscall
//! numbering and the intermediate program format.
//!
//! # Modules
//!
//! - `datatype`: Numeric, string and array types and their widening order
//! - `value`: Typed, range-checked immediate operands
//! - `opcode`: The instruction set
//! - `syscall`: Numbered runtime services
//! - `program`: Blocks, instructions and labels (the instruction sink)

pub mod datatype;
pub mod opcode;
pub mod program;
pub mod syscall;
pub mod value;

pub use datatype::DataType;
pub use opcode::Opcode;
pub use program::{
    Entry, Instruction, IntermediateProgram, MemoryPointer, ProgramBlock, SinkError, Storage,
    Variable,
};
pub use syscall::Syscall;
pub use value::{Value, ValueError};
