//! The instruction set of the stack machine
//!
//! Opcodes are declared once in the `opcodes!` table below; the macro derives
//! the enum, its canonical upper-case mnemonic (used for both the listing and
//! the serialized form) and the reverse lookup.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opcodes {
    ($($variant:ident => $name:literal,)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Opcode {
            $(
                #[serde(rename = $name)]
                $variant,
            )*
        }

        impl Opcode {
            pub const ALL: &'static [Opcode] = &[$(Opcode::$variant,)*];

            /// Mnemonic as it appears in listings
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$variant => $name,)*
                }
            }

            pub fn from_mnemonic(name: &str) -> Option<Opcode> {
                match name {
                    $($name => Some(Opcode::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

opcodes! {
    // Stack
    PushByte => "PUSH_BYTE",
    PushWord => "PUSH_WORD",
    PushFloat => "PUSH_FLOAT",
    PushVarByte => "PUSH_VAR_BYTE",
    PushVarWord => "PUSH_VAR_WORD",
    PushVarFloat => "PUSH_VAR_FLOAT",
    PushAddrHeapvar => "PUSH_ADDR_HEAPVAR",
    PushMemUb => "PUSH_MEM_UB",
    PushMemB => "PUSH_MEM_B",
    PushMemUw => "PUSH_MEM_UW",
    PushMemW => "PUSH_MEM_W",
    PushMemFloat => "PUSH_MEM_FLOAT",
    PushMemread => "PUSH_MEMREAD",
    PushRegaxWord => "PUSH_REGAX_WORD",
    PushRegayWord => "PUSH_REGAY_WORD",
    PushRegxyWord => "PUSH_REGXY_WORD",
    DupB => "DUP_B",
    DupW => "DUP_W",
    DiscardByte => "DISCARD_BYTE",
    DiscardWord => "DISCARD_WORD",
    DiscardFloat => "DISCARD_FLOAT",
    PopVarByte => "POP_VAR_BYTE",
    PopVarWord => "POP_VAR_WORD",
    PopVarFloat => "POP_VAR_FLOAT",
    PopMemByte => "POP_MEM_BYTE",
    PopMemWord => "POP_MEM_WORD",
    PopMemFloat => "POP_MEM_FLOAT",
    PopMemwrite => "POP_MEMWRITE",
    PopRegaxWord => "POP_REGAX_WORD",
    PopRegayWord => "POP_REGAY_WORD",
    PopRegxyWord => "POP_REGXY_WORD",
    // Indexed access
    ReadIndexedVarByte => "READ_INDEXED_VAR_BYTE",
    ReadIndexedVarWord => "READ_INDEXED_VAR_WORD",
    ReadIndexedVarFloat => "READ_INDEXED_VAR_FLOAT",
    WriteIndexedVarByte => "WRITE_INDEXED_VAR_BYTE",
    WriteIndexedVarWord => "WRITE_INDEXED_VAR_WORD",
    WriteIndexedVarFloat => "WRITE_INDEXED_VAR_FLOAT",
    // Increment / decrement in place
    IncVarUb => "INC_VAR_UB",
    IncVarB => "INC_VAR_B",
    IncVarUw => "INC_VAR_UW",
    IncVarW => "INC_VAR_W",
    IncVarF => "INC_VAR_F",
    DecVarUb => "DEC_VAR_UB",
    DecVarB => "DEC_VAR_B",
    DecVarUw => "DEC_VAR_UW",
    DecVarW => "DEC_VAR_W",
    DecVarF => "DEC_VAR_F",
    IncIndexedVarUb => "INC_INDEXED_VAR_UB",
    IncIndexedVarB => "INC_INDEXED_VAR_B",
    IncIndexedVarUw => "INC_INDEXED_VAR_UW",
    IncIndexedVarW => "INC_INDEXED_VAR_W",
    IncIndexedVarFloat => "INC_INDEXED_VAR_FLOAT",
    DecIndexedVarUb => "DEC_INDEXED_VAR_UB",
    DecIndexedVarB => "DEC_INDEXED_VAR_B",
    DecIndexedVarUw => "DEC_INDEXED_VAR_UW",
    DecIndexedVarW => "DEC_INDEXED_VAR_W",
    DecIndexedVarFloat => "DEC_INDEXED_VAR_FLOAT",
    IncMemory => "INC_MEMORY",
    DecMemory => "DEC_MEMORY",
    PopIncMemory => "POP_INC_MEMORY",
    PopDecMemory => "POP_DEC_MEMORY",
    // Arithmetic
    AddUb => "ADD_UB",
    AddB => "ADD_B",
    AddUw => "ADD_UW",
    AddW => "ADD_W",
    AddF => "ADD_F",
    SubUb => "SUB_UB",
    SubB => "SUB_B",
    SubUw => "SUB_UW",
    SubW => "SUB_W",
    SubF => "SUB_F",
    MulUb => "MUL_UB",
    MulB => "MUL_B",
    MulUw => "MUL_UW",
    MulW => "MUL_W",
    MulF => "MUL_F",
    IdivUb => "IDIV_UB",
    IdivB => "IDIV_B",
    IdivUw => "IDIV_UW",
    IdivW => "IDIV_W",
    DivF => "DIV_F",
    RemainderUb => "REMAINDER_UB",
    RemainderUw => "REMAINDER_UW",
    PowF => "POW_F",
    NegB => "NEG_B",
    NegW => "NEG_W",
    NegF => "NEG_F",
    AbsB => "ABS_B",
    AbsW => "ABS_W",
    AbsF => "ABS_F",
    // Bitwise and logical
    BitandByte => "BITAND_BYTE",
    BitandWord => "BITAND_WORD",
    BitorByte => "BITOR_BYTE",
    BitorWord => "BITOR_WORD",
    BitxorByte => "BITXOR_BYTE",
    BitxorWord => "BITXOR_WORD",
    AndByte => "AND_BYTE",
    AndWord => "AND_WORD",
    OrByte => "OR_BYTE",
    OrWord => "OR_WORD",
    XorByte => "XOR_BYTE",
    XorWord => "XOR_WORD",
    InvByte => "INV_BYTE",
    InvWord => "INV_WORD",
    NotByte => "NOT_BYTE",
    NotWord => "NOT_WORD",
    Msb => "MSB",
    Mkword => "MKWORD",
    // Shifts and rotates
    ShiftedlByte => "SHIFTEDL_BYTE",
    ShiftedlWord => "SHIFTEDL_WORD",
    ShiftedrUbyte => "SHIFTEDR_UBYTE",
    ShiftedrSbyte => "SHIFTEDR_SBYTE",
    ShiftedrUword => "SHIFTEDR_UWORD",
    ShiftedrSword => "SHIFTEDR_SWORD",
    ShlByte => "SHL_BYTE",
    ShlWord => "SHL_WORD",
    ShrUbyte => "SHR_UBYTE",
    ShrSbyte => "SHR_SBYTE",
    ShrUword => "SHR_UWORD",
    ShrSword => "SHR_SWORD",
    RolByte => "ROL_BYTE",
    RolWord => "ROL_WORD",
    RorByte => "ROR_BYTE",
    RorWord => "ROR_WORD",
    Rol2Byte => "ROL2_BYTE",
    Rol2Word => "ROL2_WORD",
    Ror2Byte => "ROR2_BYTE",
    Ror2Word => "ROR2_WORD",
    // Comparison
    LessUb => "LESS_UB",
    LessB => "LESS_B",
    LessUw => "LESS_UW",
    LessW => "LESS_W",
    LessF => "LESS_F",
    GreaterUb => "GREATER_UB",
    GreaterB => "GREATER_B",
    GreaterUw => "GREATER_UW",
    GreaterW => "GREATER_W",
    GreaterF => "GREATER_F",
    LesseqUb => "LESSEQ_UB",
    LesseqB => "LESSEQ_B",
    LesseqUw => "LESSEQ_UW",
    LesseqW => "LESSEQ_W",
    LesseqF => "LESSEQ_F",
    GreatereqUb => "GREATEREQ_UB",
    GreatereqB => "GREATEREQ_B",
    GreatereqUw => "GREATEREQ_UW",
    GreatereqW => "GREATEREQ_W",
    GreatereqF => "GREATEREQ_F",
    EqualByte => "EQUAL_BYTE",
    EqualWord => "EQUAL_WORD",
    EqualF => "EQUAL_F",
    NotequalByte => "NOTEQUAL_BYTE",
    NotequalWord => "NOTEQUAL_WORD",
    NotequalF => "NOTEQUAL_F",
    CmpUb => "CMP_UB",
    CmpB => "CMP_B",
    CmpUw => "CMP_UW",
    CmpW => "CMP_W",
    // Casts
    CastUbToB => "CAST_UB_TO_B",
    CastUbToUw => "CAST_UB_TO_UW",
    CastUbToW => "CAST_UB_TO_W",
    CastUbToF => "CAST_UB_TO_F",
    CastBToUb => "CAST_B_TO_UB",
    CastBToUw => "CAST_B_TO_UW",
    CastBToW => "CAST_B_TO_W",
    CastBToF => "CAST_B_TO_F",
    CastUwToUb => "CAST_UW_TO_UB",
    CastUwToB => "CAST_UW_TO_B",
    CastUwToW => "CAST_UW_TO_W",
    CastUwToF => "CAST_UW_TO_F",
    CastWToUb => "CAST_W_TO_UB",
    CastWToB => "CAST_W_TO_B",
    CastWToUw => "CAST_W_TO_UW",
    CastWToF => "CAST_W_TO_F",
    CastFToUb => "CAST_F_TO_UB",
    CastFToB => "CAST_F_TO_B",
    CastFToUw => "CAST_F_TO_UW",
    CastFToW => "CAST_F_TO_W",
    // Control flow
    Jump => "JUMP",
    Jz => "JZ",
    Jzw => "JZW",
    Jnz => "JNZ",
    Jnzw => "JNZW",
    Bcs => "BCS",
    Bcc => "BCC",
    Bz => "BZ",
    Bnz => "BNZ",
    Bvs => "BVS",
    Bvc => "BVC",
    Bneg => "BNEG",
    Bpos => "BPOS",
    Call => "CALL",
    Return => "RETURN",
    Returnfromirq => "RETURNFROMIRQ",
    Syscall => "SYSCALL",
    Nop => "NOP",
    // CPU state
    Sec => "SEC",
    Clc => "CLC",
    Sei => "SEI",
    Cli => "CLI",
    Rsave => "RSAVE",
    Rrestore => "RRESTORE",
    Rsavex => "RSAVEX",
    Rrestorex => "RRESTOREX",
    CarryToA => "CARRY_TO_A",
    // Pseudo instructions
    StartProcdef => "START_PROCDEF",
    EndProcdef => "END_PROCDEF",
    Line => "LINE",
    InlineAssembly => "INLINE_ASSEMBLY",
    IncludeFile => "INCLUDE_FILE",
    Breakpoint => "BREAKPOINT",
}

impl Opcode {
    /// Conditional branches on a CPU status flag. These take a label only;
    /// a fixed address target requires an absolute `JUMP`.
    pub fn is_branch(self) -> bool {
        matches!(
            self,
            Opcode::Bcs
                | Opcode::Bcc
                | Opcode::Bz
                | Opcode::Bnz
                | Opcode::Bvs
                | Opcode::Bvc
                | Opcode::Bneg
                | Opcode::Bpos
        )
    }

    pub fn is_jump(self) -> bool {
        self.is_branch()
            || matches!(
                self,
                Opcode::Jump | Opcode::Jz | Opcode::Jzw | Opcode::Jnz | Opcode::Jnzw
            )
    }

    pub fn is_cast(self) -> bool {
        self.mnemonic().starts_with("CAST_")
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
