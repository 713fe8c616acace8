//! The intermediate program: the instruction sink lowering writes into
//!
//! A program is an ordered list of blocks. Each block owns its variable
//! declarations, its memory-mapped names and an ordered stream of entries,
//! where an entry is either an instruction or a label definition. Labels and
//! variables are referenced symbolically by scoped name; resolving them to
//! addresses is left to the loader.
//!
//! Entries are append-only with two exceptions: the most recent instruction
//! can be removed again (`remove_last_instruction`), and consecutive `LINE`
//! markers collapse into the latest one.

use crate::datatype::DataType;
use crate::opcode::Opcode;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Misuse of the sink. These indicate a bug in the code generator, not in
/// the program being compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("no block is open")]
    NoBlock,

    #[error("no instruction to remove in block '{0}'")]
    NothingToRemove(String),

    #[error("label '{0}' defined twice")]
    DuplicateLabel(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg2: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_label2: Option<String>,
}

impl Instruction {
    pub fn new(opcode: Opcode) -> Self {
        Instruction {
            opcode,
            arg: None,
            arg2: None,
            call_label: None,
            call_label2: None,
        }
    }

    pub fn with_arg(mut self, arg: Value) -> Self {
        self.arg = Some(arg);
        self
    }

    pub fn with_arg2(mut self, arg2: Value) -> Self {
        self.arg2 = Some(arg2);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.call_label = Some(label.into());
        self
    }

    /// Secondary label slot; carries payloads such as inline assembly text
    pub fn with_label2(mut self, label: impl Into<String>) -> Self {
        self.call_label2 = Some(label.into());
        self
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        if let Some(arg) = &self.arg {
            write!(f, " {arg}")?;
        }
        if let Some(arg2) = &self.arg2 {
            write!(f, " {arg2}")?;
        }
        if let Some(label) = &self.call_label {
            write!(f, " {label}")?;
        }
        if let Some(payload) = &self.call_label2 {
            write!(f, " {payload:?}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entry {
    Instruction(Instruction),
    Label {
        name: String,
        #[serde(default)]
        subroutine: bool,
    },
}

/// How a declared variable is stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Storage {
    /// A named slot managed by the machine
    #[default]
    Plain,
    /// Folded away before lowering; never referenced by instructions
    Const,
    /// Lives at a fixed memory address
    Memory(u16),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub datatype: DataType,
    /// Element count for strings and arrays
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryPointer {
    pub name: String,
    pub address: u16,
    pub datatype: DataType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramBlock {
    pub name: String,
    pub address: Option<u16>,
    pub options: Vec<String>,
    pub variables: Vec<Variable>,
    pub memory_pointers: Vec<MemoryPointer>,
    pub entries: Vec<Entry>,
}

impl ProgramBlock {
    fn new(name: String, address: Option<u16>, options: Vec<String>) -> Self {
        ProgramBlock {
            name,
            address,
            options,
            variables: Vec::new(),
            memory_pointers: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn instructions(&self) -> impl DoubleEndedIterator<Item = &Instruction> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Instruction(ins) => Some(ins),
            Entry::Label { .. } => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntermediateProgram {
    pub name: String,
    pub load_address: Option<u16>,
    pub blocks: Vec<ProgramBlock>,
    #[serde(skip)]
    defined_labels: HashSet<String>,
}

impl IntermediateProgram {
    pub fn new(name: impl Into<String>, load_address: Option<u16>) -> Self {
        IntermediateProgram {
            name: name.into(),
            load_address,
            blocks: Vec::new(),
            defined_labels: HashSet::new(),
        }
    }

    /// Open a new block; all following output goes into it
    pub fn new_block(
        &mut self,
        name: impl Into<String>,
        address: Option<u16>,
        options: Vec<String>,
    ) {
        self.blocks.push(ProgramBlock::new(name.into(), address, options));
    }

    fn current(&mut self) -> Result<&mut ProgramBlock, SinkError> {
        self.blocks.last_mut().ok_or(SinkError::NoBlock)
    }

    /// Register a variable declaration in the current block.
    ///
    /// Memory-mapped variables become memory pointers; constants are not
    /// recorded at all since nothing may reference them.
    pub fn variable(
        &mut self,
        name: impl Into<String>,
        datatype: DataType,
        storage: Storage,
        length: Option<u16>,
    ) -> Result<(), SinkError> {
        let block = self.current()?;
        let name = name.into();
        match storage {
            Storage::Plain => block.variables.push(Variable {
                name,
                datatype,
                length,
            }),
            Storage::Memory(address) => block.memory_pointers.push(MemoryPointer {
                name,
                address,
                datatype,
            }),
            Storage::Const => {}
        }
        Ok(())
    }

    pub fn memory_pointer(
        &mut self,
        name: impl Into<String>,
        address: u16,
        datatype: DataType,
    ) -> Result<(), SinkError> {
        self.current()?.memory_pointers.push(MemoryPointer {
            name: name.into(),
            address,
            datatype,
        });
        Ok(())
    }

    pub fn instr(&mut self, instruction: Instruction) -> Result<(), SinkError> {
        self.current()?.entries.push(Entry::Instruction(instruction));
        Ok(())
    }

    /// Define a label at the current position
    pub fn label(&mut self, name: impl Into<String>, subroutine: bool) -> Result<(), SinkError> {
        let name = name.into();
        if !self.defined_labels.insert(name.clone()) {
            return Err(SinkError::DuplicateLabel(name));
        }
        self.current()?.entries.push(Entry::Label { name, subroutine });
        Ok(())
    }

    /// Stamp the source position of the code that follows
    pub fn line(&mut self, line: u32, file: &str) -> Result<(), SinkError> {
        let marker = Instruction::new(Opcode::Line).with_label(format!("{line} {file}"));
        let block = self.current()?;
        match block.entries.last_mut() {
            Some(Entry::Instruction(last)) if last.opcode == Opcode::Line => *last = marker,
            _ => block.entries.push(Entry::Instruction(marker)),
        }
        Ok(())
    }

    /// Remove the most recently emitted instruction, looking past `LINE` markers.
    ///
    /// Fails if a label was defined after that instruction: removing it would
    /// change what the label points at.
    pub fn remove_last_instruction(&mut self) -> Result<Instruction, SinkError> {
        let block = self.current()?;
        let position = block.entries.iter().rposition(|e| match e {
            Entry::Instruction(ins) => ins.opcode != Opcode::Line,
            Entry::Label { .. } => true,
        });
        match position {
            Some(pos) => match block.entries.remove(pos) {
                Entry::Instruction(ins) => Ok(ins),
                label => {
                    block.entries.insert(pos, label);
                    Err(SinkError::NothingToRemove(block.name.clone()))
                }
            },
            None => Err(SinkError::NothingToRemove(block.name.clone())),
        }
    }
}

impl fmt::Display for IntermediateProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "; program {}", self.name)?;
        if let Some(address) = self.load_address {
            write!(f, " at {}", Value::address(address))?;
        }
        writeln!(f)?;
        for block in &self.blocks {
            write!(f, "\n%block {}", block.name)?;
            if let Some(address) = block.address {
                write!(f, " {}", Value::address(address))?;
            }
            writeln!(f)?;
            if !block.options.is_empty() {
                writeln!(f, "%options {}", block.options.join(","))?;
            }
            writeln!(f, "%variables")?;
            for var in &block.variables {
                match var.length {
                    Some(len) => writeln!(f, "{} {} {}", var.name, var.datatype, len)?,
                    None => writeln!(f, "{} {}", var.name, var.datatype)?,
                }
            }
            writeln!(f, "%end_variables")?;
            writeln!(f, "%memorypointers")?;
            for ptr in &block.memory_pointers {
                writeln!(f, "{} {} {}", ptr.name, ptr.datatype, Value::address(ptr.address))?;
            }
            writeln!(f, "%end_memorypointers")?;
            writeln!(f, "%instructions")?;
            for entry in &block.entries {
                match entry {
                    Entry::Label { name, .. } => writeln!(f, "{name}:")?,
                    Entry::Instruction(ins) => writeln!(f, "    {ins}")?,
                }
            }
            writeln!(f, "%end_instructions")?;
            writeln!(f, "%end_block")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program_with_block() -> IntermediateProgram {
        let mut prog = IntermediateProgram::new("test", None);
        prog.new_block("main", None, vec![]);
        prog
    }

    #[test]
    fn test_emit_requires_block() {
        let mut prog = IntermediateProgram::new("test", None);
        assert_eq!(prog.instr(Instruction::new(Opcode::Nop)), Err(SinkError::NoBlock));
    }

    #[test]
    fn test_variables_by_storage() {
        let mut prog = program_with_block();
        prog.variable("main.x", DataType::UByte, Storage::Plain, None).unwrap();
        prog.variable("main.c", DataType::UByte, Storage::Const, None).unwrap();
        prog.variable("main.border", DataType::UByte, Storage::Memory(0xd020), None)
            .unwrap();
        let block = &prog.blocks[0];
        assert_eq!(block.variables.len(), 1);
        assert_eq!(block.memory_pointers.len(), 1);
        assert_eq!(block.memory_pointers[0].address, 0xd020);
    }

    #[test]
    fn test_remove_last_skips_line_markers() {
        let mut prog = program_with_block();
        prog.instr(Instruction::new(Opcode::PushByte).with_arg(Value::UByte(3)))
            .unwrap();
        prog.line(10, "test.p8").unwrap();
        let removed = prog.remove_last_instruction().unwrap();
        assert_eq!(removed.opcode, Opcode::PushByte);
        assert_eq!(prog.blocks[0].instructions().count(), 1);
    }

    #[test]
    fn test_remove_last_stops_at_label() {
        let mut prog = program_with_block();
        prog.instr(Instruction::new(Opcode::Nop)).unwrap();
        prog.label("main.l", false).unwrap();
        assert!(matches!(
            prog.remove_last_instruction(),
            Err(SinkError::NothingToRemove(_))
        ));
        assert_eq!(prog.blocks[0].entries.len(), 2);
    }

    #[test]
    fn test_remove_last_on_empty_block() {
        let mut prog = program_with_block();
        assert!(prog.remove_last_instruction().is_err());
    }

    #[test]
    fn test_line_markers_collapse() {
        let mut prog = program_with_block();
        prog.line(1, "a.p8").unwrap();
        prog.line(2, "a.p8").unwrap();
        let lines: Vec<_> = prog.blocks[0].instructions().collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].call_label.as_deref(), Some("2 a.p8"));
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let mut prog = program_with_block();
        prog.label("main.start", false).unwrap();
        assert_eq!(
            prog.label("main.start", false),
            Err(SinkError::DuplicateLabel("main.start".to_string()))
        );
    }

    #[test]
    fn test_listing() {
        let mut prog = program_with_block();
        prog.variable("main.x", DataType::UWord, Storage::Plain, None).unwrap();
        prog.label("main.start", true).unwrap();
        prog.instr(Instruction::new(Opcode::PushWord).with_arg(Value::UWord(1000)))
            .unwrap();
        prog.instr(Instruction::new(Opcode::PopVarWord).with_label("main.x"))
            .unwrap();
        let listing = prog.to_string();
        assert!(listing.contains("%block main"));
        assert!(listing.contains("main.x uword"));
        assert!(listing.contains("main.start:\n    PUSH_WORD $03e8\n    POP_VAR_WORD main.x"));
    }

    #[test]
    fn test_json_entries_tagged() {
        let mut prog = program_with_block();
        prog.label("main.start", false).unwrap();
        prog.instr(Instruction::new(Opcode::Return)).unwrap();
        let json = serde_json::to_string(&prog.blocks[0].entries).unwrap();
        assert_eq!(
            json,
            r#"[{"kind":"label","name":"main.start","subroutine":false},{"kind":"instruction","opcode":"RETURN"}]"#
        );
    }
}
