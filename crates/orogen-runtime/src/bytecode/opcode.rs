//! Opcode definitions and metadata.
//!
//! The instruction set is the closed contract between the compiler front end
//! and this VM. Opcode semantics are defined by the metadata table and the
//! handler registry, not by a monolithic match in the interpreter loop.
//!
//! # Design Rules
//!
//! 1. **Opcodes are data** - no domain logic lives in the enum
//! 2. **Explicit ordering** - never rely on discriminant order
//! 3. **Fail loudly** - malformed operand shapes are assertion failures

use serde::{Deserialize, Serialize};

use orogen_foundation::CodeLocation;

use super::operand::Operand;
use super::registry::metadata_for;

/// Instruction kinds understood by the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OpcodeKind {
    // === Stack ===
    /// Pushes the literal in operand[0] onto the evaluation stack.
    PushLiteral,
    /// Pushes the value of the local slot in operand[0].
    LoadLocal,
    /// Pops the top value into the local slot in operand[0].
    StoreLocal,
    /// Duplicates the top stack value.
    Dup,
    /// Discards the top stack value.
    Pop,

    // === Control Flow ===
    /// Unconditional relative jump by operand[0] instructions.
    Jump,
    /// Pops a Boolean; jumps by operand[0] when it is false.
    Branch,

    // === Operators ===
    /// Pops two values and applies the binary operator in operand[0].
    BinaryOp,
    /// Pops one value and applies the unary operator in operand[0].
    UnaryOp,

    // === Calls ===
    /// Dispatches the native method in operand[0] with operand[1] arguments.
    ///
    /// Arguments are popped in reverse push order; instance methods then pop
    /// the receiver beneath them.
    CallNative,
    /// Calls the script function named in operand[0] with operand[1]
    /// arguments, pushing a new call frame.
    CallFunction,

    // === Structural ===
    /// Terminates the current function, returning the top stack value if
    /// one was produced, `null` otherwise.
    Return,
}

/// A single instruction: kind, operands, and the script position it was
/// compiled from. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// The operation to perform.
    pub kind: OpcodeKind,
    /// Positional operands; shape fixed by the opcode metadata.
    pub operands: Vec<Operand>,
    /// Source position for error attribution.
    pub location: CodeLocation,
}

impl Instruction {
    /// Create an instruction.
    ///
    /// Operand ordering must match the opcode metadata for `kind`.
    pub fn new(kind: OpcodeKind, operands: Vec<Operand>, location: CodeLocation) -> Self {
        Self {
            kind,
            operands,
            location,
        }
    }
}

/// Static metadata for an opcode.
#[derive(Debug, Clone)]
pub struct OpcodeMetadata {
    /// Exact number of operands the opcode carries.
    pub operand_count: usize,
}

impl OpcodeKind {
    /// Metadata for this opcode kind.
    ///
    /// # Panics
    ///
    /// Panics if the kind is missing from the registry spec table.
    pub fn metadata(self) -> &'static OpcodeMetadata {
        metadata_for(self)
    }
}
