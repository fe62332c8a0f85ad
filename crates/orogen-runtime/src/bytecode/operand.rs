//! Operand encoding for instructions.
//!
//! Operands carry everything an opcode needs beyond its kind: immediate
//! literals, local slot indices, jump offsets, operator selectors, and
//! method references for native dispatch.
//!
//! The decode helpers panic on a shape mismatch. Operand shapes are fixed by
//! the opcode metadata table and validated when a block executes; a handler
//! seeing the wrong operand variant means the compiler and runtime disagree
//! about the format - a pairing bug, not bad script input.

use serde::{Deserialize, Serialize};

use crate::dispatch::MethodKind;

/// Index of a local variable slot within one call frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalIndex(u32);

impl LocalIndex {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An immediate value embedded in an instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Boolean(bool),
    Number(f64),
    Str(String),
}

/// Binary operator selector for the `BinaryOp` opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// Unary operator selector for the `UnaryOp` opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Operand variants for instructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// Immediate literal value.
    Literal(Literal),

    /// Local variable slot in the current frame.
    Local(LocalIndex),

    /// Relative jump offset, in instructions, from the jump instruction.
    Offset(i32),

    /// Binary operator selector.
    Binary(BinaryOp),

    /// Unary operator selector.
    Unary(UnaryOp),

    /// Script-function name for `CallFunction`.
    Name(String),

    /// Native method reference for `CallNative`.
    ///
    /// `type_name` names the dispatch type for static calls; instance calls
    /// dispatch on the receiver's runtime type and keep `type_name` for
    /// diagnostics only.
    Method {
        type_name: String,
        method: String,
        kind: MethodKind,
    },

    /// Call argument count.
    Argc(u32),
}

/// Decode a literal operand.
pub fn operand_literal(operand: &Operand) -> &Literal {
    match operand {
        Operand::Literal(literal) => literal,
        other => panic!("expected Literal operand, got {other:?}"),
    }
}

/// Decode a local-slot operand.
pub fn operand_local(operand: &Operand) -> LocalIndex {
    match operand {
        Operand::Local(local) => *local,
        other => panic!("expected Local operand, got {other:?}"),
    }
}

/// Decode a jump-offset operand.
pub fn operand_offset(operand: &Operand) -> i32 {
    match operand {
        Operand::Offset(offset) => *offset,
        other => panic!("expected Offset operand, got {other:?}"),
    }
}

/// Decode a binary-operator operand.
pub fn operand_binary(operand: &Operand) -> BinaryOp {
    match operand {
        Operand::Binary(op) => *op,
        other => panic!("expected Binary operand, got {other:?}"),
    }
}

/// Decode a unary-operator operand.
pub fn operand_unary(operand: &Operand) -> UnaryOp {
    match operand {
        Operand::Unary(op) => *op,
        other => panic!("expected Unary operand, got {other:?}"),
    }
}

/// Decode a function-name operand.
pub fn operand_name(operand: &Operand) -> &str {
    match operand {
        Operand::Name(name) => name,
        other => panic!("expected Name operand, got {other:?}"),
    }
}

/// Decode a method-reference operand.
pub fn operand_method(operand: &Operand) -> (&str, &str, MethodKind) {
    match operand {
        Operand::Method {
            type_name,
            method,
            kind,
        } => (type_name, method, *kind),
        other => panic!("expected Method operand, got {other:?}"),
    }
}

/// Decode an argument-count operand.
pub fn operand_argc(operand: &Operand) -> usize {
    match operand {
        Operand::Argc(count) => *count as usize,
        other => panic!("expected Argc operand, got {other:?}"),
    }
}
