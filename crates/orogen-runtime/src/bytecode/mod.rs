//! Compiled script representation.
//!
//! The textual front end is an external collaborator; what this engine
//! consumes is its output - a [`ScriptArtifact`] of named functions, each a
//! [`CodeBlock`] of location-tagged instructions. Opcodes are data, not
//! behavior: their operand shapes live in a metadata table and their
//! execution logic in a handler registry, both resolved in O(1) at run time.
//!
//! # Modules
//!
//! - [`operand`] - Operand encoding and typed decode helpers
//! - [`opcode`] - Opcode kinds, instructions, metadata
//! - [`block`] - Code blocks, script functions, artifacts
//! - [`registry`] - Metadata and handler jump tables
//! - [`handlers`] - One execution handler per opcode
//! - [`serial`] - Binary artifact persistence

pub mod block;
pub mod handlers;
pub mod opcode;
pub mod operand;
pub mod registry;
pub mod serial;

pub use block::{CodeBlock, ScriptArtifact, ScriptFunction};
pub use opcode::{Instruction, OpcodeKind, OpcodeMetadata};
pub use operand::{BinaryOp, Literal, LocalIndex, Operand, UnaryOp};
pub use serial::{decode_script, encode_script};

/// Names of the entry points the generator recognizes.
pub const ENTRY_ARGS: &str = "args";
pub const ENTRY_WIDTH: &str = "width";
pub const ENTRY_HEIGHT: &str = "height";
pub const ENTRY_MAIN: &str = "main";
