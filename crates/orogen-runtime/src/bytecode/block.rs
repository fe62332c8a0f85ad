//! Code blocks, script functions, and artifacts.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::opcode::Instruction;

/// An ordered, exclusively-owned sequence of instructions.
///
/// A block owns its instructions outright - blocks are never copied and
/// instructions are never shared between blocks. Compiled fragments are
/// spliced with [`CodeBlock::move_instructions_from`], which transfers
/// ownership wholesale instead of cloning.
///
/// Once built, a block is read-only during execution. A block with zero
/// instructions is valid and executes as a no-op.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeBlock {
    instructions: Vec<Instruction>,
}

impl CodeBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one instruction, taking ownership of it.
    pub fn add_instruction(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    /// Transfer every instruction out of `other`, leaving it empty.
    ///
    /// Order is preserved: `other`'s instructions follow this block's
    /// existing ones. Used when inlining or merging compiled fragments.
    pub fn move_instructions_from(&mut self, other: &mut CodeBlock) {
        self.instructions.append(&mut other.instructions);
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Instruction at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }
}

/// One compiled script function.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptFunction {
    /// Number of invocation arguments, copied into the first `params`
    /// local slots when a frame is pushed.
    pub params: u32,
    /// Total local slot count; at least `params`.
    pub locals: u32,
    /// The function body.
    pub block: CodeBlock,
}

impl ScriptFunction {
    pub fn new(params: u32, locals: u32, block: CodeBlock) -> Self {
        assert!(
            locals >= params,
            "function declares {params} params but only {locals} locals"
        );
        Self {
            params,
            locals,
            block,
        }
    }
}

/// A complete compiled script: named functions in declaration order.
///
/// The artifact is the unit of persistence (see [`super::serial`]) and the
/// unit the generator loads. Entry points (`args`, `width`, `height`,
/// `main`) are ordinary functions found by name.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptArtifact {
    functions: IndexMap<String, ScriptFunction>,
}

impl ScriptArtifact {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a function under `name`.
    ///
    /// # Panics
    ///
    /// Panics if the name is already taken; the compiler must not emit two
    /// functions with one name.
    pub fn add_function(&mut self, name: impl Into<String>, function: ScriptFunction) {
        let name = name.into();
        let previous = self.functions.insert(name.clone(), function);
        assert!(previous.is_none(), "duplicate script function {name:?}");
    }

    pub fn function(&self, name: &str) -> Option<&ScriptFunction> {
        self.functions.get(name)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Function names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::opcode::OpcodeKind;
    use crate::bytecode::operand::{Literal, Operand};
    use orogen_foundation::CodeLocation;

    fn push_number(value: f64) -> Instruction {
        Instruction::new(
            OpcodeKind::PushLiteral,
            vec![Operand::Literal(Literal::Number(value))],
            CodeLocation::UNKNOWN,
        )
    }

    #[test]
    fn test_add_instruction_appends_in_order() {
        let mut block = CodeBlock::new();
        block.add_instruction(push_number(1.0));
        block.add_instruction(push_number(2.0));
        assert_eq!(block.len(), 2);
        let values: Vec<_> = block.iter().map(|i| i.operands[0].clone()).collect();
        assert_eq!(
            values,
            vec![
                Operand::Literal(Literal::Number(1.0)),
                Operand::Literal(Literal::Number(2.0)),
            ]
        );
    }

    #[test]
    fn test_move_instructions_drains_source() {
        let mut a = CodeBlock::new();
        a.add_instruction(push_number(1.0));
        let mut b = CodeBlock::new();
        b.add_instruction(push_number(2.0));
        b.add_instruction(push_number(3.0));
        a.move_instructions_from(&mut b);
        assert_eq!(a.len(), 3);
        assert!(b.is_empty());
        assert_eq!(
            a.get(2).unwrap().operands[0],
            Operand::Literal(Literal::Number(3.0))
        );
    }

    #[test]
    fn test_empty_block_is_valid() {
        let block = CodeBlock::new();
        assert!(block.is_empty());
        assert!(block.get(0).is_none());
    }

    #[test]
    #[should_panic(expected = "duplicate script function")]
    fn test_duplicate_function_panics() {
        let mut artifact = ScriptArtifact::new();
        artifact.add_function("main", ScriptFunction::default());
        artifact.add_function("main", ScriptFunction::default());
    }

    #[test]
    #[should_panic(expected = "params but only")]
    fn test_locals_must_cover_params() {
        ScriptFunction::new(3, 1, CodeBlock::new());
    }
}
