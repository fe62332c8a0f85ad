//! The virtual machine.
//!
//! Executes one entry-point function of a [`ScriptArtifact`] against a
//! [`RunContext`]. The VM owns an evaluation stack and a call-frame stack;
//! script-function calls push frames and recurse through the interpreter,
//! native calls run to completion synchronously and return a single managed
//! object or fail.
//!
//! # Failure Model
//!
//! - Script errors (bad operand types, unresolved methods, runaway call
//!   depth) propagate as [`ScriptError`]s carrying the instruction location.
//! - Structural violations - stack underflow, invalid jump targets, operand
//!   shapes disagreeing with the metadata table, stack-depth leaks across a
//!   frame - panic. They mean the compiler and VM disagree about the
//!   bytecode format, which no script author can cause or fix.

use tracing::trace;

use orogen_foundation::CodeLocation;

use crate::bytecode::opcode::OpcodeKind;
use crate::bytecode::operand::LocalIndex;
use crate::bytecode::registry::handler_for;
use crate::bytecode::ScriptArtifact;
use crate::context::RunContext;
use crate::dispatch::TypeRegistry;
use crate::error::{ScriptError, ScriptErrorKind, ScriptResult};
use crate::heap::ObjectId;

/// Maximum evaluation-stack depth.
const MAX_STACK: usize = 1024;

/// Maximum script-function call depth.
const MAX_CALL_DEPTH: usize = 64;

/// One script-function activation.
#[derive(Debug)]
struct Frame {
    /// Local variable slots; the first `params` hold the call arguments.
    locals: Vec<ObjectId>,
    /// Evaluation-stack depth at frame entry. Pops never cross it.
    base: usize,
}

/// Interpreter for compiled script functions.
pub struct Vm<'a> {
    artifact: &'a ScriptArtifact,
    types: &'a TypeRegistry,
    stack: Vec<ObjectId>,
    frames: Vec<Frame>,
    /// Relative jump requested by the current instruction's handler.
    jump: Option<i32>,
}

impl<'a> Vm<'a> {
    pub fn new(artifact: &'a ScriptArtifact, types: &'a TypeRegistry) -> Self {
        Self {
            artifact,
            types,
            stack: Vec::with_capacity(64),
            frames: Vec::new(),
            jump: None,
        }
    }

    /// The type registry native dispatch resolves against.
    pub fn types(&self) -> &'a TypeRegistry {
        self.types
    }

    /// Execute a named entry point with host-supplied arguments.
    pub fn run_entry(
        &mut self,
        name: &str,
        args: &[ObjectId],
        ctx: &mut RunContext,
    ) -> ScriptResult<ObjectId> {
        self.call_function(name, args, CodeLocation::UNKNOWN, ctx)
    }

    /// Call a script function: push a frame, interpret its block, return its
    /// result.
    ///
    /// Missing invocation arguments are padded with `null`; surplus ones are
    /// dropped. An empty block is a valid no-op returning `null`.
    pub(crate) fn call_function(
        &mut self,
        name: &str,
        args: &[ObjectId],
        location: CodeLocation,
        ctx: &mut RunContext,
    ) -> ScriptResult<ObjectId> {
        let function = self.artifact.function(name).ok_or_else(|| {
            ScriptError::new(
                ScriptErrorKind::UnknownFunction {
                    name: name.to_string(),
                },
                location,
            )
        })?;
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(ScriptError::new(
                ScriptErrorKind::CallDepthExceeded {
                    limit: MAX_CALL_DEPTH,
                },
                location,
            ));
        }

        let mut locals = vec![ctx.heap.null(); function.locals as usize];
        for (slot, arg) in locals
            .iter_mut()
            .zip(args.iter())
            .take(function.params as usize)
        {
            *slot = *arg;
        }
        self.frames.push(Frame {
            locals,
            base: self.stack.len(),
        });
        trace!(function = name, depth = self.frames.len(), "entering function");

        let result = self.interpret(name, ctx);

        let frame = self.frames.pop().expect("frame stack corrupted");
        if result.is_ok() {
            assert_eq!(
                self.stack.len(),
                frame.base,
                "function {name:?} left the evaluation stack unbalanced"
            );
        } else {
            // A script error unwinds this activation; discard its leftovers.
            self.stack.truncate(frame.base);
        }
        result
    }

    /// Interpreter loop for the current frame's block.
    fn interpret(&mut self, name: &str, ctx: &mut RunContext) -> ScriptResult<ObjectId> {
        let block = &self
            .artifact
            .function(name)
            .expect("function vanished mid-call")
            .block;
        let base = self.current_frame().base;

        let mut ip = 0usize;
        while let Some(instruction) = block.get(ip) {
            let metadata = instruction.kind.metadata();
            assert_eq!(
                instruction.operands.len(),
                metadata.operand_count,
                "opcode {:?} carries {} operands, expected {}",
                instruction.kind,
                instruction.operands.len(),
                metadata.operand_count
            );

            if instruction.kind == OpcodeKind::Return {
                return Ok(self.take_return_value(base));
            }

            handler_for(instruction.kind)(instruction, self, ctx)?;

            match self.jump.take() {
                Some(offset) => {
                    let target = ip as i64 + offset as i64;
                    assert!(
                        target >= 0 && (target as usize) < block.len(),
                        "jump from {ip} by {offset} escapes block of {} instructions",
                        block.len()
                    );
                    ip = target as usize;
                }
                None => ip += 1,
            }
        }

        // Falling off the end is equivalent to `Return` with no value.
        Ok(self.take_return_value(base))
    }

    /// Pop the frame's return value, enforcing stack balance.
    fn take_return_value(&mut self, base: usize) -> ObjectId {
        if self.stack.len() > base {
            let value = self.stack.pop().expect("stack emptied under us");
            assert_eq!(
                self.stack.len(),
                base,
                "return left extra values on the evaluation stack"
            );
            value
        } else {
            // Void return; callers receive the interned null.
            ObjectId::NULL
        }
    }

    fn current_frame(&self) -> &Frame {
        self.frames.last().expect("no active call frame")
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("no active call frame")
    }

    /// Push a value onto the evaluation stack.
    pub(crate) fn push(&mut self, value: ObjectId, location: CodeLocation) -> ScriptResult<()> {
        if self.stack.len() >= MAX_STACK {
            return Err(ScriptError::new(
                ScriptErrorKind::StackLimit { limit: MAX_STACK },
                location,
            ));
        }
        self.stack.push(value);
        Ok(())
    }

    /// Pop the top value.
    ///
    /// # Panics
    ///
    /// Panics on underflow - popping past the current frame's base means the
    /// compiler emitted unbalanced bytecode.
    pub(crate) fn pop(&mut self) -> ObjectId {
        assert!(
            self.stack.len() > self.current_frame().base,
            "stack underflow: tried to pop past the frame base"
        );
        self.stack.pop().expect("stack emptied under us")
    }

    /// Read the top value without popping.
    ///
    /// # Panics
    ///
    /// Panics when the current frame has nothing on the stack.
    pub(crate) fn peek(&self) -> ObjectId {
        assert!(
            self.stack.len() > self.current_frame().base,
            "stack underflow: tried to peek past the frame base"
        );
        *self.stack.last().expect("stack emptied under us")
    }

    /// Read a local slot.
    ///
    /// # Panics
    ///
    /// Panics if the slot index exceeds the function's declared local count.
    pub(crate) fn load_local(&self, local: LocalIndex) -> ObjectId {
        let frame = self.current_frame();
        *frame.locals.get(local.index()).unwrap_or_else(|| {
            panic!(
                "local slot {} out of range (function has {})",
                local.index(),
                frame.locals.len()
            )
        })
    }

    /// Write a local slot.
    ///
    /// # Panics
    ///
    /// Panics if the slot index exceeds the function's declared local count.
    pub(crate) fn store_local(&mut self, local: LocalIndex, value: ObjectId) {
        let frame = self.current_frame_mut();
        let count = frame.locals.len();
        match frame.locals.get_mut(local.index()) {
            Some(slot) => *slot = value,
            None => panic!(
                "local slot {} out of range (function has {count})",
                local.index()
            ),
        }
    }

    /// Ask the interpreter loop to jump relative to the current instruction.
    pub(crate) fn request_jump(&mut self, offset: i32) {
        self.jump = Some(offset);
    }
}

#[cfg(test)]
mod tests;
