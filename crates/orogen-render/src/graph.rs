//! Rendering step graph construction.
//!
//! The graph is an arena: steps live in a contiguous `Vec`, slots are plain
//! integer indices, and every cross-reference (argument slot → producing
//! step) is an index into that arena. Steps can only reference slots that
//! already exist when they are appended and always allocate a fresh return
//! slot, so the step list is topologically ordered by construction and
//! cycles are structurally impossible.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use orogen_foundation::{CodeLocation, Rect, Size2D};

use crate::step::StepKind;

/// Index of a value slot in the graph's evaluation-time slot table.
///
/// A slot holds either an unresolved placeholder or, during rendering, a
/// materialized tile buffer. Slots are written by exactly one step (the one
/// that allocated them) and read by any number of later steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotIndex(u32);

impl SlotIndex {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One node of the rendering graph.
///
/// Identified implicitly by its position in the step list. `location` is the
/// script position of the native call that emitted the step, used for error
/// attribution when evaluation fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderingStep {
    /// The operation and its frozen parameters.
    pub kind: StepKind,
    /// Slots holding this step's operands; all produced by earlier steps.
    pub args: Vec<SlotIndex>,
    /// Slot receiving this step's result.
    pub ret: SlotIndex,
    /// Script position of the call that emitted the step.
    pub location: CodeLocation,
}

/// A complete deferred-rendering program for one generation run.
///
/// Built as a side effect of VM execution and consumed read-only by bounds
/// propagation and the renderer once generation is requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepGraph {
    map_size: Size2D,
    steps: Vec<RenderingStep>,
    slot_count: u32,
    outputs: IndexMap<String, SlotIndex>,
}

impl StepGraph {
    /// Create an empty graph for a map of the given size.
    pub fn new(map_size: Size2D) -> Self {
        Self {
            map_size,
            steps: Vec::new(),
            slot_count: 0,
            outputs: IndexMap::new(),
        }
    }

    /// The size of the map this graph produces.
    pub fn map_size(&self) -> Size2D {
        self.map_size
    }

    /// The full map rectangle, anchored at the origin.
    pub fn domain(&self) -> Rect {
        Rect::of_size(self.map_size)
    }

    /// Append a step, wiring `args` to existing slots and allocating a fresh
    /// return slot.
    ///
    /// # Panics
    ///
    /// Panics if an argument slot has not been produced yet or if the
    /// argument count does not match the step kind's arity. Both indicate a
    /// bug in the native function emitting the step, not bad script input.
    pub fn add_step(
        &mut self,
        kind: StepKind,
        args: Vec<SlotIndex>,
        location: CodeLocation,
    ) -> SlotIndex {
        assert_eq!(
            args.len(),
            kind.arg_count(),
            "step {} takes {} arguments, got {}",
            kind.name(),
            kind.arg_count(),
            args.len()
        );
        for arg in &args {
            assert!(
                arg.index() < self.slot_count as usize,
                "step {} references slot {} before it is produced (have {})",
                kind.name(),
                arg.index(),
                self.slot_count
            );
        }
        let ret = SlotIndex::new(self.slot_count);
        self.slot_count += 1;
        self.steps.push(RenderingStep {
            kind,
            args,
            ret,
            location,
        });
        ret
    }

    /// Bind a named output to a slot. Returns `false` if the name is already
    /// taken (the caller reports that as a script error with its location).
    ///
    /// # Panics
    ///
    /// Panics if the slot does not exist.
    pub fn bind_output(&mut self, name: &str, slot: SlotIndex) -> bool {
        assert!(
            slot.index() < self.slot_count as usize,
            "output {name:?} bound to nonexistent slot {}",
            slot.index()
        );
        if self.outputs.contains_key(name) {
            return false;
        }
        self.outputs.insert(name.to_string(), slot);
        true
    }

    /// Steps in construction (topological) order.
    pub fn steps(&self) -> &[RenderingStep] {
        &self.steps
    }

    /// Total number of slots allocated so far.
    pub fn slot_count(&self) -> usize {
        self.slot_count as usize
    }

    /// Named outputs in binding order.
    pub fn outputs(&self) -> &IndexMap<String, SlotIndex> {
        &self.outputs
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
