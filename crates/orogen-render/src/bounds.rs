//! Backward bounds propagation.
//!
//! Given the output region a generation run actually needs, this pass walks
//! the graph in reverse construction order and computes, per slot, the
//! minimal region its producing step must materialize. Slots nothing
//! requires end up empty and their steps are skipped entirely by the
//! renderer.
//!
//! The pass is monotone (a larger request never shrinks any propagated
//! bound) and idempotent (propagating the same request twice yields the
//! same table), because every step kind's bounds rule is a pure function of
//! the requested rectangle and accumulation is by rectangle union.

use orogen_foundation::Rect;

use crate::graph::{SlotIndex, StepGraph};

/// The propagated per-slot requirements for one requested output region.
///
/// Mutable only while propagation runs; authoritative and read-only once it
/// returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotBounds {
    bounds: Vec<Rect>,
}

impl SlotBounds {
    /// The region required from a slot; empty if nothing needs it.
    pub fn get(&self, slot: SlotIndex) -> Rect {
        self.bounds[slot.index()]
    }
}

/// Compute the per-slot bounds needed to satisfy `requested`.
///
/// Output slots are seeded with the request clipped to the map domain; every
/// step then translates the requirement on its return slot into requirements
/// on its argument slots, accumulated by union across all consumers.
pub fn propagate_bounds(graph: &StepGraph, requested: Rect) -> SlotBounds {
    let domain = graph.domain();
    let mut bounds = vec![Rect::EMPTY; graph.slot_count()];

    let seed = requested.intersect(domain);
    for slot in graph.outputs().values() {
        bounds[slot.index()] = bounds[slot.index()].union_with(seed);
    }

    for step in graph.steps().iter().rev() {
        let needed = bounds[step.ret.index()];
        if needed.is_empty() {
            continue;
        }
        let arg_bounds = step.kind.input_bounds(needed, domain);
        debug_assert_eq!(arg_bounds.len(), step.args.len());
        for (arg, rect) in step.args.iter().zip(arg_bounds) {
            bounds[arg.index()] = bounds[arg.index()].union_with(rect);
        }
    }

    SlotBounds { bounds }
}
