//! Per-run execution context.
//!
//! A [`RunContext`] bundles everything native functions and the VM touch
//! while one entry point executes: the managed heap, the step graph under
//! construction, the seeded random stream, declared script arguments, and
//! the map limits in force. It is created by the generator for each run and
//! discarded afterwards - nothing in it survives across runs.

use rand::rngs::StdRng;
use rand::SeedableRng;

use orogen_foundation::{CodeLocation, Size2D};
use orogen_render::StepGraph;

use crate::error::{ScriptError, ScriptErrorKind, ScriptResult};
use crate::heap::{BuiltinTypeIds, Heap};

/// What part of a run is currently executing.
///
/// Native functions are phase-restricted: argument declaration is only legal
/// while the `args` entry point runs, map operations only while `main` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Executing the `args` entry point.
    Args,
    /// Executing the `width`/`height` entry points.
    MapInfo,
    /// Executing `main`; the step graph exists and accepts steps.
    Generating,
}

impl RunPhase {
    /// Phase name used in phase-violation diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            RunPhase::Args => "declaring arguments",
            RunPhase::MapInfo => "loading map info",
            RunPhase::Generating => "generating",
        }
    }
}

/// One argument a script declares through the `args` entry point.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptArg {
    pub name: String,
    pub kind: ScriptArgKind,
}

/// Declared argument shape and defaults.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptArgKind {
    /// Numeric argument clamped into `[min, max]` when supplied.
    Number { default: f64, min: f64, max: f64 },
    /// Boolean toggle.
    Boolean { default: bool },
}

/// A host-supplied value for a declared argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgValue {
    Number(f64),
    Boolean(bool),
}

/// Mutable state shared by the VM and native functions during one run.
pub struct RunContext {
    pub phase: RunPhase,
    pub heap: Heap,
    /// Seeded random stream; per-step salts are drawn here at graph
    /// construction time so results never depend on tiling or scheduling.
    pub rng: StdRng,
    /// Arguments collected by `Args.*` natives during the `Args` phase.
    pub declared_args: Vec<ScriptArg>,
    max_map_count: Option<u32>,
    graph: Option<StepGraph>,
    created_maps: u32,
}

impl RunContext {
    pub fn new(builtins: BuiltinTypeIds, seed: u64, phase: RunPhase) -> Self {
        Self {
            phase,
            heap: Heap::new(builtins),
            rng: StdRng::seed_from_u64(seed),
            declared_args: Vec::new(),
            max_map_count: None,
            graph: None,
            created_maps: 0,
        }
    }

    /// Set the map-count limit for this run.
    pub fn set_max_map_count(&mut self, limit: Option<u32>) {
        self.max_map_count = limit;
    }

    /// Enter the `Generating` phase with a graph for a map of `map_size`.
    pub fn begin_generating(&mut self, map_size: Size2D) {
        self.phase = RunPhase::Generating;
        self.graph = Some(StepGraph::new(map_size));
    }

    /// The step graph, if this run has entered the `Generating` phase.
    pub fn graph(&self) -> Option<&StepGraph> {
        self.graph.as_ref()
    }

    /// Mutable access to the step graph for a step-emitting native.
    ///
    /// Outside the `Generating` phase this is a script error attributed to
    /// the calling instruction: map operations are meaningless while
    /// declaring arguments or loading map info.
    pub fn graph_mut(
        &mut self,
        operation: &str,
        location: CodeLocation,
    ) -> ScriptResult<&mut StepGraph> {
        let phase = self.phase;
        self.graph.as_mut().ok_or_else(|| {
            ScriptError::new(
                ScriptErrorKind::PhaseViolation {
                    operation: operation.to_string(),
                    phase: phase.describe(),
                },
                location,
            )
        })
    }

    /// Append a map-producing step: phase check, map-count charge, and graph
    /// append in one place so every step-emitting native behaves alike.
    pub fn add_map_step(
        &mut self,
        operation: &str,
        kind: orogen_render::StepKind,
        args: Vec<orogen_render::SlotIndex>,
        location: CodeLocation,
    ) -> ScriptResult<orogen_render::SlotIndex> {
        if self.graph.is_none() {
            return Err(ScriptError::new(
                ScriptErrorKind::PhaseViolation {
                    operation: operation.to_string(),
                    phase: self.phase.describe(),
                },
                location,
            ));
        }
        self.charge_map(location)?;
        Ok(self
            .graph
            .as_mut()
            .expect("graph checked above")
            .add_step(kind, args, location))
    }

    /// Detach the finished graph for rendering.
    ///
    /// # Panics
    ///
    /// Panics if the run never entered the `Generating` phase; the generator
    /// only calls this after `main` has executed.
    pub fn take_graph(&mut self) -> StepGraph {
        self.graph
            .take()
            .expect("run has no step graph to render")
    }

    /// Charge one created map against the configured map-count limit.
    pub fn charge_map(&mut self, location: CodeLocation) -> ScriptResult<()> {
        self.created_maps += 1;
        if let Some(limit) = self.max_map_count {
            if self.created_maps > limit {
                return Err(ScriptError::new(
                    ScriptErrorKind::TooManyMaps { limit },
                    location,
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corelib;

    #[test]
    fn test_graph_access_outside_generating_is_phase_violation() {
        let mut ctx = corelib::test_context();
        ctx.phase = RunPhase::Args;
        let err = ctx
            .graph_mut("HeightMap.Flat", CodeLocation::new(2, 1))
            .unwrap_err();
        assert!(matches!(
            err.kind,
            ScriptErrorKind::PhaseViolation { .. }
        ));
    }

    #[test]
    fn test_map_count_limit() {
        let mut ctx = corelib::test_context();
        ctx.set_max_map_count(Some(2));
        assert!(ctx.charge_map(CodeLocation::UNKNOWN).is_ok());
        assert!(ctx.charge_map(CodeLocation::UNKNOWN).is_ok());
        let err = ctx.charge_map(CodeLocation::UNKNOWN).unwrap_err();
        assert!(matches!(err.kind, ScriptErrorKind::TooManyMaps { limit: 2 }));
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        use rand::Rng;
        let builtins = corelib::test_context().heap.builtins();
        let mut a = RunContext::new(builtins, 99, RunPhase::Generating);
        let mut b = RunContext::new(builtins, 99, RunPhase::Generating);
        assert_eq!(a.rng.gen::<u64>(), b.rng.gen::<u64>());
    }
}
