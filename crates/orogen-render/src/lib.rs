//! Orogen Render.
//!
//! The deferred-computation half of the engine. Native terrain functions do
//! not compute pixels; they append [`RenderingStep`]s to a [`StepGraph`],
//! wiring argument slots to the slots holding their operands and allocating
//! a fresh return slot for the result. Actual pixel work happens only when a
//! generation run evaluates the graph.
//!
//! # Modules
//!
//! - [`buffer`] - Materialized height tiles ([`HeightBuffer`])
//! - [`step`] - The closed set of step kinds with their bounds rules
//! - [`graph`] - Graph construction, acyclic by construction
//! - [`bounds`] - Backward bounds propagation over a finished graph
//! - [`renderer`] - Forward tile-by-tile evaluation
//! - [`serial`] - Binary persistence envelope shared with the runtime
//!
//! # Evaluation Model
//!
//! A generation run asks for an output region. [`bounds::propagate_bounds`]
//! walks the graph backward and records, per slot, the minimal sub-region
//! each step must produce. The [`renderer`] then walks forward in
//! construction order, materializes exactly those regions, and releases each
//! buffer as soon as no later step needs it, keeping peak memory
//! proportional to tile size and graph depth rather than map area.

pub mod bounds;
pub mod buffer;
pub mod graph;
pub mod renderer;
pub mod serial;
pub mod step;

pub use bounds::{propagate_bounds, SlotBounds};
pub use buffer::HeightBuffer;
pub use graph::{RenderingStep, SlotIndex, StepGraph};
pub use renderer::{Cancelled, NullProgress, ProgressSink, Renderer};
pub use serial::{decode_graph, encode_graph, CodecError, FORMAT_VERSION, MAGIC};
pub use step::StepKind;
