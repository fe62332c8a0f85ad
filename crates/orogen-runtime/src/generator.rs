//! Generator lifecycle and run orchestration.
//!
//! The [`Generator`] is the caller-owned context every operation threads
//! through - there is no global instance and no singleton assertion;
//! ownership makes a second concurrent generator a compile-time
//! impossibility rather than a runtime check.
//!
//! # Lifecycle
//!
//! ```text
//! NoScript --load_script--> ScriptLoaded --load_args--> ReadyToGenerate
//!      ReadyToGenerate --generate--> LoadingMapInfo --> Generating
//!      Generating --(success or script error)--> ReadyToGenerate
//! ```
//!
//! `load_args` on a script with no `args` entry point is a non-fatal no-op
//! that stays in `ScriptLoaded`. Calling lifecycle operations out of their
//! required state, or reseeding while a run is in flight, is asserted - a
//! host sequencing bug, never a recoverable condition.

use indexmap::IndexMap;
use tracing::{error, info, warn};

use orogen_foundation::{CodeLocation, Height, MessageLevel, Size2D};
use orogen_render::{NullProgress, ProgressSink, Renderer};

use crate::bytecode::{ScriptArtifact, ENTRY_ARGS, ENTRY_HEIGHT, ENTRY_MAIN, ENTRY_WIDTH};
use crate::context::{ArgValue, RunContext, RunPhase, ScriptArg, ScriptArgKind};
use crate::corelib;
use crate::dispatch::TypeRegistry;
use crate::error::{ScriptError, ScriptErrorKind, ScriptResult};
use crate::heap::{BuiltinTypeIds, ObjectId, ObjectPayload};
use crate::vm::Vm;

/// Where the generator is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorStatus {
    /// No script loaded yet.
    NoScript,
    /// A script is loaded; its arguments are not resolved.
    ScriptLoaded,
    /// Arguments resolved; a generation run may begin.
    ReadyToGenerate,
    /// A run is resolving the script's map dimensions.
    LoadingMapInfo,
    /// A run is executing `main` and rendering the graph.
    Generating,
}

/// Receives leveled, location-tagged messages from the engine.
///
/// Invoked synchronously from within generation. A line of `-1` in the
/// location marks a message with no script position.
pub trait MessageSink {
    fn message(&mut self, level: MessageLevel, text: &str, location: CodeLocation);
}

/// Receives each finished output map.
pub trait MapConsumer {
    fn map_ready(&mut self, name: &str, cells: &[Height], width: u32, height: u32);
}

/// Default message sink: leveled, line-annotated log output.
#[derive(Debug, Default)]
pub struct TracingMessages;

impl MessageSink for TracingMessages {
    fn message(&mut self, level: MessageLevel, text: &str, location: CodeLocation) {
        match level {
            MessageLevel::Message | MessageLevel::Notice => {
                info!(kind = level.label(), %location, "{text}")
            }
            MessageLevel::Warning => warn!(%location, "{text}"),
            MessageLevel::Error => error!(%location, "{text}"),
        }
    }
}

/// Map consumer that drops every buffer.
#[derive(Debug, Default)]
pub struct DiscardMaps;

impl MapConsumer for DiscardMaps {
    fn map_ready(&mut self, _name: &str, _cells: &[Height], _width: u32, _height: u32) {}
}

/// One collected output map.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedMap {
    pub cells: Vec<Height>,
    pub width: u32,
    pub height: u32,
}

/// Map consumer that keeps every output in memory, in delivery order.
#[derive(Debug, Default)]
pub struct CollectMaps {
    pub maps: IndexMap<String, CollectedMap>,
}

impl MapConsumer for CollectMaps {
    fn map_ready(&mut self, name: &str, cells: &[Height], width: u32, height: u32) {
        self.maps.insert(
            name.to_string(),
            CollectedMap {
                cells: cells.to_vec(),
                width,
                height,
            },
        );
    }
}

impl<T: MessageSink> MessageSink for std::rc::Rc<std::cell::RefCell<T>> {
    fn message(&mut self, level: MessageLevel, text: &str, location: CodeLocation) {
        self.borrow_mut().message(level, text, location);
    }
}

impl<T: MapConsumer> MapConsumer for std::rc::Rc<std::cell::RefCell<T>> {
    fn map_ready(&mut self, name: &str, cells: &[Height], width: u32, height: u32) {
        self.borrow_mut().map_ready(name, cells, width, height);
    }
}

/// Limits and tiling configuration for generation runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneratorConfig {
    /// Maximum map dimensions; `None` is unbounded.
    pub max_map_size: Option<Size2D>,
    /// Maximum number of maps one run may create; `None` is unbounded.
    pub max_map_count: Option<u32>,
    /// Evaluate the graph in tiles of this size; `None` renders whole-map.
    pub tile_size: Option<Size2D>,
}

/// The engine's top-level context object.
pub struct Generator {
    status: GeneratorStatus,
    config: GeneratorConfig,
    seed: u64,
    script: Option<ScriptArtifact>,
    types: TypeRegistry,
    builtins: BuiltinTypeIds,
    declared_args: Option<Vec<ScriptArg>>,
    messages: Box<dyn MessageSink>,
    progress: Box<dyn ProgressSink>,
    maps: Box<dyn MapConsumer>,
}

impl Generator {
    /// Create a generator with default sinks (log messages, drop progress
    /// and maps).
    pub fn new(config: GeneratorConfig) -> Self {
        let mut types = TypeRegistry::new();
        let builtins = corelib::install(&mut types);
        Self {
            status: GeneratorStatus::NoScript,
            config,
            seed: 0,
            script: None,
            types,
            builtins,
            declared_args: None,
            messages: Box::new(TracingMessages),
            progress: Box::new(NullProgress),
            maps: Box::new(DiscardMaps),
        }
    }

    pub fn status(&self) -> GeneratorStatus {
        self.status
    }

    pub fn config(&self) -> GeneratorConfig {
        self.config
    }

    /// Replace the message sink.
    pub fn set_message_sink(&mut self, sink: Box<dyn MessageSink>) {
        self.messages = sink;
    }

    /// Replace the progress sink.
    pub fn set_progress_sink(&mut self, sink: Box<dyn ProgressSink>) {
        self.progress = sink;
    }

    /// Replace the map consumer.
    pub fn set_map_consumer(&mut self, consumer: Box<dyn MapConsumer>) {
        self.maps = consumer;
    }

    /// Set the seed for subsequent runs.
    ///
    /// # Panics
    ///
    /// Panics while a run is in flight (`Generating` or `LoadingMapInfo`):
    /// mid-run reseeding would make results depend on scheduling.
    pub fn set_seed(&mut self, seed: u64) {
        assert!(
            self.status != GeneratorStatus::Generating
                && self.status != GeneratorStatus::LoadingMapInfo,
            "seed may not change while a generation run is in flight"
        );
        self.seed = seed;
    }

    pub fn set_max_map_size(&mut self, limit: Option<Size2D>) {
        self.config.max_map_size = limit;
    }

    pub fn set_max_map_count(&mut self, limit: Option<u32>) {
        self.config.max_map_count = limit;
    }

    pub fn set_tile_size(&mut self, tile: Option<Size2D>) {
        self.config.tile_size = tile;
    }

    /// Load a compiled script, discarding any previous one.
    pub fn load_script(&mut self, artifact: ScriptArtifact) {
        self.script = Some(artifact);
        self.declared_args = None;
        self.status = GeneratorStatus::ScriptLoaded;
        info!("script loaded");
    }

    /// Arguments declared by the script, once `load_args` has resolved them.
    pub fn declared_args(&self) -> Option<&[ScriptArg]> {
        self.declared_args.as_deref()
    }

    /// Resolve the script's declared argument list by running its `args`
    /// entry point.
    ///
    /// Returns `Ok(None)` - and stays in `ScriptLoaded` - when the script
    /// declares no `args` entry point. On success the generator moves to
    /// `ReadyToGenerate`.
    ///
    /// # Panics
    ///
    /// Panics when called in any state other than `ScriptLoaded`; that is a
    /// host sequencing bug, not a script condition.
    pub fn load_args(&mut self) -> ScriptResult<Option<&[ScriptArg]>> {
        assert_eq!(
            self.status,
            GeneratorStatus::ScriptLoaded,
            "load_args requires a freshly loaded script"
        );
        let artifact = self.script.as_ref().expect("status implies a script");
        if !artifact.has_function(ENTRY_ARGS) {
            return Ok(None);
        }

        let mut ctx = RunContext::new(self.builtins, self.seed, RunPhase::Args);
        let mut vm = Vm::new(artifact, &self.types);
        match vm.run_entry(ENTRY_ARGS, &[], &mut ctx) {
            Ok(_) => {
                self.declared_args = Some(ctx.declared_args);
                self.status = GeneratorStatus::ReadyToGenerate;
                Ok(self.declared_args.as_deref())
            }
            Err(error) => {
                self.report(&error);
                Err(error)
            }
        }
    }

    /// Run one generation with the given argument values.
    ///
    /// Missing values fall back to the declared defaults; numeric values are
    /// clamped into their declared ranges. On success or script error the
    /// generator returns to `ReadyToGenerate`; script errors are also
    /// delivered through the message sink with their location.
    ///
    /// # Panics
    ///
    /// Panics when called in any state other than `ReadyToGenerate`.
    pub fn generate(&mut self, values: &[ArgValue]) -> ScriptResult<()> {
        assert_eq!(
            self.status,
            GeneratorStatus::ReadyToGenerate,
            "generate requires resolved script arguments"
        );
        let artifact = self.script.take().expect("status implies a script");
        let result = self.run_generation(&artifact, values);
        self.script = Some(artifact);
        self.status = GeneratorStatus::ReadyToGenerate;
        if let Err(error) = &result {
            self.report(error);
        }
        result
    }

    fn report(&mut self, error: &ScriptError) {
        self.messages
            .message(MessageLevel::Error, &error.kind.to_string(), error.location);
    }

    fn run_generation(
        &mut self,
        artifact: &ScriptArtifact,
        values: &[ArgValue],
    ) -> ScriptResult<()> {
        self.status = GeneratorStatus::LoadingMapInfo;
        let mut ctx = RunContext::new(self.builtins, self.seed, RunPhase::MapInfo);
        ctx.set_max_map_count(self.config.max_map_count);

        let declared = self.declared_args.clone().unwrap_or_default();
        let args = resolve_arg_values(&mut ctx, &declared, values)?;

        let width = self.eval_dimension(artifact, &mut ctx, ENTRY_WIDTH, &args)?;
        let height = self.eval_dimension(artifact, &mut ctx, ENTRY_HEIGHT, &args)?;
        let size = Size2D::new(width, height);
        if let Some(limit) = self.config.max_map_size {
            if !size.fits_within(limit) {
                return Err(ScriptError::new(
                    ScriptErrorKind::MapTooBig {
                        requested: size,
                        limit,
                    },
                    CodeLocation::UNKNOWN,
                ));
            }
        }

        self.status = GeneratorStatus::Generating;
        ctx.begin_generating(size);
        let returned = {
            let mut vm = Vm::new(artifact, &self.types);
            vm.run_entry(ENTRY_MAIN, &args, &mut ctx)?
        };

        let main_slot = match ctx.heap.get(returned).payload {
            ObjectPayload::HeightMap(slot) => slot,
            ref other => {
                return Err(ScriptError::new(
                    ScriptErrorKind::TypeMismatch {
                        expected: "HeightMap returned from main".to_string(),
                        found: other.describe().to_string(),
                    },
                    CodeLocation::UNKNOWN,
                ))
            }
        };
        {
            let graph = ctx.graph_mut(ENTRY_MAIN, CodeLocation::UNKNOWN)?;
            if !graph.bind_output(ENTRY_MAIN, main_slot) {
                return Err(ScriptError::new(
                    ScriptErrorKind::DuplicateOutput {
                        name: ENTRY_MAIN.to_string(),
                    },
                    CodeLocation::UNKNOWN,
                ));
            }
        }

        let graph = ctx.take_graph();
        info!(
            size = %size,
            steps = graph.steps().len(),
            outputs = graph.outputs().len(),
            "rendering step graph"
        );

        let renderer = Renderer::new();
        let outputs = match self.config.tile_size {
            Some(tile) => renderer.render_tiled(&graph, tile, self.progress.as_mut()),
            None => renderer.render(&graph, self.progress.as_mut()),
        }
        .map_err(|_| ScriptError::new(ScriptErrorKind::Cancelled, CodeLocation::UNKNOWN))?;

        for (name, buffer) in &outputs {
            let rect = buffer.rect();
            self.maps
                .map_ready(name, buffer.as_slice(), rect.size.width, rect.size.height);
        }
        Ok(())
    }

    /// Run a dimension entry point (`width`/`height`) and validate its
    /// result as a map dimension.
    fn eval_dimension(
        &self,
        artifact: &ScriptArtifact,
        ctx: &mut RunContext,
        name: &str,
        args: &[ObjectId],
    ) -> ScriptResult<u32> {
        if !artifact.has_function(name) {
            return Err(ScriptError::new(
                ScriptErrorKind::MissingEntryPoint {
                    name: name.to_string(),
                },
                CodeLocation::UNKNOWN,
            ));
        }
        let mut vm = Vm::new(artifact, &self.types);
        let returned = vm.run_entry(name, args, ctx)?;
        let value = match ctx.heap.get(returned).payload {
            ObjectPayload::Number(value) => value,
            ref other => {
                return Err(ScriptError::new(
                    ScriptErrorKind::TypeMismatch {
                        expected: format!("Number returned from {name}"),
                        found: other.describe().to_string(),
                    },
                    CodeLocation::UNKNOWN,
                ))
            }
        };
        if value.is_finite() && value.fract() == 0.0 && value >= 1.0 && value <= u32::MAX as f64 {
            Ok(value as u32)
        } else {
            Err(ScriptError::new(
                ScriptErrorKind::InvalidMapSize { value },
                CodeLocation::UNKNOWN,
            ))
        }
    }

    /// Test hook for exercising in-flight preconditions.
    #[cfg(test)]
    pub(crate) fn force_status(&mut self, status: GeneratorStatus) {
        self.status = status;
    }
}

/// Materialize host-supplied argument values against the declared list.
///
/// Missing values use defaults, numbers clamp into their declared range,
/// surplus values are dropped, and a kind mismatch is a script error.
fn resolve_arg_values(
    ctx: &mut RunContext,
    declared: &[ScriptArg],
    values: &[ArgValue],
) -> ScriptResult<Vec<ObjectId>> {
    let mut resolved = Vec::with_capacity(declared.len());
    for (index, arg) in declared.iter().enumerate() {
        let id = match (&arg.kind, values.get(index)) {
            (ScriptArgKind::Number { default, .. }, None) => ctx.heap.number(*default),
            (ScriptArgKind::Number { min, max, .. }, Some(ArgValue::Number(value))) => {
                ctx.heap.number(value.clamp(*min, *max))
            }
            (ScriptArgKind::Boolean { default }, None) => ctx.heap.boolean(*default),
            (ScriptArgKind::Boolean { .. }, Some(ArgValue::Boolean(value))) => {
                ctx.heap.boolean(*value)
            }
            (kind, Some(other)) => {
                let expected = match kind {
                    ScriptArgKind::Number { .. } => "Number",
                    ScriptArgKind::Boolean { .. } => "Boolean",
                };
                return Err(ScriptError::new(
                    ScriptErrorKind::TypeMismatch {
                        expected: format!("{expected} for argument {:?}", arg.name),
                        found: format!("{other:?}"),
                    },
                    CodeLocation::UNKNOWN,
                ));
            }
        };
        resolved.push(id);
    }
    Ok(resolved)
}
