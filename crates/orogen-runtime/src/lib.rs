//! Orogen Runtime.
//!
//! The execution substrate of the terrain engine: compiled script artifacts
//! run in a managed virtual machine whose native terrain functions emit a
//! deferred rendering-step graph instead of computing pixels eagerly. The
//! generator drives the whole lifecycle - load a script, resolve its
//! arguments, execute a run, render the graph, stream results to the host.
//!
//! # Architecture
//!
//! - [`bytecode`] - Instructions, code blocks, artifacts, binary persistence
//! - [`heap`] - The managed object arena
//! - [`dispatch`] - Type registry and native function dispatch
//! - [`vm`] - The stack/frame interpreter
//! - [`context`] - Per-run state shared by the VM and natives
//! - [`corelib`] - The terrain native library (`HeightMap.*`, `Args.*`)
//! - [`generator`] - Lifecycle state machine, callbacks, run orchestration
//! - [`error`] - Script-level error types
//!
//! # Failure Model
//!
//! Script errors are `Result`s carrying a [`CodeLocation`]; they surface
//! through the message sink and abort only the current run. Internal faults
//! (stack underflow, invalid indices, dispatch-kind mismatches, lifecycle
//! misuse) panic - they indicate bugs in the compiler/runtime pairing and
//! must never be mistaken for bad script input.
//!
//! # Example
//!
//! ```ignore
//! use orogen_runtime::{Generator, GeneratorConfig};
//!
//! let mut generator = Generator::new(GeneratorConfig::default());
//! generator.load_script(orogen_runtime::bytecode::decode_script(&bytes)?);
//! if generator.load_args()?.is_some() {
//!     generator.generate(&[])?;
//! }
//! ```

pub mod bytecode;
pub mod context;
pub mod corelib;
pub mod dispatch;
pub mod error;
pub mod generator;
pub mod heap;
pub mod vm;

pub use bytecode::{decode_script, encode_script, CodeBlock, Instruction, ScriptArtifact};
pub use context::{ArgValue, RunContext, RunPhase, ScriptArg, ScriptArgKind};
pub use dispatch::{MethodKind, NativeFunctionDefinition, TypeDefinition, TypeRegistry};
pub use error::{ScriptError, ScriptErrorKind, ScriptResult};
pub use generator::{
    CollectMaps, CollectedMap, DiscardMaps, Generator, GeneratorConfig, GeneratorStatus,
    MapConsumer, MessageSink, TracingMessages,
};
pub use heap::{Heap, ManagedObject, ObjectId, ObjectPayload};
pub use vm::Vm;

pub use orogen_foundation::CodeLocation;
pub use orogen_render::{ProgressSink, StepGraph};
