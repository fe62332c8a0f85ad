//! Script-level errors.
//!
//! Two disjoint failure classes exist in this engine:
//!
//! - **Script errors** ([`ScriptError`]): caused by the script's own input -
//!   bad argument types, unresolved methods, geometry violations, exceeding
//!   configured limits. They carry a source location, surface through the
//!   message sink, and abort only the current generation run.
//! - **Internal faults**: evaluation-stack underflow, invalid slot indices,
//!   dispatch-kind mismatches, lifecycle calls in the wrong state. These are
//!   bugs in the compiler/runtime pairing, not bad script input; they panic
//!   and are never converted into a [`ScriptError`].

use thiserror::Error;

use orogen_foundation::{CodeLocation, Size2D};

use crate::dispatch::MethodKind;

/// Result alias for operations that can fail with a script error.
pub type ScriptResult<T> = Result<T, ScriptError>;

/// A user-recoverable, attributable script failure.
#[derive(Debug, Error)]
#[error("{kind} ({location})")]
pub struct ScriptError {
    pub kind: ScriptErrorKind,
    /// Script position the failure is attributed to.
    pub location: CodeLocation,
}

impl ScriptError {
    pub fn new(kind: ScriptErrorKind, location: CodeLocation) -> Self {
        Self { kind, location }
    }
}

/// The specific failure a script ran into.
#[derive(Debug, Error)]
pub enum ScriptErrorKind {
    /// Method lookup failed on the receiver's type.
    #[error("type {type_name} has no {kind} method {method:?}")]
    NoSuchMethod {
        type_name: String,
        method: String,
        kind: MethodKind,
    },

    /// A native method was called with the wrong number of arguments.
    #[error("{method} expects {expected} arguments, got {found}")]
    WrongArgumentCount {
        method: String,
        expected: usize,
        found: usize,
    },

    /// A value had the wrong runtime type for the operation.
    #[error("expected {expected}, got {found}")]
    TypeMismatch { expected: String, found: String },

    /// Arithmetic produced a value outside the number domain.
    #[error("number error: {message}")]
    NumberError { message: String },

    /// A required entry point is missing from the script.
    #[error("script does not define {name:?}")]
    MissingEntryPoint { name: String },

    /// A map-size entry point returned an unusable dimension.
    #[error("invalid map dimension: {value}")]
    InvalidMapSize { value: f64 },

    /// The requested map exceeds the configured maximum size.
    #[error("map size {requested} exceeds the configured maximum {limit}")]
    MapTooBig { requested: Size2D, limit: Size2D },

    /// The run created more maps than the configured maximum.
    #[error("map count limit of {limit} exceeded")]
    TooManyMaps { limit: u32 },

    /// A geometric parameter is out of its valid domain.
    #[error("invalid geometry: {message}")]
    InvalidGeometry { message: String },

    /// Two outputs were bound under the same name.
    #[error("output {name:?} is already bound")]
    DuplicateOutput { name: String },

    /// An operation was used in a phase of the run that forbids it.
    #[error("{operation} is not available while {phase}")]
    PhaseViolation {
        operation: String,
        phase: &'static str,
    },

    /// Script-function recursion exceeded the call-depth limit.
    #[error("call depth limit of {limit} exceeded")]
    CallDepthExceeded { limit: usize },

    /// The evaluation stack exceeded its size limit.
    #[error("evaluation stack limit of {limit} exceeded")]
    StackLimit { limit: usize },

    /// A script-function call referenced an unknown function.
    #[error("unknown function {name:?}")]
    UnknownFunction { name: String },

    /// The host cancelled the run between rendering steps.
    #[error("generation cancelled by host")]
    Cancelled,

    /// Failure raised explicitly by script or host logic.
    #[error("{message}")]
    UserError { message: String },
}
