//! The terrain core library.
//!
//! Native functions callable from script, registered on the built-in types
//! at generator startup. Map operations do not compute pixels; each appends
//! a rendering step to the run's graph and returns (or rewrites) a
//! lightweight handle referencing the step's return slot.
//!
//! Registration is explicit and closed: [`install`] is the single place the
//! native set is defined, and duplicate registrations panic there rather
//! than surfacing at call time.

pub mod args;
pub mod heightmap;

use orogen_foundation::CodeLocation;
use orogen_render::SlotIndex;

use crate::dispatch::{TypeDefinition, TypeRegistry};
use crate::error::{ScriptError, ScriptErrorKind, ScriptResult};
use crate::heap::{BuiltinTypeIds, ObjectId, ObjectPayload};
use crate::context::RunContext;

/// Register every built-in type and native function.
///
/// Returns the type ids the heap uses to tag objects. Must be called exactly
/// once per registry, at generator construction.
pub fn install(registry: &mut TypeRegistry) -> BuiltinTypeIds {
    let null = registry.register(TypeDefinition::new("Null"));
    let boolean = registry.register(TypeDefinition::new("Boolean"));
    let number = registry.register(TypeDefinition::new("Number"));
    let string = registry.register(TypeDefinition::new("String"));

    let mut height_map = TypeDefinition::new("HeightMap");
    heightmap::install(&mut height_map);
    let height_map = registry.register(height_map);

    let mut args_type = TypeDefinition::new("Args");
    args::install(&mut args_type);
    let args = registry.register(args_type);

    BuiltinTypeIds {
        null,
        boolean,
        number,
        string,
        height_map,
        args,
    }
}

/// Check a native call's argument count.
pub(crate) fn check_arity(
    method: &str,
    expected: usize,
    args: &[ObjectId],
    location: CodeLocation,
) -> ScriptResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ScriptError::new(
            ScriptErrorKind::WrongArgumentCount {
                method: method.to_string(),
                expected,
                found: args.len(),
            },
            location,
        ))
    }
}

fn type_mismatch(expected: &str, found: &ObjectPayload, location: CodeLocation) -> ScriptError {
    ScriptError::new(
        ScriptErrorKind::TypeMismatch {
            expected: expected.to_string(),
            found: found.describe().to_string(),
        },
        location,
    )
}

/// Read a Number argument.
pub(crate) fn expect_number(
    ctx: &RunContext,
    id: ObjectId,
    location: CodeLocation,
) -> ScriptResult<f64> {
    match &ctx.heap.get(id).payload {
        ObjectPayload::Number(value) => Ok(*value),
        other => Err(type_mismatch("Number", other, location)),
    }
}

/// Read a Boolean argument.
pub(crate) fn expect_boolean(
    ctx: &RunContext,
    id: ObjectId,
    location: CodeLocation,
) -> ScriptResult<bool> {
    match &ctx.heap.get(id).payload {
        ObjectPayload::Boolean(value) => Ok(*value),
        other => Err(type_mismatch("Boolean", other, location)),
    }
}

/// Read a String argument.
pub(crate) fn expect_string(
    ctx: &RunContext,
    id: ObjectId,
    location: CodeLocation,
) -> ScriptResult<String> {
    match &ctx.heap.get(id).payload {
        ObjectPayload::Str(value) => Ok(value.clone()),
        other => Err(type_mismatch("String", other, location)),
    }
}

/// Read a HeightMap argument's slot handle.
pub(crate) fn expect_map_slot(
    ctx: &RunContext,
    id: ObjectId,
    location: CodeLocation,
) -> ScriptResult<SlotIndex> {
    match &ctx.heap.get(id).payload {
        ObjectPayload::HeightMap(slot) => Ok(*slot),
        other => Err(type_mismatch("HeightMap", other, location)),
    }
}

/// Read a Number argument that must be a whole number.
pub(crate) fn expect_integer(
    ctx: &RunContext,
    id: ObjectId,
    location: CodeLocation,
) -> ScriptResult<i64> {
    let value = expect_number(ctx, id, location)?;
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= i64::MAX as f64 {
        Ok(value as i64)
    } else {
        Err(ScriptError::new(
            ScriptErrorKind::TypeMismatch {
                expected: "integer Number".to_string(),
                found: format!("{value}"),
            },
            location,
        ))
    }
}

/// A fully-installed run context for unit tests.
#[cfg(test)]
pub(crate) fn test_context() -> RunContext {
    use crate::context::RunPhase;
    use orogen_foundation::Size2D;

    let mut registry = TypeRegistry::new();
    let builtins = install(&mut registry);
    let mut ctx = RunContext::new(builtins, 0, RunPhase::MapInfo);
    ctx.begin_generating(Size2D::new(64, 64));
    ctx
}
