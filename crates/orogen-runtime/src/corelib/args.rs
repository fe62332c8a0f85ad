//! Native functions of the `Args` type.
//!
//! Scripts describe their configurable arguments by calling these from the
//! `args` entry point. The declarations accumulate in the run context and
//! become the list `Generator::load_args` hands to the host. Calling them
//! from any other entry point is a phase violation.

use orogen_foundation::CodeLocation;

use crate::context::{RunContext, RunPhase, ScriptArg, ScriptArgKind};
use crate::dispatch::{MethodKind, NativeFunctionDefinition, TypeDefinition};
use crate::error::{ScriptError, ScriptErrorKind, ScriptResult};
use crate::heap::ObjectId;

use super::{check_arity, expect_boolean, expect_number, expect_string};

/// Register the `Args` method table.
pub fn install(def: &mut TypeDefinition) {
    def.add_method(NativeFunctionDefinition {
        name: "AddNumber",
        kind: MethodKind::Static,
        func: add_number,
    });
    def.add_method(NativeFunctionDefinition {
        name: "AddBool",
        kind: MethodKind::Static,
        func: add_bool,
    });
}

fn require_args_phase(
    ctx: &RunContext,
    operation: &str,
    location: CodeLocation,
) -> ScriptResult<()> {
    if ctx.phase == RunPhase::Args {
        Ok(())
    } else {
        Err(ScriptError::new(
            ScriptErrorKind::PhaseViolation {
                operation: operation.to_string(),
                phase: ctx.phase.describe(),
            },
            location,
        ))
    }
}

/// `Args.AddNumber(name, default, min, max)` - declare a numeric argument.
fn add_number(
    ctx: &mut RunContext,
    location: CodeLocation,
    _instance: Option<ObjectId>,
    args: &[ObjectId],
) -> ScriptResult<ObjectId> {
    check_arity("Args.AddNumber", 4, args, location)?;
    require_args_phase(ctx, "Args.AddNumber", location)?;
    let name = expect_string(ctx, args[0], location)?;
    let default = expect_number(ctx, args[1], location)?;
    let min = expect_number(ctx, args[2], location)?;
    let max = expect_number(ctx, args[3], location)?;
    if !(min <= default && default <= max) {
        return Err(ScriptError::new(
            ScriptErrorKind::InvalidGeometry {
                message: format!(
                    "argument {name:?} default {default} outside range [{min}, {max}]"
                ),
            },
            location,
        ));
    }
    ctx.declared_args.push(ScriptArg {
        name,
        kind: ScriptArgKind::Number { default, min, max },
    });
    Ok(ctx.heap.null())
}

/// `Args.AddBool(name, default)` - declare a boolean argument.
fn add_bool(
    ctx: &mut RunContext,
    location: CodeLocation,
    _instance: Option<ObjectId>,
    args: &[ObjectId],
) -> ScriptResult<ObjectId> {
    check_arity("Args.AddBool", 2, args, location)?;
    require_args_phase(ctx, "Args.AddBool", location)?;
    let name = expect_string(ctx, args[0], location)?;
    let default = expect_boolean(ctx, args[1], location)?;
    ctx.declared_args.push(ScriptArg {
        name,
        kind: ScriptArgKind::Boolean { default },
    });
    Ok(ctx.heap.null())
}
