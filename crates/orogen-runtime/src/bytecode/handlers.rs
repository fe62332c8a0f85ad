//! Opcode handlers.
//!
//! Handlers read instruction operands, manipulate the evaluation stack and
//! locals through the [`Vm`], and reach simulation state (heap, step graph,
//! dispatch) through the [`RunContext`]. Script-visible failures return
//! [`ScriptError`]s carrying the instruction's location; structural
//! violations (operand shapes, stack underflow) panic.

use orogen_foundation::CodeLocation;

use crate::context::RunContext;
use crate::dispatch::{self, MethodKind};
use crate::error::{ScriptError, ScriptErrorKind, ScriptResult};
use crate::heap::{ObjectId, ObjectPayload};
use crate::vm::Vm;

use super::opcode::Instruction;
use super::operand::{
    operand_argc, operand_binary, operand_literal, operand_local, operand_method, operand_name,
    operand_offset, operand_unary, BinaryOp, Literal, UnaryOp,
};

/// Functional interface of an opcode execution handler.
pub type Handler = fn(&Instruction, &mut Vm<'_>, &mut RunContext) -> ScriptResult<()>;

/// Read a Number value or fail with a located type mismatch.
fn number(ctx: &RunContext, id: ObjectId, location: CodeLocation) -> ScriptResult<f64> {
    match ctx.heap.get(id).payload {
        ObjectPayload::Number(value) => Ok(value),
        ref other => Err(ScriptError::new(
            ScriptErrorKind::TypeMismatch {
                expected: "Number".to_string(),
                found: other.describe().to_string(),
            },
            location,
        )),
    }
}

/// Read a Boolean value or fail with a located type mismatch.
fn boolean(ctx: &RunContext, id: ObjectId, location: CodeLocation) -> ScriptResult<bool> {
    match ctx.heap.get(id).payload {
        ObjectPayload::Boolean(value) => Ok(value),
        ref other => Err(ScriptError::new(
            ScriptErrorKind::TypeMismatch {
                expected: "Boolean".to_string(),
                found: other.describe().to_string(),
            },
            location,
        )),
    }
}

/// Reject numeric results outside the finite f64 domain.
fn finite(value: f64, location: CodeLocation) -> ScriptResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ScriptError::new(
            ScriptErrorKind::NumberError {
                message: format!("arithmetic produced {value}"),
            },
            location,
        ))
    }
}

/// No-op handler for structural markers (`Return` is intercepted by the
/// interpreter loop before dispatch).
pub(crate) fn handle_noop(
    _instruction: &Instruction,
    _vm: &mut Vm<'_>,
    _ctx: &mut RunContext,
) -> ScriptResult<()> {
    Ok(())
}

/// Pushes a literal onto the evaluation stack.
pub(crate) fn handle_push_literal(
    instruction: &Instruction,
    vm: &mut Vm<'_>,
    ctx: &mut RunContext,
) -> ScriptResult<()> {
    let id = match operand_literal(&instruction.operands[0]) {
        Literal::Null => ctx.heap.null(),
        Literal::Boolean(value) => ctx.heap.boolean(*value),
        Literal::Number(value) => ctx.heap.number(*value),
        Literal::Str(value) => ctx.heap.string(value.clone()),
    };
    vm.push(id, instruction.location)
}

/// Pushes the value of a local slot.
pub(crate) fn handle_load_local(
    instruction: &Instruction,
    vm: &mut Vm<'_>,
    _ctx: &mut RunContext,
) -> ScriptResult<()> {
    let value = vm.load_local(operand_local(&instruction.operands[0]));
    vm.push(value, instruction.location)
}

/// Pops the top value into a local slot.
pub(crate) fn handle_store_local(
    instruction: &Instruction,
    vm: &mut Vm<'_>,
    _ctx: &mut RunContext,
) -> ScriptResult<()> {
    let value = vm.pop();
    vm.store_local(operand_local(&instruction.operands[0]), value);
    Ok(())
}

/// Duplicates the top stack value.
pub(crate) fn handle_dup(
    instruction: &Instruction,
    vm: &mut Vm<'_>,
    _ctx: &mut RunContext,
) -> ScriptResult<()> {
    let top = vm.peek();
    vm.push(top, instruction.location)
}

/// Discards the top stack value.
pub(crate) fn handle_pop(
    _instruction: &Instruction,
    vm: &mut Vm<'_>,
    _ctx: &mut RunContext,
) -> ScriptResult<()> {
    vm.pop();
    Ok(())
}

/// Unconditional relative jump.
pub(crate) fn handle_jump(
    instruction: &Instruction,
    vm: &mut Vm<'_>,
    _ctx: &mut RunContext,
) -> ScriptResult<()> {
    vm.request_jump(operand_offset(&instruction.operands[0]));
    Ok(())
}

/// Pops a Boolean and jumps when it is false.
pub(crate) fn handle_branch(
    instruction: &Instruction,
    vm: &mut Vm<'_>,
    ctx: &mut RunContext,
) -> ScriptResult<()> {
    let condition = vm.pop();
    if !boolean(ctx, condition, instruction.location)? {
        vm.request_jump(operand_offset(&instruction.operands[0]));
    }
    Ok(())
}

/// Pops two values and applies a binary operator.
pub(crate) fn handle_binary_op(
    instruction: &Instruction,
    vm: &mut Vm<'_>,
    ctx: &mut RunContext,
) -> ScriptResult<()> {
    let location = instruction.location;
    let op = operand_binary(&instruction.operands[0]);
    let rhs = vm.pop();
    let lhs = vm.pop();

    let result = match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            let a = number(ctx, lhs, location)?;
            let b = number(ctx, rhs, location)?;
            if matches!(op, BinaryOp::Div | BinaryOp::Mod) && b == 0.0 {
                return Err(ScriptError::new(
                    ScriptErrorKind::NumberError {
                        message: "division by zero".to_string(),
                    },
                    location,
                ));
            }
            let value = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                BinaryOp::Mod => a % b,
                _ => unreachable!(),
            };
            ctx.heap.number(finite(value, location)?)
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let a = number(ctx, lhs, location)?;
            let b = number(ctx, rhs, location)?;
            let value = match op {
                BinaryOp::Lt => a < b,
                BinaryOp::Le => a <= b,
                BinaryOp::Gt => a > b,
                BinaryOp::Ge => a >= b,
                _ => unreachable!(),
            };
            ctx.heap.boolean(value)
        }
        BinaryOp::Eq | BinaryOp::Ne => {
            let equal = ctx.heap.get(lhs).payload == ctx.heap.get(rhs).payload;
            ctx.heap.boolean(if op == BinaryOp::Eq { equal } else { !equal })
        }
        BinaryOp::And | BinaryOp::Or => {
            let a = boolean(ctx, lhs, location)?;
            let b = boolean(ctx, rhs, location)?;
            ctx.heap
                .boolean(if op == BinaryOp::And { a && b } else { a || b })
        }
    };
    vm.push(result, location)
}

/// Pops one value and applies a unary operator.
pub(crate) fn handle_unary_op(
    instruction: &Instruction,
    vm: &mut Vm<'_>,
    ctx: &mut RunContext,
) -> ScriptResult<()> {
    let location = instruction.location;
    let value = vm.pop();
    let result = match operand_unary(&instruction.operands[0]) {
        UnaryOp::Neg => {
            let n = number(ctx, value, location)?;
            ctx.heap.number(-n)
        }
        UnaryOp::Not => {
            let b = boolean(ctx, value, location)?;
            ctx.heap.boolean(!b)
        }
    };
    vm.push(result, location)
}

/// Dispatches a native method call.
///
/// Arguments are popped in reverse push order; instance calls then pop the
/// receiver beneath them and dispatch on its runtime type. Static calls
/// dispatch on the type named in the operand.
pub(crate) fn handle_call_native(
    instruction: &Instruction,
    vm: &mut Vm<'_>,
    ctx: &mut RunContext,
) -> ScriptResult<()> {
    let location = instruction.location;
    let (type_name, method, kind) = operand_method(&instruction.operands[0]);
    let argc = operand_argc(&instruction.operands[1]);

    let mut args = vec![ctx.heap.null(); argc];
    for slot in args.iter_mut().rev() {
        *slot = vm.pop();
    }

    let (type_id, instance) = match kind {
        MethodKind::Static => {
            let type_id = vm.types().lookup(type_name).ok_or_else(|| {
                ScriptError::new(
                    ScriptErrorKind::NoSuchMethod {
                        type_name: type_name.to_string(),
                        method: method.to_string(),
                        kind,
                    },
                    location,
                )
            })?;
            (type_id, None)
        }
        MethodKind::Instance => {
            let receiver = vm.pop();
            (ctx.heap.get(receiver).type_id, Some(receiver))
        }
    };

    let def = vm.types().resolve(type_id, method, kind, location)?;
    let result = dispatch::invoke(def, ctx, location, instance, &args)?;
    vm.push(result, location)
}

/// Calls a script function, pushing a new call frame.
pub(crate) fn handle_call_function(
    instruction: &Instruction,
    vm: &mut Vm<'_>,
    ctx: &mut RunContext,
) -> ScriptResult<()> {
    let location = instruction.location;
    let name = operand_name(&instruction.operands[0]);
    let argc = operand_argc(&instruction.operands[1]);

    let mut args = vec![ctx.heap.null(); argc];
    for slot in args.iter_mut().rev() {
        *slot = vm.pop();
    }

    let result = vm.call_function(name, &args, location, ctx)?;
    vm.push(result, location)
}
