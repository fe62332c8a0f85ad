use orogen_foundation::{CodeLocation, Size2D};

use crate::bytecode::opcode::{Instruction, OpcodeKind};
use crate::bytecode::operand::{BinaryOp, Literal, LocalIndex, Operand, UnaryOp};
use crate::bytecode::{CodeBlock, ScriptArtifact, ScriptFunction};
use crate::context::{RunContext, RunPhase};
use crate::corelib;
use crate::dispatch::{MethodKind, TypeRegistry};
use crate::error::{ScriptErrorKind, ScriptResult};
use crate::heap::{ObjectId, ObjectPayload};
use crate::vm::Vm;

fn at(line: i32) -> CodeLocation {
    CodeLocation::new(line, 1)
}

fn instr(kind: OpcodeKind, operands: Vec<Operand>, line: i32) -> Instruction {
    Instruction::new(kind, operands, at(line))
}

fn push_number(value: f64, line: i32) -> Instruction {
    instr(
        OpcodeKind::PushLiteral,
        vec![Operand::Literal(Literal::Number(value))],
        line,
    )
}

fn binary(op: BinaryOp, line: i32) -> Instruction {
    instr(OpcodeKind::BinaryOp, vec![Operand::Binary(op)], line)
}

fn ret(line: i32) -> Instruction {
    instr(OpcodeKind::Return, vec![], line)
}

fn function_of(instructions: Vec<Instruction>, params: u32, locals: u32) -> ScriptFunction {
    let mut block = CodeBlock::new();
    for instruction in instructions {
        block.add_instruction(instruction);
    }
    ScriptFunction::new(params, locals, block)
}

fn single_function(name: &str, instructions: Vec<Instruction>, locals: u32) -> ScriptArtifact {
    let mut artifact = ScriptArtifact::new();
    artifact.add_function(name, function_of(instructions, 0, locals));
    artifact
}

/// Run `entry` in a fresh context; return the result and the context so
/// tests can inspect the heap and graph afterwards.
fn exec(artifact: &ScriptArtifact, entry: &str) -> (ScriptResult<ObjectId>, RunContext) {
    let mut registry = TypeRegistry::new();
    let builtins = corelib::install(&mut registry);
    let mut ctx = RunContext::new(builtins, 0, RunPhase::MapInfo);
    ctx.begin_generating(Size2D::new(32, 32));
    let mut vm = Vm::new(artifact, &registry);
    let result = vm.run_entry(entry, &[], &mut ctx);
    (result, ctx)
}

fn expect_number(result: &ScriptResult<ObjectId>, ctx: &RunContext) -> f64 {
    match ctx.heap.get(*result.as_ref().unwrap()).payload {
        ObjectPayload::Number(value) => value,
        ref other => panic!("expected Number result, got {other:?}"),
    }
}

#[test]
fn test_arithmetic_expression() {
    // (2 + 3) * 4
    let artifact = single_function(
        "main",
        vec![
            push_number(2.0, 1),
            push_number(3.0, 1),
            binary(BinaryOp::Add, 1),
            push_number(4.0, 1),
            binary(BinaryOp::Mul, 1),
            ret(1),
        ],
        0,
    );
    let (result, ctx) = exec(&artifact, "main");
    assert_eq!(expect_number(&result, &ctx), 20.0);
}

#[test]
fn test_unary_negation() {
    let artifact = single_function(
        "main",
        vec![
            push_number(7.0, 1),
            instr(OpcodeKind::UnaryOp, vec![Operand::Unary(UnaryOp::Neg)], 1),
            ret(1),
        ],
        0,
    );
    let (result, ctx) = exec(&artifact, "main");
    assert_eq!(expect_number(&result, &ctx), -7.0);
}

#[test]
fn test_locals_round_trip() {
    let artifact = single_function(
        "main",
        vec![
            push_number(11.0, 1),
            instr(
                OpcodeKind::StoreLocal,
                vec![Operand::Local(LocalIndex::new(0))],
                1,
            ),
            instr(
                OpcodeKind::LoadLocal,
                vec![Operand::Local(LocalIndex::new(0))],
                2,
            ),
            ret(2),
        ],
        1,
    );
    let (result, ctx) = exec(&artifact, "main");
    assert_eq!(expect_number(&result, &ctx), 11.0);
}

#[test]
fn test_branch_loop_accumulates() {
    // i = 5; total = 0; while i > 0 { total = total + i; i = i - 1 } return total
    let store = |slot: u32, line: i32| {
        instr(
            OpcodeKind::StoreLocal,
            vec![Operand::Local(LocalIndex::new(slot))],
            line,
        )
    };
    let load = |slot: u32, line: i32| {
        instr(
            OpcodeKind::LoadLocal,
            vec![Operand::Local(LocalIndex::new(slot))],
            line,
        )
    };
    let artifact = single_function(
        "main",
        vec![
            push_number(5.0, 1),  // 0
            store(0, 1),          // 1  i = 5
            push_number(0.0, 2),  // 2
            store(1, 2),          // 3  total = 0
            load(0, 3),           // 4  loop head
            push_number(0.0, 3),  // 5
            binary(BinaryOp::Gt, 3), // 6
            instr(OpcodeKind::Branch, vec![Operand::Offset(10)], 3), // 7 -> 17 when done
            load(1, 4),           // 8
            load(0, 4),           // 9
            binary(BinaryOp::Add, 4), // 10
            store(1, 4),          // 11 total += i
            load(0, 5),           // 12
            push_number(1.0, 5),  // 13
            binary(BinaryOp::Sub, 5), // 14
            store(0, 5),          // 15 i -= 1
            instr(OpcodeKind::Jump, vec![Operand::Offset(-12)], 5), // 16 -> 4
            load(1, 6),           // 17
            ret(6),               // 18
        ],
        2,
    );
    let (result, ctx) = exec(&artifact, "main");
    assert_eq!(expect_number(&result, &ctx), 15.0);
}

#[test]
fn test_script_function_call() {
    // helper(a, b) = a - b; main returns helper(9, 4)
    let mut artifact = ScriptArtifact::new();
    artifact.add_function(
        "helper",
        function_of(
            vec![
                instr(
                    OpcodeKind::LoadLocal,
                    vec![Operand::Local(LocalIndex::new(0))],
                    10,
                ),
                instr(
                    OpcodeKind::LoadLocal,
                    vec![Operand::Local(LocalIndex::new(1))],
                    10,
                ),
                binary(BinaryOp::Sub, 10),
                ret(10),
            ],
            2,
            2,
        ),
    );
    artifact.add_function(
        "main",
        function_of(
            vec![
                push_number(9.0, 1),
                push_number(4.0, 1),
                instr(
                    OpcodeKind::CallFunction,
                    vec![Operand::Name("helper".to_string()), Operand::Argc(2)],
                    1,
                ),
                ret(1),
            ],
            0,
            0,
        ),
    );
    let (result, ctx) = exec(&artifact, "main");
    assert_eq!(expect_number(&result, &ctx), 5.0);
}

#[test]
fn test_native_static_call_builds_step() {
    let artifact = single_function(
        "main",
        vec![
            push_number(500.0, 3),
            instr(
                OpcodeKind::CallNative,
                vec![
                    Operand::Method {
                        type_name: "HeightMap".to_string(),
                        method: "Flat".to_string(),
                        kind: MethodKind::Static,
                    },
                    Operand::Argc(1),
                ],
                3,
            ),
            ret(3),
        ],
        0,
    );
    let (result, ctx) = exec(&artifact, "main");
    assert!(matches!(
        ctx.heap.get(result.unwrap()).payload,
        ObjectPayload::HeightMap(_)
    ));
    let graph = ctx.graph().unwrap();
    assert_eq!(graph.steps().len(), 1);
    assert_eq!(graph.steps()[0].location, at(3));
}

#[test]
fn test_native_instance_call_dispatches_on_receiver_type() {
    // HeightMap.Flat(0).Fill(7): the Fill dispatch must resolve on the
    // receiver's runtime type.
    let artifact = single_function(
        "main",
        vec![
            push_number(0.0, 1),
            instr(
                OpcodeKind::CallNative,
                vec![
                    Operand::Method {
                        type_name: "HeightMap".to_string(),
                        method: "Flat".to_string(),
                        kind: MethodKind::Static,
                    },
                    Operand::Argc(1),
                ],
                1,
            ),
            push_number(7.0, 2),
            instr(
                OpcodeKind::CallNative,
                vec![
                    Operand::Method {
                        type_name: "HeightMap".to_string(),
                        method: "Fill".to_string(),
                        kind: MethodKind::Instance,
                    },
                    Operand::Argc(1),
                ],
                2,
            ),
            ret(2),
        ],
        0,
    );
    let (result, ctx) = exec(&artifact, "main");
    assert!(result.is_ok());
    assert_eq!(ctx.graph().unwrap().steps().len(), 2);
}

#[test]
fn test_unresolved_method_is_located_script_error() {
    let artifact = single_function(
        "main",
        vec![
            instr(
                OpcodeKind::CallNative,
                vec![
                    Operand::Method {
                        type_name: "HeightMap".to_string(),
                        method: "Erode".to_string(),
                        kind: MethodKind::Static,
                    },
                    Operand::Argc(0),
                ],
                12,
            ),
            ret(12),
        ],
        0,
    );
    let (result, _ctx) = exec(&artifact, "main");
    let error = result.unwrap_err();
    assert!(matches!(error.kind, ScriptErrorKind::NoSuchMethod { .. }));
    assert_eq!(error.location, at(12));
}

#[test]
fn test_division_by_zero_is_number_error() {
    let artifact = single_function(
        "main",
        vec![
            push_number(1.0, 4),
            push_number(0.0, 4),
            binary(BinaryOp::Div, 4),
            ret(4),
        ],
        0,
    );
    let (result, _ctx) = exec(&artifact, "main");
    let error = result.unwrap_err();
    assert!(matches!(error.kind, ScriptErrorKind::NumberError { .. }));
    assert_eq!(error.location, at(4));
}

#[test]
fn test_branch_on_number_is_type_error() {
    let artifact = single_function(
        "main",
        vec![
            push_number(1.0, 2),
            instr(OpcodeKind::Branch, vec![Operand::Offset(1)], 2),
            ret(2),
        ],
        0,
    );
    let (result, _ctx) = exec(&artifact, "main");
    assert!(matches!(
        result.unwrap_err().kind,
        ScriptErrorKind::TypeMismatch { .. }
    ));
}

#[test]
fn test_unbounded_recursion_is_script_error() {
    let artifact = single_function(
        "main",
        vec![
            instr(
                OpcodeKind::CallFunction,
                vec![Operand::Name("main".to_string()), Operand::Argc(0)],
                1,
            ),
            ret(1),
        ],
        0,
    );
    let (result, _ctx) = exec(&artifact, "main");
    assert!(matches!(
        result.unwrap_err().kind,
        ScriptErrorKind::CallDepthExceeded { .. }
    ));
}

#[test]
fn test_unknown_function_is_script_error() {
    let artifact = single_function("main", vec![ret(1)], 0);
    let (_, mut ctx) = exec(&artifact, "main");
    let mut registry = TypeRegistry::new();
    corelib::install(&mut registry);
    let mut vm = Vm::new(&artifact, &registry);
    let error = vm.run_entry("missing", &[], &mut ctx).unwrap_err();
    assert!(matches!(
        error.kind,
        ScriptErrorKind::UnknownFunction { .. }
    ));
}

#[test]
fn test_empty_block_returns_null() {
    let artifact = single_function("main", vec![], 0);
    let (result, ctx) = exec(&artifact, "main");
    assert_eq!(ctx.heap.get(result.unwrap()).payload, ObjectPayload::Null);
}

#[test]
fn test_equality_on_mixed_payloads() {
    // 1 == "1" is false, not a type error.
    let artifact = single_function(
        "main",
        vec![
            push_number(1.0, 1),
            instr(
                OpcodeKind::PushLiteral,
                vec![Operand::Literal(Literal::Str("1".to_string()))],
                1,
            ),
            binary(BinaryOp::Eq, 1),
            ret(1),
        ],
        0,
    );
    let (result, ctx) = exec(&artifact, "main");
    assert_eq!(
        ctx.heap.get(result.unwrap()).payload,
        ObjectPayload::Boolean(false)
    );
}

#[test]
#[should_panic(expected = "stack underflow")]
fn test_pop_on_empty_stack_panics() {
    let artifact = single_function("main", vec![instr(OpcodeKind::Pop, vec![], 1), ret(1)], 0);
    let _ = exec(&artifact, "main");
}

#[test]
#[should_panic(expected = "left extra values")]
fn test_unbalanced_return_panics() {
    let artifact = single_function(
        "main",
        vec![push_number(1.0, 1), push_number(2.0, 1), ret(1)],
        0,
    );
    let _ = exec(&artifact, "main");
}

#[test]
#[should_panic(expected = "escapes block")]
fn test_jump_out_of_block_panics() {
    let artifact = single_function(
        "main",
        vec![instr(OpcodeKind::Jump, vec![Operand::Offset(40)], 1), ret(1)],
        0,
    );
    let _ = exec(&artifact, "main");
}

#[test]
#[should_panic(expected = "carries 0 operands, expected 1")]
fn test_operand_shape_mismatch_panics() {
    let artifact = single_function(
        "main",
        vec![instr(OpcodeKind::PushLiteral, vec![], 1), ret(1)],
        0,
    );
    let _ = exec(&artifact, "main");
}

#[test]
#[should_panic(expected = "local slot 3 out of range")]
fn test_local_out_of_range_panics() {
    let artifact = single_function(
        "main",
        vec![
            instr(
                OpcodeKind::LoadLocal,
                vec![Operand::Local(LocalIndex::new(3))],
                1,
            ),
            ret(1),
        ],
        1,
    );
    let _ = exec(&artifact, "main");
}
