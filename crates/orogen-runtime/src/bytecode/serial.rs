//! Binary persistence for compiled scripts.
//!
//! Artifacts share the render crate's envelope (magic, version, postcard
//! payload), so a precompiled script and a serialized step graph are
//! recognizably the same family of file. The round-trip contract: decoding
//! an encoded artifact reproduces a structurally identical one - same
//! function order, instruction order, operand values, and locations.

use orogen_render::serial::{decode_payload, encode_payload, CodecError};

use super::block::ScriptArtifact;

/// Serialize a compiled script.
pub fn encode_script(artifact: &ScriptArtifact) -> Result<Vec<u8>, CodecError> {
    encode_payload(artifact)
}

/// Deserialize a compiled script.
pub fn decode_script(bytes: &[u8]) -> Result<ScriptArtifact, CodecError> {
    decode_payload(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::opcode::{Instruction, OpcodeKind};
    use crate::bytecode::operand::{BinaryOp, Literal, LocalIndex, Operand, UnaryOp};
    use crate::bytecode::{CodeBlock, ScriptFunction};
    use crate::dispatch::MethodKind;
    use orogen_foundation::CodeLocation;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_literal(rng: &mut StdRng) -> Literal {
        match rng.gen_range(0..4) {
            0 => Literal::Null,
            1 => Literal::Boolean(rng.gen()),
            2 => Literal::Number(rng.gen_range(-1e6..1e6)),
            _ => Literal::Str(format!("s{}", rng.gen_range(0..1000))),
        }
    }

    fn random_instruction(rng: &mut StdRng) -> Instruction {
        let location = CodeLocation::new(rng.gen_range(1..500), rng.gen_range(1..80));
        let kinds = [
            OpcodeKind::PushLiteral,
            OpcodeKind::LoadLocal,
            OpcodeKind::StoreLocal,
            OpcodeKind::Dup,
            OpcodeKind::Pop,
            OpcodeKind::Jump,
            OpcodeKind::Branch,
            OpcodeKind::BinaryOp,
            OpcodeKind::UnaryOp,
            OpcodeKind::CallNative,
            OpcodeKind::CallFunction,
            OpcodeKind::Return,
        ];
        let kind = kinds[rng.gen_range(0..kinds.len())];
        let operands = match kind {
            OpcodeKind::PushLiteral => vec![Operand::Literal(random_literal(rng))],
            OpcodeKind::LoadLocal | OpcodeKind::StoreLocal => {
                vec![Operand::Local(LocalIndex::new(rng.gen_range(0..16)))]
            }
            OpcodeKind::Jump | OpcodeKind::Branch => {
                vec![Operand::Offset(rng.gen_range(-20..20))]
            }
            OpcodeKind::BinaryOp => vec![Operand::Binary(BinaryOp::Add)],
            OpcodeKind::UnaryOp => vec![Operand::Unary(UnaryOp::Neg)],
            OpcodeKind::CallNative => vec![
                Operand::Method {
                    type_name: "HeightMap".to_string(),
                    method: "Flat".to_string(),
                    kind: if rng.gen() {
                        MethodKind::Static
                    } else {
                        MethodKind::Instance
                    },
                },
                Operand::Argc(rng.gen_range(0..5)),
            ],
            OpcodeKind::CallFunction => vec![
                Operand::Name(format!("f{}", rng.gen_range(0..10))),
                Operand::Argc(rng.gen_range(0..5)),
            ],
            OpcodeKind::Dup | OpcodeKind::Pop | OpcodeKind::Return => vec![],
        };
        Instruction::new(kind, operands, location)
    }

    fn random_artifact(rng: &mut StdRng) -> ScriptArtifact {
        let mut artifact = ScriptArtifact::new();
        let functions = rng.gen_range(1..6);
        for index in 0..functions {
            let mut block = CodeBlock::new();
            for _ in 0..rng.gen_range(0..40) {
                block.add_instruction(random_instruction(rng));
            }
            let params = rng.gen_range(0..4);
            let locals = params + rng.gen_range(0..4);
            artifact.add_function(format!("f{index}"), ScriptFunction::new(params, locals, block));
        }
        artifact
    }

    #[test]
    fn test_round_trip_random_artifacts() {
        let mut rng = StdRng::seed_from_u64(0x5EED_C0DE);
        for _ in 0..50 {
            let artifact = random_artifact(&mut rng);
            let bytes = encode_script(&artifact).unwrap();
            let decoded = decode_script(&bytes).unwrap();
            assert_eq!(decoded, artifact);
            // Re-serialization equality, byte for byte.
            assert_eq!(encode_script(&decoded).unwrap(), bytes);
        }
    }

    #[test]
    fn test_empty_artifact_round_trips() {
        let artifact = ScriptArtifact::new();
        let decoded = decode_script(&encode_script(&artifact).unwrap()).unwrap();
        assert_eq!(decoded, artifact);
    }

    #[test]
    fn test_truncated_payload_fails_cleanly() {
        let bytes = encode_script(&ScriptArtifact::new()).unwrap();
        let truncated = &bytes[..bytes.len() - 1];
        assert!(decode_script(truncated).is_err());
    }
}
