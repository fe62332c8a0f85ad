//! Opcode registry linking metadata to handlers.
//!
//! The spec table is the single source of truth for opcode shape and
//! behavior. The VM validates operand counts against it and dispatches
//! through O(1) jump tables built lazily on first use.

use std::sync::OnceLock;

use super::handlers::{
    handle_binary_op, handle_branch, handle_call_function, handle_call_native, handle_dup,
    handle_jump, handle_load_local, handle_noop, handle_pop, handle_push_literal,
    handle_store_local, handle_unary_op, Handler,
};
use super::opcode::{OpcodeKind, OpcodeMetadata};

/// Metadata and handler specification for one opcode.
#[derive(Clone)]
pub struct OpcodeSpec {
    /// The opcode kind this specification covers.
    pub kind: OpcodeKind,
    /// Static shape metadata, used for validation.
    pub metadata: OpcodeMetadata,
    /// Execution handler.
    pub handler: Handler,
}

/// Total number of opcode kinds.
///
/// Must match the number of `OpcodeKind` variants; sizes the jump tables.
const OPCODE_COUNT: usize = 12;

/// The full list of opcode specifications.
pub fn opcode_specs() -> &'static [OpcodeSpec] {
    static SPECS: OnceLock<Vec<OpcodeSpec>> = OnceLock::new();
    SPECS.get_or_init(build_specs)
}

/// Index of an opcode's spec within [`opcode_specs`].
///
/// # Panics
///
/// Panics if any opcode kind is missing from the spec table.
fn spec_index(kind: OpcodeKind) -> usize {
    static TABLE: OnceLock<[usize; OPCODE_COUNT]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [usize::MAX; OPCODE_COUNT];
        for (index, spec) in opcode_specs().iter().enumerate() {
            table[spec.kind as usize] = index;
        }
        for (kind, entry) in table.iter().enumerate() {
            assert!(
                *entry != usize::MAX,
                "missing opcode spec for opcode index {kind}"
            );
        }
        table
    })[kind as usize]
}

/// Metadata for an opcode kind, in O(1).
pub fn metadata_for(kind: OpcodeKind) -> &'static OpcodeMetadata {
    &opcode_specs()[spec_index(kind)].metadata
}

/// Execution handler for an opcode kind, in O(1).
pub fn handler_for(kind: OpcodeKind) -> Handler {
    opcode_specs()[spec_index(kind)].handler
}

/// Master table pairing opcode kinds with shape and behavior.
fn build_specs() -> Vec<OpcodeSpec> {
    use OpcodeKind::*;

    macro_rules! op {
        ($kind:ident, $count:expr, $handler:ident) => {
            OpcodeSpec {
                kind: $kind,
                metadata: OpcodeMetadata {
                    operand_count: $count,
                },
                handler: $handler,
            }
        };
    }

    vec![
        op!(PushLiteral, 1, handle_push_literal),
        op!(LoadLocal, 1, handle_load_local),
        op!(StoreLocal, 1, handle_store_local),
        op!(Dup, 0, handle_dup),
        op!(Pop, 0, handle_pop),
        op!(Jump, 1, handle_jump),
        op!(Branch, 1, handle_branch),
        op!(BinaryOp, 1, handle_binary_op),
        op!(UnaryOp, 1, handle_unary_op),
        op!(CallNative, 2, handle_call_native),
        op!(CallFunction, 2, handle_call_function),
        op!(Return, 0, handle_noop),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_opcode_has_a_spec() {
        assert_eq!(opcode_specs().len(), OPCODE_COUNT);
        // Force the index table to verify completeness.
        for spec in opcode_specs() {
            let _ = metadata_for(spec.kind);
        }
    }
}
