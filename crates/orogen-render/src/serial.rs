//! Binary persistence envelope.
//!
//! Compiled artifacts and rendering graphs share one wire format: a 4-byte
//! magic tag, a little-endian `u16` format version, then a postcard payload.
//! Deserializing anything serialized here must reproduce a structurally
//! identical value; round-trip equality is part of the format contract and
//! is exercised by tests on both payload types.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::graph::StepGraph;

/// Magic tag opening every serialized Orogen artifact.
pub const MAGIC: [u8; 4] = *b"OGEN";

/// Current format version.
pub const FORMAT_VERSION: u16 = 1;

/// Errors decoding or encoding a serialized artifact.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The stream does not start with the Orogen magic tag.
    #[error("not an Orogen artifact (bad magic)")]
    BadMagic,

    /// The stream's format version is newer than this build understands.
    #[error("unsupported artifact format version {found} (supported: {FORMAT_VERSION})")]
    UnsupportedVersion {
        /// Version tag found in the stream.
        found: u16,
    },

    /// The stream ended before the envelope was complete.
    #[error("truncated artifact stream")]
    Truncated,

    /// The payload failed to encode or decode.
    #[error("artifact payload error: {0}")]
    Payload(#[from] postcard::Error),
}

/// Serialize a payload inside the version envelope.
pub fn encode_payload<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut bytes = Vec::with_capacity(64);
    bytes.extend_from_slice(&MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend(postcard::to_allocvec(value)?);
    Ok(bytes)
}

/// Deserialize a payload from the version envelope.
pub fn decode_payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    if bytes.len() < MAGIC.len() + 2 {
        return Err(CodecError::Truncated);
    }
    let (magic, rest) = bytes.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err(CodecError::BadMagic);
    }
    let (version, payload) = rest.split_at(2);
    let found = u16::from_le_bytes([version[0], version[1]]);
    if found != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion { found });
    }
    Ok(postcard::from_bytes(payload)?)
}

/// Serialize a rendering graph.
pub fn encode_graph(graph: &StepGraph) -> Result<Vec<u8>, CodecError> {
    encode_payload(graph)
}

/// Deserialize a rendering graph.
pub fn decode_graph(bytes: &[u8]) -> Result<StepGraph, CodecError> {
    decode_payload(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use orogen_foundation::{CodeLocation, Point, Size2D};

    use crate::step::StepKind;

    fn sample_graph() -> StepGraph {
        let mut g = StepGraph::new(Size2D::new(48, 32));
        let base = g.add_step(StepKind::Flat { height: -20 }, vec![], CodeLocation::new(3, 1));
        let grad = g.add_step(
            StepKind::RadialGradient {
                center: Point::new(24, 16),
                radius: 12,
                from: 500,
                to: -100,
            },
            vec![],
            CodeLocation::new(4, 1),
        );
        let sum = g.add_step(StepKind::Add, vec![base, grad], CodeLocation::new(5, 5));
        let dist = g.add_step(
            StepKind::DistanceMap { max_distance: 9 },
            vec![sum],
            CodeLocation::new(6, 5),
        );
        g.bind_output("main", dist);
        g.bind_output("raw", sum);
        g
    }

    #[test]
    fn test_graph_round_trip() {
        let graph = sample_graph();
        let bytes = encode_graph(&graph).unwrap();
        let decoded = decode_graph(&bytes).unwrap();
        assert_eq!(decoded.map_size(), graph.map_size());
        assert_eq!(decoded.slot_count(), graph.slot_count());
        assert_eq!(decoded.steps(), graph.steps());
        assert_eq!(decoded.outputs(), graph.outputs());
        // Re-serialization equality, byte for byte.
        assert_eq!(encode_graph(&decoded).unwrap(), bytes);
    }

    #[test]
    fn test_bad_magic_is_rejected() {
        let graph = sample_graph();
        let mut bytes = encode_graph(&graph).unwrap();
        bytes[0] = b'X';
        assert!(matches!(decode_graph(&bytes), Err(CodecError::BadMagic)));
    }

    #[test]
    fn test_future_version_is_rejected() {
        let graph = sample_graph();
        let mut bytes = encode_graph(&graph).unwrap();
        bytes[4] = 0xFF;
        bytes[5] = 0xFF;
        assert!(matches!(
            decode_graph(&bytes),
            Err(CodecError::UnsupportedVersion { found: 0xFFFF })
        ));
    }

    #[test]
    fn test_truncated_stream_is_rejected() {
        assert!(matches!(
            decode_graph(&MAGIC[..3]),
            Err(CodecError::Truncated)
        ));
    }
}
