//! Binary envelope for deltas and snapshots
//!
//! Encoded updates leave the replica as a CBOR envelope:
//!
//! ```text
//! { version: 1, kind: "delta" | "snapshot", chunks: [bytes, ...] }
//! ```
//!
//! A delta carries one chunk per Automerge change so every change can be
//! parsed before any of them is applied. A snapshot carries a single chunk
//! holding a saved Automerge document.

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use thiserror::Error;

/// Envelope version written by this build
pub const WIRE_VERSION: u8 = 1;

/// Errors produced while decoding an envelope
#[derive(Error, Debug)]
pub enum WireError {
    #[error("Malformed envelope: {0}")]
    Malformed(String),

    #[error("Unsupported envelope version {0} (this build reads up to {max})", max = WIRE_VERSION)]
    UnsupportedVersion(u8),

    #[error("Snapshot envelope must carry exactly one chunk, found {0}")]
    SnapshotChunks(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Kind {
    Delta,
    Snapshot,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u8,
    kind: Kind,
    chunks: Vec<ByteBuf>,
}

/// A decoded envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Raw Automerge change chunks
    Delta(Vec<Vec<u8>>),
    /// A saved Automerge document
    Snapshot(Vec<u8>),
}

/// Wrap change chunks in a delta envelope
pub fn encode_delta(changes: Vec<Vec<u8>>) -> Vec<u8> {
    encode(Envelope {
        version: WIRE_VERSION,
        kind: Kind::Delta,
        chunks: changes.into_iter().map(ByteBuf::from).collect(),
    })
}

/// Wrap a saved document in a snapshot envelope
pub fn encode_snapshot(document: Vec<u8>) -> Vec<u8> {
    encode(Envelope {
        version: WIRE_VERSION,
        kind: Kind::Snapshot,
        chunks: vec![ByteBuf::from(document)],
    })
}

/// Decode an envelope without touching any document
pub fn decode(bytes: &[u8]) -> Result<Payload, WireError> {
    let envelope: Envelope =
        ciborium::from_reader(bytes).map_err(|e| WireError::Malformed(e.to_string()))?;

    if envelope.version == 0 || envelope.version > WIRE_VERSION {
        return Err(WireError::UnsupportedVersion(envelope.version));
    }

    let mut chunks: Vec<Vec<u8>> = envelope
        .chunks
        .into_iter()
        .map(ByteBuf::into_vec)
        .collect();

    match envelope.kind {
        Kind::Delta => Ok(Payload::Delta(chunks)),
        Kind::Snapshot => match chunks.len() {
            1 => Ok(Payload::Snapshot(chunks.remove(0))),
            n => Err(WireError::SnapshotChunks(n)),
        },
    }
}

fn encode(envelope: Envelope) -> Vec<u8> {
    let mut bytes = Vec::new();
    ciborium::into_writer(&envelope, &mut bytes).expect("CBOR encoding failed");
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_decodes_chunks_in_order() {
        let bytes = encode_delta(vec![vec![1, 2], vec![3]]);
        assert_eq!(
            decode(&bytes).unwrap(),
            Payload::Delta(vec![vec![1, 2], vec![3]])
        );
    }

    #[test]
    fn test_empty_delta_is_valid() {
        let bytes = encode_delta(Vec::new());
        assert_eq!(decode(&bytes).unwrap(), Payload::Delta(Vec::new()));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let err = decode(b"definitely not cbor").unwrap_err();
        assert!(matches!(err, WireError::Malformed(_)));

        let err = decode(&[]).unwrap_err();
        assert!(matches!(err, WireError::Malformed(_)));
    }

    #[test]
    fn test_future_version_rejected() {
        let mut bytes = Vec::new();
        ciborium::into_writer(
            &Envelope {
                version: WIRE_VERSION + 1,
                kind: Kind::Delta,
                chunks: Vec::new(),
            },
            &mut bytes,
        )
        .unwrap();

        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, WireError::UnsupportedVersion(2)));
    }

    #[test]
    fn test_snapshot_with_two_chunks_rejected() {
        let mut bytes = Vec::new();
        ciborium::into_writer(
            &Envelope {
                version: WIRE_VERSION,
                kind: Kind::Snapshot,
                chunks: vec![ByteBuf::from(vec![1]), ByteBuf::from(vec![2])],
            },
            &mut bytes,
        )
        .unwrap();

        assert!(matches!(
            decode(&bytes).unwrap_err(),
            WireError::SnapshotChunks(2)
        ));
    }
}
