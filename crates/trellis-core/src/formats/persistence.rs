//! # Snapshot Format
//!
//! Binary serialization for a graph layer snapshot: the edge-type
//! taxonomy plus the full edge set. File I/O stays with the caller; this
//! module is pure byte transformation.
//!
//! Format: Header (5 bytes) + postcard-serialized snapshot data.
//! - 4 bytes: Magic ("TRLS")
//! - 1 byte: Version
//!
//! Pre-deserialization validation guards against corrupted or hostile
//! data: the payload size cap and the header are checked before any
//! payload parsing happens.

use crate::primitives::{
    FORMAT_VERSION, MAGIC_BYTES, MAX_SNAPSHOT_PAYLOAD_SIZE, MIN_SNAPSHOT_SIZE,
};
use crate::types::{Edge, EdgeType, TrellisError};
use serde::{Deserialize, Serialize};

// =============================================================================
// SNAPSHOT
// =============================================================================

/// A serializable snapshot of the taxonomy and edge set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Snapshot {
    /// All edge-type records, ids preserved.
    pub edge_types: Vec<EdgeType>,
    /// All edges, ids and creation ticks preserved.
    pub edges: Vec<Edge>,
}

// =============================================================================
// FILE HEADER
// =============================================================================

/// The snapshot header precedes all payload data.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl SnapshotHeader {
    /// Create a new header with the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *MAGIC_BYTES,
            version: FORMAT_VERSION,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), TrellisError> {
        if &self.magic != MAGIC_BYTES {
            return Err(TrellisError::DeserializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != FORMAT_VERSION {
            return Err(TrellisError::DeserializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version, FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 5] {
        let mut bytes = [0u8; 5];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TrellisError> {
        if bytes.len() < MIN_SNAPSHOT_SIZE {
            return Err(TrellisError::DeserializationError(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a snapshot to bytes (header + payload).
pub fn snapshot_to_bytes(snapshot: &Snapshot) -> Result<Vec<u8>, TrellisError> {
    let header = SnapshotHeader::new();
    let payload = postcard::to_stdvec(snapshot)
        .map_err(|e| TrellisError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(MIN_SNAPSHOT_SIZE + payload.len());
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize a snapshot from bytes.
///
/// Validates minimum size, maximum size, and the header — in that order —
/// before any payload deserialization.
pub fn snapshot_from_bytes(bytes: &[u8]) -> Result<Snapshot, TrellisError> {
    if bytes.len() < MIN_SNAPSHOT_SIZE {
        return Err(TrellisError::DeserializationError(
            "Data too short: minimum 5 bytes required".to_string(),
        ));
    }
    if bytes.len() > MAX_SNAPSHOT_PAYLOAD_SIZE {
        return Err(TrellisError::DeserializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_SNAPSHOT_PAYLOAD_SIZE
        )));
    }

    let header = SnapshotHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = &bytes[MIN_SNAPSHOT_SIZE..];
    postcard::from_bytes(payload).map_err(|e| {
        TrellisError::DeserializationError(format!("Failed to deserialize snapshot: {}", e))
    })
}

// =============================================================================
// TESTS
// =============================================================================
