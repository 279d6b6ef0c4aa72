//! # Serialization Formats
//!
//! Binary snapshot format for the taxonomy and edge set.

pub mod persistence;

pub use persistence::{
    snapshot_from_bytes, snapshot_to_bytes, Snapshot, SnapshotHeader,
};
