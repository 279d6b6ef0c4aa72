//! # Persistent Storage
//!
//! Disk-backed storage backends for the edge store seam.

pub mod redb_store;

pub use redb_store::RedbStore;
