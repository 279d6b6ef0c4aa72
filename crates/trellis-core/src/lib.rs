//! # trellis-core
//!
//! The typed-edge graph modeling layer for Trellis - THE LOGIC.
//!
//! Nodes live in an external relational store and are known here only by
//! identity and class tag. This crate owns everything between them:
//! - the **edge-type taxonomy** (codes, parent codes, implied codes,
//!   permission tokens) and its hierarchy lookups
//! - the **archetype** seam that turns endpoint references and type codes
//!   into one canonical query predicate
//! - the **query engine** (lazy handles, endpoint projections, history)
//! - the **edge lifecycle** (append-only `make` with implied-edge
//!   cascade, best-effort `remove`/`prune`)
//! - the **rule evaluator** gating creation (admin bypass, base
//!   permission, require-previous with implied fallback, target veto)
//!
//! ## Architectural Constraints
//!
//! - No async, no network dependencies (pure Rust)
//! - `BTreeMap` only; no wall-clock reads (creation stamps are store
//!   ticks)
//! - The store is a seam: in-memory and redb backends share one trait
//! - Permission denial is a value, never an error

// =============================================================================
// MODULES
// =============================================================================

pub mod archetype;
pub mod formats;
pub mod kinds;
pub mod lifecycle;
pub mod primitives;
pub mod query;
pub mod registry;
pub mod rules;
pub mod session;
pub mod storage;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    ClassName, Edge, EdgeId, EdgeKindKey, EdgeType, EdgeTypeId, EdgeTypeRef, NewEdge, NodeId,
    NodeRecord, NodeRef, Tick, TrellisError, TypeCode,
};

// =============================================================================
// RE-EXPORTS: Graph Layer
// =============================================================================

pub use archetype::{Archetype, Endpoint};
pub use kinds::{EdgeKind, EdgeKindConfig, KindRegistry};
pub use lifecycle::{prune, Lifecycle};
pub use query::{Engine, GraphQuery};
pub use registry::{merge_code_lists, CodeInput, EdgeTypeDef, EdgeTypeRegistry};
pub use rules::{
    AccessControl, AllowAll, CheckMode, NodeGate, RuleEvaluator, StaticAccessControl, Subject,
};
pub use session::{Session, StorageBackend};
pub use store::{
    EdgeFilter, EdgeStore, MemoryNodeStore, MemoryStore, NodeStore, SortOrder,
};
pub use storage::RedbStore;

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{snapshot_from_bytes, snapshot_to_bytes, Snapshot, SnapshotHeader};
