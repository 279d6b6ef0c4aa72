//! # Session Module
//!
//! The facade callers hold: one object owning the storage backend, the
//! two registries, and the rule machinery, exposing the graph surface
//! (`make_edge`, `remove_edges`, `query_graph`, `check_permission`,
//! `implementors`, projections and history).
//!
//! ## Storage Backends
//!
//! Session supports two storage backends:
//! - `InMemory`: uses the in-memory `MemoryStore` (fast, volatile unless
//!   explicitly snapshotted)
//! - `Persistent`: uses `RedbStore` for disk-backed ACID storage
//!
//! Boolean-returning operations (`remove_edges`, `prune`,
//! `check_permission`) convert storage failures to their deny/failure
//! value after logging — permission denial and deletion failure are
//! values here, never exceptions.

use crate::archetype::Archetype;
use crate::formats::persistence::Snapshot;
use crate::kinds::{EdgeKind, KindRegistry};
use crate::lifecycle::{self, log_and_default, Lifecycle};
use crate::query::{Engine, GraphQuery};
use crate::registry::{EdgeTypeDef, EdgeTypeRegistry};
use crate::rules::{AccessControl, AllowAll, NodeGate, RuleEvaluator, StaticAccessControl, Subject};
use crate::store::{EdgeFilter, EdgeStore, MemoryNodeStore, MemoryStore, NodeStore, SortOrder};
use crate::storage::RedbStore;
use crate::types::{
    ClassName, Edge, EdgeId, EdgeKindKey, EdgeType, EdgeTypeId, NewEdge, NodeRecord, NodeRef,
    TrellisError, TypeCode,
};
use std::collections::BTreeSet;
use std::path::Path;

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Storage backend for a Session.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory store (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

// NOTE: StorageBackend does NOT implement Clone.
// RedbStore (database handle) cannot be safely cloned.

impl EdgeStore for StorageBackend {
    fn insert_edge(&mut self, edge: NewEdge) -> Result<Edge, TrellisError> {
        match self {
            Self::InMemory(store) => store.insert_edge(edge),
            Self::Persistent(store) => store.insert_edge(edge),
        }
    }

    fn insert_edges(&mut self, edges: Vec<NewEdge>) -> Result<Vec<Edge>, TrellisError> {
        match self {
            Self::InMemory(store) => store.insert_edges(edges),
            Self::Persistent(store) => store.insert_edges(edges),
        }
    }

    fn delete_edge(&mut self, id: EdgeId) -> Result<(), TrellisError> {
        match self {
            Self::InMemory(store) => store.delete_edge(id),
            Self::Persistent(store) => store.delete_edge(id),
        }
    }

    fn edge_by_id(&self, id: EdgeId) -> Result<Option<Edge>, TrellisError> {
        match self {
            Self::InMemory(store) => store.edge_by_id(id),
            Self::Persistent(store) => store.edge_by_id(id),
        }
    }

    fn select(&self, filter: &EdgeFilter, order: SortOrder) -> Result<Vec<Edge>, TrellisError> {
        match self {
            Self::InMemory(store) => store.select(filter, order),
            Self::Persistent(store) => store.select(filter, order),
        }
    }

    fn count(&self, filter: &EdgeFilter) -> Result<usize, TrellisError> {
        match self {
            Self::InMemory(store) => store.count(filter),
            Self::Persistent(store) => store.count(filter),
        }
    }

    fn put_edge_type(&mut self, edge_type: EdgeType) -> Result<(), TrellisError> {
        match self {
            Self::InMemory(store) => store.put_edge_type(edge_type),
            Self::Persistent(store) => store.put_edge_type(edge_type),
        }
    }

    fn load_edge_types(&self) -> Result<Vec<EdgeType>, TrellisError> {
        match self {
            Self::InMemory(store) => store.load_edge_types(),
            Self::Persistent(store) => store.load_edge_types(),
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// A Session combines a storage backend with the registries and rule
/// machinery.
///
/// Note: Session does NOT implement Clone; the persistent backend holds a
/// database handle.
pub struct Session {
    /// The storage backend (in-memory or persistent).
    backend: StorageBackend,
    /// The collaborator's node store.
    nodes: Box<dyn NodeStore>,
    /// The edge-type taxonomy.
    types: EdgeTypeRegistry,
    /// The concrete edge kinds.
    kinds: KindRegistry,
    /// Rule evaluation configuration.
    evaluator: RuleEvaluator,
    /// The external permission subsystem.
    access: Box<dyn AccessControl>,
    /// The target node veto hook.
    gate: Box<dyn NodeGate>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("backend", &self.backend)
            .field("types", &self.types.len())
            .field("kinds", &self.kinds.len())
            .finish_non_exhaustive()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create a new empty session with in-memory storage, an empty node
    /// store, and a permission subsystem with no grants (ungated edge
    /// types remain usable).
    #[must_use]
    pub fn new() -> Self {
        Self {
            backend: StorageBackend::default(),
            nodes: Box::new(MemoryNodeStore::new()),
            types: EdgeTypeRegistry::new(),
            kinds: KindRegistry::new(),
            evaluator: RuleEvaluator::new(),
            access: Box::new(StaticAccessControl::new()),
            gate: Box::new(AllowAll),
        }
    }

    /// Create a session with persistent redb storage.
    ///
    /// Opens or creates a database at the given path and loads the
    /// persisted edge-type taxonomy into the registry.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, TrellisError> {
        let store = RedbStore::open(path)?;
        let types = EdgeTypeRegistry::from_types(store.load_edge_types()?)?;
        Ok(Self {
            backend: StorageBackend::Persistent(store),
            types,
            ..Self::new()
        })
    }

    /// Replace the node store (the collaborator's ORM seam).
    #[must_use]
    pub fn with_nodes(mut self, nodes: impl NodeStore + 'static) -> Self {
        self.nodes = Box::new(nodes);
        self
    }

    /// Replace the permission subsystem.
    #[must_use]
    pub fn with_access_control(mut self, access: impl AccessControl + 'static) -> Self {
        self.access = Box::new(access);
        self
    }

    /// Replace the target node veto hook.
    #[must_use]
    pub fn with_gate(mut self, gate: impl NodeGate + 'static) -> Self {
        self.gate = Box::new(gate);
        self
    }

    /// Replace the rule evaluator configuration.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: RuleEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    // =========================================================================
    // CONFIGURATION
    // =========================================================================

    /// Define an edge type, persisting it through to the backend.
    pub fn define_edge_type(&mut self, def: EdgeTypeDef) -> Result<EdgeType, TrellisError> {
        let record = self.types.define(def)?;
        self.backend.put_edge_type(record.clone())?;
        Ok(record)
    }

    /// Register a concrete edge kind.
    pub fn register_kind(&mut self, kind: EdgeKind) -> Result<(), TrellisError> {
        self.kinds.register(kind)
    }

    /// The edge-type taxonomy.
    #[must_use]
    pub fn types(&self) -> &EdgeTypeRegistry {
        &self.types
    }

    /// The kind registry.
    #[must_use]
    pub fn kinds(&self) -> &KindRegistry {
        &self.kinds
    }

    // =========================================================================
    // QUERY SURFACE
    // =========================================================================

    fn engine(&self) -> Engine<'_> {
        Engine::new(&self.backend, &self.types, &self.kinds)
    }

    /// Build a lazy query over edges between the referenced endpoints.
    ///
    /// At least one constraint must be present; use
    /// [`query_all`](Self::query_all) for deliberate "every edge"
    /// semantics.
    pub fn query_graph(
        &self,
        node_a: Option<&NodeRef>,
        node_b: Option<&NodeRef>,
        codes: &[TypeCode],
        variant: &str,
    ) -> Result<GraphQuery, TrellisError> {
        let archetype = Archetype::new(node_a, node_b, codes)?;
        Ok(GraphQuery::new(archetype).with_variant(variant))
    }

    /// The deliberately-unconstrained query over every edge.
    #[must_use]
    pub fn query_all(&self) -> GraphQuery {
        GraphQuery::new(Archetype::unconstrained())
    }

    /// Execute a query.
    pub fn edges(&self, query: &GraphQuery) -> Result<Vec<Edge>, TrellisError> {
        self.engine().edges(query)
    }

    /// Count matching edges.
    pub fn count(&self, query: &GraphQuery) -> Result<usize, TrellisError> {
        self.engine().count(query)
    }

    /// An arbitrary matching edge; no ordering guarantee.
    pub fn one(&self, query: &GraphQuery) -> Result<Option<Edge>, TrellisError> {
        self.engine().one(query)
    }

    /// The newest matching edge.
    pub fn latest(&self, query: &GraphQuery) -> Result<Option<Edge>, TrellisError> {
        self.engine().latest(query)
    }

    /// The oldest matching edge.
    pub fn oldest(&self, query: &GraphQuery) -> Result<Option<Edge>, TrellisError> {
        self.engine().oldest(query)
    }

    /// Whether an edge of any of the coded types exists between the two
    /// nodes.
    pub fn exists_by_type(
        &self,
        node_a: &NodeRecord,
        node_b: &NodeRecord,
        codes: &[TypeCode],
    ) -> Result<bool, TrellisError> {
        let a = NodeRef::from(node_a);
        let b = NodeRef::from(node_b);
        let query = self.query_graph(Some(&a), Some(&b), codes, "")?;
        self.engine().exists(&query)
    }

    /// All edges ever recorded between two nodes, oldest first.
    pub fn history(
        &self,
        node_a: &NodeRecord,
        node_b: &NodeRecord,
        codes: &[TypeCode],
    ) -> Result<Vec<Edge>, TrellisError> {
        self.engine().history(node_a, node_b, codes)
    }

    /// All edges touching a node on either side, optionally restricted to
    /// one kind and a set of type codes (hierarchy-tolerant).
    ///
    /// An explicitly named kind must exist; omitting it is the non-error
    /// path.
    pub fn edges_for_node(
        &self,
        node: &NodeRecord,
        kind: Option<&EdgeKindKey>,
        codes: &[TypeCode],
    ) -> Result<Vec<Edge>, TrellisError> {
        let mut filter = EdgeFilter {
            touching: Some(node.id),
            ..EdgeFilter::default()
        };
        if let Some(kind) = kind {
            if self.kinds.get(kind).is_none() {
                return Err(TrellisError::UnknownEdgeKind(kind.0.clone()));
            }
            filter.kinds = Some(BTreeSet::from([kind.clone()]));
        }
        if !codes.is_empty() {
            let type_ids: BTreeSet<EdgeTypeId> = self
                .types
                .get_hierarchy(None, None, codes)
                .into_iter()
                .map(|edge_type| edge_type.id)
                .collect();
            filter.edge_types = Some(type_ids);
        }
        self.backend.select(&filter, SortOrder::CreatedDesc)
    }

    /// The A-side node objects connected to `node_b`, distinct, newest
    /// edge first.
    pub fn node_as_for(
        &self,
        node_b: &NodeRecord,
        codes: &[TypeCode],
    ) -> Result<Vec<NodeRecord>, TrellisError> {
        let b = NodeRef::from(node_b);
        let query = GraphQuery::new(Archetype::new(None, Some(&b), codes)?);
        self.engine().node_as(self.nodes.as_ref(), &query)
    }

    /// The B-side node objects connected to `node_a`, distinct, newest
    /// edge first.
    pub fn node_bs_for(
        &self,
        node_a: &NodeRecord,
        codes: &[TypeCode],
    ) -> Result<Vec<NodeRecord>, TrellisError> {
        let a = NodeRef::from(node_a);
        let query = GraphQuery::new(Archetype::new(Some(&a), None, codes)?);
        self.engine().node_bs(self.nodes.as_ref(), &query)
    }

    /// The kinds implementing an edge between two node classes.
    #[must_use]
    pub fn implementors(
        &self,
        node_a: Option<&ClassName>,
        node_b: Option<&ClassName>,
        strict: bool,
    ) -> Vec<EdgeKindKey> {
        self.kinds
            .implementors(node_a, node_b, strict)
            .into_iter()
            .map(|kind| kind.key.clone())
            .collect()
    }

    // =========================================================================
    // LIFECYCLE SURFACE
    // =========================================================================

    /// Create edges of the coded type between two nodes.
    ///
    /// Returns every edge created (direct plus implied); empty when the
    /// permission gate denies or no edge type matches.
    pub fn make_edge(
        &mut self,
        node_a: &NodeRecord,
        node_b: &NodeRecord,
        code: &TypeCode,
        variant: Option<&str>,
        create_implied: bool,
    ) -> Result<Vec<Edge>, TrellisError> {
        let Self {
            backend,
            types,
            kinds,
            evaluator,
            access,
            gate,
            ..
        } = self;
        let lifecycle = Lifecycle::new(types, kinds, evaluator, access.as_ref(), gate.as_ref());
        lifecycle.make(backend, node_a, node_b, code, variant, create_implied, None)
    }

    /// Remove all edges of a coded type between two nodes.
    ///
    /// `true` only when the permission gate passed and every deletion
    /// succeeded; vacuously `true` when nothing matches. Storage failures
    /// are logged and reported as `false`.
    pub fn remove_edges(
        &mut self,
        node_a: &NodeRecord,
        node_b: &NodeRecord,
        code: &TypeCode,
    ) -> bool {
        let Self {
            backend,
            types,
            kinds,
            evaluator,
            access,
            gate,
            ..
        } = self;
        let lifecycle = Lifecycle::new(types, kinds, evaluator, access.as_ref(), gate.as_ref());
        log_and_default(
            lifecycle.remove(backend, node_a, node_b, code, None),
            "remove_edges",
        )
    }

    /// Delete a single edge; failure is logged, non-fatal, and reported
    /// as `false`.
    pub fn prune(&mut self, id: EdgeId) -> bool {
        lifecycle::prune(&mut self.backend, id)
    }

    /// Whether the subject may create an edge of any of the coded types
    /// between the referenced nodes.
    ///
    /// Read-only; storage failures are logged and reported as deny.
    #[must_use]
    pub fn check_permission(
        &self,
        from: &NodeRef,
        to: &NodeRef,
        codes: &[TypeCode],
        subject: Option<&Subject>,
    ) -> bool {
        log_and_default(
            self.lifecycle_check(from, to, codes, subject),
            "check_permission",
        )
    }

    fn lifecycle_check(
        &self,
        from: &NodeRef,
        to: &NodeRef,
        codes: &[TypeCode],
        subject: Option<&Subject>,
    ) -> Result<bool, TrellisError> {
        self.evaluator.check_permission(
            self.access.as_ref(),
            self.gate.as_ref(),
            &self.types,
            &self.backend,
            from,
            to,
            codes,
            subject,
        )
    }

    // =========================================================================
    // SNAPSHOTS
    // =========================================================================

    /// Capture the taxonomy and edge set as a snapshot.
    pub fn snapshot(&self) -> Result<Snapshot, TrellisError> {
        Ok(Snapshot {
            edge_types: self.types.iter().cloned().collect(),
            edges: self
                .backend
                .select(&EdgeFilter::any(), SortOrder::CreatedAsc)?,
        })
    }

    /// Rebuild an in-memory session from a snapshot.
    ///
    /// Kinds, access control and the node store are configuration, not
    /// data; re-attach them through the `with_*` builders.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, TrellisError> {
        let types = EdgeTypeRegistry::from_types(snapshot.edge_types)?;
        let mut store = MemoryStore::from_edges(snapshot.edges);
        for edge_type in types.iter() {
            store.put_edge_type(edge_type.clone())?;
        }
        Ok(Self {
            backend: StorageBackend::InMemory(store),
            types,
            ..Self::new()
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
