//! # Storage Seam
//!
//! The traits the external relational collaborator stands behind, plus the
//! in-memory reference implementation.
//!
//! All fallible operations return `Result<T, TrellisError>` so the
//! in-memory and disk-backed (redb) backends share one interface. The
//! in-memory store uses `BTreeMap` exclusively for deterministic
//! iteration.

use crate::primitives::MAX_VARIANT_LENGTH;
use crate::types::{
    ClassName, Edge, EdgeId, EdgeKindKey, EdgeType, EdgeTypeId, NewEdge, NodeId, NodeRecord,
    Tick, TrellisError,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// SORT ORDER
// =============================================================================

/// Ordering applied to edge selections.
///
/// Creation ticks can tie only through a buggy store, but ordering must be
/// total either way; ties break on `EdgeId` in the same direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    /// Newest relationship first — the default everywhere.
    #[default]
    CreatedDesc,
    /// Oldest relationship first.
    CreatedAsc,
    /// Whatever order the store iterates in; no guarantee.
    Unordered,
}

// =============================================================================
// EDGE FILTER (lowered archetype)
// =============================================================================

/// The store-level rendering of an archetype: every constraint resolved
/// to identities the backend can compare directly.
///
/// `None` on any field means "no constraint"; `Some` of an empty set
/// means "matches nothing" (a code filter that resolved to zero types).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeFilter {
    /// A-side endpoint identity.
    pub node_a: Option<NodeId>,
    /// B-side endpoint identity.
    pub node_b: Option<NodeId>,
    /// Restrict to these concrete kinds.
    pub kinds: Option<BTreeSet<EdgeKindKey>>,
    /// Restrict to these edge types.
    pub edge_types: Option<BTreeSet<EdgeTypeId>>,
    /// Exact match on variant data.
    pub variant: Option<String>,
    /// Match edges touching this node on either side.
    pub touching: Option<NodeId>,
}

impl EdgeFilter {
    /// The filter that matches every edge.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Whether an edge satisfies every present constraint.
    #[must_use]
    pub fn matches(&self, edge: &Edge) -> bool {
        if self.node_a.is_some_and(|id| edge.node_a != id) {
            return false;
        }
        if self.node_b.is_some_and(|id| edge.node_b != id) {
            return false;
        }
        if self
            .kinds
            .as_ref()
            .is_some_and(|kinds| !kinds.contains(&edge.kind))
        {
            return false;
        }
        if self
            .edge_types
            .as_ref()
            .is_some_and(|types| !types.contains(&edge.edge_type))
        {
            return false;
        }
        if let Some(variant) = &self.variant {
            if edge.variant.as_deref() != Some(variant.as_str()) {
                return false;
            }
        }
        if self
            .touching
            .is_some_and(|id| edge.node_a != id && edge.node_b != id)
        {
            return false;
        }
        true
    }
}

/// Sort a selection in place according to the order.
pub(crate) fn sort_edges(edges: &mut [Edge], order: SortOrder) {
    match order {
        SortOrder::CreatedDesc => {
            edges.sort_by(|a, b| (b.created, b.id).cmp(&(a.created, a.id)));
        }
        SortOrder::CreatedAsc => {
            edges.sort_by(|a, b| (a.created, a.id).cmp(&(b.created, b.id)));
        }
        SortOrder::Unordered => {}
    }
}

// =============================================================================
// EDGE STORE TRAIT
// =============================================================================

/// The edge/edge-type side of the relational collaborator.
///
/// Writes append; there is no update-in-place of endpoints once an edge
/// is persisted. Batch inserts are atomic on backends that support
/// transactions.
pub trait EdgeStore {
    /// Append a single edge, assigning identity and creation tick.
    fn insert_edge(&mut self, edge: NewEdge) -> Result<Edge, TrellisError>;

    /// Append a batch of edges in one storage transaction.
    fn insert_edges(&mut self, edges: Vec<NewEdge>) -> Result<Vec<Edge>, TrellisError>;

    /// Hard-delete a single edge.
    fn delete_edge(&mut self, id: EdgeId) -> Result<(), TrellisError>;

    /// Lookup an edge by identity.
    fn edge_by_id(&self, id: EdgeId) -> Result<Option<Edge>, TrellisError>;

    /// Select edges matching a filter, in the given order.
    fn select(&self, filter: &EdgeFilter, order: SortOrder) -> Result<Vec<Edge>, TrellisError>;

    /// Count edges matching a filter.
    fn count(&self, filter: &EdgeFilter) -> Result<usize, TrellisError>;

    /// Persist an edge-type record (write-through from the registry).
    fn put_edge_type(&mut self, edge_type: EdgeType) -> Result<(), TrellisError>;

    /// Load all persisted edge-type records.
    fn load_edge_types(&self) -> Result<Vec<EdgeType>, TrellisError>;
}

pub(crate) fn validate_new_edge(edge: &NewEdge) -> Result<(), TrellisError> {
    if let Some(variant) = &edge.variant {
        if variant.len() > MAX_VARIANT_LENGTH {
            return Err(TrellisError::InvalidRecord(format!(
                "variant data exceeds {} bytes",
                MAX_VARIANT_LENGTH
            )));
        }
    }
    Ok(())
}

// =============================================================================
// NODE STORE TRAIT
// =============================================================================

/// The node side of the relational collaborator.
///
/// Nodes are owned by the surrounding application; this layer only reads
/// identity and class projections back for endpoint queries.
pub trait NodeStore {
    /// Lookup a node by class and identity.
    fn by_id(&self, class: &ClassName, id: NodeId) -> Result<Option<NodeRecord>, TrellisError>;

    /// All nodes of a class, in identity order.
    fn get(&self, class: &ClassName) -> Result<Vec<NodeRecord>, TrellisError>;
}

// =============================================================================
// IN-MEMORY EDGE STORE
// =============================================================================

/// `BTreeMap`-backed edge store.
///
/// The reference implementation of [`EdgeStore`]: deterministic, volatile,
/// and cheap to stand up in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// Edge storage: EdgeId -> Edge.
    edges: BTreeMap<EdgeId, Edge>,
    /// Persisted edge types: EdgeTypeId -> EdgeType.
    edge_types: BTreeMap<EdgeTypeId, EdgeType>,
    /// Next available edge id.
    next_edge_id: u64,
    /// Monotonic creation stamp.
    tick: Tick,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted edges, preserving ids and ticks.
    #[must_use]
    pub fn from_edges(edges: Vec<Edge>) -> Self {
        let mut store = Self::new();
        for edge in edges {
            if edge.id.0 >= store.next_edge_id {
                store.next_edge_id = edge.id.0.saturating_add(1);
            }
            if edge.created >= store.tick {
                store.tick = edge.created;
            }
            store.edges.insert(edge.id, edge);
        }
        store
    }

    fn append(&mut self, edge: NewEdge) -> Result<Edge, TrellisError> {
        validate_new_edge(&edge)?;
        let id = EdgeId(self.next_edge_id);
        self.next_edge_id = self.next_edge_id.saturating_add(1);
        self.tick = self.tick.next();

        let record = Edge {
            id,
            kind: edge.kind,
            node_a: edge.node_a,
            node_b: edge.node_b,
            edge_type: edge.edge_type,
            variant: edge.variant,
            created: self.tick,
        };
        self.edges.insert(id, record.clone());
        Ok(record)
    }
}

impl EdgeStore for MemoryStore {
    fn insert_edge(&mut self, edge: NewEdge) -> Result<Edge, TrellisError> {
        self.append(edge)
    }

    fn insert_edges(&mut self, edges: Vec<NewEdge>) -> Result<Vec<Edge>, TrellisError> {
        // Validate everything before touching storage so the batch is
        // all-or-nothing, matching the transactional backend.
        for edge in &edges {
            validate_new_edge(edge)?;
        }
        edges.into_iter().map(|edge| self.append(edge)).collect()
    }

    fn delete_edge(&mut self, id: EdgeId) -> Result<(), TrellisError> {
        self.edges
            .remove(&id)
            .map(|_| ())
            .ok_or(TrellisError::EdgeNotFound(id))
    }

    fn edge_by_id(&self, id: EdgeId) -> Result<Option<Edge>, TrellisError> {
        Ok(self.edges.get(&id).cloned())
    }

    fn select(&self, filter: &EdgeFilter, order: SortOrder) -> Result<Vec<Edge>, TrellisError> {
        let mut selected: Vec<Edge> = self
            .edges
            .values()
            .filter(|edge| filter.matches(edge))
            .cloned()
            .collect();
        sort_edges(&mut selected, order);
        Ok(selected)
    }

    fn count(&self, filter: &EdgeFilter) -> Result<usize, TrellisError> {
        Ok(self.edges.values().filter(|edge| filter.matches(edge)).count())
    }

    fn put_edge_type(&mut self, edge_type: EdgeType) -> Result<(), TrellisError> {
        self.edge_types.insert(edge_type.id, edge_type);
        Ok(())
    }

    fn load_edge_types(&self) -> Result<Vec<EdgeType>, TrellisError> {
        Ok(self.edge_types.values().cloned().collect())
    }
}

// =============================================================================
// IN-MEMORY NODE STORE
// =============================================================================

/// `BTreeMap`-backed node store, standing in for the collaborator's ORM.
#[derive(Debug, Clone, Default)]
pub struct MemoryNodeStore {
    /// Class -> (NodeId -> NodeRecord).
    nodes: BTreeMap<ClassName, BTreeMap<NodeId, NodeRecord>>,
}

impl MemoryNodeStore {
    /// Create a new empty node store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node record, returning it for convenience.
    pub fn add(&mut self, class: impl Into<String>, id: u64) -> NodeRecord {
        let record = NodeRecord::new(NodeId(id), ClassName::new(class));
        self.nodes
            .entry(record.class.clone())
            .or_default()
            .insert(record.id, record.clone());
        record
    }
}

impl NodeStore for MemoryNodeStore {
    fn by_id(&self, class: &ClassName, id: NodeId) -> Result<Option<NodeRecord>, TrellisError> {
        Ok(self
            .nodes
            .get(class)
            .and_then(|records| records.get(&id))
            .cloned())
    }

    fn get(&self, class: &ClassName) -> Result<Vec<NodeRecord>, TrellisError> {
        Ok(self
            .nodes
            .get(class)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }
}

// =============================================================================
// TESTS
// =============================================================================
