//! # Edge Graph Query Engine
//!
//! Lazy query handles over the edge store, built from archetypes.
//!
//! `GraphQuery` is plain data: building one executes nothing, and every
//! accessor re-filters from the same handle. Execution happens through
//! [`Engine`], which borrows the store and both registries and lowers the
//! archetype into a store-level [`EdgeFilter`]:
//! - endpoint identities pass through directly;
//! - endpoint classes resolve to the kinds implementing them;
//! - type codes resolve through the taxonomy to edge-type ids.

use crate::archetype::{Archetype, Endpoint};
use crate::kinds::KindRegistry;
use crate::registry::EdgeTypeRegistry;
use crate::store::{EdgeFilter, EdgeStore, NodeStore, SortOrder};
use crate::types::{Edge, NodeId, NodeRecord, NodeRef, TrellisError, TypeCode};
use std::collections::BTreeSet;

// =============================================================================
// GRAPH QUERY (lazy handle)
// =============================================================================

/// A lazy, re-filterable query over edges.
#[derive(Debug, Clone, Default)]
pub struct GraphQuery {
    archetype: Archetype,
    variant: Option<String>,
    sort: Option<SortOrder>,
}

impl GraphQuery {
    /// Wrap an archetype in a query handle.
    #[must_use]
    pub fn new(archetype: Archetype) -> Self {
        Self {
            archetype,
            variant: None,
            sort: None,
        }
    }

    /// Additionally filter by exact variant data.
    #[must_use]
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        let variant = variant.into();
        self.variant = (!variant.is_empty()).then_some(variant);
        self
    }

    /// Override the default sort order.
    #[must_use]
    pub fn sorted(mut self, order: SortOrder) -> Self {
        self.sort = Some(order);
        self
    }

    /// The underlying archetype.
    #[must_use]
    pub fn archetype(&self) -> &Archetype {
        &self.archetype
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Borrowed view over the store and registries that executes queries.
pub struct Engine<'g> {
    store: &'g dyn EdgeStore,
    types: &'g EdgeTypeRegistry,
    kinds: &'g KindRegistry,
}

impl<'g> Engine<'g> {
    /// Assemble an engine over the given collaborators.
    #[must_use]
    pub fn new(
        store: &'g dyn EdgeStore,
        types: &'g EdgeTypeRegistry,
        kinds: &'g KindRegistry,
    ) -> Self {
        Self { store, types, kinds }
    }

    /// Lower a query into the store-level filter.
    ///
    /// A code filter that resolves to zero edge types becomes an empty
    /// type set, which matches nothing — not an error, mirroring the rest
    /// of the query surface.
    pub fn lower(&self, query: &GraphQuery) -> Result<EdgeFilter, TrellisError> {
        let archetype = &query.archetype;
        let mut filter = EdgeFilter {
            node_a: archetype.node_a_id(),
            node_b: archetype.node_b_id(),
            variant: query.variant.clone(),
            ..EdgeFilter::default()
        };

        // Class endpoints restrict the concrete kinds in play.
        let class_a = match archetype.node_a() {
            Some(Endpoint::Class(class)) => Some(class.clone()),
            _ => None,
        };
        let class_b = match archetype.node_b() {
            Some(Endpoint::Class(class)) => Some(class.clone()),
            _ => None,
        };
        if class_a.is_some() || class_b.is_some() {
            let kinds: BTreeSet<_> = self
                .kinds
                .implementors(class_a.as_ref(), class_b.as_ref(), true)
                .into_iter()
                .map(|kind| kind.key.clone())
                .collect();
            filter.kinds = Some(kinds);
        }

        if !archetype.codes().is_empty() {
            let type_ids: BTreeSet<_> = self
                .types
                .get_for_models(
                    archetype.node_a_class(),
                    archetype.node_b_class(),
                    archetype.codes(),
                )
                .into_iter()
                .map(|edge_type| edge_type.id)
                .collect();
            filter.edge_types = Some(type_ids);
        }

        Ok(filter)
    }

    /// Execute a query.
    ///
    /// Without an explicit sort, a query pinned to a single kind takes
    /// that kind's configured default; everything else is newest first.
    pub fn edges(&self, query: &GraphQuery) -> Result<Vec<Edge>, TrellisError> {
        let filter = self.lower(query)?;
        let order = query
            .sort
            .unwrap_or_else(|| self.default_order(&filter));
        self.store.select(&filter, order)
    }

    fn default_order(&self, filter: &EdgeFilter) -> SortOrder {
        if let Some(kinds) = &filter.kinds {
            if kinds.len() == 1 {
                if let Some(kind) = kinds.first().and_then(|key| self.kinds.get(key)) {
                    return kind.config.default_sort;
                }
            }
        }
        SortOrder::CreatedDesc
    }

    /// Count matching edges without materializing them.
    pub fn count(&self, query: &GraphQuery) -> Result<usize, TrellisError> {
        let filter = self.lower(query)?;
        self.store.count(&filter)
    }

    /// Whether any edge matches.
    pub fn exists(&self, query: &GraphQuery) -> Result<bool, TrellisError> {
        Ok(self.count(query)? > 0)
    }

    /// An arbitrary first match; no ordering guarantee.
    pub fn one(&self, query: &GraphQuery) -> Result<Option<Edge>, TrellisError> {
        let filter = self.lower(query)?;
        Ok(self
            .store
            .select(&filter, SortOrder::Unordered)?
            .into_iter()
            .next())
    }

    /// The newest matching edge by creation stamp.
    pub fn latest(&self, query: &GraphQuery) -> Result<Option<Edge>, TrellisError> {
        let filter = self.lower(query)?;
        Ok(self
            .store
            .select(&filter, SortOrder::CreatedDesc)?
            .into_iter()
            .next())
    }

    /// The oldest matching edge by creation stamp.
    pub fn oldest(&self, query: &GraphQuery) -> Result<Option<Edge>, TrellisError> {
        let filter = self.lower(query)?;
        Ok(self
            .store
            .select(&filter, SortOrder::CreatedAsc)?
            .into_iter()
            .next())
    }

    // =========================================================================
    // ENDPOINT PROJECTIONS
    // =========================================================================

    /// The A-side node objects reachable via edges matching the query.
    ///
    /// Returns distinct nodes (once per node, not once per edge), ordered
    /// by each node's newest connecting edge. Endpoints whose records have
    /// vanished from the node store are skipped.
    pub fn node_as(
        &self,
        nodes: &dyn NodeStore,
        query: &GraphQuery,
    ) -> Result<Vec<NodeRecord>, TrellisError> {
        self.project(nodes, query, |edge| edge.node_a, true)
    }

    /// The B-side node objects reachable via edges matching the query.
    ///
    /// Same distinct-node and ordering semantics as
    /// [`node_as`](Self::node_as).
    pub fn node_bs(
        &self,
        nodes: &dyn NodeStore,
        query: &GraphQuery,
    ) -> Result<Vec<NodeRecord>, TrellisError> {
        self.project(nodes, query, |edge| edge.node_b, false)
    }

    fn project(
        &self,
        nodes: &dyn NodeStore,
        query: &GraphQuery,
        endpoint: fn(&Edge) -> NodeId,
        a_side: bool,
    ) -> Result<Vec<NodeRecord>, TrellisError> {
        let edges = self.edges(query)?;
        let mut seen = BTreeSet::new();
        let mut records = Vec::new();

        for edge in &edges {
            let id = endpoint(edge);
            if !seen.insert(id) {
                continue;
            }
            // The edge's kind declares which class owns this endpoint.
            let Some(kind) = self.kinds.get(&edge.kind) else {
                continue;
            };
            let class = if a_side {
                &kind.node_a_class
            } else {
                &kind.node_b_class
            };
            if let Some(record) = nodes.by_id(class, id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    // =========================================================================
    // HISTORY
    // =========================================================================

    /// All edges ever recorded between two nodes, oldest first, optionally
    /// filtered by type codes.
    pub fn history(
        &self,
        node_a: &NodeRecord,
        node_b: &NodeRecord,
        codes: &[TypeCode],
    ) -> Result<Vec<Edge>, TrellisError> {
        let a = NodeRef::from(node_a);
        let b = NodeRef::from(node_b);
        let archetype = Archetype::new(Some(&a), Some(&b), codes)?;
        self.edges(&GraphQuery::new(archetype).sorted(SortOrder::CreatedAsc))
    }
}

// =============================================================================
// TESTS
// =============================================================================
