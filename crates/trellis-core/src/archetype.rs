//! # Archetype Filter Builder
//!
//! The single predicate seam every querying operation passes through.
//!
//! An archetype maps endpoint references and type codes to a canonical
//! filter usable against both edges and edge types, guaranteeing
//! query-shape consistency between the two. Archetypes are ephemeral value
//! objects: built fresh per query, never persisted.
//!
//! ## Rules
//!
//! - Each side may be an identity, a class name, or omitted (no
//!   constraint on that side).
//! - A full record carries both; the identity takes precedence and the
//!   class is kept only for taxonomy resolution (it is implied by the
//!   identity's owning record and would be redundant as an edge filter).
//! - A non-empty code list constrains the edge type (logical OR across
//!   codes).
//! - A constraint key exists iff the corresponding argument was supplied;
//!   no key is ever present with an empty value.

use crate::types::{ClassName, EdgeType, NodeId, NodeRef, TrellisError, TypeCode};

// =============================================================================
// ENDPOINT SELECTOR
// =============================================================================

/// The constraint an archetype places on one side of an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Filter by endpoint identity.
    Id(NodeId),
    /// Filter by endpoint class tag.
    Class(ClassName),
}

impl Endpoint {
    /// Reduce a node reference to its endpoint constraint.
    ///
    /// Identity takes precedence when the reference carries both.
    fn from_ref(node: &NodeRef) -> Self {
        match node {
            NodeRef::Record(record) => Self::Id(record.id),
            NodeRef::Id(id) => Self::Id(*id),
            NodeRef::Class(class) => Self::Class(class.clone()),
        }
    }
}

// =============================================================================
// ARCHETYPE
// =============================================================================

/// A canonical query predicate over edges and edge types.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Archetype {
    node_a: Option<Endpoint>,
    node_b: Option<Endpoint>,
    /// Classes retained for taxonomy resolution even when the endpoint
    /// constraint is an identity.
    node_a_class: Option<ClassName>,
    node_b_class: Option<ClassName>,
    codes: Vec<TypeCode>,
}

impl Archetype {
    /// Build an archetype from endpoint references and type codes.
    ///
    /// Returns `TrellisError::UnconstrainedArchetype` when every argument
    /// is empty: an archetype with no constraints selects the entire
    /// edge collection, and callers relying on that must opt in through
    /// [`Archetype::unconstrained`].
    pub fn new(
        node_a: Option<&NodeRef>,
        node_b: Option<&NodeRef>,
        codes: &[TypeCode],
    ) -> Result<Self, TrellisError> {
        if node_a.is_none() && node_b.is_none() && codes.is_empty() {
            return Err(TrellisError::UnconstrainedArchetype);
        }
        Ok(Self::build(node_a, node_b, codes))
    }

    /// Deliberately build the archetype that matches everything.
    ///
    /// This is the explicit opt-in for "all edges" / "all edge types"
    /// semantics.
    #[must_use]
    pub fn unconstrained() -> Self {
        Self::default()
    }

    fn build(node_a: Option<&NodeRef>, node_b: Option<&NodeRef>, codes: &[TypeCode]) -> Self {
        Self {
            node_a: node_a.map(Endpoint::from_ref),
            node_b: node_b.map(Endpoint::from_ref),
            node_a_class: node_a.and_then(|n| n.class().cloned()),
            node_b_class: node_b.and_then(|n| n.class().cloned()),
            codes: codes.to_vec(),
        }
    }

    /// Whether this archetype constrains nothing.
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        self.node_a.is_none() && self.node_b.is_none() && self.codes.is_empty()
    }

    /// The A-side constraint, if any.
    #[must_use]
    pub fn node_a(&self) -> Option<&Endpoint> {
        self.node_a.as_ref()
    }

    /// The B-side constraint, if any.
    #[must_use]
    pub fn node_b(&self) -> Option<&Endpoint> {
        self.node_b.as_ref()
    }

    /// The A-side identity filter, if the constraint is an identity.
    #[must_use]
    pub fn node_a_id(&self) -> Option<NodeId> {
        match self.node_a {
            Some(Endpoint::Id(id)) => Some(id),
            _ => None,
        }
    }

    /// The B-side identity filter, if the constraint is an identity.
    #[must_use]
    pub fn node_b_id(&self) -> Option<NodeId> {
        match self.node_b {
            Some(Endpoint::Id(id)) => Some(id),
            _ => None,
        }
    }

    /// The A-side class, for taxonomy resolution.
    #[must_use]
    pub fn node_a_class(&self) -> Option<&ClassName> {
        self.node_a_class.as_ref()
    }

    /// The B-side class, for taxonomy resolution.
    #[must_use]
    pub fn node_b_class(&self) -> Option<&ClassName> {
        self.node_b_class.as_ref()
    }

    /// The code filter (empty = unconstrained).
    #[must_use]
    pub fn codes(&self) -> &[TypeCode] {
        &self.codes
    }

    // =========================================================================
    // EDGE TYPE MATCHING
    // =========================================================================

    /// Whether an edge type satisfies this archetype's class and code
    /// constraints, matching codes class-exactly.
    ///
    /// Identity constraints do not apply to taxonomy records; only the
    /// class half of each side participates. A `None` class on the edge
    /// type is a wildcard and matches any requested class.
    #[must_use]
    pub fn matches_edge_type(&self, edge_type: &EdgeType) -> bool {
        self.matches_classes(edge_type)
            && (self.codes.is_empty() || self.codes.contains(&edge_type.code))
    }

    /// Like [`matches_edge_type`](Self::matches_edge_type), but a
    /// requested code also matches edge types whose `parent_code` equals
    /// it — passing a parent code selects all its children plus itself.
    #[must_use]
    pub fn matches_edge_type_hierarchy(&self, edge_type: &EdgeType) -> bool {
        if !self.matches_classes(edge_type) {
            return false;
        }
        if self.codes.is_empty() {
            return true;
        }
        self.codes.contains(&edge_type.code)
            || edge_type
                .parent_code
                .as_ref()
                .is_some_and(|parent| self.codes.contains(parent))
    }

    fn matches_classes(&self, edge_type: &EdgeType) -> bool {
        let a_ok = match &self.node_a_class {
            Some(class) => edge_type.accepts_node_a(class),
            None => true,
        };
        let b_ok = match &self.node_b_class {
            Some(class) => edge_type.accepts_node_b(class),
            None => true,
        };
        a_ok && b_ok
    }
}

// =============================================================================
// TESTS
// =============================================================================
