//! # Core Type Definitions
//!
//! This module contains all core types for the Trellis typed-edge graph
//! layer:
//! - Identifiers (`NodeId`, `EdgeId`, `EdgeTypeId`, `Tick`)
//! - Naming newtypes (`ClassName`, `TypeCode`, `EdgeKindKey`)
//! - Graph records (`NodeRecord`, `EdgeType`, `Edge`)
//! - Endpoint references (`NodeRef`, `EdgeTypeRef`)
//! - Error types (`TrellisError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`
//! - Carry a store-issued monotonic `Tick` instead of wall-clock time
//! - Use saturating arithmetic for counters to prevent overflow

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique identifier for a node owned by the external store.
///
/// Nodes are entities of the surrounding application; this layer only ever
/// sees their identity and class tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Unique identifier for an edge instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

/// Unique identifier for an edge-type taxonomy record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeTypeId(pub u64);

/// Monotonic creation stamp issued by the store.
///
/// The relational boundary owns wall-clock time; this layer needs only a
/// total order over edge creation, and a logical tick keeps every query
/// deterministic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Tick(pub u64);

impl Tick {
    /// The next tick, using saturating arithmetic.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

// =============================================================================
// NAMING NEWTYPES
// =============================================================================

/// A node class tag, e.g. `"Member"` or `"Organisation"`.
///
/// Matching on class names is class-exact: no subclass polymorphism is
/// assumed at this layer, callers normalize to canonical names first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClassName(pub String);

impl ClassName {
    /// Create a new class name from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the class name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A short edge-type code, e.g. `"CRT"` or `"MLK"`.
///
/// Codes are unique within the registry and form a one-level hierarchy via
/// `EdgeType::parent_code`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeCode(pub String);

impl TypeCode {
    /// Create a new type code from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Key identifying a registered concrete edge kind.
///
/// A process-scoped registry maps each key to its declared endpoint
/// classes and field configuration; there is no subclass scanning or
/// reflection anywhere in the dispatch path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeKindKey(pub String);

impl EdgeKindKey {
    /// Create a new kind key from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// NODE RECORD
// =============================================================================

/// The projection of an external node record that this layer needs.
///
/// Nodes have no inherent state here beyond identity and class; they are
/// owned by the collaborating relational store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRecord {
    /// The store-assigned identity.
    pub id: NodeId,
    /// The concrete class tag.
    pub class: ClassName,
}

impl NodeRecord {
    /// Create a new node record.
    #[must_use]
    pub fn new(id: NodeId, class: ClassName) -> Self {
        Self { id, class }
    }
}

// =============================================================================
// NODE REFERENCES
// =============================================================================

/// A caller-supplied reference to one side of an edge or query.
///
/// Callers may hold a full record, a bare identity, or only a class name;
/// every operation in this crate accepts any of the three and constrains
/// queries by whatever the reference carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRef {
    /// A full record: identity and class both known.
    Record(NodeRecord),
    /// A bare identity; the owning class is implied by the record.
    Id(NodeId),
    /// A class name only (class-level checks, singleton targets).
    Class(ClassName),
}

impl NodeRef {
    /// The identity carried by this reference, if any.
    #[must_use]
    pub fn id(&self) -> Option<NodeId> {
        match self {
            Self::Record(record) => Some(record.id),
            Self::Id(id) => Some(*id),
            Self::Class(_) => None,
        }
    }

    /// The class carried by this reference, if any.
    #[must_use]
    pub fn class(&self) -> Option<&ClassName> {
        match self {
            Self::Record(record) => Some(&record.class),
            Self::Id(_) => None,
            Self::Class(class) => Some(class),
        }
    }
}

impl From<NodeRecord> for NodeRef {
    fn from(record: NodeRecord) -> Self {
        Self::Record(record)
    }
}

impl From<&NodeRecord> for NodeRef {
    fn from(record: &NodeRecord) -> Self {
        Self::Record(record.clone())
    }
}

impl From<NodeId> for NodeRef {
    fn from(id: NodeId) -> Self {
        Self::Id(id)
    }
}

impl From<ClassName> for NodeRef {
    fn from(class: ClassName) -> Self {
        Self::Class(class)
    }
}

/// A caller-supplied reference to an edge type: by id or by code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeTypeRef {
    /// Reference by registry id.
    Id(EdgeTypeId),
    /// Reference by unique code.
    Code(TypeCode),
}

impl From<EdgeTypeId> for EdgeTypeRef {
    fn from(id: EdgeTypeId) -> Self {
        Self::Id(id)
    }
}

impl From<TypeCode> for EdgeTypeRef {
    fn from(code: TypeCode) -> Self {
        Self::Code(code)
    }
}

// =============================================================================
// EDGE TYPE
// =============================================================================

/// A taxonomy record describing a permitted kind of edge.
///
/// Edge types govern which edges may exist between which node classes, and
/// carry the rule configuration the evaluator consumes: a required
/// previous code that gates creation, a set of codes this type implicitly
/// satisfies, and an external permission token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeType {
    /// Registry-assigned identity.
    pub id: EdgeTypeId,
    /// Short unique code, e.g. "CRT".
    pub code: TypeCode,
    /// Optional broader code this one specializes.
    pub parent_code: Option<TypeCode>,
    /// Node class valid on the A side; `None` is a wildcard.
    pub node_a_class: Option<ClassName>,
    /// Node class valid on the B side; `None` is a wildcard.
    pub node_b_class: Option<ClassName>,
    /// Code of another type that must already exist as an edge between the
    /// same two nodes before this one may be created.
    pub require_previous: Option<TypeCode>,
    /// Codes implicitly satisfied when an edge of this type exists.
    pub implied_codes: BTreeSet<TypeCode>,
    /// External authorization token checked against the acting subject.
    pub permission_code: Option<String>,
}

impl EdgeType {
    /// Whether this type's A side accepts the given class.
    #[must_use]
    pub fn accepts_node_a(&self, class: &ClassName) -> bool {
        self.node_a_class.as_ref().is_none_or(|own| own == class)
    }

    /// Whether this type's B side accepts the given class.
    #[must_use]
    pub fn accepts_node_b(&self, class: &ClassName) -> bool {
        self.node_b_class.as_ref().is_none_or(|own| own == class)
    }
}

// =============================================================================
// EDGE
// =============================================================================

/// A directed relationship instance between two nodes.
///
/// Multiple historical edges of the same type between the same pair are
/// permitted; history is preserved, never overwritten. Endpoints are set
/// once at construction time and never updated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Store-assigned identity.
    pub id: EdgeId,
    /// The concrete kind that implements this edge.
    pub kind: EdgeKindKey,
    /// Identity of the A-side node.
    pub node_a: NodeId,
    /// Identity of the B-side node.
    pub node_b: NodeId,
    /// The taxonomy record this edge instantiates.
    pub edge_type: EdgeTypeId,
    /// Free-form discriminator between edges of the same type, e.g. an
    /// action sub-code.
    pub variant: Option<String>,
    /// Store-issued creation stamp.
    pub created: Tick,
}

/// An edge awaiting persistence: everything but the store-assigned parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEdge {
    pub kind: EdgeKindKey,
    pub node_a: NodeId,
    pub node_b: NodeId,
    pub edge_type: EdgeTypeId,
    pub variant: Option<String>,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Trellis layer.
///
/// Permission denial is deliberately NOT represented here: evaluators and
/// lifecycle operations return `false` or empty collections so existing
/// caller expectations (silent no-op) are preserved.
#[derive(Debug, Error)]
pub enum TrellisError {
    /// An explicitly requested edge-type code does not resolve.
    /// A null/omitted type request is not an error.
    #[error("Unknown edge type code '{0:?}'")]
    UnknownTypeCode(TypeCode),

    /// An explicitly requested edge-type id does not resolve.
    #[error("Unknown edge type: {0:?}")]
    UnknownEdgeType(EdgeTypeId),

    /// A type definition re-used a code already in the registry.
    #[error("Duplicate edge type code '{0:?}'")]
    DuplicateTypeCode(TypeCode),

    /// An edge kind key does not resolve in the kind registry.
    #[error("Unknown edge kind '{0}'")]
    UnknownEdgeKind(String),

    /// An edge kind was registered twice under the same key.
    #[error("Duplicate edge kind '{0}'")]
    DuplicateEdgeKind(String),

    /// The requested edge does not exist in the store.
    #[error("Edge not found: {0:?}")]
    EdgeNotFound(EdgeId),

    /// A fully-empty archetype was built without the explicit opt-in.
    /// Use `Archetype::unconstrained()` for deliberate "all" semantics.
    #[error("Archetype has no constraints; use Archetype::unconstrained()")]
    UnconstrainedArchetype,

    /// A record failed validation limits on write.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred in the storage backend.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_saturates() {
        let tick = Tick(u64::MAX);
        assert_eq!(tick.next(), Tick(u64::MAX));
    }

    #[test]
    fn node_ref_carries_what_it_has() {
        let record = NodeRecord::new(NodeId(7), ClassName::new("Member"));
        let by_record = NodeRef::from(&record);
        assert_eq!(by_record.id(), Some(NodeId(7)));
        assert_eq!(by_record.class(), Some(&ClassName::new("Member")));

        let by_id = NodeRef::from(NodeId(7));
        assert_eq!(by_id.id(), Some(NodeId(7)));
        assert_eq!(by_id.class(), None);

        let by_class = NodeRef::from(ClassName::new("Member"));
        assert_eq!(by_class.id(), None);
        assert_eq!(by_class.class(), Some(&ClassName::new("Member")));
    }

    #[test]
    fn wildcard_class_accepts_anything() {
        let edge_type = EdgeType {
            id: EdgeTypeId(1),
            code: TypeCode::new("CRT"),
            parent_code: None,
            node_a_class: None,
            node_b_class: Some(ClassName::new("Post")),
            require_previous: None,
            implied_codes: BTreeSet::new(),
            permission_code: None,
        };

        assert!(edge_type.accepts_node_a(&ClassName::new("Member")));
        assert!(edge_type.accepts_node_a(&ClassName::new("Organisation")));
        assert!(edge_type.accepts_node_b(&ClassName::new("Post")));
        assert!(!edge_type.accepts_node_b(&ClassName::new("Member")));
    }
}
