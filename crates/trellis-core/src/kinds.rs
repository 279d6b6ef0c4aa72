//! # Edge Kind Registry
//!
//! The process-scoped registry of concrete edge implementations.
//!
//! The registry is populated explicitly at startup: each kind declares
//! its endpoint classes and carries its field configuration, resolved
//! once at registration time rather than re-read per call. Implementor
//! lookups are plain filters over this registry; no reflection, no
//! subclass scanning.

use crate::store::SortOrder;
use crate::types::{ClassName, EdgeKindKey, TrellisError};
use std::collections::BTreeMap;

// =============================================================================
// KIND CONFIGURATION
// =============================================================================

/// Field names and presentation configuration for one edge kind.
///
/// These mirror the columns the relational collaborator exposes for the
/// kind's table; they are carried so query predicates can be rendered at
/// the store boundary without per-call configuration lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeKindConfig {
    /// Field holding the A-side endpoint identity, e.g. "FromModelID".
    pub node_a_field: String,
    /// Field holding the B-side endpoint identity, e.g. "ToModelID".
    pub node_b_field: String,
    /// Field referencing the edge-type record, e.g. "EdgeTypeID".
    pub edge_type_field: String,
    /// Field holding variant data, if the kind has one.
    pub variant_field: Option<String>,
    /// Display label for the A side.
    pub node_a_label: String,
    /// Display label for the B side.
    pub node_b_label: String,
    /// Default ordering for queries over this kind.
    pub default_sort: SortOrder,
}

impl Default for EdgeKindConfig {
    fn default() -> Self {
        Self {
            node_a_field: "NodeAID".to_string(),
            node_b_field: "NodeBID".to_string(),
            edge_type_field: "EdgeTypeID".to_string(),
            variant_field: None,
            node_a_label: "Node A".to_string(),
            node_b_label: "Node B".to_string(),
            default_sort: SortOrder::CreatedDesc,
        }
    }
}

// =============================================================================
// EDGE KIND
// =============================================================================

/// A registered concrete edge kind between two node classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeKind {
    /// Registry key, e.g. "member-organisation".
    pub key: EdgeKindKey,
    /// Class handled on the A side.
    pub node_a_class: ClassName,
    /// Class handled on the B side.
    pub node_b_class: ClassName,
    /// Field configuration, resolved once.
    pub config: EdgeKindConfig,
}

impl EdgeKind {
    /// Create a kind with default field configuration.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        node_a_class: impl Into<String>,
        node_b_class: impl Into<String>,
    ) -> Self {
        Self {
            key: EdgeKindKey::new(key),
            node_a_class: ClassName::new(node_a_class),
            node_b_class: ClassName::new(node_b_class),
            config: EdgeKindConfig::default(),
        }
    }

    /// Replace the field configuration.
    #[must_use]
    pub fn with_config(mut self, config: EdgeKindConfig) -> Self {
        self.config = config;
        self
    }

    fn matches_node_a(&self, class: Option<&ClassName>) -> bool {
        class.is_none_or(|requested| &self.node_a_class == requested)
    }

    fn matches_node_b(&self, class: Option<&ClassName>) -> bool {
        class.is_none_or(|requested| &self.node_b_class == requested)
    }
}

// =============================================================================
// KIND REGISTRY
// =============================================================================

/// Registry of all known concrete edge kinds.
///
/// Results of [`implementors`](KindRegistry::implementors) preserve
/// registration order; no sorting is guaranteed beyond that.
#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    /// Kinds in registration order.
    kinds: Vec<EdgeKind>,
    /// Key -> position in `kinds`.
    index: BTreeMap<EdgeKindKey, usize>,
}

impl KindRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kind under its key.
    ///
    /// Returns `DuplicateEdgeKind` if the key is already taken.
    pub fn register(&mut self, kind: EdgeKind) -> Result<(), TrellisError> {
        if self.index.contains_key(&kind.key) {
            return Err(TrellisError::DuplicateEdgeKind(kind.key.0.clone()));
        }
        self.index.insert(kind.key.clone(), self.kinds.len());
        self.kinds.push(kind);
        Ok(())
    }

    /// Lookup a kind by key.
    #[must_use]
    pub fn get(&self, key: &EdgeKindKey) -> Option<&EdgeKind> {
        self.index.get(key).and_then(|&pos| self.kinds.get(pos))
    }

    /// The kinds implementing an edge between two node classes.
    ///
    /// A side matches when the requested class equals the kind's declared
    /// class, or when the request for that side is `None` (wildcard).
    /// `strict` requires both sides to match; non-strict accepts either
    /// side matching. An unknown class name simply matches nothing — it is
    /// not an error.
    #[must_use]
    pub fn implementors(
        &self,
        node_a: Option<&ClassName>,
        node_b: Option<&ClassName>,
        strict: bool,
    ) -> Vec<&EdgeKind> {
        self.kinds
            .iter()
            .filter(|kind| {
                let a_match = kind.matches_node_a(node_a);
                let b_match = kind.matches_node_b(node_b);
                if strict { a_match && b_match } else { a_match || b_match }
            })
            .collect()
    }

    /// All registered kinds in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &EdgeKind> {
        self.kinds.iter()
    }

    /// Number of registered kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
