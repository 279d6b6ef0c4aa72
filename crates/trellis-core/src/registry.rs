//! # EdgeType Registry & Hierarchy
//!
//! The taxonomy of permitted edge kinds between node classes.
//!
//! Codes are unique within the registry and form a one-level hierarchy via
//! `parent_code`; hierarchy lookups tolerate requested codes that match a
//! record's parent code, so passing a parent code resolves to all of its
//! children plus itself.
//!
//! Edge types are treated as near-static configuration: defined at
//! startup (or loaded from the store), read by every query after that.

use crate::archetype::Archetype;
use crate::primitives::{MAX_CLASS_NAME_LENGTH, MAX_CODE_LENGTH};
use crate::types::{ClassName, EdgeType, EdgeTypeId, EdgeTypeRef, NodeRef, TrellisError, TypeCode};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// TYPE DEFINITION BUILDER
// =============================================================================

/// The caller-facing definition of an edge type, before the registry
/// assigns an identity.
#[derive(Debug, Clone, Default)]
pub struct EdgeTypeDef {
    code: String,
    parent_code: Option<String>,
    node_a_class: Option<String>,
    node_b_class: Option<String>,
    require_previous: Option<String>,
    implied_codes: Vec<String>,
    permission_code: Option<String>,
}

impl EdgeTypeDef {
    /// Start a definition with the given unique code.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }

    /// Restrict the type to edges from `node_a` to `node_b` classes.
    /// An empty string on either side leaves that side a wildcard.
    #[must_use]
    pub fn between(mut self, node_a: impl Into<String>, node_b: impl Into<String>) -> Self {
        let a = node_a.into();
        let b = node_b.into();
        self.node_a_class = (!a.is_empty()).then_some(a);
        self.node_b_class = (!b.is_empty()).then_some(b);
        self
    }

    /// Mark this code as a specialization of a broader code.
    #[must_use]
    pub fn parent(mut self, code: impl Into<String>) -> Self {
        self.parent_code = Some(code.into());
        self
    }

    /// Gate creation on an edge of another type already existing between
    /// the same two nodes.
    #[must_use]
    pub fn requires_previous(mut self, code: impl Into<String>) -> Self {
        self.require_previous = Some(code.into());
        self
    }

    /// Codes implicitly satisfied when an edge of this type exists.
    #[must_use]
    pub fn implies<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.implied_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    /// Attach the external authorization token for this type.
    #[must_use]
    pub fn permission(mut self, code: impl Into<String>) -> Self {
        self.permission_code = Some(code.into());
        self
    }

    fn validate(&self) -> Result<(), TrellisError> {
        if self.code.is_empty() || self.code.len() > MAX_CODE_LENGTH {
            return Err(TrellisError::InvalidRecord(format!(
                "edge type code '{}' must be 1..={} bytes",
                self.code, MAX_CODE_LENGTH
            )));
        }
        for class in [&self.node_a_class, &self.node_b_class].into_iter().flatten() {
            if class.len() > MAX_CLASS_NAME_LENGTH {
                return Err(TrellisError::InvalidRecord(format!(
                    "class name '{}' exceeds {} bytes",
                    class, MAX_CLASS_NAME_LENGTH
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// The edge-type taxonomy store.
///
/// Uses `BTreeMap` exclusively for deterministic ordering; results of all
/// lookups are ordered by registry id (definition order, since ids are
/// monotonic).
#[derive(Debug, Clone, Default)]
pub struct EdgeTypeRegistry {
    /// Primary storage: EdgeTypeId -> EdgeType.
    types: BTreeMap<EdgeTypeId, EdgeType>,
    /// Unique-code index: TypeCode -> EdgeTypeId.
    code_index: BTreeMap<TypeCode, EdgeTypeId>,
    /// Next available id.
    next_id: u64,
}

impl EdgeTypeRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from persisted records, preserving ids.
    ///
    /// Returns `DuplicateTypeCode` if the records violate code uniqueness.
    pub fn from_types(records: Vec<EdgeType>) -> Result<Self, TrellisError> {
        let mut registry = Self::new();
        for record in records {
            if registry.code_index.contains_key(&record.code) {
                return Err(TrellisError::DuplicateTypeCode(record.code));
            }
            if record.id.0 >= registry.next_id {
                registry.next_id = record.id.0.saturating_add(1);
            }
            registry.code_index.insert(record.code.clone(), record.id);
            registry.types.insert(record.id, record);
        }
        Ok(registry)
    }

    /// Define a new edge type, assigning its identity.
    ///
    /// Returns `DuplicateTypeCode` if the code is already registered.
    pub fn define(&mut self, def: EdgeTypeDef) -> Result<EdgeType, TrellisError> {
        def.validate()?;
        let code = TypeCode::new(def.code.clone());
        if self.code_index.contains_key(&code) {
            return Err(TrellisError::DuplicateTypeCode(code));
        }

        let id = EdgeTypeId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);

        let record = EdgeType {
            id,
            code: code.clone(),
            parent_code: def.parent_code.map(TypeCode::new),
            node_a_class: def.node_a_class.map(ClassName::new),
            node_b_class: def.node_b_class.map(ClassName::new),
            require_previous: def.require_previous.map(TypeCode::new),
            implied_codes: def.implied_codes.into_iter().map(TypeCode::new).collect(),
            permission_code: def.permission_code,
        };

        self.code_index.insert(code, id);
        self.types.insert(id, record.clone());
        Ok(record)
    }

    /// Exact lookup by code.
    #[must_use]
    pub fn get_by_code(&self, code: &TypeCode) -> Option<&EdgeType> {
        self.code_index.get(code).and_then(|id| self.types.get(id))
    }

    /// Lookup by registry id.
    #[must_use]
    pub fn get(&self, id: EdgeTypeId) -> Option<&EdgeType> {
        self.types.get(&id)
    }

    /// Resolve an explicit reference, by id or code.
    ///
    /// An explicit reference that does not resolve is an error; omitting
    /// the reference entirely (no call) is the non-error path.
    pub fn resolve(&self, reference: &EdgeTypeRef) -> Result<&EdgeType, TrellisError> {
        match reference {
            EdgeTypeRef::Id(id) => self.get(*id).ok_or(TrellisError::UnknownEdgeType(*id)),
            EdgeTypeRef::Code(code) => self
                .get_by_code(code)
                .ok_or_else(|| TrellisError::UnknownTypeCode(code.clone())),
        }
    }

    /// Edge types valid between two node classes, class-exact.
    ///
    /// `None` on either side places no constraint there; both `None`
    /// returns the unfiltered registry (the "all edge types" case). A
    /// non-empty `codes` list intersects the result with those codes.
    #[must_use]
    pub fn get_for_models(
        &self,
        node_a: Option<&ClassName>,
        node_b: Option<&ClassName>,
        codes: &[TypeCode],
    ) -> Vec<&EdgeType> {
        let archetype = Self::model_archetype(node_a, node_b, codes);
        self.types
            .values()
            .filter(|edge_type| archetype.matches_edge_type(edge_type))
            .collect()
    }

    /// Like [`get_for_models`](Self::get_for_models), but a requested code
    /// also matches edge types whose parent code equals it.
    ///
    /// This is how "give me all 'ADM' variants" resolves to 'MAO', 'MEO'
    /// and so on.
    #[must_use]
    pub fn get_hierarchy(
        &self,
        node_a: Option<&ClassName>,
        node_b: Option<&ClassName>,
        codes: &[TypeCode],
    ) -> Vec<&EdgeType> {
        let archetype = Self::model_archetype(node_a, node_b, codes);
        self.types
            .values()
            .filter(|edge_type| archetype.matches_edge_type_hierarchy(edge_type))
            .collect()
    }

    /// All registered types in id order.
    pub fn iter(&self) -> impl Iterator<Item = &EdgeType> {
        self.types.values()
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn model_archetype(
        node_a: Option<&ClassName>,
        node_b: Option<&ClassName>,
        codes: &[TypeCode],
    ) -> Archetype {
        let a = node_a.cloned().map(NodeRef::Class);
        let b = node_b.cloned().map(NodeRef::Class);
        // Both sides null is legal here: it selects the whole registry.
        Archetype::new(a.as_ref(), b.as_ref(), codes)
            .unwrap_or_else(|_| Archetype::unconstrained())
    }
}

// =============================================================================
// CODE LIST MERGING
// =============================================================================

/// A code list supplied either as a CSV string or as separate codes.
#[derive(Debug, Clone)]
pub enum CodeInput {
    /// Comma-separated codes, e.g. `"MFR,MLO"`.
    Csv(String),
    /// Already-separated codes.
    List(Vec<TypeCode>),
}

impl From<&str> for CodeInput {
    fn from(csv: &str) -> Self {
        Self::Csv(csv.to_string())
    }
}

impl From<String> for CodeInput {
    fn from(csv: String) -> Self {
        Self::Csv(csv)
    }
}

impl From<Vec<TypeCode>> for CodeInput {
    fn from(list: Vec<TypeCode>) -> Self {
        Self::List(list)
    }
}

impl From<&[TypeCode]> for CodeInput {
    fn from(list: &[TypeCode]) -> Self {
        Self::List(list.to_vec())
    }
}

impl CodeInput {
    fn into_codes(self) -> Vec<TypeCode> {
        match self {
            Self::Csv(csv) => csv
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(TypeCode::new)
                .collect(),
            Self::List(list) => list,
        }
    }
}

/// Merge two code lists into a deduplicated set of codes.
///
/// Either input may be a CSV string or a list; can also be used with an
/// empty second argument just to normalize the first. Uniqueness is
/// required, order is not significant (first occurrence wins).
#[must_use]
pub fn merge_code_lists(codes: impl Into<CodeInput>, merge: impl Into<CodeInput>) -> Vec<TypeCode> {
    let mut seen = BTreeSet::new();
    let mut merged = Vec::new();
    for code in codes
        .into()
        .into_codes()
        .into_iter()
        .chain(merge.into().into_codes())
    {
        if seen.insert(code.clone()) {
            merged.push(code);
        }
    }
    merged
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> EdgeTypeRegistry {
        let mut registry = EdgeTypeRegistry::new();
        registry
            .define(EdgeTypeDef::new("REG").between("Member", "Organisation"))
            .expect("define");
        registry
            .define(EdgeTypeDef::new("ADM").between("Member", "Organisation"))
            .expect("define");
        registry
            .define(
                EdgeTypeDef::new("MAO")
                    .parent("ADM")
                    .between("Member", "Organisation"),
            )
            .expect("define");
        registry
            .define(EdgeTypeDef::new("MLP").between("Member", "Post"))
            .expect("define");
        registry
    }

    #[test]
    fn codes_are_unique() {
        let mut registry = registry();
        let result = registry.define(EdgeTypeDef::new("REG"));
        assert!(matches!(result, Err(TrellisError::DuplicateTypeCode(_))));
    }

    #[test]
    fn get_for_models_is_class_exact() {
        let registry = registry();
        let member = ClassName::new("Member");
        let organisation = ClassName::new("Organisation");

        let types = registry.get_for_models(Some(&member), Some(&organisation), &[]);
        let codes: Vec<_> = types.iter().map(|t| t.code.as_str()).collect();
        assert_eq!(codes, vec!["REG", "ADM", "MAO"]);
    }

    #[test]
    fn both_sides_null_returns_unfiltered_registry() {
        let registry = registry();
        assert_eq!(registry.get_for_models(None, None, &[]).len(), registry.len());
    }

    #[test]
    fn hierarchy_expands_parent_codes() {
        let registry = registry();
        let member = ClassName::new("Member");
        let organisation = ClassName::new("Organisation");
        let adm = vec![TypeCode::new("ADM")];

        let exact = registry.get_for_models(Some(&member), Some(&organisation), &adm);
        let expanded = registry.get_hierarchy(Some(&member), Some(&organisation), &adm);

        assert_eq!(exact.len(), 1);
        assert_eq!(expanded.len(), 2);
        assert!(expanded.iter().any(|t| t.code.as_str() == "MAO"));
    }

    #[test]
    fn resolve_explicit_miss_is_an_error() {
        let registry = registry();
        let missing = EdgeTypeRef::Code(TypeCode::new("XXX"));
        assert!(matches!(
            registry.resolve(&missing),
            Err(TrellisError::UnknownTypeCode(_))
        ));

        let found = registry
            .resolve(&EdgeTypeRef::Code(TypeCode::new("REG")))
            .expect("resolve");
        assert_eq!(found.code.as_str(), "REG");
    }

    #[test]
    fn from_types_preserves_ids() {
        let registry = registry();
        let records: Vec<EdgeType> = registry.iter().cloned().collect();
        let rebuilt = EdgeTypeRegistry::from_types(records).expect("rebuild");

        assert_eq!(rebuilt.len(), registry.len());
        let reg = rebuilt.get_by_code(&TypeCode::new("REG")).expect("lookup");
        assert_eq!(reg.id, EdgeTypeId(0));

        // New definitions continue past the preserved ids.
        let mut rebuilt = rebuilt;
        let next = rebuilt.define(EdgeTypeDef::new("NEW")).expect("define");
        assert_eq!(next.id, EdgeTypeId(4));
    }

    #[test]
    fn merge_code_lists_unions_csv_and_arrays() {
        let merged = merge_code_lists("MFR,MLO", vec![TypeCode::new("MLO"), TypeCode::new("CRT")]);
        assert_eq!(
            merged,
            vec![
                TypeCode::new("MFR"),
                TypeCode::new("MLO"),
                TypeCode::new("CRT")
            ]
        );

        // Single argument normalizes a CSV.
        let normalized = merge_code_lists("CRT, REG", Vec::new());
        assert_eq!(normalized, vec![TypeCode::new("CRT"), TypeCode::new("REG")]);
    }
}
