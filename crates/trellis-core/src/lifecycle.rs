//! # Edge Lifecycle Manager
//!
//! Creation and destruction of edges, with the rule evaluator in front.
//!
//! `make` is append-only: every call that passes the permission gate and
//! resolves at least one (edge type × implementor kind) pairing appends
//! new rows; nothing is ever upserted, so history is preserved. The
//! implied-edge cascade follows `implied_codes` breadth-first with a
//! visited set and a hard depth bound.
//!
//! `remove` and `prune` are best-effort: a deletion failure is logged and
//! reported as `false`, never raised, and rows already deleted stay
//! deleted.

use crate::kinds::KindRegistry;
use crate::primitives::MAX_IMPLIED_DEPTH;
use crate::registry::EdgeTypeRegistry;
use crate::rules::{AccessControl, NodeGate, RuleEvaluator, Subject};
use crate::store::{EdgeFilter, EdgeStore, SortOrder};
use crate::types::{
    Edge, EdgeId, EdgeTypeId, NewEdge, NodeRecord, NodeRef, TrellisError, TypeCode,
};
use std::collections::BTreeSet;

// =============================================================================
// ERROR LOGGING HELPERS
// =============================================================================

/// Report a non-fatal storage error on stderr.
///
/// The core stays free of logging dependencies; an app layer wanting
/// richer telemetry redirects stderr into its own subscriber.
pub(crate) fn log_storage_error(context: &str, error: &TrellisError) {
    eprintln!(
        "{{\"level\":\"warn\",\"target\":\"trellis_core::lifecycle\",\"message\":\"storage error in {}: {}\"}}",
        context, error
    );
}

/// Log a storage error and fall back to the type's default value.
///
/// Keeps boolean-returning surfaces boolean without silently swallowing
/// the underlying failure.
pub(crate) fn log_and_default<T: Default>(result: Result<T, TrellisError>, context: &str) -> T {
    match result {
        Ok(value) => value,
        Err(error) => {
            log_storage_error(context, &error);
            T::default()
        }
    }
}

// =============================================================================
// LIFECYCLE
// =============================================================================

/// Borrowed view over the registries and rule machinery that manages the
/// edge lifecycle.
pub struct Lifecycle<'g> {
    types: &'g EdgeTypeRegistry,
    kinds: &'g KindRegistry,
    evaluator: &'g RuleEvaluator,
    access: &'g dyn AccessControl,
    gate: &'g dyn NodeGate,
}

impl<'g> Lifecycle<'g> {
    /// Assemble a lifecycle manager over the given collaborators.
    #[must_use]
    pub fn new(
        types: &'g EdgeTypeRegistry,
        kinds: &'g KindRegistry,
        evaluator: &'g RuleEvaluator,
        access: &'g dyn AccessControl,
        gate: &'g dyn NodeGate,
    ) -> Self {
        Self {
            types,
            kinds,
            evaluator,
            access,
            gate,
        }
    }

    /// Create edges of the coded type between two nodes.
    ///
    /// Aborts empty (no edge created, no error) when the permission gate
    /// denies or no edge type matches. Otherwise appends one edge per
    /// (matching edge type × implementor kind) pairing, then cascades
    /// implied types when `create_implied` is set. The whole batch is one
    /// storage transaction.
    ///
    /// Returns every edge created, direct and implied.
    pub fn make(
        &self,
        store: &mut dyn EdgeStore,
        node_a: &NodeRecord,
        node_b: &NodeRecord,
        code: &TypeCode,
        variant: Option<&str>,
        create_implied: bool,
        subject: Option<&Subject>,
    ) -> Result<Vec<Edge>, TrellisError> {
        let permitted = self.evaluator.check_permission(
            self.access,
            self.gate,
            self.types,
            &*store,
            &NodeRef::from(node_a),
            &NodeRef::from(node_b),
            std::slice::from_ref(code),
            subject,
        )?;
        if !permitted {
            return Ok(Vec::new());
        }

        let batch = self.plan(node_a, node_b, code, variant, create_implied);
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        store.insert_edges(batch)
    }

    /// Resolve the direct types and implied cascade into an append batch.
    fn plan(
        &self,
        node_a: &NodeRecord,
        node_b: &NodeRecord,
        code: &TypeCode,
        variant: Option<&str>,
        create_implied: bool,
    ) -> Vec<NewEdge> {
        let implementors = self
            .kinds
            .implementors(Some(&node_a.class), Some(&node_b.class), true);
        if implementors.is_empty() {
            return Vec::new();
        }

        let mut batch = Vec::new();
        let mut instantiated: BTreeSet<EdgeTypeId> = BTreeSet::new();
        let mut frontier: Vec<TypeCode> = Vec::new();

        let direct = self.types.get_hierarchy(
            Some(&node_a.class),
            Some(&node_b.class),
            std::slice::from_ref(code),
        );
        for edge_type in direct {
            if !instantiated.insert(edge_type.id) {
                continue;
            }
            for kind in &implementors {
                batch.push(NewEdge {
                    kind: kind.key.clone(),
                    node_a: node_a.id,
                    node_b: node_b.id,
                    edge_type: edge_type.id,
                    variant: variant.map(str::to_string),
                });
            }
            if create_implied {
                frontier.extend(edge_type.implied_codes.iter().cloned());
            }
        }

        // Implied cascade: breadth-first over implied codes, bounded in
        // depth, each type instantiated at most once.
        let mut depth = 0;
        while !frontier.is_empty() && depth < MAX_IMPLIED_DEPTH {
            let mut next = Vec::new();
            for implied_code in frontier {
                let implied_types = self.types.get_hierarchy(
                    Some(&node_a.class),
                    Some(&node_b.class),
                    std::slice::from_ref(&implied_code),
                );
                for edge_type in implied_types {
                    if !instantiated.insert(edge_type.id) {
                        continue;
                    }
                    for kind in &implementors {
                        batch.push(NewEdge {
                            kind: kind.key.clone(),
                            node_a: node_a.id,
                            node_b: node_b.id,
                            edge_type: edge_type.id,
                            variant: variant.map(str::to_string),
                        });
                    }
                    next.extend(edge_type.implied_codes.iter().cloned());
                }
            }
            frontier = next;
            depth += 1;
        }

        batch
    }

    /// Remove all edges of a coded type between two nodes.
    ///
    /// The code resolves exactly first; when nothing matches, edge types
    /// whose `parent_code` equals the code are removed instead, so
    /// removing by a category code removes all child-typed edges.
    ///
    /// Returns `true` only if the permission gate passed and every
    /// deletion succeeded. Vacuously `true` when nothing matches. Partial
    /// failure yields `false` without rolling back rows already deleted.
    pub fn remove(
        &self,
        store: &mut dyn EdgeStore,
        node_a: &NodeRecord,
        node_b: &NodeRecord,
        code: &TypeCode,
        subject: Option<&Subject>,
    ) -> Result<bool, TrellisError> {
        let permitted = self.evaluator.check_permission(
            self.access,
            self.gate,
            self.types,
            &*store,
            &NodeRef::from(node_a),
            &NodeRef::from(node_b),
            std::slice::from_ref(code),
            subject,
        )?;
        if !permitted {
            return Ok(false);
        }

        let mut matching = self.types.get_for_models(
            Some(&node_a.class),
            Some(&node_b.class),
            std::slice::from_ref(code),
        );
        if matching.is_empty() {
            matching = self
                .types
                .get_for_models(Some(&node_a.class), Some(&node_b.class), &[])
                .into_iter()
                .filter(|edge_type| edge_type.parent_code.as_ref() == Some(code))
                .collect();
        }
        if matching.is_empty() {
            return Ok(true);
        }

        let type_ids: BTreeSet<EdgeTypeId> =
            matching.into_iter().map(|edge_type| edge_type.id).collect();
        let filter = EdgeFilter {
            node_a: Some(node_a.id),
            node_b: Some(node_b.id),
            edge_types: Some(type_ids),
            ..EdgeFilter::default()
        };
        let doomed = store.select(&filter, SortOrder::Unordered)?;

        let mut ok = true;
        for edge in doomed {
            ok = prune(store, edge.id) && ok;
        }
        Ok(ok)
    }
}

/// Delete a single edge.
///
/// A deletion failure is logged and reported as `false`; it is non-fatal
/// to the caller.
pub fn prune(store: &mut dyn EdgeStore, id: EdgeId) -> bool {
    match store.delete_edge(id) {
        Ok(()) => true,
        Err(error) => {
            log_storage_error(&format!("prune of edge {}", id.0), &error);
            false
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::EdgeKind;
    use crate::registry::EdgeTypeDef;
    use crate::rules::{AllowAll, StaticAccessControl};
    use crate::store::MemoryStore;
    use crate::types::{ClassName, NodeId};

    struct Fixture {
        types: EdgeTypeRegistry,
        kinds: KindRegistry,
        evaluator: RuleEvaluator,
        access: StaticAccessControl,
    }

    fn fixture() -> Fixture {
        let mut types = EdgeTypeRegistry::new();
        // Ungated types: lifecycle tests exercise resolution and the
        // cascade; the evaluator has its own tests.
        types
            .define(EdgeTypeDef::new("FLW").between("Member", "Member"))
            .expect("define");
        types
            .define(
                EdgeTypeDef::new("FND")
                    .between("Member", "Organisation")
                    .implies(["REG"]),
            )
            .expect("define");
        types
            .define(EdgeTypeDef::new("REG").between("Member", "Organisation"))
            .expect("define");

        let mut kinds = KindRegistry::new();
        kinds
            .register(EdgeKind::new("member-member", "Member", "Member"))
            .expect("register");
        kinds
            .register(EdgeKind::new("member-organisation", "Member", "Organisation"))
            .expect("register");

        Fixture {
            types,
            kinds,
            evaluator: RuleEvaluator::new(),
            access: StaticAccessControl::new(),
        }
    }

    fn member(id: u64) -> NodeRecord {
        NodeRecord::new(NodeId(id), ClassName::new("Member"))
    }

    fn organisation(id: u64) -> NodeRecord {
        NodeRecord::new(NodeId(id), ClassName::new("Organisation"))
    }

    fn lifecycle(fixture: &Fixture) -> Lifecycle<'_> {
        Lifecycle::new(
            &fixture.types,
            &fixture.kinds,
            &fixture.evaluator,
            &fixture.access,
            &AllowAll,
        )
    }

    #[test]
    fn make_appends_per_call() {
        let fixture = fixture();
        let lifecycle = lifecycle(&fixture);
        let mut store = MemoryStore::new();
        let code = TypeCode::new("FLW");

        let first = lifecycle
            .make(&mut store, &member(1), &member(2), &code, None, true, None)
            .expect("make");
        assert_eq!(first.len(), 1);

        let second = lifecycle
            .make(&mut store, &member(1), &member(2), &code, None, true, None)
            .expect("make");
        assert_eq!(second.len(), 1);
        assert_ne!(first[0].id, second[0].id);
        assert_eq!(store.count(&EdgeFilter::any()).expect("count"), 2);
    }

    #[test]
    fn make_without_matching_type_is_empty() {
        let fixture = fixture();
        let lifecycle = lifecycle(&fixture);
        let mut store = MemoryStore::new();

        let edges = lifecycle
            .make(
                &mut store,
                &member(1),
                &member(2),
                &TypeCode::new("XXX"),
                None,
                true,
                None,
            )
            .expect("make");
        assert!(edges.is_empty());
        assert_eq!(store.count(&EdgeFilter::any()).expect("count"), 0);
    }

    #[test]
    fn make_cascades_implied_types() {
        let fixture = fixture();
        let lifecycle = lifecycle(&fixture);
        let mut store = MemoryStore::new();

        let edges = lifecycle
            .make(
                &mut store,
                &member(1),
                &organisation(2),
                &TypeCode::new("FND"),
                None,
                true,
                None,
            )
            .expect("make");

        // FND plus the implied REG.
        assert_eq!(edges.len(), 2);
        let fnd = fixture
            .types
            .get_by_code(&TypeCode::new("FND"))
            .expect("lookup")
            .id;
        let reg = fixture
            .types
            .get_by_code(&TypeCode::new("REG"))
            .expect("lookup")
            .id;
        let created: BTreeSet<_> = edges.iter().map(|e| e.edge_type).collect();
        assert_eq!(created, BTreeSet::from([fnd, reg]));
    }

    #[test]
    fn make_without_cascade_creates_direct_only() {
        let fixture = fixture();
        let lifecycle = lifecycle(&fixture);
        let mut store = MemoryStore::new();

        let edges = lifecycle
            .make(
                &mut store,
                &member(1),
                &organisation(2),
                &TypeCode::new("FND"),
                None,
                false,
                None,
            )
            .expect("make");
        assert_eq!(edges.len(), 1);
    }

    #[test]
    fn implied_cycles_terminate() {
        let mut types = EdgeTypeRegistry::new();
        types
            .define(
                EdgeTypeDef::new("AAA")
                    .between("Member", "Member")
                    .implies(["BBB"]),
            )
            .expect("define");
        types
            .define(
                EdgeTypeDef::new("BBB")
                    .between("Member", "Member")
                    .implies(["AAA"]),
            )
            .expect("define");

        let mut kinds = KindRegistry::new();
        kinds
            .register(EdgeKind::new("member-member", "Member", "Member"))
            .expect("register");
        let evaluator = RuleEvaluator::new();
        let access = StaticAccessControl::new();
        let lifecycle = Lifecycle::new(&types, &kinds, &evaluator, &access, &AllowAll);

        let mut store = MemoryStore::new();
        let edges = lifecycle
            .make(
                &mut store,
                &member(1),
                &member(2),
                &TypeCode::new("AAA"),
                None,
                true,
                None,
            )
            .expect("make");

        // Each type once, despite the cycle.
        assert_eq!(edges.len(), 2);
    }

    #[test]
    fn make_carries_variant_data() {
        let fixture = fixture();
        let lifecycle = lifecycle(&fixture);
        let mut store = MemoryStore::new();

        let edges = lifecycle
            .make(
                &mut store,
                &member(1),
                &member(2),
                &TypeCode::new("FLW"),
                Some("mutual"),
                true,
                None,
            )
            .expect("make");
        assert_eq!(edges[0].variant.as_deref(), Some("mutual"));
    }

    #[test]
    fn remove_deletes_matching_edges() {
        let fixture = fixture();
        let lifecycle = lifecycle(&fixture);
        let mut store = MemoryStore::new();
        let code = TypeCode::new("FLW");

        lifecycle
            .make(&mut store, &member(1), &member(2), &code, None, true, None)
            .expect("make");
        lifecycle
            .make(&mut store, &member(1), &member(2), &code, None, true, None)
            .expect("make");

        let removed = lifecycle
            .remove(&mut store, &member(1), &member(2), &code, None)
            .expect("remove");
        assert!(removed);
        assert_eq!(store.count(&EdgeFilter::any()).expect("count"), 0);
    }

    #[test]
    fn remove_is_vacuously_true() {
        let fixture = fixture();
        let lifecycle = lifecycle(&fixture);
        let mut store = MemoryStore::new();

        let removed = lifecycle
            .remove(&mut store, &member(1), &member(2), &TypeCode::new("FLW"), None)
            .expect("remove");
        assert!(removed);
        assert_eq!(store.count(&EdgeFilter::any()).expect("count"), 0);
    }

    #[test]
    fn remove_by_parent_code_removes_children() {
        let mut types = EdgeTypeRegistry::new();
        types
            .define(
                EdgeTypeDef::new("MAO")
                    .parent("ADM")
                    .between("Member", "Organisation"),
            )
            .expect("define");
        let mut kinds = KindRegistry::new();
        kinds
            .register(EdgeKind::new("member-organisation", "Member", "Organisation"))
            .expect("register");
        let evaluator = RuleEvaluator::new();
        let access = StaticAccessControl::new();
        let lifecycle = Lifecycle::new(&types, &kinds, &evaluator, &access, &AllowAll);

        let mut store = MemoryStore::new();
        lifecycle
            .make(
                &mut store,
                &member(1),
                &organisation(2),
                &TypeCode::new("MAO"),
                None,
                true,
                None,
            )
            .expect("make");

        // "ADM" resolves no type exactly; the parent-code fallback finds
        // MAO and removes its edges. The permission step accepts the
        // parent code through the same hierarchy tolerance.
        let removed = lifecycle
            .remove(
                &mut store,
                &member(1),
                &organisation(2),
                &TypeCode::new("ADM"),
                None,
            )
            .expect("remove");
        assert!(removed);
        assert_eq!(store.count(&EdgeFilter::any()).expect("count"), 0);
    }

    #[test]
    fn prune_missing_edge_is_false_not_fatal() {
        let mut store = MemoryStore::new();
        assert!(!prune(&mut store, EdgeId(99)));
    }
}
