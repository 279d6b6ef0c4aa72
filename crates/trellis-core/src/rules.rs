//! # Permission & Rule Evaluator
//!
//! The read-only gate in front of edge creation.
//!
//! Evaluation order: admin bypass, hierarchy resolution, base permission
//! check, instance "require previous" check (with implied-rule fallback),
//! then the target node's veto hook. Any failing step short-circuits to
//! deny. Denial is a value (`false`), never an error; the only errors this
//! module surfaces are storage failures.
//!
//! The permission subsystem itself is external: callers hand in an
//! [`AccessControl`] implementation. A static in-memory implementation is
//! provided for tests and self-contained deployments.

use crate::primitives::DEFAULT_ADMIN_PARENT_CODE;
use crate::registry::EdgeTypeRegistry;
use crate::store::{EdgeFilter, EdgeStore, SortOrder};
use crate::types::{NodeId, NodeRef, TrellisError, TypeCode};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// SUBJECT & ACCESS CONTROL SEAM
// =============================================================================

/// An opaque acting subject (a member, a service account).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Subject(pub String);

impl Subject {
    /// Create a new subject from an identifier.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

/// How multiple permission codes combine in a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    /// The subject must hold at least one of the codes.
    Any,
    /// The subject must hold every code.
    All,
}

/// The external permission subsystem.
pub trait AccessControl {
    /// Whether the subject holds the given permission codes.
    fn check(&self, codes: &[String], mode: CheckMode, subject: &Subject) -> bool;

    /// The subject attached to the current request, if any.
    fn current_subject(&self) -> Option<Subject>;

    /// Whether the subject belongs to any of the named groups.
    fn subject_in_groups(&self, subject: &Subject, groups: &[String]) -> bool;
}

/// The target node's final say over an otherwise-permitted action.
///
/// Implementations typically check node state ("is this organisation
/// still accepting members"). The default allows everything.
pub trait NodeGate {
    /// Whether the target vetoes the action.
    fn allows(&self, target: &NodeRef, codes: &[TypeCode]) -> bool;
}

/// A gate that never vetoes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl NodeGate for AllowAll {
    fn allows(&self, _target: &NodeRef, _codes: &[TypeCode]) -> bool {
        true
    }
}

// =============================================================================
// STATIC ACCESS CONTROL
// =============================================================================

/// In-memory [`AccessControl`] implementation.
///
/// Holds explicit grants and group memberships; useful in tests and in
/// deployments without an external permission backend.
#[derive(Debug, Clone, Default)]
pub struct StaticAccessControl {
    grants: BTreeMap<Subject, BTreeSet<String>>,
    groups: BTreeMap<Subject, BTreeSet<String>>,
    current: Option<Subject>,
}

impl StaticAccessControl {
    /// Create an empty access control (nobody holds anything).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a permission code to a subject.
    #[must_use]
    pub fn grant(mut self, subject: &Subject, code: impl Into<String>) -> Self {
        self.grants
            .entry(subject.clone())
            .or_default()
            .insert(code.into());
        self
    }

    /// Add a subject to a group.
    #[must_use]
    pub fn in_group(mut self, subject: &Subject, group: impl Into<String>) -> Self {
        self.groups
            .entry(subject.clone())
            .or_default()
            .insert(group.into());
        self
    }

    /// Set the subject attached to the current request.
    #[must_use]
    pub fn with_current(mut self, subject: &Subject) -> Self {
        self.current = Some(subject.clone());
        self
    }
}

impl AccessControl for StaticAccessControl {
    fn check(&self, codes: &[String], mode: CheckMode, subject: &Subject) -> bool {
        let Some(held) = self.grants.get(subject) else {
            return false;
        };
        match mode {
            CheckMode::Any => codes.iter().any(|code| held.contains(code)),
            CheckMode::All => codes.iter().all(|code| held.contains(code)),
        }
    }

    fn current_subject(&self) -> Option<Subject> {
        self.current.clone()
    }

    fn subject_in_groups(&self, subject: &Subject, groups: &[String]) -> bool {
        self.groups
            .get(subject)
            .is_some_and(|memberships| groups.iter().any(|group| memberships.contains(group)))
    }
}

// =============================================================================
// RULE EVALUATOR
// =============================================================================

/// Evaluates whether an edge of the requested types may be created
/// between two nodes by the acting subject.
#[derive(Debug, Clone)]
pub struct RuleEvaluator {
    /// Group names whose members bypass every check.
    admin_groups: Vec<String>,
    /// Parent code marking administrative edge types.
    admin_parent_code: TypeCode,
}

impl Default for RuleEvaluator {
    fn default() -> Self {
        Self {
            admin_groups: vec!["administrators".to_string()],
            admin_parent_code: TypeCode::new(DEFAULT_ADMIN_PARENT_CODE),
        }
    }
}

impl RuleEvaluator {
    /// Create an evaluator with default admin configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the admin group list.
    #[must_use]
    pub fn with_admin_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.admin_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the subject may create an edge of any of the given types
    /// between `from` and `to`.
    ///
    /// Read-only: never mutates state, safe to call repeatedly. `subject`
    /// falls back to the access control's current subject; with neither,
    /// only ungated edge types pass.
    ///
    /// Errors are storage failures only; denial is `Ok(false)`.
    pub fn check_permission(
        &self,
        access: &dyn AccessControl,
        gate: &dyn NodeGate,
        types: &EdgeTypeRegistry,
        store: &dyn EdgeStore,
        from: &NodeRef,
        to: &NodeRef,
        codes: &[TypeCode],
        subject: Option<&Subject>,
    ) -> Result<bool, TrellisError> {
        let subject = subject.cloned().or_else(|| access.current_subject());

        // Step 1: admin bypass.
        if let Some(subject) = &subject {
            if self.is_admin(access, types, from, to, subject) {
                return Ok(true);
            }
        }

        // Step 2: hierarchy resolution.
        let candidates = types.get_hierarchy(from.class(), to.class(), codes);
        if candidates.is_empty() {
            return Ok(false);
        }

        // Step 3: base permission check, any-mode across candidate codes.
        // Candidates without a permission code are ungated.
        let permission_codes: Vec<String> = candidates
            .iter()
            .filter_map(|edge_type| edge_type.permission_code.clone())
            .collect();
        if !permission_codes.is_empty() {
            match &subject {
                Some(subject) => {
                    if !access.check(&permission_codes, CheckMode::Any, subject) {
                        return Ok(false);
                    }
                }
                None => return Ok(false),
            }
        }

        // Step 4: instance rules, only when both endpoints are persisted;
        // class-only and singleton checks skip this step.
        if let (Some(from_id), Some(to_id)) = (from.id(), to.id()) {
            let required: BTreeSet<TypeCode> = candidates
                .iter()
                .filter_map(|edge_type| edge_type.require_previous.clone())
                .collect();
            for code in &required {
                if !self.previous_satisfied(types, store, from_id, to_id, code)? {
                    return Ok(false);
                }
            }
        }

        // Step 5: target veto.
        Ok(gate.allows(to, codes))
    }

    /// Admin bypass: membership in a configured admin group, or holding a
    /// permission granted by an admin-parented edge type for this pair.
    fn is_admin(
        &self,
        access: &dyn AccessControl,
        types: &EdgeTypeRegistry,
        from: &NodeRef,
        to: &NodeRef,
        subject: &Subject,
    ) -> bool {
        if access.subject_in_groups(subject, &self.admin_groups) {
            return true;
        }
        let admin_codes: Vec<String> = types
            .get_hierarchy(
                from.class(),
                to.class(),
                std::slice::from_ref(&self.admin_parent_code),
            )
            .into_iter()
            .filter_map(|edge_type| edge_type.permission_code.clone())
            .collect();
        !admin_codes.is_empty() && access.check(&admin_codes, CheckMode::Any, subject)
    }

    /// Whether a required previous edge exists between the pair, directly
    /// or through an implied relationship.
    fn previous_satisfied(
        &self,
        types: &EdgeTypeRegistry,
        store: &dyn EdgeStore,
        from_id: NodeId,
        to_id: NodeId,
        required: &TypeCode,
    ) -> Result<bool, TrellisError> {
        let filter = EdgeFilter {
            node_a: Some(from_id),
            node_b: Some(to_id),
            ..EdgeFilter::default()
        };
        let existing = store.select(&filter, SortOrder::Unordered)?;

        // Direct: an edge whose type carries (or specializes) the code.
        for edge in &existing {
            if let Some(edge_type) = types.get(edge.edge_type) {
                if edge_type.code == *required
                    || edge_type.parent_code.as_ref() == Some(required)
                {
                    return Ok(true);
                }
            }
        }

        // Implied: an edge whose type transitively satisfies the code.
        for edge in &existing {
            if let Some(edge_type) = types.get(edge.edge_type) {
                if edge_type.implied_codes.contains(required) {
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::EdgeTypeDef;
    use crate::store::MemoryStore;
    use crate::types::{ClassName, EdgeKindKey, NewEdge, NodeRecord};

    fn member(id: u64) -> NodeRef {
        NodeRef::Record(NodeRecord::new(NodeId(id), ClassName::new("Member")))
    }

    fn organisation(id: u64) -> NodeRef {
        NodeRef::Record(NodeRecord::new(NodeId(id), ClassName::new("Organisation")))
    }

    fn registry() -> EdgeTypeRegistry {
        let mut types = EdgeTypeRegistry::new();
        types
            .define(
                EdgeTypeDef::new("REG")
                    .between("Member", "Organisation")
                    .permission("CAN_REGISTER"),
            )
            .expect("define");
        types
            .define(
                EdgeTypeDef::new("CRT")
                    .between("Member", "Organisation")
                    .permission("CAN_CREATE")
                    .requires_previous("REG"),
            )
            .expect("define");
        types
    }

    fn codes(list: &[&str]) -> Vec<TypeCode> {
        list.iter().copied().map(TypeCode::new).collect()
    }

    #[test]
    fn base_permission_is_any_mode() {
        let types = registry();
        let store = MemoryStore::new();
        let evaluator = RuleEvaluator::new();

        let alice = Subject::new("alice");
        let access = StaticAccessControl::new().grant(&alice, "CAN_REGISTER");

        let allowed = evaluator
            .check_permission(
                &access,
                &AllowAll,
                &types,
                &store,
                &member(1),
                &organisation(2),
                &codes(&["REG"]),
                Some(&alice),
            )
            .expect("check");
        assert!(allowed);

        let stranger = Subject::new("mallory");
        let denied = evaluator
            .check_permission(
                &access,
                &AllowAll,
                &types,
                &store,
                &member(1),
                &organisation(2),
                &codes(&["REG"]),
                Some(&stranger),
            )
            .expect("check");
        assert!(!denied);
    }

    #[test]
    fn admin_group_bypasses_everything() {
        let types = registry();
        let store = MemoryStore::new();
        let evaluator = RuleEvaluator::new();

        let root = Subject::new("root");
        // No grants at all; group membership alone decides.
        let access = StaticAccessControl::new().in_group(&root, "administrators");

        let allowed = evaluator
            .check_permission(
                &access,
                &AllowAll,
                &types,
                &store,
                &member(1),
                &organisation(2),
                &codes(&["NO_SUCH_CODE"]),
                Some(&root),
            )
            .expect("check");
        assert!(allowed);
    }

    #[test]
    fn unknown_codes_deny() {
        let types = registry();
        let store = MemoryStore::new();
        let evaluator = RuleEvaluator::new();
        let alice = Subject::new("alice");
        let access = StaticAccessControl::new().grant(&alice, "CAN_REGISTER");

        let denied = evaluator
            .check_permission(
                &access,
                &AllowAll,
                &types,
                &store,
                &member(1),
                &organisation(2),
                &codes(&["XXX"]),
                Some(&alice),
            )
            .expect("check");
        assert!(!denied);
    }

    #[test]
    fn require_previous_gates_until_satisfied() {
        let types = registry();
        let mut store = MemoryStore::new();
        let evaluator = RuleEvaluator::new();
        let alice = Subject::new("alice");
        let access = StaticAccessControl::new().grant(&alice, "CAN_CREATE");

        let denied = evaluator
            .check_permission(
                &access,
                &AllowAll,
                &types,
                &store,
                &member(1),
                &organisation(2),
                &codes(&["CRT"]),
                Some(&alice),
            )
            .expect("check");
        assert!(!denied, "CRT requires a previous REG edge");

        // Record the registration, then CRT is allowed.
        let reg_id = types
            .get_by_code(&TypeCode::new("REG"))
            .expect("lookup")
            .id;
        store
            .insert_edge(NewEdge {
                kind: EdgeKindKey::new("member-organisation"),
                node_a: NodeId(1),
                node_b: NodeId(2),
                edge_type: reg_id,
                variant: None,
            })
            .expect("insert");

        let allowed = evaluator
            .check_permission(
                &access,
                &AllowAll,
                &types,
                &store,
                &member(1),
                &organisation(2),
                &codes(&["CRT"]),
                Some(&alice),
            )
            .expect("check");
        assert!(allowed);
    }

    #[test]
    fn class_only_target_skips_instance_rules() {
        let types = registry();
        let store = MemoryStore::new();
        let evaluator = RuleEvaluator::new();
        let alice = Subject::new("alice");
        let access = StaticAccessControl::new().grant(&alice, "CAN_CREATE");

        // Same CRT check as above, but against the class, not an instance:
        // the require-previous step does not apply.
        let allowed = evaluator
            .check_permission(
                &access,
                &AllowAll,
                &types,
                &store,
                &member(1),
                &NodeRef::Class(ClassName::new("Organisation")),
                &codes(&["CRT"]),
                Some(&alice),
            )
            .expect("check");
        assert!(allowed);
    }

    #[test]
    fn implied_relationship_satisfies_requirement() {
        let mut types = registry();
        // FND implies REG: founding an organisation registers you with it.
        types
            .define(
                EdgeTypeDef::new("FND")
                    .between("Member", "Organisation")
                    .implies(["REG"]),
            )
            .expect("define");

        let mut store = MemoryStore::new();
        let fnd_id = types
            .get_by_code(&TypeCode::new("FND"))
            .expect("lookup")
            .id;
        store
            .insert_edge(NewEdge {
                kind: EdgeKindKey::new("member-organisation"),
                node_a: NodeId(1),
                node_b: NodeId(2),
                edge_type: fnd_id,
                variant: None,
            })
            .expect("insert");

        let evaluator = RuleEvaluator::new();
        let alice = Subject::new("alice");
        let access = StaticAccessControl::new().grant(&alice, "CAN_CREATE");

        // No REG edge exists, but the FND edge implies one.
        let allowed = evaluator
            .check_permission(
                &access,
                &AllowAll,
                &types,
                &store,
                &member(1),
                &organisation(2),
                &codes(&["CRT"]),
                Some(&alice),
            )
            .expect("check");
        assert!(allowed);
    }

    #[test]
    fn target_veto_denies_after_all_else_passes() {
        struct RefuseOrganisations;
        impl NodeGate for RefuseOrganisations {
            fn allows(&self, target: &NodeRef, _codes: &[TypeCode]) -> bool {
                target.class() != Some(&ClassName::new("Organisation"))
            }
        }

        let types = registry();
        let store = MemoryStore::new();
        let evaluator = RuleEvaluator::new();
        let alice = Subject::new("alice");
        let access = StaticAccessControl::new().grant(&alice, "CAN_REGISTER");

        let denied = evaluator
            .check_permission(
                &access,
                &RefuseOrganisations,
                &types,
                &store,
                &member(1),
                &organisation(2),
                &codes(&["REG"]),
                Some(&alice),
            )
            .expect("check");
        assert!(!denied);
    }

    #[test]
    fn current_subject_is_the_fallback() {
        let types = registry();
        let store = MemoryStore::new();
        let evaluator = RuleEvaluator::new();
        let alice = Subject::new("alice");
        let access = StaticAccessControl::new()
            .grant(&alice, "CAN_REGISTER")
            .with_current(&alice);

        let allowed = evaluator
            .check_permission(
                &access,
                &AllowAll,
                &types,
                &store,
                &member(1),
                &organisation(2),
                &codes(&["REG"]),
                None,
            )
            .expect("check");
        assert!(allowed);
    }

    #[test]
    fn ungated_types_pass_without_subject() {
        let mut types = EdgeTypeRegistry::new();
        types
            .define(EdgeTypeDef::new("VIS").between("Member", "Organisation"))
            .expect("define");

        let store = MemoryStore::new();
        let evaluator = RuleEvaluator::new();
        let access = StaticAccessControl::new();

        let allowed = evaluator
            .check_permission(
                &access,
                &AllowAll,
                &types,
                &store,
                &member(1),
                &organisation(2),
                &codes(&["VIS"]),
                None,
            )
            .expect("check");
        assert!(allowed);
    }
}
