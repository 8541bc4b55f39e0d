// ============================================================================
// Change Set
// ============================================================================
//
// Per-transaction accumulator of created, modified and deleted entities. The
// commit notifier drains it into before/after commit callbacks; a nested
// transaction is folded into its parent with `include`.
//
// A change set belongs to exactly one unit of work. Mutation needs `&mut
// self`, so cross-thread sharing requires the owner to hand it over.
//
// ============================================================================

use super::{NodeRef, RelationshipRef};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Relationship kind that marks ownership of a node.
pub const OWNS: &str = "OWNS";
/// Relationship kind that grants access to a node.
pub const SECURITY: &str = "SECURITY";
/// Relationship kind that places a node at a location.
pub const IS_AT: &str = "IS_AT";

/// Which aspect of a node a relationship-endpoint change touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationAspect {
    Generic,
    Owner,
    Security,
    Location,
}

const ASPECT_DISPATCH: [(&str, MutationAspect); 3] = [
    (OWNS, MutationAspect::Owner),
    (SECURITY, MutationAspect::Security),
    (IS_AT, MutationAspect::Location),
];

impl MutationAspect {
    /// Reserved kinds map to their aspect; everything else is generic.
    pub fn for_relationship_kind(kind: &str) -> Self {
        ASPECT_DISPATCH
            .iter()
            .find(|(reserved, _)| *reserved == kind)
            .map(|(_, aspect)| *aspect)
            .unwrap_or(MutationAspect::Generic)
    }
}

/// Queue sizes, for diagnostics and log events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSetStats {
    pub created_nodes: usize,
    pub modified_nodes: usize,
    pub deleted_nodes: usize,
    pub created_relationships: usize,
    pub modified_relationships: usize,
    pub deleted_relationships: usize,
    pub owner_modified: usize,
    pub security_modified: usize,
    pub location_modified: usize,
    pub propagation: usize,
}

#[derive(Debug, Clone)]
pub struct ChangeSet {
    created_nodes: IndexSet<NodeRef>,
    modified_nodes: IndexSet<NodeRef>,
    deleted_nodes: IndexSet<NodeRef>,

    created_relationships: IndexSet<RelationshipRef>,
    modified_relationships: IndexSet<RelationshipRef>,
    deleted_relationships: IndexSet<RelationshipRef>,

    owner_modified: IndexSet<NodeRef>,
    security_modified: IndexSet<NodeRef>,
    location_modified: IndexSet<NodeRef>,

    /// Nodes that need a downstream consistency pass.
    propagation: IndexSet<NodeRef>,

    system_only: bool,
}

impl Default for ChangeSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeSet {
    pub fn new() -> Self {
        Self {
            created_nodes: IndexSet::new(),
            modified_nodes: IndexSet::new(),
            deleted_nodes: IndexSet::new(),
            created_relationships: IndexSet::new(),
            modified_relationships: IndexSet::new(),
            deleted_relationships: IndexSet::new(),
            owner_modified: IndexSet::new(),
            security_modified: IndexSet::new(),
            location_modified: IndexSet::new(),
            propagation: IndexSet::new(),
            system_only: true,
        }
    }

    fn node_is_created_or_deleted(&self, node: &NodeRef) -> bool {
        self.created_nodes.contains(node) || self.deleted_nodes.contains(node)
    }

    fn relationship_is_created_or_deleted(&self, relationship: &RelationshipRef) -> bool {
        self.created_relationships.contains(relationship)
            || self.deleted_relationships.contains(relationship)
    }

    pub fn create_node(&mut self, node: &NodeRef) {
        self.system_only = false;
        self.created_nodes.insert(node.clone());
        self.propagation.insert(node.clone());
    }

    pub fn create_relationship(&mut self, relationship: &RelationshipRef) {
        self.system_only = false;
        self.created_relationships.insert(relationship.clone());
    }

    /// No-op for nodes created or deleted in this change set.
    pub fn modify_node(&mut self, node: &NodeRef) {
        if self.node_is_created_or_deleted(node) {
            return;
        }
        self.modified_nodes.insert(node.clone());
        self.propagation.insert(node.clone());
    }

    pub fn modify_relationship(&mut self, relationship: &RelationshipRef) {
        if self.relationship_is_created_or_deleted(relationship) {
            return;
        }
        self.modified_relationships.insert(relationship.clone());
    }

    pub fn modify_owner(&mut self, node: &NodeRef) {
        if !self.node_is_created_or_deleted(node) {
            self.owner_modified.insert(node.clone());
        }
    }

    pub fn modify_security(&mut self, node: &NodeRef) {
        if !self.node_is_created_or_deleted(node) {
            self.security_modified.insert(node.clone());
        }
    }

    pub fn modify_location(&mut self, node: &NodeRef) {
        if !self.node_is_created_or_deleted(node) {
            self.location_modified.insert(node.clone());
        }
    }

    pub fn modify_aspect(&mut self, node: &NodeRef, aspect: MutationAspect) {
        match aspect {
            MutationAspect::Generic => self.modify_node(node),
            MutationAspect::Owner => self.modify_owner(node),
            MutationAspect::Security => self.modify_security(node),
            MutationAspect::Location => self.modify_location(node),
        }
    }

    /// A relationship of `kind` was attached to or detached from `node`.
    pub fn modify_relationship_endpoint(&mut self, node: &NodeRef, kind: &str) {
        self.modify_aspect(node, MutationAspect::for_relationship_kind(kind));
    }

    pub fn delete_node(&mut self, node: &NodeRef) {
        self.system_only = false;
        self.propagation.shift_remove(node);
        self.created_nodes.shift_remove(node);
        self.modified_nodes.shift_remove(node);
        self.owner_modified.shift_remove(node);
        self.security_modified.shift_remove(node);
        self.location_modified.shift_remove(node);
        self.deleted_nodes.insert(node.clone());
    }

    pub fn delete_relationship(&mut self, relationship: &RelationshipRef) {
        self.created_relationships.shift_remove(relationship);
        self.modified_relationships.shift_remove(relationship);
        self.deleted_relationships.insert(relationship.clone());
    }

    /// A non-internal attribute changed.
    pub fn non_system_property(&mut self) {
        self.system_only = false;
    }

    /// Fold a nested change set into this one.
    ///
    /// Nodes deleted anywhere in the merged result are purged from the
    /// created, modified and aspect queues. Relationship queues are merged
    /// without a purge.
    pub fn include(&mut self, other: &ChangeSet) {
        self.created_nodes.extend(other.created_nodes.iter().cloned());
        self.modified_nodes.extend(other.modified_nodes.iter().cloned());
        self.deleted_nodes.extend(other.deleted_nodes.iter().cloned());
        self.created_relationships.extend(other.created_relationships.iter().cloned());
        self.modified_relationships.extend(other.modified_relationships.iter().cloned());
        self.deleted_relationships.extend(other.deleted_relationships.iter().cloned());
        self.owner_modified.extend(other.owner_modified.iter().cloned());
        self.security_modified.extend(other.security_modified.iter().cloned());
        self.location_modified.extend(other.location_modified.iter().cloned());
        self.propagation.extend(other.propagation.iter().cloned());
        self.system_only &= other.system_only;

        for node in &self.deleted_nodes {
            self.created_nodes.shift_remove(node);
            self.modified_nodes.shift_remove(node);
            self.owner_modified.shift_remove(node);
            self.security_modified.shift_remove(node);
            self.location_modified.shift_remove(node);
        }
    }

    pub fn clear(&mut self) {
        self.created_nodes.clear();
        self.modified_nodes.clear();
        self.deleted_nodes.clear();
        self.created_relationships.clear();
        self.modified_relationships.clear();
        self.deleted_relationships.clear();
        self.owner_modified.clear();
        self.security_modified.clear();
        self.location_modified.clear();
        self.propagation.clear();
        self.system_only = true;
    }

    pub fn created_nodes(&self) -> &IndexSet<NodeRef> {
        &self.created_nodes
    }

    pub fn modified_nodes(&self) -> &IndexSet<NodeRef> {
        &self.modified_nodes
    }

    pub fn deleted_nodes(&self) -> &IndexSet<NodeRef> {
        &self.deleted_nodes
    }

    pub fn created_relationships(&self) -> &IndexSet<RelationshipRef> {
        &self.created_relationships
    }

    pub fn modified_relationships(&self) -> &IndexSet<RelationshipRef> {
        &self.modified_relationships
    }

    pub fn deleted_relationships(&self) -> &IndexSet<RelationshipRef> {
        &self.deleted_relationships
    }

    /// Nodes whose `aspect` queue holds them; `Generic` maps to the modified queue.
    pub fn aspect_modified(&self, aspect: MutationAspect) -> &IndexSet<NodeRef> {
        match aspect {
            MutationAspect::Generic => &self.modified_nodes,
            MutationAspect::Owner => &self.owner_modified,
            MutationAspect::Security => &self.security_modified,
            MutationAspect::Location => &self.location_modified,
        }
    }

    pub fn propagation_queue(&self) -> &IndexSet<NodeRef> {
        &self.propagation
    }

    /// True until a structural create/delete or a non-system attribute change.
    pub fn is_system_only(&self) -> bool {
        self.system_only
    }

    pub fn is_empty(&self) -> bool {
        self.created_nodes.is_empty()
            && self.modified_nodes.is_empty()
            && self.deleted_nodes.is_empty()
            && self.created_relationships.is_empty()
            && self.modified_relationships.is_empty()
            && self.deleted_relationships.is_empty()
            && self.owner_modified.is_empty()
            && self.security_modified.is_empty()
            && self.location_modified.is_empty()
            && self.propagation.is_empty()
    }

    pub fn stats(&self) -> ChangeSetStats {
        ChangeSetStats {
            created_nodes: self.created_nodes.len(),
            modified_nodes: self.modified_nodes.len(),
            deleted_nodes: self.deleted_nodes.len(),
            created_relationships: self.created_relationships.len(),
            modified_relationships: self.modified_relationships.len(),
            deleted_relationships: self.deleted_relationships.len(),
            owner_modified: self.owner_modified.len(),
            security_modified: self.security_modified.len(),
            location_modified: self.location_modified.len(),
            propagation: self.propagation.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_dispatch() {
        assert_eq!(MutationAspect::for_relationship_kind(OWNS), MutationAspect::Owner);
        assert_eq!(MutationAspect::for_relationship_kind(SECURITY), MutationAspect::Security);
        assert_eq!(MutationAspect::for_relationship_kind(IS_AT), MutationAspect::Location);
        assert_eq!(MutationAspect::for_relationship_kind("CONTAINS"), MutationAspect::Generic);
    }

    #[test]
    fn test_starts_system_only_and_empty() {
        let changes = ChangeSet::new();
        assert!(changes.is_system_only());
        assert!(changes.is_empty());
    }

    #[test]
    fn test_modify_is_noop_for_created_node() {
        let node = NodeRef::new("Folder");
        let mut changes = ChangeSet::new();
        changes.create_node(&node);
        changes.modify_node(&node);
        changes.modify_owner(&node);

        assert!(changes.modified_nodes().is_empty());
        assert!(changes.aspect_modified(MutationAspect::Owner).is_empty());
        assert_eq!(changes.propagation_queue().len(), 1);
        assert!(!changes.is_system_only());
    }

    #[test]
    fn test_modify_does_not_flip_system_only() {
        let mut changes = ChangeSet::new();
        changes.modify_node(&NodeRef::new("Folder"));
        assert!(changes.is_system_only());
        changes.non_system_property();
        assert!(!changes.is_system_only());
    }

    #[test]
    fn test_delete_node_clears_other_queues() {
        let node = NodeRef::new("Folder");
        let mut changes = ChangeSet::new();
        changes.modify_node(&node);
        changes.modify_relationship_endpoint(&node, SECURITY);
        changes.modify_relationship_endpoint(&node, IS_AT);
        changes.delete_node(&node);

        let stats = changes.stats();
        assert_eq!(stats.deleted_nodes, 1);
        assert_eq!(stats.modified_nodes, 0);
        assert_eq!(stats.security_modified, 0);
        assert_eq!(stats.location_modified, 0);
        assert_eq!(stats.propagation, 0);
    }

    #[test]
    fn test_relationship_lifecycle() {
        let a = NodeRef::new("Folder");
        let b = NodeRef::new("File");
        let rel = RelationshipRef::new("FolderChildren", "CONTAINS", &a, &b);
        let mut changes = ChangeSet::new();

        changes.create_relationship(&rel);
        changes.modify_relationship(&rel);
        assert!(changes.modified_relationships().is_empty());

        changes.delete_relationship(&rel);
        assert!(changes.created_relationships().is_empty());
        assert_eq!(changes.deleted_relationships().len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut changes = ChangeSet::new();
        changes.create_node(&NodeRef::new("Folder"));
        changes.clear();
        assert!(changes.is_empty());
        assert!(changes.is_system_only());
    }
}
