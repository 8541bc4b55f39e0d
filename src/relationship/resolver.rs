use crate::schema::TypeRegistry;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Separator between the three parts of a triple key.
pub const KEY_SEPARATOR: &str = "|";

/// Deterministic key for a (source, kind, destination) triple.
pub fn combined_key(source_type: &str, kind: &str, dest_type: &str) -> String {
    [source_type, kind, dest_type].join(KEY_SEPARATOR)
}

/// A friendly name bound to a triple and the relationship-entity type backing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRelation {
    pub name: String,
    pub relationship_type: String,
    pub source_type: String,
    pub dest_type: String,
    pub kind: String,
}

/// Maps raw relationships read from storage to the typed relationship entity
/// that should wrap them.
///
/// Mappings are registered during bring-up and read concurrently afterwards.
pub struct RelationshipResolver {
    registry: Arc<TypeRegistry>,
    by_name: RwLock<HashMap<String, NamedRelation>>,
    by_triple: RwLock<HashMap<String, NamedRelation>>,
}

impl RelationshipResolver {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            by_name: RwLock::new(HashMap::new()),
            by_triple: RwLock::new(HashMap::new()),
        }
    }

    pub fn register_named_relation(
        &self,
        name: &str,
        relationship_type: &str,
        source_type: &str,
        dest_type: &str,
        kind: &str,
    ) {
        let relation = NamedRelation {
            name: name.to_string(),
            relationship_type: relationship_type.to_string(),
            source_type: source_type.to_string(),
            dest_type: dest_type.to_string(),
            kind: kind.to_string(),
        };

        let key = combined_key(source_type, kind, dest_type);
        let previous = self
            .by_triple
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), relation.clone());
        if let Some(previous) = previous {
            if previous.relationship_type != relationship_type {
                warn!(
                    "Relation triple {} remapped from {} to {}",
                    key, previous.relationship_type, relationship_type
                );
            }
        }

        self.by_name
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(self.registry.normalize_entity_name(name), relation);
    }

    /// Relationship-entity type for the triple, or `None`.
    ///
    /// Search order:
    /// 1. the exact triple;
    /// 2. the destination's ancestry with the source held fixed (each level's
    ///    class, then the interfaces it declares directly);
    /// 3. step 2 again for each superclass of the source, nearest first;
    /// 4. a final exact lookup.
    pub fn resolve(&self, source_type: &str, kind: &str, dest_type: &str) -> Option<String> {
        let triples = self.by_triple.read().unwrap_or_else(PoisonError::into_inner);

        if let Some(relation) = triples.get(&combined_key(source_type, kind, dest_type)) {
            return Some(relation.relationship_type.clone());
        }

        let found = self.registry.ancestry(source_type).iter().find_map(|source_level| {
            self.walk_destination(&triples, &source_level.type_name, kind, dest_type)
        });
        if found.is_some() {
            return found;
        }

        let fallback = triples
            .get(&combined_key(source_type, kind, dest_type))
            .map(|relation| relation.relationship_type.clone());
        if fallback.is_none() {
            debug!("No relation mapping for ({}, {}, {})", source_type, kind, dest_type);
        }
        fallback
    }

    fn walk_destination(
        &self,
        triples: &HashMap<String, NamedRelation>,
        source_type: &str,
        kind: &str,
        dest_type: &str,
    ) -> Option<String> {
        self.registry
            .ancestry(dest_type)
            .iter()
            .flat_map(|level| level.candidates())
            .find_map(|candidate| triples.get(&combined_key(source_type, kind, candidate)))
            .map(|relation| relation.relationship_type.clone())
    }

    /// Direct lookup by friendly name, no hierarchy walk.
    pub fn resolve_by_name(&self, relation_name: &str) -> Option<NamedRelation> {
        self.by_name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&self.registry.normalize_entity_name(relation_name))
            .cloned()
    }

    pub fn relations(&self) -> Vec<NamedRelation> {
        let mut relations: Vec<NamedRelation> = self
            .by_triple
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        relations.sort_by(|a, b| a.name.cmp(&b.name));
        relations
    }
}
