use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Reference to a graph node tracked by a change set.
///
/// Identity is the node id alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRef {
    id: Uuid,
    type_name: String,
}

impl NodeRef {
    /// Reference a freshly created node with a new random id.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), type_name)
    }

    pub fn with_id(id: Uuid, type_name: impl Into<String>) -> Self {
        Self {
            id,
            type_name: type_name.into(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NodeRef {}

impl Hash for NodeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.type_name, self.id)
    }
}

/// Reference to a typed relationship between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipRef {
    id: Uuid,
    type_name: String,
    kind: String,
    source: Uuid,
    target: Uuid,
}

impl RelationshipRef {
    pub fn new(
        type_name: impl Into<String>,
        kind: impl Into<String>,
        source: &NodeRef,
        target: &NodeRef,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            type_name: type_name.into(),
            kind: kind.into(),
            source: source.id(),
            target: target.id(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Relationship kind as stored, e.g. `OWNS`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn source(&self) -> Uuid {
        self.source
    }

    pub fn target(&self) -> Uuid {
        self.target
    }
}

impl PartialEq for RelationshipRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RelationshipRef {}

impl Hash for RelationshipRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for RelationshipRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})-[:{}]->({})", self.source, self.kind, self.target)
    }
}
