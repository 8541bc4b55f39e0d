pub mod resolver;

pub use resolver::{KEY_SEPARATOR, NamedRelation, RelationshipResolver, combined_key};
