/// Relationship resolver tests
///
/// Triple resolution across source and destination ancestry, and friendly
/// name lookups.
/// Run with: cargo test --test relationship_tests

use graphweave::relationship::{RelationshipResolver, combined_key};
use graphweave::schema::{TypeDescriptor, TypeRegistry};
use std::sync::Arc;

fn zoo_registry() -> Arc<TypeRegistry> {
    let registry = TypeRegistry::default();
    registry.register_type(TypeDescriptor::abstract_type("Animal"));
    registry.register_type(TypeDescriptor::concrete("Dog").extends("Animal"));
    registry.register_type(TypeDescriptor::concrete("Cat").extends("Animal"));
    registry.register_type(TypeDescriptor::interface("Chewable"));
    registry.register_type(TypeDescriptor::abstract_type("Thing"));
    registry.register_type(
        TypeDescriptor::concrete("Toy")
            .extends("Thing")
            .implements("Chewable"),
    );
    registry.register_type(TypeDescriptor::concrete("Ball").extends("Toy"));
    registry.scan_all();
    Arc::new(registry)
}

fn zoo_resolver() -> RelationshipResolver {
    let resolver = RelationshipResolver::new(zoo_registry());
    resolver.register_named_relation("animal_things", "AnimalOwnsThing", "Animal", "Thing", "OWNS");
    resolver.register_named_relation("dog_things", "DogOwnsThing", "Dog", "Thing", "OWNS");
    resolver
}

#[test]
fn test_exact_mapping_beats_supertype_mapping() {
    let resolver = zoo_resolver();
    assert_eq!(
        resolver.resolve("Dog", "OWNS", "Thing"),
        Some("DogOwnsThing".to_string())
    );
}

#[test]
fn test_source_falls_back_to_supertype_mapping() {
    let resolver = zoo_resolver();
    assert_eq!(
        resolver.resolve("Cat", "OWNS", "Thing"),
        Some("AnimalOwnsThing".to_string())
    );
}

#[test]
fn test_destination_walks_superclass_chain() {
    let resolver = zoo_resolver();
    assert_eq!(
        resolver.resolve("Dog", "OWNS", "Ball"),
        Some("DogOwnsThing".to_string())
    );
    assert_eq!(
        resolver.resolve("Cat", "OWNS", "Ball"),
        Some("AnimalOwnsThing".to_string())
    );
}

#[test]
fn test_exact_source_is_exhausted_before_widening() {
    let resolver = zoo_resolver();
    resolver.register_named_relation("animal_toys", "AnimalOwnsToy", "Animal", "Toy", "OWNS");

    // Dog's own mapping on the wider destination wins over Animal's narrower one.
    assert_eq!(
        resolver.resolve("Dog", "OWNS", "Ball"),
        Some("DogOwnsThing".to_string())
    );
    assert_eq!(
        resolver.resolve("Cat", "OWNS", "Ball"),
        Some("AnimalOwnsToy".to_string())
    );
}

#[test]
fn test_destination_interfaces_are_checked_per_level() {
    let resolver = zoo_resolver();
    resolver.register_named_relation("dog_chews", "DogChews", "Dog", "Chewable", "CHEWS");

    assert_eq!(resolver.resolve("Dog", "CHEWS", "Toy"), Some("DogChews".to_string()));
    // Ball inherits from Toy, whose level declares Chewable.
    assert_eq!(resolver.resolve("Dog", "CHEWS", "Ball"), Some("DogChews".to_string()));
    assert_eq!(resolver.resolve("Dog", "CHEWS", "Thing"), None);
}

#[test]
fn test_unregistered_triple_resolves_to_none() {
    let resolver = zoo_resolver();
    assert_eq!(resolver.resolve("Dog", "FEARS", "Thing"), None);
    assert_eq!(resolver.resolve("Unicorn", "OWNS", "Rainbow"), None);
    assert_eq!(resolver.resolve("Thing", "OWNS", "Dog"), None);
}

#[test]
fn test_resolve_by_name() {
    let resolver = zoo_resolver();

    let relation = resolver.resolve_by_name("dog_things").unwrap();
    assert_eq!(relation.relationship_type, "DogOwnsThing");
    assert_eq!(relation.source_type, "Dog");
    assert_eq!(relation.dest_type, "Thing");
    assert_eq!(relation.kind, "OWNS");

    assert!(resolver.resolve_by_name("DogThing").is_some());
    assert!(resolver.resolve_by_name("cat_things").is_none());
}

#[test]
fn test_relations_listing_and_keys() {
    let resolver = zoo_resolver();
    let names: Vec<String> = resolver
        .relations()
        .into_iter()
        .map(|relation| relation.name)
        .collect();
    assert_eq!(names, vec!["animal_things", "dog_things"]);
    assert_eq!(combined_key("Dog", "OWNS", "Thing"), combined_key("Dog", "OWNS", "Thing"));
    assert_ne!(combined_key("Dog", "OWNS", "Thing"), combined_key("Thing", "OWNS", "Dog"));
}
