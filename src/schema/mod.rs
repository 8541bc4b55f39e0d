// ============================================================================
// Schema Metadata Module
// ============================================================================
//
// Type descriptors are registered explicitly at definition time and scanned
// once at bring-up. Resolution walks a precomputed ancestry list per type:
// the type itself, then its superclass chain, each level carrying only the
// interfaces that class declares directly.
//
// ============================================================================

pub mod descriptor;
pub mod naming;
pub mod property;
pub mod registry;
pub mod validator;

pub use descriptor::{AncestryLevel, TypeDescriptor, TypeKind};
pub use property::{
    ALL_VIEW, ID_PROPERTY_NAME, PUBLIC_VIEW, PropertyFlags, PropertyGroup, PropertyKey,
    PropertyType, SearchIndex, UI_VIEW,
};
pub use registry::TypeRegistry;
pub use validator::{LengthValidator, NotNullValidator, PatternValidator, PropertyValidator};
