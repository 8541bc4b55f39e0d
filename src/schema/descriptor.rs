use super::{PropertyGroup, PropertyKey, PropertyValidator};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Concrete,
    Abstract,
    Interface,
}

/// Static description of one entity type, registered once at definition time.
///
/// Properties added through [`TypeDescriptor::property`] are stamped with this
/// type as their declaring type. Views may reference keys declared by any
/// ancestor.
#[derive(Clone)]
pub struct TypeDescriptor {
    name: String,
    kind: TypeKind,
    superclass: Option<String>,
    interfaces: Vec<String>,
    properties: Vec<PropertyKey>,
    views: Vec<(String, Vec<PropertyKey>)>,
    validators: Vec<(PropertyKey, Arc<dyn PropertyValidator>)>,
    groups: Vec<(PropertyKey, PropertyGroup)>,
}

impl TypeDescriptor {
    fn with_kind(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            superclass: None,
            interfaces: Vec::new(),
            properties: Vec::new(),
            views: Vec::new(),
            validators: Vec::new(),
            groups: Vec::new(),
        }
    }

    pub fn concrete(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Concrete)
    }

    pub fn abstract_type(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Abstract)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Interface)
    }

    pub fn extends(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn property(mut self, key: PropertyKey) -> Self {
        self.properties.push(key.declared_by(&self.name));
        self
    }

    /// Declare (or extend) a named view.
    pub fn view(mut self, view_name: impl Into<String>, keys: &[&PropertyKey]) -> Self {
        let view_name = view_name.into();
        let keys = keys.iter().map(|key| (*key).clone());
        match self.views.iter_mut().find(|(name, _)| *name == view_name) {
            Some((_, existing)) => existing.extend(keys),
            None => self.views.push((view_name, keys.collect())),
        }
        self
    }

    pub fn validator(mut self, key: &PropertyKey, validator: Arc<dyn PropertyValidator>) -> Self {
        self.validators.push((key.clone(), validator));
        self
    }

    pub fn group(mut self, key: &PropertyKey, group: PropertyGroup) -> Self {
        self.groups.push((key.clone(), group));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn is_concrete(&self) -> bool {
        self.kind == TypeKind::Concrete
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn superclass(&self) -> Option<&str> {
        self.superclass.as_deref()
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn properties(&self) -> &[PropertyKey] {
        &self.properties
    }

    pub fn views(&self) -> &[(String, Vec<PropertyKey>)] {
        &self.views
    }

    pub fn validators(&self) -> &[(PropertyKey, Arc<dyn PropertyValidator>)] {
        &self.validators
    }

    pub fn groups(&self) -> &[(PropertyKey, PropertyGroup)] {
        &self.groups
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("superclass", &self.superclass)
            .field("interfaces", &self.interfaces)
            .field("properties", &self.properties)
            .field("views", &self.views)
            .field("validators", &self.validators.len())
            .field("groups", &self.groups)
            .finish()
    }
}

/// One step of a precomputed ancestry: a class and the interfaces it declares directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestryLevel {
    pub type_name: String,
    pub interfaces: Vec<String>,
}

impl AncestryLevel {
    /// Class first, then its interfaces.
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.type_name.as_str()).chain(self.interfaces.iter().map(String::as_str))
    }
}
