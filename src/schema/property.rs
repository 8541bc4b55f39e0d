use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Reserved storage/external name of the canonical identifier.
pub const ID_PROPERTY_NAME: &str = "id";

/// View holding every property registered for a type.
pub const ALL_VIEW: &str = "all";
pub const PUBLIC_VIEW: &str = "public";
pub const UI_VIEW: &str = "ui";

lazy_static! {
    static ref ID_KEY: PropertyKey = PropertyKey::new(ID_PROPERTY_NAME, PropertyType::String)
        .system()
        .read_only()
        .write_once()
        .indexed();
}

/// Value type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Json,
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyType::String => write!(f, "String"),
            PropertyType::Integer => write!(f, "Integer"),
            PropertyType::Float => write!(f, "Float"),
            PropertyType::Boolean => write!(f, "Boolean"),
            PropertyType::Date => write!(f, "Date"),
            PropertyType::Json => write!(f, "Json"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyFlags {
    pub system: bool,
    pub read_only: bool,
    pub write_once: bool,
    pub unvalidated: bool,
    pub indexed: bool,
    pub fulltext_indexed: bool,
}

/// Identifier plus flags for one attribute of an entity type.
///
/// Two keys denote the same attribute when their storage names match, so a
/// subtype redeclaring `name` replaces the inherited key inside views and
/// searchable sets instead of duplicating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyKey {
    storage_name: String,
    external_name: String,
    declaring_type: Option<String>,
    value_type: PropertyType,
    flags: PropertyFlags,
    generic: bool,
}

impl PropertyKey {
    /// Create a key whose storage and external names are identical.
    pub fn new(name: impl Into<String>, value_type: PropertyType) -> Self {
        let name = name.into();
        Self {
            external_name: name.clone(),
            storage_name: name,
            declaring_type: None,
            value_type,
            flags: PropertyFlags::default(),
            generic: false,
        }
    }

    /// The canonical identifier key.
    pub fn id() -> PropertyKey {
        ID_KEY.clone()
    }

    /// Placeholder carrying only a name, used for unknown attributes.
    pub fn generic(name: impl Into<String>) -> Self {
        let mut key = Self::new(name, PropertyType::String);
        key.generic = true;
        key
    }

    /// Use a different wire-facing name
    pub fn external_name(mut self, name: impl Into<String>) -> Self {
        self.external_name = name.into();
        self
    }

    pub fn system(mut self) -> Self {
        self.flags.system = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.flags.read_only = true;
        self
    }

    pub fn write_once(mut self) -> Self {
        self.flags.write_once = true;
        self
    }

    pub fn unvalidated(mut self) -> Self {
        self.flags.unvalidated = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.flags.indexed = true;
        self
    }

    pub fn fulltext_indexed(mut self) -> Self {
        self.flags.fulltext_indexed = true;
        self
    }

    pub(crate) fn declared_by(mut self, type_name: &str) -> Self {
        self.declaring_type = Some(type_name.to_string());
        self
    }

    pub fn storage_name(&self) -> &str {
        &self.storage_name
    }

    pub fn json_name(&self) -> &str {
        &self.external_name
    }

    pub fn declaring_type(&self) -> Option<&str> {
        self.declaring_type.as_deref()
    }

    pub fn value_type(&self) -> PropertyType {
        self.value_type
    }

    pub fn flags(&self) -> PropertyFlags {
        self.flags
    }

    pub fn is_system(&self) -> bool {
        self.flags.system
    }

    pub fn is_read_only(&self) -> bool {
        self.flags.read_only
    }

    pub fn is_write_once(&self) -> bool {
        self.flags.write_once
    }

    pub fn is_unvalidated(&self) -> bool {
        self.flags.unvalidated
    }

    pub fn is_indexed(&self) -> bool {
        self.flags.indexed
    }

    pub fn is_fulltext_indexed(&self) -> bool {
        self.flags.fulltext_indexed
    }

    /// True for placeholders fabricated by a lookup miss.
    pub fn is_generic(&self) -> bool {
        self.generic
    }
}

impl PartialEq for PropertyKey {
    fn eq(&self, other: &Self) -> bool {
        self.storage_name == other.storage_name
    }
}

impl Eq for PropertyKey {}

impl Hash for PropertyKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.storage_name.hash(state);
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.storage_name)
    }
}

/// Named index a property can participate in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchIndex {
    Keyword,
    Fulltext,
}

impl SearchIndex {
    pub const ALL: [SearchIndex; 2] = [SearchIndex::Keyword, SearchIndex::Fulltext];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchIndex::Keyword => "keyword",
            SearchIndex::Fulltext => "fulltext",
        }
    }
}

impl fmt::Display for SearchIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synthetic aggregate of several keys exposed as one settable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyGroup {
    name: String,
    members: Vec<PropertyKey>,
}

impl PropertyGroup {
    pub fn new(name: impl Into<String>, members: Vec<PropertyKey>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[PropertyKey] {
        &self.members
    }
}
