// ============================================================================
// Type Registry
// ============================================================================
//
// Per-type metadata resolved across superclass and interface ancestry.
//
// Tables are populated during bring-up (scan_all) and are read-mostly
// afterwards. Every table sits behind its own RwLock; concurrent first access
// to the same type is last-write-wins, which converges because population is
// deterministic. Lookups never fail: a poisoned lock is recovered and a miss
// is an empty result or a generic placeholder key.
//
// ============================================================================

use super::naming::{PATH_SEPARATOR, normalize_segment};
use super::{
    ALL_VIEW, AncestryLevel, ID_PROPERTY_NAME, PropertyGroup, PropertyKey, PropertyValidator,
    SearchIndex, TypeDescriptor,
};
use crate::core::{CoreError, RegistryConfig, Result};
use indexmap::IndexSet;
use log::{debug, warn};
use lru::LruCache;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

type TypeName = String;
type KeyTable = HashMap<TypeName, HashMap<String, PropertyKey>>;
type GroupKey = (TypeName, String);

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Registry of property keys, views, validators, searchable sets and groups.
///
/// One instance is built at process bring-up and shared behind an `Arc`.
pub struct TypeRegistry {
    descriptors: RwLock<HashMap<TypeName, TypeDescriptor>>,
    ancestry_cache: RwLock<HashMap<TypeName, Arc<[AncestryLevel]>>>,

    storage_names: RwLock<KeyTable>,
    external_names: RwLock<KeyTable>,
    views: RwLock<HashMap<TypeName, HashMap<String, IndexSet<PropertyKey>>>>,
    searchable: RwLock<HashMap<TypeName, HashMap<SearchIndex, IndexSet<PropertyKey>>>>,

    groups: RwLock<HashMap<GroupKey, PropertyGroup>>,
    group_cache: RwLock<HashMap<GroupKey, Option<PropertyGroup>>>,
    validators: RwLock<HashMap<GroupKey, Vec<Arc<dyn PropertyValidator>>>>,

    interface_cache: RwLock<HashMap<TypeName, Arc<[String]>>>,
    interfaces_by_name: RwLock<HashMap<String, TypeName>>,

    name_cache: RwLock<LruCache<String, String>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl TypeRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        let capacity = NonZeroUsize::new(config.name_cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            descriptors: RwLock::new(HashMap::new()),
            ancestry_cache: RwLock::new(HashMap::new()),
            storage_names: RwLock::new(HashMap::new()),
            external_names: RwLock::new(HashMap::new()),
            views: RwLock::new(HashMap::new()),
            searchable: RwLock::new(HashMap::new()),
            groups: RwLock::new(HashMap::new()),
            group_cache: RwLock::new(HashMap::new()),
            validators: RwLock::new(HashMap::new()),
            interface_cache: RwLock::new(HashMap::new()),
            interfaces_by_name: RwLock::new(HashMap::new()),
            name_cache: RwLock::new(LruCache::new(capacity)),
        }
    }

    // ------------------------------------------------------------------------
    // Type descriptors and ancestry
    // ------------------------------------------------------------------------

    /// Register (or replace) a type descriptor. Does not scan it.
    pub fn register_type(&self, descriptor: TypeDescriptor) {
        let name = descriptor.name().to_string();
        write(&self.descriptors).insert(name, descriptor);
        // Any cached ancestry may run through the replaced type.
        write(&self.ancestry_cache).clear();
        write(&self.interface_cache).clear();
        write(&self.group_cache).clear();
    }

    pub fn descriptor(&self, type_name: &str) -> Option<TypeDescriptor> {
        read(&self.descriptors).get(type_name).cloned()
    }

    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.descriptors).keys().cloned().collect();
        names.sort();
        names
    }

    /// Ordered ancestry of a type, starting with the type itself.
    ///
    /// Unregistered types (or supertypes) appear as a level without
    /// interfaces, and terminate the chain. Superclass cycles are cut at the
    /// first repeated type.
    pub fn ancestry(&self, type_name: &str) -> Arc<[AncestryLevel]> {
        if let Some(cached) = read(&self.ancestry_cache).get(type_name) {
            return cached.clone();
        }

        let levels: Arc<[AncestryLevel]> = {
            let descriptors = read(&self.descriptors);
            let mut levels = Vec::new();
            let mut seen = HashSet::new();
            let mut current = Some(type_name.to_string());

            while let Some(name) = current.take() {
                if !seen.insert(name.clone()) {
                    warn!("Superclass cycle detected at type '{}' (from '{}')", name, type_name);
                    break;
                }
                match descriptors.get(&name) {
                    Some(descriptor) => {
                        current = descriptor.superclass().map(str::to_string);
                        levels.push(AncestryLevel {
                            type_name: name,
                            interfaces: descriptor.interfaces().to_vec(),
                        });
                    }
                    None => levels.push(AncestryLevel {
                        type_name: name,
                        interfaces: Vec::new(),
                    }),
                }
            }
            levels.into()
        };

        write(&self.ancestry_cache).insert(type_name.to_string(), levels.clone());
        levels
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Record a key in the name tables of `type_name` and in its `all` view.
    pub fn register_property(&self, type_name: &str, key: &PropertyKey) {
        write(&self.storage_names)
            .entry(type_name.to_string())
            .or_default()
            .insert(key.storage_name().to_string(), key.clone());
        write(&self.external_names)
            .entry(type_name.to_string())
            .or_default()
            .insert(key.json_name().to_string(), key.clone());
        self.register_property_set(type_name, ALL_VIEW, std::slice::from_ref(key));
    }

    /// Union keys into the named view of a type.
    pub fn register_property_set(&self, type_name: &str, view: &str, keys: &[PropertyKey]) {
        let mut views = write(&self.views);
        let set = views
            .entry(type_name.to_string())
            .or_default()
            .entry(view.to_string())
            .or_default();
        for key in keys {
            set.replace(key.clone());
        }
    }

    pub fn register_searchable_property(&self, type_name: &str, index: SearchIndex, key: &PropertyKey) {
        self.register_searchable_properties(type_name, index, std::slice::from_ref(key));
    }

    pub fn register_searchable_properties(
        &self,
        type_name: &str,
        index: SearchIndex,
        keys: &[PropertyKey],
    ) {
        let mut searchable = write(&self.searchable);
        let set = searchable
            .entry(type_name.to_string())
            .or_default()
            .entry(index)
            .or_default();
        for key in keys {
            set.replace(key.clone());
        }
    }

    pub fn register_property_group(&self, type_name: &str, key: &PropertyKey, group: PropertyGroup) {
        write(&self.groups).insert((type_name.to_string(), key.storage_name().to_string()), group);
        write(&self.group_cache).clear();
    }

    /// Attach a validator to (type, key). Registering the same validator
    /// instance twice is a no-op.
    pub fn register_property_validator(
        &self,
        type_name: &str,
        key: &PropertyKey,
        validator: Arc<dyn PropertyValidator>,
    ) {
        let mut validators = write(&self.validators);
        let list = validators
            .entry((type_name.to_string(), key.storage_name().to_string()))
            .or_default();
        if !list.iter().any(|existing| Arc::ptr_eq(existing, &validator)) {
            list.push(validator);
        }
    }

    fn register_declared_extras(&self, descriptor: &TypeDescriptor) {
        for (key, validator) in descriptor.validators() {
            self.register_property_validator(descriptor.name(), key, validator.clone());
        }
        for (key, group) in descriptor.groups() {
            self.register_property_group(descriptor.name(), key, group.clone());
        }
    }

    fn register_indexes(&self, type_name: &str, key: &PropertyKey) {
        if key.is_indexed() {
            self.register_searchable_property(type_name, SearchIndex::Keyword, key);
        }
        if key.is_fulltext_indexed() {
            self.register_searchable_property(type_name, SearchIndex::Fulltext, key);
        }
    }

    /// Register everything a concrete type inherits, under both the declaring
    /// type and the leaf.
    ///
    /// Returns `false` (after logging) when the type is unknown, not concrete,
    /// or its superclass chain references an unregistered type. The type is
    /// then left without registrations.
    pub fn scan_type(&self, type_name: &str) -> bool {
        match self.try_scan_type(type_name) {
            Ok(scanned) => scanned,
            Err(err) => {
                warn!("Unable to scan type '{}': {}", type_name, err);
                false
            }
        }
    }

    fn try_scan_type(&self, type_name: &str) -> Result<bool> {
        let descriptor = self
            .descriptor(type_name)
            .ok_or_else(|| CoreError::TypeNotFound(type_name.to_string()))?;

        if !descriptor.is_concrete() {
            debug!("Skipping scan of non-concrete type '{}'", type_name);
            return Ok(false);
        }

        let ancestry = self.ancestry(type_name);

        // Root first, so a redeclaration further down wins in the name tables.
        let declaring: Vec<TypeDescriptor> = {
            let descriptors = read(&self.descriptors);
            let mut declaring = Vec::new();
            for level in ancestry.iter().rev() {
                let class = descriptors.get(&level.type_name).ok_or_else(|| {
                    CoreError::ScanFailed(
                        type_name.to_string(),
                        format!("supertype '{}' is not registered", level.type_name),
                    )
                })?;
                declaring.push(class.clone());
                declaring.extend(
                    level
                        .interfaces
                        .iter()
                        .filter_map(|interface| descriptors.get(interface).cloned()),
                );
            }
            declaring
        };

        for ancestor in &declaring {
            self.register_declared_extras(ancestor);
            for key in ancestor.properties() {
                self.register_property(ancestor.name(), key);
                self.register_property(type_name, key);
                self.register_indexes(ancestor.name(), key);
                self.register_indexes(type_name, key);
            }
        }

        for ancestor in &declaring {
            for (view, members) in ancestor.views() {
                let resolved: Vec<PropertyKey> = members
                    .iter()
                    .map(|member| {
                        self.get_property_key_for_storage_name(type_name, member.storage_name(), false)
                            .unwrap_or_else(|| member.clone())
                    })
                    .collect();
                self.register_property_set(ancestor.name(), view, &resolved);
                self.register_property_set(type_name, view, &resolved);
            }
        }

        debug!("Scanned type '{}' ({} ancestor declarations)", type_name, declaring.len());
        Ok(true)
    }

    /// Union every ancestor's searchable sets into the type's own, per index.
    pub fn init_ancestry_searchable_properties(&self, type_name: &str) {
        let ancestry = self.ancestry(type_name);

        for index in SearchIndex::ALL {
            let inherited: Vec<PropertyKey> = {
                let searchable = read(&self.searchable);
                ancestry
                    .iter()
                    .flat_map(|level| level.candidates())
                    .filter_map(|candidate| searchable.get(candidate))
                    .filter_map(|by_index| by_index.get(&index))
                    .flat_map(|set| set.iter().cloned())
                    .collect()
            };

            if !inherited.is_empty() {
                let mut searchable = write(&self.searchable);
                let set = searchable
                    .entry(type_name.to_string())
                    .or_default()
                    .entry(index)
                    .or_default();
                for key in inherited {
                    // Keep the type's own declaration when it shadows an ancestor's.
                    if !set.contains(&key) {
                        set.insert(key);
                    }
                }
            }
        }
    }

    /// Scan every registered type and accumulate searchable sets.
    ///
    /// Returns the number of concrete types that were scanned successfully.
    pub fn scan_all(&self) -> usize {
        let descriptors: Vec<TypeDescriptor> = {
            let mut all: Vec<TypeDescriptor> = read(&self.descriptors).values().cloned().collect();
            all.sort_by(|a, b| a.name().cmp(b.name()));
            all
        };

        let mut scanned = 0;
        for descriptor in &descriptors {
            self.register_declared_extras(descriptor);
            for key in descriptor.properties() {
                self.register_property(descriptor.name(), key);
                self.register_indexes(descriptor.name(), key);
            }
        }

        for descriptor in descriptors.iter().filter(|d| d.is_concrete()) {
            if self.scan_type(descriptor.name()) {
                scanned += 1;
            }
        }

        for descriptor in &descriptors {
            self.get_interfaces_for_type(descriptor.name());
            self.init_ancestry_searchable_properties(descriptor.name());
        }

        debug!("Type scan complete: {}/{} types", scanned, descriptors.len());
        scanned
    }

    /// Drop every derived table and cache. Descriptors are kept.
    pub fn reset(&self) {
        write(&self.ancestry_cache).clear();
        write(&self.storage_names).clear();
        write(&self.external_names).clear();
        write(&self.views).clear();
        write(&self.searchable).clear();
        write(&self.groups).clear();
        write(&self.group_cache).clear();
        write(&self.validators).clear();
        write(&self.interface_cache).clear();
        write(&self.interfaces_by_name).clear();
        write(&self.name_cache).clear();
    }

    pub fn rescan(&self) -> usize {
        self.reset();
        self.scan_all()
    }

    // ------------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------------

    fn lookup_key(
        &self,
        table: &RwLock<KeyTable>,
        type_name: &str,
        name: &str,
        create_generic_if_missing: bool,
    ) -> Option<PropertyKey> {
        if name == ID_PROPERTY_NAME {
            return Some(PropertyKey::id());
        }

        let found = read(table)
            .get(type_name)
            .and_then(|keys| keys.get(name))
            .cloned();

        match found {
            Some(key) => Some(key),
            None if create_generic_if_missing => Some(PropertyKey::generic(name)),
            None => None,
        }
    }

    pub fn get_property_key_for_storage_name(
        &self,
        type_name: &str,
        name: &str,
        create_generic_if_missing: bool,
    ) -> Option<PropertyKey> {
        self.lookup_key(&self.storage_names, type_name, name, create_generic_if_missing)
    }

    pub fn get_property_key_for_external_name(
        &self,
        type_name: &str,
        name: &str,
        create_generic_if_missing: bool,
    ) -> Option<PropertyKey> {
        self.lookup_key(&self.external_names, type_name, name, create_generic_if_missing)
    }

    pub fn get_property_set(&self, type_name: &str, view: &str) -> Vec<PropertyKey> {
        read(&self.views)
            .get(type_name)
            .and_then(|views| views.get(view))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_property_keys(&self, type_name: &str) -> Vec<PropertyKey> {
        self.get_property_set(type_name, ALL_VIEW)
    }

    pub fn get_views(&self, type_name: &str) -> Vec<String> {
        let mut names: Vec<String> = read(&self.views)
            .get(type_name)
            .map(|views| views.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn get_searchable_properties(&self, type_name: &str, index: SearchIndex) -> Vec<PropertyKey> {
        read(&self.searchable)
            .get(type_name)
            .and_then(|by_index| by_index.get(&index))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// First group found walking up the ancestry (class before its
    /// interfaces at each level). Memoized per (type, key), misses included.
    pub fn get_property_group(&self, type_name: &str, key: &PropertyKey) -> Option<PropertyGroup> {
        let cache_key = (type_name.to_string(), key.storage_name().to_string());
        if let Some(cached) = read(&self.group_cache).get(&cache_key) {
            return cached.clone();
        }

        let ancestry = self.ancestry(type_name);
        let found = {
            let groups = read(&self.groups);
            ancestry
                .iter()
                .flat_map(|level| level.candidates())
                .find_map(|candidate| {
                    groups
                        .get(&(candidate.to_string(), key.storage_name().to_string()))
                        .cloned()
                })
        };

        write(&self.group_cache).insert(cache_key, found.clone());
        found
    }

    /// Every validator declared for the key anywhere in the ancestry.
    pub fn get_property_validators(
        &self,
        type_name: &str,
        key: &PropertyKey,
    ) -> Vec<Arc<dyn PropertyValidator>> {
        let ancestry = self.ancestry(type_name);
        let validators = read(&self.validators);
        let mut result: Vec<Arc<dyn PropertyValidator>> = Vec::new();

        for candidate in ancestry.iter().flat_map(|level| level.candidates()) {
            let Some(list) = validators.get(&(candidate.to_string(), key.storage_name().to_string()))
            else {
                continue;
            };
            for validator in list {
                if !result.iter().any(|existing| Arc::ptr_eq(existing, validator)) {
                    result.push(validator.clone());
                }
            }
        }

        result
    }

    /// Run every accumulated validator; all failures are reported together.
    pub fn validate_property(
        &self,
        type_name: &str,
        key: &PropertyKey,
        value: &serde_json::Value,
    ) -> Result<()> {
        if key.is_unvalidated() {
            return Ok(());
        }

        let failures: Vec<String> = self
            .get_property_validators(type_name, key)
            .iter()
            .filter_map(|validator| validator.validate(type_name, key, value).err())
            .map(|err| match err {
                CoreError::ValidationFailed(_, _, message) => message,
                other => other.to_string(),
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CoreError::ValidationFailed(
                type_name.to_string(),
                key.json_name().to_string(),
                failures.join("; "),
            ))
        }
    }

    // ------------------------------------------------------------------------
    // Names and interfaces
    // ------------------------------------------------------------------------

    // Hits only peek under the shared lock, so recency is not refreshed and
    // eviction follows insertion order.
    fn normalize_cached(&self, segment: &str) -> String {
        if let Some(normalized) = read(&self.name_cache).peek(segment) {
            return normalized.clone();
        }
        let normalized = normalize_segment(segment);
        write(&self.name_cache).put(segment.to_string(), normalized.clone());
        normalized
    }

    /// "folders" -> "Folder", "categories" -> "Category", "a/bs" -> "A/B".
    pub fn normalize_entity_name(&self, name: &str) -> String {
        if name == "/" {
            return name.to_string();
        }

        if name.contains(PATH_SEPARATOR) {
            return name
                .split(PATH_SEPARATOR)
                .map(|segment| {
                    if segment.is_empty() {
                        String::new()
                    } else {
                        self.normalize_cached(segment)
                    }
                })
                .collect::<Vec<_>>()
                .join("/");
        }

        self.normalize_cached(name)
    }

    /// Directly declared interfaces of a type. Also records each interface
    /// in the reverse lookup used by [`TypeRegistry::entity_type_for_raw_name`].
    pub fn get_interfaces_for_type(&self, type_name: &str) -> Arc<[String]> {
        if let Some(cached) = read(&self.interface_cache).get(type_name) {
            return cached.clone();
        }

        let interfaces: Arc<[String]> = read(&self.descriptors)
            .get(type_name)
            .map(|descriptor| descriptor.interfaces().to_vec())
            .unwrap_or_default()
            .into();

        {
            let mut by_name = write(&self.interfaces_by_name);
            for interface in interfaces.iter() {
                by_name.insert(interface.to_lowercase(), interface.clone());
            }
        }

        write(&self.interface_cache).insert(type_name.to_string(), interfaces.clone());
        interfaces
    }

    /// Resolve an external raw name ("folders", "linkables") to a registered
    /// entity type or a known interface.
    pub fn entity_type_for_raw_name(&self, raw_name: &str) -> Option<String> {
        let normalized = self.normalize_entity_name(raw_name);

        if let Some(descriptor) = read(&self.descriptors).get(&normalized) {
            if !descriptor.is_interface() {
                return Some(normalized);
            }
        }

        read(&self.interfaces_by_name)
            .get(&normalized.to_lowercase())
            .cloned()
    }
}
