//! Preheat cache.
//!
//! A per-call lookup structure bridging two states:
//! - "already stored": objects loaded from durable storage before validation
//! - "seen earlier in this batch": scratch maps filled while checks run
//!
//! The stored-object maps are read-only once built. The scratch maps are
//! created lazily per type; every accessor creates the map if it is absent,
//! so no check needs to assume one exists.
//!
//! Objects added to a batch are registered as placeholders: references to
//! them resolve even though they are not stored yet, while `exists` and
//! `get` keep answering for storage only.
//!
//! Uniqueness scratch maps are seeded from the stored objects by
//! `PreheatBuilder::build` before any incoming object is checked against
//! them, which lets two colliding objects introduced by the same batch be
//! caught even though neither exists in storage yet.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::schema::SchemaIntrospector;
use crate::model::{Identity, MetadataObject, ObjectRef, TypeName, ValueType};

/// A stored object shared between the uid and code indexes.
pub type StoredObject = Arc<dyn MetadataObject>;

/// Property name -> value -> owning identifier.
pub type UniqueValueMap = BTreeMap<String, BTreeMap<String, String>>;

/// Which identifier keys stored-object lookups and scratch-map owners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PreheatIdentifier {
    #[default]
    Uid,
    Code,
}

impl PreheatIdentifier {
    pub fn identifier<'a>(&self, identity: &'a Identity) -> Option<&'a str> {
        match self {
            Self::Uid => identity.uid.as_deref(),
            Self::Code => identity.code.as_deref(),
        }
    }

    /// Human-oriented rendering used as a report argument, e.g. `ANC visit [fbfJHSPpUQD]`.
    pub fn identifiers_with_name(&self, identity: &Identity) -> String {
        let id = self.identifier(identity).unwrap_or("null");
        match identity.name.as_deref() {
            Some(name) => format!("{name} [{id}]"),
            None => format!("[{id}]"),
        }
    }
}

/// One member of a composite-key group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKeyMember {
    pub index: usize,
    pub uid: Option<String>,
}

/// (key position in the schema, tuple of values) -> members carrying it.
pub type UniqueKeyGroups = BTreeMap<(usize, Vec<Option<String>>), Vec<UniqueKeyMember>>;

/// Lookup and scratch cache for one validation call.
#[derive(Debug, Default)]
pub struct Preheat {
    identifier: PreheatIdentifier,
    stored: BTreeMap<PreheatIdentifier, BTreeMap<TypeName, BTreeMap<String, StoredObject>>>,
    defaults: BTreeMap<TypeName, StoredObject>,
    placeholders: BTreeMap<PreheatIdentifier, BTreeMap<TypeName, BTreeSet<String>>>,

    unique_values: BTreeMap<TypeName, UniqueValueMap>,
    unique_key_groups: BTreeMap<TypeName, UniqueKeyGroups>,
    unique_attribute_values: BTreeMap<TypeName, UniqueValueMap>,

    mandatory_attributes: BTreeMap<TypeName, BTreeSet<String>>,
    unique_attributes: BTreeMap<TypeName, BTreeSet<String>>,
    attribute_types: BTreeMap<TypeName, BTreeMap<String, ValueType>>,
}

impl Preheat {
    /// An empty cache (nothing stored, no configured attributes).
    pub fn new(identifier: PreheatIdentifier) -> Self {
        Self {
            identifier,
            ..Self::default()
        }
    }

    pub fn builder(identifier: PreheatIdentifier) -> PreheatBuilder {
        PreheatBuilder::new(identifier)
    }

    /// Identifier scheme this cache was built for.
    pub fn identifier(&self) -> PreheatIdentifier {
        self.identifier
    }

    /// Look up the stored counterpart of an object.
    pub fn get(&self, scheme: PreheatIdentifier, object: &dyn MetadataObject) -> Option<&StoredObject> {
        self.lookup(scheme, &object.type_name(), object.identity())
    }

    /// Resolve a reference carried by an incoming object.
    pub fn resolve(&self, scheme: PreheatIdentifier, reference: &ObjectRef) -> Option<&StoredObject> {
        self.lookup(scheme, &reference.type_name, &reference.identity)
    }

    /// Whether a reference points at a stored object, a default, or an
    /// object of the current batch.
    pub fn is_resolvable(&self, scheme: PreheatIdentifier, reference: &ObjectRef) -> bool {
        self.resolve(scheme, reference).is_some()
            || self.is_default_ref(reference)
            || self.is_placeholder(scheme, &reference.type_name, &reference.identity)
    }

    /// Register an object that will be written by the current batch.
    pub fn add_placeholder(&mut self, object: &dyn MetadataObject) {
        let type_name = object.type_name();
        for scheme in [PreheatIdentifier::Uid, PreheatIdentifier::Code] {
            if let Some(key) = scheme.identifier(object.identity()) {
                self.placeholders
                    .entry(scheme)
                    .or_default()
                    .entry(type_name.clone())
                    .or_default()
                    .insert(key.to_string());
            }
        }
    }

    pub fn is_placeholder(&self, scheme: PreheatIdentifier, type_name: &TypeName, identity: &Identity) -> bool {
        scheme
            .identifier(identity)
            .and_then(|key| Some(self.placeholders.get(&scheme)?.get(type_name)?.contains(key)))
            .unwrap_or(false)
    }

    pub fn lookup(
        &self,
        scheme: PreheatIdentifier,
        type_name: &TypeName,
        identity: &Identity,
    ) -> Option<&StoredObject> {
        let key = scheme.identifier(identity)?;
        self.stored.get(&scheme)?.get(type_name)?.get(key)
    }

    pub fn exists(&self, scheme: PreheatIdentifier, object: &dyn MetadataObject) -> bool {
        self.get(scheme, object).is_some()
    }

    /// Stored objects of one type under one scheme, in identifier order.
    pub fn stored_objects(
        &self,
        scheme: PreheatIdentifier,
        type_name: &TypeName,
    ) -> impl Iterator<Item = &StoredObject> {
        self.stored
            .get(&scheme)
            .and_then(|m| m.get(type_name))
            .into_iter()
            .flat_map(|m| m.values())
    }

    pub fn default_for(&self, type_name: &TypeName) -> Option<&StoredObject> {
        self.defaults.get(type_name)
    }

    /// Whether `object` is the system default of its type, matched by uid.
    pub fn is_default(&self, object: &dyn MetadataObject) -> bool {
        self.is_default_identity(&object.type_name(), object.identity())
    }

    pub fn is_default_ref(&self, reference: &ObjectRef) -> bool {
        self.is_default_identity(&reference.type_name, &reference.identity)
    }

    fn is_default_identity(&self, type_name: &TypeName, identity: &Identity) -> bool {
        let Some(default) = self.defaults.get(type_name) else {
            return false;
        };
        identity.uid.is_some() && identity.uid.as_deref() == default.uid()
    }

    /// Single-property uniqueness map for a type.
    pub fn unique_values_mut(&mut self, type_name: &TypeName) -> &mut UniqueValueMap {
        self.unique_values.entry(type_name.clone()).or_default()
    }

    /// Current owner of a unique value, without creating any map.
    pub fn peek_unique_value_owner(&self, type_name: &TypeName, property: &str, value: &str) -> Option<&str> {
        self.unique_values
            .get(type_name)?
            .get(property)?
            .get(value)
            .map(String::as_str)
    }

    /// Owner of `value` for `property`, creating the maps if absent.
    pub fn unique_value_owner(&mut self, type_name: &TypeName, property: &str, value: &str) -> Option<&String> {
        self.unique_values_mut(type_name)
            .entry(property.to_string())
            .or_default()
            .get(value)
    }

    pub fn set_unique_value_owner(&mut self, type_name: &TypeName, property: &str, value: &str, owner: &str) {
        self.unique_values_mut(type_name)
            .entry(property.to_string())
            .or_default()
            .insert(value.to_string(), owner.to_string());
    }

    /// Composite-key groups for a type, emptied before returning.
    pub fn reset_unique_key_groups(&mut self, type_name: &TypeName) -> &mut UniqueKeyGroups {
        let groups = self.unique_key_groups.entry(type_name.clone()).or_default();
        groups.clear();
        groups
    }

    pub fn unique_key_groups(&self, type_name: &TypeName) -> Option<&UniqueKeyGroups> {
        self.unique_key_groups.get(type_name)
    }

    /// Attribute-value uniqueness map for a type: attribute id -> value -> owner uid.
    pub fn unique_attribute_values_mut(&mut self, type_name: &TypeName) -> &mut UniqueValueMap {
        self.unique_attribute_values.entry(type_name.clone()).or_default()
    }

    pub fn unique_attribute_owner(&mut self, type_name: &TypeName, attribute: &str, value: &str) -> Option<&String> {
        self.unique_attribute_values_mut(type_name)
            .entry(attribute.to_string())
            .or_default()
            .get(value)
    }

    pub fn set_unique_attribute_owner(&mut self, type_name: &TypeName, attribute: &str, value: &str, owner: &str) {
        self.unique_attribute_values_mut(type_name)
            .entry(attribute.to_string())
            .or_default()
            .insert(value.to_string(), owner.to_string());
    }

    pub fn mandatory_attributes(&self, type_name: &TypeName) -> Option<&BTreeSet<String>> {
        self.mandatory_attributes.get(type_name).filter(|s| !s.is_empty())
    }

    pub fn unique_attributes(&self, type_name: &TypeName) -> Option<&BTreeSet<String>> {
        self.unique_attributes.get(type_name).filter(|s| !s.is_empty())
    }

    /// Attribute id -> declared value type, for attributes assigned to the type.
    pub fn attribute_types(&self, type_name: &TypeName) -> Option<&BTreeMap<String, ValueType>> {
        self.attribute_types.get(type_name)
    }

    fn insert_stored(&mut self, object: StoredObject) {
        let type_name = object.type_name();
        for scheme in [PreheatIdentifier::Uid, PreheatIdentifier::Code] {
            if let Some(key) = scheme.identifier(object.identity()) {
                self.stored
                    .entry(scheme)
                    .or_default()
                    .entry(type_name.clone())
                    .or_default()
                    .insert(key.to_string(), Arc::clone(&object));
            }
        }
    }

    fn seed_unique_values(&mut self, object: &dyn MetadataObject, schemas: &dyn SchemaIntrospector) {
        let Some(owner) = self.identifier.identifier(object.identity()).map(str::to_string) else {
            return;
        };
        let type_name = object.type_name();

        if let Some(schema) = schemas.schema_for(&type_name) {
            for property in schema.unique_properties() {
                if let Some(value) = property.value(object) {
                    self.set_unique_value_owner(&type_name, &property.name, &value, &owner);
                }
            }
        }

        if let Some(embedded) = object.embedded() {
            self.seed_unique_values(embedded, schemas);
        }
    }

    fn seed_unique_attributes(&mut self, object: &dyn MetadataObject) {
        let type_name = object.type_name();
        let (Some(uid), Some(unique)) = (object.uid(), self.unique_attributes.get(&type_name)) else {
            return;
        };
        let seeds: Vec<(String, String)> = object
            .attribute_values()
            .iter()
            .filter(|av| unique.contains(&av.attribute))
            .map(|av| (av.attribute.clone(), av.value.clone()))
            .collect();
        let uid = uid.to_string();
        for (attribute, value) in seeds {
            self.set_unique_attribute_owner(&type_name, &attribute, &value, &uid);
        }
    }
}

/// Builds a `Preheat` from stored objects and attribute configuration.
#[derive(Debug, Default)]
pub struct PreheatBuilder {
    identifier: PreheatIdentifier,
    stored: Vec<StoredObject>,
    defaults: Vec<StoredObject>,
    mandatory_attributes: BTreeMap<TypeName, BTreeSet<String>>,
    unique_attributes: BTreeMap<TypeName, BTreeSet<String>>,
    attribute_types: BTreeMap<TypeName, BTreeMap<String, ValueType>>,
}

impl PreheatBuilder {
    pub fn new(identifier: PreheatIdentifier) -> Self {
        Self {
            identifier,
            ..Self::default()
        }
    }

    /// Add an object loaded from storage.
    pub fn stored<T: MetadataObject>(self, object: T) -> Self {
        self.stored_shared(Arc::new(object))
    }

    pub fn stored_shared(mut self, object: StoredObject) -> Self {
        self.stored.push(object);
        self
    }

    /// Add the system default object of its type.
    pub fn default_object<T: MetadataObject>(mut self, object: T) -> Self {
        self.defaults.push(Arc::new(object));
        self
    }

    pub fn mandatory_attribute(mut self, type_name: impl Into<TypeName>, attribute: impl Into<String>) -> Self {
        self.mandatory_attributes
            .entry(type_name.into())
            .or_default()
            .insert(attribute.into());
        self
    }

    pub fn unique_attribute(mut self, type_name: impl Into<TypeName>, attribute: impl Into<String>) -> Self {
        self.unique_attributes
            .entry(type_name.into())
            .or_default()
            .insert(attribute.into());
        self
    }

    /// Assign an attribute to a type with its declared value type.
    pub fn attribute_type(
        mut self,
        type_name: impl Into<TypeName>,
        attribute: impl Into<String>,
        value_type: ValueType,
    ) -> Self {
        self.attribute_types
            .entry(type_name.into())
            .or_default()
            .insert(attribute.into(), value_type);
        self
    }

    /// Index stored objects and seed the uniqueness scratch maps.
    pub fn build(self, schemas: &dyn SchemaIntrospector) -> Preheat {
        let mut preheat = Preheat::new(self.identifier);
        preheat.mandatory_attributes = self.mandatory_attributes;
        preheat.unique_attributes = self.unique_attributes;
        preheat.attribute_types = self.attribute_types;

        for default in self.defaults {
            preheat.insert_stored(Arc::clone(&default));
            preheat.defaults.insert(default.type_name(), default);
        }

        for object in &self.stored {
            preheat.insert_stored(Arc::clone(object));
            preheat.seed_unique_values(object.as_ref(), schemas);
            preheat.seed_unique_attributes(object.as_ref());
        }

        tracing::debug!(
            identifier = ?preheat.identifier,
            stored = self.stored.len(),
            defaults = preheat.defaults.len(),
            "preheat built"
        );

        preheat
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use crate::model::schema::{Property, Schema, SchemaRegistry};
    use crate::model::AttributeValue;

    #[derive(Debug, Clone, Default)]
    struct Indicator {
        identity: Identity,
        short_name: Option<String>,
        attribute_values: Vec<AttributeValue>,
    }

    impl MetadataObject for Indicator {
        fn type_name(&self) -> TypeName {
            TypeName::new("Indicator")
        }
        fn identity(&self) -> &Identity {
            &self.identity
        }
        fn attribute_values(&self) -> &[AttributeValue] {
            &self.attribute_values
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn schemas() -> SchemaRegistry {
        let mut reg = SchemaRegistry::new();
        reg.register(
            Schema::new("Indicator")
                .with_property(Property::simple("shortName", |i: &Indicator| i.short_name.clone()).unique()),
        )
        .unwrap();
        reg
    }

    fn indicator(uid: &str, code: &str, short_name: &str) -> Indicator {
        Indicator {
            identity: Identity::with_uid(uid).code(code).name(short_name),
            short_name: Some(short_name.to_string()),
            attribute_values: Vec::new(),
        }
    }

    #[test]
    fn lookups_by_uid_and_code() {
        let p = Preheat::builder(PreheatIdentifier::Uid)
            .stored(indicator("Uvn6LCg7dVU", "ANC1", "ANC 1"))
            .build(&schemas());

        let incoming = indicator("Uvn6LCg7dVU", "other", "x");
        assert!(p.exists(PreheatIdentifier::Uid, &incoming));
        assert!(!p.exists(PreheatIdentifier::Code, &incoming));

        let by_code = ObjectRef::new("Indicator", Identity::default().code("ANC1"));
        assert!(p.resolve(PreheatIdentifier::Code, &by_code).is_some());
    }

    #[test]
    fn unique_values_are_seeded_from_storage() {
        let mut p = Preheat::builder(PreheatIdentifier::Uid)
            .stored(indicator("Uvn6LCg7dVU", "ANC1", "ANC 1"))
            .build(&schemas());

        let ty = TypeName::new("Indicator");
        assert_eq!(
            p.unique_value_owner(&ty, "shortName", "ANC 1").map(String::as_str),
            Some("Uvn6LCg7dVU")
        );
        assert!(p.unique_value_owner(&ty, "shortName", "ANC 2").is_none());
    }

    #[test]
    fn unique_attributes_are_seeded_only_when_configured() {
        let mut stored = indicator("Uvn6LCg7dVU", "ANC1", "ANC 1");
        stored.attribute_values = vec![
            AttributeValue::new("attrUnique1", "X-1"),
            AttributeValue::new("attrPlain01", "Y-1"),
        ];
        let mut p = Preheat::builder(PreheatIdentifier::Uid)
            .unique_attribute("Indicator", "attrUnique1")
            .stored(stored)
            .build(&schemas());

        let ty = TypeName::new("Indicator");
        assert!(p.unique_attribute_owner(&ty, "attrUnique1", "X-1").is_some());
        assert!(p.unique_attribute_owner(&ty, "attrPlain01", "Y-1").is_none());
    }

    #[test]
    fn default_objects_match_by_uid_only() {
        let mut default = indicator("xYerKDKCefk", "default", "default");
        default.short_name = None;
        let p = Preheat::builder(PreheatIdentifier::Uid)
            .default_object(default)
            .build(&schemas());

        let by_uid = ObjectRef::uid("Indicator", "xYerKDKCefk");
        assert!(p.is_default_ref(&by_uid));

        let by_name = indicator("aaaaaaaaaaa", "c", "default");
        assert!(!p.is_default(&by_name));
        assert!(p.is_default(&indicator("xYerKDKCefk", "other", "Renamed")));

        let other = indicator("bbbbbbbbbbb", "c", "Other");
        assert!(!p.is_default(&other));
        assert!(p.resolve(PreheatIdentifier::Uid, &by_uid).is_some());
    }

    #[test]
    fn placeholders_resolve_but_do_not_exist() {
        let mut p = Preheat::builder(PreheatIdentifier::Uid).build(&schemas());
        let fresh = indicator("newIndic001", "NEW1", "New");
        p.add_placeholder(&fresh);

        assert!(!p.exists(PreheatIdentifier::Uid, &fresh));
        assert!(p.resolve(PreheatIdentifier::Uid, &ObjectRef::uid("Indicator", "newIndic001")).is_none());
        assert!(p.is_resolvable(PreheatIdentifier::Uid, &ObjectRef::uid("Indicator", "newIndic001")));
        assert!(p.is_resolvable(
            PreheatIdentifier::Code,
            &ObjectRef::new("Indicator", Identity::default().code("NEW1"))
        ));
        assert!(!p.is_resolvable(PreheatIdentifier::Uid, &ObjectRef::uid("DataSet", "newIndic001")));
    }

    #[test]
    fn composite_groups_reset_on_each_call() {
        let mut p = Preheat::new(PreheatIdentifier::Uid);
        let ty = TypeName::new("Indicator");
        p.reset_unique_key_groups(&ty)
            .entry((0, vec![Some("a".into())]))
            .or_default()
            .push(UniqueKeyMember { index: 0, uid: None });
        assert_eq!(p.unique_key_groups(&ty).map(|g| g.len()), Some(1));
        assert!(p.reset_unique_key_groups(&ty).is_empty());
    }
}
