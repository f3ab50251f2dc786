//! Per-type descriptor tables.
//!
//! A `Schema` lists the properties of one metadata type together with typed
//! accessor closures. Tables are built once when the host starts and then
//! shared by every validation call, so checks can walk "all unique
//! properties" or "all owned references" of any type without knowing the
//! concrete Rust type behind a `dyn MetadataObject`.
//!
//! ```ignore
//! let schema = Schema::new("DataElement")
//!     .with_property(Property::simple("code", |de: &DataElement| de.identity.code.clone()).unique())
//!     .with_property(Property::reference("categoryCombo", "CategoryCombo", |de: &DataElement| de.category_combo.clone()))
//!     .translatable(true);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::errors::{MetagateError, MetagateResult};
use crate::model::{downcast_mut, downcast_ref, MetadataObject, ObjectRef, TypeName};

/// Name of the intrinsic attribute-value collection property.
pub const ATTRIBUTE_VALUES: &str = "attributeValues";
/// Name of the intrinsic user-group sharing property.
pub const USER_GROUP_ACCESSES: &str = "userGroupAccesses";
/// Name of the intrinsic user sharing property.
pub const USER_ACCESSES: &str = "userAccesses";
/// Name of the intrinsic translations property.
pub const TRANSLATIONS: &str = "translations";

pub type ScalarGetter = Arc<dyn Fn(&dyn MetadataObject) -> Option<String> + Send + Sync>;
pub type ReferenceGetter = Arc<dyn Fn(&dyn MetadataObject) -> Option<ObjectRef> + Send + Sync>;
pub type CollectionGetter = Arc<dyn Fn(&dyn MetadataObject) -> Vec<ObjectRef> + Send + Sync>;
pub type CollectionSetter = Arc<dyn Fn(&mut dyn MetadataObject, Vec<ObjectRef>) -> bool + Send + Sync>;

/// How a property value is reached.
#[derive(Clone)]
pub enum Accessor {
    /// A scalar value rendered as text.
    Simple(ScalarGetter),
    /// A single reference to another object.
    Reference(ReferenceGetter),
    /// A collection of references, rewritable in place.
    Collection {
        get: CollectionGetter,
        set: CollectionSetter,
    },
    /// Served by `MetadataObject` itself (attribute values, sharing, translations).
    Intrinsic,
}

/// What a reference property points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// A standalone, identifiable object resolved through the preheat.
    Identifiable,
    /// An object embedded in its owner; never resolved.
    Embedded,
}

/// One property in a descriptor table.
#[derive(Clone)]
pub struct Property {
    pub name: String,
    pub persisted: bool,
    pub owner: bool,
    pub writable: bool,
    pub unique: bool,
    pub reference_kind: Option<ReferenceKind>,
    pub target_type: Option<TypeName>,
    accessor: Accessor,
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("persisted", &self.persisted)
            .field("owner", &self.owner)
            .field("writable", &self.writable)
            .field("unique", &self.unique)
            .field("simple", &self.is_simple())
            .field("collection", &self.is_collection())
            .field("reference_kind", &self.reference_kind)
            .field("target_type", &self.target_type)
            .finish()
    }
}

impl Property {
    fn with_accessor(name: impl Into<String>, accessor: Accessor) -> Self {
        Self {
            name: name.into(),
            persisted: true,
            owner: true,
            writable: true,
            unique: false,
            reference_kind: None,
            target_type: None,
            accessor,
        }
    }

    /// A scalar property read through `get`.
    pub fn simple<T, F>(name: impl Into<String>, get: F) -> Self
    where
        T: MetadataObject,
        F: Fn(&T) -> Option<String> + Send + Sync + 'static,
    {
        let getter: ScalarGetter =
            Arc::new(move |o: &dyn MetadataObject| downcast_ref::<T>(o).and_then(|t| get(t)));
        Self::with_accessor(name, Accessor::Simple(getter))
    }

    /// A single reference to an object of `target`.
    pub fn reference<T, F>(name: impl Into<String>, target: impl Into<TypeName>, get: F) -> Self
    where
        T: MetadataObject,
        F: Fn(&T) -> Option<ObjectRef> + Send + Sync + 'static,
    {
        let getter: ReferenceGetter =
            Arc::new(move |o: &dyn MetadataObject| downcast_ref::<T>(o).and_then(|t| get(t)));
        let mut p = Self::with_accessor(name, Accessor::Reference(getter));
        p.reference_kind = Some(ReferenceKind::Identifiable);
        p.target_type = Some(target.into());
        p
    }

    /// A collection of references to objects of `target`.
    pub fn collection<T, G, S>(
        name: impl Into<String>,
        target: impl Into<TypeName>,
        get: G,
        set: S,
    ) -> Self
    where
        T: MetadataObject,
        G: Fn(&T) -> Vec<ObjectRef> + Send + Sync + 'static,
        S: Fn(&mut T, Vec<ObjectRef>) + Send + Sync + 'static,
    {
        let getter: CollectionGetter = Arc::new(move |o: &dyn MetadataObject| {
            downcast_ref::<T>(o).map(|t| get(t)).unwrap_or_default()
        });
        let setter: CollectionSetter =
            Arc::new(move |o: &mut dyn MetadataObject, refs: Vec<ObjectRef>| {
                match downcast_mut::<T>(o) {
                    Some(t) => {
                        set(t, refs);
                        true
                    }
                    None => false,
                }
            });
        let mut p = Self::with_accessor(
            name,
            Accessor::Collection {
                get: getter,
                set: setter,
            },
        );
        p.reference_kind = Some(ReferenceKind::Identifiable);
        p.target_type = Some(target.into());
        p
    }

    /// A property served by the `MetadataObject` trait itself.
    pub fn intrinsic(name: impl Into<String>) -> Self {
        Self::with_accessor(name, Accessor::Intrinsic)
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Mark as the inverse (non-owning) side of a bidirectional relation.
    pub fn not_owner(mut self) -> Self {
        self.owner = false;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn transient(mut self) -> Self {
        self.persisted = false;
        self
    }

    /// Mark the reference target as embedded in its owner.
    pub fn embedded(mut self) -> Self {
        if self.reference_kind.is_some() {
            self.reference_kind = Some(ReferenceKind::Embedded);
        }
        self
    }

    pub fn is_simple(&self) -> bool {
        matches!(self.accessor, Accessor::Simple(_))
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.accessor, Accessor::Collection { .. })
    }

    /// True for scalar or collection references to identifiable objects.
    pub fn is_identifiable_reference(&self) -> bool {
        self.reference_kind == Some(ReferenceKind::Identifiable)
    }

    pub fn is_reference(&self) -> bool {
        self.reference_kind.is_some()
    }

    /// Scalar value, `None` for non-scalar properties or unset values.
    pub fn value(&self, object: &dyn MetadataObject) -> Option<String> {
        match &self.accessor {
            Accessor::Simple(get) => get(object),
            _ => None,
        }
    }

    /// Single reference value, `None` for other property shapes.
    pub fn reference_value(&self, object: &dyn MetadataObject) -> Option<ObjectRef> {
        match &self.accessor {
            Accessor::Reference(get) => get(object),
            _ => None,
        }
    }

    /// Collection members, empty for other property shapes.
    pub fn references(&self, object: &dyn MetadataObject) -> Vec<ObjectRef> {
        match &self.accessor {
            Accessor::Collection { get, .. } => get(object),
            _ => Vec::new(),
        }
    }

    /// Replace a collection in place. Returns false if the property is not a
    /// collection or the object is of another type.
    pub fn set_references(&self, object: &mut dyn MetadataObject, refs: Vec<ObjectRef>) -> bool {
        match &self.accessor {
            Accessor::Collection { set, .. } => set(object, refs),
            _ => false,
        }
    }

    /// Whether the property carries data on `object`.
    ///
    /// Empty collections count as unset.
    pub fn is_populated(&self, object: &dyn MetadataObject) -> bool {
        match &self.accessor {
            Accessor::Simple(get) => get(object).is_some(),
            Accessor::Reference(get) => get(object).is_some(),
            Accessor::Collection { get, .. } => !get(object).is_empty(),
            Accessor::Intrinsic => false,
        }
    }
}

/// A composite key whose tuple of values must be unique within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKey {
    pub properties: Vec<String>,
}

/// Descriptor table for one metadata type.
#[derive(Debug, Clone)]
pub struct Schema {
    pub type_name: TypeName,
    pub properties: Vec<Property>,
    pub translatable: bool,
    pub unique_keys: Vec<UniqueKey>,
}

impl Schema {
    pub fn new(type_name: impl Into<TypeName>) -> Self {
        Self {
            type_name: type_name.into(),
            properties: Vec::new(),
            translatable: false,
            unique_keys: Vec::new(),
        }
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_unique_key(mut self, properties: &[&str]) -> Self {
        self.unique_keys.push(UniqueKey {
            properties: properties.iter().map(|p| p.to_string()).collect(),
        });
        self
    }

    pub fn translatable(mut self, translatable: bool) -> Self {
        self.translatable = translatable;
        self
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn has_persisted_property(&self, name: &str) -> bool {
        self.property(name).map(|p| p.persisted).unwrap_or(false)
    }

    /// Properties whose values must be unique across stored and incoming objects.
    pub fn unique_properties(&self) -> impl Iterator<Item = &Property> {
        self.properties
            .iter()
            .filter(|p| p.persisted && p.owner && p.unique && p.is_simple())
    }

    /// Extract the tuple of values for a composite key.
    pub fn unique_key_values(&self, key: &UniqueKey, object: &dyn MetadataObject) -> Vec<Option<String>> {
        key.properties
            .iter()
            .map(|name| self.property(name).and_then(|p| p.value(object)))
            .collect()
    }

    /// Check the table is internally consistent.
    pub fn validate(&self) -> MetagateResult<()> {
        let mut seen = BTreeSet::new();
        for p in &self.properties {
            if p.name.trim().is_empty() {
                return Err(MetagateError::invalid_argument(format!(
                    "schema {} has a property with an empty name",
                    self.type_name
                )));
            }
            if !seen.insert(p.name.as_str()) {
                return Err(MetagateError::invalid_argument(format!(
                    "schema {} declares property {} twice",
                    self.type_name, p.name
                )));
            }
            if p.is_reference() && p.target_type.is_none() {
                return Err(MetagateError::invariant(format!(
                    "reference property {}.{} has no target type",
                    self.type_name, p.name
                )));
            }
        }

        for key in &self.unique_keys {
            if key.properties.is_empty() {
                return Err(MetagateError::invalid_argument(format!(
                    "schema {} declares an empty unique key",
                    self.type_name
                )));
            }
            for name in &key.properties {
                match self.property(name) {
                    Some(p) if p.is_simple() => {}
                    _ => {
                        return Err(MetagateError::invalid_argument(format!(
                            "unique key on {} references unknown or non-scalar property {name}",
                            self.type_name
                        )))
                    }
                }
            }
        }

        Ok(())
    }
}

/// Source of descriptor tables for the pipeline.
pub trait SchemaIntrospector {
    fn schema_for(&self, type_name: &TypeName) -> Option<&Schema>;
}

/// The descriptor tables of every known type, keyed by type name.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<TypeName, Schema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema after validating it. Types may only be registered once.
    pub fn register(&mut self, schema: Schema) -> MetagateResult<()> {
        schema.validate()?;
        if self.schemas.contains_key(&schema.type_name) {
            return Err(MetagateError::invalid_argument(format!(
                "schema already registered: {}",
                schema.type_name
            )));
        }
        self.schemas.insert(schema.type_name.clone(), schema);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn type_names(&self) -> impl Iterator<Item = &TypeName> {
        self.schemas.keys()
    }
}

impl SchemaIntrospector for SchemaRegistry {
    fn schema_for(&self, type_name: &TypeName) -> Option<&Schema> {
        self.schemas.get(type_name)
    }
}
