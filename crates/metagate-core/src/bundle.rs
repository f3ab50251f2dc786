//! Batch (object bundle) model.
//!
//! A `Batch` is the unit of work: for every object type it holds the objects
//! that already exist in storage (updated or deleted) and those that do not
//! (created), plus the import parameters and the preheat cache. An external
//! collaborator assembles it; the runner removes rejected objects from it in
//! place; persistence consumes what is left.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::{Actor, MetadataObject, TypeName};
use crate::preheat::{Preheat, PreheatIdentifier};

/// What the import should do with the submitted objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportStrategy {
    Create,
    Update,
    #[default]
    CreateAndUpdate,
    Delete,
}

impl ImportStrategy {
    pub const ALL: [ImportStrategy; 4] = [
        ImportStrategy::Create,
        ImportStrategy::Update,
        ImportStrategy::CreateAndUpdate,
        ImportStrategy::Delete,
    ];

    pub fn is_create(&self) -> bool {
        matches!(self, Self::Create)
    }

    pub fn is_update(&self) -> bool {
        matches!(self, Self::Update)
    }

    pub fn is_create_and_update(&self) -> bool {
        matches!(self, Self::CreateAndUpdate)
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::CreateAndUpdate => "create_and_update",
            Self::Delete => "delete",
        }
    }
}

/// Failure isolation for a type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AtomicMode {
    /// One failing object voids the whole type.
    #[default]
    All,
    /// Failures are isolated per object.
    Object,
}

/// How much the import report should say.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportReportMode {
    Full,
    #[default]
    Errors,
    /// Also report data carried on the non-owning side of relations.
    ErrorsNotOwner,
    Debug,
}

/// Import parameters shared by every type of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchParams {
    pub strategy: ImportStrategy,
    pub atomic_mode: AtomicMode,
    pub report_mode: ImportReportMode,
    pub identifier: PreheatIdentifier,
    pub actor: Actor,
    /// Bypass sharing verification.
    pub skip_sharing: bool,
}

impl BatchParams {
    pub fn new(strategy: ImportStrategy, actor: Actor) -> Self {
        Self {
            strategy,
            actor,
            ..Self::default()
        }
    }

    pub fn atomic_mode(mut self, mode: AtomicMode) -> Self {
        self.atomic_mode = mode;
        self
    }

    pub fn report_mode(mut self, mode: ImportReportMode) -> Self {
        self.report_mode = mode;
        self
    }

    pub fn identifier(mut self, identifier: PreheatIdentifier) -> Self {
        self.identifier = identifier;
        self
    }

    pub fn skip_sharing(mut self, skip: bool) -> Self {
        self.skip_sharing = skip;
        self
    }
}

/// Stable handle for an object within one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey(u64);

impl ObjectKey {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// An object of the batch together with its handle.
#[derive(Debug)]
pub struct BatchObject {
    key: ObjectKey,
    object: Box<dyn MetadataObject>,
}

impl BatchObject {
    pub fn key(&self) -> ObjectKey {
        self.key
    }

    pub fn object(&self) -> &dyn MetadataObject {
        self.object.as_ref()
    }

    pub fn object_mut(&mut self) -> &mut dyn MetadataObject {
        self.object.as_mut()
    }

    pub fn into_object(self) -> Box<dyn MetadataObject> {
        self.object
    }
}

/// Objects of one type, split by whether they already exist in storage.
#[derive(Debug, Default)]
pub struct TypeObjects {
    pub persisted: Vec<BatchObject>,
    pub non_persisted: Vec<BatchObject>,
}

impl TypeObjects {
    pub fn len(&self) -> usize {
        self.persisted.len() + self.non_persisted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every object whose key is in `keys`. Returns how many were removed.
    pub fn remove(&mut self, keys: &BTreeSet<ObjectKey>) -> usize {
        let before = self.len();
        self.persisted.retain(|o| !keys.contains(&o.key));
        self.non_persisted.retain(|o| !keys.contains(&o.key));
        before - self.len()
    }

    pub fn clear(&mut self) {
        self.persisted.clear();
        self.non_persisted.clear();
    }
}

/// The unit of work.
#[derive(Debug)]
pub struct Batch {
    params: BatchParams,
    preheat: Preheat,
    objects: BTreeMap<TypeName, TypeObjects>,
    type_order: Vec<TypeName>,
    next_key: u64,
}

impl Batch {
    pub fn new(params: BatchParams, preheat: Preheat) -> Self {
        Self {
            params,
            preheat,
            objects: BTreeMap::new(),
            type_order: Vec::new(),
            next_key: 0,
        }
    }

    pub fn params(&self) -> &BatchParams {
        &self.params
    }

    pub fn preheat(&self) -> &Preheat {
        &self.preheat
    }

    /// Add an object, classifying it as persisted if the preheat knows it.
    pub fn add_object<T: MetadataObject>(&mut self, object: T) -> ObjectKey {
        self.add_boxed(Box::new(object))
    }

    pub fn add_boxed(&mut self, object: Box<dyn MetadataObject>) -> ObjectKey {
        let persisted = self.preheat.exists(self.params.identifier, object.as_ref());
        self.insert(object, persisted)
    }

    /// Add an object to an explicit list, bypassing the preheat lookup.
    ///
    /// The object is registered as a preheat placeholder either way.
    pub fn insert(&mut self, object: Box<dyn MetadataObject>, persisted: bool) -> ObjectKey {
        let key = ObjectKey(self.next_key);
        self.next_key += 1;

        self.preheat.add_placeholder(object.as_ref());

        let type_name = object.type_name();
        if !self.objects.contains_key(&type_name) {
            self.type_order.push(type_name.clone());
        }
        let bucket = self.objects.entry(type_name).or_default();
        let entry = BatchObject { key, object };
        if persisted {
            bucket.persisted.push(entry);
        } else {
            bucket.non_persisted.push(entry);
        }
        key
    }

    /// Types in the order they were first added.
    pub fn type_names(&self) -> &[TypeName] {
        &self.type_order
    }

    pub fn objects(&self, type_name: &TypeName) -> Option<&TypeObjects> {
        self.objects.get(type_name)
    }

    pub fn contains(&self, key: ObjectKey) -> bool {
        self.objects.values().any(|t| {
            t.persisted.iter().chain(t.non_persisted.iter()).any(|o| o.key == key)
        })
    }

    pub fn len(&self) -> usize {
        self.objects.values().map(TypeObjects::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every object of every type.
    pub fn clear_objects(&mut self) {
        for t in self.objects.values_mut() {
            t.clear();
        }
    }

    /// Borrow the parts a validation run needs at the same time.
    pub fn parts_mut(&mut self, type_name: &TypeName) -> (&BatchParams, &mut Preheat, &mut TypeObjects) {
        let objects = self.objects.entry(type_name.clone()).or_default();
        (&self.params, &mut self.preheat, objects)
    }

    /// Hand the remaining objects to persistence.
    pub fn into_objects(self) -> BTreeMap<TypeName, TypeObjects> {
        self.objects
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use crate::model::schema::SchemaRegistry;
    use crate::model::{Identity, ObjectRef};

    #[derive(Debug, Clone)]
    struct Section {
        identity: Identity,
    }

    impl MetadataObject for Section {
        fn type_name(&self) -> TypeName {
            TypeName::new("Section")
        }
        fn identity(&self) -> &Identity {
            &self.identity
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn section(uid: &str) -> Section {
        Section {
            identity: Identity::with_uid(uid),
        }
    }

    #[test]
    fn objects_are_classified_by_preheat() {
        let preheat = Preheat::builder(PreheatIdentifier::Uid)
            .stored(section("stored00001"))
            .build(&SchemaRegistry::new());
        let mut batch = Batch::new(BatchParams::default(), preheat);

        batch.add_object(section("stored00001"));
        batch.add_object(section("fresh000001"));

        let t = batch.objects(&TypeName::new("Section")).unwrap();
        assert_eq!(t.persisted.len(), 1);
        assert_eq!(t.non_persisted.len(), 1);
        assert_eq!(batch.type_names(), &[TypeName::new("Section")]);
    }

    #[test]
    fn batch_objects_become_reference_targets_but_stay_new() {
        let mut batch = Batch::new(BatchParams::default(), Preheat::default());
        batch.add_object(section("fresh000001"));
        batch.add_object(section("fresh000001"));

        let t = batch.objects(&TypeName::new("Section")).unwrap();
        assert_eq!(t.non_persisted.len(), 2);
        assert!(t.persisted.is_empty());

        let reference = ObjectRef::uid("Section", "fresh000001");
        assert!(batch.preheat().is_resolvable(PreheatIdentifier::Uid, &reference));
        assert!(batch.preheat().resolve(PreheatIdentifier::Uid, &reference).is_none());
    }

    #[test]
    fn remove_by_key() {
        let mut batch = Batch::new(BatchParams::default(), Preheat::default());
        let a = batch.add_object(section("aaaaaaaaaaa"));
        let b = batch.add_object(section("bbbbbbbbbbb"));

        let (_, _, objects) = batch.parts_mut(&TypeName::new("Section"));
        let removed = objects.remove(&BTreeSet::from([a]));
        assert_eq!(removed, 1);
        assert!(!batch.contains(a));
        assert!(batch.contains(b));
    }
}
