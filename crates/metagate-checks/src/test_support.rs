//! Shared scaffolding for the unit tests of the built-in checks.

use std::collections::BTreeSet;

use metagate_core::bundle::{Batch, BatchParams, ImportStrategy, ObjectKey};
use metagate_core::config::ValidationConfig;
use metagate_core::model::schema::SchemaRegistry;
use metagate_core::model::{MetadataObject, TypeName};
use metagate_core::pipeline::{Check, Collaborators, TypeSlice, ValidationContext};
use metagate_core::preheat::{PreheatBuilder, PreheatIdentifier};
use metagate_core::report::TypeReport;
use metagate_core::services::BasicValueTypeValidator;
use metagate_core::testing::{self, DataElement, MockAcl, MockUserDirectory};

/// Builds a one-type batch, runs a single check and keeps the batch around
/// for inspection.
pub struct Harness {
    pub params: BatchParams,
    pub type_name: TypeName,
    pub acl: MockAcl,
    pub users: MockUserDirectory,
    pub schemas: SchemaRegistry,
    pub config: ValidationConfig,
    preheat: PreheatBuilder,
    persisted: Vec<Box<dyn MetadataObject>>,
    non_persisted: Vec<Box<dyn MetadataObject>>,
    batch: Option<Batch>,
}

impl Harness {
    pub fn new(strategy: ImportStrategy) -> Self {
        Self {
            params: BatchParams::new(strategy, testing::admin()),
            type_name: TypeName::new(testing::DATA_ELEMENT),
            acl: MockAcl::default(),
            users: MockUserDirectory::default(),
            schemas: testing::fixture_schemas(),
            config: ValidationConfig::default(),
            preheat: PreheatBuilder::new(PreheatIdentifier::Uid),
            persisted: Vec::new(),
            non_persisted: Vec::new(),
            batch: None,
        }
    }

    /// Register a default data element with this uid.
    pub fn with_default(mut self, uid: &str) -> Self {
        self.preheat = std::mem::take(&mut self.preheat).default_object(DataElement::new(uid, "default"));
        self
    }

    pub fn configure(&mut self, f: impl FnOnce(PreheatBuilder) -> PreheatBuilder) {
        self.preheat = f(std::mem::take(&mut self.preheat));
    }

    /// Add an object to storage only (a reference target).
    pub fn store<T: MetadataObject>(&mut self, object: T) {
        self.configure(|b| b.stored(object));
    }

    /// Add an object both to storage and to the persisted list.
    pub fn persisted<T: MetadataObject + Clone>(&mut self, object: T) {
        self.store(object.clone());
        self.persisted.push(Box::new(object));
    }

    pub fn new_object<T: MetadataObject>(&mut self, object: T) {
        self.non_persisted.push(Box::new(object));
    }

    pub fn add_stored(&mut self, uid: &str) {
        self.persisted(DataElement::new(uid, uid));
    }

    pub fn add_new(&mut self, uid: &str) {
        self.new_object(DataElement::new(uid, uid));
    }

    /// A new data element without any identifier.
    pub fn add_anonymous(&mut self) {
        self.new_object(DataElement::default());
    }

    /// Run one check over the assembled batch.
    ///
    /// Returns the check's report and the number of objects it marked for
    /// removal. Objects are not excised.
    pub fn run(&mut self, check: &dyn Check) -> (TypeReport, usize) {
        let (report, removal) = self.run_keys(check);
        (report, removal.len())
    }

    pub fn run_keys(&mut self, check: &dyn Check) -> (TypeReport, BTreeSet<ObjectKey>) {
        let preheat = std::mem::take(&mut self.preheat).build(&self.schemas);
        let mut batch = Batch::new(self.params.clone(), preheat);
        for object in self.persisted.drain(..) {
            batch.insert(object, true);
        }
        for object in self.non_persisted.drain(..) {
            batch.insert(object, false);
        }

        let services = Collaborators {
            schemas: &self.schemas,
            acl: &self.acl,
            users: &self.users,
            value_types: &BasicValueTypeValidator,
        };
        let (params, preheat, objects) = batch.parts_mut(&self.type_name);
        let mut ctx = ValidationContext::new(params, preheat, &self.config, services);
        let mut slice = TypeSlice::new(&self.type_name, &mut objects.persisted, &mut objects.non_persisted);
        let report = check.run(&mut slice, &mut ctx).expect("check runs");
        let removal = ctx.into_removal_set();

        self.batch = Some(batch);
        (report, removal)
    }

    pub fn batch(&self) -> &Batch {
        self.batch.as_ref().expect("run() first")
    }

    pub fn object<T: MetadataObject>(&self, uid: &str) -> &T {
        let objects = self.batch().objects(&self.type_name).expect("type present");
        objects
            .persisted
            .iter()
            .chain(objects.non_persisted.iter())
            .filter_map(|o| metagate_core::model::downcast_ref::<T>(o.object()))
            .find(|o| o.uid() == Some(uid))
            .expect("object present")
    }
}
