//! Shared fixtures for the pipeline integration tests.

#![allow(dead_code)]

use metagate_checks::ValidationFactory;
use metagate_core::bundle::{AtomicMode, Batch, BatchParams, ImportStrategy};
use metagate_core::config::ValidationConfig;
use metagate_core::model::schema::SchemaRegistry;
use metagate_core::pipeline::Collaborators;
use metagate_core::preheat::{PreheatBuilder, PreheatIdentifier};
use metagate_core::services::BasicValueTypeValidator;
use metagate_core::testing::{self, DataElement, MockAcl, MockUserDirectory};

/// Collaborators and configuration for one test.
pub struct Env {
    pub schemas: SchemaRegistry,
    pub acl: MockAcl,
    pub users: MockUserDirectory,
    pub config: ValidationConfig,
}

impl Env {
    pub fn new() -> Self {
        Self {
            schemas: testing::fixture_schemas(),
            acl: MockAcl::default(),
            users: MockUserDirectory::default(),
            config: ValidationConfig::default(),
        }
    }

    pub fn services(&self) -> Collaborators<'_> {
        Collaborators {
            schemas: &self.schemas,
            acl: &self.acl,
            users: &self.users,
            value_types: &BasicValueTypeValidator,
        }
    }

    pub fn factory(&self) -> ValidationFactory<'_> {
        ValidationFactory::with_builtins(self.config.clone(), self.services()).expect("factory builds")
    }

    /// Build a batch. Objects known to the preheat land in the persisted list.
    pub fn batch(
        &self,
        strategy: ImportStrategy,
        atomic_mode: AtomicMode,
        preheat: impl FnOnce(PreheatBuilder) -> PreheatBuilder,
        objects: Vec<DataElement>,
    ) -> Batch {
        let params = BatchParams::new(strategy, testing::admin()).atomic_mode(atomic_mode);
        let preheat = preheat(PreheatBuilder::new(PreheatIdentifier::Uid)).build(&self.schemas);
        let mut batch = Batch::new(params, preheat);
        for object in objects {
            batch.add_object(object);
        }
        batch
    }
}

pub fn data_element_type() -> metagate_core::model::TypeName {
    metagate_core::model::TypeName::new(testing::DATA_ELEMENT)
}
