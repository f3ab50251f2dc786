//! Validation runner.
//!
//! `ValidationFactory` resolves one check chain per import strategy from the
//! registry and configuration, then validates batches type by type:
//! 1. build a `ValidationContext` over the batch's preheat
//! 2. run the chain for the batch's strategy, merging reports
//! 3. excise every object in the removal set
//! 4. compute create/update/delete counters from what is left
//!
//! The batch is mutated in place; what survives is ready for persistence.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use tracing::info;

use metagate_core::bundle::{AtomicMode, Batch, ImportStrategy};
use metagate_core::config::{validate_config, ValidationConfig};
use metagate_core::model::TypeName;
use metagate_core::pipeline::{CheckChain, Collaborators, TypeSlice, ValidationContext};
use metagate_core::report::{TypeReport, ValidationReport};

use crate::registry::CheckRegistry;

/// Runs the configured check chains over batches.
pub struct ValidationFactory<'s> {
    registry: CheckRegistry,
    config: ValidationConfig,
    services: Collaborators<'s>,
    chains: BTreeMap<ImportStrategy, CheckChain>,
}

impl<'s> ValidationFactory<'s> {
    /// Validate `config` and resolve a chain for every strategy.
    pub fn new(registry: CheckRegistry, config: ValidationConfig, services: Collaborators<'s>) -> Result<Self> {
        validate_config(&config).context("invalid validation config")?;

        let chains = ImportStrategy::ALL
            .into_iter()
            .map(|strategy| (strategy, registry.build_chain(strategy, &config)))
            .collect();

        Ok(Self {
            registry,
            config,
            services,
            chains,
        })
    }

    /// A runner over every built-in check.
    #[cfg(feature = "builtin")]
    pub fn with_builtins(config: ValidationConfig, services: Collaborators<'s>) -> Result<Self> {
        Self::new(CheckRegistry::with_builtins()?, config, services)
    }

    pub fn registry(&self) -> &CheckRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn chain(&self, strategy: ImportStrategy) -> Option<&CheckChain> {
        self.chains.get(&strategy)
    }

    /// Validate the objects of one type and excise the rejected ones.
    ///
    /// The returned report is final for the type: findings from every check
    /// plus counters computed after excision.
    pub fn validate(&self, batch: &mut Batch, type_name: &TypeName) -> TypeReport {
        let strategy = batch.params().strategy;
        let atomic_mode = batch.params().atomic_mode;
        let Some(chain) = self.chain(strategy) else {
            return TypeReport::new(type_name.clone());
        };

        let (params, preheat, objects) = batch.parts_mut(type_name);
        let mut ctx = ValidationContext::new(params, preheat, &self.config, self.services);
        let mut report = {
            let mut slice = TypeSlice::new(type_name, &mut objects.persisted, &mut objects.non_persisted);
            chain.run(&mut slice, &mut ctx)
        };

        let removal = ctx.into_removal_set();
        let removed = objects.remove(&removal);

        let stats = &mut report.stats;
        match strategy {
            ImportStrategy::Create => stats.created += objects.non_persisted.len(),
            ImportStrategy::Update => stats.updated += objects.persisted.len(),
            ImportStrategy::CreateAndUpdate => {
                stats.created += objects.non_persisted.len();
                stats.updated += objects.persisted.len();
            }
            ImportStrategy::Delete => stats.deleted += objects.persisted.len(),
        }

        if atomic_mode == AtomicMode::All && report.has_errors() {
            report.stats.inc_ignored();
        }

        info!(
            type_name = %type_name,
            strategy = strategy.as_str(),
            removed,
            created = report.stats.created,
            updated = report.stats.updated,
            deleted = report.stats.deleted,
            ignored = report.stats.ignored,
            "type validated"
        );

        report
    }

    /// Validate every type of the batch, in the order types were added.
    ///
    /// Under `AtomicMode::All`, any error empties the whole batch once every
    /// type has been validated.
    pub fn validate_bundle(&self, batch: &mut Batch) -> ValidationReport {
        let mut report = ValidationReport::default();
        let type_names: Vec<TypeName> = batch.type_names().to_vec();

        for type_name in &type_names {
            report.add_type_report(self.validate(batch, type_name));
        }

        if batch.params().atomic_mode == AtomicMode::All && report.has_errors() {
            info!(types = type_names.len(), "atomic batch has errors; all objects dropped");
            batch.clear_objects();
        }

        report
    }
}

impl std::fmt::Debug for ValidationFactory<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationFactory")
            .field("checks", &self.registry.list_ids())
            .field("chains", &self.chains)
            .finish()
    }
}

#[cfg(all(test, feature = "builtin"))]
mod tests {
    use assert_matches::assert_matches;
    use metagate_core::bundle::BatchParams;
    use metagate_core::model::schema::SchemaRegistry;
    use metagate_core::pipeline::check_ids;
    use metagate_core::preheat::{PreheatBuilder, PreheatIdentifier};
    use metagate_core::report::ErrorCode;
    use metagate_core::services::BasicValueTypeValidator;
    use metagate_core::testing::{self, DataElement, MockAcl, MockUserDirectory};

    use super::*;

    struct Env {
        schemas: SchemaRegistry,
        acl: MockAcl,
        users: MockUserDirectory,
    }

    impl Env {
        fn new() -> Self {
            Self {
                schemas: testing::fixture_schemas(),
                acl: MockAcl::default(),
                users: MockUserDirectory::default(),
            }
        }

        fn services(&self) -> Collaborators<'_> {
            Collaborators {
                schemas: &self.schemas,
                acl: &self.acl,
                users: &self.users,
                value_types: &BasicValueTypeValidator,
            }
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let env = Env::new();
        let mut config = ValidationConfig::default();
        config.chains.delete.clear();
        assert!(ValidationFactory::with_builtins(config, env.services()).is_err());
    }

    #[test]
    fn delete_chain_is_security_then_deletion() {
        let env = Env::new();
        let factory = ValidationFactory::with_builtins(ValidationConfig::default(), env.services()).unwrap();
        let ids: Vec<&str> = factory.chain(ImportStrategy::Delete).unwrap().ids().collect();
        assert_eq!(ids, vec![check_ids::SECURITY, check_ids::DELETION]);
    }

    #[test]
    fn rejected_objects_are_excised_and_not_counted() {
        let env = Env::new();
        let factory = ValidationFactory::with_builtins(ValidationConfig::default(), env.services()).unwrap();

        let params = BatchParams::new(ImportStrategy::Create, testing::admin()).atomic_mode(AtomicMode::Object);
        let preheat = PreheatBuilder::new(PreheatIdentifier::Uid).build(&env.schemas);
        let mut batch = Batch::new(params, preheat);
        batch.add_object(DataElement::new("deAAAAAAAAA", "ANC"));
        batch.add_object(DataElement::new("bad", "BCG"));

        let ty = TypeName::new(testing::DATA_ELEMENT);
        let report = factory.validate(&mut batch, &ty);

        assert_eq!(report.stats.created, 1);
        assert_eq!(report.stats.ignored, 1);
        assert_matches!(report.object_reports[0].errors[0].code, ErrorCode::InvalidUid);
        assert_eq!(batch.objects(&ty).unwrap().non_persisted.len(), 1);
    }
}
