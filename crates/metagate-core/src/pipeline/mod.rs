//! Validation pipeline primitives.
//!
//! A validation run for one object type is an ordered chain of checks:
//! - each check sees the type's objects through a `TypeSlice`
//! - each check reads and writes the shared `ValidationContext` (preheat
//!   scratch maps, removal set)
//! - each check returns a `TypeReport` which the chain merges
//!
//! This module defines:
//! - the `Check` trait and `CheckChain`
//! - `ValidationContext` and the `Collaborators` it carries
//! - `TypeSlice`, the per-type view checks operate on
//!
//! Checks never add or remove objects. Their only mutation channels are the
//! removal set, the preheat scratch maps and, for reference repair, the
//! fields of the objects themselves.

use std::collections::BTreeSet;

use crate::bundle::{BatchObject, BatchParams, ImportStrategy, ObjectKey};
use crate::config::ValidationConfig;
use crate::errors::MetagateResult;
use crate::model::schema::{Schema, SchemaIntrospector};
use crate::model::TypeName;
use crate::preheat::Preheat;
use crate::report::{ObjectReport, TypeReport};
use crate::services::{AclService, UserDirectory, ValueTypeValidator};

/// A stable identifier for a check.
///
/// Use dot-delimited namespaces:
/// - `identity.duplicate_ids`
/// - `uniqueness.property`
/// - `references.owner`
pub type CheckId = String;

/// Ids of the built-in checks.
pub mod check_ids {
    pub const DUPLICATE_IDS: &str = "identity.duplicate_ids";
    pub const UID: &str = "identity.uid";
    pub const CREATION: &str = "identity.creation";
    pub const UPDATE: &str = "identity.update";
    pub const DELETION: &str = "identity.deletion";
    pub const SECURITY: &str = "security.access";
    pub const UNIQUE_PROPERTY: &str = "uniqueness.property";
    pub const UNIQUE_KEY: &str = "uniqueness.unique_key";
    pub const UNIQUE_ATTRIBUTES: &str = "uniqueness.attribute";
    pub const MANDATORY_ATTRIBUTES: &str = "attributes.mandatory";
    pub const METADATA_ATTRIBUTES: &str = "attributes.metadata";
    pub const GEOJSON_ATTRIBUTES: &str = "attributes.geojson";
    pub const TRANSLATIONS: &str = "translations";
    pub const OWNER_REFERENCES: &str = "references.owner";
    pub const NON_OWNER_REFERENCES: &str = "references.not_owner";
}

/// Handles to the external services checks consult.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub schemas: &'a dyn SchemaIntrospector,
    pub acl: &'a dyn AclService,
    pub users: &'a dyn UserDirectory,
    pub value_types: &'a dyn ValueTypeValidator,
}

/// Shared state of one validation run.
///
/// Created fresh for each type and discarded once the runner has excised the
/// objects in the removal set.
pub struct ValidationContext<'a> {
    pub params: &'a BatchParams,
    pub preheat: &'a mut Preheat,
    pub config: &'a ValidationConfig,
    pub services: Collaborators<'a>,
    removal: BTreeSet<ObjectKey>,
}

impl<'a> ValidationContext<'a> {
    pub fn new(
        params: &'a BatchParams,
        preheat: &'a mut Preheat,
        config: &'a ValidationConfig,
        services: Collaborators<'a>,
    ) -> Self {
        Self {
            params,
            preheat,
            config,
            services,
            removal: BTreeSet::new(),
        }
    }

    pub fn schema_for(&self, type_name: &TypeName) -> Option<&'a Schema> {
        self.services.schemas.schema_for(type_name)
    }

    pub fn mark_for_removal(&mut self, key: ObjectKey) {
        self.removal.insert(key);
    }

    pub fn is_marked(&self, key: ObjectKey) -> bool {
        self.removal.contains(&key)
    }

    pub fn removal_set(&self) -> &BTreeSet<ObjectKey> {
        &self.removal
    }

    pub fn into_removal_set(self) -> BTreeSet<ObjectKey> {
        self.removal
    }

    /// Record a failed object: keep its report, count it as ignored and mark
    /// it for removal. Empty reports are dropped without marking.
    pub fn reject(&mut self, report: &mut TypeReport, key: ObjectKey, object_report: ObjectReport) {
        if object_report.is_empty() {
            return;
        }
        self.mark_for_removal(key);
        report.ignore(object_report);
    }
}

/// The objects of one type, split as in the batch.
///
/// Slices, not vectors: objects can be inspected and repaired in place but
/// never added or removed.
pub struct TypeSlice<'b> {
    pub type_name: &'b TypeName,
    pub persisted: &'b mut [BatchObject],
    pub non_persisted: &'b mut [BatchObject],
}

impl<'b> TypeSlice<'b> {
    pub fn new(
        type_name: &'b TypeName,
        persisted: &'b mut [BatchObject],
        non_persisted: &'b mut [BatchObject],
    ) -> Self {
        Self {
            type_name,
            persisted,
            non_persisted,
        }
    }

    /// Objects a strategy acts on, each with its position in its own list.
    ///
    /// Create selects the non-persisted list, update and delete the persisted
    /// one, create-and-update both (persisted first).
    pub fn select(&self, strategy: ImportStrategy) -> Vec<(usize, &BatchObject)> {
        let persisted = self.persisted.iter().enumerate();
        let non_persisted = self.non_persisted.iter().enumerate();
        match strategy {
            ImportStrategy::Create => non_persisted.collect(),
            ImportStrategy::Update | ImportStrategy::Delete => persisted.collect(),
            ImportStrategy::CreateAndUpdate => persisted.chain(non_persisted).collect(),
        }
    }

    /// Mutable counterpart of `select`.
    pub fn select_mut(&mut self, strategy: ImportStrategy) -> Vec<(usize, &mut BatchObject)> {
        let persisted = self.persisted.iter_mut().enumerate();
        let non_persisted = self.non_persisted.iter_mut().enumerate();
        match strategy {
            ImportStrategy::Create => non_persisted.collect(),
            ImportStrategy::Update | ImportStrategy::Delete => persisted.collect(),
            ImportStrategy::CreateAndUpdate => persisted.chain(non_persisted).collect(),
        }
    }

    /// An empty report for the object at `index` of its list.
    pub fn object_report(&self, index: usize, object: &BatchObject) -> ObjectReport {
        ObjectReport::new(self.type_name.clone(), index, object.object().uid())
    }

    pub fn len(&self) -> usize {
        self.persisted.len() + self.non_persisted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One validation rule.
///
/// A check is a function of the slice, the import parameters and the
/// context. Validation findings are reported, never returned as `Err`; an
/// `Err` means the check itself could not run.
pub trait Check: Send + Sync {
    fn id(&self) -> &str;

    fn run(&self, slice: &mut TypeSlice<'_>, ctx: &mut ValidationContext<'_>) -> MetagateResult<TypeReport>;
}

/// An ordered list of checks.
#[derive(Default)]
pub struct CheckChain {
    checks: Vec<Box<dyn Check>>,
}

impl CheckChain {
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    pub fn push_check<C: Check + 'static>(&mut self, check: C) -> &mut Self {
        self.checks.push(Box::new(check));
        self
    }

    pub fn push_boxed(&mut self, check: Box<dyn Check>) -> &mut Self {
        self.checks.push(check);
        self
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.checks.iter().map(|c| c.id())
    }

    /// Run every check in order and merge their reports.
    ///
    /// A check that fails is logged and contributes nothing; the rest of the
    /// chain still runs.
    pub fn run(&self, slice: &mut TypeSlice<'_>, ctx: &mut ValidationContext<'_>) -> TypeReport {
        let mut merged = TypeReport::new(slice.type_name.clone());

        for check in &self.checks {
            tracing::debug!(check = check.id(), type_name = %slice.type_name, "check started");

            match check.run(slice, ctx) {
                Ok(report) => {
                    tracing::debug!(
                        check = check.id(),
                        type_name = %slice.type_name,
                        object_reports = report.object_reports.len(),
                        "check finished"
                    );
                    merged.merge(report);
                }
                Err(e) => {
                    tracing::warn!(
                        check = check.id(),
                        type_name = %slice.type_name,
                        error = %e,
                        "check failed; contribution omitted"
                    );
                }
            }
        }

        merged
    }
}

impl std::fmt::Debug for CheckChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}
