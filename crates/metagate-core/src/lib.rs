//! metagate-core
//!
//! Core primitives for validating metadata import batches:
//! - Object model and per-type descriptor tables (`model`, `model::schema`)
//! - Report model (`ErrorReport`, `ObjectReport`, `TypeReport`)
//! - Preheat cache of stored objects plus per-run scratch maps
//! - Batch (object bundle) model and import parameters
//! - Collaborator traits (ACL, user directory, value types)
//! - Validation context and the `Check` contract
//!
//! The core crate does no I/O. Hosts load stored objects and configuration
//! and pass them in; the built-in checks and the runner live in
//! `metagate-checks`.

pub mod bundle;
pub mod config;
pub mod errors;
pub mod model;
pub mod pipeline;
pub mod preheat;
pub mod report;
pub mod services;

#[cfg(feature = "testing")]
pub mod testing;

pub use crate::errors::{MetagateError, MetagateResult};

/// Default identifier settings.
pub mod defaults {
    /// Length of a generated uid.
    pub const UID_LENGTH: usize = 11;
    pub use crate::config::DEFAULT_UID_PATTERN as UID_PATTERN;
}

/// Convenience re-exports.
pub mod prelude {
    pub use crate::bundle::{AtomicMode, Batch, BatchObject, BatchParams, ImportReportMode, ImportStrategy, ObjectKey};
    pub use crate::config::{validate_config, ValidationConfig};
    pub use crate::model::schema::{Property, Schema, SchemaIntrospector, SchemaRegistry};
    pub use crate::model::{Actor, AttributeValue, Identity, MetadataObject, ObjectRef, Translation, TypeName, ValueType};
    pub use crate::pipeline::{check_ids, Check, CheckChain, Collaborators, TypeSlice, ValidationContext};
    pub use crate::preheat::{Preheat, PreheatBuilder, PreheatIdentifier};
    pub use crate::report::{ErrorCode, ErrorReport, ObjectReport, Stats, TypeReport, ValidationReport};
    pub use crate::services::{AclService, BasicValueTypeValidator, UserDirectory, ValueTypeValidator};
    pub use crate::{MetagateError, MetagateResult};
}
