//! metagate-checks
//!
//! The rule units of the metadata import validation pipeline and the runner
//! that drives them:
//! - `CheckSpec` declarations and the `CheckRegistry` (id -> spec + factory)
//! - Built-in checks (identity, security, uniqueness, attributes,
//!   translations, references), behind the `builtin` feature
//! - `ValidationFactory`, which resolves the configured chains and validates
//!   batches type by type
//!
//! ```ignore
//! let factory = ValidationFactory::with_builtins(ValidationConfig::default(), services)?;
//! let report = factory.validate_bundle(&mut batch);
//! ```

pub mod builtin;
pub mod factory;
pub mod registry;
pub mod spec;

#[cfg(test)]
mod test_support;

pub use crate::factory::ValidationFactory;
pub use crate::registry::{CheckFactory, CheckRegistry, RegisteredCheck};
pub use crate::spec::{evaluate_spec, CheckSpec, SpecEvaluation};
