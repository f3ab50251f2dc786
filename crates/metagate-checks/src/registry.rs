//! Check registry and chain resolution.
//!
//! The registry stores the available checks as (spec, factory) pairs and
//! builds ordered chains from configuration.
//!
//! Requirements:
//! - stable ordering for lookups and iteration
//! - clear errors for missing or duplicate checks
//! - no global mutable state
//!
//! Chain building never fails: a configured id that is unknown, not allowed
//! under the strategy, or whose factory errors is logged and left out.

use std::collections::BTreeMap;

use metagate_core::bundle::ImportStrategy;
use metagate_core::config::ValidationConfig;
use metagate_core::pipeline::{Check, CheckChain};

use crate::spec::{evaluate_spec, CheckSpec};

/// Builds a check instance from configuration.
pub type CheckFactory = Box<dyn Fn(&ValidationConfig) -> anyhow::Result<Box<dyn Check>> + Send + Sync>;

/// A check factory plus its static spec.
pub struct RegisteredCheck {
    pub spec: CheckSpec,
    factory: CheckFactory,
}

impl RegisteredCheck {
    pub fn instantiate(&self, config: &ValidationConfig) -> anyhow::Result<Box<dyn Check>> {
        (self.factory)(config)
    }
}

/// A registry of checks keyed by check id.
#[derive(Default)]
pub struct CheckRegistry {
    checks: BTreeMap<String, RegisteredCheck>,
}

impl CheckRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            checks: BTreeMap::new(),
        }
    }

    /// A registry holding every built-in check.
    #[cfg(feature = "builtin")]
    pub fn with_builtins() -> anyhow::Result<Self> {
        let mut registry = Self::new();
        crate::builtin::register_all(&mut registry)?;
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Register a check factory with its spec.
    pub fn register<F>(&mut self, spec: CheckSpec, factory: F) -> anyhow::Result<()>
    where
        F: Fn(&ValidationConfig) -> anyhow::Result<Box<dyn Check>> + Send + Sync + 'static,
    {
        spec.validate()?;

        if self.checks.contains_key(&spec.id) {
            anyhow::bail!("check id already registered: {}", spec.id);
        }

        self.checks.insert(
            spec.id.clone(),
            RegisteredCheck {
                spec,
                factory: Box::new(factory),
            },
        );
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&RegisteredCheck> {
        self.checks.get(id)
    }

    /// List check ids in deterministic order.
    pub fn list_ids(&self) -> Vec<String> {
        self.checks.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RegisteredCheck)> {
        self.checks.iter()
    }

    /// Build the configured chain for `strategy`, skipping checks that cannot run.
    pub fn build_chain(&self, strategy: ImportStrategy, config: &ValidationConfig) -> CheckChain {
        let mut chain = CheckChain::new();

        for id in config.chains.for_strategy(strategy) {
            let Some(registered) = self.get(id) else {
                tracing::warn!(check = %id, strategy = strategy.as_str(), "unknown check id; skipped");
                continue;
            };

            let ev = evaluate_spec(&registered.spec, strategy);
            if !ev.allowed {
                tracing::warn!(
                    check = %id,
                    reason = ev.reason.as_deref().unwrap_or("denied"),
                    "check not allowed for strategy; skipped"
                );
                continue;
            }

            match registered.instantiate(config) {
                Ok(check) => {
                    chain.push_boxed(check);
                }
                Err(e) => {
                    tracing::warn!(check = %id, error = %e, "check could not be instantiated; skipped");
                }
            }
        }

        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metagate_core::pipeline::{TypeSlice, ValidationContext};
    use metagate_core::report::TypeReport;
    use metagate_core::MetagateResult;

    struct Noop(&'static str);

    impl Check for Noop {
        fn id(&self) -> &str {
            self.0
        }
        fn run(&self, slice: &mut TypeSlice<'_>, _ctx: &mut ValidationContext<'_>) -> MetagateResult<TypeReport> {
            Ok(TypeReport::new(slice.type_name.clone()))
        }
    }

    fn config_with(strategy_ids: &[&str]) -> ValidationConfig {
        let mut config = ValidationConfig::default();
        config.chains.create = strategy_ids.iter().map(|s| s.to_string()).collect();
        config
    }

    #[test]
    fn register_rejects_duplicates() {
        let mut reg = CheckRegistry::new();
        let spec = CheckSpec::new("test.noop", "Noop").support_all();
        reg.register(spec.clone(), |_| Ok(Box::new(Noop("test.noop")) as Box<dyn Check>))
            .unwrap();
        assert!(reg
            .register(spec, |_| Ok(Box::new(Noop("test.noop")) as Box<dyn Check>))
            .is_err());
        assert_eq!(reg.list_ids(), vec!["test.noop".to_string()]);
    }

    #[test]
    fn build_chain_skips_unknown_unsupported_and_failing() {
        let mut reg = CheckRegistry::new();
        reg.register(CheckSpec::new("test.a", "A").support_all(), |_| {
            Ok(Box::new(Noop("test.a")) as Box<dyn Check>)
        })
        .unwrap();
        reg.register(CheckSpec::new("test.delete_only", "Delete only").support(ImportStrategy::Delete), |_| {
            Ok(Box::new(Noop("test.delete_only")) as Box<dyn Check>)
        })
        .unwrap();
        reg.register(CheckSpec::new("test.failing", "Failing").support_all(), |_| {
            anyhow::bail!("cannot build")
        })
        .unwrap();

        let config = config_with(&["test.missing", "test.delete_only", "test.failing", "test.a"]);
        let chain = reg.build_chain(ImportStrategy::Create, &config);
        assert_eq!(chain.ids().collect::<Vec<_>>(), vec!["test.a"]);
    }
}
