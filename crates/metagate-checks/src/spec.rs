//! Check specification types.
//!
//! A `CheckSpec` is the static declaration of a check:
//! - its stable id and display name
//! - the import strategies it can run under
//!
//! Specs are used by the registry to decide which configured checks make it
//! into a chain. Specs are data-only and MUST NOT execute code.

use std::collections::BTreeSet;

use anyhow::Result;
use metagate_core::bundle::ImportStrategy;

/// Static description of a check.
#[derive(Debug, Clone, Default)]
pub struct CheckSpec {
    /// Stable, dot-namespaced id (e.g. `uniqueness.property`).
    pub id: String,

    /// Human-readable display name.
    pub name: String,

    /// Strategies under which the check may run.
    pub strategies: BTreeSet<ImportStrategy>,
}

impl CheckSpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            strategies: BTreeSet::new(),
        }
    }

    pub fn support(mut self, strategy: ImportStrategy) -> Self {
        self.strategies.insert(strategy);
        self
    }

    pub fn support_all(mut self) -> Self {
        self.strategies.extend(ImportStrategy::ALL);
        self
    }

    /// Every strategy that writes objects (all but delete).
    pub fn support_writes(self) -> Self {
        self.support(ImportStrategy::Create)
            .support(ImportStrategy::Update)
            .support(ImportStrategy::CreateAndUpdate)
    }

    pub fn supports_strategy(&self, strategy: ImportStrategy) -> bool {
        self.strategies.contains(&strategy)
    }

    /// Validate spec for basic quality constraints.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            anyhow::bail!("check id is empty");
        }
        if !self.id.is_ascii() || self.id.chars().any(char::is_whitespace) {
            anyhow::bail!("check id must be ASCII without whitespace: {}", self.id);
        }
        if self.name.trim().is_empty() {
            anyhow::bail!("check name is empty");
        }
        if self.strategies.is_empty() {
            anyhow::bail!("check {} supports no import strategy", self.id);
        }
        Ok(())
    }
}

/// Outcome of matching a spec against the strategy of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecEvaluation {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl SpecEvaluation {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Decide whether a check declared by `spec` may run under `strategy`.
pub fn evaluate_spec(spec: &CheckSpec, strategy: ImportStrategy) -> SpecEvaluation {
    if spec.supports_strategy(strategy) {
        SpecEvaluation::allowed()
    } else {
        SpecEvaluation::denied(format!(
            "check {} does not support the {} strategy",
            spec.id,
            strategy.as_str()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_validate_ok() {
        let s = CheckSpec::new("identity.uid", "Uid format")
            .support(ImportStrategy::Create)
            .support(ImportStrategy::CreateAndUpdate);
        s.validate().unwrap();
    }

    #[test]
    fn spec_without_strategies_is_rejected() {
        let s = CheckSpec::new("identity.uid", "Uid format");
        assert!(s.validate().is_err());
        let s = CheckSpec::new("identity uid", "Uid format").support_all();
        assert!(s.validate().is_err());
    }

    #[test]
    fn evaluate_spec_denies_unsupported_strategy() {
        let s = CheckSpec::new("identity.deletion", "Deletion").support(ImportStrategy::Delete);
        assert!(evaluate_spec(&s, ImportStrategy::Delete).allowed);

        let ev = evaluate_spec(&s, ImportStrategy::Create);
        assert!(!ev.allowed);
        assert!(ev.reason.unwrap().contains("create"));
    }
}
