//! Configuration structures for metagate-core.
//!
//! Explicit, serializable configuration used by the runner to decide which
//! checks run for each import strategy and which identifier format new
//! objects must follow.
//!
//! The core crate itself does not read environment variables or files. Hosts
//! load configuration however they like and pass it in (JSON via
//! `ValidationConfig::from_json_str` is supported).

use std::collections::BTreeSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::bundle::ImportStrategy;
use crate::errors::{MetagateError, MetagateResult};
use crate::pipeline::check_ids;

/// Default identifier-format rule: one letter followed by ten alphanumerics.
pub const DEFAULT_UID_PATTERN: &str = "^[a-zA-Z][a-zA-Z0-9]{10}$";

/// Global configuration container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub uid: UidConfig,
    pub chains: ChainConfig,
}

impl ValidationConfig {
    /// Parse and validate a JSON document. Missing sections take defaults.
    pub fn from_json_str(s: &str) -> MetagateResult<Self> {
        let cfg: ValidationConfig = serde_json::from_str(s)?;
        validate_config(&cfg)?;
        Ok(cfg)
    }
}

/// Identifier-format configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UidConfig {
    pub pattern: String,
}

impl Default for UidConfig {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_UID_PATTERN.to_string(),
        }
    }
}

impl UidConfig {
    pub fn compile(&self) -> MetagateResult<Regex> {
        Regex::new(&self.pattern)
            .map_err(|e| MetagateError::invalid_argument(format!("invalid uid pattern: {e}")))
    }
}

/// Ordered check ids per import strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub create: Vec<String>,
    pub update: Vec<String>,
    pub create_and_update: Vec<String>,
    pub delete: Vec<String>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        let ids = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        Self {
            create: ids(&[
                check_ids::DUPLICATE_IDS,
                check_ids::SECURITY,
                check_ids::CREATION,
                check_ids::UID,
                check_ids::UNIQUE_PROPERTY,
                check_ids::UNIQUE_KEY,
                check_ids::MANDATORY_ATTRIBUTES,
                check_ids::UNIQUE_ATTRIBUTES,
                check_ids::METADATA_ATTRIBUTES,
                check_ids::GEOJSON_ATTRIBUTES,
                check_ids::OWNER_REFERENCES,
                check_ids::NON_OWNER_REFERENCES,
                check_ids::TRANSLATIONS,
            ]),
            update: ids(&[
                check_ids::DUPLICATE_IDS,
                check_ids::SECURITY,
                check_ids::UPDATE,
                check_ids::UNIQUE_PROPERTY,
                check_ids::MANDATORY_ATTRIBUTES,
                check_ids::UNIQUE_ATTRIBUTES,
                check_ids::METADATA_ATTRIBUTES,
                check_ids::GEOJSON_ATTRIBUTES,
                check_ids::OWNER_REFERENCES,
                check_ids::NON_OWNER_REFERENCES,
                check_ids::TRANSLATIONS,
            ]),
            create_and_update: ids(&[
                check_ids::DUPLICATE_IDS,
                check_ids::SECURITY,
                check_ids::UID,
                check_ids::UNIQUE_PROPERTY,
                check_ids::UNIQUE_KEY,
                check_ids::MANDATORY_ATTRIBUTES,
                check_ids::UNIQUE_ATTRIBUTES,
                check_ids::METADATA_ATTRIBUTES,
                check_ids::GEOJSON_ATTRIBUTES,
                check_ids::OWNER_REFERENCES,
                check_ids::NON_OWNER_REFERENCES,
                check_ids::TRANSLATIONS,
            ]),
            delete: ids(&[check_ids::SECURITY, check_ids::DELETION]),
        }
    }
}

impl ChainConfig {
    pub fn for_strategy(&self, strategy: ImportStrategy) -> &[String] {
        match strategy {
            ImportStrategy::Create => &self.create,
            ImportStrategy::Update => &self.update,
            ImportStrategy::CreateAndUpdate => &self.create_and_update,
            ImportStrategy::Delete => &self.delete,
        }
    }
}

/// Validate a full configuration object.
pub fn validate_config(cfg: &ValidationConfig) -> MetagateResult<()> {
    cfg.uid.compile()?;

    for strategy in ImportStrategy::ALL {
        let chain = cfg.chains.for_strategy(strategy);
        if chain.is_empty() {
            return Err(MetagateError::invalid_argument(format!(
                "check chain for {} must not be empty",
                strategy.as_str()
            )));
        }

        let mut seen = BTreeSet::new();
        for id in chain {
            if id.trim().is_empty() {
                return Err(MetagateError::invalid_argument(format!(
                    "check chain for {} contains an empty id",
                    strategy.as_str()
                )));
            }
            if !seen.insert(id.as_str()) {
                return Err(MetagateError::invalid_argument(format!(
                    "check {id} listed twice in the {} chain",
                    strategy.as_str()
                )));
            }
        }
    }

    Ok(())
}
