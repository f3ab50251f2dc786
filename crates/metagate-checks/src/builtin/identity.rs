//! Identity checks: duplicate ids, uid format and existence.

#![cfg(feature = "builtin")]

use std::collections::BTreeMap;

use anyhow::Result;
use regex::Regex;

use metagate_core::bundle::{BatchObject, ImportStrategy};
use metagate_core::model::TypeName;
use metagate_core::pipeline::{check_ids, Check, TypeSlice, ValidationContext};
use metagate_core::report::{ErrorCode, ErrorReport, TypeReport};
use metagate_core::MetagateResult;

use crate::registry::CheckRegistry;
use crate::spec::CheckSpec;

pub fn register(registry: &mut CheckRegistry) -> Result<()> {
    registry.register(
        CheckSpec::new(check_ids::DUPLICATE_IDS, "Duplicate identifiers").support_writes(),
        |_| Ok(Box::new(DuplicateIdsCheck) as Box<dyn Check>),
    )?;

    registry.register(
        CheckSpec::new(check_ids::UID, "Identifier format")
            .support(ImportStrategy::Create)
            .support(ImportStrategy::CreateAndUpdate),
        |config| Ok(Box::new(UidCheck::new(config.uid.compile()?)) as Box<dyn Check>),
    )?;

    registry.register(
        CheckSpec::new(check_ids::CREATION, "Object must not exist").support(ImportStrategy::Create),
        |_| Ok(Box::new(ExistenceCheck::creation()) as Box<dyn Check>),
    )?;

    registry.register(
        CheckSpec::new(check_ids::UPDATE, "Object must exist for update").support(ImportStrategy::Update),
        |_| Ok(Box::new(ExistenceCheck::update()) as Box<dyn Check>),
    )?;

    registry.register(
        CheckSpec::new(check_ids::DELETION, "Object must exist for deletion").support(ImportStrategy::Delete),
        |_| Ok(Box::new(ExistenceCheck::deletion()) as Box<dyn Check>),
    )?;

    Ok(())
}

/// Flags an object whose uid equals the one remembered for its type.
///
/// Only the most recently accepted uid is remembered, so a duplicate is
/// caught only when it directly follows its twin. Persisted objects are
/// walked first, then non-persisted ones, sharing the remembered uid.
pub struct DuplicateIdsCheck;

impl Check for DuplicateIdsCheck {
    fn id(&self) -> &str {
        check_ids::DUPLICATE_IDS
    }

    fn run(&self, slice: &mut TypeSlice<'_>, ctx: &mut ValidationContext<'_>) -> MetagateResult<TypeReport> {
        let mut report = TypeReport::new(slice.type_name.clone());
        let mut last_seen: BTreeMap<TypeName, String> = BTreeMap::new();

        let walk = slice
            .persisted
            .iter()
            .enumerate()
            .chain(slice.non_persisted.iter().enumerate());

        for (index, entry) in walk {
            let object = entry.object();
            let type_name = object.type_name();
            let Some(uid) = object.uid() else {
                continue;
            };

            if last_seen.get(&type_name).map(String::as_str) == Some(uid) {
                let mut o = slice.object_report(index, entry);
                o.add_error(
                    ErrorReport::new(ErrorCode::DuplicateIdentifier, type_name.clone())
                        .main_id(uid)
                        .property("id")
                        .arg(uid)
                        .arg(type_name.as_str()),
                );
                ctx.reject(&mut report, entry.key(), o);
            } else {
                last_seen.insert(type_name, uid.to_string());
            }
        }

        Ok(report)
    }
}

/// New objects must carry a uid matching the configured format.
pub struct UidCheck {
    pattern: Regex,
}

impl UidCheck {
    pub fn new(pattern: Regex) -> Self {
        Self { pattern }
    }
}

impl Check for UidCheck {
    fn id(&self) -> &str {
        check_ids::UID
    }

    fn run(&self, slice: &mut TypeSlice<'_>, ctx: &mut ValidationContext<'_>) -> MetagateResult<TypeReport> {
        let mut report = TypeReport::new(slice.type_name.clone());

        for (index, entry) in slice.non_persisted.iter().enumerate() {
            let uid = entry.object().uid();
            if uid.map(|u| self.pattern.is_match(u)).unwrap_or(false) {
                continue;
            }

            let mut o = slice.object_report(index, entry);
            o.add_error(
                ErrorReport::new(ErrorCode::InvalidUid, slice.type_name.clone())
                    .main_id_opt(uid)
                    .property("id")
                    .arg(uid.unwrap_or("null"))
                    .arg(slice.type_name.as_str()),
            );
            ctx.reject(&mut report, entry.key(), o);
        }

        Ok(report)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Existence {
    /// Create: objects found in storage are rejected.
    MustNotExist,
    /// Update or delete: objects missing from storage are rejected.
    MustExist,
}

/// Rejects objects whose presence in storage contradicts the strategy.
///
/// System default objects are exempt.
pub struct ExistenceCheck {
    id: &'static str,
    expect: Existence,
}

impl ExistenceCheck {
    pub fn creation() -> Self {
        Self {
            id: check_ids::CREATION,
            expect: Existence::MustNotExist,
        }
    }

    pub fn update() -> Self {
        Self {
            id: check_ids::UPDATE,
            expect: Existence::MustExist,
        }
    }

    pub fn deletion() -> Self {
        Self {
            id: check_ids::DELETION,
            expect: Existence::MustExist,
        }
    }

    fn offending<'s>(&self, slice: &'s TypeSlice<'_>) -> &'s [BatchObject] {
        match self.expect {
            Existence::MustNotExist => &*slice.persisted,
            Existence::MustExist => &*slice.non_persisted,
        }
    }
}

impl Check for ExistenceCheck {
    fn id(&self) -> &str {
        self.id
    }

    fn run(&self, slice: &mut TypeSlice<'_>, ctx: &mut ValidationContext<'_>) -> MetagateResult<TypeReport> {
        let mut report = TypeReport::new(slice.type_name.clone());
        let code = match self.expect {
            Existence::MustNotExist => ErrorCode::AlreadyExists,
            Existence::MustExist => ErrorCode::NotFound,
        };
        let identifier = ctx.params.identifier;

        for (index, entry) in self.offending(slice).iter().enumerate() {
            let object = entry.object();
            if ctx.preheat.is_default(object) {
                continue;
            }

            let mut o = slice.object_report(index, entry);
            o.add_error(
                ErrorReport::new(code, slice.type_name.clone())
                    .main_id_opt(object.uid())
                    .arg(slice.type_name.as_str())
                    .arg(identifier.identifiers_with_name(object.identity())),
            );
            ctx.reject(&mut report, entry.key(), o);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use metagate_core::config::UidConfig;

    use super::*;
    use crate::test_support::Harness;

    #[test]
    fn duplicate_ids_are_adjacent_only() {
        let mut h = Harness::new(ImportStrategy::Create);
        for uid in ["deAAAAAAAAA", "deAAAAAAAAA", "deBBBBBBBBB", "deAAAAAAAAA"] {
            h.add_new(uid);
        }

        let (report, removed) = h.run(&DuplicateIdsCheck);
        assert_eq!(removed, 1);
        let indexes: Vec<usize> = report.object_reports.iter().map(|o| o.index).collect();
        assert_eq!(indexes, vec![1]);
        assert_matches!(report.object_reports[0].errors[0].code, ErrorCode::DuplicateIdentifier);
    }

    #[test]
    fn duplicate_ids_span_persisted_and_new_lists() {
        let mut h = Harness::new(ImportStrategy::CreateAndUpdate);
        h.add_stored("deAAAAAAAAA");
        h.add_new("deAAAAAAAAA");

        let (report, _) = h.run(&DuplicateIdsCheck);
        assert_eq!(report.object_reports.len(), 1);
        assert_eq!(report.object_reports[0].index, 0);
    }

    #[test]
    fn uid_format_applies_to_new_objects() {
        let mut h = Harness::new(ImportStrategy::CreateAndUpdate);
        h.add_stored("bad");
        h.add_new("deAAAAAAAAA");
        h.add_new("1eAAAAAAAAA");
        h.add_anonymous();

        let check = UidCheck::new(UidConfig::default().compile().unwrap());
        let (report, removed) = h.run(&check);
        assert_eq!(removed, 2);
        let args: Vec<&str> = report.error_reports().map(|e| e.args[0].as_str()).collect();
        assert_eq!(args, vec!["1eAAAAAAAAA", "null"]);
    }

    #[test]
    fn creation_rejects_stored_objects_except_defaults() {
        let mut h = Harness::new(ImportStrategy::Create).with_default("deDefault01");
        h.add_stored("deStored001");
        h.add_stored("deDefault01");

        let (report, removed) = h.run(&ExistenceCheck::creation());
        assert_eq!(removed, 1);
        assert_eq!(report.object_reports[0].uid.as_deref(), Some("deStored001"));
        assert_matches!(report.object_reports[0].errors[0].code, ErrorCode::AlreadyExists);
    }

    #[test]
    fn update_and_deletion_reject_missing_objects() {
        for check in [ExistenceCheck::update(), ExistenceCheck::deletion()] {
            let mut h = Harness::new(ImportStrategy::Update);
            h.add_stored("deStored001");
            h.add_new("deMissing01");

            let (report, _) = h.run(&check);
            assert_eq!(report.object_reports.len(), 1);
            assert_matches!(report.object_reports[0].errors[0].code, ErrorCode::NotFound);
        }
    }
}
