//! Authorization, user directory and sharing checks.

#![cfg(feature = "builtin")]

use anyhow::Result;

use metagate_core::bundle::ImportStrategy;
use metagate_core::model::{types, MetadataObject};
use metagate_core::pipeline::{check_ids, Check, TypeSlice, ValidationContext};
use metagate_core::report::{ErrorCode, ErrorReport, TypeReport};
use metagate_core::MetagateResult;

use crate::registry::CheckRegistry;
use crate::spec::CheckSpec;

pub fn register(registry: &mut CheckRegistry) -> Result<()> {
    registry.register(
        CheckSpec::new(check_ids::SECURITY, "Authorization and sharing").support_all(),
        |_| Ok(Box::new(SecurityCheck) as Box<dyn Check>),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Operations applied to the persisted and the non-persisted list.
    fn for_strategy(strategy: ImportStrategy) -> (Option<Self>, Option<Self>) {
        match strategy {
            ImportStrategy::Create => (None, Some(Self::Create)),
            ImportStrategy::Update => (Some(Self::Update), None),
            ImportStrategy::CreateAndUpdate => (Some(Self::Update), Some(Self::Create)),
            ImportStrategy::Delete => (Some(Self::Delete), None),
        }
    }
}

/// Per-operation authorization, then user-directory validation for users,
/// then sharing verification.
///
/// An object denied at one step is not examined by the later ones. Deletes
/// are only authorized.
pub struct SecurityCheck;

impl SecurityCheck {
    fn authorize(op: Operation, object: &dyn MetadataObject, ctx: &ValidationContext<'_>) -> Option<ErrorReport> {
        let actor = &ctx.params.actor;
        let acl = ctx.services.acl;
        let type_name = object.type_name();
        let scheme = ctx.params.identifier;

        // Update and delete are decided against what is stored.
        let stored = ctx.preheat.get(scheme, object);
        let target: &dyn MetadataObject = stored.map(|s| s.as_ref()).unwrap_or(object);

        let code = match op {
            Operation::Create if !acl.can_create(actor, &type_name) => ErrorCode::CreateDenied,
            Operation::Update if !acl.can_update(actor, target) => ErrorCode::UpdateDenied,
            Operation::Delete if !acl.can_delete(actor, target) => ErrorCode::DeleteDenied,
            _ => return None,
        };

        let mut error = ErrorReport::new(code, type_name.clone()).main_id_opt(object.uid());
        if op != Operation::Create {
            error = error.arg(scheme.identifiers_with_name(object.identity()));
        }
        Some(error.arg(type_name.as_str()))
    }

    fn inspect(op: Operation, object: &dyn MetadataObject, ctx: &ValidationContext<'_>) -> Vec<ErrorReport> {
        if let Some(denied) = Self::authorize(op, object, ctx) {
            return vec![denied];
        }
        if op == Operation::Delete {
            return Vec::new();
        }

        let actor = &ctx.params.actor;
        let mut errors = Vec::new();
        if object.is_type(types::USER) {
            errors.extend(ctx.services.users.validate_user(object, actor));
        }
        if !ctx.params.skip_sharing {
            errors.extend(ctx.services.acl.verify_sharing(object, actor));
        }
        errors
    }
}

impl Check for SecurityCheck {
    fn id(&self) -> &str {
        check_ids::SECURITY
    }

    fn run(&self, slice: &mut TypeSlice<'_>, ctx: &mut ValidationContext<'_>) -> MetagateResult<TypeReport> {
        let mut report = TypeReport::new(slice.type_name.clone());
        let (persisted_op, new_op) = Operation::for_strategy(ctx.params.strategy);

        let lists = [(persisted_op, &*slice.persisted), (new_op, &*slice.non_persisted)];
        for (op, list) in lists {
            let Some(op) = op else {
                continue;
            };
            for (index, entry) in list.iter().enumerate() {
                let mut o = slice.object_report(index, entry);
                o.add_errors(Self::inspect(op, entry.object(), ctx));
                if !o.is_empty() {
                    tracing::debug!(
                        type_name = %slice.type_name,
                        index,
                        operation = ?op,
                        "object rejected by security"
                    );
                }
                ctx.reject(&mut report, entry.key(), o);
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use metagate_core::model::TypeName;
    use metagate_core::testing::{DataElement, MockAcl, MockUserDirectory, User, DATA_ELEMENT};

    use super::*;
    use crate::test_support::Harness;

    #[test]
    fn denied_create_skips_sharing_verification() {
        let mut h = Harness::new(ImportStrategy::Create);
        h.acl = MockAcl::default().deny_create(DATA_ELEMENT).sharing_violation("deAAAAAAAAA");
        h.add_new("deAAAAAAAAA");

        let (report, removed) = h.run(&SecurityCheck);
        assert_eq!(removed, 1);
        let errors = &report.object_reports[0].errors;
        assert_eq!(errors.len(), 1);
        assert_matches!(errors[0].code, ErrorCode::CreateDenied);
    }

    #[test]
    fn update_is_authorized_against_stored_counterpart() {
        let mut h = Harness::new(ImportStrategy::CreateAndUpdate);
        h.acl = MockAcl::default().deny_update("deStored001");
        h.add_stored("deStored001");
        h.add_new("deFresh0001");

        let (report, removed) = h.run(&SecurityCheck);
        assert_eq!(removed, 1);
        assert_eq!(report.object_reports[0].uid.as_deref(), Some("deStored001"));
        assert_matches!(report.object_reports[0].errors[0].code, ErrorCode::UpdateDenied);
    }

    #[test]
    fn delete_is_only_authorized() {
        let mut h = Harness::new(ImportStrategy::Delete);
        h.acl = MockAcl::default().deny_delete("deStored001").sharing_violation("deStored002");
        h.add_stored("deStored001");
        h.add_stored("deStored002");

        let (report, removed) = h.run(&SecurityCheck);
        assert_eq!(removed, 1);
        assert_matches!(report.object_reports[0].errors[0].code, ErrorCode::DeleteDenied);
        assert_eq!(report.object_reports[0].index, 0);
    }

    #[test]
    fn users_go_through_the_directory() {
        let mut h = Harness::new(ImportStrategy::Create);
        h.type_name = TypeName::new(types::USER);
        h.users = MockUserDirectory::default().reject("usBBBBBBBBB");
        h.new_object(User::new("usAAAAAAAAA", "alice"));
        h.new_object(User::new("usBBBBBBBBB", "bob"));

        let (report, removed) = h.run(&SecurityCheck);
        assert_eq!(removed, 1);
        assert_eq!(report.object_reports[0].index, 1);
        assert_matches!(report.object_reports[0].errors[0].code, ErrorCode::UserAccountInvalid);
    }

    #[test]
    fn user_findings_and_sharing_findings_are_both_reported() {
        let mut h = Harness::new(ImportStrategy::Create);
        h.type_name = TypeName::new(types::USER);
        h.users = MockUserDirectory::default().reject("usAAAAAAAAA");
        h.acl = MockAcl::default().sharing_violation("usAAAAAAAAA");
        h.new_object(User::new("usAAAAAAAAA", "alice"));

        let (report, removed) = h.run(&SecurityCheck);
        assert_eq!(removed, 1);
        let codes: Vec<ErrorCode> = report.object_reports[0].errors.iter().map(|e| e.code).collect();
        assert_eq!(codes, vec![ErrorCode::UserAccountInvalid, ErrorCode::SharingViolation]);
    }

    #[test]
    fn sharing_is_verified_unless_skipped() {
        for (skip, expected) in [(false, 1), (true, 0)] {
            let mut h = Harness::new(ImportStrategy::Create);
            h.params.skip_sharing = skip;
            h.acl = MockAcl::default().sharing_violation("deAAAAAAAAA");
            h.new_object(DataElement::new("deAAAAAAAAA", "ANC"));

            let (report, removed) = h.run(&SecurityCheck);
            assert_eq!(removed, expected);
            assert_eq!(report.error_counts().get(&ErrorCode::SharingViolation).copied().unwrap_or(0), expected);
        }
    }
}
