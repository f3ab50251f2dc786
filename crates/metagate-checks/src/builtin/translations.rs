//! Translation entries carried by incoming objects.

#![cfg(feature = "builtin")]

use std::collections::BTreeSet;

use anyhow::Result;

use metagate_core::model::schema::TRANSLATIONS;
use metagate_core::model::{MetadataObject, TypeName};
use metagate_core::pipeline::{check_ids, Check, TypeSlice, ValidationContext};
use metagate_core::report::{ErrorCode, ErrorReport, TypeReport};
use metagate_core::MetagateResult;

use crate::registry::CheckRegistry;
use crate::spec::CheckSpec;

pub fn register(registry: &mut CheckRegistry) -> Result<()> {
    registry.register(
        CheckSpec::new(check_ids::TRANSLATIONS, "Translations").support_writes(),
        |_| Ok(Box::new(TranslationsCheck) as Box<dyn Check>),
    )
}

/// Translations must target a translatable type, be complete and not repeat
/// a (property, locale) pair.
///
/// All findings for an object are collected before the object is rejected.
pub struct TranslationsCheck;

impl TranslationsCheck {
    fn findings(object: &dyn MetadataObject, type_name: &TypeName, translatable: bool) -> Vec<ErrorReport> {
        let uid = object.uid();
        let error = |code: ErrorCode| ErrorReport::new(code, type_name.clone()).main_id_opt(uid);

        if !translatable {
            return vec![error(ErrorCode::TypeNotTranslatable)
                .property(TRANSLATIONS)
                .arg(type_name.as_str())];
        }

        let mut errors = Vec::new();
        let mut seen: BTreeSet<(&str, &str)> = BTreeSet::new();

        for t in object.translations() {
            let missing = [
                ("locale", t.locale.is_none()),
                ("property", t.property.is_none()),
                ("value", t.value.is_none()),
            ];
            for (field, absent) in missing {
                if absent {
                    errors.push(error(ErrorCode::MissingRequiredProperty).property(field).arg(field));
                }
            }

            if let (Some(property), Some(locale)) = (t.property.as_deref(), t.locale.as_deref()) {
                if !seen.insert((property, locale)) {
                    errors.push(
                        error(ErrorCode::DuplicateTranslation)
                            .property(TRANSLATIONS)
                            .arg(property)
                            .arg(locale),
                    );
                }
            }
        }

        errors
    }
}

impl Check for TranslationsCheck {
    fn id(&self) -> &str {
        check_ids::TRANSLATIONS
    }

    fn run(&self, slice: &mut TypeSlice<'_>, ctx: &mut ValidationContext<'_>) -> MetagateResult<TypeReport> {
        let mut report = TypeReport::new(slice.type_name.clone());
        let translatable = ctx.schema_for(slice.type_name).map(|s| s.translatable).unwrap_or(false);

        for (index, entry) in slice.select(ctx.params.strategy) {
            let object = entry.object();
            if object.translations().is_empty() {
                continue;
            }

            let mut o = slice.object_report(index, entry);
            o.add_errors(Self::findings(object, slice.type_name, translatable));
            ctx.reject(&mut report, entry.key(), o);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use metagate_core::bundle::ImportStrategy;
    use metagate_core::model::Translation;
    use metagate_core::testing::{DataElement, Stub, CATEGORY_COMBO};

    use super::*;
    use crate::test_support::Harness;

    #[test]
    fn complete_distinct_translations_pass() {
        let mut h = Harness::new(ImportStrategy::Create);
        h.new_object(
            DataElement::new("deAAAAAAAAA", "ANC")
                .translation(Translation::new("fr", "name", "CPN"))
                .translation(Translation::new("es", "name", "CPN")),
        );

        let (report, removed) = h.run(&TranslationsCheck);
        assert!(report.object_reports.is_empty());
        assert_eq!(removed, 0);
    }

    #[test]
    fn incomplete_and_duplicate_entries_are_reported_together() {
        let mut h = Harness::new(ImportStrategy::Create);
        let incomplete = Translation {
            locale: Some("fr".to_string()),
            property: None,
            value: None,
        };
        h.new_object(
            DataElement::new("deAAAAAAAAA", "ANC")
                .translation(Translation::new("fr", "name", "CPN"))
                .translation(Translation::new("fr", "name", "CPN 1"))
                .translation(incomplete),
        );

        let (report, removed) = h.run(&TranslationsCheck);
        assert_eq!(removed, 1);
        assert_eq!(report.object_reports.len(), 1);

        let codes: Vec<ErrorCode> = report.object_reports[0].errors.iter().map(|e| e.code).collect();
        assert_eq!(
            codes,
            vec![
                ErrorCode::DuplicateTranslation,
                ErrorCode::MissingRequiredProperty,
                ErrorCode::MissingRequiredProperty,
            ]
        );
    }

    #[test]
    fn untranslatable_type_rejects_whole_object() {
        let mut h = Harness::new(ImportStrategy::Create);
        h.type_name = TypeName::new(CATEGORY_COMBO);
        h.new_object(TranslatedStub(Stub::new(CATEGORY_COMBO, "ccAAAAAAAAA"), vec![Translation::new("fr", "name", "x")]));

        let (report, removed) = h.run(&TranslationsCheck);
        assert_eq!(removed, 1);
        assert_eq!(report.object_reports[0].errors.len(), 1);
        assert_matches!(report.object_reports[0].errors[0].code, ErrorCode::TypeNotTranslatable);
    }

    #[derive(Debug)]
    struct TranslatedStub(Stub, Vec<Translation>);

    impl MetadataObject for TranslatedStub {
        fn type_name(&self) -> TypeName {
            self.0.type_name()
        }
        fn identity(&self) -> &metagate_core::model::Identity {
            self.0.identity()
        }
        fn translations(&self) -> &[Translation] {
            &self.1
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    }
}
