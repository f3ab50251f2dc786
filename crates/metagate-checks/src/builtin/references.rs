//! Reference integrity checks.
//!
//! - `references.owner`: references on the owning side of a relation must
//!   resolve through the preheat, which also knows the objects of the
//!   current batch. Unresolved collection members are dropped
//!   in place.
//! - `references.not_owner`: under `ErrorsNotOwner` reporting, the non-owning
//!   side of a relation must not carry data.

#![cfg(feature = "builtin")]

use anyhow::Result;

use metagate_core::bundle::ImportReportMode;
use metagate_core::model::schema::{Property, Schema, ATTRIBUTE_VALUES, USER_ACCESSES, USER_GROUP_ACCESSES};
use metagate_core::model::{types, MetadataObject, ObjectRef, TypeName};
use metagate_core::pipeline::{check_ids, Check, TypeSlice, ValidationContext};
use metagate_core::preheat::{Preheat, PreheatIdentifier};
use metagate_core::report::{ErrorCode, ErrorReport, ObjectReport, TypeReport};
use metagate_core::MetagateResult;

use crate::registry::CheckRegistry;
use crate::spec::CheckSpec;

/// Legacy creator property, exempt from both reference checks.
const USER_PROPERTY: &str = "user";

pub fn register(registry: &mut CheckRegistry) -> Result<()> {
    registry.register(
        CheckSpec::new(check_ids::OWNER_REFERENCES, "Owned references resolve").support_writes(),
        |_| Ok(Box::new(OwnerReferencesCheck) as Box<dyn Check>),
    )?;

    registry.register(
        CheckSpec::new(check_ids::NON_OWNER_REFERENCES, "Non-owning side is empty").support_writes(),
        |_| Ok(Box::new(NonOwnerReferencesCheck) as Box<dyn Check>),
    )?;

    Ok(())
}

/// Resolves owned references and repairs owned collections.
pub struct OwnerReferencesCheck;

struct Resolver<'p> {
    preheat: &'p Preheat,
    scheme: PreheatIdentifier,
}

impl Resolver<'_> {
    fn resolves(&self, reference: &ObjectRef) -> bool {
        self.resolves_with(self.scheme, reference)
    }

    fn resolves_with(&self, scheme: PreheatIdentifier, reference: &ObjectRef) -> bool {
        self.preheat.is_resolvable(scheme, reference)
    }
}

fn invalid_reference(
    object: &dyn MetadataObject,
    type_name: &TypeName,
    scheme: PreheatIdentifier,
    reference: &ObjectRef,
    property: &str,
) -> ErrorReport {
    ErrorReport::new(ErrorCode::InvalidReference, type_name.clone())
        .main_id_opt(object.uid())
        .property(property)
        .arg(scheme.identifiers_with_name(&reference.identity))
        .arg(reference.type_name.as_str())
        .arg(scheme.identifiers_with_name(object.identity()))
        .arg(property)
}

impl OwnerReferencesCheck {
    /// Collect findings for one object. Returns the owned collections that
    /// need rewriting, with the members to keep.
    fn inspect<'s>(
        object: &dyn MetadataObject,
        type_name: &TypeName,
        schema: &'s Schema,
        resolver: &Resolver<'_>,
        skip_sharing: bool,
        o: &mut ObjectReport,
    ) -> Vec<(&'s Property, Vec<ObjectRef>)> {
        let mut repairs = Vec::new();
        let scheme = resolver.scheme;

        let owned = schema
            .properties
            .iter()
            .filter(|p| p.persisted && p.owner && p.is_identifiable_reference());

        for property in owned {
            if skip_sharing && property.name == USER_PROPERTY {
                continue;
            }

            if property.is_collection() {
                let members = property.references(object);
                let (kept, missing): (Vec<ObjectRef>, Vec<ObjectRef>) =
                    members.into_iter().partition(|r| resolver.resolves(r));
                if missing.is_empty() {
                    continue;
                }
                for r in &missing {
                    o.add_error(invalid_reference(object, type_name, scheme, r, &property.name));
                }
                repairs.push((property, kept));
            } else if let Some(r) = property.reference_value(object) {
                if !resolver.resolves(&r) {
                    o.add_error(invalid_reference(object, type_name, scheme, &r, &property.name));
                }
            }
        }

        // Attribute and sharing targets are always referenced by uid.
        if schema.has_persisted_property(ATTRIBUTE_VALUES) {
            for av in object.attribute_values() {
                let r = ObjectRef::uid(types::ATTRIBUTE, av.attribute.as_str());
                if !resolver.resolves_with(PreheatIdentifier::Uid, &r) {
                    o.add_error(invalid_reference(object, type_name, PreheatIdentifier::Uid, &r, ATTRIBUTE_VALUES));
                }
            }
        }

        if !skip_sharing {
            if let Some(sharing) = object.sharing() {
                let grants = [
                    (USER_GROUP_ACCESSES, types::USER_GROUP, &sharing.user_group_accesses),
                    (USER_ACCESSES, types::USER, &sharing.user_accesses),
                ];
                for (property, target, entries) in grants {
                    if !schema.has_persisted_property(property) {
                        continue;
                    }
                    for entry in entries {
                        let r = ObjectRef::uid(target, entry.uid.as_str());
                        if !resolver.resolves_with(PreheatIdentifier::Uid, &r) {
                            o.add_error(invalid_reference(object, type_name, PreheatIdentifier::Uid, &r, property));
                        }
                    }
                }
            }
        }

        repairs
    }
}

impl Check for OwnerReferencesCheck {
    fn id(&self) -> &str {
        check_ids::OWNER_REFERENCES
    }

    fn run(&self, slice: &mut TypeSlice<'_>, ctx: &mut ValidationContext<'_>) -> MetagateResult<TypeReport> {
        let type_name = slice.type_name;
        let mut report = TypeReport::new(type_name.clone());
        let Some(schema) = ctx.schema_for(type_name) else {
            return Ok(report);
        };

        let skip_sharing = ctx.params.skip_sharing;
        let mut rejected = Vec::new();
        {
            let resolver = Resolver {
                preheat: &*ctx.preheat,
                scheme: ctx.params.identifier,
            };

            for (index, entry) in slice.select_mut(ctx.params.strategy) {
                let mut o = ObjectReport::new(type_name.clone(), index, entry.object().uid());
                let repairs = Self::inspect(entry.object(), type_name, schema, &resolver, skip_sharing, &mut o);

                for (property, kept) in repairs {
                    if !property.set_references(entry.object_mut(), kept) {
                        tracing::warn!(
                            type_name = %type_name,
                            property = %property.name,
                            "collection could not be rewritten"
                        );
                    }
                }

                if !o.is_empty() {
                    rejected.push((entry.key(), o));
                }
            }
        }

        for (key, o) in rejected {
            ctx.reject(&mut report, key, o);
        }
        Ok(report)
    }
}

/// Flags data on the non-owning side of relations.
pub struct NonOwnerReferencesCheck;

impl Check for NonOwnerReferencesCheck {
    fn id(&self) -> &str {
        check_ids::NON_OWNER_REFERENCES
    }

    fn run(&self, slice: &mut TypeSlice<'_>, ctx: &mut ValidationContext<'_>) -> MetagateResult<TypeReport> {
        let mut report = TypeReport::new(slice.type_name.clone());
        if ctx.params.report_mode != ImportReportMode::ErrorsNotOwner {
            return Ok(report);
        }
        let Some(schema) = ctx.schema_for(slice.type_name) else {
            return Ok(report);
        };

        let inverse: Vec<&Property> = schema
            .properties
            .iter()
            .filter(|p| !p.owner && p.writable && p.is_reference() && p.name != USER_PROPERTY)
            .collect();
        if inverse.is_empty() {
            return Ok(report);
        }

        for (index, entry) in slice.select(ctx.params.strategy) {
            let object = entry.object();
            let mut o = slice.object_report(index, entry);
            for property in inverse.iter().filter(|p| p.is_populated(object)) {
                o.add_error(
                    ErrorReport::new(ErrorCode::NonOwnerReferencePopulated, slice.type_name.clone())
                        .main_id_opt(object.uid())
                        .property(property.name.as_str())
                        .arg(property.name.as_str()),
                );
            }
            ctx.reject(&mut report, entry.key(), o);
        }

        Ok(report)
    }
}
