//! Uniqueness checks.
//!
//! Three flavours share one discipline: the first object to claim a value
//! owns it, any later claimant with a different identifier is flagged.
//! - `uniqueness.property`: unique scalar properties, against stored data and
//!   earlier objects of the batch (owner map in the preheat)
//! - `uniqueness.attribute`: values of attributes configured as unique
//! - `uniqueness.unique_key`: composite keys, within the new objects only

#![cfg(feature = "builtin")]

use std::collections::BTreeMap;

use anyhow::Result;
use itertools::Itertools;

use metagate_core::bundle::ImportStrategy;
use metagate_core::model::{types, MetadataObject};
use metagate_core::pipeline::{check_ids, Check, TypeSlice, ValidationContext};
use metagate_core::preheat::{Preheat, UniqueKeyMember};
use metagate_core::report::{ErrorCode, ErrorReport, ObjectReport, TypeReport};
use metagate_core::MetagateResult;

use crate::registry::CheckRegistry;
use crate::spec::CheckSpec;

pub fn register(registry: &mut CheckRegistry) -> Result<()> {
    registry.register(
        CheckSpec::new(check_ids::UNIQUE_PROPERTY, "Unique properties").support_writes(),
        |_| Ok(Box::new(UniquePropertyCheck) as Box<dyn Check>),
    )?;

    registry.register(
        CheckSpec::new(check_ids::UNIQUE_KEY, "Composite unique keys")
            .support(ImportStrategy::Create)
            .support(ImportStrategy::CreateAndUpdate),
        |_| Ok(Box::new(UniqueKeyCheck) as Box<dyn Check>),
    )?;

    registry.register(
        CheckSpec::new(check_ids::UNIQUE_ATTRIBUTES, "Unique attribute values").support_writes(),
        |_| Ok(Box::new(UniqueAttributesCheck) as Box<dyn Check>),
    )?;

    Ok(())
}

/// Unique scalar properties must not collide with stored objects or with
/// earlier objects of the batch. A user's embedded credentials are checked
/// as well.
pub struct UniquePropertyCheck;

impl UniquePropertyCheck {
    fn check_object(object: &dyn MetadataObject, ctx: &mut ValidationContext<'_>) -> Vec<ErrorReport> {
        let mut errors = Vec::new();
        let type_name = object.type_name();
        let Some(schema) = ctx.schema_for(&type_name) else {
            return errors;
        };

        let identifier = ctx.preheat.identifier();
        let owner = identifier.identifier(object.identity());

        for property in schema.unique_properties() {
            let Some(value) = property.value(object) else {
                continue;
            };

            let existing = ctx.preheat.unique_value_owner(&type_name, &property.name, &value).cloned();
            match existing {
                Some(existing) if Some(existing.as_str()) != owner => {
                    errors.push(
                        ErrorReport::new(ErrorCode::UniquePropertyTaken, type_name.clone())
                            .main_id_opt(owner)
                            .property(property.name.as_str())
                            .arg(property.name.as_str())
                            .arg(value.as_str())
                            .arg(existing.as_str()),
                    );
                }
                _ => {
                    if let Some(owner) = owner {
                        ctx.preheat.set_unique_value_owner(&type_name, &property.name, &value, owner);
                    }
                }
            }
        }

        errors
    }
}

impl Check for UniquePropertyCheck {
    fn id(&self) -> &str {
        check_ids::UNIQUE_PROPERTY
    }

    fn run(&self, slice: &mut TypeSlice<'_>, ctx: &mut ValidationContext<'_>) -> MetagateResult<TypeReport> {
        let mut report = TypeReport::new(slice.type_name.clone());

        for (index, entry) in slice.select(ctx.params.strategy) {
            let object = entry.object();
            if ctx.preheat.is_default(object) {
                continue;
            }

            let mut errors = Self::check_object(object, ctx);
            if object.is_type(types::USER) {
                if let Some(credentials) = object.embedded() {
                    errors.extend(Self::check_object(credentials, ctx));
                }
            }

            let mut o = slice.object_report(index, entry);
            o.add_errors(errors);
            ctx.reject(&mut report, entry.key(), o);
        }

        Ok(report)
    }
}

/// Values of unique attributes follow the same owner discipline, per
/// attribute id.
pub struct UniqueAttributesCheck;

impl Check for UniqueAttributesCheck {
    fn id(&self) -> &str {
        check_ids::UNIQUE_ATTRIBUTES
    }

    fn run(&self, slice: &mut TypeSlice<'_>, ctx: &mut ValidationContext<'_>) -> MetagateResult<TypeReport> {
        let mut report = TypeReport::new(slice.type_name.clone());
        let Some(unique) = ctx.preheat.unique_attributes(slice.type_name).cloned() else {
            return Ok(report);
        };

        for (index, entry) in slice.select(ctx.params.strategy) {
            let object = entry.object();
            if ctx.preheat.is_default(object) {
                continue;
            }

            let owner = object.uid();
            let mut o = slice.object_report(index, entry);

            for av in object.attribute_values() {
                if !unique.contains(&av.attribute) {
                    continue;
                }
                if let Some(existing) = claim(ctx.preheat, slice, &av.attribute, &av.value, owner) {
                    o.add_error(
                        ErrorReport::new(ErrorCode::UniqueAttributeTaken, slice.type_name.clone())
                            .main_id_opt(owner)
                            .property("attributeValues")
                            .arg(av.attribute.as_str())
                            .arg(av.value.as_str())
                            .arg(existing),
                    );
                }
            }

            ctx.reject(&mut report, entry.key(), o);
        }

        Ok(report)
    }
}

/// Claim an attribute value for `owner`. Returns the current owner if it is
/// someone else.
fn claim(
    preheat: &mut Preheat,
    slice: &TypeSlice<'_>,
    attribute: &str,
    value: &str,
    owner: Option<&str>,
) -> Option<String> {
    match preheat.unique_attribute_owner(slice.type_name, attribute, value).cloned() {
        Some(existing) if Some(existing.as_str()) != owner => Some(existing),
        _ => {
            if let Some(owner) = owner {
                preheat.set_unique_attribute_owner(slice.type_name, attribute, value, owner);
            }
            None
        }
    }
}

/// Composite keys must be unique among the new objects of the batch.
///
/// Stored objects are not consulted. Every member of a colliding group is
/// flagged. Tuples with an unset member do not take part.
pub struct UniqueKeyCheck;

impl Check for UniqueKeyCheck {
    fn id(&self) -> &str {
        check_ids::UNIQUE_KEY
    }

    fn run(&self, slice: &mut TypeSlice<'_>, ctx: &mut ValidationContext<'_>) -> MetagateResult<TypeReport> {
        let mut report = TypeReport::new(slice.type_name.clone());
        let Some(schema) = ctx.schema_for(slice.type_name) else {
            return Ok(report);
        };
        if schema.unique_keys.is_empty() {
            return Ok(report);
        }

        let groups = ctx.preheat.reset_unique_key_groups(slice.type_name);
        for (index, entry) in slice.non_persisted.iter().enumerate() {
            for (key_index, key) in schema.unique_keys.iter().enumerate() {
                let values = schema.unique_key_values(key, entry.object());
                if values.iter().any(Option::is_none) {
                    continue;
                }
                groups.entry((key_index, values)).or_default().push(UniqueKeyMember {
                    index,
                    uid: entry.object().uid().map(str::to_string),
                });
            }
        }

        let mut flagged: BTreeMap<usize, ObjectReport> = BTreeMap::new();
        for ((key_index, values), members) in groups.iter() {
            if members.len() < 2 {
                continue;
            }
            let key = &schema.unique_keys[*key_index];
            let properties = key.properties.iter().join(", ");
            let tuple = values.iter().flatten().join(", ");

            for member in members {
                let entry = &slice.non_persisted[member.index];
                let others = members
                    .iter()
                    .filter(|m| m.index != member.index)
                    .map(|m| m.uid.as_deref().unwrap_or("null"))
                    .join(", ");

                flagged
                    .entry(member.index)
                    .or_insert_with(|| slice.object_report(member.index, entry))
                    .add_error(
                        ErrorReport::new(ErrorCode::UniqueKeyViolation, slice.type_name.clone())
                            .main_id_opt(member.uid.as_deref())
                            .arg(properties.as_str())
                            .arg(tuple.as_str())
                            .arg(others),
                    );
            }
        }

        for (index, o) in flagged {
            let key = slice.non_persisted[index].key();
            ctx.reject(&mut report, key, o);
        }

        Ok(report)
    }
}
