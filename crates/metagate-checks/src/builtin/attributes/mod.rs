//! Attribute checks.
//!
//! Attributes are configurable, per-type extra fields. The preheat knows
//! which attributes are assigned to a type, their declared value types and
//! which of them are mandatory.

#![cfg(feature = "builtin")]

pub mod geojson;

use std::collections::BTreeSet;

use anyhow::Result;

use metagate_core::model::schema::ATTRIBUTE_VALUES;
use metagate_core::pipeline::{check_ids, Check, TypeSlice, ValidationContext};
use metagate_core::report::{ErrorCode, ErrorReport, TypeReport};
use metagate_core::MetagateResult;

use crate::registry::CheckRegistry;
use crate::spec::CheckSpec;

pub use self::geojson::GeoJsonAttributesCheck;

pub fn register(registry: &mut CheckRegistry) -> Result<()> {
    registry.register(
        CheckSpec::new(check_ids::MANDATORY_ATTRIBUTES, "Mandatory attributes").support_writes(),
        |_| Ok(Box::new(MandatoryAttributesCheck) as Box<dyn Check>),
    )?;

    registry.register(
        CheckSpec::new(check_ids::METADATA_ATTRIBUTES, "Attribute assignment and value types").support_writes(),
        |_| Ok(Box::new(MetadataAttributeCheck) as Box<dyn Check>),
    )?;

    registry.register(
        CheckSpec::new(check_ids::GEOJSON_ATTRIBUTES, "GeoJSON attribute values").support_writes(),
        |_| Ok(Box::new(GeoJsonAttributesCheck) as Box<dyn Check>),
    )?;

    Ok(())
}

/// Every mandatory attribute of the type must carry a non-blank value.
pub struct MandatoryAttributesCheck;

impl Check for MandatoryAttributesCheck {
    fn id(&self) -> &str {
        check_ids::MANDATORY_ATTRIBUTES
    }

    fn run(&self, slice: &mut TypeSlice<'_>, ctx: &mut ValidationContext<'_>) -> MetagateResult<TypeReport> {
        let mut report = TypeReport::new(slice.type_name.clone());
        let Some(mandatory) = ctx.preheat.mandatory_attributes(slice.type_name).cloned() else {
            return Ok(report);
        };

        for (index, entry) in slice.select(ctx.params.strategy) {
            let object = entry.object();
            if ctx.preheat.is_default(object) {
                continue;
            }

            let present: BTreeSet<&str> = object
                .attribute_values()
                .iter()
                .filter(|av| !av.value.trim().is_empty())
                .map(|av| av.attribute.as_str())
                .collect();

            let mut o = slice.object_report(index, entry);
            for attribute in mandatory.iter().filter(|a| !present.contains(a.as_str())) {
                o.add_error(
                    ErrorReport::new(ErrorCode::MandatoryAttributeMissing, slice.type_name.clone())
                        .main_id_opt(object.uid())
                        .property(ATTRIBUTE_VALUES)
                        .arg(attribute.as_str())
                        .arg(slice.type_name.as_str()),
                );
            }
            ctx.reject(&mut report, entry.key(), o);
        }

        Ok(report)
    }
}

/// Attribute values must belong to attributes assigned to the type and match
/// their declared value type.
pub struct MetadataAttributeCheck;

impl Check for MetadataAttributeCheck {
    fn id(&self) -> &str {
        check_ids::METADATA_ATTRIBUTES
    }

    fn run(&self, slice: &mut TypeSlice<'_>, ctx: &mut ValidationContext<'_>) -> MetagateResult<TypeReport> {
        let mut report = TypeReport::new(slice.type_name.clone());
        let assigned = ctx.preheat.attribute_types(slice.type_name).cloned().unwrap_or_default();
        let validator = ctx.services.value_types;

        for (index, entry) in slice.select(ctx.params.strategy) {
            let object = entry.object();
            if object.attribute_values().is_empty() {
                continue;
            }

            let mut o = slice.object_report(index, entry);
            for av in object.attribute_values() {
                match assigned.get(&av.attribute) {
                    None => o.add_error(
                        ErrorReport::new(ErrorCode::AttributeNotAssigned, slice.type_name.clone())
                            .main_id_opt(object.uid())
                            .property(ATTRIBUTE_VALUES)
                            .arg(av.attribute.as_str())
                            .arg(slice.type_name.as_str()),
                    ),
                    Some(value_type) => {
                        validator.validate(slice.type_name, *value_type, &av.value, &mut |e: ErrorReport| {
                            o.add_error(e.main_id_opt(object.uid()))
                        });
                    }
                }
            }
            ctx.reject(&mut report, entry.key(), o);
        }

        Ok(report)
    }
}
