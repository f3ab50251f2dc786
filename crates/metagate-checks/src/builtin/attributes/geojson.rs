//! GeoJSON attribute values.
//!
//! Values of attributes declared `GEOJSON` must parse as a geometry with
//! coordinates. Collections and features are not accepted as an attribute
//! value's top-level shape.

#![cfg(feature = "builtin")]

use serde::de::IgnoredAny;
use serde::Deserialize;

use metagate_core::model::schema::ATTRIBUTE_VALUES;
use metagate_core::model::ValueType;
use metagate_core::pipeline::{check_ids, Check, TypeSlice, ValidationContext};
use metagate_core::report::{ErrorCode, ErrorReport, TypeReport};
use metagate_core::MetagateResult;

type Position = Vec<f64>;

/// Top-level GeoJSON objects, tagged by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum GeoJson {
    Point {
        coordinates: Option<Position>,
    },
    MultiPoint {
        coordinates: Option<Vec<Position>>,
    },
    LineString {
        coordinates: Option<Vec<Position>>,
    },
    MultiLineString {
        coordinates: Option<Vec<Vec<Position>>>,
    },
    Polygon {
        coordinates: Option<Vec<Vec<Position>>>,
    },
    MultiPolygon {
        coordinates: Option<Vec<Vec<Vec<Position>>>>,
    },
    GeometryCollection(IgnoredAny),
    Feature(IgnoredAny),
    FeatureCollection(IgnoredAny),
}

fn non_empty<T>(coordinates: &Option<Vec<T>>) -> bool {
    coordinates.as_ref().map(|c| !c.is_empty()).unwrap_or(false)
}

/// Validate one attribute value. Returns the finding code, if any.
pub fn validate_geojson(text: &str) -> Option<ErrorCode> {
    let parsed: GeoJson = match serde_json::from_str(text) {
        Ok(g) => g,
        Err(_) => return Some(ErrorCode::InvalidGeoJson),
    };

    let has_coordinates = match &parsed {
        GeoJson::Point { coordinates } => coordinates.is_some(),
        GeoJson::MultiPoint { coordinates } => non_empty(coordinates),
        GeoJson::LineString { coordinates } => non_empty(coordinates),
        GeoJson::MultiLineString { coordinates } => non_empty(coordinates),
        GeoJson::Polygon { coordinates } => non_empty(coordinates),
        GeoJson::MultiPolygon { coordinates } => non_empty(coordinates),
        GeoJson::GeometryCollection(_) | GeoJson::Feature(_) | GeoJson::FeatureCollection(_) => {
            return Some(ErrorCode::UnsupportedGeoJsonShape)
        }
    };

    if has_coordinates {
        None
    } else {
        Some(ErrorCode::InvalidGeoJson)
    }
}

/// Checks values of attributes whose declared value type is GeoJSON.
pub struct GeoJsonAttributesCheck;

impl Check for GeoJsonAttributesCheck {
    fn id(&self) -> &str {
        check_ids::GEOJSON_ATTRIBUTES
    }

    fn run(&self, slice: &mut TypeSlice<'_>, ctx: &mut ValidationContext<'_>) -> MetagateResult<TypeReport> {
        let mut report = TypeReport::new(slice.type_name.clone());
        let Some(types) = ctx.preheat.attribute_types(slice.type_name) else {
            return Ok(report);
        };
        let geo: Vec<String> = types
            .iter()
            .filter(|(_, vt)| **vt == ValueType::GeoJson)
            .map(|(id, _)| id.clone())
            .collect();
        if geo.is_empty() {
            return Ok(report);
        }

        for (index, entry) in slice.select(ctx.params.strategy) {
            let object = entry.object();
            let mut o = slice.object_report(index, entry);

            for av in object.attribute_values().iter().filter(|av| geo.contains(&av.attribute)) {
                if let Some(code) = validate_geojson(&av.value) {
                    o.add_error(
                        ErrorReport::new(code, slice.type_name.clone())
                            .main_id_opt(object.uid())
                            .property(ATTRIBUTE_VALUES)
                            .arg(av.attribute.as_str()),
                    );
                }
            }
            ctx.reject(&mut report, entry.key(), o);
        }

        Ok(report)
    }
}
