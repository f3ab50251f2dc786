//! Metadata object model.
//!
//! Metadata objects are heterogeneous (data elements, organisation units,
//! dashboards, users, ...). The pipeline never knows their concrete types; it
//! sees them through the `MetadataObject` trait plus the per-type descriptor
//! tables in `schema`. Concrete types live with the host application.
//!
//! Recommended imports:
//! - `use metagate_core::model::*;`
//! - or `use metagate_core::prelude::*;`

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod schema;

/// Well-known type names the pipeline treats specially.
pub mod types {
    pub const USER: &str = "User";
    pub const USER_CREDENTIALS: &str = "UserCredentials";
    pub const USER_GROUP: &str = "UserGroup";
    pub const ATTRIBUTE: &str = "Attribute";
}

/// Name of a metadata type, e.g. `DataElement`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeName(String);

impl TypeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is(&self, name: &str) -> bool {
        self.0 == name
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identifying fields shared by every metadata object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: Option<String>,
    pub code: Option<String>,
    pub name: Option<String>,
}

impl Identity {
    pub fn with_uid(uid: impl Into<String>) -> Self {
        Self {
            uid: Some(uid.into()),
            ..Self::default()
        }
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A reference from one object to another, as carried by an incoming object.
///
/// Only identifiers are known; the referenced object is resolved through the
/// preheat cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub type_name: TypeName,
    pub identity: Identity,
}

impl ObjectRef {
    pub fn new(type_name: impl Into<TypeName>, identity: Identity) -> Self {
        Self {
            type_name: type_name.into(),
            identity,
        }
    }

    pub fn uid(type_name: impl Into<TypeName>, uid: impl Into<String>) -> Self {
        Self::new(type_name, Identity::with_uid(uid))
    }
}

/// A value for a configurable attribute, attached to an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValue {
    /// Uid of the attribute definition.
    pub attribute: String,
    pub value: String,
}

impl AttributeValue {
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

/// A (locale, property, value) translation entry.
///
/// All fields are optional on the wire; incomplete entries are a finding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub locale: Option<String>,
    pub property: Option<String>,
    pub value: Option<String>,
}

impl Translation {
    pub fn new(locale: &str, property: &str, value: &str) -> Self {
        Self {
            locale: Some(locale.to_string()),
            property: Some(property.to_string()),
            value: Some(value.to_string()),
        }
    }
}

/// One sharing grant to a user or a user group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEntry {
    pub uid: String,
    pub access: String,
}

/// Sharing settings carried by an object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sharing {
    pub public_access: Option<String>,
    pub user_group_accesses: Vec<AccessEntry>,
    pub user_accesses: Vec<AccessEntry>,
}

/// Declared value type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    Text,
    LongText,
    Letter,
    Number,
    Integer,
    PositiveInteger,
    NegativeInteger,
    ZeroOrPositiveInteger,
    Boolean,
    TrueOnly,
    Date,
    Datetime,
    Email,
    PhoneNumber,
    Url,
    #[serde(rename = "GEOJSON")]
    GeoJson,
    File,
}

/// The identity on whose behalf a batch is imported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub uid: String,
    pub username: String,
    pub super_user: bool,
    pub authorities: BTreeSet<String>,
}

impl Actor {
    pub fn new(uid: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            username: username.into(),
            ..Self::default()
        }
    }

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authorities.insert(authority.into());
        self
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.super_user || self.authorities.contains(authority)
    }
}

/// A metadata object as seen by the validation pipeline.
///
/// Implementors expose their common identifiable fields directly; every other
/// property is reached through the descriptor table registered for their type
/// (see `schema::Schema`), which downcasts through `as_any`.
pub trait MetadataObject: Any + fmt::Debug {
    fn type_name(&self) -> TypeName;

    fn identity(&self) -> &Identity;

    fn attribute_values(&self) -> &[AttributeValue] {
        &[]
    }

    fn translations(&self) -> &[Translation] {
        &[]
    }

    fn sharing(&self) -> Option<&Sharing> {
        None
    }

    /// A nested object that carries unique properties of its own (user
    /// credentials on a user).
    fn embedded(&self) -> Option<&dyn MetadataObject> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn uid(&self) -> Option<&str> {
        self.identity().uid.as_deref()
    }

    fn is_type(&self, name: &str) -> bool {
        self.type_name().is(name)
    }
}

/// Downcast a metadata object to its concrete type.
pub fn downcast_ref<T: MetadataObject>(object: &dyn MetadataObject) -> Option<&T> {
    object.as_any().downcast_ref::<T>()
}

/// Mutable counterpart of `downcast_ref`.
pub fn downcast_mut<T: MetadataObject>(object: &mut dyn MetadataObject) -> Option<&mut T> {
    object.as_any_mut().downcast_mut::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_type_wire_names() {
        let v = serde_json::to_string(&ValueType::GeoJson).unwrap();
        assert_eq!(v, "\"GEOJSON\"");
        let v = serde_json::to_string(&ValueType::ZeroOrPositiveInteger).unwrap();
        assert_eq!(v, "\"ZERO_OR_POSITIVE_INTEGER\"");
    }

    #[test]
    fn super_user_has_every_authority() {
        let mut actor = Actor::new("u1", "admin");
        assert!(!actor.has_authority("F_DATAELEMENT_PUBLIC_ADD"));
        actor.super_user = true;
        assert!(actor.has_authority("F_DATAELEMENT_PUBLIC_ADD"));
    }
}
