//! Fixture metadata types and mock collaborators.
//!
//! Enabled with the `testing` feature. Downstream crates use these to drive
//! the pipeline in their own tests without a real schema or ACL engine.

use std::any::Any;
use std::collections::BTreeSet;

use crate::model::schema::{Property, Schema, SchemaRegistry, ATTRIBUTE_VALUES, USER_ACCESSES, USER_GROUP_ACCESSES};
use crate::model::{
    types, Actor, AttributeValue, Identity, MetadataObject, ObjectRef, Sharing, Translation, TypeName,
};
use crate::services::{AclService, UserDirectory};
use crate::report::{ErrorCode, ErrorReport};

pub const DATA_ELEMENT: &str = "DataElement";
pub const CATEGORY_COMBO: &str = "CategoryCombo";
pub const DATA_SET: &str = "DataSet";
pub const DATA_ELEMENT_GROUP: &str = "DataElementGroup";

/// A data element with one of each property shape.
#[derive(Debug, Clone, Default)]
pub struct DataElement {
    pub identity: Identity,
    pub short_name: Option<String>,
    pub form_name: Option<String>,
    pub domain_type: Option<String>,
    pub category_combo: Option<ObjectRef>,
    pub data_sets: Vec<ObjectRef>,
    pub groups: Vec<ObjectRef>,
    pub user: Option<ObjectRef>,
    pub attribute_values: Vec<AttributeValue>,
    pub translations: Vec<Translation>,
    pub sharing: Sharing,
}

impl DataElement {
    pub fn new(uid: &str, name: &str) -> Self {
        Self {
            identity: Identity::with_uid(uid).name(name),
            short_name: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn code(mut self, code: &str) -> Self {
        self.identity.code = Some(code.to_string());
        self
    }

    pub fn short_name(mut self, short_name: &str) -> Self {
        self.short_name = Some(short_name.to_string());
        self
    }

    pub fn form(mut self, form_name: &str, domain_type: &str) -> Self {
        self.form_name = Some(form_name.to_string());
        self.domain_type = Some(domain_type.to_string());
        self
    }

    pub fn category_combo(mut self, uid: &str) -> Self {
        self.category_combo = Some(ObjectRef::uid(CATEGORY_COMBO, uid));
        self
    }

    pub fn data_set(mut self, uid: &str) -> Self {
        self.data_sets.push(ObjectRef::uid(DATA_SET, uid));
        self
    }

    pub fn group(mut self, uid: &str) -> Self {
        self.groups.push(ObjectRef::uid(DATA_ELEMENT_GROUP, uid));
        self
    }

    pub fn user(mut self, uid: &str) -> Self {
        self.user = Some(ObjectRef::uid(types::USER, uid));
        self
    }

    pub fn attribute(mut self, attribute: &str, value: &str) -> Self {
        self.attribute_values.push(AttributeValue::new(attribute, value));
        self
    }

    pub fn translation(mut self, translation: Translation) -> Self {
        self.translations.push(translation);
        self
    }

    pub fn user_group_access(mut self, uid: &str) -> Self {
        self.sharing.user_group_accesses.push(crate::model::AccessEntry {
            uid: uid.to_string(),
            access: "rw------".to_string(),
        });
        self
    }
}

impl MetadataObject for DataElement {
    fn type_name(&self) -> TypeName {
        TypeName::new(DATA_ELEMENT)
    }

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn attribute_values(&self) -> &[AttributeValue] {
        &self.attribute_values
    }

    fn translations(&self) -> &[Translation] {
        &self.translations
    }

    fn sharing(&self) -> Option<&Sharing> {
        Some(&self.sharing)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Login details embedded in a `User`.
#[derive(Debug, Clone, Default)]
pub struct UserCredentials {
    pub identity: Identity,
    pub username: Option<String>,
}

impl MetadataObject for UserCredentials {
    fn type_name(&self) -> TypeName {
        TypeName::new(types::USER_CREDENTIALS)
    }

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct User {
    pub identity: Identity,
    pub email: Option<String>,
    pub credentials: UserCredentials,
}

impl User {
    pub fn new(uid: &str, username: &str) -> Self {
        Self {
            identity: Identity::with_uid(uid).name(username),
            email: None,
            credentials: UserCredentials {
                identity: Identity::with_uid(uid),
                username: Some(username.to_string()),
            },
        }
    }

    pub fn email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }
}

impl MetadataObject for User {
    fn type_name(&self) -> TypeName {
        TypeName::new(types::USER)
    }

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn embedded(&self) -> Option<&dyn MetadataObject> {
        Some(&self.credentials)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// An identifiable object of any type with no other properties.
///
/// Stands in for reference targets (category combos, data sets, attributes,
/// user groups).
#[derive(Debug, Clone)]
pub struct Stub {
    pub type_name: TypeName,
    pub identity: Identity,
}

impl Stub {
    pub fn new(type_name: &str, uid: &str) -> Self {
        Self {
            type_name: TypeName::new(type_name),
            identity: Identity::with_uid(uid),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.identity.name = Some(name.to_string());
        self
    }
}

impl MetadataObject for Stub {
    fn type_name(&self) -> TypeName {
        self.type_name.clone()
    }

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The system default category combo.
pub fn default_category_combo() -> Stub {
    Stub::new(CATEGORY_COMBO, "bjDvmb4bfuf").named("default")
}

/// Descriptor tables for the fixture types.
pub fn fixture_schemas() -> SchemaRegistry {
    let data_element = Schema::new(DATA_ELEMENT)
        .with_property(Property::simple("code", |d: &DataElement| d.identity.code.clone()).unique())
        .with_property(Property::simple("name", |d: &DataElement| d.identity.name.clone()))
        .with_property(Property::simple("shortName", |d: &DataElement| d.short_name.clone()).unique())
        .with_property(Property::simple("formName", |d: &DataElement| d.form_name.clone()))
        .with_property(Property::simple("domainType", |d: &DataElement| d.domain_type.clone()))
        .with_property(Property::reference("categoryCombo", CATEGORY_COMBO, |d: &DataElement| {
            d.category_combo.clone()
        }))
        .with_property(Property::collection(
            "dataSets",
            DATA_SET,
            |d: &DataElement| d.data_sets.clone(),
            |d: &mut DataElement, refs| d.data_sets = refs,
        ))
        .with_property(
            Property::collection(
                "groups",
                DATA_ELEMENT_GROUP,
                |d: &DataElement| d.groups.clone(),
                |d: &mut DataElement, refs| d.groups = refs,
            )
            .not_owner(),
        )
        .with_property(Property::reference("user", types::USER, |d: &DataElement| d.user.clone()))
        .with_property(Property::intrinsic(ATTRIBUTE_VALUES))
        .with_property(Property::intrinsic(USER_GROUP_ACCESSES))
        .with_property(Property::intrinsic(USER_ACCESSES))
        .with_unique_key(&["formName", "domainType"])
        .translatable(true);

    let user = Schema::new(types::USER)
        .with_property(Property::simple("email", |u: &User| u.email.clone()));

    let credentials = Schema::new(types::USER_CREDENTIALS)
        .with_property(Property::simple("username", |c: &UserCredentials| c.username.clone()).unique());

    let category_combo = Schema::new(CATEGORY_COMBO)
        .with_property(Property::simple("code", |s: &Stub| s.identity.code.clone()).unique());

    let mut registry = SchemaRegistry::new();
    for schema in [data_element, user, credentials, category_combo] {
        registry.register(schema).expect("fixture schema is consistent");
    }
    registry
}

pub fn admin() -> Actor {
    Actor::new("M5zQapPyTZI", "admin")
}

/// ACL with explicit deny lists; everything else is allowed.
#[derive(Debug, Clone, Default)]
pub struct MockAcl {
    pub deny_create: BTreeSet<TypeName>,
    pub deny_update: BTreeSet<String>,
    pub deny_delete: BTreeSet<String>,
    pub sharing_violations: BTreeSet<String>,
}

impl MockAcl {
    pub fn deny_create(mut self, type_name: &str) -> Self {
        self.deny_create.insert(TypeName::new(type_name));
        self
    }

    pub fn deny_update(mut self, uid: &str) -> Self {
        self.deny_update.insert(uid.to_string());
        self
    }

    pub fn deny_delete(mut self, uid: &str) -> Self {
        self.deny_delete.insert(uid.to_string());
        self
    }

    /// Report a sharing violation for the object with this uid.
    pub fn sharing_violation(mut self, uid: &str) -> Self {
        self.sharing_violations.insert(uid.to_string());
        self
    }

    fn denied(list: &BTreeSet<String>, object: &dyn MetadataObject) -> bool {
        object.uid().map(|uid| list.contains(uid)).unwrap_or(false)
    }
}

impl AclService for MockAcl {
    fn can_create(&self, _actor: &Actor, type_name: &TypeName) -> bool {
        !self.deny_create.contains(type_name)
    }

    fn can_update(&self, _actor: &Actor, stored: &dyn MetadataObject) -> bool {
        !Self::denied(&self.deny_update, stored)
    }

    fn can_delete(&self, _actor: &Actor, stored: &dyn MetadataObject) -> bool {
        !Self::denied(&self.deny_delete, stored)
    }

    fn verify_sharing(&self, object: &dyn MetadataObject, _actor: &Actor) -> Vec<ErrorReport> {
        if !Self::denied(&self.sharing_violations, object) {
            return Vec::new();
        }
        vec![ErrorReport::new(ErrorCode::SharingViolation, object.type_name()).main_id_opt(object.uid())]
    }
}

/// User directory that rejects a fixed set of uids.
#[derive(Debug, Clone, Default)]
pub struct MockUserDirectory {
    pub invalid: BTreeSet<String>,
}

impl MockUserDirectory {
    pub fn reject(mut self, uid: &str) -> Self {
        self.invalid.insert(uid.to_string());
        self
    }
}

impl UserDirectory for MockUserDirectory {
    fn validate_user(&self, candidate: &dyn MetadataObject, _actor: &Actor) -> Vec<ErrorReport> {
        match candidate.uid() {
            Some(uid) if self.invalid.contains(uid) => {
                vec![ErrorReport::new(ErrorCode::UserAccountInvalid, candidate.type_name()).main_id(uid)]
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::schema::SchemaIntrospector;

    #[test]
    fn fixture_schemas_register_cleanly() {
        let registry = fixture_schemas();
        assert_eq!(registry.len(), 4);

        let schema = registry.schema_for(&TypeName::new(DATA_ELEMENT)).unwrap();
        let unique: Vec<&str> = schema.unique_properties().map(|p| p.name.as_str()).collect();
        assert_eq!(unique, vec!["code", "shortName"]);
    }

    #[test]
    fn mock_acl_denies_listed_objects() {
        let acl = MockAcl::default().deny_update("deUpdate001").deny_create(DATA_ELEMENT);
        let de = DataElement::new("deUpdate001", "ANC");
        assert!(!acl.can_update(&admin(), &de));
        assert!(acl.can_delete(&admin(), &de));
        assert!(!acl.can_create(&admin(), &TypeName::new(DATA_ELEMENT)));
    }
}
