//! Collaborator contracts consumed by the validation pipeline.
//!
//! Implementations live with the host (ACL engine, user directory, value
//! type rules). The pipeline treats them as synchronous and free of side
//! effects. A basic value-type validator is provided for hosts that do not
//! bring their own.

use crate::model::{Actor, MetadataObject, TypeName, ValueType};
use crate::report::{ErrorCode, ErrorReport};

/// Authorization decisions for the acting identity.
pub trait AclService {
    fn can_create(&self, actor: &Actor, type_name: &TypeName) -> bool;

    fn can_update(&self, actor: &Actor, stored: &dyn MetadataObject) -> bool;

    fn can_delete(&self, actor: &Actor, stored: &dyn MetadataObject) -> bool;

    /// Findings about the sharing settings carried by `object`.
    fn verify_sharing(&self, object: &dyn MetadataObject, actor: &Actor) -> Vec<ErrorReport>;
}

/// Directory-level validation of user accounts.
pub trait UserDirectory {
    fn validate_user(&self, candidate: &dyn MetadataObject, actor: &Actor) -> Vec<ErrorReport>;
}

/// Validates the text of an attribute value against its declared type.
///
/// Findings are emitted through `sink`; nothing is returned.
pub trait ValueTypeValidator {
    fn validate(
        &self,
        type_name: &TypeName,
        value_type: ValueType,
        text: &str,
        sink: &mut dyn FnMut(ErrorReport),
    );
}

/// Value-type rules for the common scalar types. Other types are accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicValueTypeValidator;

impl BasicValueTypeValidator {
    fn accepts(value_type: ValueType, text: &str) -> bool {
        let t = text.trim();
        match value_type {
            ValueType::Number => t.parse::<f64>().map(|v| v.is_finite()).unwrap_or(false),
            ValueType::Integer => t.parse::<i64>().is_ok(),
            ValueType::PositiveInteger => t.parse::<i64>().map(|v| v > 0).unwrap_or(false),
            ValueType::NegativeInteger => t.parse::<i64>().map(|v| v < 0).unwrap_or(false),
            ValueType::ZeroOrPositiveInteger => t.parse::<i64>().map(|v| v >= 0).unwrap_or(false),
            ValueType::Boolean => matches!(t, "true" | "false"),
            ValueType::TrueOnly => t == "true",
            ValueType::Letter => t.chars().count() == 1 && t.chars().all(char::is_alphabetic),
            ValueType::Email => match t.split_once('@') {
                Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.ends_with('.'),
                None => false,
            },
            ValueType::Url => {
                (t.starts_with("http://") || t.starts_with("https://")) && !t.contains(char::is_whitespace)
            }
            _ => true,
        }
    }
}

impl ValueTypeValidator for BasicValueTypeValidator {
    fn validate(
        &self,
        type_name: &TypeName,
        value_type: ValueType,
        text: &str,
        sink: &mut dyn FnMut(ErrorReport),
    ) {
        if !Self::accepts(value_type, text) {
            sink(
                ErrorReport::new(ErrorCode::InvalidAttributeValue, type_name.clone())
                    .property("attributeValues")
                    .arg(text)
                    .arg(format!("{value_type:?}")),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn findings(value_type: ValueType, text: &str) -> Vec<ErrorReport> {
        let mut out = Vec::new();
        BasicValueTypeValidator.validate(&TypeName::new("DataElement"), value_type, text, &mut |e| out.push(e));
        out
    }

    #[test]
    fn numeric_types() {
        assert!(findings(ValueType::Number, "3.5").is_empty());
        assert_eq!(findings(ValueType::Number, "NaN").len(), 1);
        assert!(findings(ValueType::PositiveInteger, "7").is_empty());
        assert_eq!(findings(ValueType::PositiveInteger, "0").len(), 1);
        assert!(findings(ValueType::ZeroOrPositiveInteger, "0").is_empty());
        assert_eq!(findings(ValueType::NegativeInteger, "4").len(), 1);
    }

    #[test]
    fn boolean_and_text_types() {
        assert!(findings(ValueType::Boolean, "false").is_empty());
        assert_eq!(findings(ValueType::TrueOnly, "false").len(), 1);
        assert!(findings(ValueType::Text, "anything at all").is_empty());
        assert_eq!(findings(ValueType::Email, "nobody").len(), 1);
        assert!(findings(ValueType::Email, "a@b.org").is_empty());
    }
}
