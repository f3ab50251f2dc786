//! Report model.
//!
//! Three nested value types describe the outcome of validating one type:
//! - `ErrorReport`: one finding (taxonomy code + positional arguments)
//! - `ObjectReport`: the findings for one object of the batch
//! - `TypeReport`: all object reports for one type plus running statistics
//!
//! Checks only ever append to reports. Message rendering is left to callers;
//! the positional arguments are enough to reconstruct one.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::model::TypeName;

/// Fixed taxonomy of validation findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCode {
    /// Actor may not create objects of the type.
    CreateDenied,
    /// Actor may not update the stored object.
    UpdateDenied,
    /// Actor may not delete the stored object.
    DeleteDenied,
    SharingViolation,
    MissingRequiredProperty,
    UniqueAttributeTaken,
    MandatoryAttributeMissing,
    InvalidUid,
    UserAccountInvalid,
    /// Create requested for an object that already exists.
    AlreadyExists,
    /// Update or delete requested for an object that does not exist.
    NotFound,
    /// Owned reference does not resolve.
    InvalidReference,
    UniquePropertyTaken,
    DuplicateIdentifier,
    UniqueKeyViolation,
    NonOwnerReferencePopulated,
    DuplicateTranslation,
    TypeNotTranslatable,
    InvalidGeoJson,
    UnsupportedGeoJsonShape,
    InvalidAttributeValue,
    AttributeNotAssigned,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 22] = [
        ErrorCode::CreateDenied,
        ErrorCode::UpdateDenied,
        ErrorCode::DeleteDenied,
        ErrorCode::SharingViolation,
        ErrorCode::MissingRequiredProperty,
        ErrorCode::UniqueAttributeTaken,
        ErrorCode::MandatoryAttributeMissing,
        ErrorCode::InvalidUid,
        ErrorCode::UserAccountInvalid,
        ErrorCode::AlreadyExists,
        ErrorCode::NotFound,
        ErrorCode::InvalidReference,
        ErrorCode::UniquePropertyTaken,
        ErrorCode::DuplicateIdentifier,
        ErrorCode::UniqueKeyViolation,
        ErrorCode::NonOwnerReferencePopulated,
        ErrorCode::DuplicateTranslation,
        ErrorCode::TypeNotTranslatable,
        ErrorCode::InvalidGeoJson,
        ErrorCode::UnsupportedGeoJsonShape,
        ErrorCode::InvalidAttributeValue,
        ErrorCode::AttributeNotAssigned,
    ];

    /// Stable wire code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateDenied => "E3000",
            Self::UpdateDenied => "E3001",
            Self::DeleteDenied => "E3002",
            Self::SharingViolation => "E3003",
            Self::MissingRequiredProperty => "E4000",
            Self::UniqueAttributeTaken => "E4009",
            Self::MandatoryAttributeMissing => "E4011",
            Self::InvalidUid => "E4014",
            Self::UserAccountInvalid => "E4050",
            Self::AlreadyExists => "E5000",
            Self::NotFound => "E5001",
            Self::InvalidReference => "E5002",
            Self::UniquePropertyTaken => "E5003",
            Self::DuplicateIdentifier => "E5004",
            Self::UniqueKeyViolation => "E5005",
            Self::NonOwnerReferencePopulated => "E5006",
            Self::DuplicateTranslation => "E1106",
            Self::TypeNotTranslatable => "E1107",
            Self::InvalidGeoJson => "E6004",
            Self::UnsupportedGeoJsonShape => "E6005",
            Self::InvalidAttributeValue => "E6007",
            Self::AttributeNotAssigned => "E6012",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    /// Type of the offending object.
    pub main_type: TypeName,
    pub main_id: Option<String>,
    pub error_property: Option<String>,
    /// Positional context (colliding identifier, reference target, ...).
    pub args: Vec<String>,
}

impl ErrorReport {
    pub fn new(code: ErrorCode, main_type: TypeName) -> Self {
        Self {
            code,
            main_type,
            main_id: None,
            error_property: None,
            args: Vec::new(),
        }
    }

    pub fn main_id(mut self, id: impl Into<String>) -> Self {
        self.main_id = Some(id.into());
        self
    }

    pub fn main_id_opt(mut self, id: Option<&str>) -> Self {
        self.main_id = id.map(str::to_string);
        self
    }

    pub fn property(mut self, name: impl Into<String>) -> Self {
        self.error_property = Some(name.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Findings for one object, identified by type, position and uid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectReport {
    pub type_name: TypeName,
    pub index: usize,
    pub uid: Option<String>,
    pub errors: Vec<ErrorReport>,
}

impl ObjectReport {
    pub fn new(type_name: TypeName, index: usize, uid: Option<&str>) -> Self {
        Self {
            type_name,
            index,
            uid: uid.map(str::to_string),
            errors: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: ErrorReport) {
        self.errors.push(error);
    }

    pub fn add_errors(&mut self, errors: impl IntoIterator<Item = ErrorReport>) {
        self.errors.extend(errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }
}

/// Running counters for one type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub ignored: usize,
}

impl Stats {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.deleted + self.ignored
    }

    pub fn merge(&mut self, other: &Stats) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.ignored += other.ignored;
    }

    pub fn inc_ignored(&mut self) {
        self.ignored += 1;
    }
}

/// Outcome for one object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeReport {
    pub type_name: TypeName,
    pub stats: Stats,
    pub object_reports: Vec<ObjectReport>,
}

impl TypeReport {
    pub fn new(type_name: TypeName) -> Self {
        Self {
            type_name,
            stats: Stats::default(),
            object_reports: Vec::new(),
        }
    }

    /// Record a rejected object: keep its report and count it as ignored.
    ///
    /// Empty object reports are dropped.
    pub fn ignore(&mut self, report: ObjectReport) {
        if report.is_empty() {
            return;
        }
        self.object_reports.push(report);
        self.stats.inc_ignored();
    }

    /// Combine with another report for the same type.
    pub fn merge(&mut self, other: TypeReport) {
        self.stats.merge(&other.stats);
        self.object_reports.extend(other.object_reports);
    }

    pub fn error_reports(&self) -> impl Iterator<Item = &ErrorReport> {
        self.object_reports.iter().flat_map(|o| o.errors.iter())
    }

    pub fn has_errors(&self) -> bool {
        self.error_reports().next().is_some()
    }

    /// Error count per code, in code order.
    pub fn error_counts(&self) -> BTreeMap<ErrorCode, usize> {
        let mut out = BTreeMap::new();
        for e in self.error_reports() {
            *out.entry(e.code).or_insert(0) += 1;
        }
        out
    }
}

/// Outcome for a whole batch: one `TypeReport` per processed type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub type_reports: BTreeMap<TypeName, TypeReport>,
}

impl ValidationReport {
    pub fn add_type_report(&mut self, report: TypeReport) {
        match self.type_reports.get_mut(&report.type_name) {
            Some(existing) => existing.merge(report),
            None => {
                self.type_reports.insert(report.type_name.clone(), report);
            }
        }
    }

    pub fn type_report(&self, type_name: &TypeName) -> Option<&TypeReport> {
        self.type_reports.get(type_name)
    }

    pub fn has_errors(&self) -> bool {
        self.type_reports.values().any(TypeReport::has_errors)
    }

    pub fn stats(&self) -> Stats {
        let mut total = Stats::default();
        for r in self.type_reports.values() {
            total.merge(&r.stats);
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn de() -> TypeName {
        TypeName::new("DataElement")
    }

    #[test]
    fn codes_are_unique_and_parse_back() {
        let mut seen = std::collections::BTreeSet::new();
        for c in ErrorCode::ALL {
            assert!(seen.insert(c.as_str()), "duplicate code {c}");
            assert_eq!(ErrorCode::parse(c.as_str()), Some(c));
        }
        assert_eq!(ErrorCode::parse("E9999"), None);
    }

    #[test]
    fn empty_object_reports_are_not_counted() {
        let mut r = TypeReport::new(de());
        r.ignore(ObjectReport::new(de(), 0, Some("a")));
        assert_eq!(r.stats.ignored, 0);
        assert!(r.object_reports.is_empty());

        let mut o = ObjectReport::new(de(), 1, Some("b"));
        o.add_error(ErrorReport::new(ErrorCode::InvalidUid, de()).arg("b"));
        r.ignore(o);
        assert_eq!(r.stats.ignored, 1);
        assert!(r.has_errors());
    }

    #[test]
    fn merge_concatenates_and_sums() {
        let mut a = TypeReport::new(de());
        a.stats.created = 2;
        let mut o = ObjectReport::new(de(), 0, Some("x"));
        o.add_error(ErrorReport::new(ErrorCode::DuplicateIdentifier, de()));
        a.ignore(o);

        let mut b = TypeReport::new(de());
        b.stats.updated = 3;
        let mut o = ObjectReport::new(de(), 4, Some("y"));
        o.add_error(ErrorReport::new(ErrorCode::InvalidReference, de()));
        b.ignore(o);

        a.merge(b);
        assert_eq!(a.stats, Stats { created: 2, updated: 3, deleted: 0, ignored: 2 });
        assert_eq!(a.object_reports.len(), 2);
        assert_eq!(a.error_counts().len(), 2);
    }

    fn stats() -> impl Strategy<Value = Stats> {
        (0..1000usize, 0..1000usize, 0..1000usize, 0..1000usize).prop_map(|(created, updated, deleted, ignored)| Stats {
            created,
            updated,
            deleted,
            ignored,
        })
    }

    proptest! {
        #[test]
        fn merged_stats_sum_totals(a in stats(), b in stats()) {
            let mut merged = a;
            merged.merge(&b);
            prop_assert_eq!(merged.total(), a.total() + b.total());

            let mut other_way = b;
            other_way.merge(&a);
            prop_assert_eq!(merged, other_way);
        }
    }

    #[test]
    fn error_code_serializes_as_wire_code() {
        let e = ErrorReport::new(ErrorCode::UniqueKeyViolation, de()).arg("shortName");
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["code"], "E5005");
        assert_eq!(v["main_type"], "DataElement");
    }
}
