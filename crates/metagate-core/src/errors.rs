//! Error types for metagate-core.
//!
//! These errors describe genuine defects: bad configuration, a schema that
//! cannot serve a request, a check that cannot run. Validation findings about
//! the imported objects are never errors; they are `ErrorReport`s collected in
//! a `TypeReport` (see `crate::report`).

use thiserror::Error;

/// Core error type.
#[derive(Debug, Error)]
pub enum MetagateError {
    /// The caller passed something unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An internal invariant was broken.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// (De)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl MetagateError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }
}

impl From<serde_json::Error> for MetagateError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result alias used across the core crate.
pub type MetagateResult<T> = Result<T, MetagateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_category() {
        let e = MetagateError::invalid_argument("uid pattern is empty");
        assert_eq!(e.to_string(), "invalid argument: uid pattern is empty");
    }

    #[test]
    fn json_errors_convert() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let e: MetagateError = err.into();
        assert!(matches!(e, MetagateError::Serialization(_)));
    }
}
