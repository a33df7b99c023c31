//! Hydration failure kinds.
//!
//! One error per failing record, always carrying the field name and the
//! backend id so the caller can diagnose without re-querying.

use thiserror::Error;

/// A single record failed to hydrate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HydrationError {
    /// A required field was absent from the hit source.
    #[error("record {id}: required field '{field}' is missing")]
    MissingField { field: &'static str, id: String },

    /// A field was present but did not match its format grammar.
    #[error("record {id}: field '{field}' has malformed value '{value}'")]
    MalformedField {
        field: &'static str,
        id: String,
        value: String,
    },
}

impl HydrationError {
    /// The backend id of the record that failed.
    pub fn record_id(&self) -> &str {
        match self {
            Self::MissingField { id, .. } => id,
            Self::MalformedField { id, .. } => id,
        }
    }

    /// The field that caused the failure.
    pub fn field(&self) -> &'static str {
        match self {
            Self::MissingField { field, .. } => field,
            Self::MalformedField { field, .. } => field,
        }
    }
}
