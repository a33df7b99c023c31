//! Retrieval failure kinds.
//!
//! No automatic retries exist anywhere in this crate; every failure
//! propagates to the caller with enough context to diagnose without
//! re-querying.

use sift_core::HydrationError;
use thiserror::Error;

/// A query, aggregation, or pagination call failed.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Connection or I/O failure reaching the backend.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend returned a shape the spec builder did not expect.
    #[error("malformed backend response: {0}")]
    MalformedResponse(String),

    /// One record failed field-level parsing.
    #[error(transparent)]
    Hydration(#[from] HydrationError),

    /// The scroll keep-alive lapsed and the backend invalidated the cursor.
    #[error("scroll cursor expired (keep-alive lapsed)")]
    CursorExpired,
}

impl QueryError {
    /// Shorthand for a [`QueryError::MalformedResponse`] naming the
    /// JSON path that was missing or mistyped.
    pub fn missing_path(path: impl Into<String>) -> Self {
        Self::MalformedResponse(format!("missing or mistyped path '{}'", path.into()))
    }
}
