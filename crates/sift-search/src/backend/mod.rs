//! # Backend Gateway
//!
//! The thin interface this crate consumes to execute a query or
//! aggregation specification against the search backend. The backend owns
//! storage, ranking, and sharding; this crate only hands it translated
//! specs and reads back raw hits and bucket trees.

pub mod elastic;

use std::time::Duration;

use serde_json::{Map, Value};

use crate::agg::AggSpec;
use crate::error::QueryError;
use crate::query::{Predicate, QuerySpec};

pub use elastic::ElasticBackend;

/// One raw hit: the backend-assigned id plus the stored field map.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub id: String,
    pub fields: Map<String, Value>,
}

/// One page of a bounded-offset search.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub hits: Vec<RawHit>,
    /// Total matching records across all pages.
    pub total: u64,
}

/// One batch of a cursor/scroll iteration.
#[derive(Debug, Clone, Default)]
pub struct ScrollBatch {
    pub hits: Vec<RawHit>,
    /// Backend-issued cursor token for the next batch. Owned and
    /// invalidated by the backend, never constructed here.
    pub scroll_id: Option<String>,
}

/// Executes translated specifications against the search backend.
///
/// Implementations must be safe for concurrent independent use; this
/// crate shares one instance across callers and never serializes access.
#[async_trait::async_trait]
pub trait SearchBackend: Send + Sync {
    /// Execute a search and return one page of raw hits.
    async fn search(&self, spec: &QuerySpec) -> Result<SearchPage, QueryError>;

    /// Execute an aggregation and return the raw `aggregations` object.
    async fn aggregate(
        &self,
        index: &str,
        predicate: &Predicate,
        agg: &AggSpec,
    ) -> Result<Value, QueryError>;

    /// Open a scan cursor with the given keep-alive window and return the
    /// first batch.
    async fn open_scroll(
        &self,
        spec: &QuerySpec,
        keep_alive: Duration,
    ) -> Result<ScrollBatch, QueryError>;

    /// Advance a previously issued cursor under the same keep-alive window.
    async fn continue_scroll(
        &self,
        scroll_id: &str,
        keep_alive: Duration,
    ) -> Result<ScrollBatch, QueryError>;

    /// Release a cursor before its keep-alive lapses. Best-effort; errors
    /// are the caller's to ignore.
    async fn clear_scroll(&self, scroll_id: &str) -> Result<(), QueryError>;
}
