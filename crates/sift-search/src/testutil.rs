//! In-memory [`SearchBackend`] double for controller and service tests.

use std::sync::Mutex;
use std::time::Duration;

use serde_json::{json, Map, Value};

use crate::agg::AggSpec;
use crate::backend::{RawHit, ScrollBatch, SearchBackend, SearchPage};
use crate::error::QueryError;
use crate::query::{Predicate, QuerySpec};

/// A hit with a fully valid record source.
pub fn hit(id: &str) -> RawHit {
    hit_with(id, json!({
        "timestamp": "2023-08-14T09:15:02.123Z",
        "date": "2023-08-14",
        "source": "pod-a",
        "message": "ok",
    }))
}

/// A hit with caller-supplied source fields.
pub fn hit_with(id: &str, fields: Value) -> RawHit {
    let fields: Map<String, Value> = fields.as_object().cloned().unwrap_or_default();
    RawHit {
        id: id.to_string(),
        fields,
    }
}

/// Serves a fixed document list page-by-page and batch-by-batch, logging
/// every backend call so tests can assert on the exact call sequence.
#[derive(Default)]
pub struct MockBackend {
    pub docs: Vec<RawHit>,
    pub aggs: Value,
    /// Simulated keep-alive expiry: `continue_scroll` for batch index >= n
    /// fails with `CursorExpired`.
    pub expire_from_batch: Option<usize>,
    calls: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn with_docs(docs: impl IntoIterator<Item = RawHit>) -> Self {
        Self {
            docs: docs.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Simulate keep-alive expiry from the given batch index onward.
    pub fn expire_from(mut self, batch_index: usize) -> Self {
        self.expire_from_batch = Some(batch_index);
        self
    }

    pub fn with_aggs(aggs: Value) -> Self {
        Self {
            aggs,
            ..Self::default()
        }
    }

    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, entry: String) {
        self.calls.lock().unwrap().push(entry);
    }

    fn batch(&self, index: usize, size: usize) -> Vec<RawHit> {
        self.docs
            .iter()
            .skip(index * size)
            .take(size)
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl SearchBackend for MockBackend {
    async fn search(&self, spec: &QuerySpec) -> Result<SearchPage, QueryError> {
        self.log(format!("search from={} size={}", spec.from, spec.size));
        let hits = self
            .docs
            .iter()
            .skip(spec.from)
            .take(spec.size)
            .cloned()
            .collect();
        Ok(SearchPage {
            hits,
            total: self.docs.len() as u64,
        })
    }

    async fn aggregate(
        &self,
        _index: &str,
        _predicate: &Predicate,
        agg: &AggSpec,
    ) -> Result<Value, QueryError> {
        self.log(format!("aggregate name={}", agg.name));
        Ok(self.aggs.clone())
    }

    async fn open_scroll(
        &self,
        spec: &QuerySpec,
        _keep_alive: Duration,
    ) -> Result<ScrollBatch, QueryError> {
        self.log(format!("open_scroll size={}", spec.size));
        Ok(ScrollBatch {
            hits: self.batch(0, spec.size),
            // Scroll ids encode batch size and next index, mimicking an
            // opaque backend token.
            scroll_id: Some(format!("cursor:{}:1", spec.size)),
        })
    }

    async fn continue_scroll(
        &self,
        scroll_id: &str,
        _keep_alive: Duration,
    ) -> Result<ScrollBatch, QueryError> {
        self.log(format!("continue_scroll id={scroll_id}"));
        let mut parts = scroll_id.trim_start_matches("cursor:").split(':');
        let size: usize = parts.next().unwrap().parse().unwrap();
        let index: usize = parts.next().unwrap().parse().unwrap();

        if let Some(expire_from) = self.expire_from_batch {
            if index >= expire_from {
                return Err(QueryError::CursorExpired);
            }
        }

        Ok(ScrollBatch {
            hits: self.batch(index, size),
            scroll_id: Some(format!("cursor:{}:{}", size, index + 1)),
        })
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<(), QueryError> {
        self.log(format!("clear_scroll id={scroll_id}"));
        Ok(())
    }
}
