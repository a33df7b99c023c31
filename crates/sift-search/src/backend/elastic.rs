//! Elasticsearch REST implementation of [`SearchBackend`].
//!
//! Speaks the `_search` / `_search/scroll` JSON API over HTTP. Transport
//! failures surface as [`QueryError::BackendUnavailable`]; a lapsed scroll
//! context surfaces as [`QueryError::CursorExpired`]. No retries.

use std::time::Duration;

use serde_json::{json, Map, Value};

use crate::agg::AggSpec;
use crate::backend::{RawHit, ScrollBatch, SearchBackend, SearchPage};
use crate::error::QueryError;
use crate::query::{Predicate, QuerySpec};

/// HTTP gateway to one Elasticsearch cluster.
#[derive(Debug, Clone)]
pub struct ElasticBackend {
    http: reqwest::Client,
    base_url: String,
}

impl ElasticBackend {
    /// Connect to a cluster at `base_url` (e.g. `http://localhost:9200`)
    /// with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, QueryError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QueryError::BackendUnavailable(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, QueryError> {
        tracing::debug!(url, %body, "backend request");
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| QueryError::BackendUnavailable(e.to_string()))?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| QueryError::MalformedResponse(e.to_string()))?;

        if !status.is_success() {
            if is_expired_context(&payload) {
                return Err(QueryError::CursorExpired);
            }
            return Err(QueryError::BackendUnavailable(format!(
                "status {status}: {payload}"
            )));
        }
        Ok(payload)
    }
}

#[async_trait::async_trait]
impl SearchBackend for ElasticBackend {
    async fn search(&self, spec: &QuerySpec) -> Result<SearchPage, QueryError> {
        let url = format!("{}/{}/_search", self.base_url, spec.index);
        let payload = self.post_json(&url, &spec.to_search_body()).await?;
        Ok(SearchPage {
            hits: parse_hits(&payload)?,
            total: parse_total(&payload)?,
        })
    }

    async fn aggregate(
        &self,
        index: &str,
        predicate: &Predicate,
        agg: &AggSpec,
    ) -> Result<Value, QueryError> {
        let url = format!("{}/{}/_search", self.base_url, index);
        let body = json!({
            "size": 0,
            "query": predicate.to_query_json(),
            "aggs": agg.to_aggs_body(),
        });
        let payload = self.post_json(&url, &body).await?;
        payload
            .get("aggregations")
            .cloned()
            .ok_or_else(|| QueryError::missing_path("aggregations"))
    }

    async fn open_scroll(
        &self,
        spec: &QuerySpec,
        keep_alive: Duration,
    ) -> Result<ScrollBatch, QueryError> {
        let url = format!(
            "{}/{}/_search?scroll={}",
            self.base_url,
            spec.index,
            keep_alive_param(keep_alive)
        );
        let payload = self.post_json(&url, &spec.to_search_body()).await?;
        Ok(ScrollBatch {
            hits: parse_hits(&payload)?,
            scroll_id: parse_scroll_id(&payload),
        })
    }

    async fn continue_scroll(
        &self,
        scroll_id: &str,
        keep_alive: Duration,
    ) -> Result<ScrollBatch, QueryError> {
        let url = format!("{}/_search/scroll", self.base_url);
        let body = json!({
            "scroll": keep_alive_param(keep_alive),
            "scroll_id": scroll_id,
        });
        let payload = self.post_json(&url, &body).await?;
        Ok(ScrollBatch {
            hits: parse_hits(&payload)?,
            scroll_id: parse_scroll_id(&payload),
        })
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<(), QueryError> {
        let url = format!("{}/_search/scroll", self.base_url);
        self.http
            .delete(&url)
            .json(&json!({ "scroll_id": scroll_id }))
            .send()
            .await
            .map_err(|e| QueryError::BackendUnavailable(e.to_string()))?;
        Ok(())
    }
}

// =============================================================================
// Response parsing
// =============================================================================

fn parse_hits(payload: &Value) -> Result<Vec<RawHit>, QueryError> {
    let hits = payload
        .get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(Value::as_array)
        .ok_or_else(|| QueryError::missing_path("hits.hits"))?;

    hits.iter()
        .map(|hit| {
            let id = hit
                .get("_id")
                .and_then(Value::as_str)
                .ok_or_else(|| QueryError::missing_path("hits.hits[]._id"))?;
            // A projected hit may legitimately carry an empty `_source`.
            let fields: Map<String, Value> = hit
                .get("_source")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            Ok(RawHit {
                id: id.to_string(),
                fields,
            })
        })
        .collect()
}

fn parse_total(payload: &Value) -> Result<u64, QueryError> {
    payload
        .get("hits")
        .and_then(|h| h.get("total"))
        .and_then(|t| t.get("value"))
        .and_then(Value::as_u64)
        .ok_or_else(|| QueryError::missing_path("hits.total.value"))
}

fn parse_scroll_id(payload: &Value) -> Option<String> {
    payload
        .get("_scroll_id")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn keep_alive_param(keep_alive: Duration) -> String {
    format!("{}s", keep_alive.as_secs().max(1))
}

fn is_expired_context(payload: &Value) -> bool {
    payload
        .get("error")
        .and_then(|e| e.get("root_cause"))
        .and_then(Value::as_array)
        .map(|causes| {
            causes.iter().any(|c| {
                c.get("type").and_then(Value::as_str) == Some("search_context_missing_exception")
            })
        })
        .unwrap_or(false)
}
