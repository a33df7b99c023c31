//! # Caller-facing retrieval operations
//!
//! [`LogStore`] binds a [`SearchBackend`] to one target collection and
//! exposes the retrieval intents: retrieve-all, paged/scrolled retrieval,
//! range and terms filters, group-bys, cardinality, and field projection.
//!
//! The store holds configuration only — every call is a fresh backend
//! round trip, and independent calls are safely concurrent.

use std::sync::Arc;

use serde_json::{Map, Value};

use sift_core::{hydrate_batch, HydratedBatch, HydrationPolicy};

use crate::agg::{self, AggSpec, AggTree, DEFAULT_MAX_BUCKETS};
use crate::backend::{RawHit, SearchBackend};
use crate::error::QueryError;
use crate::page::{PagedFetch, DEFAULT_PAGE_SIZE};
use crate::query::{Predicate, QuerySpec};
use crate::scroll::{ScrollFetch, DEFAULT_KEEP_ALIVE, DEFAULT_SCROLL_PAGE_SIZE};

/// How projected rows get their `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionIds {
    /// Backend-assigned identity (default).
    #[default]
    Backend,
    /// Legacy synthetic running counter, starting at 1. Opt-in only: it
    /// discards the backend identity.
    Synthetic,
}

/// Store configuration. Page geometry and bucket caps are always explicit
/// here so no call site depends on a backend default.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Target collection name, passed through unmodified.
    pub index: String,
    /// Page size for bounded-offset retrieval.
    pub page_size: usize,
    /// Batch size for scroll retrieval.
    pub scroll_page_size: usize,
    /// Scroll cursor keep-alive window.
    pub keep_alive: std::time::Duration,
    /// Single-page size for the time/terms filter paths.
    pub filter_page_size: usize,
    /// Single-page size for dynamic-terms and projection paths.
    pub wide_page_size: usize,
    /// Terms-aggregation bucket cap when the caller does not supply one.
    pub max_buckets: usize,
    /// What batch hydration does with a malformed record.
    pub policy: HydrationPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            index: "loganalyzer".into(),
            page_size: DEFAULT_PAGE_SIZE,
            scroll_page_size: DEFAULT_SCROLL_PAGE_SIZE,
            keep_alive: DEFAULT_KEEP_ALIVE,
            filter_page_size: 4000,
            wide_page_size: 10_000,
            max_buckets: DEFAULT_MAX_BUCKETS,
            policy: HydrationPolicy::AbortOnFirst,
        }
    }
}

/// The query/aggregation gateway service.
pub struct LogStore<B: SearchBackend> {
    backend: Arc<B>,
    config: StoreConfig,
}

impl<B: SearchBackend> Clone for LogStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            config: self.config.clone(),
        }
    }
}

impl<B: SearchBackend> LogStore<B> {
    pub fn new(backend: B, config: StoreConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn base_spec(&self, predicate: Predicate) -> QuerySpec {
        QuerySpec::new(&self.config.index, predicate)
    }

    fn hydrate_hits(&self, hits: &[RawHit]) -> Result<HydratedBatch, QueryError> {
        hydrate_batch(
            hits.iter().map(|h| (&h.fields, h.id.as_str())),
            self.config.policy,
        )
        .map_err(Into::into)
    }

    // =========================================================================
    // Retrieval
    // =========================================================================

    /// Retrieve every record via the scroll strategy (large sets).
    pub async fn retrieve_all(&self) -> Result<HydratedBatch, QueryError> {
        let spec = self.base_spec(Predicate::match_all());
        ScrollFetch::new(self.config.scroll_page_size, self.config.keep_alive)
            .fetch_all(self.backend.as_ref(), &spec, self.config.policy)
            .await
    }

    /// Retrieve every record via bounded-offset paging (small/medium sets).
    pub async fn retrieve_paged(&self) -> Result<HydratedBatch, QueryError> {
        let spec = self.base_spec(Predicate::match_all());
        let hits = PagedFetch::new(self.config.page_size)
            .fetch_all(self.backend.as_ref(), &spec)
            .await?;
        self.hydrate_hits(&hits)
    }

    /// Records whose `timestamp` lies in `[start, end]`, both inclusive.
    pub async fn filter_by_time(
        &self,
        start: &str,
        end: &str,
    ) -> Result<HydratedBatch, QueryError> {
        let spec = self
            .base_spec(Predicate::range("timestamp", start, end))
            .with_page(0, self.config.filter_page_size);
        let page = self.backend.search(&spec).await?;
        self.hydrate_hits(&page.hits)
    }

    /// Records whose `field` equals one of `values`, composed as
    /// "must match-all + filter terms". An empty value set yields an
    /// empty result.
    pub async fn filter_by_terms(
        &self,
        field: &str,
        values: &[String],
    ) -> Result<HydratedBatch, QueryError> {
        let predicate = Predicate::must_filter(
            Predicate::match_all(),
            Predicate::terms(field, values.iter().cloned()),
        );
        let spec = self
            .base_spec(predicate)
            .with_page(0, self.config.filter_page_size);
        let page = self.backend.search(&spec).await?;
        self.hydrate_hits(&page.hits)
    }

    /// Bare terms filter over any field, sized for wide result sets.
    pub async fn filter_by_terms_dynamic(
        &self,
        field: &str,
        values: &[String],
    ) -> Result<HydratedBatch, QueryError> {
        let spec = self
            .base_spec(Predicate::terms(field, values.iter().cloned()))
            .with_page(0, self.config.wide_page_size);
        let page = self.backend.search(&spec).await?;
        self.hydrate_hits(&page.hits)
    }

    // =========================================================================
    // Aggregation
    // =========================================================================

    async fn run_agg(&self, spec: &AggSpec) -> Result<Value, QueryError> {
        self.backend
            .aggregate(&self.config.index, &Predicate::match_all(), spec)
            .await
    }

    /// Document counts grouped by one field.
    pub async fn group_by(
        &self,
        field: &str,
        max_buckets: Option<usize>,
    ) -> Result<AggTree, QueryError> {
        let spec = AggSpec::terms(
            format!("group_by_{field}"),
            field,
            max_buckets.unwrap_or(self.config.max_buckets),
        );
        let raw = self.run_agg(&spec).await?;
        agg::walk(&spec, &raw)
    }

    /// Document counts grouped by two fields (depth-2 tree).
    pub async fn nested_group_by(
        &self,
        field1: &str,
        field2: &str,
        max_buckets: Option<usize>,
    ) -> Result<AggTree, QueryError> {
        let cap = max_buckets.unwrap_or(self.config.max_buckets);
        let spec = AggSpec::terms("field1", field1, cap)
            .with_sub(AggSpec::terms("field2", field2, cap));
        let raw = self.run_agg(&spec).await?;
        agg::walk(&spec, &raw)
    }

    /// Distinct count of `unique_field` per value of `group_field`
    /// (depth-1 keys mapped directly to the metric).
    pub async fn unique_count_by(
        &self,
        group_field: &str,
        unique_field: &str,
        max_buckets: Option<usize>,
    ) -> Result<AggTree, QueryError> {
        let spec = AggSpec::terms(
            format!("{unique_field}s_per_{group_field}"),
            group_field,
            max_buckets.unwrap_or(self.config.max_buckets),
        )
        .with_sub(AggSpec::cardinality(
            format!("unique_{unique_field}s"),
            unique_field,
        ));
        let raw = self.run_agg(&spec).await?;
        agg::walk(&spec, &raw)
    }

    /// Per-source hourly histogram of distinct dates: source → hour →
    /// unique-date count (depth-2 tree with metric leaves).
    pub async fn source_hourly_unique_dates(&self) -> Result<AggTree, QueryError> {
        let spec = AggSpec::terms("sources", "source", self.config.max_buckets).with_sub(
            AggSpec::date_histogram_hourly("timestamps", "timestamp")
                .with_sub(AggSpec::cardinality("unique_dates", "date")),
        );
        let raw = self.run_agg(&spec).await?;
        agg::walk(&spec, &raw)
    }

    /// Approximate distinct count of one field across the collection.
    pub async fn cardinality_of(&self, field: &str) -> Result<u64, QueryError> {
        let name = format!("unique_{field}");
        let spec = AggSpec::cardinality(&name, field);
        let raw = self.run_agg(&spec).await?;
        agg::metric_value(&name, &raw)
    }

    // =========================================================================
    // Projection
    // =========================================================================

    /// Return only the requested fields per hit. `"id"` is sourced from
    /// the hit's backend identity, never from stored fields; fields absent
    /// from a hit are simply omitted from its row.
    pub async fn project(
        &self,
        fields: &[String],
        ids: ProjectionIds,
    ) -> Result<Vec<Map<String, Value>>, QueryError> {
        let spec = self
            .base_spec(Predicate::match_all())
            .with_includes(fields.iter().cloned())
            .with_page(0, self.config.wide_page_size);
        let page = self.backend.search(&spec).await?;

        let mut rows = Vec::with_capacity(page.hits.len());
        for (ordinal, raw) in page.hits.iter().enumerate() {
            let mut row = Map::new();
            for field in fields {
                if field == "id" {
                    let id = match ids {
                        ProjectionIds::Backend => raw.id.clone(),
                        ProjectionIds::Synthetic => (ordinal + 1).to_string(),
                    };
                    row.insert("id".into(), Value::String(id));
                } else if let Some(value) = raw.fields.get(field) {
                    row.insert(field.clone(), value.clone());
                }
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{hit, hit_with, MockBackend};
    use serde_json::json;

    fn store(backend: MockBackend) -> LogStore<MockBackend> {
        LogStore::new(backend, StoreConfig::default())
    }

    #[tokio::test]
    async fn test_filter_by_terms_on_empty_collection_is_empty_not_error() {
        let store = store(MockBackend::default());
        let batch = store
            .filter_by_terms("source", &["pod-a".into()])
            .await
            .unwrap();
        assert!(batch.records.is_empty());
        assert!(batch.failures.is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_paged_hydrates_every_hit() {
        let store = store(MockBackend::with_docs(
            (0..5).map(|i| hit(&format!("doc-{i}"))),
        ));
        let batch = store.retrieve_paged().await.unwrap();
        assert_eq!(batch.records.len(), 5);
        assert_eq!(batch.records[0].source.as_deref(), Some("pod-a"));
    }

    #[tokio::test]
    async fn test_retrieve_all_scrolls_to_exhaustion() {
        let store = store(MockBackend::with_docs(
            (0..205).map(|i| hit(&format!("doc-{i}"))),
        ));
        let batch = store.retrieve_all().await.unwrap();
        assert_eq!(batch.records.len(), 205);
    }

    #[tokio::test]
    async fn test_unique_count_scenario() {
        // Records {A,t1}, {A,t2}, {B,t1} grouped by source with unique
        // timestamps yields {"A": 2, "B": 1}.
        let store = store(MockBackend::with_aggs(json!({
            "timestamps_per_source": { "buckets": [
                { "key": "A", "doc_count": 2, "unique_timestamps": { "value": 2 } },
                { "key": "B", "doc_count": 1, "unique_timestamps": { "value": 1 } },
            ]}
        })));
        let tree = store
            .unique_count_by("source", "timestamp", None)
            .await
            .unwrap();
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.get("A").unwrap().as_count(), Some(2));
        assert_eq!(tree.get("B").unwrap().as_count(), Some(1));
    }

    #[tokio::test]
    async fn test_group_by_yields_flat_tree() {
        let store = store(MockBackend::with_aggs(json!({
            "group_by_source": { "buckets": [
                { "key": "pod-a", "doc_count": 7 },
                { "key": "pod-b", "doc_count": 3 },
            ]}
        })));
        let tree = store.group_by("source", None).await.unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.get("pod-a").unwrap().as_count(), Some(7));
    }

    #[tokio::test]
    async fn test_nested_group_by_is_depth_two() {
        let store = store(MockBackend::with_aggs(json!({
            "field1": { "buckets": [
                { "key": "pod-a", "doc_count": 4, "field2": { "buckets": [
                    { "key": "INFO", "doc_count": 3 },
                    { "key": "ERROR", "doc_count": 1 },
                ]}},
            ]}
        })));
        let tree = store.nested_group_by("source", "loglevel", None).await.unwrap();
        assert_eq!(tree.depth(), 2);
        let inner = tree.get("pod-a").unwrap().as_nested().unwrap();
        assert_eq!(inner.get("ERROR").unwrap().as_count(), Some(1));
    }

    #[tokio::test]
    async fn test_cardinality_of_reads_metric() {
        let store = store(MockBackend::with_aggs(json!({
            "unique_source": { "value": 12 }
        })));
        assert_eq!(store.cardinality_of("source").await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_projection_omits_absent_fields_but_keeps_id() {
        let docs = vec![
            hit_with("doc-1", json!({ "source": "pod-a" })),
            hit_with("doc-2", json!({ "message": "no source here" })),
        ];
        let store = store(MockBackend::with_docs(docs));
        let rows = store
            .project(&["id".into(), "source".into()], ProjectionIds::Backend)
            .await
            .unwrap();
        assert_eq!(rows[0]["id"], "doc-1");
        assert_eq!(rows[0]["source"], "pod-a");
        assert_eq!(rows[1]["id"], "doc-2");
        assert!(!rows[1].contains_key("source"));
    }

    #[tokio::test]
    async fn test_projection_synthetic_ids_are_opt_in() {
        let docs = vec![
            hit_with("doc-a", json!({ "source": "x" })),
            hit_with("doc-b", json!({ "source": "y" })),
        ];
        let store = store(MockBackend::with_docs(docs));
        let rows = store
            .project(&["id".into()], ProjectionIds::Synthetic)
            .await
            .unwrap();
        assert_eq!(rows[0]["id"], "1");
        assert_eq!(rows[1]["id"], "2");
    }

    #[tokio::test]
    async fn test_collect_errors_policy_on_filter_path() {
        let docs = vec![
            hit("doc-1"),
            hit_with("doc-bad", json!({ "date": "2023-08-14" })),
            hit("doc-3"),
        ];
        let config = StoreConfig {
            policy: HydrationPolicy::CollectErrors,
            ..StoreConfig::default()
        };
        let store = LogStore::new(MockBackend::with_docs(docs), config);
        let batch = store.filter_by_time(
            "2023-08-14T00:00:00.000Z",
            "2023-08-15T00:00:00.000Z",
        )
        .await
        .unwrap();
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.failures.len(), 1);
    }
}
