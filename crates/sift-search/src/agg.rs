//! # Aggregation Spec Builder & Tree Walker
//!
//! Builds nested bucket-aggregation specifications and walks the backend's
//! returned bucket structure into a generic [`AggTree`], generalized to
//! arbitrary nesting depth.
//!
//! Walker leaf rules:
//! - a bucket with no sub-aggregation yields its document count;
//! - a bucket whose sub-aggregation is a cardinality metric yields that
//!   metric's distinct-count value instead of the raw document count;
//! - a bucket with a nested bucketing sub-aggregation yields a further
//!   nested tree.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};

use crate::error::QueryError;

/// Default bucket cap for terms aggregations. Always explicit in the
/// request: the backend would otherwise truncate silently at its own
/// default. Callers with higher-cardinality fields must raise it.
pub const DEFAULT_MAX_BUCKETS: usize = 1000;

// =============================================================================
// Specification
// =============================================================================

/// One bucketing or metric operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggKind {
    /// Group by distinct field values, capped at `size` buckets.
    Terms { field: String, size: usize },
    /// Bucket a date field at fixed hour granularity.
    DateHistogramHourly { field: String },
    /// Approximate distinct count of a field.
    Cardinality { field: String },
}

/// A named aggregation, optionally carrying one nested sub-aggregation,
/// to arbitrary depth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggSpec {
    pub name: String,
    pub kind: AggKind,
    pub sub: Option<Box<AggSpec>>,
}

impl AggSpec {
    pub fn terms(name: impl Into<String>, field: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            kind: AggKind::Terms {
                field: field.into(),
                size,
            },
            sub: None,
        }
    }

    pub fn date_histogram_hourly(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AggKind::DateHistogramHourly {
                field: field.into(),
            },
            sub: None,
        }
    }

    pub fn cardinality(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AggKind::Cardinality {
                field: field.into(),
            },
            sub: None,
        }
    }

    /// Nest a sub-aggregation one level below this one.
    pub fn with_sub(mut self, sub: AggSpec) -> Self {
        self.sub = Some(Box::new(sub));
        self
    }

    /// Nesting depth of this specification (1 for a flat aggregation).
    pub fn depth(&self) -> usize {
        1 + self.sub.as_ref().map_or(0, |s| s.depth())
    }

    /// Translate into the backend's `aggs` request body.
    pub fn to_aggs_body(&self) -> Value {
        let mut node = match &self.kind {
            AggKind::Terms { field, size } => json!({
                "terms": { "field": field, "size": size }
            }),
            AggKind::DateHistogramHourly { field } => json!({
                "date_histogram": { "field": field, "calendar_interval": "hour" }
            }),
            AggKind::Cardinality { field } => json!({
                "cardinality": { "field": field }
            }),
        };
        if let Some(sub) = &self.sub {
            node["aggs"] = sub.to_aggs_body();
        }
        json!({ &self.name: node })
    }
}

// =============================================================================
// Result tree
// =============================================================================

/// One node of the aggregation result: a terminal count/metric or a
/// further nested mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum AggNode {
    Count(i64),
    Nested(AggTree),
}

impl AggNode {
    pub fn as_count(&self) -> Option<i64> {
        match self {
            Self::Count(n) => Some(*n),
            Self::Nested(_) => None,
        }
    }

    pub fn as_nested(&self) -> Option<&AggTree> {
        match self {
            Self::Count(_) => None,
            Self::Nested(tree) => Some(tree),
        }
    }
}

/// Bucket key → node mapping, in the backend's native bucket order.
/// This crate never re-sorts buckets.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggTree {
    entries: Vec<(String, AggNode)>,
}

impl AggTree {
    pub fn get(&self, key: &str) -> Option<&AggNode> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, node)| node)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, AggNode)> {
        self.entries.iter()
    }

    /// Depth of the deepest branch (0 for an empty tree).
    pub fn depth(&self) -> usize {
        self.entries
            .iter()
            .map(|(_, node)| match node {
                AggNode::Count(_) => 1,
                AggNode::Nested(tree) => 1 + tree.depth(),
            })
            .max()
            .unwrap_or(0)
    }
}

impl Serialize for AggNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Count(n) => serializer.serialize_i64(*n),
            Self::Nested(tree) => tree.serialize(serializer),
        }
    }
}

impl Serialize for AggTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, node) in &self.entries {
            map.serialize_entry(key, node)?;
        }
        map.end()
    }
}

// =============================================================================
// Walker
// =============================================================================

/// Walk the backend's `aggregations` object for the given spec.
///
/// The depth of the returned tree exactly matches the nesting depth of the
/// spec, except that a terminal cardinality sub-aggregation collapses into
/// its parent bucket's value.
pub fn walk(spec: &AggSpec, aggregations: &Value) -> Result<AggTree, QueryError> {
    let node = aggregations
        .get(&spec.name)
        .ok_or_else(|| QueryError::missing_path(format!("aggregations.{}", spec.name)))?;
    walk_buckets(spec, node)
}

/// Read a top-level metric aggregation (cardinality) value.
pub fn metric_value(name: &str, aggregations: &Value) -> Result<u64, QueryError> {
    aggregations
        .get(name)
        .and_then(|m| m.get("value"))
        .and_then(Value::as_u64)
        .ok_or_else(|| QueryError::missing_path(format!("aggregations.{name}.value")))
}

fn walk_buckets(spec: &AggSpec, node: &Value) -> Result<AggTree, QueryError> {
    let buckets = node
        .get("buckets")
        .and_then(Value::as_array)
        .ok_or_else(|| QueryError::missing_path(format!("{}.buckets", spec.name)))?;

    let mut entries = Vec::with_capacity(buckets.len());
    for bucket in buckets {
        let key = bucket_key(spec, bucket)?;
        let value = match &spec.sub {
            None => AggNode::Count(doc_count(spec, bucket)?),
            Some(sub) if matches!(sub.kind, AggKind::Cardinality { .. }) => {
                let metric = bucket
                    .get(&sub.name)
                    .and_then(|m| m.get("value"))
                    .and_then(Value::as_i64)
                    .ok_or_else(|| {
                        QueryError::missing_path(format!("{}.{}.value", spec.name, sub.name))
                    })?;
                AggNode::Count(metric)
            }
            Some(sub) => {
                let child = bucket
                    .get(&sub.name)
                    .ok_or_else(|| QueryError::missing_path(format!("{}.{}", spec.name, sub.name)))?;
                AggNode::Nested(walk_buckets(sub, child)?)
            }
        };
        entries.push((key, value));
    }
    Ok(AggTree { entries })
}

fn bucket_key(spec: &AggSpec, bucket: &Value) -> Result<String, QueryError> {
    // Date histograms report both `key` (epoch millis) and `key_as_string`;
    // prefer the textual form for a uniform tree.
    if let Some(s) = bucket.get("key_as_string").and_then(Value::as_str) {
        return Ok(s.to_string());
    }
    match bucket.get("key") {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(QueryError::missing_path(format!("{}.buckets[].key", spec.name))),
    }
}

fn doc_count(spec: &AggSpec, bucket: &Value) -> Result<i64, QueryError> {
    bucket
        .get("doc_count")
        .and_then(Value::as_i64)
        .ok_or_else(|| QueryError::missing_path(format!("{}.buckets[].doc_count", spec.name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terms_body_has_explicit_size() {
        let spec = AggSpec::terms("sources", "source", 500);
        assert_eq!(
            spec.to_aggs_body(),
            json!({ "sources": { "terms": { "field": "source", "size": 500 } } })
        );
    }

    #[test]
    fn test_nested_body_composition() {
        let spec = AggSpec::terms("sources", "source", DEFAULT_MAX_BUCKETS)
            .with_sub(AggSpec::cardinality("unique_timestamps", "timestamp"));
        let body = spec.to_aggs_body();
        assert_eq!(
            body["sources"]["aggs"]["unique_timestamps"],
            json!({ "cardinality": { "field": "timestamp" } })
        );
    }

    #[test]
    fn test_spec_depth() {
        let spec = AggSpec::terms("a", "f1", 10)
            .with_sub(AggSpec::date_histogram_hourly("b", "timestamp")
                .with_sub(AggSpec::cardinality("c", "date")));
        assert_eq!(spec.depth(), 3);
    }

    #[test]
    fn test_flat_terms_walk_yields_doc_counts() {
        let spec = AggSpec::terms("sources", "source", 10);
        let raw = json!({
            "sources": { "buckets": [
                { "key": "pod-a", "doc_count": 7 },
                { "key": "pod-b", "doc_count": 3 },
            ]}
        });
        let tree = walk(&spec, &raw).unwrap();
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.get("pod-a").unwrap().as_count(), Some(7));
        assert_eq!(tree.get("pod-b").unwrap().as_count(), Some(3));
    }

    #[test]
    fn test_backend_bucket_order_is_preserved() {
        let spec = AggSpec::terms("sources", "source", 10);
        let raw = json!({
            "sources": { "buckets": [
                { "key": "zzz", "doc_count": 9 },
                { "key": "aaa", "doc_count": 1 },
            ]}
        });
        let tree = walk(&spec, &raw).unwrap();
        let keys: Vec<&str> = tree.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["zzz", "aaa"]);
    }

    #[test]
    fn test_terms_terms_walk_is_depth_two() {
        let spec = AggSpec::terms("field1", "source", 10)
            .with_sub(AggSpec::terms("field2", "loglevel", 10));
        let raw = json!({
            "field1": { "buckets": [
                { "key": "pod-a", "doc_count": 5, "field2": { "buckets": [
                    { "key": "INFO", "doc_count": 4 },
                    { "key": "WARN", "doc_count": 1 },
                ]}},
            ]}
        });
        let tree = walk(&spec, &raw).unwrap();
        assert_eq!(tree.depth(), 2);
        let inner = tree.get("pod-a").unwrap().as_nested().unwrap();
        assert_eq!(inner.get("INFO").unwrap().as_count(), Some(4));
        assert_eq!(inner.get("WARN").unwrap().as_count(), Some(1));
    }

    #[test]
    fn test_cardinality_sub_collapses_to_metric() {
        // terms → cardinality yields depth-1 keys mapped to the metric,
        // not nested mappings.
        let spec = AggSpec::terms("timestamps_per_source", "source", 10)
            .with_sub(AggSpec::cardinality("unique_timestamps", "timestamp"));
        let raw = json!({
            "timestamps_per_source": { "buckets": [
                { "key": "A", "doc_count": 2, "unique_timestamps": { "value": 2 } },
                { "key": "B", "doc_count": 1, "unique_timestamps": { "value": 1 } },
            ]}
        });
        let tree = walk(&spec, &raw).unwrap();
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.get("A").unwrap().as_count(), Some(2));
        assert_eq!(tree.get("B").unwrap().as_count(), Some(1));
    }

    #[test]
    fn test_three_level_walk_with_metric_leaf() {
        let spec = AggSpec::terms("sources", "source", 10).with_sub(
            AggSpec::date_histogram_hourly("timestamps", "timestamp")
                .with_sub(AggSpec::cardinality("unique_dates", "date")),
        );
        let raw = json!({
            "sources": { "buckets": [
                { "key": "pod-a", "doc_count": 3, "timestamps": { "buckets": [
                    {
                        "key": 1692003600000i64,
                        "key_as_string": "2023-08-14T09:00:00.000Z",
                        "doc_count": 3,
                        "unique_dates": { "value": 1 }
                    },
                ]}},
            ]}
        });
        let tree = walk(&spec, &raw).unwrap();
        assert_eq!(tree.depth(), 2);
        let hours = tree.get("pod-a").unwrap().as_nested().unwrap();
        assert_eq!(
            hours.get("2023-08-14T09:00:00.000Z").unwrap().as_count(),
            Some(1)
        );
    }

    #[test]
    fn test_missing_agg_name_is_malformed_response() {
        let spec = AggSpec::terms("sources", "source", 10);
        let err = walk(&spec, &json!({})).unwrap_err();
        assert!(matches!(err, QueryError::MalformedResponse(_)));
    }

    #[test]
    fn test_missing_buckets_is_malformed_response() {
        let spec = AggSpec::terms("sources", "source", 10);
        let err = walk(&spec, &json!({ "sources": { "value": 3 } })).unwrap_err();
        assert!(matches!(err, QueryError::MalformedResponse(_)));
    }

    #[test]
    fn test_metric_value() {
        let raw = json!({ "unique_source": { "value": 42 } });
        assert_eq!(metric_value("unique_source", &raw).unwrap(), 42);
        assert!(metric_value("missing", &raw).is_err());
    }

    #[test]
    fn test_tree_serializes_as_ordered_map() {
        let spec = AggSpec::terms("sources", "source", 10);
        let raw = json!({
            "sources": { "buckets": [
                { "key": "b", "doc_count": 2 },
                { "key": "a", "doc_count": 1 },
            ]}
        });
        let tree = walk(&spec, &raw).unwrap();
        let rendered = serde_json::to_string(&tree).unwrap();
        assert_eq!(rendered, r#"{"b":2,"a":1}"#);
    }
}
