//! # Query Spec Builder
//!
//! Pure, stateless constructors mapping a retrieval intent into a
//! backend-agnostic [`QuerySpec`], plus the translation of that spec into
//! the backend's search DSL. Page geometry (`from`/`size`) is set by the
//! pagination controllers, never by the intent builders.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A backend-agnostic predicate tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Matches every record.
    MatchAll,
    /// Bounds a field between two values, both bounds inclusive.
    Range {
        field: String,
        gte: String,
        lte: String,
    },
    /// Matches any record whose field equals one of the values.
    /// An empty value set matches nothing — that is this crate's
    /// contract, not backend-dependent behavior.
    Terms { field: String, values: Vec<String> },
    /// "must + filter" boolean composition.
    Bool {
        must: Box<Predicate>,
        filter: Box<Predicate>,
    },
}

impl Predicate {
    pub fn match_all() -> Self {
        Self::MatchAll
    }

    pub fn range(field: impl Into<String>, gte: impl Into<String>, lte: impl Into<String>) -> Self {
        Self::Range {
            field: field.into(),
            gte: gte.into(),
            lte: lte.into(),
        }
    }

    pub fn terms<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Terms {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Compose a base predicate with a required filter.
    pub fn must_filter(must: Predicate, filter: Predicate) -> Self {
        Self::Bool {
            must: Box::new(must),
            filter: Box::new(filter),
        }
    }

    /// Translate into the backend's query DSL.
    pub fn to_query_json(&self) -> Value {
        match self {
            Self::MatchAll => json!({ "match_all": {} }),
            Self::Range { field, gte, lte } => json!({
                "range": { field: { "gte": gte, "lte": lte } }
            }),
            Self::Terms { field, values } => {
                if values.is_empty() {
                    // Empty terms must match zero records regardless of
                    // what the backend would do with an empty list.
                    json!({ "bool": { "must_not": { "match_all": {} } } })
                } else {
                    json!({ "terms": { field: values } })
                }
            }
            Self::Bool { must, filter } => json!({
                "bool": {
                    "must": must.to_query_json(),
                    "filter": filter.to_query_json(),
                }
            }),
        }
    }
}

/// Backend-agnostic description of one search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Target collection name, passed through unmodified.
    pub index: String,
    pub predicate: Predicate,
    /// Start offset.
    pub from: usize,
    /// Requested page size.
    pub size: usize,
    /// Optional field-projection inclusion list, in caller order.
    pub source_includes: Option<Vec<String>>,
}

impl QuerySpec {
    pub fn new(index: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            index: index.into(),
            predicate,
            from: 0,
            size: 10,
            source_includes: None,
        }
    }

    /// Set page geometry. Controllers call this per round trip.
    pub fn with_page(mut self, from: usize, size: usize) -> Self {
        self.from = from;
        self.size = size;
        self
    }

    /// Restrict returned fields to exactly this list.
    pub fn with_includes<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_includes = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Translate into the backend's search request body.
    pub fn to_search_body(&self) -> Value {
        let mut body = json!({
            "query": self.predicate.to_query_json(),
            "from": self.from,
            "size": self.size,
        });
        if let Some(includes) = &self.source_includes {
            body["_source"] = json!({ "includes": includes });
        }
        body
    }
}
