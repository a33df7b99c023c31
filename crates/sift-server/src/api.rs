//! # API Handlers
//!
//! Axum handlers mapping JSON routes onto [`LogStore`] operations.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use sift_core::{HydratedBatch, Record};
use sift_search::agg::AggTree;
use sift_search::service::ProjectionIds;
use sift_search::QueryError;

use crate::AppState;

#[derive(Serialize)]
pub struct ApiError {
    error: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

fn fail(err: QueryError) -> (StatusCode, Json<ApiError>) {
    let status = match &err {
        QueryError::BackendUnavailable(_) => StatusCode::BAD_GATEWAY,
        QueryError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
        QueryError::Hydration(_) => StatusCode::UNPROCESSABLE_ENTITY,
        QueryError::CursorExpired => StatusCode::GATEWAY_TIMEOUT,
    };
    tracing::warn!("request failed: {}", err);
    (
        status,
        Json(ApiError {
            error: err.to_string(),
        }),
    )
}

/// Records plus any per-record hydration failures (populated only under
/// the collect-errors policy).
#[derive(Serialize)]
pub struct RecordsResponse {
    pub records: Vec<Record>,
    pub failures: Vec<String>,
    pub total: usize,
}

impl From<HydratedBatch> for RecordsResponse {
    fn from(batch: HydratedBatch) -> Self {
        Self {
            total: batch.records.len(),
            records: batch.records,
            failures: batch.failures.iter().map(|f| f.to_string()).collect(),
        }
    }
}

// =============================================================================
// Retrieval
// =============================================================================

#[derive(Deserialize)]
pub struct RetrieveParams {
    /// "scroll" (default) or "paged"
    pub mode: Option<String>,
}

pub async fn retrieve(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RetrieveParams>,
) -> ApiResult<RecordsResponse> {
    let batch = match params.mode.as_deref() {
        Some("paged") => state.store.retrieve_paged().await,
        _ => state.store.retrieve_all().await,
    }
    .map_err(fail)?;
    Ok(Json(batch.into()))
}

#[derive(Deserialize)]
pub struct TimeRangeParams {
    pub start: String,
    pub end: String,
}

pub async fn filter_by_time(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TimeRangeParams>,
) -> ApiResult<RecordsResponse> {
    let batch = state
        .store
        .filter_by_time(&params.start, &params.end)
        .await
        .map_err(fail)?;
    Ok(Json(batch.into()))
}

#[derive(Deserialize)]
pub struct TermsRequest {
    pub field: String,
    pub values: Vec<String>,
    /// Bare terms query sized for wide result sets, instead of the
    /// must+filter composition.
    #[serde(default)]
    pub dynamic: bool,
}

pub async fn filter_by_terms(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TermsRequest>,
) -> ApiResult<RecordsResponse> {
    let batch = if req.dynamic {
        state
            .store
            .filter_by_terms_dynamic(&req.field, &req.values)
            .await
    } else {
        state.store.filter_by_terms(&req.field, &req.values).await
    }
    .map_err(fail)?;
    Ok(Json(batch.into()))
}

// =============================================================================
// Aggregation
// =============================================================================

#[derive(Deserialize)]
pub struct BucketParams {
    pub max_buckets: Option<usize>,
}

pub async fn group_by(
    State(state): State<Arc<AppState>>,
    Path(field): Path<String>,
    Query(params): Query<BucketParams>,
) -> ApiResult<AggTree> {
    let tree = state
        .store
        .group_by(&field, params.max_buckets)
        .await
        .map_err(fail)?;
    Ok(Json(tree))
}

#[derive(Deserialize)]
pub struct NestedParams {
    pub field1: String,
    pub field2: String,
    pub max_buckets: Option<usize>,
}

pub async fn nested_group_by(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NestedParams>,
) -> ApiResult<AggTree> {
    let tree = state
        .store
        .nested_group_by(&params.field1, &params.field2, params.max_buckets)
        .await
        .map_err(fail)?;
    Ok(Json(tree))
}

#[derive(Deserialize)]
pub struct UniqueParams {
    pub group: String,
    pub unique: String,
    pub max_buckets: Option<usize>,
}

pub async fn unique_count(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UniqueParams>,
) -> ApiResult<AggTree> {
    let tree = state
        .store
        .unique_count_by(&params.group, &params.unique, params.max_buckets)
        .await
        .map_err(fail)?;
    Ok(Json(tree))
}

pub async fn hourly_sources(State(state): State<Arc<AppState>>) -> ApiResult<AggTree> {
    let tree = state.store.source_hourly_unique_dates().await.map_err(fail)?;
    Ok(Json(tree))
}

#[derive(Serialize)]
pub struct CardinalityResponse {
    pub field: String,
    pub cardinality: u64,
}

pub async fn cardinality(
    State(state): State<Arc<AppState>>,
    Path(field): Path<String>,
) -> ApiResult<CardinalityResponse> {
    let cardinality = state.store.cardinality_of(&field).await.map_err(fail)?;
    Ok(Json(CardinalityResponse { field, cardinality }))
}

// =============================================================================
// Projection
// =============================================================================

#[derive(Deserialize)]
pub struct ProjectRequest {
    pub fields: Vec<String>,
    /// Legacy synthetic row numbering instead of backend ids. Off by
    /// default.
    #[serde(default)]
    pub synthetic_ids: bool,
}

pub async fn project(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProjectRequest>,
) -> ApiResult<Vec<Map<String, Value>>> {
    let ids = if req.synthetic_ids {
        ProjectionIds::Synthetic
    } else {
        ProjectionIds::Backend
    };
    let rows = state.store.project(&req.fields, ids).await.map_err(fail)?;
    Ok(Json(rows))
}
