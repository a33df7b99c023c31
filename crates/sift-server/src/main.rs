//! # sift-server — HTTP surface for the log query gateway
//!
//! Thin wiring only: parse args, load config, build the
//! [`LogStore`] over an Elasticsearch backend, and expose the
//! caller-facing operations as JSON routes. All query/aggregation logic
//! lives in `sift-search`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sift_core::HydrationPolicy;
use sift_search::backend::ElasticBackend;
use sift_search::{LogStore, StoreConfig};

mod api;

// =============================================================================
// CLI
// =============================================================================

#[derive(Parser)]
#[command(name = "sift-server", version, about = "SIFT log query gateway")]
struct Args {
    /// Server bind address
    #[arg(long, default_value = "127.0.0.1:3100")]
    bind: String,

    /// Path to config file
    #[arg(long, default_value = "sift.toml")]
    config: PathBuf,

    /// Elasticsearch base URL (overrides config)
    #[arg(long)]
    backend_url: Option<String>,
}

// =============================================================================
// Config
// =============================================================================

#[derive(Deserialize, Default, Clone)]
struct Config {
    #[serde(default)]
    backend: BackendConfig,
    #[serde(default)]
    store: StoreSection,
}

#[derive(Deserialize, Clone)]
struct BackendConfig {
    #[serde(default = "default_backend_url")]
    url: String,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Deserialize, Clone)]
struct StoreSection {
    #[serde(default = "default_index")]
    index: String,
    #[serde(default = "default_page_size")]
    page_size: usize,
    #[serde(default = "default_scroll_page_size")]
    scroll_page_size: usize,
    #[serde(default = "default_keep_alive_secs")]
    keep_alive_secs: u64,
    #[serde(default = "default_filter_page_size")]
    filter_page_size: usize,
    #[serde(default = "default_wide_page_size")]
    wide_page_size: usize,
    #[serde(default = "default_max_buckets")]
    max_buckets: usize,
    /// "abort" (default) or "collect"
    #[serde(default = "default_hydration_policy")]
    hydration_policy: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            index: default_index(),
            page_size: default_page_size(),
            scroll_page_size: default_scroll_page_size(),
            keep_alive_secs: default_keep_alive_secs(),
            filter_page_size: default_filter_page_size(),
            wide_page_size: default_wide_page_size(),
            max_buckets: default_max_buckets(),
            hydration_policy: default_hydration_policy(),
        }
    }
}

fn default_backend_url() -> String {
    "http://127.0.0.1:9200".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_index() -> String {
    "loganalyzer".into()
}
fn default_page_size() -> usize {
    1000
}
fn default_scroll_page_size() -> usize {
    100
}
fn default_keep_alive_secs() -> u64 {
    60
}
fn default_filter_page_size() -> usize {
    4000
}
fn default_wide_page_size() -> usize {
    10_000
}
fn default_max_buckets() -> usize {
    1000
}
fn default_hydration_policy() -> String {
    "abort".into()
}

impl StoreSection {
    fn to_store_config(&self) -> StoreConfig {
        StoreConfig {
            index: self.index.clone(),
            page_size: self.page_size,
            scroll_page_size: self.scroll_page_size,
            keep_alive: Duration::from_secs(self.keep_alive_secs),
            filter_page_size: self.filter_page_size,
            wide_page_size: self.wide_page_size,
            max_buckets: self.max_buckets,
            policy: match self.hydration_policy.as_str() {
                "collect" => HydrationPolicy::CollectErrors,
                _ => HydrationPolicy::AbortOnFirst,
            },
        }
    }
}

// =============================================================================
// Application State
// =============================================================================

pub struct AppState {
    pub store: LogStore<ElasticBackend>,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "sift_server=info,sift_search=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = if args.config.exists() {
        let content = std::fs::read_to_string(&args.config).unwrap_or_default();
        toml::from_str(&content).unwrap_or_default()
    } else {
        Config::default()
    };

    let backend_url = args.backend_url.unwrap_or_else(|| config.backend.url.clone());
    let backend = match ElasticBackend::new(
        &backend_url,
        Duration::from_secs(config.backend.timeout_secs),
    ) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!("Failed to build backend client: {}", e);
            std::process::exit(1);
        }
    };

    let store = LogStore::new(backend, config.store.to_store_config());
    let state = Arc::new(AppState { store });

    let app = Router::new()
        .route("/api/logs", get(api::retrieve))
        .route("/api/logs/filter/time", get(api::filter_by_time))
        .route("/api/logs/filter/terms", post(api::filter_by_terms))
        .route("/api/aggs/group-by/:field", get(api::group_by))
        .route("/api/aggs/nested", get(api::nested_group_by))
        .route("/api/aggs/unique", get(api::unique_count))
        .route("/api/aggs/hourly-sources", get(api::hourly_sources))
        .route("/api/aggs/cardinality/:field", get(api::cardinality))
        .route("/api/project", post(api::project))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr: SocketAddr = args.bind.parse().expect("Invalid bind address");
    tracing::info!("sift-server listening on http://{}", addr);
    tracing::info!("backend: {}", backend_url);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
