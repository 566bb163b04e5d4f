//! SRQL Server: the HTTP API layer.
//!
//! Exposes the query engine via:
//! - **REST (8080)**: JSON query endpoint under `/api`.
//! - **Management**: `/health`, `/ready`, and Prometheus `/metrics`.
use anyhow::Context;
use axum::{response::IntoResponse, routing::get, Json, Router};
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use serde_json::json;
use srql_backends::http_graph::HttpGraphStore;
use srql_backends::postgres::PostgresTimeSeriesStore;
use srql_backends::{GraphStore, TimeSeriesStore};
use srql_catalog::{spawn_refresher, CatalogService, HttpCatalogService, SharedCatalog};
use srql_common::config::AppConfig;
use srql_runtime::QueryEngine;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub mod api;

// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static QUERY_COUNT: Lazy<IntCounter> = Lazy::new(|| {
    let opts = Opts::new("srql_queries_total", "Total number of queries executed");
    let counter = IntCounter::with_opts(opts).unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

pub static QUERY_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    let opts = Opts::new("srql_query_failures_total", "Total number of failed queries");
    let counter = IntCounter::with_opts(opts).unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

pub static ACTIVE_QUERIES: Lazy<IntGauge> = Lazy::new(|| {
    let opts = Opts::new("srql_active_queries", "Number of currently active queries");
    let gauge = IntGauge::with_opts(opts).unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

pub struct SrqlServer {
    config_path: String,
    observability_enabled: bool,
    extra_router: Router,
}

impl Default for SrqlServer {
    fn default() -> Self {
        Self {
            config_path: "config/srql.yaml".to_string(),
            observability_enabled: false,
            extra_router: Router::new(),
        }
    }
}

impl SrqlServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config_path: &str) -> Self {
        self.config_path = config_path.to_string();
        self
    }

    pub fn with_observability(mut self, enabled: bool) -> Self {
        self.observability_enabled = enabled;
        self
    }

    pub fn with_api_router(mut self, router: Router) -> Self {
        self.extra_router = router;
        self
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let config = AppConfig::from_file(&self.config_path)?;

        init_logging();

        // Store collaborators from the configured URLs.
        let timeseries: Arc<dyn TimeSeriesStore> = Arc::new(
            PostgresTimeSeriesStore::connect(&config.stores.timeseries_url)
                .await
                .context("Failed to connect to the time-series store")?,
        );
        let graph: Arc<dyn GraphStore> = Arc::new(HttpGraphStore::new(&config.stores.graph_url));

        // Seed the catalog and keep it fresh in the background when a
        // catalog endpoint is configured.
        let catalog = SharedCatalog::with_builtin();
        if let Some(url) = &config.catalog.url {
            let service: Arc<dyn CatalogService> = Arc::new(HttpCatalogService::new(url));
            spawn_refresher(
                catalog.clone(),
                service,
                Duration::from_secs(config.catalog.refresh_seconds),
            );
        }

        let engine = Arc::new(QueryEngine::new(
            catalog,
            timeseries,
            graph,
            &config,
        ));

        let mut management = Router::new()
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler));
        if self.observability_enabled {
            management = management.route("/metrics", get(metrics_handler));
        }

        let api = api::create_api_router(engine).merge(self.extra_router);
        let app = management.nest("/api", api);

        let addr: SocketAddr = config.server.listen_addr.parse()?;
        info!("SRQL API server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to {addr}"))?;
        axum::serve(listener, app).await?;
        Ok(())
    }
}

/// Install the subscriber stack: stdout filtered by `RUST_LOG`, plus
/// JSON files for the `queries` and `errors` targets.
pub fn init_logging() {
    std::fs::create_dir_all("logs").ok();

    let queries_appender = tracing_appender::rolling::daily("logs", "queries.jsonl");
    let queries_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(queries_appender)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            metadata.target() == "queries"
        }));

    let errors_appender = tracing_appender::rolling::daily("logs", "errors.jsonl");
    let errors_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(errors_appender)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            metadata.target() == "errors"
        }));

    let stdout_layer = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(queries_layer)
        .with(errors_layer)
        .try_init()
        .ok();
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn ready_handler() -> impl IntoResponse {
    Json(json!({ "status": "ready" }))
}

async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (axum::http::StatusCode::INTERNAL_SERVER_ERROR, String::new());
    }
    (
        axum::http::StatusCode::OK,
        String::from_utf8_lossy(&buffer).into_owned(),
    )
}
