use anyhow::{Context, Result};
use serde::Deserialize;

// Default constants
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_SERVER_NAME: &str = "ServiceRadar SRQL";

pub const DEFAULT_LIMIT: u64 = 1000;
pub const DEFAULT_KEY_CAP: usize = 10_000;
pub const DEFAULT_MAX_HOPS: u32 = 6;
pub const DEFAULT_MAX_IN_FLIGHT: usize = 32;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_REALTIME_THRESHOLD_SECONDS: u64 = 3600;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;
pub const DEFAULT_BASE_DELAY_MS: u64 = 250;
pub const DEFAULT_MAX_DELAY_MS: u64 = 2000;

pub const DEFAULT_PLAN_CACHE_CAPACITY: u64 = 1024;
pub const DEFAULT_PLAN_CACHE_TTL_SECONDS: u64 = 300;

pub const DEFAULT_CATALOG_REFRESH_SECONDS: u64 = 60;

/// Per-query resource limits, with per-request overrides applied on top.
#[derive(Debug, Deserialize, Clone)]
pub struct QueryLimits {
    /// Maximum correlating-key set delivered to a dependent step in one
    /// batch; larger sets switch to chunked execution.
    #[serde(default = "default_key_cap")]
    pub key_cap: usize,
    /// Maximum graph traversal depth; also clamped by the store's own limit.
    #[serde(default = "default_max_hops")]
    pub max_hops: u32,
    /// Maximum concurrently executing queries.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Deadline applied to the whole query unless the request overrides it.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Applied when the query carries no LIMIT of its own.
    #[serde(default = "default_limit")]
    pub default_limit: u64,
    /// Queries whose oldest time bound is within this window of the present
    /// read the raw relation; older queries read the precomputed aggregate.
    #[serde(default = "default_realtime_threshold")]
    pub realtime_threshold_seconds: u64,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            key_cap: default_key_cap(),
            max_hops: default_max_hops(),
            max_in_flight: default_max_in_flight(),
            timeout_seconds: default_timeout_seconds(),
            default_limit: default_limit(),
            realtime_threshold_seconds: default_realtime_threshold(),
        }
    }
}

fn default_key_cap() -> usize {
    DEFAULT_KEY_CAP
}
fn default_max_hops() -> u32 {
    DEFAULT_MAX_HOPS
}
fn default_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}
fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}
fn default_limit() -> u64 {
    DEFAULT_LIMIT
}
fn default_realtime_threshold() -> u64 {
    DEFAULT_REALTIME_THRESHOLD_SECONDS
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_server_name")]
    pub name: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            name: default_server_name(),
        }
    }
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_server_name() -> String {
    DEFAULT_SERVER_NAME.to_string()
}

/// Connection endpoints for the two store collaborators.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct StoreSettings {
    /// Connection string for the time-series relational store.
    #[serde(default)]
    pub timeseries_url: String,
    /// Base URL of the graph store's HTTP cursor API.
    #[serde(default)]
    pub graph_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogSettings {
    /// URL of the schema catalog service; the built-in registry is used
    /// when unset.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_catalog_refresh")]
    pub refresh_seconds: u64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            url: None,
            refresh_seconds: default_catalog_refresh(),
        }
    }
}

fn default_catalog_refresh() -> u64 {
    DEFAULT_CATALOG_REFRESH_SECONDS
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlanCacheConfig {
    #[serde(default = "default_plan_cache_capacity")]
    pub capacity: u64,
    #[serde(default = "default_plan_cache_ttl")]
    pub ttl_seconds: u64,
}

impl Default for PlanCacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_plan_cache_capacity(),
            ttl_seconds: default_plan_cache_ttl(),
        }
    }
}

fn default_plan_cache_capacity() -> u64 {
    DEFAULT_PLAN_CACHE_CAPACITY
}
fn default_plan_cache_ttl() -> u64 {
    DEFAULT_PLAN_CACHE_TTL_SECONDS
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub query_limits: QueryLimits,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub stores: StoreSettings,
    #[serde(default)]
    pub catalog: CatalogSettings,
    #[serde(default)]
    pub plan_cache: PlanCacheConfig,
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let builder = config::Config::builder();

        let builder = if std::path::Path::new(path).exists() {
            builder.add_source(config::File::with_name(path))
        } else {
            builder
        };

        // Map SRQL_QUERY_LIMITS__KEY_CAP to query_limits.key_cap, etc.
        let builder = builder.add_source(
            config::Environment::with_prefix("SRQL")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build().context("Failed to build configuration")?;

        let app_config: AppConfig = cfg
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(app_config)
    }
}
