//! Typed view over the merged config document.
//!
//! Every field has a default so an empty config boots a usable in-memory
//! daemon with static quotes.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Env override for `server.addr`.
pub const ENV_DAEMON_ADDR: &str = "EQI_DAEMON_ADDR";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub prices: PricesConfig,
    pub allocation: AllocationConfig,
}

impl AppConfig {
    pub fn from_json(v: &Value) -> Result<Self> {
        serde_json::from_value(v.clone()).context("config does not match the expected schema")
    }

    /// `EQI_DAEMON_ADDR` wins over `server.addr` when it parses.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        if let Some(addr) = std::env::var(ENV_DAEMON_ADDR)
            .ok()
            .and_then(|s| s.parse().ok())
        {
            return Ok(addr);
        }
        self.server
            .addr
            .parse()
            .with_context(|| format!("invalid server.addr '{}'", self.server.addr))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8899".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceProviderKind {
    #[default]
    Static,
    Twelvedata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub use_stale_cache: bool,
    pub simulate: bool,
    pub default_price: f64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            use_stale_cache: true,
            simulate: true,
            default_price: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricesConfig {
    pub provider: PriceProviderKind,
    /// NAME of the env var holding the provider API key.
    pub api_key_env: String,
    pub base_url: Option<String>,
    pub cache_ttl_secs: u64,
    pub request_timeout_ms: u64,
    pub retry: RetryConfig,
    pub fallback: FallbackConfig,
    /// Quotes served by the `static` provider.
    pub static_quotes: BTreeMap<String, f64>,
}

impl Default for PricesConfig {
    fn default() -> Self {
        Self {
            provider: PriceProviderKind::Static,
            api_key_env: "EQI_TWELVEDATA_API_KEY".to_string(),
            base_url: None,
            cache_ttl_secs: 300,
            request_timeout_ms: 5_000,
            retry: RetryConfig::default(),
            fallback: FallbackConfig::default(),
            static_quotes: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    pub target_sum_epsilon: f64,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            target_sum_epsilon: 0.01,
        }
    }
}
