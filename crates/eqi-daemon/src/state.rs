//! Shared runtime state for eqi-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. Backends sit behind
//! trait objects so tests can swap in the memory store and static quotes.

use std::sync::Arc;

use anyhow::{Context, Result};
use eqi_config::{AppConfig, ResolvedSecrets, StoreBackend};
use eqi_engine::PriceMap;
use eqi_prices::PriceService;
use eqi_store::{MemoryStore, PgStore, PortfolioStore, SimulationLog};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::rebalance::RebalanceService;

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Clone)]
pub struct AppState {
    pub build: BuildInfo,
    /// "memory" | "postgres"
    pub store_backend: &'static str,
    pub portfolios: Arc<dyn PortfolioStore>,
    pub simulations: Arc<dyn SimulationLog>,
    pub prices: Arc<PriceService>,
    pub target_sum_epsilon: f64,
}

impl AppState {
    pub fn new(
        store_backend: &'static str,
        portfolios: Arc<dyn PortfolioStore>,
        simulations: Arc<dyn SimulationLog>,
        prices: Arc<PriceService>,
        target_sum_epsilon: f64,
    ) -> Self {
        Self {
            build: BuildInfo {
                service: "eqi-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            store_backend,
            portfolios,
            simulations,
            prices,
            target_sum_epsilon,
        }
    }

    /// Memory store + static quotes. Used by tests and the zero-config boot.
    pub fn in_memory(quotes: PriceMap) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(
            "memory",
            store.clone(),
            store,
            Arc::new(PriceService::with_static_quotes(quotes)),
            eqi_engine::DEFAULT_TARGET_SUM_EPSILON,
        )
    }

    /// Wire backends named by the config. Postgres connects via
    /// `EQI_DATABASE_URL` and applies migrations.
    pub async fn from_config(cfg: &AppConfig, secrets: &ResolvedSecrets) -> Result<Self> {
        let prices = Arc::new(
            PriceService::from_config(&cfg.prices, secrets).context("price service init failed")?,
        );
        info!(provider = prices.provider_name(), "price service ready");

        let epsilon = cfg.allocation.target_sum_epsilon;
        match cfg.store.backend {
            StoreBackend::Memory => {
                let store = Arc::new(MemoryStore::new());
                Ok(Self::new("memory", store.clone(), store, prices, epsilon))
            }
            StoreBackend::Postgres => {
                let store = Arc::new(
                    PgStore::connect_and_migrate()
                        .await
                        .context("postgres store init failed")?,
                );
                Ok(Self::new("postgres", store.clone(), store, prices, epsilon))
            }
        }
    }

    pub fn rebalancer(&self) -> RebalanceService {
        RebalanceService::new(
            Arc::clone(&self.portfolios),
            Arc::clone(&self.simulations),
            Arc::clone(&self.prices),
            self.target_sum_epsilon,
        )
    }
}

/// Seconds since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}
