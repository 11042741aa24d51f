//! Request and response types for eqi-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No business logic lives here.

use eqi_engine::{Holding, TargetSumCheck};
use eqi_store::Simulation;
use serde::{Deserialize, Serialize};

use crate::rebalance::ContributionInput;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    pub uptime_secs: u64,
    pub store: String,
    pub price_provider: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// "invalid_contribution" | "invalid_holding" | "not_found" | "invalid_id" | "store_error"
    pub code: String,
}

// ---------------------------------------------------------------------------
// /v1/users/{user_id}/portfolio
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioResponse {
    pub user_id: String,
    pub holdings: Vec<Holding>,
    pub target_sum: TargetSumCheck,
}

// ---------------------------------------------------------------------------
// /v1/users/{user_id}/rebalance[/confirm]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceRequest {
    pub contribution: ContributionInput,
}

// ---------------------------------------------------------------------------
// /v1/users/{user_id}/simulations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationsResponse {
    pub user_id: String,
    pub simulations: Vec<Simulation>,
}
