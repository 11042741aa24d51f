//! eqi-store
//!
//! Persistence for user portfolios and confirmed rebalancing simulations.
//!
//! Two backends implement the same traits: [`MemoryStore`] (default, tests)
//! and [`PgStore`] (Postgres via sqlx with embedded migrations).

pub mod memory;
pub mod pg;
pub mod service;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use eqi_engine::{AllocationOutcome, AllocationResult, Holding, Recommendation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use memory::MemoryStore;
pub use pg::{connect_from_env, migrate, status, DbStatus, PgStore, ENV_DB_URL};
pub use service::{normalize_ticker, PortfolioError, PortfolioService};

/// Stored per-ticker portfolio entry. The ticker is the map key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingData {
    pub quantity: u64,
    pub target_percentage: f64,
    #[serde(default)]
    pub user_recommendation: Recommendation,
}

impl HoldingData {
    pub fn into_holding(self, ticker: impl Into<String>) -> Holding {
        Holding {
            ticker: ticker.into(),
            quantity: self.quantity,
            target_percentage: self.target_percentage,
            user_recommendation: self.user_recommendation,
        }
    }
}

impl From<&Holding> for HoldingData {
    fn from(h: &Holding) -> Self {
        Self {
            quantity: h.quantity,
            target_percentage: h.target_percentage,
            user_recommendation: h.user_recommendation,
        }
    }
}

/// A user's holdings, ticker-ordered.
pub type Portfolio = BTreeMap<String, HoldingData>;

/// Simulation payload before the store assigns id and date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSimulation {
    pub investment_amount: f64,
    pub portfolio_value_before: f64,
    pub portfolio_value_after: f64,
    pub allocations: Vec<AllocationResult>,
}

impl NewSimulation {
    pub fn from_outcome(contribution: f64, outcome: &AllocationOutcome) -> Self {
        Self {
            investment_amount: contribution,
            portfolio_value_before: outcome.total_portfolio_value,
            portfolio_value_after: outcome.new_total_portfolio_value,
            allocations: outcome.allocations.clone(),
        }
    }
}

/// A confirmed rebalancing run. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Simulation {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub investment_amount: f64,
    pub portfolio_value_before: f64,
    pub portfolio_value_after: f64,
    pub allocations: Vec<AllocationResult>,
}

impl Simulation {
    pub(crate) fn from_new(new: NewSimulation) -> Self {
        Self {
            id: Uuid::new_v4(),
            // Postgres timestamptz keeps microseconds.
            date: Utc::now().trunc_subsecs(6),
            investment_amount: new.investment_amount,
            portfolio_value_before: new.portfolio_value_before,
            portfolio_value_after: new.portfolio_value_after,
            allocations: new.allocations,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Backend unreachable or the statement failed. Retryable.
    Backend { op: &'static str, message: String },
    /// A stored row could not be decoded.
    Corrupt { what: String, message: String },
}

impl StoreError {
    pub(crate) fn backend(op: &'static str, err: impl fmt::Display) -> Self {
        Self::Backend {
            op,
            message: err.to_string(),
        }
    }

    pub(crate) fn corrupt(what: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::Corrupt {
            what: what.into(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend { op, message } => write!(f, "store {op} failed: {message}"),
            Self::Corrupt { what, message } => write!(f, "corrupt stored {what}: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Per-user portfolio persistence.
#[async_trait::async_trait]
pub trait PortfolioStore: Send + Sync {
    async fn get_portfolio(&self, user_id: &str) -> Result<Portfolio, StoreError>;

    async fn upsert_holding(
        &self,
        user_id: &str,
        ticker: &str,
        data: HoldingData,
    ) -> Result<(), StoreError>;

    /// `Ok(false)` if the ticker was not in the portfolio.
    async fn remove_holding(&self, user_id: &str, ticker: &str) -> Result<bool, StoreError>;
}

/// Append-only log of confirmed simulations.
#[async_trait::async_trait]
pub trait SimulationLog: Send + Sync {
    async fn append_simulation(
        &self,
        user_id: &str,
        simulation: NewSimulation,
    ) -> Result<Simulation, StoreError>;

    /// Newest first.
    async fn list_simulations(&self, user_id: &str) -> Result<Vec<Simulation>, StoreError>;

    async fn get_simulation(&self, user_id: &str, id: Uuid)
        -> Result<Option<Simulation>, StoreError>;
}
