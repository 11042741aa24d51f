//! Rebalance orchestration: store -> prices -> engine -> optional log append.
//!
//! Handlers never call the engine directly; everything that turns a user's
//! stored portfolio and a contribution into allocations goes through
//! [`RebalanceService`].

use std::fmt;
use std::sync::Arc;

use eqi_engine::{
    check_target_sum, parse_contribution, rebalance, validate_contribution, AllocationOutcome,
    EngineError, TargetSumCheck,
};
use eqi_prices::PriceService;
use eqi_store::{
    NewSimulation, PortfolioService, PortfolioStore, Simulation, SimulationLog, StoreError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Contribution as the client sent it: a JSON number or a string such as
/// `"1000,50"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContributionInput {
    Number(f64),
    Text(String),
}

impl ContributionInput {
    pub fn resolve(&self) -> Result<f64, EngineError> {
        match self {
            Self::Number(v) => validate_contribution(*v),
            Self::Text(s) => parse_contribution(s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeCode {
    EmptyPortfolio,
    NoEligibleHoldings,
    NothingAffordable,
}

/// Non-error outcome the user should be told about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub code: NoticeCode,
    pub message: String,
}

impl Notice {
    fn new(code: NoticeCode) -> Self {
        let message = match code {
            NoticeCode::EmptyPortfolio => "your portfolio has no holdings yet",
            NoticeCode::NoEligibleHoldings => "no holding is marked Comprar; nothing to buy",
            NoticeCode::NothingAffordable => {
                "the contribution is too small to buy a whole share of any eligible holding"
            }
        };
        Self {
            code,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalancePreview {
    pub contribution: f64,
    #[serde(flatten)]
    pub outcome: AllocationOutcome,
    pub total_invested: f64,
    pub unallocated: f64,
    pub target_sum: TargetSumCheck,
    pub price_warnings: Vec<String>,
    pub notice: Option<Notice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedRebalance {
    #[serde(flatten)]
    pub preview: RebalancePreview,
    /// `None` when nothing was bought; such runs are not logged.
    pub simulation: Option<Simulation>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RebalanceError {
    Invalid(EngineError),
    Store(StoreError),
}

impl fmt::Display for RebalanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(e) => write!(f, "{e}"),
            Self::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RebalanceError {}

impl From<EngineError> for RebalanceError {
    fn from(e: EngineError) -> Self {
        Self::Invalid(e)
    }
}

impl From<StoreError> for RebalanceError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

pub struct RebalanceService {
    portfolios: Arc<dyn PortfolioStore>,
    simulations: Arc<dyn SimulationLog>,
    prices: Arc<PriceService>,
    target_sum_epsilon: f64,
}

impl RebalanceService {
    pub fn new(
        portfolios: Arc<dyn PortfolioStore>,
        simulations: Arc<dyn SimulationLog>,
        prices: Arc<PriceService>,
        target_sum_epsilon: f64,
    ) -> Self {
        Self {
            portfolios,
            simulations,
            prices,
            target_sum_epsilon,
        }
    }

    /// Compute allocations without writing anything.
    pub async fn preview(
        &self,
        user_id: &str,
        contribution: &ContributionInput,
    ) -> Result<RebalancePreview, RebalanceError> {
        let contribution = contribution.resolve()?;

        let portfolio = PortfolioService::load(Arc::clone(&self.portfolios), user_id).await?;
        let holdings = portfolio.holdings();
        let target_sum = check_target_sum(&holdings, self.target_sum_epsilon);

        if holdings.is_empty() {
            return Ok(RebalancePreview {
                contribution,
                outcome: AllocationOutcome::default(),
                total_invested: 0.0,
                unallocated: contribution,
                target_sum,
                price_warnings: Vec::new(),
                notice: Some(Notice::new(NoticeCode::EmptyPortfolio)),
            });
        }

        let report = self.prices.get_prices(&portfolio.tickers()).await;
        let outcome = rebalance(&holdings, &report.prices, contribution)?;

        let notice = if outcome.eligible_count() == 0 {
            Some(Notice::new(NoticeCode::NoEligibleHoldings))
        } else if !outcome.has_purchases() {
            Some(Notice::new(NoticeCode::NothingAffordable))
        } else {
            None
        };

        debug!(
            user_id,
            contribution,
            invested = outcome.total_invested(),
            within_tolerance = target_sum.within_tolerance,
            "rebalance computed"
        );

        Ok(RebalancePreview {
            contribution,
            total_invested: outcome.total_invested(),
            unallocated: outcome.unallocated(contribution),
            outcome,
            target_sum,
            price_warnings: report.warnings,
            notice,
        })
    }

    /// Compute allocations and log the run when something was bought.
    pub async fn confirm(
        &self,
        user_id: &str,
        contribution: &ContributionInput,
    ) -> Result<ConfirmedRebalance, RebalanceError> {
        let preview = self.preview(user_id, contribution).await?;
        if !preview.outcome.has_purchases() {
            return Ok(ConfirmedRebalance {
                preview,
                simulation: None,
            });
        }

        let simulation = self
            .simulations
            .append_simulation(
                user_id,
                NewSimulation::from_outcome(preview.contribution, &preview.outcome),
            )
            .await?;
        info!(
            user_id,
            simulation_id = %simulation.id,
            amount = simulation.investment_amount,
            "simulation appended"
        );

        Ok(ConfirmedRebalance {
            preview,
            simulation: Some(simulation),
        })
    }
}
