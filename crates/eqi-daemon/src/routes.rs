//! Axum router and all HTTP handlers for eqi-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Tests compose the bare router directly.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use eqi_engine::{check_target_sum, EngineError};
use eqi_store::{HoldingData, PortfolioError, PortfolioService, StoreError};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    api_types::{
        ErrorResponse, HealthResponse, PortfolioResponse, RebalanceRequest, SimulationsResponse,
    },
    rebalance::RebalanceError,
    state::{uptime_secs, AppState},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/users/:user_id/portfolio", get(get_portfolio))
        .route(
            "/v1/users/:user_id/portfolio/:ticker",
            put(upsert_holding).delete(remove_holding),
        )
        .route("/v1/users/:user_id/prices", get(get_prices))
        .route("/v1/users/:user_id/rebalance", post(rebalance_preview))
        .route("/v1/users/:user_id/rebalance/confirm", post(rebalance_confirm))
        .route("/v1/users/:user_id/simulations", get(list_simulations))
        .route("/v1/users/:user_id/simulations/:id", get(get_simulation))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
                code: self.code.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        let code = match e {
            EngineError::InvalidContribution { .. } => "invalid_contribution",
            EngineError::InvalidHoldings(_) => "invalid_holding",
        };
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, code, e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        error!(error = %e, "store failure");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            format!("{e}; please try again"),
        )
    }
}

impl From<PortfolioError> for ApiError {
    fn from(e: PortfolioError) -> Self {
        match e {
            PortfolioError::Invalid(e) => e.into(),
            PortfolioError::Store(e) => e.into(),
        }
    }
}

impl From<RebalanceError> for ApiError {
    fn from(e: RebalanceError) -> Self {
        match e {
            RebalanceError::Invalid(e) => e.into(),
            RebalanceError::Store(e) => e.into(),
        }
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            uptime_secs: uptime_secs(),
            store: st.store_backend.to_string(),
            price_provider: st.prices.provider_name().to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// Portfolio
// ---------------------------------------------------------------------------

fn portfolio_response(st: &AppState, svc: &PortfolioService) -> PortfolioResponse {
    let holdings = svc.holdings();
    PortfolioResponse {
        user_id: svc.user_id().to_string(),
        target_sum: check_target_sum(&holdings, st.target_sum_epsilon),
        holdings,
    }
}

pub(crate) async fn get_portfolio(
    State(st): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<PortfolioResponse> {
    let svc = PortfolioService::load(Arc::clone(&st.portfolios), user_id).await?;
    Ok(Json(portfolio_response(&st, &svc)))
}

pub(crate) async fn upsert_holding(
    State(st): State<Arc<AppState>>,
    Path((user_id, ticker)): Path<(String, String)>,
    body: Result<Json<HoldingData>, JsonRejection>,
) -> ApiResult<PortfolioResponse> {
    let Json(data) = body.map_err(|rej| {
        ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_holding",
            rej.body_text(),
        )
    })?;

    let mut svc = PortfolioService::load(Arc::clone(&st.portfolios), user_id).await?;
    let ticker = svc.upsert(&ticker, data).await?;
    info!(user_id = svc.user_id(), ticker = %ticker, "holding upserted");
    Ok(Json(portfolio_response(&st, &svc)))
}

pub(crate) async fn remove_holding(
    State(st): State<Arc<AppState>>,
    Path((user_id, ticker)): Path<(String, String)>,
) -> ApiResult<PortfolioResponse> {
    let mut svc = PortfolioService::load(Arc::clone(&st.portfolios), user_id).await?;
    if !svc.remove(&ticker).await? {
        return Err(ApiError::not_found(format!(
            "ticker '{}' is not in the portfolio",
            ticker.trim()
        )));
    }
    info!(user_id = svc.user_id(), ticker = %ticker, "holding removed");
    Ok(Json(portfolio_response(&st, &svc)))
}

// ---------------------------------------------------------------------------
// GET /v1/users/{user_id}/prices
// ---------------------------------------------------------------------------

pub(crate) async fn get_prices(
    State(st): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Response, ApiError> {
    let svc = PortfolioService::load(Arc::clone(&st.portfolios), user_id).await?;
    let report = st.prices.get_prices(&svc.tickers()).await;
    Ok((StatusCode::OK, Json(report)).into_response())
}

// ---------------------------------------------------------------------------
// POST /v1/users/{user_id}/rebalance[/confirm]
// ---------------------------------------------------------------------------

fn rebalance_body(
    body: Result<Json<RebalanceRequest>, JsonRejection>,
) -> Result<RebalanceRequest, ApiError> {
    body.map(|Json(req)| req).map_err(|rej| {
        ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_contribution",
            format!("please enter a valid contribution amount ({})", rej.body_text()),
        )
    })
}

pub(crate) async fn rebalance_preview(
    State(st): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    body: Result<Json<RebalanceRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let req = rebalance_body(body)?;
    let preview = st.rebalancer().preview(&user_id, &req.contribution).await?;
    Ok((StatusCode::OK, Json(preview)).into_response())
}

pub(crate) async fn rebalance_confirm(
    State(st): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    body: Result<Json<RebalanceRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let req = rebalance_body(body)?;
    let confirmed = st.rebalancer().confirm(&user_id, &req.contribution).await?;
    let status = if confirmed.simulation.is_some() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(confirmed)).into_response())
}

// ---------------------------------------------------------------------------
// Simulations
// ---------------------------------------------------------------------------

pub(crate) async fn list_simulations(
    State(st): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<SimulationsResponse> {
    let simulations = st.simulations.list_simulations(&user_id).await?;
    Ok(Json(SimulationsResponse {
        user_id,
        simulations,
    }))
}

pub(crate) async fn get_simulation(
    State(st): State<Arc<AppState>>,
    Path((user_id, id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let id = Uuid::parse_str(id.trim()).map_err(|_| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("'{id}' is not a simulation id"),
        )
    })?;

    match st.simulations.get_simulation(&user_id, id).await? {
        Some(sim) => Ok((StatusCode::OK, Json(sim)).into_response()),
        None => Err(ApiError::not_found(format!("simulation {id} not found"))),
    }
}
