//! Postgres backend.
//!
//! Schema lives in `migrations/`; run [`migrate`] before first use.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use eqi_engine::{AllocationResult, Recommendation};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    HoldingData, NewSimulation, Portfolio, PortfolioStore, Simulation, SimulationLog, StoreError,
};

pub const ENV_DB_URL: &str = "EQI_DATABASE_URL";

/// Connect to Postgres using EQI_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url =
        std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbStatus {
    pub ok: bool,
    pub has_holdings_table: bool,
    pub has_simulations_table: bool,
}

impl DbStatus {
    pub fn is_migrated(&self) -> bool {
        self.has_holdings_table && self.has_simulations_table
    }
}

/// Connectivity + schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_holdings_table: table_exists(pool, "holdings").await?,
        has_simulations_table: table_exists(pool, "simulations").await?,
    })
}

async fn table_exists(pool: &PgPool, name: &str) -> Result<bool> {
    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema = 'public' and table_name = $1
        )
        "#,
    )
    .bind(name)
    .fetch_one(pool)
    .await
    .with_context(|| format!("status table-exists query failed for {name}"))?;
    Ok(exists)
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect via [`connect_from_env`] and apply migrations.
    pub async fn connect_and_migrate() -> Result<Self> {
        let pool = connect_from_env().await?;
        migrate(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn holding_from_row(row: &PgRow) -> Result<(String, HoldingData), StoreError> {
    let ticker: String = row
        .try_get("ticker")
        .map_err(|e| StoreError::corrupt("holding", e))?;
    let quantity: i64 = row
        .try_get("quantity")
        .map_err(|e| StoreError::corrupt("holding", e))?;
    let target_percentage: f64 = row
        .try_get("target_percentage")
        .map_err(|e| StoreError::corrupt("holding", e))?;
    let rec: String = row
        .try_get("user_recommendation")
        .map_err(|e| StoreError::corrupt("holding", e))?;

    let quantity = u64::try_from(quantity)
        .map_err(|e| StoreError::corrupt(format!("holding {ticker} quantity"), e))?;
    let user_recommendation = rec
        .parse::<Recommendation>()
        .map_err(|e| StoreError::corrupt(format!("holding {ticker} recommendation"), e))?;

    Ok((
        ticker,
        HoldingData {
            quantity,
            target_percentage,
            user_recommendation,
        },
    ))
}

fn simulation_from_row(row: &PgRow) -> Result<Simulation, StoreError> {
    let id: Uuid = row
        .try_get("simulation_id")
        .map_err(|e| StoreError::corrupt("simulation", e))?;
    let what = || format!("simulation {id}");
    let date: DateTime<Utc> = row
        .try_get("created_at_utc")
        .map_err(|e| StoreError::corrupt(what(), e))?;
    let allocations_json: serde_json::Value = row
        .try_get("allocations")
        .map_err(|e| StoreError::corrupt(what(), e))?;
    let allocations: Vec<AllocationResult> =
        serde_json::from_value(allocations_json).map_err(|e| StoreError::corrupt(what(), e))?;

    Ok(Simulation {
        id,
        date,
        investment_amount: row
            .try_get("investment_amount")
            .map_err(|e| StoreError::corrupt(what(), e))?,
        portfolio_value_before: row
            .try_get("portfolio_value_before")
            .map_err(|e| StoreError::corrupt(what(), e))?,
        portfolio_value_after: row
            .try_get("portfolio_value_after")
            .map_err(|e| StoreError::corrupt(what(), e))?,
        allocations,
    })
}

const SIMULATION_COLUMNS: &str = "simulation_id, created_at_utc, investment_amount, \
     portfolio_value_before, portfolio_value_after, allocations";

#[async_trait::async_trait]
impl PortfolioStore for PgStore {
    async fn get_portfolio(&self, user_id: &str) -> Result<Portfolio, StoreError> {
        let rows = sqlx::query(
            r#"
            select ticker, quantity, target_percentage, user_recommendation
            from holdings
            where user_id = $1
            order by ticker
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::backend("get_portfolio", e))?;

        rows.iter().map(holding_from_row).collect()
    }

    async fn upsert_holding(
        &self,
        user_id: &str,
        ticker: &str,
        data: HoldingData,
    ) -> Result<(), StoreError> {
        let quantity =
            i64::try_from(data.quantity).map_err(|e| StoreError::backend("upsert_holding", e))?;

        sqlx::query(
            r#"
            insert into holdings (user_id, ticker, quantity, target_percentage, user_recommendation)
            values ($1, $2, $3, $4, $5)
            on conflict (user_id, ticker) do update
               set quantity = excluded.quantity,
                   target_percentage = excluded.target_percentage,
                   user_recommendation = excluded.user_recommendation,
                   updated_at_utc = now()
            "#,
        )
        .bind(user_id)
        .bind(ticker)
        .bind(quantity)
        .bind(data.target_percentage)
        .bind(data.user_recommendation.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::backend("upsert_holding", e))?;

        Ok(())
    }

    async fn remove_holding(&self, user_id: &str, ticker: &str) -> Result<bool, StoreError> {
        let res = sqlx::query("delete from holdings where user_id = $1 and ticker = $2")
            .bind(user_id)
            .bind(ticker)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::backend("remove_holding", e))?;
        Ok(res.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl SimulationLog for PgStore {
    async fn append_simulation(
        &self,
        user_id: &str,
        simulation: NewSimulation,
    ) -> Result<Simulation, StoreError> {
        let sim = Simulation::from_new(simulation);
        let allocations = serde_json::to_value(&sim.allocations)
            .map_err(|e| StoreError::backend("append_simulation", e))?;

        sqlx::query(
            r#"
            insert into simulations (
              simulation_id, user_id, created_at_utc, investment_amount,
              portfolio_value_before, portfolio_value_after, allocations
            ) values (
              $1, $2, $3, $4, $5, $6, $7
            )
            "#,
        )
        .bind(sim.id)
        .bind(user_id)
        .bind(sim.date)
        .bind(sim.investment_amount)
        .bind(sim.portfolio_value_before)
        .bind(sim.portfolio_value_after)
        .bind(&allocations)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::backend("append_simulation", e))?;

        Ok(sim)
    }

    async fn list_simulations(&self, user_id: &str) -> Result<Vec<Simulation>, StoreError> {
        let sql = format!(
            "select {SIMULATION_COLUMNS} from simulations \
             where user_id = $1 order by created_at_utc desc, seq desc"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::backend("list_simulations", e))?;

        rows.iter().map(simulation_from_row).collect()
    }

    async fn get_simulation(
        &self,
        user_id: &str,
        id: Uuid,
    ) -> Result<Option<Simulation>, StoreError> {
        let sql = format!(
            "select {SIMULATION_COLUMNS} from simulations \
             where user_id = $1 and simulation_id = $2"
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::backend("get_simulation", e))?;

        row.as_ref().map(simulation_from_row).transpose()
    }
}
