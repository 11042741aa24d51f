//! `eqi simulations list|show`: read the confirmed-simulation log.

use anyhow::{anyhow, Context, Result};
use eqi_store::{PgStore, SimulationLog};
use uuid::Uuid;

async fn store() -> Result<PgStore> {
    let pool = eqi_store::connect_from_env().await?;
    Ok(PgStore::new(pool))
}

pub async fn list(user: &str) -> Result<()> {
    let sims = store().await?.list_simulations(user).await?;

    println!("user_id={} count={}", user, sims.len());
    for s in &sims {
        let purchases = s
            .allocations
            .iter()
            .filter(|a| a.quantity_to_acquire > 0)
            .count();
        println!(
            "simulation id={} date={} amount={:.2} value_before={:.2} value_after={:.2} purchases={}",
            s.id,
            s.date.to_rfc3339(),
            s.investment_amount,
            s.portfolio_value_before,
            s.portfolio_value_after,
            purchases
        );
    }
    Ok(())
}

pub async fn show(user: &str, id: &str) -> Result<()> {
    let id = Uuid::parse_str(id.trim()).context("invalid simulation id uuid")?;
    let sim = store()
        .await?
        .get_simulation(user, id)
        .await?
        .ok_or_else(|| anyhow!("simulation {id} not found for user {user}"))?;

    println!(
        "{}",
        serde_json::to_string_pretty(&sim).context("serialize simulation json failed")?
    );
    Ok(())
}
