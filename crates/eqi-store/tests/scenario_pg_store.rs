//! DB-backed tests, skipped if EQI_DATABASE_URL is not set.

use eqi_engine::Recommendation;
use eqi_store::{HoldingData, NewSimulation, PgStore, PortfolioStore, SimulationLog};
use uuid::Uuid;

async fn store_or_skip() -> anyhow::Result<Option<PgStore>> {
    let url = match std::env::var(eqi_store::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: EQI_DATABASE_URL not set");
            return Ok(None);
        }
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await?;
    eqi_store::migrate(&pool).await?;
    Ok(Some(PgStore::new(pool)))
}

fn unique_user() -> String {
    format!("test-{}", Uuid::new_v4())
}

#[tokio::test]
async fn migrate_is_idempotent_and_status_sees_tables() -> anyhow::Result<()> {
    let Some(store) = store_or_skip().await? else {
        return Ok(());
    };
    eqi_store::migrate(store.pool()).await?;

    let st = eqi_store::status(store.pool()).await?;
    assert!(st.ok);
    assert!(st.is_migrated());
    Ok(())
}

#[tokio::test]
async fn holdings_upsert_and_remove() -> anyhow::Result<()> {
    let Some(store) = store_or_skip().await? else {
        return Ok(());
    };
    let user = unique_user();

    let data = HoldingData {
        quantity: 10,
        target_percentage: 20.0,
        user_recommendation: Recommendation::Sell,
    };
    store.upsert_holding(&user, "PETR4", data.clone()).await?;
    store
        .upsert_holding(&user, "PETR4", HoldingData { quantity: 12, ..data })
        .await?;

    let p = store.get_portfolio(&user).await?;
    assert_eq!(p.len(), 1);
    assert_eq!(p["PETR4"].quantity, 12);
    assert_eq!(p["PETR4"].user_recommendation, Recommendation::Sell);

    assert!(store.remove_holding(&user, "PETR4").await?);
    assert!(!store.remove_holding(&user, "PETR4").await?);
    Ok(())
}

#[tokio::test]
async fn simulations_round_trip_newest_first() -> anyhow::Result<()> {
    let Some(store) = store_or_skip().await? else {
        return Ok(());
    };
    let user = unique_user();
    let new = |amount: f64| NewSimulation {
        investment_amount: amount,
        portfolio_value_before: 100.0,
        portfolio_value_after: 100.0 + amount,
        allocations: vec![],
    };

    let a = store.append_simulation(&user, new(10.0)).await?;
    let b = store.append_simulation(&user, new(20.0)).await?;

    let list = store.list_simulations(&user).await?;
    assert_eq!(list.iter().map(|s| s.id).collect::<Vec<_>>(), vec![b.id, a.id]);

    let got = store.get_simulation(&user, a.id).await?;
    assert_eq!(got, Some(a));
    assert!(store.get_simulation("someone-else", b.id).await?.is_none());
    Ok(())
}
