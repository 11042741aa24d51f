use std::collections::BTreeMap;

use eqi_engine::{compute_allocations, enrich_holdings, price_map, Holding};
use eqi_store::{HoldingData, MemoryStore, NewSimulation, PortfolioStore, SimulationLog};
use uuid::Uuid;

fn sample_simulation(amount: f64) -> NewSimulation {
    let holdings = vec![Holding::buy("PETR4", 10, 100.0)];
    let prices = price_map([("PETR4", 25.5)]);
    let outcome = compute_allocations(&enrich_holdings(&holdings, &prices), amount);
    NewSimulation::from_outcome(amount, &outcome)
}

#[tokio::test]
async fn simulations_are_listed_newest_first_and_scoped_per_user() {
    let store = MemoryStore::new();

    let first = store.append_simulation("alice", sample_simulation(100.0)).await.unwrap();
    let second = store.append_simulation("alice", sample_simulation(200.0)).await.unwrap();
    store.append_simulation("bob", sample_simulation(300.0)).await.unwrap();

    assert_ne!(first.id, second.id);

    let list = store.list_simulations("alice").await.unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].id, second.id);
    assert_eq!(list[1].id, first.id);
    assert!(list[0].date >= list[1].date);

    assert!(store.list_simulations("carol").await.unwrap().is_empty());
}

#[tokio::test]
async fn get_simulation_does_not_cross_users() {
    let store = MemoryStore::new();
    let sim = store.append_simulation("alice", sample_simulation(100.0)).await.unwrap();

    let got = store.get_simulation("alice", sim.id).await.unwrap();
    assert_eq!(got.as_ref(), Some(&sim));
    assert_eq!(got.unwrap().allocations[0].ticker, "PETR4");

    assert!(store.get_simulation("bob", sim.id).await.unwrap().is_none());
    assert!(store.get_simulation("alice", Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn seeded_portfolio_is_visible() {
    let mut p = BTreeMap::new();
    p.insert(
        "VALE3".to_string(),
        HoldingData {
            quantity: 15,
            target_percentage: 30.0,
            user_recommendation: "Aguardar".parse().unwrap(),
        },
    );
    let store = MemoryStore::with_portfolio("alice", p.clone());

    assert_eq!(store.get_portfolio("alice").await.unwrap(), p);
    assert!(store.get_portfolio("bob").await.unwrap().is_empty());
    assert!(store.remove_holding("alice", "VALE3").await.unwrap());
    assert!(!store.remove_holding("bob", "VALE3").await.unwrap());
}
