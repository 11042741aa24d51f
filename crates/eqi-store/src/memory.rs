use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    HoldingData, NewSimulation, Portfolio, PortfolioStore, Simulation, SimulationLog, StoreError,
};

/// In-process backend. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    portfolios: RwLock<HashMap<String, Portfolio>>,
    // Per user, in append order.
    simulations: RwLock<HashMap<String, Vec<Simulation>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with one user's portfolio.
    pub fn with_portfolio(user_id: &str, portfolio: Portfolio) -> Self {
        let mut portfolios = HashMap::new();
        portfolios.insert(user_id.to_string(), portfolio);
        Self {
            portfolios: RwLock::new(portfolios),
            simulations: RwLock::default(),
        }
    }
}

#[async_trait::async_trait]
impl PortfolioStore for MemoryStore {
    async fn get_portfolio(&self, user_id: &str) -> Result<Portfolio, StoreError> {
        Ok(self
            .portfolios
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn upsert_holding(
        &self,
        user_id: &str,
        ticker: &str,
        data: HoldingData,
    ) -> Result<(), StoreError> {
        self.portfolios
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .insert(ticker.to_string(), data);
        Ok(())
    }

    async fn remove_holding(&self, user_id: &str, ticker: &str) -> Result<bool, StoreError> {
        let mut guard = self.portfolios.write().await;
        Ok(guard
            .get_mut(user_id)
            .map(|p| p.remove(ticker).is_some())
            .unwrap_or(false))
    }
}

#[async_trait::async_trait]
impl SimulationLog for MemoryStore {
    async fn append_simulation(
        &self,
        user_id: &str,
        simulation: NewSimulation,
    ) -> Result<Simulation, StoreError> {
        let sim = Simulation::from_new(simulation);
        self.simulations
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .push(sim.clone());
        Ok(sim)
    }

    async fn list_simulations(&self, user_id: &str) -> Result<Vec<Simulation>, StoreError> {
        Ok(self
            .simulations
            .read()
            .await
            .get(user_id)
            .map(|v| v.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_simulation(
        &self,
        user_id: &str,
        id: Uuid,
    ) -> Result<Option<Simulation>, StoreError> {
        Ok(self
            .simulations
            .read()
            .await
            .get(user_id)
            .and_then(|v| v.iter().find(|s| s.id == id).cloned()))
    }
}
