//! Plain portfolio service over a [`PortfolioStore`].
//!
//! Holds one user's snapshot. Mutations validate, write through to the
//! store, then update the snapshot; [`PortfolioService::refresh`] re-reads it.

use std::fmt;
use std::sync::Arc;

pub use eqi_engine::normalize_ticker;
use eqi_engine::{validate_holdings, EngineError, Holding};
use tracing::debug;

use crate::{HoldingData, Portfolio, PortfolioStore, StoreError};

#[derive(Debug, Clone, PartialEq)]
pub enum PortfolioError {
    Invalid(EngineError),
    Store(StoreError),
}

impl fmt::Display for PortfolioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(e) => write!(f, "{e}"),
            Self::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PortfolioError {}

impl From<StoreError> for PortfolioError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<EngineError> for PortfolioError {
    fn from(e: EngineError) -> Self {
        Self::Invalid(e)
    }
}

pub struct PortfolioService {
    store: Arc<dyn PortfolioStore>,
    user_id: String,
    snapshot: Portfolio,
}

impl PortfolioService {
    /// Read the user's portfolio from the store.
    pub async fn load(
        store: Arc<dyn PortfolioStore>,
        user_id: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let user_id = user_id.into();
        let snapshot = store.get_portfolio(&user_id).await?;
        Ok(Self {
            store,
            user_id,
            snapshot,
        })
    }

    pub async fn refresh(&mut self) -> Result<(), StoreError> {
        self.snapshot = self.store.get_portfolio(&self.user_id).await?;
        Ok(())
    }

    /// Insert or replace one holding. Returns the normalized ticker.
    pub async fn upsert(&mut self, ticker: &str, data: HoldingData) -> Result<String, PortfolioError> {
        let ticker = normalize_ticker(ticker);
        validate_holdings(&[data.clone().into_holding(ticker.clone())])?;

        self.store
            .upsert_holding(&self.user_id, &ticker, data.clone())
            .await?;
        debug!(user_id = %self.user_id, ticker = %ticker, quantity = data.quantity, "holding upserted");
        self.snapshot.insert(ticker.clone(), data);
        Ok(ticker)
    }

    /// `Ok(false)` when the ticker was not held.
    pub async fn remove(&mut self, ticker: &str) -> Result<bool, PortfolioError> {
        let ticker = normalize_ticker(ticker);
        let removed = self.store.remove_holding(&self.user_id, &ticker).await?;
        self.snapshot.remove(&ticker);
        if removed {
            debug!(user_id = %self.user_id, ticker = %ticker, "holding removed");
        }
        Ok(removed)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.snapshot
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    /// Engine view of the snapshot, ticker-ordered.
    pub fn holdings(&self) -> Vec<Holding> {
        self.snapshot
            .iter()
            .map(|(t, d)| d.clone().into_holding(t.clone()))
            .collect()
    }

    pub fn tickers(&self) -> Vec<String> {
        self.snapshot.keys().cloned().collect()
    }
}
