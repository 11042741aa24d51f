//! Provider boundary for current-price lookups.
//!
//! A provider answers "what does one share of this ticker cost right now".
//! Caching, retries and fallbacks live in [`crate::PriceService`], not here.

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};

/// Upstream quote source.
///
/// Object-safe so callers can hold an `Arc<dyn QuoteProvider>`; `Send + Sync`
/// so it can cross task boundaries.
#[async_trait::async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Human-readable name (e.g. `"twelvedata"`).
    fn name(&self) -> &'static str;

    /// Latest price for one ticker.
    async fn fetch_quote(&self, ticker: &str) -> Result<f64>;
}

/// Fixed in-memory quotes. Used offline (CLI price files, `static` config)
/// and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticQuoteProvider {
    quotes: BTreeMap<String, f64>,
}

impl StaticQuoteProvider {
    pub fn new(quotes: BTreeMap<String, f64>) -> Self {
        Self { quotes }
    }

    pub fn with_quote<S: Into<String>>(mut self, ticker: S, price: f64) -> Self {
        self.quotes.insert(ticker.into(), price);
        self
    }
}

#[async_trait::async_trait]
impl QuoteProvider for StaticQuoteProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch_quote(&self, ticker: &str) -> Result<f64> {
        self.quotes
            .get(ticker)
            .copied()
            .ok_or_else(|| anyhow!("no static quote for '{ticker}'"))
    }
}
