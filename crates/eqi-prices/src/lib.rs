//! eqi-prices
//!
//! Current share prices for the rebalance flow.
//!
//! This crate owns the quote provider abstraction, the TwelveData client and
//! the caching/fallback service. It does not touch the store; callers hand
//! the resulting [`PriceReport::prices`] to the allocation engine.

pub mod cache;
pub mod provider;
pub mod service;
pub mod twelvedata;

pub use cache::{InMemoryPriceCache, PriceCache};
pub use provider::{QuoteProvider, StaticQuoteProvider};
pub use service::{
    simulated_price, FallbackPolicy, PriceQuote, PriceReport, PriceService, PriceSource,
    RetryPolicy,
};
pub use twelvedata::TwelveDataQuoteProvider;
