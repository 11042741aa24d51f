//! Price lookups with caching, retries and a fallback chain.
//!
//! Lookup order for one ticker:
//! 1. fresh cache entry
//! 2. provider, retried with exponential backoff (success is cached)
//! 3. stale cache entry
//! 4. simulated price derived from the ticker
//! 5. configured default price
//!
//! [`PriceService::get_price`] therefore always yields a quote; the
//! [`PriceSource`] tells the caller how much to trust it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use eqi_config::{PriceProviderKind, PricesConfig, ResolvedSecrets};
use eqi_engine::{normalize_ticker, PriceMap};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::{InMemoryPriceCache, PriceCache};
use crate::provider::{QuoteProvider, StaticQuoteProvider};
use crate::twelvedata::{TwelveDataQuoteProvider, DEFAULT_BASE_URL};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Cache,
    Live,
    Stale,
    Simulated,
    Default,
}

impl PriceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceSource::Cache => "cache",
            PriceSource::Live => "live",
            PriceSource::Stale => "stale",
            PriceSource::Simulated => "simulated",
            PriceSource::Default => "default",
        }
    }

    /// Cache and live quotes came from the provider within the TTL.
    pub fn is_current(&self) -> bool {
        matches!(self, PriceSource::Cache | PriceSource::Live)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub ticker: String,
    pub price: f64,
    pub source: PriceSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceReport {
    pub prices: PriceMap,
    pub quotes: Vec<PriceQuote>,
    pub warnings: Vec<String>,
}

impl PriceReport {
    pub fn all_current(&self) -> bool {
        self.quotes.iter().all(|q| q.source.is_current())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn no_backoff(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based), doubling each time and
    /// capped at `max_backoff`.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 1u32
            .checked_shl(retry.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FallbackPolicy {
    pub use_stale_cache: bool,
    pub simulate: bool,
    pub default_price: f64,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            use_stale_cache: true,
            simulate: true,
            default_price: 0.0,
        }
    }
}

/// Deterministic stand-in price in [10, 100) derived from the ticker bytes
/// (FNV-1a). Same ticker, same price, across processes.
pub fn simulated_price(ticker: &str) -> f64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in ticker.bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    10.0 + (h % 9_000) as f64 / 100.0
}

pub struct PriceService {
    provider: Arc<dyn QuoteProvider>,
    cache: Arc<dyn PriceCache<f64>>,
    ttl: Duration,
    retry: RetryPolicy,
    fallback: FallbackPolicy,
}

impl std::fmt::Debug for PriceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceService")
            .field("provider", &self.provider.name())
            .field("ttl", &self.ttl)
            .field("retry", &self.retry)
            .field("fallback", &self.fallback)
            .finish()
    }
}

impl PriceService {
    pub fn new(
        provider: Arc<dyn QuoteProvider>,
        cache: Arc<dyn PriceCache<f64>>,
        ttl: Duration,
        retry: RetryPolicy,
        fallback: FallbackPolicy,
    ) -> Self {
        Self {
            provider,
            cache,
            ttl,
            retry,
            fallback,
        }
    }

    /// Service over fixed quotes with an in-memory cache. Offline CLI runs
    /// and tests.
    pub fn with_static_quotes(quotes: PriceMap) -> Self {
        Self::new(
            Arc::new(StaticQuoteProvider::new(quotes)),
            Arc::new(InMemoryPriceCache::new()),
            Duration::from_secs(300),
            RetryPolicy::no_backoff(1),
            FallbackPolicy::default(),
        )
    }

    /// Build from the `prices` config section. Secrets must already be
    /// resolved; a live provider without a key is an error.
    pub fn from_config(cfg: &PricesConfig, secrets: &ResolvedSecrets) -> Result<Self> {
        let provider: Arc<dyn QuoteProvider> = match cfg.provider {
            PriceProviderKind::Static => {
                let quotes = cfg
                    .static_quotes
                    .iter()
                    .map(|(k, v)| (normalize_ticker(k), *v))
                    .collect();
                Arc::new(StaticQuoteProvider::new(quotes))
            }
            PriceProviderKind::Twelvedata => {
                let key = secrets.price_api_key.clone().ok_or_else(|| {
                    anyhow!("SECRET_MISSING: twelvedata provider requires {}", cfg.api_key_env)
                })?;
                let base = cfg
                    .base_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
                Arc::new(TwelveDataQuoteProvider::new_with_base_url(
                    key,
                    base,
                    Duration::from_millis(cfg.request_timeout_ms),
                )?)
            }
        };

        Ok(Self::new(
            provider,
            Arc::new(InMemoryPriceCache::new()),
            Duration::from_secs(cfg.cache_ttl_secs),
            RetryPolicy {
                max_attempts: cfg.retry.max_attempts,
                initial_backoff: Duration::from_millis(cfg.retry.initial_backoff_ms),
                max_backoff: Duration::from_millis(cfg.retry.max_backoff_ms),
            },
            FallbackPolicy {
                use_stale_cache: cfg.fallback.use_stale_cache,
                simulate: cfg.fallback.simulate,
                default_price: cfg.fallback.default_price,
            },
        ))
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub async fn get_price(&self, ticker: &str) -> PriceQuote {
        self.resolve(ticker).await.0
    }

    /// Quotes for every distinct ticker, fetched concurrently.
    pub async fn get_prices<S: AsRef<str>>(&self, tickers: &[S]) -> PriceReport {
        let mut distinct: Vec<String> = tickers.iter().map(|t| normalize_ticker(t.as_ref())).collect();
        distinct.sort();
        distinct.dedup();

        let resolved =
            futures_util::future::join_all(distinct.iter().map(|t| self.resolve(t))).await;

        let mut report = PriceReport::default();
        let mut stale: Vec<String> = Vec::new();
        for (quote, warning) in resolved {
            report.prices.insert(quote.ticker.clone(), quote.price);
            if let Some(w) = warning {
                stale.push(quote.ticker.clone());
                report.warnings.push(w);
            }
            report.quotes.push(quote);
        }
        if !stale.is_empty() {
            report.warnings.insert(
                0,
                format!("could not refresh live prices for: {}", stale.join(", ")),
            );
        }
        report
    }

    /// Quote plus a warning line when the live path failed.
    async fn resolve(&self, ticker: &str) -> (PriceQuote, Option<String>) {
        let ticker = normalize_ticker(ticker);
        let quote = |price, source| PriceQuote {
            ticker: ticker.clone(),
            price,
            source,
        };

        if let Some(p) = self.cache.get(&ticker) {
            debug!(ticker = %ticker, price = p, "price cache hit");
            return (quote(p, PriceSource::Cache), None);
        }

        let err = match self.fetch_with_retry(&ticker).await {
            Ok(p) => {
                self.cache.set(&ticker, p, self.ttl);
                return (quote(p, PriceSource::Live), None);
            }
            Err(e) => e,
        };

        let (price, source) = self.fallback_for(&ticker);
        warn!(
            ticker = %ticker,
            provider = self.provider.name(),
            source = source.as_str(),
            price,
            error = %err,
            "live price unavailable; using fallback"
        );
        let warning = format!("{ticker}: {} price used ({err})", source.as_str());
        (quote(price, source), Some(warning))
    }

    fn fallback_for(&self, ticker: &str) -> (f64, PriceSource) {
        if self.fallback.use_stale_cache {
            if let Some(p) = self.cache.get_stale(ticker) {
                return (p, PriceSource::Stale);
            }
        }
        if self.fallback.simulate {
            return (simulated_price(ticker), PriceSource::Simulated);
        }
        (self.fallback.default_price, PriceSource::Default)
    }

    async fn fetch_with_retry(&self, ticker: &str) -> Result<f64> {
        let attempts = self.retry.max_attempts.max(1);
        let mut last_err = anyhow!("no attempt made");
        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = self.retry.backoff_for(attempt - 1);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            match self.provider.fetch_quote(ticker).await {
                Ok(p) if p.is_finite() && p >= 0.0 => return Ok(p),
                Ok(p) => last_err = anyhow!("provider returned unusable price {p}"),
                Err(e) => last_err = e,
            }
            debug!(ticker = %ticker, attempt, attempts, error = %last_err, "price fetch failed");
        }
        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        fail_first: u32,
        calls: AtomicU32,
        price: f64,
    }

    #[async_trait::async_trait]
    impl QuoteProvider for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn fetch_quote(&self, _ticker: &str) -> Result<f64> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(anyhow!("boom {n}"))
            } else {
                Ok(self.price)
            }
        }
    }

    fn service(provider: Arc<dyn QuoteProvider>, ttl: Duration, attempts: u32) -> PriceService {
        PriceService::new(
            provider,
            Arc::new(InMemoryPriceCache::new()),
            ttl,
            RetryPolicy::no_backoff(attempts),
            FallbackPolicy::default(),
        )
    }

    #[test]
    fn simulated_price_is_deterministic_and_in_range() {
        for t in ["PETR4", "VALE3", "ITUB4", "", "X"] {
            let p = simulated_price(t);
            assert!((10.0..100.0).contains(&p), "{t} -> {p}");
            assert_eq!(p, simulated_price(t));
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let r = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
        };
        assert_eq!(r.backoff_for(1), Duration::from_millis(100));
        assert_eq!(r.backoff_for(2), Duration::from_millis(200));
        assert_eq!(r.backoff_for(3), Duration::from_millis(350));
        assert_eq!(r.backoff_for(40), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn retries_until_success_then_serves_from_cache() {
        let p = Arc::new(Flaky {
            fail_first: 2,
            calls: AtomicU32::new(0),
            price: 31.5,
        });
        let svc = service(p.clone(), Duration::from_secs(60), 3);

        let q = svc.get_price("petr4").await;
        assert_eq!(q.ticker, "PETR4");
        assert_eq!(q.price, 31.5);
        assert_eq!(q.source, PriceSource::Live);
        assert_eq!(p.calls.load(Ordering::SeqCst), 3);

        let q = svc.get_price("PETR4").await;
        assert_eq!(q.source, PriceSource::Cache);
        assert_eq!(p.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_fall_back_to_simulated() {
        let p = Arc::new(Flaky {
            fail_first: u32::MAX,
            calls: AtomicU32::new(0),
            price: 0.0,
        });
        let svc = service(p.clone(), Duration::from_secs(60), 2);
        let q = svc.get_price("VALE3").await;
        assert_eq!(q.source, PriceSource::Simulated);
        assert_eq!(q.price, simulated_price("VALE3"));
        assert_eq!(p.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_cache_is_used_when_provider_fails() {
        let cache: Arc<InMemoryPriceCache<f64>> = Arc::new(InMemoryPriceCache::new());
        cache.set("ITUB4", 27.0, Duration::ZERO);
        let svc = PriceService::new(
            Arc::new(StaticQuoteProvider::default()),
            cache,
            Duration::from_secs(60),
            RetryPolicy::no_backoff(1),
            FallbackPolicy::default(),
        );
        let q = svc.get_price("ITUB4").await;
        assert_eq!(q.source, PriceSource::Stale);
        assert_eq!(q.price, 27.0);
    }

    #[tokio::test]
    async fn default_price_when_other_fallbacks_disabled() {
        let svc = PriceService::new(
            Arc::new(StaticQuoteProvider::default()),
            Arc::new(InMemoryPriceCache::new()),
            Duration::from_secs(60),
            RetryPolicy::no_backoff(1),
            FallbackPolicy {
                use_stale_cache: false,
                simulate: false,
                default_price: 1.0,
            },
        );
        let q = svc.get_price("ABEV3").await;
        assert_eq!(q.source, PriceSource::Default);
        assert_eq!(q.price, 1.0);
    }

    #[tokio::test]
    async fn negative_or_nan_quotes_count_as_failures() {
        let svc = service(
            Arc::new(
                StaticQuoteProvider::default()
                    .with_quote("NEG", -1.0)
                    .with_quote("NAN", f64::NAN),
            ),
            Duration::from_secs(60),
            1,
        );
        assert_eq!(svc.get_price("NEG").await.source, PriceSource::Simulated);
        assert_eq!(svc.get_price("NAN").await.source, PriceSource::Simulated);
    }

    #[tokio::test]
    async fn report_dedups_and_warns_for_fallbacks() {
        let svc = PriceService::with_static_quotes(
            [("PETR4".to_string(), 25.0)].into_iter().collect(),
        );
        let report = svc.get_prices(&["PETR4", "petr4", "VALE3"]).await;

        assert_eq!(report.quotes.len(), 2);
        assert_eq!(report.prices.get("PETR4"), Some(&25.0));
        assert!(report.prices.contains_key("VALE3"));
        assert!(!report.all_current());
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings[0].contains("VALE3"));
        assert!(!report.warnings[0].contains("PETR4"));
    }

    #[test]
    fn from_config_requires_key_for_twelvedata() {
        let cfg = PricesConfig {
            provider: PriceProviderKind::Twelvedata,
            ..PricesConfig::default()
        };
        assert!(PriceService::from_config(&cfg, &ResolvedSecrets::default()).is_err());

        let svc = PriceService::from_config(
            &cfg,
            &ResolvedSecrets {
                price_api_key: Some("k".into()),
            },
        )
        .unwrap();
        assert_eq!(svc.provider_name(), "twelvedata");
    }
}
