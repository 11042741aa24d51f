//! TwelveData-backed quote provider.
//!
//! API key is resolved by the caller and passed in; do not log it.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::provider::QuoteProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.twelvedata.com";

#[derive(Debug, Clone)]
pub struct TwelveDataQuoteProvider {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl TwelveDataQuoteProvider {
    pub fn new(api_key: String) -> Result<Self> {
        Self::new_with_base_url(api_key, DEFAULT_BASE_URL.to_string(), Duration::from_secs(5))
    }

    pub fn new_with_base_url(api_key: String, base_url: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("twelvedata http client build failed")?;
        Ok(Self {
            api_key,
            http,
            base_url,
        })
    }

    fn price_url(&self) -> String {
        format!("{}/price", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl QuoteProvider for TwelveDataQuoteProvider {
    fn name(&self) -> &'static str {
        "twelvedata"
    }

    async fn fetch_quote(&self, ticker: &str) -> Result<f64> {
        let resp = self
            .http
            .get(self.price_url())
            .query(&[("symbol", ticker), ("apikey", self.api_key.as_str())])
            .send()
            .await
            .context("twelvedata request failed")?;

        let status = resp.status();
        let body: TwelveDataPriceResponse = resp
            .json()
            .await
            .context("twelvedata response json decode failed")?;

        if !status.is_success() {
            return Err(anyhow!(
                "twelvedata http error status={} message={}",
                status.as_u16(),
                body.status_message()
            ));
        }

        if body.status.as_deref() == Some("error") {
            return Err(anyhow!("twelvedata error: {}", body.status_message()));
        }

        let raw = body
            .price
            .ok_or_else(|| anyhow!("twelvedata response for '{ticker}' has no price"))?;
        raw.trim()
            .parse::<f64>()
            .with_context(|| format!("twelvedata price parse failed: {raw}"))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TwelveDataPriceResponse {
    price: Option<String>,
    status: Option<String>,
    message: Option<String>,
    code: Option<i64>,
}

impl TwelveDataPriceResponse {
    fn status_message(&self) -> String {
        match (&self.code, &self.message) {
            (Some(c), Some(m)) => format!("code={} {}", c, m),
            (_, Some(m)) => m.clone(),
            _ => "unknown".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_url_tolerates_trailing_slash() {
        let p = TwelveDataQuoteProvider::new_with_base_url(
            "k".into(),
            "http://localhost:1234/".into(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(p.price_url(), "http://localhost:1234/price");
    }

    #[test]
    fn error_body_message() {
        let body: TwelveDataPriceResponse = serde_json::from_str(
            r#"{"code":404,"message":"symbol not found","status":"error"}"#,
        )
        .unwrap();
        assert_eq!(body.status_message(), "code=404 symbol not found");
        assert!(body.price.is_none());
    }
}
