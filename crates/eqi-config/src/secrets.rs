//! Runtime secret resolution.
//!
//! Config YAML stores only env var NAMES; values are read here once at
//! startup and handed to constructors. `Debug` output redacts values and
//! errors mention the variable NAME only.

use anyhow::{bail, Result};

use crate::app::{AppConfig, PriceProviderKind};

#[derive(Clone, Default)]
pub struct ResolvedSecrets {
    /// Quote provider API key; `None` if the named env var was absent or empty.
    pub price_api_key: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "price_api_key",
                &self.price_api_key.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

/// Read secrets named by `cfg` from the process environment.
///
/// A live quote provider without its key is a hard error; the static
/// provider needs nothing.
pub fn resolve_secrets(cfg: &AppConfig) -> Result<ResolvedSecrets> {
    resolve_secrets_with(cfg, |name| std::env::var(name).ok())
}

/// Same as [`resolve_secrets`] with an injectable lookup (tests).
pub fn resolve_secrets_with<F>(cfg: &AppConfig, lookup: F) -> Result<ResolvedSecrets>
where
    F: Fn(&str) -> Option<String>,
{
    let var = cfg.prices.api_key_env.trim();
    let price_api_key = if var.is_empty() {
        None
    } else {
        lookup(var).filter(|v| !v.trim().is_empty())
    };

    if cfg.prices.provider == PriceProviderKind::Twelvedata && price_api_key.is_none() {
        bail!(
            "SECRET_MISSING: prices.provider=twelvedata requires env var {}",
            if var.is_empty() { "<prices.api_key_env unset>" } else { var }
        );
    }

    Ok(ResolvedSecrets { price_api_key })
}
