//! Command handler modules for eqi-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod rebalance;
pub mod simulations;

use anyhow::{Context, Result};
use eqi_config::AppConfig;
use serde::de::DeserializeOwned;
use std::fs;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Read a YAML or JSON file (JSON parses as YAML). A UTF-8 BOM is tolerated.
pub fn read_data_file<T: DeserializeOwned>(path: &str, what: &str) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("read {what} file failed: {path}"))?;
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
    let raw = std::str::from_utf8(bytes).with_context(|| format!("{what} file must be UTF-8 text"))?;
    serde_yaml::from_str(raw).with_context(|| format!("{what} file is not valid YAML/JSON: {path}"))
}

/// Typed config from layered YAML paths; defaults when none are given.
pub fn load_app_config(paths: &[String]) -> Result<AppConfig> {
    if paths.is_empty() {
        return Ok(AppConfig::default());
    }
    let refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = eqi_config::load_layered_yaml(&refs)?;
    tracing::debug!(config_hash = %loaded.config_hash, "config loaded");
    loaded.app()
}
