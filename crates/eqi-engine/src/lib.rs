//! eqi-engine
//!
//! Contribution rebalancing engine.
//! - Valuation: current value / current % per holding
//! - Ideal shortfall against target % of the post-contribution total
//! - Contribution distribution (shortfalls first, then by target weight)
//! - Whole-share rounding (always floor) + single-pass leftover reallocation
//! - Pure deterministic logic (no IO, no time, no price fetching)

mod types;
mod valuation;

pub mod allocator;
pub mod validation;

pub use allocator::{
    compute_allocations, distribute_contribution, ContributionPlan, DistributionCase,
};
pub use types::{
    normalize_ticker, AllocationOutcome, AllocationResult, EnrichedHolding, Holding,
    Recommendation, UnknownRecommendation,
};
pub use validation::{
    check_target_sum, parse_contribution, rebalance, validate_contribution, validate_holdings,
    EngineError, HoldingIssue, HoldingIssueKind, TargetSumCheck, DEFAULT_TARGET_SUM_EPSILON,
    MAX_QUANTITY,
};
pub use valuation::{enrich_holdings, total_value};

use std::collections::BTreeMap;

/// Canonical price map type (ticker -> price per share).
pub type PriceMap = BTreeMap<String, f64>;

/// Helper to build a PriceMap with minimal boilerplate.
pub fn price_map<I, S>(items: I) -> PriceMap
where
    I: IntoIterator<Item = (S, f64)>,
    S: Into<String>,
{
    let mut m = PriceMap::new();
    for (ticker, px) in items {
        m.insert(ticker.into(), px);
    }
    m
}
