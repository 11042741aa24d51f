//! eqi-engine: allocator
//!
//! Turns a valued portfolio plus a new cash contribution into whole-share
//! purchase recommendations.
//!
//! Algorithm:
//! 1. `new_total = Σ current_value + contribution`.
//! 2. Only `Comprar` holdings are eligible.
//! 3. Eligible shortfall: `ideal = max(0, target% × new_total − current_value)`.
//! 4. Distribution:
//!    - shortfalls covered (`Σ ideal ≤ contribution`): everyone gets its ideal,
//!      the remainder is split by `target / Σ eligible target`;
//!    - shortfalls not covered: everyone gets `ideal / Σ ideal × contribution`.
//! 5. Round each amount down to whole shares.
//! 6. One leftover pass: the most underweight eligible holding that can
//!    afford at least one more share absorbs as many as the leftover buys.
//!
//! Percentages are 0..=100 throughout. Rounding is always floor, so the plan
//! never spends more than the contribution.

use serde::{Deserialize, Serialize};

use crate::types::{AllocationOutcome, AllocationResult, EnrichedHolding};
use crate::valuation::total_value;

// ─── Raw distribution ────────────────────────────────────────────────────────

/// Which distribution branch a run took.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionCase {
    /// The contribution covers every eligible shortfall; the remainder is
    /// spread by target weight. Also taken when no holding has a shortfall.
    CoversShortfalls,
    /// Shortfalls exceed the contribution and are funded pro rata.
    ProportionalShortfall,
}

/// Pre-rounding view of one run. Index-aligned with the input slice.
#[derive(Clone, Debug, PartialEq)]
pub struct ContributionPlan {
    pub total_portfolio_value: f64,
    pub new_total_portfolio_value: f64,
    /// Per-holding shortfall against target (0 for ineligible holdings).
    pub ideal: Vec<f64>,
    pub total_ideal: f64,
    /// Per-holding money before whole-share rounding.
    pub raw: Vec<f64>,
    pub case: DistributionCase,
}

fn ideal_investment(h: &EnrichedHolding, new_total: f64) -> f64 {
    if !h.is_eligible_for_investment {
        return 0.0;
    }
    let target_value = h.target_percentage / 100.0 * new_total;
    (target_value - h.current_value).max(0.0)
}

/// Compute the raw (unrounded) split of `contribution` across `enriched`.
pub fn distribute_contribution(enriched: &[EnrichedHolding], contribution: f64) -> ContributionPlan {
    let total = total_value(enriched);
    let new_total = total + contribution;

    let ideal: Vec<f64> = enriched
        .iter()
        .map(|h| ideal_investment(h, new_total))
        .collect();
    let total_ideal: f64 = ideal.iter().sum();

    let (raw, case) = if total_ideal <= contribution {
        let remaining = contribution - total_ideal;
        let eligible_target: f64 = enriched
            .iter()
            .filter(|h| h.is_eligible_for_investment)
            .map(|h| h.target_percentage)
            .sum();

        let raw = enriched
            .iter()
            .zip(&ideal)
            .map(|(h, ideal)| {
                if !h.is_eligible_for_investment {
                    return 0.0;
                }
                // Zero eligible target sum: the remainder stays unassigned here.
                let share = if eligible_target > 0.0 {
                    remaining * h.target_percentage / eligible_target
                } else {
                    0.0
                };
                ideal + share
            })
            .collect();
        (raw, DistributionCase::CoversShortfalls)
    } else {
        let raw = enriched
            .iter()
            .zip(&ideal)
            .map(|(h, ideal)| {
                if h.is_eligible_for_investment {
                    ideal / total_ideal * contribution
                } else {
                    0.0
                }
            })
            .collect();
        (raw, DistributionCase::ProportionalShortfall)
    };

    ContributionPlan {
        total_portfolio_value: total,
        new_total_portfolio_value: new_total,
        ideal,
        total_ideal,
        raw,
        case,
    }
}

// ─── Share rounding ──────────────────────────────────────────────────────────

fn whole_shares(amount: f64, price: f64) -> u64 {
    if price <= 0.0 || !price.is_finite() || amount <= 0.0 {
        return 0;
    }
    // Saturating float->int cast; floor keeps us at or under `amount`.
    (amount / price).floor() as u64
}

fn round_to_shares(h: &EnrichedHolding, raw_amount: f64) -> AllocationResult {
    let qty = whole_shares(raw_amount, h.current_price);
    AllocationResult {
        ticker: h.ticker.clone(),
        current_value: h.current_value,
        current_percentage: h.current_percentage,
        target_percentage: h.target_percentage,
        current_quantity: h.quantity,
        investment_amount: qty as f64 * h.current_price,
        quantity_to_acquire: qty,
        new_quantity: h.quantity.saturating_add(qty),
        current_price: h.current_price,
        user_recommendation: h.user_recommendation,
        is_eligible_for_investment: h.is_eligible_for_investment,
    }
}

// ─── Leftover pass ───────────────────────────────────────────────────────────

/// Single best-effort pass; does not iterate to a fixpoint.
fn reallocate_leftover(allocations: &mut [AllocationResult], contribution: f64) {
    let allocated: f64 = allocations.iter().map(|a| a.investment_amount).sum();
    let unallocated = contribution - allocated;
    if unallocated <= 0.0 {
        return;
    }

    let mut best: Option<(usize, f64)> = None;
    for (i, a) in allocations.iter().enumerate() {
        if !a.is_eligible_for_investment || a.current_price <= 0.0 {
            continue;
        }
        if unallocated < a.current_price {
            continue;
        }
        let gap = a.target_percentage - a.current_percentage;
        // Strict comparison: first holding wins ties.
        if best.map_or(true, |(_, g)| gap > g) {
            best = Some((i, gap));
        }
    }

    let Some((i, _)) = best else {
        return;
    };
    let a = &mut allocations[i];
    let extra = whole_shares(unallocated, a.current_price);
    if extra == 0 {
        return;
    }
    a.quantity_to_acquire = a.quantity_to_acquire.saturating_add(extra);
    a.new_quantity = a.current_quantity.saturating_add(a.quantity_to_acquire);
    a.investment_amount = a.quantity_to_acquire as f64 * a.current_price;
}

// ─── Entry point ─────────────────────────────────────────────────────────────

/// Run the full allocation for a validated, positive `contribution`.
///
/// Never fails: an empty portfolio yields an empty outcome with zero totals,
/// and zero-priced or ineligible holdings simply get no shares.
pub fn compute_allocations(enriched: &[EnrichedHolding], contribution: f64) -> AllocationOutcome {
    if enriched.is_empty() {
        return AllocationOutcome::default();
    }

    let plan = distribute_contribution(enriched, contribution);

    let mut allocations: Vec<AllocationResult> = enriched
        .iter()
        .zip(&plan.raw)
        .map(|(h, raw)| round_to_shares(h, *raw))
        .collect();

    reallocate_leftover(&mut allocations, contribution);

    AllocationOutcome {
        allocations,
        total_portfolio_value: plan.total_portfolio_value,
        new_total_portfolio_value: plan.new_total_portfolio_value,
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
