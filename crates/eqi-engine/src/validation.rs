//! Boundary checks that run before the allocator.
//!
//! The allocator assumes a positive, finite contribution and well-formed
//! holdings. Everything that can be wrong with caller input is caught here
//! and reported as an [`EngineError`].

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::allocator::compute_allocations;
use crate::types::{normalize_ticker, AllocationOutcome, Holding};
use crate::valuation::enrich_holdings;
use crate::PriceMap;

/// Allowed deviation of the target-percentage sum from 100 before the user
/// is warned.
pub const DEFAULT_TARGET_SUM_EPSILON: f64 = 0.01;

/// Largest share count a holding may carry (the Postgres `bigint` range).
pub const MAX_QUANTITY: u64 = i64::MAX as u64;

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingIssueKind {
    EmptyTicker,
    DuplicateTicker,
    /// Target is NaN/inf or outside 0..=100.
    TargetOutOfRange,
    /// Quantity above [`MAX_QUANTITY`].
    QuantityOutOfRange,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HoldingIssue {
    pub ticker: String,
    pub kind: HoldingIssueKind,
}

impl fmt::Display for HoldingIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            HoldingIssueKind::EmptyTicker => write!(f, "ticker must not be empty"),
            HoldingIssueKind::DuplicateTicker => {
                write!(f, "ticker '{}' appears more than once", self.ticker)
            }
            HoldingIssueKind::TargetOutOfRange => write!(
                f,
                "target percentage for '{}' must be between 0 and 100",
                self.ticker
            ),
            HoldingIssueKind::QuantityOutOfRange => write!(
                f,
                "quantity for '{}' must not exceed {MAX_QUANTITY}",
                self.ticker
            ),
        }
    }
}

/// Errors produced at the engine boundary.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineError {
    /// Contribution is non-numeric, NaN/inf, or not strictly positive.
    InvalidContribution { input: String },
    /// One or more holdings are malformed.
    InvalidHoldings(Vec<HoldingIssue>),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidContribution { input } => write!(
                f,
                "please enter a valid contribution amount (got '{input}')"
            ),
            Self::InvalidHoldings(issues) => {
                write!(f, "invalid holdings: ")?;
                for (i, issue) in issues.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{issue}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for EngineError {}

// ─── Contribution ────────────────────────────────────────────────────────────

/// Accept only finite, strictly positive contributions.
pub fn validate_contribution(contribution: f64) -> Result<f64, EngineError> {
    if contribution.is_finite() && contribution > 0.0 {
        Ok(contribution)
    } else {
        Err(EngineError::InvalidContribution {
            input: contribution.to_string(),
        })
    }
}

/// Parse a user-typed contribution.
///
/// A single `,` is read as the decimal separator when no `.` is present
/// (`"1500,75"`). Thousands separators are not supported.
pub fn parse_contribution(raw: &str) -> Result<f64, EngineError> {
    let invalid = || EngineError::InvalidContribution {
        input: raw.to_string(),
    };

    let t = raw.trim();
    let normalized = if !t.contains('.') && t.matches(',').count() == 1 {
        t.replace(',', ".")
    } else {
        t.to_string()
    };

    let v: f64 = normalized.parse().map_err(|_| invalid())?;
    validate_contribution(v).map_err(|_| invalid())
}

// ─── Holdings ────────────────────────────────────────────────────────────────

/// Collect every malformed-holding problem in one pass.
///
/// Tickers are compared in canonical form, so `petr4` and `PETR4` clash.
pub fn validate_holdings(holdings: &[Holding]) -> Result<(), EngineError> {
    let mut issues = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();

    for h in holdings {
        let ticker = normalize_ticker(&h.ticker);
        if ticker.is_empty() {
            issues.push(HoldingIssue {
                ticker: h.ticker.clone(),
                kind: HoldingIssueKind::EmptyTicker,
            });
        } else if !seen.insert(ticker) {
            issues.push(HoldingIssue {
                ticker: h.ticker.clone(),
                kind: HoldingIssueKind::DuplicateTicker,
            });
        }

        if h.quantity > MAX_QUANTITY {
            issues.push(HoldingIssue {
                ticker: h.ticker.clone(),
                kind: HoldingIssueKind::QuantityOutOfRange,
            });
        }

        let t = h.target_percentage;
        if !t.is_finite() || !(0.0..=100.0).contains(&t) {
            issues.push(HoldingIssue {
                ticker: h.ticker.clone(),
                kind: HoldingIssueKind::TargetOutOfRange,
            });
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(EngineError::InvalidHoldings(issues))
    }
}

/// Result of comparing the target-percentage sum against 100.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSumCheck {
    pub sum: f64,
    pub deviation: f64,
    pub within_tolerance: bool,
}

/// The engine tolerates any sum; this only drives a user warning.
pub fn check_target_sum(holdings: &[Holding], epsilon: f64) -> TargetSumCheck {
    let sum: f64 = holdings.iter().map(|h| h.target_percentage).sum();
    let deviation = sum - 100.0;
    TargetSumCheck {
        sum,
        deviation,
        within_tolerance: deviation.abs() <= epsilon,
    }
}

// ─── One-shot entry point ────────────────────────────────────────────────────

/// Validate, value, and allocate in one call.
pub fn rebalance(
    holdings: &[Holding],
    prices: &PriceMap,
    contribution: f64,
) -> Result<AllocationOutcome, EngineError> {
    let contribution = validate_contribution(contribution)?;
    validate_holdings(holdings)?;
    let enriched = enrich_holdings(holdings, prices);
    Ok(compute_allocations(&enriched, contribution))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{price_map, Recommendation};

    #[test]
    fn contribution_must_be_positive_and_finite() {
        assert_eq!(validate_contribution(10.0), Ok(10.0));
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(
                matches!(
                    validate_contribution(bad),
                    Err(EngineError::InvalidContribution { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn parse_contribution_accepts_comma_decimal() {
        assert_eq!(parse_contribution("1500,75"), Ok(1500.75));
        assert_eq!(parse_contribution(" 1000 "), Ok(1000.0));
        assert_eq!(parse_contribution("0.5"), Ok(0.5));
    }

    #[test]
    fn parse_contribution_rejects_garbage() {
        for raw in ["", "abc", "1.000,50", "-3", "0", "NaN", "inf"] {
            let err = parse_contribution(raw).unwrap_err();
            assert_eq!(
                err,
                EngineError::InvalidContribution {
                    input: raw.to_string()
                }
            );
        }
    }

    #[test]
    fn holdings_problems_are_all_reported() {
        let holdings = vec![
            Holding::buy("", 1, 10.0),
            Holding::buy("ABC", 1, 120.0),
            Holding::buy("ABC", 1, 10.0),
            Holding::buy("XYZ", 1, f64::NAN),
        ];
        let Err(EngineError::InvalidHoldings(issues)) = validate_holdings(&holdings) else {
            panic!("expected InvalidHoldings");
        };
        let kinds: Vec<_> = issues.iter().map(|i| i.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                HoldingIssueKind::EmptyTicker,
                HoldingIssueKind::TargetOutOfRange,
                HoldingIssueKind::DuplicateTicker,
                HoldingIssueKind::TargetOutOfRange,
            ]
        );
    }

    #[test]
    fn duplicate_check_ignores_ticker_case() {
        let holdings = vec![Holding::buy("PETR4", 1, 10.0), Holding::buy(" petr4", 1, 10.0)];
        let Err(EngineError::InvalidHoldings(issues)) = validate_holdings(&holdings) else {
            panic!("expected InvalidHoldings");
        };
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, HoldingIssueKind::DuplicateTicker);
    }

    #[test]
    fn quantity_is_bounded_to_bigint() {
        assert!(validate_holdings(&[Holding::buy("A", MAX_QUANTITY, 10.0)]).is_ok());

        let Err(EngineError::InvalidHoldings(issues)) =
            validate_holdings(&[Holding::buy("A", MAX_QUANTITY + 1, 10.0)])
        else {
            panic!("expected InvalidHoldings");
        };
        assert_eq!(issues[0].kind, HoldingIssueKind::QuantityOutOfRange);
        assert!(issues[0].to_string().contains("must not exceed"));
    }

    #[test]
    fn target_sum_tolerance() {
        let ok = vec![Holding::buy("A", 0, 60.0), Holding::buy("B", 0, 40.0)];
        assert!(check_target_sum(&ok, DEFAULT_TARGET_SUM_EPSILON).within_tolerance);

        let off = vec![Holding::buy("A", 0, 60.0), Holding::buy("B", 0, 30.0)];
        let c = check_target_sum(&off, DEFAULT_TARGET_SUM_EPSILON);
        assert!(!c.within_tolerance);
        assert!((c.deviation + 10.0).abs() < 1e-9);
    }

    #[test]
    fn rebalance_rejects_before_computing() {
        let h = vec![Holding::new("A", 1, 100.0, Recommendation::Buy)];
        let px = price_map([("A", 10.0)]);
        assert!(matches!(
            rebalance(&h, &px, 0.0),
            Err(EngineError::InvalidContribution { .. })
        ));
        let out = rebalance(&h, &px, 100.0).unwrap();
        assert_eq!(out.allocations[0].quantity_to_acquire, 10);
    }

    #[test]
    fn error_display_is_user_facing() {
        let e = EngineError::InvalidContribution { input: "x".into() };
        assert!(e.to_string().contains("valid contribution amount"));
    }
}
