use crate::types::{EnrichedHolding, Holding};
use crate::PriceMap;

/// Total current value of a valued portfolio.
pub fn total_value(enriched: &[EnrichedHolding]) -> f64 {
    enriched.iter().map(|h| h.current_value).sum()
}

/// Value each holding against `prices`.
///
/// A ticker missing from `prices` is valued at 0. Prices are consumed as
/// given: zero or negative values are not rejected here.
pub fn enrich_holdings(holdings: &[Holding], prices: &PriceMap) -> Vec<EnrichedHolding> {
    let priced: Vec<(f64, f64)> = holdings
        .iter()
        .map(|h| {
            let px = prices.get(&h.ticker).copied().unwrap_or(0.0);
            (px, h.quantity as f64 * px)
        })
        .collect();

    let total: f64 = priced.iter().map(|(_, v)| v).sum();

    holdings
        .iter()
        .zip(priced)
        .map(|(h, (current_price, current_value))| EnrichedHolding {
            ticker: h.ticker.clone(),
            quantity: h.quantity,
            target_percentage: h.target_percentage,
            user_recommendation: h.user_recommendation,
            current_price,
            current_value,
            current_percentage: if total > 0.0 {
                current_value / total * 100.0
            } else {
                0.0
            },
            is_eligible_for_investment: h.user_recommendation.is_buy(),
        })
        .collect()
}
