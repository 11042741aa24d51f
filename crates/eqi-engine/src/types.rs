use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The user's own call on a holding.
///
/// Wire strings are the Portuguese labels; only `Comprar` holdings may
/// receive contribution money.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Recommendation {
    #[default]
    #[serde(rename = "Comprar")]
    Buy,
    #[serde(rename = "Vender")]
    Sell,
    #[serde(rename = "Aguardar")]
    Wait,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Buy => "Comprar",
            Recommendation::Sell => "Vender",
            Recommendation::Wait => "Aguardar",
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, Recommendation::Buy)
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a recommendation label is not recognised.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownRecommendation(pub String);

impl fmt::Display for UnknownRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown recommendation '{}'. expected one of: Comprar | Vender | Aguardar",
            self.0
        )
    }
}

impl std::error::Error for UnknownRecommendation {}

impl FromStr for Recommendation {
    type Err = UnknownRecommendation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "comprar" | "buy" => Ok(Recommendation::Buy),
            "vender" | "sell" => Ok(Recommendation::Sell),
            "aguardar" | "wait" | "hold" => Ok(Recommendation::Wait),
            _ => Err(UnknownRecommendation(s.to_string())),
        }
    }
}

impl TryFrom<String> for Recommendation {
    type Error = UnknownRecommendation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Canonical ticker form: trimmed and ASCII upper-cased.
pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_ascii_uppercase()
}

/// One portfolio entry as the user recorded it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub ticker: String,
    pub quantity: u64,
    /// Desired share of total portfolio value, 0..=100.
    pub target_percentage: f64,
    #[serde(default)]
    pub user_recommendation: Recommendation,
}

impl Holding {
    pub fn new<S: Into<String>>(
        ticker: S,
        quantity: u64,
        target_percentage: f64,
        user_recommendation: Recommendation,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            quantity,
            target_percentage,
            user_recommendation,
        }
    }

    /// Same holding with its ticker in canonical form.
    pub fn normalized(mut self) -> Self {
        self.ticker = normalize_ticker(&self.ticker);
        self
    }

    /// Shorthand for a `Comprar` holding.
    pub fn buy<S: Into<String>>(ticker: S, quantity: u64, target_percentage: f64) -> Self {
        Self::new(ticker, quantity, target_percentage, Recommendation::Buy)
    }
}

/// A holding valued against a price map. Derived, never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedHolding {
    pub ticker: String,
    pub quantity: u64,
    pub target_percentage: f64,
    pub user_recommendation: Recommendation,
    pub current_price: f64,
    pub current_value: f64,
    /// Share of the pre-contribution total, 0..=100 (0 when the total is 0).
    pub current_percentage: f64,
    pub is_eligible_for_investment: bool,
}

/// Per-holding recommendation produced by one engine run.
///
/// `investment_amount` is always `quantity_to_acquire * current_price`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationResult {
    pub ticker: String,
    pub current_value: f64,
    pub current_percentage: f64,
    pub target_percentage: f64,
    pub current_quantity: u64,
    pub investment_amount: f64,
    pub quantity_to_acquire: u64,
    pub new_quantity: u64,
    pub current_price: f64,
    pub user_recommendation: Recommendation,
    pub is_eligible_for_investment: bool,
}

/// Output of one allocation run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationOutcome {
    pub allocations: Vec<AllocationResult>,
    pub total_portfolio_value: f64,
    pub new_total_portfolio_value: f64,
}

impl AllocationOutcome {
    /// Sum of share-exact investment amounts.
    pub fn total_invested(&self) -> f64 {
        self.allocations.iter().map(|a| a.investment_amount).sum()
    }

    /// Cash left over after whole-share rounding.
    pub fn unallocated(&self, contribution: f64) -> f64 {
        (contribution - self.total_invested()).max(0.0)
    }

    /// True if at least one holding gets a share purchase.
    ///
    /// Callers use this to tell "no eligible assets" apart from a real plan.
    pub fn has_purchases(&self) -> bool {
        self.allocations.iter().any(|a| a.quantity_to_acquire > 0)
    }

    pub fn eligible_count(&self) -> usize {
        self.allocations
            .iter()
            .filter(|a| a.is_eligible_for_investment)
            .count()
    }

    pub fn get(&self, ticker: &str) -> Option<&AllocationResult> {
        self.allocations.iter().find(|a| a.ticker == ticker)
    }
}
