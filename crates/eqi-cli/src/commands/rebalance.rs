//! `eqi rebalance`: offline allocation of one contribution.
//!
//! Reads a portfolio file, prices it (price file or configured price
//! service), runs the engine and prints the plan. Nothing is persisted.

use anyhow::{Context, Result};
use eqi_config::resolve_secrets;
use eqi_engine::{
    check_target_sum, normalize_ticker, parse_contribution, rebalance, validate_holdings,
    AllocationOutcome, Holding, PriceMap, TargetSumCheck,
};
use eqi_prices::PriceService;
use serde::{Deserialize, Serialize};

use super::{load_app_config, read_data_file};

pub struct RebalanceArgs {
    pub portfolio_path: String,
    pub contribution: String,
    pub prices_path: Option<String>,
    pub config_paths: Vec<String>,
    pub json: bool,
}

#[derive(Debug, Deserialize)]
struct PortfolioFile {
    #[serde(default)]
    holdings: Vec<Holding>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RebalanceReport {
    contribution: f64,
    #[serde(flatten)]
    outcome: AllocationOutcome,
    total_invested: f64,
    unallocated: f64,
    target_sum: TargetSumCheck,
    price_warnings: Vec<String>,
}

pub async fn run(args: RebalanceArgs) -> Result<()> {
    let contribution = parse_contribution(&args.contribution)?;

    let file: PortfolioFile = read_data_file(&args.portfolio_path, "portfolio")?;
    let holdings: Vec<Holding> = file.holdings.into_iter().map(Holding::normalized).collect();
    validate_holdings(&holdings)?;

    let cfg = load_app_config(&args.config_paths)?;
    let prices = match &args.prices_path {
        Some(p) => {
            let quotes: PriceMap = read_data_file(p, "prices")?;
            PriceService::with_static_quotes(
                quotes
                    .into_iter()
                    .map(|(t, v)| (normalize_ticker(&t), v))
                    .collect(),
            )
        }
        None => {
            let secrets = resolve_secrets(&cfg)?;
            PriceService::from_config(&cfg.prices, &secrets).context("price service init failed")?
        }
    };

    let tickers: Vec<&str> = holdings.iter().map(|h| h.ticker.as_str()).collect();
    let price_report = prices.get_prices(&tickers).await;

    let outcome = rebalance(&holdings, &price_report.prices, contribution)?;
    let report = RebalanceReport {
        contribution,
        total_invested: outcome.total_invested(),
        unallocated: outcome.unallocated(contribution),
        target_sum: check_target_sum(&holdings, cfg.allocation.target_sum_epsilon),
        price_warnings: price_report.warnings,
        outcome,
    };

    if args.json {
        let out = serde_json::to_string_pretty(&report).context("serialize rebalance json failed")?;
        println!("{out}");
    } else {
        print_lines(&report, holdings.is_empty());
    }
    Ok(())
}

fn print_lines(r: &RebalanceReport, empty_portfolio: bool) {
    println!("contribution={:.2}", r.contribution);
    println!(
        "total_portfolio_value={:.2} new_total_portfolio_value={:.2}",
        r.outcome.total_portfolio_value, r.outcome.new_total_portfolio_value
    );

    for a in &r.outcome.allocations {
        println!(
            "alloc ticker={} rec={} price={:.2} qty={} target_pct={:.2} current_pct={:.2} buy={} amount={:.2} new_qty={}",
            a.ticker,
            a.user_recommendation,
            a.current_price,
            a.current_quantity,
            a.target_percentage,
            a.current_percentage,
            a.quantity_to_acquire,
            a.investment_amount,
            a.new_quantity
        );
    }

    println!(
        "total_invested={:.2} unallocated={:.2}",
        r.total_invested, r.unallocated
    );

    if !r.target_sum.within_tolerance {
        println!(
            "warning=target percentages sum to {:.2}, not 100",
            r.target_sum.sum
        );
    }
    for w in &r.price_warnings {
        println!("warning={w}");
    }

    if empty_portfolio {
        println!("notice=portfolio has no holdings");
    } else if r.outcome.eligible_count() == 0 {
        println!("notice=no holding is marked Comprar; nothing to buy");
    } else if !r.outcome.has_purchases() {
        println!("notice=contribution too small to buy a whole share");
    }
}
