//! Budget Walkthrough Example
//!
//! Runs noisy sums over delimited lines under a capped budget and shows the
//! agent denying the query that would cross the ceiling.
//!
//! Run with: RUST_LOG=info cargo run --example budget_walkthrough

use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use trueno_privacy::config::PrivacyConfig;
use trueno_privacy::sequence::{FnSource, RowSource};
use trueno_privacy::{Error, PrivacyEngine};

const SALARIES: &str = "1,0.42\n2,0.91\n3,-0.10\n4,0.77\n5,0.35\n6,0.58";

fn parse_line(line: &str) -> trueno_privacy::Result<(u64, f64)> {
    let (id, value) = line
        .split_once(',')
        .ok_or_else(|| Error::MalformedRow(format!("missing delimiter: {line}")))?;
    let id = id
        .trim()
        .parse()
        .map_err(|e| Error::MalformedRow(format!("{line}: {e}")))?;
    let value = value
        .trim()
        .parse()
        .map_err(|e| Error::MalformedRow(format!("{line}: {e}")))?;
    Ok((id, value))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    println!("=== Trueno-Privacy Budget Walkthrough ===\n");

    let config = PrivacyConfig::fixed_cap(1.0).with_env_overrides();
    let engine = PrivacyEngine::builder().config(config).build()?;

    // -------------------------------------------------------------------------
    // 1. Open the source (re-read on every query)
    // -------------------------------------------------------------------------
    let lines: Arc<dyn RowSource<String>> = Arc::new(FnSource::new(|| {
        SALARIES
            .lines()
            .map(|l| Ok(l.to_string()))
            .collect::<Vec<_>>()
    }));
    let rows = engine.open("salaries.csv", lines).try_map(|l| parse_line(&l));
    println!("Pipeline: {}", rows.describe());

    // -------------------------------------------------------------------------
    // 2. Spend the budget
    // -------------------------------------------------------------------------
    let sum = rows.noisy_sum(0.4, |(_, v)| *v)?;
    println!("Noisy sum (eps 0.4):        {sum:.3}");

    let high = rows.filter(|(_, v)| *v > 0.5).noisy_count(0.4)?;
    println!("Noisy count > 0.5 (eps 0.4): {high:.3}");

    // -------------------------------------------------------------------------
    // 3. The next query would cross the ceiling
    // -------------------------------------------------------------------------
    match rows.noisy_average(0.4, |(_, v)| *v) {
        Ok(avg) => println!("Noisy average:               {avg:.3}"),
        Err(e @ Error::BudgetExceeded { .. }) => println!("\nDenied: {e}"),
        Err(e) => return Err(e.into()),
    }

    println!("\nTotal spent: {:.2}", engine.total_spent());
    Ok(())
}
