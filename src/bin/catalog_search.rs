//! Runs one query through the live pipeline and prints `{query, results, stats}` as JSON.
//!
//! Usage: `catalog_search <query words...>`

use anyhow::{bail, Context};
use catalog_aggregator::{init_tracing, Aggregator, AggregatorConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let query = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if query.trim().is_empty() {
        bail!("usage: catalog_search <query>");
    }

    let cfg = AggregatorConfig::load_default().context("loading aggregator config")?;
    let aggregator = Aggregator::from_config(&cfg)?;
    let outcome = aggregator.run(&query).await;

    let failed = outcome.stats.iter().filter(|s| s.is_error()).count();
    tracing::info!(
        results = outcome.results.len(),
        failed,
        "catalog search done"
    );

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
