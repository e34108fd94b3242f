//! Replay a JSON claim scenario against the in-memory ledger and print the reports.
//!
//! Usage: `estate-sim <scenario.json>`

use anyhow::Context;

use estate_infra::config::Settings;
use estate_infra::scenario::{Scenario, Simulation};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging first, so warnings about defaulted settings are visible.
    let log_format = std::env::var("ESTATE_LOG_FORMAT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_default();
    estate_observability::init_with(log_format);

    let settings = Settings::from_env().context("loading settings")?;

    let path = std::env::args()
        .nth(1)
        .context("usage: estate-sim <scenario.json>")?;
    let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let scenario: Scenario = serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))?;

    let reports = Simulation::new(&settings).run(&scenario).await?;
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}
