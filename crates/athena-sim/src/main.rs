//! Athena Scenario Simulator
//!
//! Replays a JSON scenario through the engine and prints the resulting pool,
//! position and cover states as JSON.
//!
//! ```text
//! athena-sim [scenario.json]
//! ```

mod config;
mod scenario;

use std::path::PathBuf;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::SimConfig;
use crate::scenario::{Scenario, Simulation};

fn main() -> Result<()> {
    // Logs go to stderr so the report on stdout stays machine-readable
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Athena simulator v{}", athena_common::VERSION);

    let config = SimConfig::load()?;
    info!("Loaded configuration: {:?}", config);

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.scenario.clone());
    let scenario = Scenario::load(&path)?;
    info!(
        path = %path.display(),
        pools = scenario.pools.len(),
        events = scenario.events.len(),
        "Scenario loaded"
    );

    let report = Simulation::new(&config).run(&scenario)?;
    let rejected = report.events.iter().filter(|e| e.error.is_some()).count();
    info!(rejected, "Simulation finished");

    let output = if config.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{output}");
    Ok(())
}
