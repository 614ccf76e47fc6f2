//! Simulator configuration
//!
//! Layered, later sources winning:
//! 1. built-in defaults
//! 2. `athena-sim.toml` in the working directory, if present
//! 3. `ATHENA_SIM__*` environment variables, e.g.
//!    `ATHENA_SIM__ENGINE__MAX_POOLS_PER_POSITION=4`

use std::path::PathBuf;

use anyhow::{Context, Result};
use athena_engine::EngineConfig;
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Simulator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Scenario replayed when no path is given on the command line
    pub scenario: PathBuf,
    /// Abort on the first rejected event instead of recording it
    pub stop_on_error: bool,
    /// Pretty-print the JSON report
    pub pretty: bool,
    pub engine: EngineConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            scenario: PathBuf::from("crates/athena-sim/scenarios/reference.json"),
            stop_on_error: false,
            pretty: true,
            engine: EngineConfig::default(),
        }
    }
}

impl SimConfig {
    /// Load configuration from defaults, file and environment
    pub fn load() -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let settings = Config::builder()
            .add_source(Config::try_from(&Self::default()).context("serializing defaults")?)
            .add_source(File::with_name("athena-sim").required(false))
            .add_source(
                Environment::with_prefix("ATHENA_SIM")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .context("building configuration")?;

        settings
            .try_deserialize()
            .context("invalid simulator configuration")
    }
}
