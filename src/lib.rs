//! otgen -- run traffic on an Open Traffic Generator (OTG) endpoint.
//!
//! This crate submits an OTG configuration, starts transmission, polls
//! metrics until traffic is done (or forced to stop) and stops it again.

pub mod client;
pub mod config;
pub mod model;
pub mod policy;
pub mod runner;
pub mod target;

use anyhow::{Context, Result};

use crate::client::HttpApi;
use crate::config::RunConfig;
use crate::runner::{RunReport, Runner};

/// Run the OTG model described by `config` against its HTTP endpoint,
/// streaming metrics snapshots to stdout.
pub async fn run(config: RunConfig) -> Result<RunReport> {
    let model = config::load_model(&config.source, config.format)
        .with_context(|| format!("failed to load OTG model from {}", config.source))?;

    tracing::info!(api = %config.api, metrics = %config.metrics, "Connecting to OTG API");
    let api = HttpApi::new(&config.api, config.verify_tls)?;

    let mut runner = Runner::new(api, config, std::io::stdout());
    runner.run(&model).await
}
