//! oracle_feeder_rust - periodic price feeder for the on-chain native oracle

pub mod config;
pub mod isolation;
pub mod pipeline;
pub mod runner;
pub mod scheduler;
pub mod stats;
pub mod telemetry;

pub use config::FeederConfig;
pub use pipeline::{SubmissionPipeline, SubmissionTask};
pub use runner::{CommandOutput, CommandRunner, DryRunRunner, ProcessRunner};
pub use scheduler::{Feeder, FeederState, TickOutcome};
pub use stats::{FeederStats, FeederStatsSnapshot};

use anyhow::{Context, Result};
use feeder_rust_core::clients::build_price_source;
use feeder_rust_core::error::FeederError;
use feeder_rust_core::registry::DeploymentRegistry;
use std::sync::Arc;
use tracing::info;

/// Resolve the asset, source and runner for `config` and start the pipeline.
///
/// Every failure here is a configuration problem and aborts startup.
pub fn build_feeder(config: &FeederConfig) -> Result<Feeder> {
    let registry = DeploymentRegistry::load(&config.deployments_path, &config.registry_key)
        .with_context(|| {
            format!(
                "loading deployment registry {}",
                config.deployments_path.display()
            )
        })?;
    let mut asset = registry.asset(&config.token, config.exponent)?;
    if let Some(quote_symbol) = &config.quote_symbol {
        asset = asset.with_quote_symbol(quote_symbol.as_str());
    }

    let source = build_price_source(&config.source_settings())
        .with_context(|| format!("building {} price source", config.source))?;
    if !source.supports(&asset) {
        return Err(FeederError::Config(format!(
            "{} cannot price asset '{}'",
            source.source_name(),
            asset.symbol
        ))
        .into());
    }

    let runner: Arc<dyn CommandRunner> = if config.dry_run {
        info!("Dry run enabled, update commands will only be logged");
        Arc::new(DryRunRunner)
    } else {
        Arc::new(ProcessRunner)
    };

    info!(
        symbol = %asset.symbol,
        package = %asset.package,
        feeder = %asset.feeder_id,
        exponent = asset.decimal_exponent,
        quote_symbol = ?asset.quote_symbol,
        "Resolved asset from {}",
        config.deployments_path.display()
    );

    Ok(Feeder::from_config(config, asset, source, runner))
}
