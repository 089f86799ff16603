use anyhow::{Context, Result};
use oracle_feeder_rust::scheduler::log_stats;
use oracle_feeder_rust::telemetry::init_telemetry;
use oracle_feeder_rust::{build_feeder, FeederConfig};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config = FeederConfig::from_env().context("loading feeder configuration")?;
    init_telemetry(config.log_json);

    info!(
        "Starting oracle_feeder_rust for {} on {} (source: {})",
        config.token, config.env, config.source
    );

    let feeder = build_feeder(&config)?;

    let final_stats = feeder
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    log_stats(&final_stats);
    match serde_json::to_string(&final_stats) {
        Ok(json) => info!(stats = %json, "Final feeder stats"),
        Err(e) => warn!("Failed to serialize final stats: {}", e),
    }
    info!("oracle_feeder_rust stopped");
    Ok(())
}
