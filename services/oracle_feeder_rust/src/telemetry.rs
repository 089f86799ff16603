//! Logging setup.
//!
//! Verbosity comes from `RUST_LOG`; defaults to INFO with DEBUG for the feeder
//! itself. `FEEDER_LOG_JSON=true` switches to JSON lines for log shipping.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,oracle_feeder_rust=debug,feeder_rust_core=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

pub fn init_telemetry(json: bool) {
    let registry = tracing_subscriber::registry().with(env_filter());

    if json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_level(true)
                    .compact(),
            )
            .init();
    }
}
