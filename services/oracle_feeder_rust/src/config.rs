//! Configuration for oracle_feeder_rust

use anyhow::{anyhow, Result};
use feeder_rust_core::clients::{QuoteProvider, SourceKind, SourceSettings};
use feeder_rust_core::command::{
    ClientParams, DEFAULT_CLIENT_BIN, DEFAULT_FUNCTION, DEFAULT_MODULE, DEFAULT_SINK_ADDRESS,
};
use feeder_rust_core::registry::DEFAULT_REGISTRY_KEY;
use feeder_rust_core::utils::fixed_point::MAX_EXPONENT;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const MAX_CONCURRENT_LIMIT: usize = 256;

/// Immutable run configuration, built once at startup
#[derive(Debug, Clone)]
pub struct FeederConfig {
    // Asset
    pub token: String,
    pub env: String,
    pub exponent: u32,
    /// Provider-side symbol (trading pair, coin id or account key) overriding
    /// the built-in tables
    pub quote_symbol: Option<String>,

    // Source
    pub source: SourceKind,
    pub stable_reference: Option<f64>,
    pub stable_jitter: f64,
    pub pyth_rpc: String,
    pub max_price: Option<f64>,

    // Chain client
    pub client_bin: String,
    pub client_config: PathBuf,
    pub deployments_path: PathBuf,
    pub registry_key: String,
    pub module: String,
    pub function: String,
    pub sink_address: String,
    pub gas: Option<String>,
    pub gas_budget: u64,

    // Scheduling
    pub interval_secs: u64,
    pub fetch_timeout_secs: u64,
    pub max_concurrent: usize,
    pub queue_capacity: usize,
    pub submit_timeout_secs: u64,

    // Monitoring
    pub stats_every_ticks: u64,
    pub dry_run: bool,
    pub log_json: bool,
}

impl FeederConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup (the environment in production, a map in tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("FEEDER_TOKEN")
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow!("FEEDER_TOKEN must be set"))?;
        let env_tag = lookup("FEEDER_ENV").unwrap_or_else(|| "testnet".to_string());

        let remote_provider: QuoteProvider = lookup("FEEDER_REMOTE_PROVIDER")
            .unwrap_or_else(|| "binance".to_string())
            .parse()?;
        let source = SourceKind::parse(
            &lookup("FEEDER_SOURCE").unwrap_or_else(|| "remote".to_string()),
            remote_provider,
        )?;

        let exponent = parse_u32(&lookup, "FEEDER_EXP", 12)?;
        let interval_secs = parse_u64(&lookup, "FEEDER_INTERVAL_SECS", 30)?;
        let max_concurrent = parse_usize(&lookup, "FEEDER_MAX_CONCURRENT", 1)?;
        let queue_capacity = parse_usize(&lookup, "FEEDER_QUEUE_CAPACITY", 64)?;
        let gas_budget = parse_u64(&lookup, "FEEDER_GAS_BUDGET", 2_000_000)?;
        let stable_jitter = parse_f64(&lookup, "FEEDER_STABLE_JITTER", 0.0001)?;
        let fetch_timeout_secs = parse_u64(&lookup, "FEEDER_FETCH_TIMEOUT_SECS", 10)?;
        let submit_timeout_secs = parse_u64(&lookup, "FEEDER_SUBMIT_TIMEOUT_SECS", 120)?;

        // Validate
        if interval_secs == 0 {
            return Err(anyhow!("FEEDER_INTERVAL_SECS must be > 0"));
        }
        if max_concurrent == 0 || max_concurrent > MAX_CONCURRENT_LIMIT {
            return Err(anyhow!(
                "FEEDER_MAX_CONCURRENT must be between 1 and {}",
                MAX_CONCURRENT_LIMIT
            ));
        }
        if queue_capacity == 0 {
            return Err(anyhow!("FEEDER_QUEUE_CAPACITY must be >= 1"));
        }
        if exponent > MAX_EXPONENT {
            return Err(anyhow!("FEEDER_EXP must be <= {}", MAX_EXPONENT));
        }
        if gas_budget == 0 {
            return Err(anyhow!("FEEDER_GAS_BUDGET must be > 0"));
        }
        if stable_jitter < 0.0 {
            return Err(anyhow!("FEEDER_STABLE_JITTER must be >= 0"));
        }
        if fetch_timeout_secs == 0 || submit_timeout_secs == 0 {
            return Err(anyhow!("timeouts must be > 0"));
        }

        let client_config = match lookup("FEEDER_CLIENT_CONFIG") {
            Some(path) => PathBuf::from(path),
            None => {
                let dir = lookup("FEEDER_CLIENT_CONFIG_DIR")
                    .map(PathBuf::from)
                    .or_else(|| home::home_dir().map(|home| home.join(".sui").join("sui_config")))
                    .ok_or_else(|| anyhow!("cannot resolve home directory; set FEEDER_CLIENT_CONFIG"))?;
                dir.join(format!("{}-{}-feeder.yaml", env_tag, token))
            }
        };

        Ok(Self {
            deployments_path: lookup("FEEDER_DEPLOYMENTS")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(format!("deployments-{}.json", env_tag))),
            token,
            env: env_tag,
            exponent,
            quote_symbol: lookup("FEEDER_QUOTE_SYMBOL")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),

            source,
            stable_reference: parse_optional_f64(&lookup, "FEEDER_STABLE_REFERENCE")?,
            stable_jitter,
            pyth_rpc: lookup("FEEDER_PYTH_RPC")
                .unwrap_or_else(|| feeder_rust_core::clients::pyth::PYTHNET_HTTP_ENDPOINT.to_string()),
            max_price: parse_optional_f64(&lookup, "FEEDER_MAX_PRICE")?,

            client_bin: lookup("FEEDER_CLIENT_BIN").unwrap_or_else(|| DEFAULT_CLIENT_BIN.to_string()),
            client_config,
            registry_key: lookup("FEEDER_REGISTRY_KEY")
                .unwrap_or_else(|| DEFAULT_REGISTRY_KEY.to_string()),
            module: lookup("FEEDER_MODULE").unwrap_or_else(|| DEFAULT_MODULE.to_string()),
            function: lookup("FEEDER_FUNCTION").unwrap_or_else(|| DEFAULT_FUNCTION.to_string()),
            sink_address: lookup("FEEDER_SINK_ADDRESS")
                .unwrap_or_else(|| DEFAULT_SINK_ADDRESS.to_string()),
            gas: lookup("FEEDER_GAS").filter(|g| !g.trim().is_empty()),
            gas_budget,

            interval_secs,
            fetch_timeout_secs,
            max_concurrent,
            queue_capacity,
            submit_timeout_secs,

            stats_every_ticks: parse_u64(&lookup, "FEEDER_STATS_EVERY_TICKS", 12)?.max(1),
            dry_run: parse_bool(&lookup, "FEEDER_DRY_RUN", false)?,
            log_json: parse_bool(&lookup, "FEEDER_LOG_JSON", false)?,
        })
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    pub fn client_params(&self) -> ClientParams {
        ClientParams {
            program: self.client_bin.clone(),
            client_config: self.client_config.clone(),
            module: self.module.clone(),
            function: self.function.clone(),
            sink_address: self.sink_address.clone(),
            gas: self.gas.clone(),
            gas_budget: self.gas_budget,
        }
    }

    pub fn source_settings(&self) -> SourceSettings {
        SourceSettings {
            kind: self.source,
            request_timeout: self.fetch_timeout(),
            stable_peg: self.stable_reference.map(|reference| (self.token.clone(), reference)),
            stable_jitter: self.stable_jitter,
            pyth_endpoint: self.pyth_rpc.clone(),
        }
    }
}

/// Parse variable as f64 with default fallback
fn parse_f64<F: Fn(&str) -> Option<String>>(lookup: &F, var_name: &str, default: f64) -> Result<f64> {
    match lookup(var_name) {
        Some(val) => val.trim().parse().map_err(|_| anyhow!("{} must be a valid f64", var_name)),
        None => Ok(default),
    }
}

fn parse_optional_f64<F: Fn(&str) -> Option<String>>(lookup: &F, var_name: &str) -> Result<Option<f64>> {
    match lookup(var_name) {
        Some(val) if !val.trim().is_empty() => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be a valid f64", var_name)),
        _ => Ok(None),
    }
}

/// Parse variable as u32 with default fallback
fn parse_u32<F: Fn(&str) -> Option<String>>(lookup: &F, var_name: &str, default: u32) -> Result<u32> {
    match lookup(var_name) {
        Some(val) => val.trim().parse().map_err(|_| anyhow!("{} must be a valid u32", var_name)),
        None => Ok(default),
    }
}

/// Parse variable as u64 with default fallback
fn parse_u64<F: Fn(&str) -> Option<String>>(lookup: &F, var_name: &str, default: u64) -> Result<u64> {
    match lookup(var_name) {
        Some(val) => val.trim().parse().map_err(|_| anyhow!("{} must be a valid u64", var_name)),
        None => Ok(default),
    }
}

fn parse_usize<F: Fn(&str) -> Option<String>>(lookup: &F, var_name: &str, default: usize) -> Result<usize> {
    match lookup(var_name) {
        Some(val) => val.trim().parse().map_err(|_| anyhow!("{} must be a valid integer", var_name)),
        None => Ok(default),
    }
}

fn parse_bool<F: Fn(&str) -> Option<String>>(lookup: &F, var_name: &str, default: bool) -> Result<bool> {
    match lookup(var_name) {
        Some(val) => val
            .trim()
            .to_lowercase()
            .parse()
            .map_err(|_| anyhow!("{} must be true or false", var_name)),
        None => Ok(default),
    }
}
