//! Deployment registry
//!
//! Reads the JSON file written by the contract deployer and resolves the oracle
//! package plus the feeder address for one asset. Read once at startup; any
//! missing or malformed entry is a fatal [`FeederError::Config`].
//!
//! Expected shape (other top-level keys and fields are ignored):
//!
//! ```json
//! {
//!   "abex_feeder": {
//!     "package": "0x07700da7...",
//!     "feeder": { "btc": "0x64aca680...", "usdt": "0x33134da8..." }
//!   }
//! }
//! ```

use crate::error::{FeederError, Result};
use crate::models::AssetConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Top-level key the deployer writes the feeder section under
pub const DEFAULT_REGISTRY_KEY: &str = "abex_feeder";

#[derive(Debug, Clone, Deserialize)]
struct FeederSection {
    package: String,
    #[serde(default)]
    feeder: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct DeploymentRegistry {
    package: String,
    feeders: HashMap<String, String>,
}

impl DeploymentRegistry {
    /// Load and validate the registry file.
    pub fn load(path: impl AsRef<Path>, key: &str) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            FeederError::Config(format!(
                "cannot read deployment registry {}: {}",
                path.display(),
                e
            ))
        })?;
        let registry = Self::from_json_str(&raw, key)?;
        debug!(
            "Loaded deployment registry {} ({} feeders)",
            path.display(),
            registry.feeders.len()
        );
        Ok(registry)
    }

    pub fn from_json_str(raw: &str, key: &str) -> Result<Self> {
        let root: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| FeederError::Config(format!("deployment registry is not valid JSON: {}", e)))?;

        let section = root
            .get(key)
            .ok_or_else(|| FeederError::Config(format!("deployment registry has no '{}' entry", key)))?;

        let section: FeederSection = serde_json::from_value(section.clone())
            .map_err(|e| FeederError::Config(format!("malformed '{}' entry: {}", key, e)))?;

        if section.package.trim().is_empty() {
            return Err(FeederError::Config(format!("'{}.package' is empty", key)));
        }

        Ok(Self {
            package: section.package,
            feeders: section
                .feeder
                .into_iter()
                .map(|(symbol, address)| (symbol.to_lowercase(), address))
                .collect(),
        })
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn feeder_address(&self, symbol: &str) -> Option<&str> {
        self.feeders.get(&symbol.to_lowercase()).map(String::as_str)
    }

    /// Build the immutable asset configuration for `symbol`.
    pub fn asset(&self, symbol: &str, decimal_exponent: u32) -> Result<AssetConfig> {
        let feeder = self
            .feeder_address(symbol)
            .filter(|address| !address.trim().is_empty())
            .ok_or_else(|| {
                FeederError::Config(format!("no feeder registered for asset '{}'", symbol))
            })?;

        Ok(AssetConfig::new(
            symbol,
            decimal_exponent,
            self.package.clone(),
            feeder,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "abex_core": { "package": "0xcore" },
        "abex_feeder": {
            "package": "0x07700da7e886a5e40042e155c847fbe400f1aa3e",
            "upgrade_cap": "0xcap",
            "feeder": {
                "BTC": "0x64aca68029bb832219611fcb9f85df64e4c9b6c3",
                "usdt": "0x33134da8a9ef5010ec4222d2c4499bf604d7cbd4",
                "eth": ""
            }
        }
    }"#;

    #[test]
    fn test_resolve_asset() {
        let registry = DeploymentRegistry::from_json_str(SAMPLE, DEFAULT_REGISTRY_KEY).unwrap();
        assert_eq!(registry.package(), "0x07700da7e886a5e40042e155c847fbe400f1aa3e");

        let asset = registry.asset("btc", 9).unwrap();
        assert_eq!(asset.symbol, "btc");
        assert_eq!(asset.feeder_id, "0x64aca68029bb832219611fcb9f85df64e4c9b6c3");
        assert_eq!(asset.package, registry.package());
        assert_eq!(asset.decimal_exponent, 9);
    }

    #[test]
    fn test_unknown_or_empty_feeder_is_config_error() {
        let registry = DeploymentRegistry::from_json_str(SAMPLE, DEFAULT_REGISTRY_KEY).unwrap();
        assert!(matches!(registry.asset("sol", 9), Err(FeederError::Config(_))));
        assert!(matches!(registry.asset("eth", 9), Err(FeederError::Config(_))));
    }

    #[test]
    fn test_missing_key_and_malformed_json() {
        assert!(matches!(
            DeploymentRegistry::from_json_str(SAMPLE, "other_key"),
            Err(FeederError::Config(_))
        ));
        assert!(matches!(
            DeploymentRegistry::from_json_str("{not json", DEFAULT_REGISTRY_KEY),
            Err(FeederError::Config(_))
        ));
        assert!(matches!(
            DeploymentRegistry::from_json_str(r#"{"abex_feeder": {"feeder": {}}}"#, DEFAULT_REGISTRY_KEY),
            Err(FeederError::Config(_))
        ));
        assert!(matches!(
            DeploymentRegistry::from_json_str(r#"{"abex_feeder": {"package": " "}}"#, DEFAULT_REGISTRY_KEY),
            Err(FeederError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let registry = DeploymentRegistry::load(file.path(), DEFAULT_REGISTRY_KEY).unwrap();
        assert_eq!(
            registry.feeder_address("USDT"),
            Some("0x33134da8a9ef5010ec4222d2c4499bf604d7cbd4")
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = DeploymentRegistry::load("/nonexistent/deployments-testnet.json", DEFAULT_REGISTRY_KEY)
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
